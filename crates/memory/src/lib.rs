//! Document storage and retrieval for RagBridge.
//!
//! Uploads are stored by a [`BlobStore`](ragbridge_core::BlobStore),
//! extracted to text, chunked, optionally embedded, and kept in an in-memory
//! [`DocumentIndex`] that the retrievers search.

pub mod blob;
pub mod chunk;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod retriever;
pub mod vector;

pub use blob::{LocalBlobStore, sanitize_file_name};
pub use chunk::chunk_text;
pub use extract::extract_text;
pub use index::{DocumentIndex, IndexedChunk};
pub use ingest::{DocumentIngestor, IngestReport};
pub use retriever::{HybridRetriever, NoRetrieval};
pub use vector::{ScoredChunk, cosine_similarity, reciprocal_rank_fusion, vector_search};
