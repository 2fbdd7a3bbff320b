//! Upload ingestion: extract text, chunk, store the bytes, embed, index.

use std::path::PathBuf;
use std::sync::Arc;

use ragbridge_core::error::StorageError;
use ragbridge_core::retrieval::EmbeddingService;
use ragbridge_core::storage::BlobStore;
use serde::Serialize;
use tracing::{info, warn};

use crate::blob::sanitize_file_name;
use crate::chunk::chunk_text;
use crate::extract::extract_text;
use crate::index::DocumentIndex;

/// What happened to one upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    /// Stored file name (directory components stripped)
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
    /// Chunks added to the index; zero when the format is not indexable
    pub chunks: usize,
    pub embedded: bool,
}

pub struct DocumentIngestor {
    store: Arc<dyn BlobStore>,
    index: DocumentIndex,
    embedder: Option<Arc<dyn EmbeddingService>>,
    chunk_chars: usize,
}

impl DocumentIngestor {
    pub fn new(store: Arc<dyn BlobStore>, index: DocumentIndex, chunk_chars: usize) -> Self {
        Self {
            store,
            index,
            embedder: None,
            chunk_chars,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingService>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    /// Persist an upload and make its text searchable.
    ///
    /// Text is extracted and chunked before anything is written, so a failed
    /// extraction leaves the stored files and every indexed document
    /// untouched. Formats with no text extractor are stored but not indexed.
    pub async fn ingest(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<IngestReport, StorageError> {
        let name = sanitize_file_name(file_name)?;

        let chunks = match extract_text(&name, content_type, bytes) {
            Ok(text) => Some(chunk_text(&text, self.chunk_chars)),
            Err(StorageError::UnsupportedContentType(ct)) => {
                warn!(file = %name, content_type = %ct, "Storing upload without indexing");
                None
            }
            Err(e) => return Err(e),
        };

        let path = self.store.save(&name, bytes).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(name);

        let Some(chunks) = chunks else {
            return Ok(IngestReport {
                name,
                path,
                chunks: 0,
                embedded: false,
            });
        };

        let embeddings = match &self.embedder {
            Some(embedder) if !chunks.is_empty() => match embedder.embed(&chunks).await {
                Ok(vectors) => Some(vectors),
                Err(e) => {
                    warn!(file = %name, error = %e, "Embedding failed, indexing for keyword search only");
                    None
                }
            },
            _ => None,
        };
        let embedded = embeddings.is_some();

        let count = self.index.add_document(&name, chunks, embeddings).await;
        info!(file = %name, chunks = count, embedded, "Upload indexed");

        Ok(IngestReport {
            name,
            path,
            chunks: count,
            embedded,
        })
    }
}
