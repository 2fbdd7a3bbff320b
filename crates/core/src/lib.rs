//! # RagBridge Core
//!
//! Domain types, collaborator traits, and error definitions for the
//! RagBridge retrieval-augmented chat backend. This crate has **no HTTP or
//! runtime dependencies**: it defines the model that every other crate
//! implements against.
//!
//! ## Collaborators
//!
//! Every external service the assembler talks to is a trait here:
//! - [`Provider`]: text generation (and optionally embeddings)
//! - [`EmbeddingService`] / [`VectorSearch`] / [`Retriever`]: context retrieval
//! - [`BlobStore`]: uploaded document storage
//!
//! Concrete vendors live in their own crates and are chosen at startup.

pub mod error;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod retrieval;
pub mod storage;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, RetrievalError, StorageError};
pub use message::{ConversationTurn, Role, SessionId};
pub use prompt::{ChatMessage, Prompt, PromptRequest, PromptShape};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use retrieval::{ContextFragment, EmbeddingService, Retriever, VectorSearch};
pub use storage::{BlobStore, StoredBlob};
