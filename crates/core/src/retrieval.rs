//! Retrieval collaborators: embeddings, vector search, and the combined
//! retriever the pipeline calls.
//!
//! Fragments are returned in ranked order; downstream code never re-ranks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A chunk of retrieved text believed relevant to the user's query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFragment {
    /// Where the text came from (uploaded file name, document id, ...)
    pub source_id: String,

    /// The text content
    pub text: String,

    /// Relevance score set by the retriever, if it produces one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
}

impl ContextFragment {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
            relevance_score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.relevance_score = Some(score);
        self
    }

    /// Unscored fragments always pass a relevance threshold.
    pub fn meets(&self, min_relevance: f32) -> bool {
        self.relevance_score.is_none_or(|s| s >= min_relevance)
    }
}

/// Turns text into vectors for similarity search.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;
}

/// Nearest-neighbour search over stored vectors.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Return up to `top_k` fragments ranked by similarity. An optional
    /// `filter` restricts results to one source id. Zero matches is `Ok(vec![])`.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<ContextFragment>, RetrievalError>;
}

/// The retrieval collaborator the assembler depends on.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ContextFragment>, RetrievalError>;
}
