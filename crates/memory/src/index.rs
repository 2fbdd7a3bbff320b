//! In-memory document index.
//!
//! Holds uploaded document chunks (and their embeddings, when an embedding
//! service is configured) behind a `tokio::sync::RwLock`. Re-indexing a
//! source replaces its previous chunks, matching the overwrite semantics of
//! the upload directory.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragbridge_core::error::RetrievalError;
use ragbridge_core::retrieval::{ContextFragment, VectorSearch};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::vector::{ScoredChunk, vector_search};

/// Query terms shorter than this are ignored by keyword search.
const MIN_TERM_CHARS: usize = 3;

/// One searchable piece of an uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub source_id: String,
    pub chunk_index: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub indexed_at: DateTime<Utc>,
}

impl IndexedChunk {
    pub fn new(
        source_id: impl Into<String>,
        chunk_index: usize,
        text: impl Into<String>,
        embedding: Option<Vec<f32>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            chunk_index,
            text: text.into(),
            embedding,
            indexed_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Shared, cloneable handle to the chunk store.
#[derive(Clone, Default)]
pub struct DocumentIndex {
    chunks: Arc<RwLock<Vec<IndexedChunk>>>,
}

impl DocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything indexed for `source_id` with `texts`.
    ///
    /// `embeddings`, when given, must line up one-to-one with `texts`;
    /// otherwise the chunks are stored without vectors.
    pub async fn add_document(
        &self,
        source_id: &str,
        texts: Vec<String>,
        embeddings: Option<Vec<Vec<f32>>>,
    ) -> usize {
        let embeddings = embeddings.filter(|e| e.len() == texts.len());
        let mut vectors = embeddings.map(|e| e.into_iter());

        let new_chunks: Vec<IndexedChunk> = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let embedding = vectors.as_mut().and_then(|v| v.next());
                IndexedChunk::new(source_id, i, text, embedding)
            })
            .collect();
        let count = new_chunks.len();

        let mut chunks = self.chunks.write().await;
        chunks.retain(|c| c.source_id != source_id);
        chunks.extend(new_chunks);

        debug!(source = %source_id, chunks = count, total = chunks.len(), "Indexed document");
        count
    }

    pub async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.chunks.read().await.is_empty()
    }

    /// Distinct source ids, sorted.
    pub async fn sources(&self) -> Vec<String> {
        let chunks = self.chunks.read().await;
        let mut sources: Vec<String> = chunks.iter().map(|c| c.source_id.clone()).collect();
        sources.sort();
        sources.dedup();
        sources
    }

    /// Case-insensitive keyword search.
    ///
    /// A chunk containing the whole query scores 1.0; otherwise the score is
    /// the fraction of query terms (3+ characters) it contains. Chunks that
    /// match nothing are omitted.
    pub async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        filter: Option<&str>,
    ) -> Vec<ScoredChunk> {
        let query_lower = query.trim().to_lowercase();
        let terms = query_terms(&query_lower);
        if query_lower.is_empty() {
            return vec![];
        }

        let chunks = self.chunks.read().await;
        let mut results: Vec<ScoredChunk> = chunks
            .iter()
            .filter(|c| filter.is_none_or(|source| c.source_id == source))
            .filter_map(|chunk| {
                let text = chunk.text.to_lowercase();
                let score = if text.contains(&query_lower) {
                    1.0
                } else if terms.is_empty() {
                    0.0
                } else {
                    let matched = terms.iter().filter(|t| text.contains(t.as_str())).count();
                    matched as f32 / terms.len() as f32
                };
                (score > 0.0).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        results
    }

    /// Nearest-neighbour search returning scored chunks.
    pub async fn vector_search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let chunks = self.chunks.read().await;

        if let Some(stored) = chunks.iter().find_map(|c| c.embedding.as_ref()) {
            if stored.len() != vector.len() {
                return Err(RetrievalError::DimensionMismatch {
                    expected: stored.len(),
                    actual: vector.len(),
                });
            }
        }

        Ok(vector_search(&chunks, vector, limit, f32::MIN, filter))
    }
}

#[async_trait]
impl VectorSearch for DocumentIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<ContextFragment>, RetrievalError> {
        let hits = self.vector_search(vector, top_k, filter).await?;
        Ok(hits.into_iter().map(ScoredChunk::into_fragment).collect())
    }
}

fn query_terms(query_lower: &str) -> Vec<String> {
    let mut terms: Vec<String> = query_lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .map(String::from)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}
