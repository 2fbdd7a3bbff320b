//! Retrievers the chat pipeline can be wired with.

use std::sync::Arc;

use async_trait::async_trait;
use ragbridge_core::error::RetrievalError;
use ragbridge_core::retrieval::{ContextFragment, EmbeddingService, Retriever};
use tracing::{debug, warn};

use crate::index::DocumentIndex;
use crate::vector::{RRF_K, ScoredChunk, reciprocal_rank_fusion};

/// Keyword search over the document index, fused with vector search when an
/// embedding service is available.
pub struct HybridRetriever {
    index: DocumentIndex,
    embedder: Option<Arc<dyn EmbeddingService>>,
}

impl HybridRetriever {
    pub fn new(index: DocumentIndex) -> Self {
        Self {
            index,
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingService>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    async fn vector_hits(
        &self,
        embedder: &dyn EmbeddingService,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let vectors = embedder.embed(&[query.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("empty embedding response".into()))?;
        self.index.vector_search(&vector, limit, None).await
    }
}

#[async_trait]
impl Retriever for HybridRetriever {
    fn name(&self) -> &str {
        if self.embedder.is_some() {
            "hybrid"
        } else {
            "keyword"
        }
    }

    async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<ContextFragment>, RetrievalError> {
        if top_k == 0 || self.index.is_empty().await {
            return Ok(vec![]);
        }

        // Over-fetch so fusion has something to reorder
        let candidates = top_k.saturating_mul(2);
        let keyword = self.index.keyword_search(query, candidates, None).await;

        let vector = match &self.embedder {
            Some(embedder) => match self.vector_hits(embedder.as_ref(), query, candidates).await {
                Ok(hits) => hits,
                Err(e) if keyword.is_empty() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Vector search failed, using keyword results only");
                    vec![]
                }
            },
            None => vec![],
        };

        let fused = reciprocal_rank_fusion(&keyword, &vector, RRF_K, top_k);
        debug!(
            keyword = keyword.len(),
            vector = vector.len(),
            returned = fused.len(),
            "Retrieved fragments"
        );

        Ok(fused.into_iter().map(ScoredChunk::into_fragment).collect())
    }
}

/// Retrieval disabled: every query gets no context.
pub struct NoRetrieval;

#[async_trait]
impl Retriever for NoRetrieval {
    fn name(&self) -> &str {
        "none"
    }

    async fn retrieve(
        &self,
        _query: &str,
        _top_k: usize,
    ) -> Result<Vec<ContextFragment>, RetrievalError> {
        Ok(Vec::new())
    }
}
