//! Provider-backed embeddings for the retrieval side.

use std::sync::Arc;

use async_trait::async_trait;
use ragbridge_core::error::RetrievalError;
use ragbridge_core::provider::{EmbeddingRequest, Provider};
use ragbridge_core::retrieval::EmbeddingService;

/// Adapts any [`Provider`] with an embeddings endpoint to [`EmbeddingService`].
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl EmbeddingService for ProviderEmbedder {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: texts.to_vec(),
            })
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        if response.embeddings.len() != texts.len() {
            return Err(RetrievalError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        Ok(response.embeddings)
    }
}
