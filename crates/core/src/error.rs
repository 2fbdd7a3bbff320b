//! Error types for the RagBridge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error enum; [`Error`] is the taxonomy the
//! HTTP layer maps onto status codes.

use thiserror::Error;

/// The top-level error type for all RagBridge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Input validation (user-facing 400) ---
    #[error("Validation error: {0}")]
    Validation(String),

    // --- Generation (surfaced as a request failure) ---
    #[error("Generation error: {0}")]
    Generation(#[from] ProviderError),

    // --- Unknown provider or model (user-facing 400) ---
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    // --- Upload storage / extraction ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the caller caused this error (as opposed to a collaborator).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::UnsupportedProvider(_))
    }
}

// --- Collaborator errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Transient failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_)
            | ProviderError::Network(_) => true,
            ProviderError::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector search failed: {0}")]
    Search(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Text extraction failed for {file}: {reason}")]
    Extraction { file: String, reason: String },

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),
}
