//! Blob storage for uploaded documents.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// A stored upload, as listed by `GET /files`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBlob {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// Where uploaded bytes live. Local filesystem by default; any object store
/// can stand in.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn name(&self) -> &str;

    /// Store `bytes` under `name`, replacing any previous blob of that name.
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError>;

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// All stored blobs, sorted by name.
    async fn list(&self) -> Result<Vec<StoredBlob>, StorageError>;
}
