//! Local filesystem blob store for uploads.
//!
//! Files land directly in the upload directory under their own name. A
//! second upload with the same name overwrites the first.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragbridge_core::error::StorageError;
use ragbridge_core::storage::{BlobStore, StoredBlob};
use tracing::debug;

/// Stores uploads as plain files under one directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// The directory is created on first write if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the upload directory now rather than on first write.
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))
    }
}

/// Reduce a client-supplied file name to its final path component.
///
/// Rejects names that are empty or only dots once directories are stripped.
pub fn sanitize_file_name(name: &str) -> Result<String, StorageError> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(char::from(0));

    if base.is_empty() || base.chars().all(|c| c == '.') {
        return Err(StorageError::InvalidName(name.to_string()));
    }

    Ok(base.to_string())
}

fn io_error(path: &Path, e: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let file_name = sanitize_file_name(name)?;
        self.ensure_root().await?;

        let path = self.root.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| io_error(&path, e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Stored upload");
        Ok(path)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(path).await.map_err(|e| io_error(path, e))
    }

    async fn list(&self) -> Result<Vec<StoredBlob>, StorageError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            // Nothing uploaded yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_error(&self.root, e)),
        };

        let mut blobs = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| io_error(&self.root, e))? {
            let path = entry.path();
            let metadata = entry.metadata().await.map_err(|e| io_error(&path, e))?;
            if !metadata.is_file() {
                continue;
            }

            blobs.push(StoredBlob {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                path,
            });
        }

        blobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(blobs)
    }
}
