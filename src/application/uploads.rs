//! Storage port for post images.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::domain::images::ImageError;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Result of storing an upload payload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: u64,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Validate `data` as an image and persist it, returning its relative path.
    async fn store_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError>;

    /// Remove a stored image. Missing files are treated as success.
    async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError>;
}
