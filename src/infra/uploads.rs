//! Filesystem storage for post images.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use slug::slugify;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::application::uploads::{ImageStore, StoredUpload, UploadStorageError};
use crate::domain::images::inspect_image;

const IMAGE_PREFIX: &str = "posts";

/// Filesystem-backed upload storage.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate and store a post image under `posts/YYYY/MM/DD/`.
    pub async fn store_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }
        let info = inspect_image(&data)?;
        let stored_path =
            build_stored_path(original_name, info.extension, OffsetDateTime::now_utc());
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        if let Err(err) = file.write_all(&data).await {
            drop(file);
            let _ = fs::remove_file(&absolute).await;
            return Err(err.into());
        }
        file.flush().await?;

        let checksum = hex::encode(Sha256::digest(&data));

        Ok(StoredUpload {
            stored_path,
            checksum,
            size_bytes: data.len() as u64,
        })
    }

    /// Attempt to read the stored payload into memory.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if stored_path.is_empty()
            || relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ImageStore for UploadStorage {
    async fn store_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<StoredUpload, UploadStorageError> {
        UploadStorage::store_image(self, original_name, data).await
    }

    async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        UploadStorage::delete(self, stored_path).await
    }
}

fn build_stored_path(original_name: &str, extension: &str, now: OffsetDateTime) -> String {
    let (year, month, day) = now.to_calendar_date();
    let identifier = Uuid::new_v4();
    let filename = sanitize_filename(original_name, extension);
    format!(
        "{IMAGE_PREFIX}/{year}/{:02}/{:02}/{identifier}-{filename}",
        month as u8, day
    )
}

/// Keep the slugged stem of the client name; the extension is always the sniffed one.
fn sanitize_filename(original: &str, extension: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "image".to_string();
    }
    format!("{base}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::images::ImageError;
    use time::macros::datetime;

    const PNG_1X1: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
        0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
        0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
    ];

    #[test]
    fn stored_path_is_dated_and_slugged() {
        let path = build_stored_path(
            "My Holiday Photo.PNG",
            "png",
            datetime!(2024-03-07 10:00 UTC),
        );
        assert!(path.starts_with("posts/2024/03/07/"));
        assert!(path.ends_with("-my-holiday-photo.png"));
    }

    #[test]
    fn detected_extension_overrides_claimed_one() {
        assert_eq!(sanitize_filename("cat.txt", "gif"), "cat.gif");
        assert_eq!(sanitize_filename("evil.html", "png"), "evil.png");
        assert_eq!(sanitize_filename("../../", "jpg"), "image.jpg");
    }

    #[tokio::test]
    async fn store_read_delete_cycle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        let stored = storage
            .store_image("pixel.png", Bytes::from_static(PNG_1X1))
            .await
            .expect("stored");
        assert_eq!(stored.size_bytes, PNG_1X1.len() as u64);
        assert_eq!(stored.checksum.len(), 64);

        let data = storage.read(&stored.stored_path).await.expect("read");
        assert_eq!(&data[..], PNG_1X1);

        storage.delete(&stored.stored_path).await.expect("delete");
        storage.delete(&stored.stored_path).await.expect("idempotent delete");
        assert!(storage.read(&stored.stored_path).await.is_err());
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        assert!(matches!(
            storage.read("../etc/passwd").await,
            Err(UploadStorageError::InvalidPath)
        ));
        assert!(matches!(
            storage.read("/etc/passwd").await,
            Err(UploadStorageError::InvalidPath)
        ));
    }

    #[tokio::test]
    async fn non_images_are_not_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        let result = storage
            .store_image("notes.txt", Bytes::from_static(b"just some text"))
            .await;
        assert!(matches!(
            result,
            Err(UploadStorageError::Image(ImageError::NotAnImage))
        ));
        assert!(!dir.path().join(IMAGE_PREFIX).exists());
    }

    #[tokio::test]
    async fn icon_payload_named_html_is_not_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");

        let mut payload = vec![0, 0, 1, 0, 1, 0, 16, 16, 0, 0, 1, 0, 32, 0];
        payload.extend_from_slice(b"<html><script>alert(1)</script></html>");
        let result = storage.store_image("evil.html", Bytes::from(payload)).await;
        assert!(matches!(
            result,
            Err(UploadStorageError::Image(ImageError::UnsupportedFormat))
        ));
        assert!(!dir.path().join(IMAGE_PREFIX).exists());
    }
}
