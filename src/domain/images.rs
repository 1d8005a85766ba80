//! Recognition of uploaded image payloads.
//!
//! Only raster formats browsers render inline are accepted. The stored file
//! extension always comes from the sniffed format, never from the client.

use imagesize::{ImageSize, ImageType};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("uploaded file is not a recognised image")]
    NotAnImage,
    #[error("image format is not accepted")]
    UnsupportedFormat,
}

/// Dimensions and format of an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: usize,
    pub height: usize,
    pub extension: &'static str,
}

/// Sniff the payload header and check it against the accepted formats.
pub fn inspect_image(data: &[u8]) -> Result<ImageInfo, ImageError> {
    let kind = imagesize::image_type(data).map_err(|_| ImageError::NotAnImage)?;
    let extension = accepted_extension(kind).ok_or(ImageError::UnsupportedFormat)?;
    let size: ImageSize = imagesize::blob_size(data).map_err(|_| ImageError::NotAnImage)?;
    if size.width == 0 || size.height == 0 {
        return Err(ImageError::NotAnImage);
    }
    Ok(ImageInfo {
        width: size.width,
        height: size.height,
        extension,
    })
}

fn accepted_extension(kind: ImageType) -> Option<&'static str> {
    match kind {
        ImageType::Png => Some("png"),
        ImageType::Jpeg => Some("jpg"),
        ImageType::Gif => Some("gif"),
        ImageType::Webp => Some("webp"),
        ImageType::Bmp => Some("bmp"),
        _ => None,
    }
}
