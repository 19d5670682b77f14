//! Captured images and the local image store

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::ImageFormat;
use thiserror::Error;

use super::services::{ImageUploader, ServiceError};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No image data was captured")]
    Empty,

    #[error("Captured data is not a recognized image format")]
    UnknownFormat,

    #[error("Failed to read captured image: {0}")]
    Io(#[from] std::io::Error),

    #[error("A sheet is open over the camera")]
    SheetOpen,
}

/// Image bytes whose format has been sniffed
#[derive(Debug, Clone)]
pub struct CapturedImage {
    bytes: Arc<[u8]>,
    format: ImageFormat,
}

impl CapturedImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CaptureError> {
        if bytes.is_empty() {
            return Err(CaptureError::Empty);
        }
        let format = image::guess_format(&bytes).map_err(|_| CaptureError::UnknownFormat)?;
        Ok(Self {
            bytes: bytes.into(),
            format,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

/// Uploader that keeps images in a local directory and hands out `file://` URLs
pub struct LocalImageStore {
    dir: PathBuf,
}

impl LocalImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ImageUploader for LocalImageStore {
    async fn upload(&self, image: &CapturedImage) -> Result<String, ServiceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self
            .dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), image.extension()));
        tokio::fs::write(&path, image.bytes()).await?;
        let absolute = tokio::fs::canonicalize(&path).await.unwrap_or(path);
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    #[test]
    fn test_sniffs_format() {
        let png = CapturedImage::from_bytes(PNG_MAGIC.to_vec()).unwrap();
        assert_eq!(png.format(), ImageFormat::Png);
        assert_eq!(png.extension(), "png");

        let jpeg = CapturedImage::from_bytes(JPEG_MAGIC.to_vec()).unwrap();
        assert_eq!(jpeg.format(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_rejects_empty_and_unknown() {
        assert!(matches!(CapturedImage::from_bytes(Vec::new()), Err(CaptureError::Empty)));
        assert!(matches!(
            CapturedImage::from_bytes(b"hello world".to_vec()),
            Err(CaptureError::UnknownFormat)
        ));
        assert!(matches!(
            CapturedImage::from_path("/no/such/capture.jpg"),
            Err(CaptureError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_local_store_writes_file() {
        let dir = std::env::temp_dir().join(format!("nutriscan-store-{}", uuid::Uuid::new_v4()));
        let store = LocalImageStore::new(&dir);
        let image = CapturedImage::from_bytes(PNG_MAGIC.to_vec()).unwrap();

        let url = store.upload(&image).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with(".png"));

        let written = std::fs::read(url.trim_start_matches("file://")).unwrap();
        assert_eq!(written, PNG_MAGIC);
        std::fs::remove_dir_all(&dir).ok();
    }
}
