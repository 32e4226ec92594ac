//! Captured photos and the per-cycle capture session.

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// JPEG quality used for captured photos.
pub const PHOTO_JPEG_QUALITY: u8 = 90;

/// Encoding tag for an opaque image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageEncoding {
    Jpeg,
    Png,
}

impl ImageEncoding {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageEncoding::Jpeg => "image/jpeg",
            ImageEncoding::Png => "image/png",
        }
    }
}

/// An encoded image together with its encoding tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub bytes: Vec<u8>,
    pub encoding: ImageEncoding,
    pub width: u32,
    pub height: u32,
}

impl CapturedImage {
    /// Encode an RGBA raster as JPEG. Alpha is dropped.
    pub fn jpeg(image: &RgbaImage, quality: u8) -> Result<Self, CaptureError> {
        let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality)
            .encode_image(&rgb)
            .map_err(|e| CaptureError::Encode(e.to_string()))?;

        Ok(Self {
            bytes,
            encoding: ImageEncoding::Jpeg,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Encode an RGBA raster as PNG.
    pub fn png(image: &RgbaImage) -> Result<Self, CaptureError> {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| CaptureError::Encode(e.to_string()))?;

        Ok(Self {
            bytes,
            encoding: ImageEncoding::Png,
            width: image.width(),
            height: image.height(),
        })
    }

    pub fn mime_type(&self) -> &'static str {
        self.encoding.mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Everything captured during one motion cycle.
///
/// A session is created whole when the photo is taken; the processed variant
/// and the description are attached once, and a new cycle always starts a
/// fresh session.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub id: Uuid,
    pub cycle: u64,
    pub captured_at: DateTime<Utc>,
    pub photo: Arc<CapturedImage>,
    pub processed: Option<Arc<CapturedImage>>,
    pub description: Option<String>,
}

impl CaptureSession {
    pub fn new(cycle: u64, photo: CapturedImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle,
            captured_at: Utc::now(),
            photo: Arc::new(photo),
            processed: None,
            description: None,
        }
    }

    /// Attach the processed variant. Later calls are ignored.
    pub fn attach_processed(&mut self, processed: CapturedImage) -> bool {
        if self.processed.is_some() {
            return false;
        }
        self.processed = Some(Arc::new(processed));
        true
    }

    /// Attach the AI description. Later calls are ignored.
    pub fn attach_description(&mut self, description: String) -> bool {
        if self.description.is_some() {
            return false;
        }
        self.description = Some(description);
        true
    }
}

/// Errors producing capture artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    Encode(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::Encode(e) => write!(f, "Image encoding failed: {e}"),
        }
    }
}

impl std::error::Error for CaptureError {}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_jpeg_encoding() {
        let image = RgbaImage::from_pixel(16, 8, Rgba([200, 10, 10, 255]));
        let photo = CapturedImage::jpeg(&image, PHOTO_JPEG_QUALITY).unwrap();

        assert_eq!(photo.mime_type(), "image/jpeg");
        assert_eq!((photo.width, photo.height), (16, 8));
        // SOI marker
        assert_eq!(&photo.bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&photo.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_png_encoding() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let encoded = CapturedImage::png(&image).unwrap();
        assert_eq!(encoded.mime_type(), "image/png");
        assert_eq!(&encoded.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_session_attachments_are_write_once() {
        let image = RgbaImage::new(2, 2);
        let mut session = CaptureSession::new(1, CapturedImage::png(&image).unwrap());

        assert!(session.attach_description("first".into()));
        assert!(!session.attach_description("second".into()));
        assert_eq!(session.description.as_deref(), Some("first"));

        assert!(session.attach_processed(CapturedImage::png(&image).unwrap()));
        assert!(!session.attach_processed(CapturedImage::png(&image).unwrap()));
    }
}
