/// Image validation and artifact derivation
use crate::error::{MediaError, MediaResult};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Artifacts derived from one upload
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub original: Vec<u8>,
    pub thumbnail: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Content type shared by original and thumbnail
    pub content_type: String,
}

/// Validates raw bytes and derives original + thumbnail
pub trait ImageProcessor: Send + Sync {
    /// Fails with `MediaError::Validation` for anything that is not an
    /// acceptable image.
    fn process(&self, data: &[u8]) -> MediaResult<ProcessedImage>;

    fn is_square(&self, width: u32, height: u32) -> bool {
        width == height
    }
}

/// Default processor built on the `image` crate
///
/// PNG and JPEG originals are kept byte-for-byte; GIF and WebP are re-encoded
/// as JPEG. Thumbnails fit in a `thumbnail_size` square and share the
/// original's content type.
#[derive(Debug, Clone)]
pub struct ThumbnailProcessor {
    max_bytes: usize,
    thumbnail_size: u32,
}

impl ThumbnailProcessor {
    pub fn new(max_bytes: usize, thumbnail_size: u32) -> Self {
        Self {
            max_bytes,
            thumbnail_size,
        }
    }

    fn encode(img: &DynamicImage, format: ImageFormat) -> MediaResult<Vec<u8>> {
        let mut buf = Vec::new();
        let result = match format {
            // JPEG has no alpha channel
            ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
                .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg),
            other => img.write_to(&mut Cursor::new(&mut buf), other),
        };
        result.map_err(|e| MediaError::Internal(format!("Failed to encode image: {}", e)))?;
        Ok(buf)
    }
}

impl Default for ThumbnailProcessor {
    fn default() -> Self {
        Self::new(10 * 1024 * 1024, 256)
    }
}

impl ImageProcessor for ThumbnailProcessor {
    fn process(&self, data: &[u8]) -> MediaResult<ProcessedImage> {
        if data.is_empty() {
            return Err(MediaError::Validation("Empty upload".to_string()));
        }

        if data.len() > self.max_bytes {
            return Err(MediaError::Validation(format!(
                "Image of {} bytes exceeds maximum of {} bytes",
                data.len(),
                self.max_bytes
            )));
        }

        let format = image::guess_format(data)
            .map_err(|_| MediaError::Validation("Unsupported image type".to_string()))?;
        let output_format = match format {
            ImageFormat::Png => ImageFormat::Png,
            ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP => ImageFormat::Jpeg,
            other => {
                return Err(MediaError::Validation(format!(
                    "Unsupported image type: {:?}",
                    other
                )))
            }
        };

        let img = image::load_from_memory_with_format(data, format)
            .map_err(|e| MediaError::Validation(format!("Malformed image: {}", e)))?;

        let original = if format == output_format {
            data.to_vec()
        } else {
            Self::encode(&img, output_format)?
        };

        let thumb = img.thumbnail(self.thumbnail_size, self.thumbnail_size);
        let thumbnail = Self::encode(&thumb, output_format)?;

        Ok(ProcessedImage {
            original,
            thumbnail,
            width: img.width(),
            height: img.height(),
            content_type: output_format.to_mime_type().to_string(),
        })
    }
}
