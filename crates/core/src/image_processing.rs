//! Image encoding for the API boundary.
//!
//! Captured frames cross the wire as base64 JPEG payloads embedded in
//! `data:` URLs. Pixel-level cropping happens elsewhere (the selected
//! region travels separately as a [`SourceRect`]); this module only
//! encodes.
//!
//! [`SourceRect`]: crate::geometry::SourceRect

use crate::error::{AppError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Encoding utilities for captured frames.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Encodes an image to a base64 JPEG string (no data-URL prefix).
    ///
    /// Captures arrive as RGBA; JPEG has no alpha channel, so the image is
    /// flattened to RGB before encoding.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ImageProcessing`] if JPEG encoding fails.
    pub fn encode_to_base64_jpeg(image: &DynamicImage) -> Result<String> {
        let mut buffer: Vec<u8> = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        DynamicImage::ImageRgb8(image.to_rgb8())
            .write_to(&mut cursor, ImageFormat::Jpeg)
            .map_err(|e| AppError::image(format!("Failed to encode image: {}", e)))?;

        Ok(BASE64.encode(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn encodes_to_valid_base64() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));
        let encoded = ImageProcessor::encode_to_base64_jpeg(&img).unwrap();
        let decoded = BASE64.decode(encoded.as_bytes()).unwrap();
        // JPEG SOI marker.
        assert_eq!(&decoded[..2], &[0xFF, 0xD8]);
    }
}
