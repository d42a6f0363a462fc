//! JPEG decode and encode for tiles.
//!
//! Source tiles come out of the slide as complete JPEG streams and are
//! decoded to RGB. Deep Zoom tiles are encoded back to JPEG at a fixed
//! quality.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, ImageReader, RgbImage};

use crate::error::TileError;

/// Quality of written Deep Zoom tiles.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

// =============================================================================
// JPEG Encoder
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct JpegTileEncoder {
    quality: u8,
}

impl Default for JpegTileEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl JpegTileEncoder {
    pub fn new() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Decode a complete JPEG stream to RGB; grayscale sources are expanded.
    pub fn decode(&self, source: &[u8]) -> Result<RgbImage, TileError> {
        let reader = ImageReader::with_format(Cursor::new(source), ImageFormat::Jpeg);
        let image = reader
            .decode()
            .map_err(|e| TileError::Decode(e.to_string()))?;
        Ok(image.into_rgb8())
    }

    pub fn encode(&self, image: &RgbImage) -> Result<Bytes, TileError> {
        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, self.quality)
            .encode_image(image)
            .map_err(|e| TileError::Encode(e.to_string()))?;
        Ok(Bytes::from(output))
    }
}

// =============================================================================
// Blocking Work
// =============================================================================

/// Run CPU-bound pixel work (decode, resize, encode) on the blocking pool.
pub async fn run_blocking<T, F>(work: F) -> Result<T, TileError>
where
    F: FnOnce() -> Result<T, TileError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TileError::Worker(e.to_string()))?
}

// =============================================================================
// Tests
// =============================================================================
