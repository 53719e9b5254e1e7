//! Decoded console screenshot

use image::RgbImage;
use std::path::Path;
use tracing::debug;

use crate::error::{OcrError, Result};

/// A decoded screenshot, truncated to 8-bit RGB
#[derive(Debug, Clone)]
pub struct ScreenFrame {
    /// RGB pixel data
    pub image: RgbImage,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl ScreenFrame {
    /// Wrap pixels that are already decoded
    pub fn from_rgb(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            width,
            height,
        }
    }

    /// Decode a PNG or PPM screenshot from memory
    ///
    /// The format is chosen from the leading magic bytes, not a file name.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let decoded =
            image::load_from_memory(data).map_err(|e| OcrError::ImageDecode(e.to_string()))?;

        let frame = Self::from_rgb(decoded.to_rgb8());
        debug!("Decoded {}x{} screenshot", frame.width, frame.height);
        Ok(frame)
    }

    /// Read and decode a screenshot file
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .map_err(|e| OcrError::ImageDecode(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&data)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
