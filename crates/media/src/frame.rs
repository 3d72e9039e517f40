//! Decoded frame type and encoding helpers

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops::FilterType, DynamicImage, ImageBuffer, Rgb, RgbImage};

use crate::{MediaError, FRAME_SIZE};

/// JPEG quality used for images forwarded to the analysis stage
const JPEG_QUALITY: u8 = 90;

/// Decoded RGB frame at the working resolution
#[derive(Debug, Clone)]
pub struct Frame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Position of the frame in the source media
    pub index: u32,
    /// Offset from the start of the source (milliseconds, 0 when unknown)
    pub timestamp_ms: u64,
}

impl Frame {
    /// Create a frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u32, timestamp_ms: u64) -> Self {
        Self {
            data,
            width,
            height,
            index,
            timestamp_ms,
        }
    }

    /// Resize a decoded image to the working resolution.
    ///
    /// The whole scene is squeezed into the square; nothing is cropped.
    pub fn from_image(image: &DynamicImage, index: u32, timestamp_ms: u64) -> Self {
        let resized = image
            .resize_exact(FRAME_SIZE, FRAME_SIZE, FilterType::Triangle)
            .to_rgb8();

        Self {
            width: resized.width(),
            height: resized.height(),
            data: resized.into_raw(),
            index,
            timestamp_ms,
        }
    }

    /// View the frame as an `image` buffer
    pub fn to_rgb_image(&self) -> Result<RgbImage, MediaError> {
        ImageBuffer::<Rgb<u8>, _>::from_raw(self.width, self.height, self.data.clone()).ok_or_else(
            || {
                MediaError::Encode(format!(
                    "frame {} holds {} bytes, expected {}x{}x3",
                    self.index,
                    self.data.len(),
                    self.width,
                    self.height
                ))
            },
        )
    }

    /// Encode as JPEG
    pub fn encode_jpeg(&self) -> Result<Vec<u8>, MediaError> {
        let rgb = self.to_rgb_image()?;
        let mut buf = Cursor::new(Vec::new());
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))
            .map_err(|e| MediaError::Encode(e.to_string()))?;
        Ok(buf.into_inner())
    }

    /// Encode as base64 JPEG, the form the analysis stage consumes
    pub fn encode_jpeg_base64(&self) -> Result<String, MediaError> {
        Ok(STANDARD.encode(self.encode_jpeg()?))
    }
}
