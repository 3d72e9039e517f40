//! Media Ingestion for Driver Safety Reports
//!
//! Turns one uploaded image or video into the ordered frames the behavior
//! detector runs on:
//! - Extension validation (jpg/jpeg/png, mp4/avi/mov)
//! - Image decode and resize to the 640x640 working resolution
//! - Video decode through the ffmpeg CLI from a per-request temp file
//! - Interval frame sampling

pub mod asset;
pub mod ffmpeg;
pub mod frame;
pub mod normalizer;
pub mod sampler;

pub use asset::{MediaAsset, MediaKind};
pub use ffmpeg::{FfmpegDecoder, VideoDecoder};
pub use frame::Frame;
pub use normalizer::{MediaConfig, MediaNormalizer};
pub use sampler::FrameSampler;

use thiserror::Error;

/// Working resolution (square) every frame is normalized to
pub const FRAME_SIZE: u32 = 640;

/// Media error types
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode media: {0}")]
    Decode(String),

    #[error("No frames sampled from media")]
    NoFramesSampled,

    #[error("Video decoder unavailable: {0}")]
    DecoderUnavailable(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Whether the error was caused by the uploaded media itself
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MediaError::UnsupportedFormat(_) | MediaError::Decode(_) | MediaError::NoFramesSampled
        )
    }
}
