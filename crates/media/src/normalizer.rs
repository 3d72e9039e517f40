//! Media normalization: uploaded bytes to sampled working-resolution frames

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ffmpeg::{FfmpegDecoder, VideoDecoder};
use crate::{Frame, FrameSampler, MediaAsset, MediaError, MediaKind};

/// Media configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Keep every Nth video frame
    pub skip_interval: u32,

    /// Directory for transient video files (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,

    /// Decoder binaries (looked up in PATH when unset)
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            skip_interval: FrameSampler::DEFAULT_SKIP,
            scratch_dir: None,
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

/// Turns a validated asset into its sampled frames
pub struct MediaNormalizer {
    config: MediaConfig,
    sampler: FrameSampler,
    decoder: Arc<dyn VideoDecoder>,
}

impl MediaNormalizer {
    /// Create a normalizer decoding video with ffmpeg
    pub fn new(config: MediaConfig) -> Self {
        let decoder = FfmpegDecoder::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone());
        Self::with_decoder(config, Arc::new(decoder))
    }

    /// Create a normalizer with a custom video decoder
    pub fn with_decoder(config: MediaConfig, decoder: Arc<dyn VideoDecoder>) -> Self {
        Self {
            sampler: FrameSampler::new(config.skip_interval),
            config,
            decoder,
        }
    }

    pub fn sampler(&self) -> &FrameSampler {
        &self.sampler
    }

    /// Decode and sample an asset. The result is ordered and never empty.
    pub async fn extract_frames(&self, asset: &MediaAsset) -> Result<Vec<Frame>, MediaError> {
        match asset.kind() {
            MediaKind::Image => {
                let frame = decode_image(asset)?;
                Ok(self.sampler.sample_image(frame))
            }
            MediaKind::Video => {
                let frames = self.decode_video(asset).await?;
                FrameSampler::non_empty(frames)
            }
        }
    }

    async fn decode_video(&self, asset: &MediaAsset) -> Result<Vec<Frame>, MediaError> {
        let mut builder = tempfile::Builder::new();
        let suffix = format!(".{}", asset.extension());
        builder.prefix("drivesafe-").suffix(&suffix);

        // Removed when `transient` drops, on success and on every error path
        let transient = match &self.config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        debug!(
            "Staged {} bytes of {} at {}",
            asset.size_bytes(),
            asset.filename(),
            transient.path().display()
        );

        tokio::fs::write(transient.path(), asset.bytes()).await?;
        let frames = self.decoder.decode(transient.path(), &self.sampler).await;

        let path = transient.path().to_path_buf();
        transient.close()?;
        debug!("Removed transient file {}", path.display());

        let frames = frames?;
        info!("Sampled {} frames from {}", frames.len(), asset.filename());
        Ok(frames)
    }
}

fn decode_image(asset: &MediaAsset) -> Result<Frame, MediaError> {
    let image = image::load_from_memory(asset.bytes())
        .map_err(|e| MediaError::Decode(format!("{}: {}", asset.filename(), e)))?;
    debug!(
        "Decoded {} ({}x{})",
        asset.filename(),
        image.width(),
        image.height()
    );
    Ok(Frame::from_image(&image, 0, 0))
}
