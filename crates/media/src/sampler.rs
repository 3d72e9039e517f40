//! Frame sampling

use crate::{Frame, MediaError};

/// Keeps every Nth frame of a video, in temporal order.
///
/// Detector cost scales with `total_frames / skip` instead of `total_frames`.
/// Events shorter than `skip` frames can fall between samples and go unseen;
/// that accuracy loss is accepted in exchange for bounded per-clip cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSampler {
    skip: u32,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self {
            skip: Self::DEFAULT_SKIP,
        }
    }
}

impl FrameSampler {
    /// Default skip interval
    pub const DEFAULT_SKIP: u32 = 10;

    /// Create a sampler; a zero interval keeps every frame
    pub fn new(skip: u32) -> Self {
        Self { skip: skip.max(1) }
    }

    pub fn skip(&self) -> u32 {
        self.skip
    }

    /// Whether the frame at `position` in the decoded sequence is sampled
    pub fn keeps(&self, position: u32) -> bool {
        position % self.skip == 0
    }

    /// Sample a fully decoded sequence
    pub fn sample<I>(&self, frames: I) -> Result<Vec<Frame>, MediaError>
    where
        I: IntoIterator<Item = Frame>,
    {
        let sampled = frames
            .into_iter()
            .enumerate()
            .filter(|(position, _)| self.keeps(*position as u32))
            .map(|(_, frame)| frame)
            .collect();
        Self::non_empty(sampled)
    }

    /// A still image is its own sample set, whatever the interval
    pub fn sample_image(&self, frame: Frame) -> Vec<Frame> {
        vec![frame]
    }

    /// Reject an empty sample set
    pub fn non_empty(frames: Vec<Frame>) -> Result<Vec<Frame>, MediaError> {
        if frames.is_empty() {
            Err(MediaError::NoFramesSampled)
        } else {
            Ok(frames)
        }
    }
}
