//! Behavior detection with a hard confidence threshold

use std::sync::Arc;

use media::Frame;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{BehaviorClass, DetectorConfig, DmsError};

/// Bounding box corners in working-resolution pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from a center/size box, clamped to `[0, limit]`
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32, limit: f32) -> Self {
        Self {
            x1: (cx - w / 2.0).clamp(0.0, limit),
            y1: (cy - h / 2.0).clamp(0.0, limit),
            x2: (cx + w / 2.0).clamp(0.0, limit),
            y2: (cy + h / 2.0).clamp(0.0, limit),
        }
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Raw model output before thresholding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub class: BehaviorClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Retained detection, tied to the frame it came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: BehaviorClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub frame_index: u32,
}

/// Opaque behavior model.
///
/// Implementations are shared read-only across requests.
pub trait Detector: Send + Sync {
    /// Run inference once on a frame
    fn infer(&self, frame: &Frame) -> Result<Vec<Candidate>, DmsError>;

    fn name(&self) -> &str {
        "detector"
    }
}

/// Model that never reports anything, used when no model is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDetector;

impl Detector for NoopDetector {
    fn infer(&self, _frame: &Frame) -> Result<Vec<Candidate>, DmsError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Applies the confidence threshold to a model, frame by frame
#[derive(Clone)]
pub struct BehaviorDetector {
    model: Arc<dyn Detector>,
    confidence_threshold: f32,
}

impl BehaviorDetector {
    pub fn new(model: Arc<dyn Detector>, config: &DetectorConfig) -> Self {
        Self::with_threshold(model, config.confidence_threshold)
    }

    pub fn with_threshold(model: Arc<dyn Detector>, confidence_threshold: f32) -> Self {
        Self {
            model,
            confidence_threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Detect behaviors in one frame.
    ///
    /// An inference failure yields no detections for this frame only.
    pub fn detect(&self, frame: &Frame) -> Vec<Detection> {
        match self.model.infer(frame) {
            Ok(candidates) => {
                let total = candidates.len();
                let kept = retain_above(candidates, self.confidence_threshold, frame.index);
                debug!(
                    "Frame {}: {} candidates, {} above {}",
                    frame.index,
                    total,
                    kept.len(),
                    self.confidence_threshold
                );
                kept
            }
            Err(e) => {
                warn!("Skipping frame {}: {}", frame.index, e);
                Vec::new()
            }
        }
    }

    /// Detect behaviors in each frame, sequentially and in order
    pub fn detect_all(&self, frames: &[Frame]) -> Vec<Vec<Detection>> {
        frames.iter().map(|frame| self.detect(frame)).collect()
    }
}

/// Keep candidates scoring strictly above `threshold`
pub fn retain_above(candidates: Vec<Candidate>, threshold: f32, frame_index: u32) -> Vec<Detection> {
    candidates
        .into_iter()
        .filter(|c| c.confidence > threshold)
        .map(|c| Detection {
            class: c.class,
            confidence: c.confidence,
            bbox: c.bbox,
            frame_index,
        })
        .collect()
}
