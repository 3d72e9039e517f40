//! Cross-stage aggregation of per-frame detections

use dms::Detection;
use media::Frame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::PipelineError;

/// Detection in the form exchanged between the detection and analysis stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardedDetection {
    /// Behavior label, copied verbatim into the report
    pub class: String,
    #[serde(default)]
    pub confidence: f32,
    /// Base64 JPEG of the frame the detection came from
    #[serde(default)]
    pub image: String,
}

/// All detections of a request plus the frame sent for analysis
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub detections: Vec<Detection>,
    /// Base64 JPEG of the first sampled frame
    pub representative_image: String,
}

impl Aggregate {
    /// Detected labels in frame order, duplicates kept
    pub fn labels(&self) -> Vec<String> {
        self.detections
            .iter()
            .map(|d| d.class.as_str().to_string())
            .collect()
    }
}

/// Merges per-frame detector output. `per_frame[i]` belongs to `frames[i]`.
pub struct Aggregator;

impl Aggregator {
    /// Flatten detections in frame order and pick the representative frame.
    ///
    /// Zero detections is fine; only a missing or unencodable first frame fails.
    pub fn aggregate(
        frames: &[Frame],
        per_frame: Vec<Vec<Detection>>,
    ) -> Result<Aggregate, PipelineError> {
        let first = frames
            .first()
            .ok_or_else(|| PipelineError::NoDetectionInput("no sampled frames".into()))?;
        let representative_image = first
            .encode_jpeg_base64()
            .map_err(|e| PipelineError::NoDetectionInput(e.to_string()))?;

        let detections: Vec<Detection> = per_frame.into_iter().flatten().collect();
        debug!(
            "Aggregated {} detections over {} frames",
            detections.len(),
            frames.len()
        );

        Ok(Aggregate {
            detections,
            representative_image,
        })
    }

    /// Wire form of the detections; each frame with detections is encoded once
    pub fn forwarded(
        frames: &[Frame],
        per_frame: &[Vec<Detection>],
    ) -> Result<Vec<ForwardedDetection>, PipelineError> {
        let mut forwarded = Vec::new();
        for (frame, detections) in frames.iter().zip(per_frame) {
            if detections.is_empty() {
                continue;
            }
            let image = frame.encode_jpeg_base64()?;
            forwarded.extend(detections.iter().map(|d| ForwardedDetection {
                class: d.class.as_str().to_string(),
                confidence: d.confidence,
                image: image.clone(),
            }));
        }
        Ok(forwarded)
    }
}
