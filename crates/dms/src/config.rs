//! Detector configuration

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Detections must score strictly above this to be retained
    pub confidence_threshold: f32,

    /// Minimum score for a raw candidate to enter NMS
    pub candidate_floor: f32,

    /// Overlap above which the weaker of two boxes is suppressed
    pub iou_threshold: f32,

    /// Square model input size (pixels)
    pub input_size: u32,

    /// ONNX model path
    pub model_path: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            candidate_floor: 0.25,
            iou_threshold: 0.45,
            input_size: 640,
            model_path: None,
        }
    }
}

impl DetectorConfig {
    /// Check threshold ranges
    pub fn validate(&self) -> Result<(), DmsError> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("candidate_floor", self.candidate_floor),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DmsError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.input_size == 0 {
            return Err(DmsError::Config("input_size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.input_size, 640);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_threshold() {
        let config = DetectorConfig {
            confidence_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DmsError::Config(_))));
    }
}
