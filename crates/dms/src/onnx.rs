//! ONNX Runtime backend for YOLOv8 behavior models

use media::Frame;
use ndarray::{Array4, ArrayViewD, Axis, Ix2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use tracing::{debug, error, info};

use crate::detector::{BoundingBox, Candidate, Detector};
use crate::{BehaviorClass, DetectorConfig, DmsError};

/// YOLOv8 detector running on ONNX Runtime
pub struct OnnxDetector {
    session: Session,
    input_name: String,
    output_name: String,
    input_size: u32,
    candidate_floor: f32,
    iou_threshold: f32,
}

impl OnnxDetector {
    /// Load the model named in the configuration
    pub fn load(config: &DetectorConfig) -> Result<Self, DmsError> {
        let path = config
            .model_path
            .as_deref()
            .ok_or_else(|| DmsError::Config("model_path is not set".into()))?;

        info!("Loading behavior model from {}", path);
        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| {
                error!("Failed to load behavior model: {}", e);
                DmsError::ModelLoad(e.to_string())
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| DmsError::ModelLoad("model declares no inputs".into()))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| DmsError::ModelLoad("model declares no outputs".into()))?;

        Ok(Self {
            session,
            input_name,
            output_name,
            input_size: config.input_size,
            candidate_floor: config.candidate_floor,
            iou_threshold: config.iou_threshold,
        })
    }

    /// NCHW tensor scaled to [0, 1]
    fn preprocess(&self, frame: &Frame) -> Result<Array4<f32>, DmsError> {
        if frame.width != self.input_size || frame.height != self.input_size {
            return Err(DmsError::ImageProcessing(format!(
                "expected {0}x{0} frame, got {1}x{2}",
                self.input_size, frame.width, frame.height
            )));
        }

        let size = self.input_size as usize;
        let mut input = Array4::<f32>::zeros((1, 3, size, size));
        for (i, pixel) in frame.data.chunks_exact(3).enumerate() {
            let (y, x) = (i / size, i % size);
            if y >= size {
                break;
            }
            input[[0, 0, y, x]] = pixel[0] as f32 / 255.0;
            input[[0, 1, y, x]] = pixel[1] as f32 / 255.0;
            input[[0, 2, y, x]] = pixel[2] as f32 / 255.0;
        }
        Ok(input)
    }
}

impl Detector for OnnxDetector {
    fn infer(&self, frame: &Frame) -> Result<Vec<Candidate>, DmsError> {
        let input = self.preprocess(frame)?;

        let inputs = ort::inputs![self.input_name.as_str() => input.view()]
            .map_err(|e| DmsError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| DmsError::Inference(e.to_string()))?;
        let output = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| DmsError::Inference(e.to_string()))?;

        let candidates = decode_yolov8(output.view(), self.candidate_floor, self.input_size as f32)?;
        let kept = non_max_suppression(candidates, self.iou_threshold);
        debug!("Frame {}: {} candidates after NMS", frame.index, kept.len());
        Ok(kept)
    }

    fn name(&self) -> &str {
        "yolov8-onnx"
    }
}

/// Decode a `[1, 4 + classes, anchors]` YOLOv8 head.
///
/// Each anchor contributes its best-scoring class when that score reaches
/// `floor`. Transposed `[1, anchors, 4 + classes]` exports are accepted too.
pub fn decode_yolov8(
    output: ArrayViewD<'_, f32>,
    floor: f32,
    limit: f32,
) -> Result<Vec<Candidate>, DmsError> {
    let shape = output.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(DmsError::Inference(format!(
            "unexpected output shape {:?}",
            shape
        )));
    }

    let rows = output
        .index_axis(Axis(0), 0)
        .into_dimensionality::<Ix2>()
        .map_err(|e| DmsError::Inference(e.to_string()))?;
    // Attributes run along the shorter axis
    let rows = if shape[1] > shape[2] {
        rows.reversed_axes()
    } else {
        rows
    };
    let (attributes, anchors) = (rows.shape()[0], rows.shape()[1]);
    if attributes < 5 {
        return Err(DmsError::Inference(format!(
            "output has {} attributes, need box + at least one class",
            attributes
        )));
    }

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (best, score) = (4..attributes)
            .map(|row| (row - 4, rows[[row, anchor]]))
            .fold((0, f32::MIN), |acc, cur| if cur.1 > acc.1 { cur } else { acc });

        if score < floor {
            continue;
        }
        let Some(class) = BehaviorClass::from_index(best) else {
            continue;
        };

        candidates.push(Candidate {
            class,
            confidence: score.clamp(0.0, 1.0),
            bbox: BoundingBox::from_center(
                rows[[0, anchor]],
                rows[[1, anchor]],
                rows[[2, anchor]],
                rows[[3, anchor]],
                limit,
            ),
        });
    }
    Ok(candidates)
}

/// Greedy class-agnostic non-maximum suppression
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep
            .iter()
            .all(|kept| kept.bbox.iou(&candidate.bbox) <= iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn candidate(confidence: f32, bbox: [f32; 4]) -> Candidate {
        Candidate {
            class: BehaviorClass::Texting,
            confidence,
            bbox: BoundingBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
        }
    }

    #[test]
    fn test_nms() {
        let kept = non_max_suppression(
            vec![
                candidate(0.72, [100.0, 100.0, 210.0, 210.0]),
                candidate(0.8, [250.0, 250.0, 420.0, 420.0]),
                candidate(0.92, [220.0, 220.0, 320.0, 330.0]),
                candidate(0.6, [100.0, 100.0, 210.0, 210.0]),
            ],
            0.3,
        );
        let scores: Vec<f32> = kept.iter().map(|c| c.confidence).collect();
        assert_eq!(scores, vec![0.92, 0.8, 0.72]);
    }

    #[test]
    fn test_decode_picks_best_class_per_anchor() {
        // 4 box rows + 8 class rows, 16 anchors (only the first three populated)
        let mut head = Array3::<f32>::zeros((1, 12, 16));
        for anchor in 0..3 {
            head[[0, 0, anchor]] = 320.0;
            head[[0, 1, anchor]] = 320.0;
            head[[0, 2, anchor]] = 100.0;
            head[[0, 3, anchor]] = 50.0;
        }
        head[[0, 4 + 1, 0]] = 0.8; // Texting
        head[[0, 4 + 3, 1]] = 0.6; // Drinking
        head[[0, 4 + 5, 2]] = 0.1; // Smoking, below floor

        let candidates = decode_yolov8(head.view().into_dyn(), 0.25, 640.0).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].class, BehaviorClass::Texting);
        assert_eq!(candidates[1].class, BehaviorClass::Drinking);
        assert_eq!(candidates[0].bbox, BoundingBox::new(270.0, 295.0, 370.0, 345.0));
    }

    #[test]
    fn test_decode_transposed_head() {
        let mut head = Array3::<f32>::zeros((1, 20, 12));
        head[[0, 7, 0]] = 10.0;
        head[[0, 7, 1]] = 10.0;
        head[[0, 7, 2]] = 40.0;
        head[[0, 7, 3]] = 40.0;
        head[[0, 7, 4 + 6]] = 0.7; // Operating Radio

        let candidates = decode_yolov8(head.view().into_dyn(), 0.25, 640.0).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].class, BehaviorClass::OperatingRadio);
        // Clamped at the image edge
        assert_eq!(candidates[0].bbox.x1, 0.0);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let head = Array3::<f32>::zeros((2, 12, 3));
        assert!(decode_yolov8(head.view().into_dyn(), 0.25, 640.0).is_err());
    }
}
