//! Driver Monitoring System (DMS)
//!
//! Driver behavior detection over sampled cabin frames:
//! - Fixed set of eight behavior classes (texting, drinking, ...)
//! - Hard confidence threshold on every candidate
//! - Per-frame failure isolation
//! - ONNX Runtime backend for YOLOv8 exports

pub mod class;
pub mod config;
pub mod detector;
pub mod onnx;

pub use class::BehaviorClass;
pub use config::DetectorConfig;
pub use detector::{BehaviorDetector, BoundingBox, Candidate, Detection, Detector, NoopDetector};
pub use onnx::OnnxDetector;

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),
}
