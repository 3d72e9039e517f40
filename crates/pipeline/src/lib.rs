//! Driver Safety Pipeline
//!
//! One request, start to finish: media normalization, frame sampling,
//! behavior detection, aggregation, drowsiness/emotion analysis and report
//! synthesis.

mod aggregator;
pub mod metrics;
mod runner;

pub use aggregator::{Aggregate, Aggregator, ForwardedDetection};
pub use runner::{Pipeline, PipelineOutput, RunStats};

use media::MediaError;
use thiserror::Error;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("No detections provided")]
    NoDetections,

    #[error("No detection input available: {0}")]
    NoDetectionInput(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Whether the request itself was at fault
    pub fn is_client_error(&self) -> bool {
        match self {
            PipelineError::Media(e) => e.is_client_error(),
            PipelineError::NoDetections => true,
            PipelineError::NoDetectionInput(_) | PipelineError::Task(_) => false,
        }
    }
}
