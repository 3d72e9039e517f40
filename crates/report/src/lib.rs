//! Safety Report
//!
//! Turns detector output and a representative frame into the final report:
//! - Drowsiness/emotion scoring of one frame by the generative service
//! - Base report assembly (detected behaviors copied verbatim)
//! - Best-effort elaboration into per-axis analysis, overall score and
//!   recommendations

mod analyzer;
mod model;
pub mod prompt;
mod synthesizer;

pub use analyzer::DrowsinessAnalyzer;
pub use model::{
    AbnormalitySection, AnalysisOutcome, AnalysisResult, AxisAssessment, DrowsinessSection,
    Elaboration, EmotionalStateSection, SafetyReport, Score, NOT_AVAILABLE,
};
pub use synthesizer::{ElaborationStatus, ReportConfig, ReportSynthesizer, Synthesis};

use genai::{GenAiError, MalformedOutput};
use thiserror::Error;

/// Report elaboration errors. Never surfaced past the synthesizer.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Remote service error: {0}")]
    Remote(#[from] GenAiError),

    #[error(transparent)]
    Malformed(#[from] MalformedOutput),

    #[error("Schema violation: {0}")]
    Schema(String),
}
