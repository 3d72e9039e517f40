//! Drowsiness/emotion scoring of the representative frame

use std::sync::Arc;

use genai::{parse_model_json, GenerationOptions, InlineImage, MalformedOutput, TextService};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::model::{AnalysisOutcome, AnalysisResult, Score, MAX_AXIS_SCORE, NOT_AVAILABLE};
use crate::prompt::ANALYSIS_PROMPT;

/// Asks the generative service for a drowsiness score and emotion label
#[derive(Clone)]
pub struct DrowsinessAnalyzer {
    service: Arc<dyn TextService>,
}

impl DrowsinessAnalyzer {
    pub fn new(service: Arc<dyn TextService>) -> Self {
        Self { service }
    }

    /// Score one frame. Never fails: remote or parse failures degrade to N/A.
    pub async fn analyze(&self, image: &InlineImage) -> AnalysisOutcome {
        let reply = match self
            .service
            .generate(ANALYSIS_PROMPT, Some(image), &GenerationOptions::default())
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Drowsiness analysis unavailable: {}", e);
                return AnalysisOutcome::Degraded(AnalysisResult::degraded());
            }
        };
        debug!("Analyzer reply: {}", reply);

        match Self::parse_reply(&reply) {
            Ok(result) => {
                info!(
                    "Analysis: drowsiness {:?}, emotion {}",
                    result.drowsiness_score, result.emotional_state
                );
                AnalysisOutcome::Parsed(result)
            }
            Err(e) => {
                warn!("Discarding analyzer reply: {}", e);
                AnalysisOutcome::Degraded(AnalysisResult::degraded())
            }
        }
    }

    /// Read `{drowsiness_score, emotional_state}` from a model reply.
    ///
    /// Fields that are missing or out of range become N/A individually.
    pub fn parse_reply(raw: &str) -> Result<AnalysisResult, MalformedOutput> {
        let value: Value = parse_model_json(raw)?;
        let object = value
            .as_object()
            .ok_or_else(|| MalformedOutput(format!("expected a JSON object, got {}", value)))?;

        let drowsiness_score = object
            .get("drowsiness_score")
            .map_or(Score::NotAvailable, Score::from_json)
            .within(MAX_AXIS_SCORE);

        let emotional_state = object
            .get("emotional_state")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(NOT_AVAILABLE)
            .to_string();

        let analysis = match object.get("analysis") {
            Some(Value::String(line)) => vec![line.clone()],
            Some(Value::Array(lines)) => lines
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Ok(AnalysisResult {
            drowsiness_score,
            emotional_state,
            analysis,
        })
    }
}
