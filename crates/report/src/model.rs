//! Report data model

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder for a value the generative service could not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Axis scores run 0-5
pub const MAX_AXIS_SCORE: u8 = 5;

/// Overall score runs 0-100
pub const MAX_OVERALL_SCORE: u8 = 100;

/// A 0-5 score, or "N/A" when unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Score {
    Value(u8),
    #[default]
    NotAvailable,
}

impl Score {
    /// Keep the score only if it does not exceed `max`
    pub fn within(self, max: u8) -> Self {
        match self {
            Score::Value(v) if v <= max => self,
            _ => Score::NotAvailable,
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Score::Value(v) => serializer.serialize_u8(*v),
            Score::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

/// Lenient: whole numbers (or numeric strings) in u8 range, anything else is N/A
impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Score::from_json(&raw))
    }
}

impl Score {
    /// Interpret an arbitrary JSON value as a score
    pub fn from_json(raw: &serde_json::Value) -> Self {
        let number = match raw {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match number {
            Some(n) if n.fract() == 0.0 && (0.0..=u8::MAX as f64).contains(&n) => {
                Score::Value(n as u8)
            }
            _ => Score::NotAvailable,
        }
    }
}

/// Drowsiness/emotion scoring of the representative frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub drowsiness_score: Score,
    pub emotional_state: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analysis: Vec<String>,
}

impl AnalysisResult {
    /// Safe default used whenever the remote stage fails
    pub fn degraded() -> Self {
        Self {
            drowsiness_score: Score::NotAvailable,
            emotional_state: NOT_AVAILABLE.to_string(),
            analysis: Vec::new(),
        }
    }
}

/// Analyzer outcome. Both variants carry a usable result.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Parsed(AnalysisResult),
    Degraded(AnalysisResult),
}

impl AnalysisOutcome {
    pub fn result(&self) -> &AnalysisResult {
        match self {
            AnalysisOutcome::Parsed(result) | AnalysisOutcome::Degraded(result) => result,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, AnalysisOutcome::Degraded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrowsinessSection {
    pub score: Score,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analysis: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalStateSection {
    pub emotion: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analysis: Vec<String>,
}

/// Detector-sourced behaviors plus optional elaboration.
///
/// `detected_behaviors` is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalitySection {
    detected_behaviors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub analysis: Vec<String>,
}

impl AbnormalitySection {
    pub fn new(detected_behaviors: Vec<String>) -> Self {
        Self {
            detected_behaviors,
            score: None,
            analysis: Vec::new(),
        }
    }

    pub fn detected_behaviors(&self) -> &[String] {
        &self.detected_behaviors
    }
}

/// Final per-request report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyReport {
    #[serde(rename = "Drowsiness")]
    pub drowsiness: DrowsinessSection,

    #[serde(rename = "EmotionalState")]
    pub emotional_state: EmotionalStateSection,

    #[serde(rename = "Abnormality")]
    pub abnormality: AbnormalitySection,

    #[serde(rename = "OverallScore", default, skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<u8>,

    #[serde(rename = "Recommendations", default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
}

/// One axis of an elaborated report
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AxisAssessment {
    pub score: u8,
    #[serde(default)]
    pub analysis: Vec<String>,
}

/// Reply schema of the elaboration call
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Elaboration {
    #[serde(alias = "Drowsiness")]
    pub drowsiness: AxisAssessment,

    #[serde(
        alias = "EmotionalState",
        alias = "emotional_states",
        alias = "Emotional_states"
    )]
    pub emotional_state: AxisAssessment,

    #[serde(alias = "Abnormality")]
    pub abnormality: AxisAssessment,

    #[serde(alias = "OverallScore")]
    pub overall_score: u8,

    #[serde(default, alias = "Recommendations")]
    pub recommendations: Vec<String>,
}

impl Elaboration {
    /// Check score ranges
    pub fn validate(&self) -> Result<(), String> {
        for (axis, assessment) in [
            ("drowsiness", &self.drowsiness),
            ("emotional_state", &self.emotional_state),
            ("abnormality", &self.abnormality),
        ] {
            if assessment.score > MAX_AXIS_SCORE {
                return Err(format!(
                    "{} score {} exceeds {}",
                    axis, assessment.score, MAX_AXIS_SCORE
                ));
            }
        }
        if self.overall_score > MAX_OVERALL_SCORE {
            return Err(format!(
                "overall score {} exceeds {}",
                self.overall_score, MAX_OVERALL_SCORE
            ));
        }
        Ok(())
    }
}
