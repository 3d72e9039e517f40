//! Safety report assembly and best-effort elaboration

use std::sync::Arc;

use genai::{parse_model_json, GenerationOptions, TextService};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{
    AbnormalitySection, AnalysisResult, DrowsinessSection, Elaboration, EmotionalStateSection,
    SafetyReport,
};
use crate::prompt::elaboration_prompt;
use crate::ReportError;

/// Report synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Ask the generative service for a full elaborated report
    pub elaborate: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { elaborate: true }
    }
}

/// What happened to the optional elaboration step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElaborationStatus {
    Disabled,
    Applied,
    Failed,
}

/// Synthesized report and how it was produced
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub report: SafetyReport,
    pub elaboration: ElaborationStatus,
}

/// Merges detector labels and analyzer output into a `SafetyReport`
#[derive(Clone)]
pub struct ReportSynthesizer {
    service: Arc<dyn TextService>,
    config: ReportConfig,
}

impl ReportSynthesizer {
    pub fn new(service: Arc<dyn TextService>, config: ReportConfig) -> Self {
        info!("Creating report synthesizer with config: {:?}", config);
        Self { service, config }
    }

    /// Report without elaboration
    pub fn base_report(detected_behaviors: Vec<String>, analysis: &AnalysisResult) -> SafetyReport {
        SafetyReport {
            drowsiness: DrowsinessSection {
                score: analysis.drowsiness_score,
                analysis: analysis.analysis.clone(),
            },
            emotional_state: EmotionalStateSection {
                emotion: analysis.emotional_state.clone(),
                score: None,
                analysis: Vec::new(),
            },
            abnormality: AbnormalitySection::new(detected_behaviors),
            overall_score: None,
            recommendations: Vec::new(),
        }
    }

    /// Build the report, elaborating when enabled.
    ///
    /// Elaboration failures fall back to the base report.
    pub async fn synthesize(
        &self,
        detected_behaviors: Vec<String>,
        analysis: &AnalysisResult,
    ) -> Synthesis {
        if !self.config.elaborate {
            return Synthesis {
                report: Self::base_report(detected_behaviors, analysis),
                elaboration: ElaborationStatus::Disabled,
            };
        }

        match self.elaborate(&detected_behaviors, analysis).await {
            Ok(elaboration) => Synthesis {
                report: merge(Self::base_report(detected_behaviors, analysis), elaboration),
                elaboration: ElaborationStatus::Applied,
            },
            Err(e) => {
                warn!("Report elaboration failed, returning base report: {}", e);
                Synthesis {
                    report: Self::base_report(detected_behaviors, analysis),
                    elaboration: ElaborationStatus::Failed,
                }
            }
        }
    }

    async fn elaborate(
        &self,
        detected_behaviors: &[String],
        analysis: &AnalysisResult,
    ) -> Result<Elaboration, ReportError> {
        let prompt = elaboration_prompt(detected_behaviors, analysis);
        let reply = self
            .service
            .generate(&prompt, None, &GenerationOptions::structured())
            .await?;
        debug!("Elaboration reply: {}", reply);

        let elaboration: Elaboration = parse_model_json(&reply)?;
        elaboration.validate().map_err(ReportError::Schema)?;
        Ok(elaboration)
    }
}

/// Apply elaboration on top of the base report.
///
/// Drowsiness score and emotion stay as the analyzer produced them, N/A included.
fn merge(mut report: SafetyReport, elaboration: Elaboration) -> SafetyReport {
    report.drowsiness.analysis.extend(elaboration.drowsiness.analysis);

    report.emotional_state.score = Some(elaboration.emotional_state.score);
    report.emotional_state.analysis = elaboration.emotional_state.analysis;

    report.abnormality.score = Some(elaboration.abnormality.score);
    report.abnormality.analysis = elaboration.abnormality.analysis;

    report.overall_score = Some(elaboration.overall_score);
    report.recommendations = elaboration.recommendations;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Score;
    use async_trait::async_trait;
    use genai::{GenAiError, InlineImage};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedService {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl CannedService {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TextService for CannedService {
        async fn generate(
            &self,
            _prompt: &str,
            image: Option<&InlineImage>,
            options: &GenerationOptions,
        ) -> Result<String, GenAiError> {
            assert!(image.is_none());
            assert!(options.json_response);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .clone()
                .ok_or_else(|| GenAiError::Request("connection reset".into()))
        }
    }

    fn analysis(score: Score, emotion: &str) -> AnalysisResult {
        AnalysisResult {
            drowsiness_score: score,
            emotional_state: emotion.to_string(),
            analysis: Vec::new(),
        }
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn elaborated_reply() -> String {
        json!({
            "drowsiness": { "score": 4, "analysis": ["Heavy eyelids"] },
            "emotional_state": { "score": 2, "analysis": ["Anxious", "Tense grip"] },
            "abnormality": { "score": 5, "analysis": ["Phone use while driving"] },
            "overall_score": 41,
            "recommendations": ["Take a break", "Mount the phone"],
            "detected_behaviors": ["Eating"]
        })
        .to_string()
    }

    #[test]
    fn test_base_report_preserves_empty_list() {
        let report = ReportSynthesizer::base_report(Vec::new(), &AnalysisResult::degraded());
        assert!(report.abnormality.detected_behaviors().is_empty());
        assert_eq!(report.drowsiness.score, Score::NotAvailable);
        assert_eq!(report.emotional_state.emotion, "N/A");
    }

    #[test]
    fn test_base_report_preserves_duplicates_and_order() {
        let report = ReportSynthesizer::base_report(
            labels(&["Texting", "Drinking", "Texting"]),
            &analysis(Score::Value(1), "Calm"),
        );
        assert_eq!(
            report.abnormality.detected_behaviors(),
            labels(&["Texting", "Drinking", "Texting"]).as_slice()
        );
    }

    #[tokio::test]
    async fn test_disabled_elaboration_makes_no_call() {
        let service = CannedService::replying(&elaborated_reply());
        let synthesizer =
            ReportSynthesizer::new(service.clone(), ReportConfig { elaborate: false });

        let synthesis = synthesizer
            .synthesize(labels(&["Smoking"]), &analysis(Score::Value(0), "Happy"))
            .await;
        assert_eq!(synthesis.elaboration, ElaborationStatus::Disabled);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert!(synthesis.report.overall_score.is_none());
    }

    #[tokio::test]
    async fn test_elaboration_never_alters_detected_behaviors() {
        let synthesizer =
            ReportSynthesizer::new(CannedService::replying(&elaborated_reply()), ReportConfig::default());

        let synthesis = synthesizer
            .synthesize(
                labels(&["Texting", "Texting"]),
                &analysis(Score::Value(1), "Calm"),
            )
            .await;
        let report = synthesis.report;

        assert_eq!(synthesis.elaboration, ElaborationStatus::Applied);
        assert_eq!(
            report.abnormality.detected_behaviors(),
            labels(&["Texting", "Texting"]).as_slice()
        );
        // Analyzer values stay authoritative
        assert_eq!(report.drowsiness.score, Score::Value(1));
        assert_eq!(report.emotional_state.emotion, "Calm");
        assert_eq!(report.drowsiness.analysis, labels(&["Heavy eyelids"]));
        assert_eq!(report.abnormality.score, Some(5));
        assert_eq!(report.overall_score, Some(41));
        assert_eq!(report.recommendations.len(), 2);
    }

    #[tokio::test]
    async fn test_elaboration_keeps_degraded_analysis() {
        let reply = json!({
            "drowsiness": { "score": 5, "analysis": ["Eyes closing"] },
            "emotional_state": { "score": 4, "analysis": ["Angry"] },
            "abnormality": { "score": 1, "analysis": [] },
            "overall_score": 70,
            "recommendations": ["Pull over"]
        })
        .to_string();
        let synthesizer =
            ReportSynthesizer::new(CannedService::replying(&reply), ReportConfig::default());

        let synthesis = synthesizer
            .synthesize(Vec::new(), &AnalysisResult::degraded())
            .await;
        let report = synthesis.report;

        assert_eq!(synthesis.elaboration, ElaborationStatus::Applied);
        assert_eq!(report.drowsiness.score, Score::NotAvailable);
        assert_eq!(report.emotional_state.emotion, "N/A");
        assert_eq!(report.drowsiness.analysis, labels(&["Eyes closing"]));
        assert_eq!(report.emotional_state.score, Some(4));
        assert_eq!(report.overall_score, Some(70));
        assert!(report.abnormality.detected_behaviors().is_empty());
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_base_report() {
        let base = ReportSynthesizer::base_report(
            labels(&["Eating"]),
            &analysis(Score::Value(2), "Calm"),
        );

        let out_of_range = json!({
            "drowsiness": { "score": 2 },
            "emotional_state": { "score": 1 },
            "abnormality": { "score": 3 },
            "overall_score": 150
        })
        .to_string();

        for service in [
            CannedService::failing(),
            CannedService::replying("```json\n{bad json}\n```"),
            CannedService::replying(&out_of_range),
            CannedService::replying("{\"overall_score\": 80}"),
        ] {
            let synthesizer = ReportSynthesizer::new(service, ReportConfig::default());
            let synthesis = synthesizer
                .synthesize(labels(&["Eating"]), &analysis(Score::Value(2), "Calm"))
                .await;
            assert_eq!(synthesis.elaboration, ElaborationStatus::Failed);
            assert_eq!(synthesis.report, base);
        }
    }
}
