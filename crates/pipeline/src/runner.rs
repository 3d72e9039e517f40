//! Request orchestration

use std::time::Instant;

use dms::{BehaviorDetector, Detection};
use genai::InlineImage;
use media::{Frame, MediaAsset, MediaNormalizer};
use report::{
    AnalysisOutcome, AnalysisResult, DrowsinessAnalyzer, ElaborationStatus, ReportSynthesizer,
    SafetyReport,
};
use tracing::{info, warn};

use crate::metrics;
use crate::{Aggregator, ForwardedDetection, PipelineError};

const ENTRY_DETECT: &str = "detect";
const ENTRY_DETECTIONS: &str = "detections";
const ENTRY_ANALYSIS: &str = "analysis";

/// Per-request statistics
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    pub frames_sampled: usize,
    pub detections: usize,
    pub analysis_degraded: bool,
    pub elaboration: ElaborationStatus,
    pub elapsed_ms: u64,
}

/// Report plus how it was produced
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub report: SafetyReport,
    pub stats: RunStats,
}

/// The full detection-to-report pipeline.
///
/// Shared across requests; every stage is read-only.
pub struct Pipeline {
    normalizer: MediaNormalizer,
    detector: BehaviorDetector,
    analyzer: DrowsinessAnalyzer,
    synthesizer: ReportSynthesizer,
}

impl Pipeline {
    pub fn new(
        normalizer: MediaNormalizer,
        detector: BehaviorDetector,
        analyzer: DrowsinessAnalyzer,
        synthesizer: ReportSynthesizer,
    ) -> Self {
        info!(
            "Pipeline ready: model {}, threshold {}, skip {}",
            detector.model_name(),
            detector.threshold(),
            normalizer.sampler().skip()
        );
        Self {
            normalizer,
            detector,
            analyzer,
            synthesizer,
        }
    }

    /// Validate an upload and run it through the pipeline
    pub async fn process(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<PipelineOutput, PipelineError> {
        match MediaAsset::new(filename, bytes) {
            Ok(asset) => self.run(asset).await,
            Err(e) => {
                metrics::record_request(ENTRY_DETECT, "rejected");
                Err(e.into())
            }
        }
    }

    /// Normalize, sample, detect, aggregate, analyze and synthesize
    pub async fn run(&self, asset: MediaAsset) -> Result<PipelineOutput, PipelineError> {
        let start = Instant::now();
        let result = self.run_inner(&asset, start).await;
        finish(ENTRY_DETECT, start, &result);
        result
    }

    async fn run_inner(
        &self,
        asset: &MediaAsset,
        start: Instant,
    ) -> Result<PipelineOutput, PipelineError> {
        info!(
            "Processing {} ({:?}, {} bytes)",
            asset.filename(),
            asset.kind(),
            asset.size_bytes()
        );
        let (frames, per_frame) = self.sample_and_detect(asset).await?;
        let aggregate = Aggregator::aggregate(&frames, per_frame)?;
        let counts = (frames.len(), aggregate.detections.len());
        drop(frames);

        let labels = aggregate.labels();
        let image = InlineImage::jpeg(aggregate.representative_image);
        let outcome = self.analyzer.analyze(&image).await;
        Ok(self.synthesize(labels, outcome, counts, start).await)
    }

    /// Detection stage only, in the wire form the analysis entry point accepts
    pub async fn detect(&self, asset: MediaAsset) -> Result<Vec<ForwardedDetection>, PipelineError> {
        let start = Instant::now();
        let result: Result<Vec<ForwardedDetection>, PipelineError> = async {
            let (frames, per_frame) = self.sample_and_detect(&asset).await?;
            Aggregator::forwarded(&frames, &per_frame)
        }
        .await;

        metrics::record_request(ENTRY_DETECTIONS, outcome_label(&result));
        metrics::record_duration(ENTRY_DETECTIONS, elapsed_ms(start));
        result
    }

    /// Build a report from detections produced elsewhere.
    ///
    /// The first entry's image is the representative frame.
    pub async fn analyze_forwarded(
        &self,
        detections: Vec<ForwardedDetection>,
    ) -> Result<PipelineOutput, PipelineError> {
        let start = Instant::now();
        let result = self.analyze_forwarded_inner(detections, start).await;
        finish(ENTRY_ANALYSIS, start, &result);
        result
    }

    async fn analyze_forwarded_inner(
        &self,
        detections: Vec<ForwardedDetection>,
        start: Instant,
    ) -> Result<PipelineOutput, PipelineError> {
        let first = detections.first().ok_or(PipelineError::NoDetections)?;
        info!("Analyzing {} forwarded detections", detections.len());

        let outcome = if first.image.is_empty() {
            warn!("First forwarded detection carries no image, skipping analysis");
            AnalysisOutcome::Degraded(AnalysisResult::degraded())
        } else {
            self.analyzer
                .analyze(&InlineImage::jpeg(first.image.clone()))
                .await
        };

        let labels: Vec<String> = detections.into_iter().map(|d| d.class).collect();
        let count = labels.len();
        Ok(self.synthesize(labels, outcome, (0, count), start).await)
    }

    async fn sample_and_detect(
        &self,
        asset: &MediaAsset,
    ) -> Result<(Vec<Frame>, Vec<Vec<Detection>>), PipelineError> {
        let frames = self.normalizer.extract_frames(asset).await?;
        metrics::record_frames_sampled(frames.len());

        let detector = self.detector.clone();
        let (frames, per_frame) = tokio::task::spawn_blocking(move || {
            let per_frame = detector.detect_all(&frames);
            (frames, per_frame)
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?;

        let retained: usize = per_frame.iter().map(Vec::len).sum();
        info!(
            "Detected {} behaviors across {} sampled frames",
            retained,
            frames.len()
        );
        metrics::record_detections(per_frame.iter().flatten().map(|d| d.class.as_str()));
        Ok((frames, per_frame))
    }

    async fn synthesize(
        &self,
        labels: Vec<String>,
        outcome: AnalysisOutcome,
        (frames_sampled, detections): (usize, usize),
        start: Instant,
    ) -> PipelineOutput {
        let analysis_degraded = outcome.is_degraded();
        if analysis_degraded {
            metrics::record_degraded("analysis");
        }

        let synthesis = self
            .synthesizer
            .synthesize(labels, outcome.result())
            .await;
        if synthesis.elaboration == ElaborationStatus::Failed {
            metrics::record_degraded("elaboration");
        }

        PipelineOutput {
            report: synthesis.report,
            stats: RunStats {
                frames_sampled,
                detections,
                analysis_degraded,
                elaboration: synthesis.elaboration,
                elapsed_ms: elapsed_ms(start),
            },
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn outcome_label<T>(result: &Result<T, PipelineError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) if e.is_client_error() => "rejected",
        Err(_) => "error",
    }
}

fn finish(entry: &'static str, start: Instant, result: &Result<PipelineOutput, PipelineError>) {
    metrics::record_request(entry, outcome_label(result));
    metrics::record_duration(entry, elapsed_ms(start));
    if let Ok(output) = result {
        info!(
            "Report ready in {} ms: {} frames, {} detections, analysis degraded: {}, elaboration: {:?}",
            output.stats.elapsed_ms,
            output.stats.frames_sampled,
            output.stats.detections,
            output.stats.analysis_degraded,
            output.stats.elaboration
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dms::{BehaviorClass, BoundingBox, Candidate, Detector, DmsError};
    use genai::{GenAiError, GenerationOptions, TextService};
    use media::{FrameSampler, MediaConfig, MediaError, VideoDecoder};
    use report::{ReportConfig, Score};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Emits `total` tiny frames, keeping those the sampler selects
    struct SyntheticVideo {
        total: u32,
    }

    #[async_trait]
    impl VideoDecoder for SyntheticVideo {
        async fn decode(
            &self,
            _path: &Path,
            sampler: &FrameSampler,
        ) -> Result<Vec<Frame>, MediaError> {
            Ok((0..self.total)
                .filter(|i| sampler.keeps(*i))
                .map(|i| Frame::new(vec![(i % 256) as u8; 2 * 2 * 3], 2, 2, i, 0))
                .collect())
        }
    }

    /// Reports Texting at 0.8 on one frame and low-confidence noise elsewhere
    struct TextingOnFrame {
        frame: u32,
        calls: AtomicUsize,
    }

    impl Detector for TextingOnFrame {
        fn infer(&self, frame: &Frame) -> Result<Vec<Candidate>, DmsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (class, confidence) = if frame.index == self.frame {
                (BehaviorClass::Texting, 0.8)
            } else {
                (BehaviorClass::Eating, 0.3)
            };
            Ok(vec![Candidate {
                class,
                confidence,
                bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            }])
        }
    }

    /// Text service with fixed replies for the analysis and elaboration calls
    struct ScriptedService {
        analysis: Option<String>,
        elaboration: Option<String>,
        images: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedService {
        fn new(analysis: Option<&str>, elaboration: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                analysis: analysis.map(str::to_string),
                elaboration: elaboration.map(str::to_string),
                images: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.images.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TextService for ScriptedService {
        async fn generate(
            &self,
            _prompt: &str,
            image: Option<&genai::InlineImage>,
            _options: &GenerationOptions,
        ) -> Result<String, GenAiError> {
            self.images
                .lock()
                .unwrap()
                .push(image.map(|i| i.data.clone()));
            let reply = if image.is_some() {
                &self.analysis
            } else {
                &self.elaboration
            };
            reply.clone().ok_or(GenAiError::Status {
                status: 500,
                body: "internal".into(),
            })
        }
    }

    struct Harness {
        pipeline: Pipeline,
        detector: Arc<TextingOnFrame>,
        service: Arc<ScriptedService>,
    }

    fn harness(total_frames: u32, service: Arc<ScriptedService>, elaborate: bool) -> Harness {
        let detector = Arc::new(TextingOnFrame {
            frame: 40,
            calls: AtomicUsize::new(0),
        });
        let normalizer = MediaNormalizer::with_decoder(
            MediaConfig::default(),
            Arc::new(SyntheticVideo {
                total: total_frames,
            }),
        );
        let pipeline = Pipeline::new(
            normalizer,
            BehaviorDetector::with_threshold(detector.clone(), 0.5),
            DrowsinessAnalyzer::new(service.clone()),
            ReportSynthesizer::new(service.clone(), ReportConfig { elaborate }),
        );
        Harness {
            pipeline,
            detector,
            service,
        }
    }

    #[tokio::test]
    async fn test_video_with_failing_service_reports_detector_labels() {
        let h = harness(90, ScriptedService::new(None, None), true);

        let output = h.pipeline.process("trip.mp4", vec![0; 32]).await.unwrap();
        let report = &output.report;

        assert_eq!(report.abnormality.detected_behaviors(), ["Texting".to_string()]);
        assert_eq!(report.drowsiness.score, Score::NotAvailable);
        assert_eq!(report.emotional_state.emotion, "N/A");
        assert_eq!(output.stats.frames_sampled, 9);
        assert_eq!(output.stats.detections, 1);
        assert!(output.stats.analysis_degraded);
        assert_eq!(output.stats.elaboration, ElaborationStatus::Failed);
        assert_eq!(h.detector.calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_analysis_uses_first_sampled_frame() {
        let h = harness(
            90,
            ScriptedService::new(
                Some("{\"drowsiness_score\": 3, \"emotional_state\": \"Tired\"}"),
                None,
            ),
            false,
        );

        let output = h.pipeline.process("trip.avi", vec![0; 32]).await.unwrap();
        assert_eq!(output.report.drowsiness.score, Score::Value(3));
        assert_eq!(output.report.emotional_state.emotion, "Tired");
        assert_eq!(output.stats.elaboration, ElaborationStatus::Disabled);

        let images = h.service.images.lock().unwrap();
        assert_eq!(images.len(), 1);
        let first = Frame::new(vec![0; 2 * 2 * 3], 2, 2, 0, 0);
        assert_eq!(images[0], Some(first.encode_jpeg_base64().unwrap()));
    }

    #[tokio::test]
    async fn test_unsupported_format_makes_no_calls() {
        let h = harness(90, ScriptedService::new(None, None), true);

        let err = h.pipeline.process("trip.gif", vec![0; 32]).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Media(MediaError::UnsupportedFormat(_))
        ));
        assert!(err.is_client_error());
        assert_eq!(h.detector.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.service.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_video_is_rejected_before_detection() {
        let h = harness(0, ScriptedService::new(None, None), true);

        let err = h.pipeline.process("empty.mov", Vec::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Media(MediaError::NoFramesSampled)));
        assert_eq!(h.detector.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.service.calls(), 0);
    }

    #[tokio::test]
    async fn test_detect_returns_wire_form() {
        let h = harness(90, ScriptedService::new(None, None), true);
        let asset = MediaAsset::new("trip.mp4", vec![0; 32]).unwrap();

        let forwarded = h.pipeline.detect(asset).await.unwrap();
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded[0].class, "Texting");
        assert_eq!(forwarded[0].confidence, 0.8);
        assert!(!forwarded[0].image.is_empty());
        assert_eq!(h.service.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_forwarded_keeps_labels_verbatim() {
        let h = harness(
            0,
            ScriptedService::new(
                Some("```json\n{\"drowsiness_score\": 1, \"emotional_state\": \"Calm\"}\n```"),
                None,
            ),
            false,
        );
        let detections = vec![
            ForwardedDetection {
                class: "Texting".into(),
                confidence: 0.9,
                image: "Zmlyc3Q=".into(),
            },
            ForwardedDetection {
                class: "Texting".into(),
                confidence: 0.7,
                image: "c2Vjb25k".into(),
            },
            ForwardedDetection {
                class: "Drinking".into(),
                confidence: 0.6,
                image: "c2Vjb25k".into(),
            },
        ];

        let output = h.pipeline.analyze_forwarded(detections).await.unwrap();
        assert_eq!(
            output.report.abnormality.detected_behaviors(),
            ["Texting".to_string(), "Texting".to_string(), "Drinking".to_string()]
        );
        assert_eq!(output.report.drowsiness.score, Score::Value(1));
        assert_eq!(
            *h.service.images.lock().unwrap(),
            vec![Some("Zmlyc3Q=".to_string())]
        );
    }

    #[tokio::test]
    async fn test_analyze_forwarded_rejects_empty_list() {
        let h = harness(0, ScriptedService::new(None, None), true);
        let err = h.pipeline.analyze_forwarded(Vec::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoDetections));
        assert_eq!(h.service.calls(), 0);
    }

    #[tokio::test]
    async fn test_elaborated_report_keeps_detector_labels() {
        let elaboration = serde_json::json!({
            "drowsiness": { "score": 2, "analysis": ["Alert"] },
            "emotional_state": { "score": 1, "analysis": ["Calm"] },
            "abnormality": { "score": 4, "analysis": ["Phone in hand"] },
            "overall_score": 65,
            "recommendations": ["Use hands-free mode"]
        })
        .to_string();
        let h = harness(
            90,
            ScriptedService::new(
                Some("{\"drowsiness_score\": 0, \"emotional_state\": \"Happy\"}"),
                Some(&elaboration),
            ),
            true,
        );

        let output = h.pipeline.process("trip.mp4", vec![0; 32]).await.unwrap();
        assert_eq!(output.stats.elaboration, ElaborationStatus::Applied);
        assert_eq!(
            output.report.abnormality.detected_behaviors(),
            ["Texting".to_string()]
        );
        assert_eq!(output.report.drowsiness.score, Score::Value(0));
        assert_eq!(output.report.emotional_state.emotion, "Happy");
        assert_eq!(output.report.overall_score, Some(65));
    }
}
