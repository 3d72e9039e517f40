//! Pipeline metrics

use metrics::{counter, histogram};

/// Metric names
pub mod names {
    pub const REQUESTS_TOTAL: &str = "drivesafe_requests_total";
    pub const FRAMES_SAMPLED_TOTAL: &str = "drivesafe_frames_sampled_total";
    pub const DETECTIONS_TOTAL: &str = "drivesafe_detections_total";
    pub const DEGRADED_TOTAL: &str = "drivesafe_degraded_total";
    pub const PIPELINE_DURATION_MS: &str = "drivesafe_pipeline_duration_ms";
}

/// Record one finished request by entry point and outcome
pub fn record_request(entry: &'static str, outcome: &'static str) {
    counter!(names::REQUESTS_TOTAL, "entry" => entry, "outcome" => outcome).increment(1);
}

pub fn record_frames_sampled(count: usize) {
    counter!(names::FRAMES_SAMPLED_TOTAL).increment(count as u64);
}

/// Record retained detections per behavior label
pub fn record_detections<'a>(labels: impl IntoIterator<Item = &'a str>) {
    for label in labels {
        counter!(names::DETECTIONS_TOTAL, "class" => label.to_string()).increment(1);
    }
}

/// Record a stage that fell back to its degraded result
pub fn record_degraded(stage: &'static str) {
    counter!(names::DEGRADED_TOTAL, "stage" => stage).increment(1);
}

pub fn record_duration(entry: &'static str, elapsed_ms: u64) {
    histogram!(names::PIPELINE_DURATION_MS, "entry" => entry).record(elapsed_ms as f64);
}
