//! Report generation from forwarded detections

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use pipeline::ForwardedDetection;
use report::SafetyReport;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::AppState;

/// Body of `POST /api/v1/process-analysis`, also returned by `/api/v1/detections`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub detections: Vec<ForwardedDetection>,
}

pub async fn process_analysis(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<SafetyReport>, ApiError> {
    let Json(request) = body?;
    let output = state.pipeline.analyze_forwarded(request.detections).await?;
    Ok(Json(output.report))
}
