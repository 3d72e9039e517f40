//! Media upload endpoints

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use media::{MediaAsset, MediaKind};
use report::SafetyReport;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::routes::analysis::AnalysisRequest;
use crate::AppState;

/// Full pipeline on one uploaded image or video
pub async fn detect(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SafetyReport>, ApiError> {
    let asset = read_upload(&mut multipart?).await?;
    let output = state.pipeline.run(asset).await?;
    Ok(Json(output.report))
}

/// Detection stage only; the response feeds `/api/v1/process-analysis`
pub async fn detections(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisRequest>, ApiError> {
    let asset = read_upload(&mut multipart?).await?;
    let detections = state.pipeline.detect(asset).await?;
    Ok(Json(AnalysisRequest { detections }))
}

/// First file field of the form, whatever its name.
///
/// The extension is checked before the body is read.
async fn read_upload(multipart: &mut Multipart) -> Result<MediaAsset, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            debug!("Skipping non-file field {:?}", field.name());
            continue;
        };
        MediaKind::from_filename(&filename)?;

        let bytes = field.bytes().await?;
        info!("Received upload {} ({} bytes)", filename, bytes.len());
        return Ok(MediaAsset::new(filename, bytes.to_vec())?);
    }
    Err(ApiError::BadRequest("No file provided".into()))
}
