//! Liveness

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Fixed payload; touches neither the detector nor the remote service
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}
