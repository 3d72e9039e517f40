//! HTTP error mapping

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use media::MediaError;
use pipeline::PipelineError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Request-level errors, rendered as `{"error": "<message>"}`
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        ApiError::Pipeline(err.into())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(err: MultipartRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(err: JsonRejection) -> Self {
        ApiError::BadRequest(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            warn!("Request rejected: {}", message);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unsupported: ApiError = MediaError::UnsupportedFormat(".gif".into()).into();
        assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);
        assert_eq!(unsupported.to_string(), "Unsupported file format: .gif");

        let decode: ApiError = MediaError::Decode("truncated".into()).into();
        assert_eq!(decode.status(), StatusCode::BAD_REQUEST);

        let empty = ApiError::Pipeline(PipelineError::NoDetections);
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
        assert_eq!(empty.to_string(), "No detections provided");

        let decoder: ApiError = MediaError::DecoderUnavailable("ffmpeg".into()).into();
        assert_eq!(decoder.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let join = ApiError::Pipeline(PipelineError::Task("panicked".into()));
        assert_eq!(join.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
