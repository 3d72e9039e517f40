//! Generative Text Service
//!
//! Access to a hosted generative model treated as an opaque
//! prompt-in/text-out service:
//! - `TextService` seam so callers can substitute deterministic fakes
//! - Gemini REST client (prompt, optional inline image, JSON mode)
//! - Tolerant extraction of JSON objects from free-form replies

pub mod gemini;
pub mod json;

pub use gemini::{GeminiClient, GeminiConfig};
pub use json::{parse_model_json, strip_code_fences, MalformedOutput};

use async_trait::async_trait;
use thiserror::Error;

/// Remote generation errors
#[derive(Error, Debug)]
pub enum GenAiError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Service returned no content")]
    EmptyResponse,

    #[error("Failed to decode service response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for GenAiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GenAiError::Decode(err.to_string())
        } else {
            GenAiError::Request(err.to_string())
        }
    }
}

/// Image attached inline to a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64-encoded image bytes
    pub data: String,
}

impl InlineImage {
    /// Base64 JPEG
    pub fn jpeg(data: impl Into<String>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            data: data.into(),
        }
    }
}

/// Per-call generation settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    /// Ask the service for a JSON-only reply
    pub json_response: bool,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

impl GenerationOptions {
    /// JSON-mode settings used for structured report generation
    pub fn structured() -> Self {
        Self {
            json_response: true,
            temperature: Some(0.7),
            top_p: Some(0.9),
            top_k: Some(40),
        }
    }
}

/// Opaque text generation service
#[async_trait]
pub trait TextService: Send + Sync {
    /// Generate a reply to `prompt`, optionally grounded on an image
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&InlineImage>,
        options: &GenerationOptions,
    ) -> Result<String, GenAiError>;
}
