//! Best-effort JSON extraction from model replies

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

/// Reply could not be read as the expected JSON object
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Malformed model output: {0}")]
pub struct MalformedOutput(pub String);

/// Remove markdown code fences (```json and ```) anywhere in the reply
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Outermost `{ ... }` span, for replies that wrap the object in prose
fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a model reply as `T`.
///
/// Fences are stripped first and the reply is parsed strictly; if that fails
/// and the reply carries extra text around an object, the object alone is
/// tried. Nothing else is repaired.
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, MalformedOutput> {
    let cleaned = strip_code_fences(raw);

    match serde_json::from_str(&cleaned) {
        Ok(value) => Ok(value),
        Err(strict) => match outermost_object(&cleaned) {
            Some(object) if object.len() < cleaned.len() => {
                debug!("Retrying parse on embedded object after: {}", strict);
                serde_json::from_str(object).map_err(|e| MalformedOutput(e.to_string()))
            }
            _ => Err(MalformedOutput(strict.to_string())),
        },
    }
}
