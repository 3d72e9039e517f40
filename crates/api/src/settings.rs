//! Layered settings: config files, environment, `.env`

use std::env;

use config::{Config, ConfigError, Environment, File};
use dms::DetectorConfig;
use genai::GeminiConfig;
use media::{MediaConfig, FRAME_SIZE};
use report::ReportConfig;
use serde::Deserialize;

use crate::rate_limit::RateLimitConfig;
use crate::StartupError;

/// Environment variable carrying the generative service key
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Maximum accepted request body (bytes)
    pub body_limit_bytes: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8087,
            body_limit_bytes: 100 * 1024 * 1024,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerSettings {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logger: LoggerSettings,
    pub media: MediaConfig,
    pub detector: DetectorConfig,
    pub genai: GeminiConfig,
    pub report: ReportConfig,
}

impl Settings {
    /// Load `config/default`, `config/{RUN_MODE}` and `DRIVESAFE_<SECTION>__<KEY>`
    /// variables, in increasing priority. `GOOGLE_API_KEY` overrides `genai.api_key`.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                Environment::with_prefix("DRIVESAFE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(key) = env::var(API_KEY_VAR) {
            builder = builder.set_override("genai.api_key", key)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Reject settings the server cannot start with
    pub fn validate(&self) -> Result<(), StartupError> {
        let invalid = |msg: String| StartupError::Settings(msg);

        if self.media.skip_interval == 0 {
            return Err(invalid("media.skip_interval must be at least 1".into()));
        }
        self.detector
            .validate()
            .map_err(|e| invalid(e.to_string()))?;
        if self.detector.input_size != FRAME_SIZE {
            return Err(invalid(format!(
                "detector.input_size {} does not match the {}px sampled frames",
                self.detector.input_size, FRAME_SIZE
            )));
        }
        if self.server.body_limit_bytes == 0 {
            return Err(invalid("server.body_limit_bytes must be positive".into()));
        }
        if self.server.rate_limit.enabled {
            self.server.rate_limit.validate().map_err(invalid)?;
        }
        if self
            .genai
            .api_key
            .as_deref()
            .map_or(true, |key| key.trim().is_empty())
        {
            return Err(invalid(format!(
                "{} is missing; set it in the environment or .env",
                API_KEY_VAR
            )));
        }
        Ok(())
    }
}
