//! DriveSafe API Server
//!
//! HTTP surface of the driver safety pipeline: media upload, analysis of
//! forwarded detections, health and Prometheus metrics.

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use dms::{BehaviorDetector, Detector, DmsError, NoopDetector, OnnxDetector};
use genai::{GeminiClient, GenAiError, TextService};
use media::MediaNormalizer;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use pipeline::Pipeline;
use report::{DrowsinessAnalyzer, ReportSynthesizer};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

pub mod error;
pub mod rate_limit;
mod routes;
pub mod settings;

pub use error::ApiError;
pub use settings::{LoggerSettings, ServerSettings, Settings};

/// Startup failures
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Detector initialization failed: {0}")]
    Detector(#[from] DmsError),

    #[error("Generative service initialization failed: {0}")]
    GenAi(#[from] GenAiError),

    #[error("Rate limiter initialization failed: {0}")]
    RateLimit(String),

    #[error("Metrics initialization failed: {0}")]
    Metrics(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Pipeline,
    /// Prometheus renderer, absent when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, metrics: Option<PrometheusHandle>) -> Self {
        Self { pipeline, metrics }
    }
}

/// Create the application router (without rate limiting)
pub fn create_router(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/v1/health", get(routes::health::health))
        .route("/api/v1/detect", post(routes::detect::detect))
        .route("/api/v1/detections", post(routes::detect::detections))
        .route(
            "/api/v1/process-analysis",
            post(routes::analysis::process_analysis),
        )
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed".to_string()),
    }
}

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(settings: &LoggerSettings) -> Result<(), StartupError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let result = if settings.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .try_init()
    };
    result.map_err(|e| StartupError::Logging(e.to_string()))
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle, StartupError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| StartupError::Metrics(e.to_string()))
}

/// Assemble the pipeline from settings
pub fn build_pipeline(settings: &Settings) -> Result<Pipeline, StartupError> {
    let model: Arc<dyn Detector> = match settings.detector.model_path {
        Some(_) => Arc::new(OnnxDetector::load(&settings.detector)?),
        None => {
            warn!("detector.model_path is not set, no behaviors will be detected");
            Arc::new(NoopDetector)
        }
    };
    let service: Arc<dyn TextService> = Arc::new(GeminiClient::new(&settings.genai)?);

    Ok(Pipeline::new(
        MediaNormalizer::new(settings.media.clone()),
        BehaviorDetector::new(model, &settings.detector),
        DrowsinessAnalyzer::new(service.clone()),
        ReportSynthesizer::new(service, settings.report.clone()),
    ))
}

/// Run the server until Ctrl+C
pub async fn run_server(settings: Settings) -> Result<(), StartupError> {
    settings.validate()?;

    let pipeline = build_pipeline(&settings)?;
    let state = Arc::new(AppState::new(pipeline, Some(init_metrics()?)));
    let mut app = create_router(state, settings.server.body_limit_bytes);

    let rate_limit = &settings.server.rate_limit;
    if rate_limit.enabled {
        info!(
            "Rate limiting: one request per {}s, burst {}",
            rate_limit.per_second, rate_limit.burst_size
        );
        app = app.layer(GovernorLayer {
            config: rate_limit::create_governor_config(rate_limit)?,
        });
    }

    let addr = settings.server.addr();
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
