//! DriveSafe - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new().context("failed to load settings")?;
    init_logging(&settings.logger)?;

    info!("=== DriveSafe v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Starting driver safety report service...");

    run_server(settings).await?;

    Ok(())
}
