pub mod api;
pub mod logging;
pub mod models;
pub mod processor;
pub mod sample;
pub mod schema;
pub mod services;
pub mod storage;
pub mod utils;

use common::Result;
use common::config::Settings;
use services::{BatchRunner, Pipeline, PipelineMetrics};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Runs a single batch with the engine named in `settings`. Only building the
/// pipeline can fail; run failures are reported inside the metrics.
pub async fn run_batch(settings: &Settings, source: &str) -> Result<PipelineMetrics> {
    let pipeline = Pipeline::from_settings(settings).await?;
    let runner = BatchRunner::new(pipeline, source);
    Ok(runner.run().await)
}

/// Serves the read-only HTTP API until the process is stopped.
pub async fn serve(settings: &Settings) -> Result<()> {
    let repository = storage::from_settings(settings).await?;
    let router = api::routes(repository);

    let addr: SocketAddr = format!("{}:{}", settings.api_host, settings.api_port)
        .parse()
        .map_err(|e| common::Error::InvalidInput(format!("invalid api address: {}", e)))?;
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, engine = %settings.execution_mode, "API server listening");
    axum::serve(listener, router).await?;

    Ok(())
}
