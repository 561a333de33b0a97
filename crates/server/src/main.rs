//! Prediction Server - HTTP front end for a single predictive model
//!
//! Serves predictions from the configured artifact and folds labelled
//! batches back into it through `/retrain`.

use anyhow::{Context, Result};
use server_lib::{
    api::{self, AppState},
    health::{components, HealthRegistry},
    observability::{ServiceMetrics, StructuredLogger},
    ArtifactModelProvider,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting prediction-server");

    let config = config::ServerConfig::load()?;
    info!(
        instance = %config.instance_name,
        model_path = %config.model_path.display(),
        model_format = %config.model_format,
        "Server configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::MODEL_PROVIDER).await;
    health_registry.register(components::RETRAINER).await;

    let metrics = ServiceMetrics::new();

    let logger = StructuredLogger::new(&config.instance_name);
    logger.log_startup(SERVER_VERSION, &config.model_path.display().to_string());

    let provider = Arc::new(ArtifactModelProvider::new(config.model_spec()));
    let app_state = Arc::new(
        AppState::new(provider, health_registry, metrics, logger.clone())
            .with_slow_inference_threshold(config.slow_inference_threshold())
            .with_max_body_bytes(config.max_body_bytes),
    );

    // A missing artifact is reported per request, the server still comes up
    if config.preload_model {
        if let Err(e) = api::preload_model(&app_state).await {
            warn!(error = %e, "Model preload failed, will retry on first request");
        }
    }

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        logger.log_shutdown("SIGINT received");
    };

    api::serve(listener, app_state, shutdown).await?;
    info!("Shutting down");

    Ok(())
}
