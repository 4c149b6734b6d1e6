//! Cortex API Gateway
//!
//! HTTP entry point for the knowledge base:
//! - Authentication and profile
//! - Documents, uploads and background processing
//! - Tags, conversations, memories, search and learning videos
//! - Observability (logging, metrics, tracing)

mod app;
mod extract;
mod handlers;
mod middleware;
mod response;

use anyhow::Context;
use cortex_common::{config::AppConfig, db::DbPool, errors, metrics, VERSION};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting Cortex API Gateway v{}", VERSION);

    errors::set_expose_internal_errors(!config.is_production());
    let config = Arc::new(config);

    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }

    tokio::fs::create_dir_all(&config.upload.dir)
        .await
        .with_context(|| format!("Failed to create upload directory {}", config.upload.dir.display()))?;

    let state = AppState::new(config.clone(), db.clone())?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the pool; in-flight processing tasks are not awaited
    match tokio::time::timeout(config.shutdown_timeout(), db.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Error closing database connections"),
        Err(_) => warn!("Timed out closing database connections"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing from RUST_LOG or the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logging {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

/// Serve Prometheus metrics on a separate port
fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_search_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_ai_request_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::SLOW_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_document_processing_seconds", metrics::METRICS_PREFIX)),
            metrics::SLOW_BUCKETS,
        )?
        .install()
        .context("Failed to install Prometheus exporter")?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
