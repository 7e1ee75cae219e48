//! VMI exporter - per-node virtual machine telemetry exporter
//!
//! This binary runs as a DaemonSet on each Kubernetes node, scraping the
//! command socket of every VMI on the node whenever `/metrics` is requested.

use anyhow::{Context, Result};
use exporter_lib::{
    api,
    collector::{ConcurrentCollector, KubeVmiLister},
    health::HealthRegistry,
    observability::{ExporterMetrics, StructuredLogger},
    stats::{CmdClient, DomainStatsScraper},
    VmiExporter,
};
use prometheus::Registry;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::ExporterConfig::load()?;
    info!(
        node_name = %config.node_name,
        share_dir = %config.virt_share_dir.display(),
        "Exporter configured"
    );

    let health = HealthRegistry::for_exporter().await;
    let registry = Registry::new();
    let metrics = ExporterMetrics::new(&registry).context("Failed to register self-metrics")?;

    let collector_config = config.collector();
    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(
        EXPORTER_VERSION,
        collector_config.max_in_flight,
        collector_config.timeout,
    );

    let lister = KubeVmiLister::try_default().await?;
    let scraper = DomainStatsScraper::new(Arc::new(CmdClient::new(config.cmd_client())));
    let collector = ConcurrentCollector::new(collector_config)?.with_metrics(metrics.clone());

    let exporter = VmiExporter::new(
        config.node_name.clone(),
        config.virt_share_dir.clone(),
        Arc::new(lister),
        Arc::new(scraper),
        collector,
        health.clone(),
    )
    .with_metrics(metrics);

    let state = Arc::new(api::AppState::new(
        health.clone(),
        Arc::new(exporter),
        registry,
        config.max_metric_requests,
    ));

    health.set_started(true).await;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    };

    if let Err(e) = api::serve(config.api_port, state, shutdown).await {
        error!(error = %e, "API server failed");
        logger.log_shutdown("API server failed");
        return Err(e);
    }

    logger.log_shutdown("SIGINT received");
    Ok(())
}
