//! HTTP API: the scrape endpoint and health probes

use crate::exporter::VmiExporter;
use crate::health::{ComponentStatus, HealthRegistry};
use crate::metrics::into_families;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, Registry, TextEncoder, TEXT_FORMAT};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// Shared application state
pub struct AppState {
    pub health: HealthRegistry,
    pub exporter: Arc<VmiExporter>,
    /// Self-metrics, appended to every scrape
    pub registry: Registry,
    /// Bounds concurrent `/metrics` requests
    pub request_slots: Semaphore,
}

impl AppState {
    pub fn new(
        health: HealthRegistry,
        exporter: Arc<VmiExporter>,
        registry: Registry,
        max_metric_requests: usize,
    ) -> Self {
        Self {
            health,
            exporter,
            registry,
            request_slots: Semaphore::new(max_metric_requests),
        }
    }
}

/// 200 while operational, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Scrape every VMI on the node and render the text exposition format
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let Ok(_permit) = state.request_slots.try_acquire() else {
        warn!("Too many concurrent metric requests, rejecting scrape");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many concurrent metric requests\n",
        )
            .into_response();
    };

    let mut families = into_families(state.exporter.gather().await);
    families.extend(state.registry.gather());

    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_FORMAT)], buffer).into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
