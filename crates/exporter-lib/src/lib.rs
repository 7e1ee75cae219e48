//! Per-node VMI telemetry exporter library
//!
//! This crate provides the core functionality for:
//! - Bounded-concurrency collection of hypervisor stats from VMI sockets
//! - Failure, panic and staleness isolation per scrape target
//! - Translation of domain stats into labeled metric samples
//! - Health checks, self-observability and the HTTP scrape endpoint

pub mod api;
pub mod collector;
pub mod error;
pub mod exporter;
pub mod health;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod proto;
pub mod stats;

pub use error::{SampleError, ScrapeError, SinkClosed};
pub use exporter::VmiExporter;
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
