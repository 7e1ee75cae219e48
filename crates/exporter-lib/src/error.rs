//! Error types for the exporter library.

use thiserror::Error;

/// Failure to obtain stats from a single target.
///
/// None of these cross the collector boundary; they end up as a log line
/// and a missing set of samples for one VMI.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("failed to connect to command socket {socket}: {source}")]
    Connect {
        socket: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("stats request failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("server rejected stats request: {0}")]
    Rejected(String),

    #[error("failed to decode domain stats: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Returned when a batch is submitted after the sink was finalized.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("sample sink already finalized")]
pub struct SinkClosed;

/// Invalid sample construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("metric {name}: {names} label names but {values} label values")]
    LabelCardinality {
        name: String,
        names: usize,
        values: usize,
    },

    #[error("metric {name}: duplicate label name {label}")]
    DuplicateLabel { name: String, label: String },
}
