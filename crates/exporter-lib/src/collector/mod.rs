//! Collection of per-VMI stats
//!
//! This module fans a scrape out to every VMI command socket on the node
//! with a bounded number of in-flight requests and a collection-wide
//! deadline. Every target is isolated: a failing, hanging or panicking
//! target only loses its own samples.

mod concurrent;
mod discovery;
mod isolation;
mod sink;

#[cfg(test)]
mod tests;

pub use concurrent::{CollectorConfig, ConcurrentCollector};
pub use discovery::{resolve_targets, socket_path, KubeVmiLister, StaticVmiLister, VmiLister};
pub use isolation::{run_attempt, supervise, ScrapeOutcome};
pub use sink::{SampleSink, SinkReceiver};

use crate::error::ScrapeError;
use crate::metrics::Sample;
use crate::models::ScrapeTarget;

pub use async_trait::async_trait;

/// Trait for scraping one target
///
/// A scrape is split into a fetch, which may block for a long time on the
/// target's socket, and a report step that turns the fetched stats into
/// samples. The collector measures the fetch and drops results that arrive
/// too late to be reported.
#[async_trait]
pub trait TargetScraper: Send + Sync + 'static {
    /// Raw stats produced by a fetch
    type Stats: Send + 'static;

    /// Fetch stats for a target; `Ok(None)` means nothing to report
    async fn fetch(&self, target: &ScrapeTarget) -> Result<Option<Self::Stats>, ScrapeError>;

    /// Translate fetched stats into samples for the target
    fn report(&self, target: &ScrapeTarget, stats: Self::Stats) -> Vec<Sample>;
}
