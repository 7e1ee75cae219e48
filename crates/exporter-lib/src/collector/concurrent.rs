//! Bounded-concurrency collector
//!
//! Fans one scrape out to every target with at most `max_in_flight`
//! attempts running at once and a single deadline for the whole cycle.
//! Attempts still running at the deadline are left to finish on their own;
//! the blocking socket call cannot be cancelled, so late results are
//! filtered by the staleness check and the finalized sink instead.

use super::isolation::{run_attempt, supervise, ScrapeOutcome};
use super::sink::SampleSink;
use super::TargetScraper;
use crate::models::{ScrapeTarget, TargetMap};
use crate::observability::ExporterMetrics;
use anyhow::Result;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Maximum number of concurrently running scrapes (default: 3)
    pub max_in_flight: usize,
    /// Collection-wide timeout (default: 10 seconds)
    pub timeout: Duration,
    /// Added to the timeout to get the maximum result age (default: 2 seconds)
    pub stale_margin: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 3,
            timeout: Duration::from_secs(10),
            stale_margin: Duration::from_secs(2),
        }
    }
}

impl CollectorConfig {
    /// Oldest acceptable fetch result for a collection with `timeout`
    pub fn max_result_age(&self, timeout: Duration) -> Duration {
        timeout + self.stale_margin
    }
}

/// Collects from all targets with bounded concurrency
///
/// Worker slots are shared by every `collect` call on the same instance, so
/// the bound holds even when scrapes overlap.
pub struct ConcurrentCollector {
    config: CollectorConfig,
    slots: Arc<Semaphore>,
    /// Sockets with an attempt still in flight
    busy: Arc<DashSet<String>>,
    metrics: Option<ExporterMetrics>,
}

impl ConcurrentCollector {
    /// Create a new collector
    pub fn new(config: CollectorConfig) -> Result<Self> {
        if config.max_in_flight == 0 {
            anyhow::bail!("max_in_flight must be at least 1");
        }

        info!(
            max_in_flight = config.max_in_flight,
            timeout_ms = config.timeout.as_millis() as u64,
            "Starting concurrent collector"
        );

        Ok(Self {
            slots: Arc::new(Semaphore::new(config.max_in_flight)),
            busy: Arc::new(DashSet::new()),
            config,
            metrics: None,
        })
    }

    /// Record attempt outcomes and cycle timings into self-metrics
    pub fn with_metrics(mut self, metrics: ExporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Number of worker slots currently free
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Scrape every target, writing reported samples into `sink`
    ///
    /// Returns once every dispatched attempt has finished or `timeout` has
    /// elapsed, whichever comes first. Failures never propagate: a target
    /// that could not be scraped simply contributes no samples.
    pub async fn collect<S: TargetScraper>(
        &self,
        targets: TargetMap,
        scraper: Arc<S>,
        sink: &SampleSink,
        timeout: Duration,
    ) {
        if targets.is_empty() {
            debug!("No targets to collect from");
            return;
        }

        let started = Instant::now();
        let deadline = started + timeout;
        let max_age = self.config.max_result_age(timeout);
        let total = targets.len();

        let mut tally = CycleTally::default();
        let mut workers = JoinSet::new();

        for (socket, vmi) in targets {
            let worker = Worker {
                target: ScrapeTarget { socket, vmi },
                scraper: Arc::clone(&scraper),
                sink: sink.clone(),
                slots: Arc::clone(&self.slots),
                busy: Arc::clone(&self.busy),
                deadline,
                max_age,
                metrics: self.metrics.clone(),
            };
            workers.spawn(worker.run());
        }

        let drained = tokio::time::timeout_at(deadline, async {
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(outcome) => tally.record(&outcome),
                    Err(e) => {
                        warn!(error = %e, "Collector worker failed");
                        tally.missing += 1;
                    }
                }
            }
        })
        .await;

        if drained.is_err() {
            tally.abandoned = workers.len();
            // Detach instead of dropping: dropping the set would abort the tasks
            workers.detach_all();
            info!(
                abandoned = tally.abandoned,
                timeout_ms = timeout.as_millis() as u64,
                "Collection deadline reached, abandoning remaining targets"
            );
        }

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.observe_collection(elapsed);
            metrics.inc_abandoned(tally.abandoned as u64);
        }

        debug!(
            targets = total,
            reported = tally.reported,
            missing = tally.missing,
            skipped = tally.skipped,
            abandoned = tally.abandoned,
            elapsed_ms = elapsed.as_millis() as u64,
            "Collection cycle complete"
        );
    }
}

/// Counters for one collection cycle
#[derive(Debug, Default)]
struct CycleTally {
    reported: usize,
    missing: usize,
    skipped: usize,
    abandoned: usize,
}

impl CycleTally {
    fn record(&mut self, outcome: &ScrapeOutcome) {
        match outcome {
            ScrapeOutcome::Reported { .. } => self.reported += 1,
            ScrapeOutcome::Skipped => self.skipped += 1,
            _ => self.missing += 1,
        }
    }
}

/// Marks a socket busy until dropped
struct Reservation {
    busy: Arc<DashSet<String>>,
    socket: String,
}

impl Reservation {
    fn acquire(busy: &Arc<DashSet<String>>, socket: &str) -> Option<Self> {
        if !busy.insert(socket.to_string()) {
            return None;
        }

        Some(Self {
            busy: Arc::clone(busy),
            socket: socket.to_string(),
        })
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.busy.remove(&self.socket);
    }
}

/// One target's unit of work
///
/// The socket is only marked busy once the worker holds a slot, so a worker
/// still queued when its cycle is abandoned does not block the socket for
/// the next cycle.
struct Worker<S: TargetScraper> {
    target: ScrapeTarget,
    scraper: Arc<S>,
    sink: SampleSink,
    slots: Arc<Semaphore>,
    busy: Arc<DashSet<String>>,
    deadline: Instant,
    max_age: Duration,
    metrics: Option<ExporterMetrics>,
}

impl<S: TargetScraper> Worker<S> {
    async fn run(self) -> ScrapeOutcome {
        let Worker {
            target,
            scraper,
            sink,
            slots,
            busy,
            deadline,
            max_age,
            metrics,
        } = self;
        let socket = target.socket.clone();

        let outcome = match slots.acquire_owned().await {
            Ok(_permit) if Instant::now() >= deadline => ScrapeOutcome::Expired,
            Ok(_permit) => match Reservation::acquire(&busy, &socket) {
                None => ScrapeOutcome::Skipped,
                Some(_reservation) => {
                    if let Some(metrics) = &metrics {
                        metrics.scrape_started();
                    }

                    let outcome = supervise(async move {
                        run_attempt(scraper.as_ref(), &target, &sink, max_age).await
                    })
                    .await;

                    if let Some(metrics) = &metrics {
                        metrics.scrape_finished();
                    }
                    outcome
                }
            },
            Err(_) => ScrapeOutcome::Failed("worker slots closed".to_string()),
        };

        if outcome == ScrapeOutcome::Skipped {
            if let Some(metrics) = &metrics {
                metrics.inc_skipped();
            }
        }

        log_outcome(&socket, &outcome);
        if let Some(metrics) = &metrics {
            metrics.inc_attempt(outcome.as_str());
        }

        outcome
    }
}

fn log_outcome(socket: &str, outcome: &ScrapeOutcome) {
    match outcome {
        ScrapeOutcome::Reported { samples } => {
            debug!(socket = %socket, samples = *samples, "Collected stats")
        }
        ScrapeOutcome::Vanished => debug!(socket = %socket, "Disappearing VM, ignored"),
        ScrapeOutcome::Failed(reason) => {
            debug!(socket = %socket, error = %reason, "Failed to collect stats")
        }
        ScrapeOutcome::Stale(elapsed) => info!(
            socket = %socket,
            elapsed_ms = elapsed.as_millis() as u64,
            "Took too long to collect stats, ignored"
        ),
        ScrapeOutcome::Late => debug!(socket = %socket, "Sink already finalized, stats dropped"),
        ScrapeOutcome::Expired => {
            debug!(socket = %socket, "Deadline passed before a worker slot was free")
        }
        ScrapeOutcome::Skipped => {
            warn!(socket = %socket, "Source busy, skipping collection")
        }
        ScrapeOutcome::Panicked(message) => {
            warn!(socket = %socket, panic = %message, "Collector worker panicked")
        }
    }
}
