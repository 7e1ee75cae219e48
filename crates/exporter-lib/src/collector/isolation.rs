//! Failure and staleness isolation for a single scrape attempt

use super::sink::SampleSink;
use super::TargetScraper;
use crate::models::ScrapeTarget;
use std::any::Any;
use std::future::Future;
use std::time::{Duration, Instant};

/// Result of one target's scrape attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    /// Samples were accepted by the sink
    Reported { samples: usize },
    /// The domain is absent or going away, nothing to report
    Vanished,
    /// Connecting, fetching or decoding failed
    Failed(String),
    /// The fetch returned after the maximum result age
    Stale(Duration),
    /// The sink was finalized before the samples could be submitted
    Late,
    /// A worker slot only became free after the deadline
    Expired,
    /// An attempt from an earlier cycle still holds the target's socket
    Skipped,
    /// The attempt panicked
    Panicked(String),
}

impl ScrapeOutcome {
    /// Short label used for logging and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeOutcome::Reported { .. } => "reported",
            ScrapeOutcome::Vanished => "vanished",
            ScrapeOutcome::Failed(_) => "failed",
            ScrapeOutcome::Stale(_) => "stale",
            ScrapeOutcome::Late => "late",
            ScrapeOutcome::Expired => "expired",
            ScrapeOutcome::Skipped => "skipped",
            ScrapeOutcome::Panicked(_) => "panicked",
        }
    }

    pub fn is_reported(&self) -> bool {
        matches!(self, ScrapeOutcome::Reported { .. })
    }
}

/// Fetch, check staleness, report and submit for one target
///
/// Fetch may hang past the collection deadline and only wake up later.
/// A result older than `max_age` is dropped without being reported, since
/// by then the sink is most likely finalized.
pub async fn run_attempt<S: TargetScraper>(
    scraper: &S,
    target: &ScrapeTarget,
    sink: &SampleSink,
    max_age: Duration,
) -> ScrapeOutcome {
    let started = Instant::now();

    let stats = match scraper.fetch(target).await {
        Ok(Some(stats)) => stats,
        Ok(None) => return ScrapeOutcome::Vanished,
        Err(e) => return ScrapeOutcome::Failed(e.to_string()),
    };

    let elapsed = started.elapsed();
    if elapsed > max_age {
        return ScrapeOutcome::Stale(elapsed);
    }

    if sink.is_closed() {
        return ScrapeOutcome::Late;
    }

    let samples = scraper.report(target, stats);
    let count = samples.len();

    match sink.submit(samples) {
        Ok(()) => ScrapeOutcome::Reported { samples: count },
        Err(_) => ScrapeOutcome::Late,
    }
}

/// Run an attempt as its own task
///
/// A panic inside the attempt is turned into [`ScrapeOutcome::Panicked`]
/// instead of unwinding into the caller.
pub async fn supervise<F>(attempt: F) -> ScrapeOutcome
where
    F: Future<Output = ScrapeOutcome> + Send + 'static,
{
    match tokio::spawn(attempt).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_panic() => ScrapeOutcome::Panicked(panic_message(e.into_panic())),
        Err(e) => ScrapeOutcome::Failed(e.to_string()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScrapeError;
    use crate::metrics::{Sample, ValueKind};
    use crate::models::VmiDescriptor;
    use async_trait::async_trait;
    use std::sync::Arc;

    enum Behavior {
        Ok,
        Gone,
        Error,
        Slow(Duration),
    }

    struct FakeScraper {
        behavior: Behavior,
    }

    #[async_trait]
    impl TargetScraper for FakeScraper {
        type Stats = f64;

        async fn fetch(&self, _target: &ScrapeTarget) -> Result<Option<f64>, ScrapeError> {
            match self.behavior {
                Behavior::Ok => Ok(Some(1.0)),
                Behavior::Gone => Ok(None),
                Behavior::Error => Err(ScrapeError::Rejected("boom".to_string())),
                Behavior::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(Some(1.0))
                }
            }
        }

        fn report(&self, _target: &ScrapeTarget, stats: f64) -> Vec<Sample> {
            vec![Sample::new("fake", "fake", ValueKind::Gauge, stats, vec![], vec![]).unwrap()]
        }
    }

    fn target() -> ScrapeTarget {
        ScrapeTarget {
            socket: "/tmp/sock".to_string(),
            vmi: Arc::new(VmiDescriptor::default()),
        }
    }

    async fn attempt(behavior: Behavior, max_age: Duration) -> (ScrapeOutcome, Vec<Sample>) {
        let (sink, receiver) = SampleSink::channel();
        let outcome = run_attempt(&FakeScraper { behavior }, &target(), &sink, max_age).await;
        (outcome, receiver.finalize().await)
    }

    #[tokio::test]
    async fn test_run_attempt_reports() {
        let (outcome, samples) = attempt(Behavior::Ok, Duration::from_secs(1)).await;
        assert_eq!(outcome, ScrapeOutcome::Reported { samples: 1 });
        assert_eq!(samples.len(), 1);
    }

    #[tokio::test]
    async fn test_run_attempt_vanished_and_failed_report_nothing() {
        let (outcome, samples) = attempt(Behavior::Gone, Duration::from_secs(1)).await;
        assert_eq!(outcome, ScrapeOutcome::Vanished);
        assert!(samples.is_empty());

        let (outcome, samples) = attempt(Behavior::Error, Duration::from_secs(1)).await;
        assert!(matches!(outcome, ScrapeOutcome::Failed(msg) if msg.contains("boom")));
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_run_attempt_discards_stale_result() {
        let (outcome, samples) =
            attempt(Behavior::Slow(Duration::from_millis(50)), Duration::from_millis(10)).await;
        assert!(
            matches!(outcome, ScrapeOutcome::Stale(elapsed) if elapsed >= Duration::from_millis(50))
        );
        assert!(samples.is_empty());
    }

    #[tokio::test]
    async fn test_run_attempt_after_finalize_is_late() {
        let (sink, receiver) = SampleSink::channel();
        assert!(receiver.finalize().await.is_empty());

        let scraper = FakeScraper { behavior: Behavior::Ok };
        let outcome = run_attempt(&scraper, &target(), &sink, Duration::from_secs(1)).await;

        assert_eq!(outcome, ScrapeOutcome::Late);
    }

    async fn explode() -> ScrapeOutcome {
        panic!("socket exploded")
    }

    async fn explode_formatted(vm: u32) -> ScrapeOutcome {
        panic!("vm {} gone", vm)
    }

    #[tokio::test]
    async fn test_supervise_converts_panic() {
        let outcome = supervise(explode()).await;
        assert_eq!(outcome, ScrapeOutcome::Panicked("socket exploded".to_string()));

        let outcome = supervise(explode_formatted(3)).await;
        assert_eq!(outcome, ScrapeOutcome::Panicked("vm 3 gone".to_string()));
    }

    #[tokio::test]
    async fn test_supervise_passes_outcome_through() {
        let outcome = supervise(async { ScrapeOutcome::Vanished }).await;
        assert_eq!(outcome, ScrapeOutcome::Vanished);
    }
}
