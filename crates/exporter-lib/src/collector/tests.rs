//! Integration tests for concurrent collection
//!
//! These tests drive the collector with a mock scraper whose fetch can be
//! delayed, hung forever or made to panic, without any real sockets.

#[cfg(test)]
mod collector_tests {
    use crate::collector::{
        CollectorConfig, ConcurrentCollector, SampleSink, TargetScraper,
    };
    use crate::error::ScrapeError;
    use crate::metrics::{Sample, ValueKind};
    use crate::models::{ScrapeTarget, TargetMap, VmiDescriptor};
    use crate::observability::ExporterMetrics;
    use async_trait::async_trait;
    use prometheus::Registry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::{Barrier, Semaphore};
    use tokio::time::Instant;

    enum Behavior {
        Immediate,
        Delay(Duration),
        Hang,
        PanicOn(String),
        Barrier(Arc<Barrier>),
        /// Wait for a permit the test hands out
        Gate(Arc<Semaphore>),
    }

    struct MockScraper {
        behavior: Behavior,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        started: Mutex<Vec<String>>,
    }

    impl MockScraper {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                started: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        fn started(&self) -> Vec<String> {
            self.started.lock().unwrap().clone()
        }
    }

    /// Tracks concurrent fetches, released on drop so panics are counted too
    struct InFlight<'a>(&'a AtomicUsize);

    impl<'a> InFlight<'a> {
        fn enter(scraper: &'a MockScraper) -> Self {
            let now = scraper.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            scraper.peak.fetch_max(now, Ordering::SeqCst);
            Self(&scraper.in_flight)
        }
    }

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl TargetScraper for MockScraper {
        type Stats = f64;

        async fn fetch(&self, target: &ScrapeTarget) -> Result<Option<f64>, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.lock().unwrap().push(target.socket.clone());
            let _guard = InFlight::enter(self);

            match &self.behavior {
                Behavior::Immediate => {}
                Behavior::Delay(delay) => tokio::time::sleep(*delay).await,
                Behavior::Hang => std::future::pending::<()>().await,
                Behavior::PanicOn(socket) => {
                    if &target.socket == socket {
                        panic!("mock scraper exploded on {}", socket);
                    }
                }
                Behavior::Barrier(barrier) => {
                    barrier.wait().await;
                }
                Behavior::Gate(gate) => {
                    if let Ok(permit) = gate.acquire().await {
                        permit.forget();
                    }
                }
            }

            Ok(Some(1.0))
        }

        fn report(&self, target: &ScrapeTarget, stats: f64) -> Vec<Sample> {
            vec![Sample::new(
                "mock_value",
                "Mock value",
                ValueKind::Gauge,
                stats,
                vec!["socket".to_string()],
                vec![target.socket.clone()],
            )
            .unwrap()]
        }
    }

    fn targets(count: usize) -> TargetMap {
        (0..count)
            .map(|i| {
                let vmi = VmiDescriptor {
                    namespace: "default".to_string(),
                    name: format!("vmi-{}", i),
                    uid: format!("uid-{}", i),
                    node_name: "node-1".to_string(),
                    phase: "Running".to_string(),
                    ..Default::default()
                };
                (format!("sock-{}", i), Arc::new(vmi))
            })
            .collect()
    }

    fn collector(max_in_flight: usize) -> ConcurrentCollector {
        ConcurrentCollector::new(CollectorConfig {
            max_in_flight,
            ..Default::default()
        })
        .unwrap()
    }

    fn instrumented(config: CollectorConfig) -> (ConcurrentCollector, Registry) {
        let registry = Registry::new();
        let metrics = ExporterMetrics::new(&registry).unwrap();
        let collector = ConcurrentCollector::new(config).unwrap().with_metrics(metrics);
        (collector, registry)
    }

    fn counter_value(registry: &Registry, name: &str, outcome: Option<&str>) -> f64 {
        registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric().iter())
            .filter(|metric| match outcome {
                Some(outcome) => metric
                    .get_label()
                    .iter()
                    .any(|l| l.get_name() == "outcome" && l.get_value() == outcome),
                None => true,
            })
            .map(|metric| metric.get_counter().get_value())
            .sum()
    }

    fn attempts(registry: &Registry, outcome: &str) -> f64 {
        counter_value(registry, "vmi_exporter_scrape_attempts_total", Some(outcome))
    }

    async fn run(
        collector: &ConcurrentCollector,
        scraper: Arc<MockScraper>,
        targets: TargetMap,
        timeout: Duration,
    ) -> Vec<Sample> {
        let (sink, receiver) = SampleSink::channel();
        collector.collect(targets, scraper, &sink, timeout).await;
        receiver.finalize().await
    }

    #[tokio::test]
    async fn test_empty_targets_returns_immediately() {
        let scraper = MockScraper::new(Behavior::Immediate);
        let started = Instant::now();

        let samples = run(
            &collector(3),
            scraper.clone(),
            TargetMap::new(),
            Duration::from_secs(10),
        )
        .await;

        assert!(samples.is_empty());
        assert_eq!(scraper.calls(), 0);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_all_targets_admitted_when_within_bound() {
        // Every fetch waits for all four, so this only completes if all run at once
        let scraper = MockScraper::new(Behavior::Barrier(Arc::new(Barrier::new(4))));

        let samples = run(&collector(4), scraper.clone(), targets(4), Duration::from_secs(2)).await;

        assert_eq!(samples.len(), 4);
        assert_eq!(scraper.peak(), 4);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_bound() {
        let scraper = MockScraper::new(Behavior::Delay(Duration::from_millis(20)));

        let samples = run(
            &collector(3),
            scraper.clone(),
            targets(12),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(samples.len(), 12);
        assert_eq!(scraper.calls(), 12);
        assert!(scraper.peak() <= 3, "peak in flight was {}", scraper.peak());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fifty_slow_targets_complete_within_deadline() {
        let scraper = MockScraper::new(Behavior::Delay(Duration::from_millis(50)));
        let started = Instant::now();

        let samples = run(
            &collector(10),
            scraper.clone(),
            targets(50),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(samples.len(), 50);
        assert!(scraper.peak() <= 10);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_hanging_targets_abandoned_at_deadline() {
        let scraper = MockScraper::new(Behavior::Hang);
        let (collector, registry) = instrumented(CollectorConfig {
            max_in_flight: 10,
            ..Default::default()
        });
        let started = Instant::now();

        let samples = run(
            &collector,
            scraper.clone(),
            targets(50),
            Duration::from_millis(200),
        )
        .await;
        let elapsed = started.elapsed();

        assert!(samples.is_empty());
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(800), "took {:?}", elapsed);
        assert_eq!(scraper.calls(), 10);
        assert_eq!(
            counter_value(&registry, "vmi_exporter_targets_abandoned_total", None),
            50.0
        );
    }

    #[tokio::test]
    async fn test_panicking_target_is_isolated() {
        let scraper = MockScraper::new(Behavior::PanicOn("sock-2".to_string()));
        let (collector, registry) = instrumented(CollectorConfig::default());

        let samples = run(&collector, scraper.clone(), targets(5), Duration::from_secs(2)).await;

        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.label("socket") != Some("sock-2")));
        assert_eq!(attempts(&registry, "panicked"), 1.0);

        // The slot held by the panicking attempt was given back
        assert_eq!(collector.available_slots(), 3);
        let samples = run(&collector, scraper, targets(5), Duration::from_secs(2)).await;
        assert_eq!(samples.len(), 4);
    }

    #[tokio::test]
    async fn test_late_result_is_dropped_after_finalize() {
        let scraper = MockScraper::new(Behavior::Delay(Duration::from_millis(300)));
        let (collector, registry) = instrumented(CollectorConfig {
            stale_margin: Duration::from_secs(10),
            ..Default::default()
        });

        let samples = run(
            &collector,
            scraper.clone(),
            targets(1),
            Duration::from_millis(100),
        )
        .await;
        assert!(samples.is_empty());

        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(scraper.calls(), 1);
        assert_eq!(attempts(&registry, "late"), 1.0);
        assert_eq!(attempts(&registry, "reported"), 0.0);
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let scraper = MockScraper::new(Behavior::Delay(Duration::from_millis(300)));
        let (collector, registry) = instrumented(CollectorConfig {
            stale_margin: Duration::ZERO,
            ..Default::default()
        });

        run(&collector, scraper, targets(1), Duration::from_millis(100)).await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(attempts(&registry, "stale"), 1.0);
    }

    #[tokio::test]
    async fn test_queued_target_expires_without_fetching() {
        let scraper = MockScraper::new(Behavior::Delay(Duration::from_millis(300)));
        let (collector, registry) = instrumented(CollectorConfig {
            max_in_flight: 1,
            stale_margin: Duration::from_secs(10),
            ..Default::default()
        });

        run(&collector, scraper.clone(), targets(2), Duration::from_millis(100)).await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(scraper.calls(), 1);
        assert_eq!(attempts(&registry, "expired"), 1.0);
        assert_eq!(attempts(&registry, "late"), 1.0);
    }

    #[tokio::test]
    async fn test_busy_target_skipped_on_next_collection() {
        let scraper = MockScraper::new(Behavior::Hang);
        let (collector, registry) = instrumented(CollectorConfig::default());

        run(&collector, scraper.clone(), targets(1), Duration::from_millis(50)).await;
        let samples = run(&collector, scraper.clone(), targets(1), Duration::from_millis(50)).await;

        assert!(samples.is_empty());
        assert_eq!(scraper.calls(), 1);
        assert_eq!(counter_value(&registry, "vmi_exporter_targets_skipped_total", None), 1.0);
    }

    #[tokio::test]
    async fn test_queued_target_not_marked_busy_after_abandon() {
        let gate = Arc::new(Semaphore::new(0));
        let scraper = MockScraper::new(Behavior::Gate(gate.clone()));
        let (collector, registry) = instrumented(CollectorConfig {
            max_in_flight: 1,
            ..Default::default()
        });

        // One target holds the only slot, the other is still queued at the deadline
        run(&collector, scraper.clone(), targets(2), Duration::from_millis(50)).await;
        let started = scraper.started();
        assert_eq!(started.len(), 1);

        let queued: TargetMap = targets(2)
            .into_iter()
            .filter(|(socket, _)| socket != &started[0])
            .collect();
        assert_eq!(queued.len(), 1);

        gate.add_permits(10);
        let samples = run(&collector, scraper.clone(), queued, Duration::from_secs(1)).await;

        assert_eq!(samples.len(), 1);
        assert_eq!(
            counter_value(&registry, "vmi_exporter_targets_skipped_total", None),
            0.0
        );
    }

    #[tokio::test]
    async fn test_repeated_collections_are_independent() {
        let scraper = MockScraper::new(Behavior::Immediate);
        let collector = collector(3);

        let first = run(&collector, scraper.clone(), targets(6), Duration::from_secs(1)).await;
        let second = run(&collector, scraper.clone(), targets(6), Duration::from_secs(1)).await;

        assert_eq!(first.len(), 6);
        assert_eq!(second.len(), 6);
        assert_eq!(scraper.calls(), 12);
        assert_eq!(collector.available_slots(), 3);
    }
}

#[cfg(test)]
mod domain_stats_tests {
    use crate::collector::{CollectorConfig, ConcurrentCollector, SampleSink};
    use crate::error::ScrapeError;
    use crate::models::{TargetMap, VmiDescriptor};
    use crate::stats::{DomainStats, DomainStatsMemory, DomainStatsScraper, StatsFetcher};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    struct FakeFetcher;

    #[async_trait]
    impl StatsFetcher for FakeFetcher {
        async fn get_domain_stats(&self, socket: &str) -> Result<Option<DomainStats>, ScrapeError> {
            match socket {
                "sock-a" => Ok(Some(DomainStats {
                    name: "default_vm-a".to_string(),
                    memory: DomainStatsMemory {
                        rss_set: true,
                        rss: 1024,
                        ..Default::default()
                    },
                    ..Default::default()
                })),
                "sock-gone" => Ok(None),
                _ => Err(ScrapeError::Rejected("connection refused".to_string())),
            }
        }
    }

    fn vmi(name: &str) -> Arc<VmiDescriptor> {
        Arc::new(VmiDescriptor {
            namespace: "default".to_string(),
            name: name.to_string(),
            uid: format!("uid-{}", name),
            node_name: "node-1".to_string(),
            phase: "Running".to_string(),
            labels: BTreeMap::from([("app".to_string(), "demo".to_string())]),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_domain_stats_reported_for_healthy_target_only() {
        let collector = ConcurrentCollector::new(CollectorConfig::default()).unwrap();
        let scraper = Arc::new(DomainStatsScraper::new(Arc::new(FakeFetcher)));

        let mut targets = TargetMap::new();
        targets.insert("sock-a".to_string(), vmi("vm-a"));
        targets.insert("sock-gone".to_string(), vmi("vm-gone"));
        targets.insert("sock-broken".to_string(), vmi("vm-broken"));

        let (sink, receiver) = SampleSink::channel();
        collector
            .collect(targets, scraper, &sink, Duration::from_secs(1))
            .await;
        let samples = receiver.finalize().await;

        assert_eq!(samples.len(), 1);
        let rss = &samples[0];
        assert_eq!(rss.name, "kubevirt_vmi_memory_resident_bytes");
        assert_eq!(rss.value, 1048576.0);
        assert_eq!(rss.label("name"), Some("vm-a"));
        assert_eq!(rss.label("kubernetes_vmi_label_app"), Some("demo"));
    }
}
