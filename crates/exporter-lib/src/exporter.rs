//! Per-scrape orchestration
//!
//! Ties together VMI listing, socket resolution, the concurrent collector
//! and the node-level aggregates into the sample set served on `/metrics`.

use crate::collector::{resolve_targets, ConcurrentCollector, SampleSink, VmiLister};
use crate::health::{components, HealthRegistry};
use crate::metrics::{build_info_sample, phase_count_samples, Sample};
use crate::models::TargetMap;
use crate::observability::{ExporterMetrics, StructuredLogger};
use crate::stats::DomainStatsScraper;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Exporter for the VMIs of one node
pub struct VmiExporter {
    node_name: String,
    share_dir: PathBuf,
    lister: Arc<dyn VmiLister>,
    scraper: Arc<DomainStatsScraper>,
    collector: ConcurrentCollector,
    health: HealthRegistry,
    metrics: Option<ExporterMetrics>,
    logger: StructuredLogger,
}

impl VmiExporter {
    pub fn new(
        node_name: impl Into<String>,
        share_dir: impl Into<PathBuf>,
        lister: Arc<dyn VmiLister>,
        scraper: Arc<DomainStatsScraper>,
        collector: ConcurrentCollector,
        health: HealthRegistry,
    ) -> Self {
        let node_name = node_name.into();
        Self {
            logger: StructuredLogger::new(node_name.clone()),
            node_name,
            share_dir: share_dir.into(),
            lister,
            scraper,
            collector,
            health,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: ExporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn collector(&self) -> &ConcurrentCollector {
        &self.collector
    }

    /// Produce every sample for one scrape of the node
    ///
    /// The build info sample is always present. VMIs that cannot be scraped
    /// in time are missing from the result, but still count towards the
    /// phase aggregates.
    pub async fn gather(&self) -> Vec<Sample> {
        let started = Instant::now();
        let mut samples = vec![build_info_sample()];

        let vmis = match self.lister.list_on_node(&self.node_name).await {
            Ok(vmis) => {
                self.health.set_healthy(components::VMI_SOURCE).await;
                vmis
            }
            Err(e) => {
                self.logger.log_list_failure(&format!("{:#}", e));
                self.health
                    .set_unhealthy(components::VMI_SOURCE, e.to_string())
                    .await;
                return samples;
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.set_vmis_on_node(vmis.len() as i64);
        }

        let mut target_count = 0;
        if vmis.is_empty() {
            self.health.set_healthy(components::COLLECTOR).await;
        } else {
            let targets = resolve_targets(&self.share_dir, &vmis);
            target_count = targets.len();
            samples.extend(self.collect(targets).await);
        }

        samples.extend(phase_count_samples(&self.node_name, &vmis));

        self.logger
            .log_scrape(vmis.len(), target_count, samples.len(), started.elapsed());
        samples
    }

    /// Scrape every target and return what was reported before the deadline
    async fn collect(&self, targets: TargetMap) -> Vec<Sample> {
        let timeout = self.collector.config().timeout;
        let (sink, receiver) = SampleSink::channel();

        let started = Instant::now();
        self.collector
            .collect(targets, Arc::clone(&self.scraper), &sink, timeout)
            .await;
        let deadline_reached = started.elapsed() >= timeout;
        drop(sink);
        let samples = receiver.finalize().await;

        if deadline_reached {
            self.health
                .set_degraded(
                    components::COLLECTOR,
                    "Collection deadline reached, some VMIs were not reported",
                )
                .await;
        } else {
            self.health.set_healthy(components::COLLECTOR).await;
        }

        samples
    }
}
