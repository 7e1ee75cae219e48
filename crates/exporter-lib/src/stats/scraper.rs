//! Production scrape target implementation

use super::{DomainStats, StatsFetcher};
use crate::collector::TargetScraper;
use crate::error::ScrapeError;
use crate::metrics::{Sample, VmiMetrics};
use crate::models::ScrapeTarget;
use async_trait::async_trait;
use std::sync::Arc;

/// Scrapes a VMI's command socket and formats its domain stats
#[derive(Clone)]
pub struct DomainStatsScraper {
    fetcher: Arc<dyn StatsFetcher>,
}

impl DomainStatsScraper {
    pub fn new(fetcher: Arc<dyn StatsFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl TargetScraper for DomainStatsScraper {
    type Stats = DomainStats;

    async fn fetch(&self, target: &ScrapeTarget) -> Result<Option<DomainStats>, ScrapeError> {
        self.fetcher.get_domain_stats(&target.socket).await
    }

    fn report(&self, target: &ScrapeTarget, stats: DomainStats) -> Vec<Sample> {
        VmiMetrics::new(&target.vmi).samples(&stats)
    }
}
