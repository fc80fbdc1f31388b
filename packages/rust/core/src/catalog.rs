//! The dataset catalog: the result of one discovery run.
//!
//! Discovery touches the network, so it lives behind an explicit
//! [`Catalog::refresh`] rather than inside config construction. Everything
//! downstream of the catalog is pure.

use std::time::Instant;

use chrono::{DateTime, Utc};
use cldfbot_discovery::{DiscoveryFilter, DiscoveryProgress, RepoSource};
use cldfbot_shared::{AppConfig, Dataset, Result};
use tracing::{info, instrument};

/// Ordered, de-duplicated datasets plus the time they were discovered.
#[derive(Debug, Clone)]
pub struct Catalog {
    datasets: Vec<Dataset>,
    refreshed_at: DateTime<Utc>,
}

impl Catalog {
    /// Run discovery over all configured organizations.
    #[instrument(skip_all)]
    pub async fn refresh<S: RepoSource>(
        source: &S,
        config: &AppConfig,
        filter: &DiscoveryFilter,
        progress: &dyn DiscoveryProgress,
    ) -> Result<Self> {
        let start = Instant::now();
        let datasets = cldfbot_discovery::discover(source, &config.orgs, filter, progress).await?;

        info!(
            datasets = datasets.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "catalog refreshed"
        );

        Ok(Self {
            datasets,
            refreshed_at: Utc::now(),
        })
    }

    /// Build a catalog from already known datasets, sorting them the same
    /// way discovery does.
    pub fn from_datasets(datasets: Vec<Dataset>) -> Self {
        Self {
            datasets: cldfbot_discovery::sort_and_dedup(datasets),
            refreshed_at: Utc::now(),
        }
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Look up a dataset by its build-target name.
    pub fn get(&self, id: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|ds| ds.id() == id)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}
