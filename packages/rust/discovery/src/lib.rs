//! Dataset discovery: turns the configured organizations into an ordered
//! list of datasets to build.
//!
//! Every organization's repositories are listed through a [`RepoSource`]
//! (the GitHub API in production), filtered against the organization's
//! exclusion list and an optional include list, and sorted by
//! `(org, name)` so build targets come out in a stable order.

mod github;
mod source;

use std::collections::HashSet;

use cldfbot_shared::{Dataset, DiscoveryConfig, OrgProfile, Result};
use tracing::{debug, info, instrument, warn};

pub use github::GithubClient;
pub use source::{RemoteRepo, RepoSource, StaticRepoSource};

/// The two datasets the bot is restricted to during development.
pub const DEV_ALLOWLIST: [&str; 2] = ["birchallchapacuran", "dryerorder"];

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Include-list override layered on top of the per-organization exclusions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryFilter {
    /// When set, only these repository names are kept.
    pub only: Option<Vec<String>>,
}

impl DiscoveryFilter {
    /// No restriction beyond exclusions.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the development allowlist.
    pub fn dev() -> Self {
        Self::only(DEV_ALLOWLIST)
    }

    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            only: config.only.clone(),
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        self.only
            .as_ref()
            .is_none_or(|only| only.iter().any(|n| n == name))
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting discovery status.
pub trait DiscoveryProgress: Send + Sync {
    /// Called before an organization is listed.
    fn org_started(&self, org: &str);
    /// Called after an organization was listed and filtered.
    fn org_listed(&self, org: &str, listed: usize, selected: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl DiscoveryProgress for SilentProgress {
    fn org_started(&self, _org: &str) {}
    fn org_listed(&self, _org: &str, _listed: usize, _selected: usize) {}
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Discover the datasets of all configured organizations.
///
/// Organizations are listed in table order. A failure to list any of them
/// aborts discovery; there is no partial result.
#[instrument(skip_all, fields(orgs = orgs.len()))]
pub async fn discover<S: RepoSource>(
    source: &S,
    orgs: &[OrgProfile],
    filter: &DiscoveryFilter,
    progress: &dyn DiscoveryProgress,
) -> Result<Vec<Dataset>> {
    let mut datasets = Vec::new();

    for org in orgs {
        progress.org_started(&org.name);

        let repos = source.list_repos(&org.name).await?;
        let before = datasets.len();
        datasets.extend(select(org, &repos, filter));
        let selected = datasets.len() - before;

        info!(org = %org.name, listed = repos.len(), selected, "organization listed");
        progress.org_listed(&org.name, repos.len(), selected);
    }

    Ok(sort_and_dedup(datasets))
}

/// Lazily turn one organization's repositories into selected datasets.
pub fn select<'a>(
    org: &'a OrgProfile,
    repos: &'a [RemoteRepo],
    filter: &'a DiscoveryFilter,
) -> impl Iterator<Item = Dataset> + 'a {
    repos
        .iter()
        .map(move |repo| Dataset::new(org.name.as_str(), repo.clone_url.as_str()))
        .filter(move |ds| {
            if org.is_excluded(&ds.name) {
                debug!(dataset = %ds, "excluded");
                return false;
            }
            filter.allows(&ds.name)
        })
}

/// Sort by `(org, name)` and drop repeated build-target names.
pub fn sort_and_dedup(mut datasets: Vec<Dataset>) -> Vec<Dataset> {
    datasets.sort();
    let mut seen = HashSet::new();
    datasets.retain(|ds| {
        let fresh = seen.insert(ds.id());
        if !fresh {
            warn!(dataset = %ds, url = %ds.url, "duplicate build target dropped");
        }
        fresh
    });
    datasets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexibank(exclude: &[&str]) -> OrgProfile {
        OrgProfile {
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            ..OrgProfile::new("lexibank")
        }
    }

    #[tokio::test]
    async fn test_excluded_names_never_discovered() {
        let source = StaticRepoSource::new().with_org(
            "lexibank",
            [
                "https://github.com/lexibank/template.git",
                "https://github.com/lexibank/abc.git",
            ],
        );

        let datasets = discover(
            &source,
            &[lexibank(&["template"])],
            &DiscoveryFilter::all(),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].name, "abc");
    }

    #[tokio::test]
    async fn test_output_sorted_by_org_then_name() {
        let source = StaticRepoSource::new()
            .with_org(
                "lexibank",
                [
                    "https://github.com/lexibank/zzz.git",
                    "https://github.com/lexibank/aaa.git",
                ],
            )
            .with_org(
                "cldf-datasets",
                [
                    "https://github.com/cldf-datasets/wals.git",
                    "https://github.com/cldf-datasets/apics.git",
                ],
            );
        let orgs = [lexibank(&[]), OrgProfile::new("cldf-datasets")];

        let datasets = discover(&source, &orgs, &DiscoveryFilter::all(), &SilentProgress)
            .await
            .unwrap();

        let ids: Vec<_> = datasets.iter().map(Dataset::id).collect();
        assert_eq!(
            ids,
            [
                "cldf-datasets-apics",
                "cldf-datasets-wals",
                "lexibank-aaa",
                "lexibank-zzz"
            ]
        );
        assert!(datasets.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_dev_filter_applies_after_exclusions() {
        let source = StaticRepoSource::new().with_org(
            "lexibank",
            [
                "https://github.com/lexibank/dryerorder.git",
                "https://github.com/lexibank/birchallchapacuran.git",
                "https://github.com/lexibank/abvd.git",
            ],
        );

        let datasets = discover(
            &source,
            &[lexibank(&["dryerorder"])],
            &DiscoveryFilter::dev(),
            &SilentProgress,
        )
        .await
        .unwrap();

        let names: Vec<_> = datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["birchallchapacuran"]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_dropped() {
        // "a-b" + "c" and "a" + "b-c" both map to "a-b-c".
        let source = StaticRepoSource::new()
            .with_org("a-b", ["https://github.com/a-b/c.git"])
            .with_org("a", ["https://github.com/a/b-c.git"]);
        let orgs = [OrgProfile::new("a-b"), OrgProfile::new("a")];

        let datasets = discover(&source, &orgs, &DiscoveryFilter::all(), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0].org, "a");
    }

    #[tokio::test]
    async fn test_source_failure_is_fatal() {
        let source = StaticRepoSource::new()
            .with_org("lexibank", ["https://github.com/lexibank/abc.git"]);
        let orgs = [lexibank(&[]), OrgProfile::new("missing")];

        let result = discover(&source, &orgs, &DiscoveryFilter::all(), &SilentProgress).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_filter_from_config() {
        let filter = DiscoveryFilter::from_config(&DiscoveryConfig::default());
        assert!(filter.allows("anything"));

        let filter = DiscoveryFilter::from_config(&DiscoveryConfig {
            only: Some(vec!["wals".into()]),
        });
        assert!(filter.allows("wals"));
        assert!(!filter.allows("apics"));
    }

    #[test]
    fn test_select_is_lazy_iterator() {
        let org = lexibank(&["template"]);
        let repos = vec![
            RemoteRepo::from_clone_url("https://github.com/lexibank/template.git"),
            RemoteRepo::from_clone_url("https://github.com/lexibank/abc.git"),
        ];
        let filter = DiscoveryFilter::all();
        let mut it = select(&org, &repos, &filter);
        assert_eq!(it.next().map(|d| d.id()).as_deref(), Some("lexibank-abc"));
        assert!(it.next().is_none());
    }
}
