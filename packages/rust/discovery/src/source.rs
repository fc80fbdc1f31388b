//! Repository sources: where the list of an organization's repositories
//! comes from.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::path::Path;

use cldfbot_shared::{CldfBotError, Result, short_name};
use serde::{Deserialize, Serialize};

/// A repository as reported by a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepo {
    /// Repository name as reported by the host.
    pub name: String,
    /// HTTPS clone URL.
    pub clone_url: String,
}

impl RemoteRepo {
    /// Build a repo entry from a clone URL alone, deriving the name.
    pub fn from_clone_url(url: impl Into<String>) -> Self {
        let clone_url = url.into();
        Self {
            name: short_name(&clone_url).to_string(),
            clone_url,
        }
    }
}

/// Lists the repositories of an organization.
///
/// An unknown organization is an error, never an empty list.
pub trait RepoSource {
    fn list_repos(&self, org: &str) -> impl Future<Output = Result<Vec<RemoteRepo>>> + Send;
}

/// In-memory source, used for offline rendering and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRepoSource {
    repos: HashMap<String, Vec<RemoteRepo>>,
}

impl StaticRepoSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an organization with the given clone URLs.
    pub fn with_org<I, S>(mut self, org: impl Into<String>, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let repos = urls.into_iter().map(RemoteRepo::from_clone_url).collect();
        self.repos.insert(org.into(), repos);
        self
    }

    /// Load a `{ "org": ["clone_url", ...] }` JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CldfBotError::io(path, e))?;
        Self::from_json_str(&content)
            .map_err(|e| CldfBotError::parse(format!("{}: {e}", path.display())))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let orgs: BTreeMap<String, Vec<String>> =
            serde_json::from_str(content).map_err(|e| CldfBotError::parse(e.to_string()))?;
        Ok(orgs
            .into_iter()
            .fold(Self::new(), |source, (org, urls)| source.with_org(org, urls)))
    }
}

impl RepoSource for StaticRepoSource {
    async fn list_repos(&self, org: &str) -> Result<Vec<RemoteRepo>> {
        self.repos
            .get(org)
            .cloned()
            .ok_or_else(|| CldfBotError::discovery(org, "organization not found"))
    }
}
