//! GitHub REST API client for organization repository listings.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use cldfbot_shared::{CldfBotError, GithubConfig, Result, github_token};
use regex::Regex;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, LINK};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::source::{RemoteRepo, RepoSource};

/// User-Agent string for API requests (GitHub rejects requests without one).
const USER_AGENT: &str = concat!("cldfbot/", env!("CARGO_PKG_VERSION"));

/// Media type recommended by the GitHub REST API.
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Upper bound on followed pages per organization.
const MAX_PAGES: usize = 100;

/// Matches the `rel="next"` target of a `Link` header.
static NEXT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("next link regex"));

/// The fields we read from a repository object.
#[derive(Debug, Deserialize)]
struct RepoPayload {
    name: String,
    clone_url: String,
}

/// Lists organization repositories through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: Client,
    api_url: Url,
    per_page: u32,
    token: Option<String>,
}

impl GithubClient {
    /// Build a client, reading the token from the configured env var.
    pub fn from_config(config: &GithubConfig) -> Result<Self> {
        Self::new(config, github_token(config))
    }

    pub fn new(config: &GithubConfig, token: Option<String>) -> Result<Self> {
        let api_url = Url::parse(&config.api_url).map_err(|e| {
            CldfBotError::config(format!("invalid GitHub API URL '{}': {e}", config.api_url))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CldfBotError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            per_page: config.per_page,
            token,
        })
    }

    /// First page URL of an organization's repository listing.
    fn org_repos_url(&self, org: &str) -> Result<Url> {
        let base = self.api_url.as_str().trim_end_matches('/');
        Url::parse_with_params(
            &format!("{base}/orgs/{org}/repos"),
            &[("per_page", self.per_page.to_string())],
        )
        .map_err(|e| CldfBotError::discovery(org, format!("invalid listing URL: {e}")))
    }

    /// Fetch one page and return its repos plus the next page, if any.
    async fn fetch_page(&self, org: &str, url: &Url) -> Result<(Vec<RemoteRepo>, Option<Url>)> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CldfBotError::discovery(org, format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CldfBotError::discovery(org, format!("{url}: HTTP {status}")));
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link);

        let payload: Vec<RepoPayload> = response
            .json()
            .await
            .map_err(|e| CldfBotError::discovery(org, format!("{url}: malformed response: {e}")))?;

        let repos = payload
            .into_iter()
            .map(|r| RemoteRepo {
                name: r.name,
                clone_url: r.clone_url,
            })
            .collect();

        Ok((repos, next))
    }
}

impl RepoSource for GithubClient {
    #[instrument(skip(self))]
    async fn list_repos(&self, org: &str) -> Result<Vec<RemoteRepo>> {
        let mut url = self.org_repos_url(org)?;
        let mut visited = HashSet::new();
        let mut repos = Vec::new();

        loop {
            if !visited.insert(url.clone()) || visited.len() > MAX_PAGES {
                return Err(CldfBotError::discovery(
                    org,
                    format!("pagination did not terminate at {url}"),
                ));
            }

            let (page, next) = self.fetch_page(org, &url).await?;
            debug!(%url, count = page.len(), "fetched repository page");
            repos.extend(page);

            match next {
                Some(next) => url = next,
                None => break,
            }
        }

        Ok(repos)
    }
}

/// Extract the `rel="next"` URL from a `Link` header value.
fn next_link(header: &str) -> Option<Url> {
    NEXT_LINK_RE
        .captures(header)
        .and_then(|c| c.get(1))
        .and_then(|m| Url::parse(m.as_str()).ok())
}
