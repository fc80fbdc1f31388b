//! Application configuration for cldfbot.
//!
//! User config lives at `~/.cldfbot/cldfbot.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CldfBotError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "cldfbot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".cldfbot";

// ---------------------------------------------------------------------------
// Config structs (matching cldfbot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// CI master identity, ports and credentials.
    #[serde(default)]
    pub master: MasterSettings,

    /// GitHub API access.
    #[serde(default)]
    pub github: GithubConfig,

    /// Discovery filters.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Per-dataset pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Organizations to build, in discovery order.
    #[serde(default = "default_orgs")]
    pub orgs: Vec<OrgProfile>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            master: MasterSettings::default(),
            github: GithubConfig::default(),
            discovery: DiscoveryConfig::default(),
            pipeline: PipelineConfig::default(),
            orgs: default_orgs(),
        }
    }
}

impl AppConfig {
    /// Look up the profile of an organization.
    pub fn org(&self, name: &str) -> Option<&OrgProfile> {
        self.orgs.iter().find(|o| o.name == name)
    }

    /// Reject configurations that would produce an ambiguous build graph.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for org in &self.orgs {
            if org.name.trim().is_empty() {
                return Err(CldfBotError::config("organization name must not be empty"));
            }
            if !seen.insert(org.name.as_str()) {
                return Err(CldfBotError::config(format!(
                    "organization '{}' is listed more than once",
                    org.name
                )));
            }
        }

        if self.github.per_page == 0 || self.github.per_page > 100 {
            return Err(CldfBotError::config("github.per_page must be between 1 and 100"));
        }
        if self.github.timeout_secs == 0 {
            return Err(CldfBotError::config("github.timeout_secs must be greater than 0"));
        }
        url::Url::parse(&self.github.api_url).map_err(|e| {
            CldfBotError::config(format!("invalid github.api_url '{}': {e}", self.github.api_url))
        })?;

        if self.master.worker_name.is_empty() {
            return Err(CldfBotError::config("master.worker_name must not be empty"));
        }
        if self.master.www_port == self.master.worker_port {
            return Err(CldfBotError::config(
                "master.www_port and master.worker_port must differ",
            ));
        }

        Ok(())
    }
}

/// `[master]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterSettings {
    /// Dashboard title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Link behind the dashboard title.
    #[serde(default = "default_title_url")]
    pub title_url: String,

    /// Externally visible dashboard URL.
    #[serde(default = "default_buildbot_url")]
    pub buildbot_url: String,

    /// Web dashboard port.
    #[serde(default = "default_www_port")]
    pub www_port: u16,

    /// Worker protocol port.
    #[serde(default = "default_worker_port")]
    pub worker_port: u16,

    /// State store URL of the master.
    #[serde(default = "default_db_url")]
    pub db_url: String,

    #[serde(default = "default_worker_name")]
    pub worker_name: String,

    #[serde(default = "default_worker_password")]
    pub worker_password: String,

    /// Dashboard view plugins to enable.
    #[serde(default = "default_views")]
    pub views: Vec<String>,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            title_url: default_title_url(),
            buildbot_url: default_buildbot_url(),
            www_port: default_www_port(),
            worker_port: default_worker_port(),
            db_url: default_db_url(),
            worker_name: default_worker_name(),
            worker_password: default_worker_password(),
            views: default_views(),
        }
    }
}

fn default_title() -> String {
    "CLDF Buildbot".into()
}
fn default_title_url() -> String {
    "https://lexibot.github.io/".into()
}
fn default_buildbot_url() -> String {
    "http://localhost:8010/".into()
}
fn default_www_port() -> u16 {
    8010
}
fn default_worker_port() -> u16 {
    9989
}
fn default_db_url() -> String {
    "sqlite:///state.sqlite".into()
}
fn default_worker_name() -> String {
    "worker".into()
}
fn default_worker_password() -> String {
    "pass".into()
}
fn default_views() -> Vec<String> {
    vec![
        "waterfall_view".into(),
        "console_view".into(),
        "grid_view".into(),
    ]
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Name of the env var holding an API token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Page size for repository listings (GitHub caps this at 100).
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout(),
            per_page: default_per_page(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_per_page() -> u32 {
    100
}

/// `[discovery]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Restrict discovery to these repository names. Unset builds everything
    /// that is not excluded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only: Option<Vec<String>>,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Workspace directory the steps run in, relative to the builder dir.
    #[serde(default = "default_workdir")]
    pub workdir: String,

    /// `PYTHONPATH` for every step, so the workspace root is importable.
    #[serde(default = "default_python_path")]
    pub python_path: String,

    /// Test tooling installed next to each dataset.
    #[serde(default = "default_tools")]
    pub tools: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            python_path: default_python_path(),
            tools: default_tools(),
        }
    }
}

fn default_workdir() -> String {
    "build".into()
}
fn default_python_path() -> String {
    ".".into()
}
fn default_tools() -> Vec<String> {
    vec!["pytest".into(), "pytest-cldf".into()]
}

/// `[[orgs]]` entry — an organization to discover, with its exclusions and
/// the checks its datasets get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgProfile {
    /// GitHub organization login.
    pub name: String,

    /// Repository names never built.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// CLDF metadata file under `cldf/`; enables format validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<String>,

    /// `cldfbench` subcommand run against each dataset; enables the lint step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_command: Option<String>,
}

impl OrgProfile {
    /// A profile with no exclusions and no optional checks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exclude: Vec::new(),
            metadata_file: None,
            check_command: None,
        }
    }

    pub fn is_excluded(&self, repo_name: &str) -> bool {
        self.exclude.iter().any(|e| e == repo_name)
    }

    /// Metadata file to validate, treating an empty name as unset.
    pub fn metadata_file(&self) -> Option<&str> {
        self.metadata_file.as_deref().filter(|m| !m.is_empty())
    }

    /// Check subcommand, treating an empty name as unset.
    pub fn check_command(&self) -> Option<&str> {
        self.check_command.as_deref().filter(|c| !c.is_empty())
    }
}

fn default_orgs() -> Vec<OrgProfile> {
    vec![
        OrgProfile {
            name: "lexibank".into(),
            exclude: vec![
                "pylexibank".into(),
                "lexibank".into(),
                "phylogenetics-data-management-tutorial".into(),
                "template".into(),
            ],
            metadata_file: Some("cldf-metadata.json".into()),
            check_command: Some("lexibank.check".into()),
        },
        OrgProfile {
            name: "cldf-datasets".into(),
            exclude: vec!["cldf-datasets".into()],
            metadata_file: None,
            check_command: None,
        },
    ]
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.cldfbot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CldfBotError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.cldfbot/cldfbot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CldfBotError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| CldfBotError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CldfBotError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CldfBotError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CldfBotError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the GitHub token from the configured env var, if set and non-empty.
pub fn github_token(config: &GithubConfig) -> Option<String> {
    std::env::var(&config.token_env)
        .ok()
        .filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("GITHUB_TOKEN"));
        assert!(toml_str.contains("cldf-metadata.json"));
        assert!(!toml_str.contains("only"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.master.www_port, 8010);
        assert_eq!(parsed.master.worker_port, 9989);
        assert_eq!(parsed.orgs, config.orgs);
    }

    #[test]
    fn empty_file_equals_defaults() {
        let config: AppConfig = toml::from_str("").expect("parse");
        assert_eq!(config.orgs.len(), 2);
        assert_eq!(config.orgs[0].name, "lexibank");
        assert!(config.orgs[0].is_excluded("template"));
        assert_eq!(config.orgs[1].name, "cldf-datasets");
        assert_eq!(config.pipeline.tools, ["pytest", "pytest-cldf"]);
        assert!(config.discovery.only.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn orgs_keep_file_order() {
        let toml_str = r#"
[discovery]
only = ["dryerorder"]

[[orgs]]
name = "zeta"

[[orgs]]
name = "alpha"
exclude = ["template"]
metadata_file = ""
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        let names: Vec<_> = config.orgs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(config.discovery.only.as_deref(), Some(&["dryerorder".to_string()][..]));
        assert_eq!(config.org("alpha").and_then(OrgProfile::metadata_file), None);
    }

    #[test]
    fn duplicate_orgs_rejected() {
        let mut config = AppConfig::default();
        config.orgs.push(OrgProfile::new("lexibank"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn bad_values_rejected() {
        let mut config = AppConfig::default();
        config.github.per_page = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.github.api_url = "not a url".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.orgs.push(OrgProfile::new("  "));
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.master.worker_port = config.master.www_port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_from_file() {
        let dir = std::env::temp_dir().join(format!("cldfbot-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("cldfbot.toml");
        std::fs::write(&path, "[master]\ntitle = \"Test Bot\"\n").expect("write config");

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.master.title, "Test Bot");
        assert_eq!(config.master.db_url, "sqlite:///state.sqlite");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_config_from_validates() {
        let dir = std::env::temp_dir().join(format!("cldfbot-invalid-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("cldfbot.toml");
        std::fs::write(&path, "[master]\nwww_port = 9989\nworker_port = 9989\n")
            .expect("write config");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("must differ"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/cldfbot.toml")).unwrap_err();
        assert!(matches!(err, CldfBotError::Io { .. }));
    }

    #[test]
    fn token_from_env() {
        let config = GithubConfig {
            token_env: "CLDFBOT_TEST_NONEXISTENT_TOKEN_12345".into(),
            ..GithubConfig::default()
        };
        assert!(github_token(&config).is_none());
    }
}
