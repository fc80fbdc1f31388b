//! Core domain types: datasets, build steps, schedulers, and the rendered
//! master configuration.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// One remote repository to be built.
///
/// Ordering is by `(org, name)`, which is also the build-target order of the
/// rendered config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dataset {
    /// Owning organization, e.g. `lexibank`.
    pub org: String,
    /// Repository short name, derived from the clone URL.
    pub name: String,
    /// Clone URL.
    pub url: String,
}

impl Dataset {
    /// Build a dataset from its organization and clone URL.
    pub fn new(org: impl Into<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let name = short_name(&url).to_string();
        Self {
            org: org.into(),
            name,
            url,
        }
    }

    /// Composite identifier `org-name`, used as the builder name.
    pub fn id(&self) -> String {
        format!("{}-{}", self.org, self.name)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.org, self.name)
    }
}

/// Trailing path segment of a clone URL with any `.git` suffix removed.
pub fn short_name(url: &str) -> &str {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    last.strip_suffix(".git").unwrap_or(last)
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// Checkout mode understood by the host framework's git step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    Full,
}

/// How an existing workspace is treated before a full checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMethod {
    /// Discard untracked and ignored files.
    Fresh,
}

/// What a step does when the host framework executes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Source checkout into the build workspace.
    Checkout {
        repo_url: String,
        mode: CheckoutMode,
        method: CheckoutMethod,
    },
    /// Run a command (argv) in the workspace.
    Shell { command: Vec<String> },
    /// Fire other schedulers.
    Trigger {
        scheduler_names: Vec<String>,
        wait_for_finish: bool,
    },
}

/// A single named build step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Display name shown to operators.
    pub name: String,
    #[serde(flatten)]
    pub action: StepAction,
    /// Working directory relative to the worker's builder directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
    /// Environment overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Step {
    /// A shell step with no workdir or env overrides.
    pub fn shell<I, S>(name: impl Into<String>, command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            action: StepAction::Shell {
                command: command.into_iter().map(Into::into).collect(),
            },
            workdir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The argv the host framework ends up running for this step.
    ///
    /// For a checkout this is the clone into an empty workspace on a
    /// worker's first build. Later builds of a fresh checkout clean and
    /// reset the existing clone instead; the framework's git step owns that.
    pub fn command(&self) -> Vec<String> {
        match &self.action {
            StepAction::Checkout { repo_url, .. } => {
                vec!["git".into(), "clone".into(), repo_url.clone(), ".".into()]
            }
            StepAction::Shell { command } => command.clone(),
            StepAction::Trigger { .. } => Vec::new(),
        }
    }
}

/// Ordered step sequence of one builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFactory {
    pub steps: Vec<Step>,
}

impl BuildFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Schedulers & builders
// ---------------------------------------------------------------------------

/// A trigger mechanism bound to one or more builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scheduler {
    /// Manual trigger from the dashboard.
    Force {
        name: String,
        builder_names: Vec<String>,
    },
    /// Fired by a `Trigger` step elsewhere.
    Triggerable {
        name: String,
        builder_names: Vec<String>,
    },
}

impl Scheduler {
    pub fn name(&self) -> &str {
        match self {
            Self::Force { name, .. } | Self::Triggerable { name, .. } => name,
        }
    }

    pub fn builder_names(&self) -> &[String] {
        match self {
            Self::Force { builder_names, .. } | Self::Triggerable { builder_names, .. } => {
                builder_names
            }
        }
    }
}

/// A named build target: steps plus the workers allowed to run them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    pub name: String,
    pub worker_names: Vec<String>,
    pub factory: BuildFactory,
}

// ---------------------------------------------------------------------------
// Master config
// ---------------------------------------------------------------------------

/// A worker credential pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub name: String,
    pub password: String,
}

/// Worker protocol listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocols {
    pub pb: PbProtocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbProtocol {
    pub port: u16,
}

/// Web dashboard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WwwConfig {
    pub port: u16,
    /// Enabled dashboard view plugins.
    pub plugins: Vec<String>,
}

/// State store of the host framework.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    pub db_url: String,
}

/// The full configuration document handed to the CI master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterConfig {
    pub title: String,
    pub title_url: String,
    pub buildbot_url: String,
    /// Usage reporting to the framework vendor. Rendered explicitly so the
    /// framework's default of reporting never applies.
    #[serde(default)]
    pub buildbot_net_usage_data: bool,
    /// When the catalog behind this config was discovered.
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub change_source: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    pub protocols: Protocols,
    pub www: WwwConfig,
    pub db: DbConfig,
    pub workers: Vec<Worker>,
    pub schedulers: Vec<Scheduler>,
    pub builders: Vec<BuilderConfig>,
}

impl MasterConfig {
    pub fn builder(&self, name: &str) -> Option<&BuilderConfig> {
        self.builders.iter().find(|b| b.name == name)
    }

    pub fn scheduler(&self, name: &str) -> Option<&Scheduler> {
        self.schedulers.iter().find(|s| s.name() == name)
    }
}
