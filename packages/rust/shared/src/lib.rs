//! Shared types, error model, and configuration for cldfbot.
//!
//! This crate is the foundation depended on by all other cldfbot crates.
//! It provides:
//! - [`CldfBotError`] — the unified error type
//! - Domain types ([`Dataset`], [`Step`], [`BuildFactory`], [`Scheduler`], [`MasterConfig`])
//! - Configuration ([`AppConfig`], [`OrgProfile`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DiscoveryConfig, GithubConfig, MasterSettings, OrgProfile, PipelineConfig,
    config_dir, config_file_path, github_token, init_config, load_config, load_config_from,
};
pub use error::{CldfBotError, Result};
pub use types::{
    BuildFactory, BuilderConfig, CheckoutMethod, CheckoutMode, Dataset, DbConfig, MasterConfig,
    PbProtocol, Protocols, Scheduler, Step, StepAction, Worker, WwwConfig, short_name,
};
