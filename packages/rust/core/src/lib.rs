//! Build-graph generation for cldfbot.
//!
//! This crate turns a discovered dataset catalog into the master
//! configuration of the CI host: per-dataset pipelines, their force
//! triggers, and the aggregate `release` target.

pub mod catalog;
pub mod master;
pub mod pipeline;
pub mod schedulers;

pub use catalog::Catalog;
pub use master::{build_master_config, to_json, to_toml};
pub use pipeline::build_pipeline;
