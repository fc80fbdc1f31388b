//! Assembly of the full master configuration from a catalog, and rendering
//! it for the host CI framework.

use std::collections::HashSet;

use cldfbot_shared::{
    AppConfig, BuilderConfig, CldfBotError, DbConfig, MasterConfig, PbProtocol, Protocols,
    Result, Worker, WwwConfig,
};
use tracing::{debug, instrument};

use crate::catalog::Catalog;
use crate::pipeline::build_pipeline;
use crate::schedulers::{dataset_schedulers, release_builder, release_schedulers};

/// Build the master config: one builder and force trigger per dataset, plus
/// the aggregate `release` target.
///
/// Fails when a dataset belongs to an organization without a profile, or
/// when two builders or schedulers would share a name.
#[instrument(skip_all, fields(datasets = catalog.len()))]
pub fn build_master_config(config: &AppConfig, catalog: &Catalog) -> Result<MasterConfig> {
    let settings = &config.master;
    let worker = settings.worker_name.clone();

    let mut schedulers = release_schedulers(catalog.datasets());
    let mut builders = vec![release_builder(&worker)];

    for dataset in catalog.datasets() {
        let org = config.org(&dataset.org).ok_or_else(|| {
            CldfBotError::validation(format!(
                "dataset '{dataset}' belongs to unconfigured organization '{}'",
                dataset.org
            ))
        })?;

        let factory = build_pipeline(dataset, org, &config.pipeline);
        debug!(builder = %dataset, steps = factory.len(), "builder configured");

        schedulers.extend(dataset_schedulers(dataset));
        builders.push(BuilderConfig {
            name: dataset.id(),
            worker_names: vec![worker.clone()],
            factory,
        });
    }

    ensure_unique("builder", builders.iter().map(|b| b.name.as_str()))?;
    ensure_unique("scheduler", schedulers.iter().map(|s| s.name()))?;

    Ok(MasterConfig {
        title: settings.title.clone(),
        title_url: settings.title_url.clone(),
        buildbot_url: settings.buildbot_url.clone(),
        buildbot_net_usage_data: false,
        generated_at: catalog.refreshed_at(),
        protocols: Protocols {
            pb: PbProtocol {
                port: settings.worker_port,
            },
        },
        www: WwwConfig {
            port: settings.www_port,
            plugins: settings.views.clone(),
        },
        db: DbConfig {
            db_url: settings.db_url.clone(),
        },
        workers: vec![Worker {
            name: worker,
            password: settings.worker_password.clone(),
        }],
        change_source: Vec::new(),
        services: Vec::new(),
        schedulers,
        builders,
    })
}

fn ensure_unique<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CldfBotError::validation(format!("duplicate {kind} name '{name}'")));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render as pretty-printed JSON.
pub fn to_json(master: &MasterConfig) -> Result<String> {
    serde_json::to_string_pretty(master)
        .map_err(|e| CldfBotError::parse(format!("failed to render JSON: {e}")))
}

/// Render as TOML.
pub fn to_toml(master: &MasterConfig) -> Result<String> {
    toml::to_string_pretty(master)
        .map_err(|e| CldfBotError::parse(format!("failed to render TOML: {e}")))
}
