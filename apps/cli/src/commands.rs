//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use cldfbot_core::{Catalog, build_master_config, to_json, to_toml};
use cldfbot_discovery::{DiscoveryFilter, DiscoveryProgress, GithubClient, StaticRepoSource};
use cldfbot_shared::{AppConfig, init_config, load_config, load_config_from};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// cldfbot — CI master configuration for CLDF datasets.
#[derive(Parser)]
#[command(
    name = "cldfbot",
    version,
    about = "Discover CLDF dataset repositories and generate the CI master configuration that builds them.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.cldfbot/cldfbot.toml).
    #[arg(short, long, global = true, env = "CLDFBOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Master config output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Json,
    Toml,
}

/// Options shared by every command that runs discovery.
#[derive(clap::Args, Debug)]
pub(crate) struct DiscoveryArgs {
    /// Only build these repositories (repeatable). Overrides `[discovery] only`.
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Restrict to the development allowlist.
    #[arg(long, conflicts_with = "only")]
    pub dev: bool,

    /// Read repositories from a JSON file (`{"org": ["clone_url", ...]}`)
    /// instead of the GitHub API.
    #[arg(long, value_name = "PATH")]
    pub repos_file: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Discover datasets and print the master configuration.
    Render {
        #[command(flatten)]
        discovery: DiscoveryArgs,

        /// Output format.
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Discover datasets and list their build targets.
    Datasets {
        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "cldfbot=info",
        1 => "cldfbot=debug",
        _ => "cldfbot=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so rendered configs can be piped.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Render {
            discovery,
            format,
            out,
        } => cmd_render(config_path, &discovery, &format, out.as_deref()).await,
        Command::Datasets { discovery } => cmd_datasets(config_path, &discovery).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Config files are validated as they are loaded.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// CLI flags win over the config file's include list.
fn resolve_filter(args: &DiscoveryArgs, config: &AppConfig) -> DiscoveryFilter {
    if args.dev {
        DiscoveryFilter::dev()
    } else if !args.only.is_empty() {
        DiscoveryFilter::only(args.only.iter().cloned())
    } else {
        DiscoveryFilter::from_config(&config.discovery)
    }
}

/// Refresh the catalog from the repos file or the GitHub API.
async fn refresh_catalog(args: &DiscoveryArgs, config: &AppConfig) -> Result<Catalog> {
    let filter = resolve_filter(args, config);
    if let Some(only) = &filter.only {
        info!(?only, "discovery restricted to include list");
    }

    let reporter = CliProgress::new();
    let catalog = match &args.repos_file {
        Some(path) => {
            info!(path = %path.display(), "reading repositories from file");
            let source = StaticRepoSource::from_json_file(path)?;
            Catalog::refresh(&source, config, &filter, &reporter).await
        }
        None => {
            let client = GithubClient::from_config(&config.github)?;
            Catalog::refresh(&client, config, &filter, &reporter).await
        }
    };
    reporter.finish();

    Ok(catalog?)
}

async fn cmd_render(
    config_path: Option<&Path>,
    args: &DiscoveryArgs,
    format: &OutputFormat,
    out: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(config_path)?;
    let catalog = refresh_catalog(args, &config).await?;

    let master = build_master_config(&config, &catalog)?;
    let rendered = match format {
        OutputFormat::Json => to_json(&master)?,
        OutputFormat::Toml => to_toml(&master)?,
    };

    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| eyre!("failed to write '{}': {e}", path.display()))?;
            info!(
                path = %path.display(),
                builders = master.builders.len(),
                schedulers = master.schedulers.len(),
                "master config written"
            );
        }
        None => println!("{rendered}"),
    }

    Ok(())
}

async fn cmd_datasets(config_path: Option<&Path>, args: &DiscoveryArgs) -> Result<()> {
    let config = resolve_config(config_path)?;
    let catalog = refresh_catalog(args, &config).await?;

    if catalog.is_empty() {
        println!("No datasets discovered.");
        return Ok(());
    }

    let width = catalog
        .datasets()
        .iter()
        .map(|ds| ds.id().len())
        .max()
        .unwrap_or(0);

    for ds in catalog.datasets() {
        println!("  {:<width$}  {}", ds.id(), ds.url);
    }
    println!();
    println!("  {} dataset(s)", catalog.len());

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl DiscoveryProgress for CliProgress {
    fn org_started(&self, org: &str) {
        self.spinner.set_message(format!("Listing repositories of {org}"));
    }

    fn org_listed(&self, org: &str, listed: usize, selected: usize) {
        self.spinner
            .set_message(format!("{org}: {selected} of {listed} repositories selected"));
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
