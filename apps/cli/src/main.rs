//! cldfbot CLI — generates the CI master configuration for CLDF datasets.
//!
//! Discovers dataset repositories on GitHub and renders the builders and
//! schedulers that build, validate and test each of them.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
