mod acquire;
mod classify;
mod cli;
mod config;
mod dedup;
mod driver;
mod extract;
mod model;
mod normalize;
mod store;
mod util;
mod writer;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::PipelineConfig;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "import failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.start_year > cli.end_year {
        bail!(
            "start year {} is after end year {}",
            cli.start_year,
            cli.end_year
        );
    }

    let config = PipelineConfig::from_env()?;
    driver::run(&config, cli.year_range())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
