//! LinkScout CLI: discover relevant professional contacts at target companies.
//!
//! Walks company member listings, scores each profile with a local model,
//! and exports the matches with short justifications.

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
