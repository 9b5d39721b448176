//! topicrawl CLI: topic-directed web crawling.
//!
//! Creates crawl tasks, runs launches on demand or on a schedule, and
//! reports the sources each launch kept.

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
