//! DealDesk CLI: deal tracking for an asset-management desk.
//!
//! Lists and edits deals and referents, imports contacts from CSV, and
//! pre-fills deals from documents through the AI classifier.

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
