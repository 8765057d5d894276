//! DealDesk TUI: interactive terminal interface for the deal pipeline.
//!
//! Provides tabs for the dashboard, the deal list and detail view, the
//! referent directory, and AI document analysis, built with `ratatui` +
//! `crossterm`. Logs go to a file so they never corrupt the screen.

mod app;
mod screens;
mod widgets;

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use dealdesk_shared::{config_dir, load_config};

const LOG_FILE_NAME: &str = "dealdesk-tui.log";

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing()?;
    let config = load_config()?;
    app::run(config)
}

/// Append logs to `~/.dealdesk/dealdesk-tui.log`. `RUST_LOG` overrides the
/// default `dealdesk=info`.
fn init_tracing() -> Result<()> {
    let dir = config_dir()?;
    fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dealdesk=info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}
