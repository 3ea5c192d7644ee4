mod cache;
mod cli;
mod entity;
mod gateway;
mod model;
mod orchestrator;
mod print;
mod session;
mod status;
mod table;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;
mod workflow;

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "fair_console=info";

/// The TUI owns the terminal, so in that mode logs go to a file instead of stderr.
fn init_tracing(to_file: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if to_file {
        let dir = dirs::data_local_dir()
            .context("no data directory for this platform")?
            .join("fair-console");
        std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let path = dir.join("console.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open log file {}", path.display()))?;
        builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_non_tui = args.is_headless() || cfg!(not(feature = "tui"));
    init_tracing(!is_non_tui)?;

    cli::run(args).await?;
    if is_non_tui {
        // Explicitly exit on success so lingering blocking writers don't hold the process.
        std::process::exit(0);
    }
    Ok(())
}
