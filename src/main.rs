//! # AI Daily Report
//!
//! Crawls AI news feeds, summarizes and classifies each article through a
//! Groq-hosted LLM, writes a daily report to disk, and publishes it to a
//! Notion database.
//!
//! ## Usage
//!
//! ```sh
//! ai_daily_report                      # one run
//! ai_daily_report schedule             # every crawler.update_interval_secs
//! ai_daily_report sync --date 2024-12-12
//! ai_daily_report cleanup
//! ```
//!
//! ## Architecture
//!
//! 1. **Crawling**: fetch RSS/Atom feeds, keep AI-related entries, dedupe by URL
//! 2. **Processing**: summary, category, key points, sentiment per article (parallel)
//! 3. **Generation**: group into a dated [`models::Report`], save JSON and Markdown
//! 4. **Publishing**: create or extend the day's Notion page

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod notion;
mod outputs;
mod pipeline;
mod processor;
mod scheduler;
mod scrapers;
mod utils;

use cli::{Cli, Command};
use config::{load_dotenv, Config};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    let dotenv_loaded = load_dotenv();
    let args = Cli::parse();
    let config = Config::load(&args.config)?;

    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "ai_daily_report starting up");
    debug!(?args, dotenv_loaded, config_path = ?config.loaded_from, "Parsed CLI arguments");
    config.log_validation();

    let start_time = std::time::Instant::now();
    match args.command() {
        Command::Run => {
            check_output_dir(&config).await?;
            let summary = pipeline::run_once(&config, args.dry_run).await?;
            info!(
                fetched = summary.fetched,
                processed = summary.processed,
                report = ?summary.report_path,
                notion_url = ?summary.notion_url,
                "Report run finished"
            );
        }
        Command::Schedule { interval } => {
            check_output_dir(&config).await?;
            let secs = interval.unwrap_or(config.crawler.update_interval_secs).max(1);
            scheduler::run_scheduled(&config, Duration::from_secs(secs), args.dry_run).await;
        }
        Command::Sync { date } => {
            let url = pipeline::sync_saved(&config, *date).await?;
            info!(%date, %url, "Sync finished");
        }
        Command::Cleanup => {
            let archived = pipeline::cleanup(&config).await?;
            info!(archived, "Cleanup finished");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

async fn check_output_dir(config: &Config) -> Result<(), Box<dyn Error>> {
    let dir = Path::new(&config.generator.output_dir);
    if let Err(e) = ensure_writable_dir(dir).await {
        error!(
            path = %dir.display(),
            error = %e,
            "Report output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    Ok(())
}
