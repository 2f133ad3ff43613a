//! Command-line interface definitions for the AI daily report generator.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. The config path can also come from the `CONFIG_PATH` environment
//! variable.

use crate::config::DEFAULT_CONFIG_PATH;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the report generator.
///
/// Without a subcommand a single report run is performed.
///
/// # Examples
///
/// ```sh
/// # One run with the default config/config.yaml
/// ai_daily_report
///
/// # Every two hours, without publishing to Notion
/// ai_daily_report --dry-run schedule --interval 7200
///
/// # Re-publish a stored report
/// ai_daily_report sync --date 2024-12-12
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Write reports locally but skip Notion
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Generate and publish today's report once
    Run,
    /// Generate reports repeatedly until interrupted
    Schedule {
        /// Seconds between runs; defaults to crawler.update_interval_secs
        #[arg(short, long)]
        interval: Option<u64>,
    },
    /// Publish a previously saved report to Notion
    Sync {
        /// Report date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,
    },
    /// Archive Notion report pages older than notion.retention_days
    Cleanup,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Run)
    }
}
