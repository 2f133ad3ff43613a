//! Periodic runs until Ctrl-C.

use crate::config::Config;
use crate::pipeline::{self, RunSummary};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Run the pipeline every `interval` until interrupted.
///
/// A failed run is logged and the loop waits for the next tick. Ctrl-C
/// during a run or during the wait ends the loop cleanly.
#[instrument(level = "info", skip_all, fields(interval_secs = interval.as_secs(), dry_run))]
pub async fn run_scheduled(config: &Config, interval: Duration, dry_run: bool) {
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut run = 0u64;

    loop {
        run += 1;
        info!(run, started_at = %chrono::Local::now(), "Starting scheduled run");

        tokio::select! {
            result = pipeline::run_once(config, dry_run) => log_outcome(run, result),
            _ = &mut shutdown => {
                info!(run, "Interrupted during run; shutting down");
                return;
            }
        }

        info!(run, wait_secs = interval.as_secs(), "Waiting until next run");
        tokio::select! {
            _ = sleep(interval) => {}
            _ = &mut shutdown => {
                info!(run, "Interrupted; shutting down");
                return;
            }
        }
    }
}

fn log_outcome(run: u64, result: Result<RunSummary, Box<dyn std::error::Error>>) {
    match result {
        Ok(summary) => info!(
            run,
            fetched = summary.fetched,
            processed = summary.processed,
            notion_url = summary.notion_url.as_deref().unwrap_or("-"),
            "Scheduled run finished"
        ),
        Err(e) => error!(run, error = %e, "Scheduled run failed; will retry next interval"),
    }
}
