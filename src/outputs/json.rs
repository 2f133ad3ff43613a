//! JSON persistence for reports.
//!
//! One file per day, `{output_dir}/report_{YYYY-MM-DD}.json`. Saving the
//! same date twice overwrites the earlier file.

use crate::models::Report;
use chrono::NaiveDate;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Path of the JSON file for `date`.
pub fn report_path(output_dir: &Path, date: NaiveDate) -> PathBuf {
    output_dir.join(format!("report_{}.json", date.format("%Y-%m-%d")))
}

/// Write `report` as pretty-printed JSON, creating `output_dir` if needed.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), date = %report.date))]
pub async fn save_report(report: &Report, output_dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(error = %e, "Failed to create report dir");
        return Err(e.into());
    }

    let path = report_path(output_dir, report.date);
    fs::write(&path, json).await?;
    info!(path = %path.display(), entries = report.entries.len(), "Report saved");
    Ok(path)
}

/// Read the report saved for `date`.
///
/// # Errors
///
/// Fails with a message naming the path when no report exists, or with the
/// JSON error when the file is corrupt.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), %date))]
pub async fn load_report(output_dir: &Path, date: NaiveDate) -> Result<Report, Box<dyn Error>> {
    let path = report_path(output_dir, date);
    if !path.exists() {
        return Err(format!("Report file not found: {}", path.display()).into());
    }
    let raw = fs::read_to_string(&path).await?;
    let report: Report = serde_json::from_str(&raw).map_err(|e| {
        error!(path = %path.display(), error = %e, "Error decoding report JSON");
        e
    })?;
    info!(path = %path.display(), "Report loaded");
    Ok(report)
}
