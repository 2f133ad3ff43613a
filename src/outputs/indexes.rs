//! Index file management for navigation.
//!
//! `index.md` lists every report date once, newest first:
//!
//! ```text
//! # AI Daily Reports
//!
//! - [2024-12-12](./report_2024-12-12.md) · 12 articles
//! - [2024-12-11](./report_2024-12-11.md) · 9 articles
//! ```
//!
//! Running again for a date that is already listed replaces its line, so
//! hourly scheduled runs do not pile up duplicates.

use crate::models::Report;
use std::collections::BTreeMap;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

const INDEX_FILE: &str = "index.md";
const INDEX_HEADER: &str = "# AI Daily Reports";

/// The date a `- [YYYY-MM-DD](...)` line is about.
fn line_date(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("- [")?;
    let end = rest.find(']')?;
    Some(&rest[..end])
}

/// Merge the entry for `report` into existing index text.
pub fn merge_index(existing: &str, report: &Report, linked_file: &str) -> String {
    let mut lines: BTreeMap<String, String> = existing
        .lines()
        .filter_map(|l| line_date(l.trim()).map(|d| (d.to_string(), l.trim().to_string())))
        .collect();

    let date = report.date.format("%Y-%m-%d").to_string();
    let noun = if report.entries.len() == 1 { "article" } else { "articles" };
    let line = format!(
        "- [{}](./{}) · {} {}",
        date,
        linked_file,
        report.entries.len(),
        noun
    );
    lines.insert(date, line);

    let mut out = format!("{}\n\n", INDEX_HEADER);
    for line in lines.values().rev() {
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Add or refresh the line for `report` in `{output_dir}/index.md`.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), date = %report.date, file = %linked_file))]
pub async fn update_report_index(
    output_dir: &Path,
    report: &Report,
    linked_file: &str,
) -> Result<(), Box<dyn Error>> {
    let index_path = output_dir.join(INDEX_FILE);
    let existing = if index_path.exists() {
        fs::read_to_string(&index_path).await?
    } else {
        String::new()
    };

    fs::write(&index_path, merge_index(&existing, report, linked_file)).await?;
    info!(path = %index_path.display(), "Updated report index");
    Ok(())
}
