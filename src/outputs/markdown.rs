//! Markdown rendering of a [`Report`].
//!
//! Layout:
//!
//! ```text
//! # AI Daily Report · 2024-12-12
//!
//! 12 articles · generated 2024-12-12 10:00 UTC
//!
//! ## Technical Innovation
//!
//! ### [Title](https://…)
//!
//! Summary paragraph.
//!
//! - key point
//!
//! <small>techcrunch · 2024-12-12 09:00 UTC · relevance 0.82</small>
//! ```

use crate::models::{Category, Report, ReportEntry};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// File name of the Markdown rendering for a report.
pub fn markdown_filename(report: &Report) -> String {
    format!("report_{}.md", report.date.format("%Y-%m-%d"))
}

/// Render the whole report, one section per non-empty category.
pub fn report_to_markdown(report: &Report) -> String {
    let mut md = String::new();
    writeln!(md, "# AI Daily Report · {}\n", report.date).unwrap();
    writeln!(
        md,
        "{} articles · generated {}\n",
        report.metadata.total_articles,
        report.metadata.generation_time.format("%Y-%m-%d %H:%M UTC")
    )
    .unwrap();

    if report.entries.is_empty() {
        writeln!(md, "_No AI news today._").unwrap();
        return md;
    }

    for category in Category::ALL {
        let entries: Vec<&ReportEntry> = report.entries_in(category).collect();
        if entries.is_empty() {
            continue;
        }
        writeln!(md, "## {}\n", category.label()).unwrap();
        for entry in entries {
            write_entry(&mut md, entry);
        }
    }
    md
}

fn write_entry(md: &mut String, entry: &ReportEntry) {
    writeln!(md, "### [{}]({})\n", escape_brackets(&entry.title), entry.url).unwrap();
    if let Some(image) = &entry.image_url {
        writeln!(md, "![]({})\n", image).unwrap();
    }
    if !entry.summary.is_empty() {
        writeln!(md, "{}\n", entry.summary).unwrap();
    }
    if !entry.key_points.is_empty() {
        for point in &entry.key_points {
            writeln!(md, "- {}", point).unwrap();
        }
        md.push('\n');
    }
    writeln!(
        md,
        "<small>{} · {} · relevance {:.2}</small>\n",
        entry.source,
        entry.published_date.format("%Y-%m-%d %H:%M UTC"),
        entry.relevance_score
    )
    .unwrap();
}

fn escape_brackets(s: &str) -> String {
    s.replace('[', "\\[").replace(']', "\\]")
}

/// Render and write the report next to its JSON file.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display(), date = %report.date))]
pub async fn write_report_markdown(
    report: &Report,
    output_dir: &Path,
) -> Result<PathBuf, std::io::Error> {
    fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(markdown_filename(report));
    fs::write(&path, report_to_markdown(report)).await?;
    info!(path = %path.display(), "Wrote report Markdown");
    Ok(path)
}
