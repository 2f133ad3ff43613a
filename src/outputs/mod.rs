//! Report assembly and on-disk output.
//!
//! - [`generate_report`]: turn processed articles into a [`Report`]
//! - [`json`]: save and load `report_{date}.json`
//! - [`markdown`]: render a report for reading
//! - [`indexes`]: keep `index.md` listing every report date
//!
//! ```text
//! output_dir/
//! ├── index.md
//! ├── report_2024-12-12.json
//! └── report_2024-12-12.md
//! ```

pub mod indexes;
pub mod json;
pub mod markdown;

use crate::models::{ProcessedArticle, Report, ReportEntry, ReportMetadata};
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;

pub const REPORT_VERSION: &str = "1.0";

/// Build the report for `date`; entries keep the order of `articles`.
pub fn generate_report(date: NaiveDate, articles: &[ProcessedArticle]) -> Report {
    let entries: Vec<ReportEntry> = articles.iter().map(ReportEntry::from).collect();

    let mut by_category = BTreeMap::new();
    for entry in &entries {
        *by_category.entry(entry.category).or_insert(0) += 1;
    }

    Report {
        date,
        metadata: ReportMetadata {
            total_articles: entries.len(),
            generation_time: Utc::now(),
            version: REPORT_VERSION.to_string(),
            by_category,
        },
        entries,
    }
}
