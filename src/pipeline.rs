//! One end-to-end report run: crawl → process → generate → save → publish.

use crate::api::groq_with_backoff;
use crate::config::Config;
use crate::notion::NotionSync;
use crate::outputs::{self, indexes, json, markdown};
use crate::processor::ContentProcessor;
use crate::scrapers;
use chrono::{Local, NaiveDate};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// What a single run produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub fetched: usize,
    pub processed: usize,
    pub report_path: Option<PathBuf>,
    pub notion_url: Option<String>,
}

/// Run the whole pipeline once for today's local date.
///
/// With `dry_run` the report is written to disk but nothing is sent to
/// Notion. The LLM and Notion clients are built before crawling so missing
/// credentials fail the run before any network work.
#[instrument(level = "info", skip_all, fields(dry_run))]
pub async fn run_once(config: &Config, dry_run: bool) -> Result<RunSummary, Box<dyn Error>> {
    let start_time = Instant::now();
    let mut summary = RunSummary::default();

    let llm = groq_with_backoff(&config.processor)?;
    let notion = if dry_run {
        info!("Dry run; Notion sync disabled");
        None
    } else {
        Some(NotionSync::new(&config.notion)?)
    };

    // ---- Crawl ----
    let t0 = Instant::now();
    let articles = scrapers::fetch_news(config).await?;
    summary.fetched = articles.len();
    info!(count = articles.len(), elapsed_ms = t0.elapsed().as_millis(), "Fetched articles");

    if articles.is_empty() {
        warn!("No articles found, stopping run");
        return Ok(summary);
    }

    // ---- Process ----
    let t0 = Instant::now();
    let processor = ContentProcessor::new(llm, config.processor.clone());
    let processed = processor.process_articles(&articles).await;
    summary.processed = processed.len();
    info!(
        fetched = articles.len(),
        processed = processed.len(),
        elapsed_ms = t0.elapsed().as_millis(),
        "Processed articles"
    );

    // ---- Generate & save ----
    let report = outputs::generate_report(Local::now().date_naive(), &processed);
    let output_dir = Path::new(&config.generator.output_dir);
    let report_path = json::save_report(&report, output_dir).await?;
    summary.report_path = Some(report_path.clone());

    if config.generator.markdown {
        match markdown::write_report_markdown(&report, output_dir).await {
            Ok(_) => {
                let linked = markdown::markdown_filename(&report);
                if let Err(e) = indexes::update_report_index(output_dir, &report, &linked).await {
                    error!(error = %e, "Failed to update report index");
                }
            }
            Err(e) => error!(error = %e, "Failed to write report Markdown"),
        }
    }

    // ---- Publish ----
    if let Some(notion) = notion {
        let t0 = Instant::now();
        let url = notion.sync_report(&report).await?;
        info!(%url, elapsed_ms = t0.elapsed().as_millis(), "Report synced to Notion");
        summary.notion_url = Some(url);

        if config.notion.auto_cleanup {
            match notion.cleanup_old_reports(Local::now().date_naive()).await {
                Ok(archived) => info!(archived, "Old reports cleaned up"),
                Err(e) => error!(error = %e, "Failed to clean up old reports"),
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        fetched = summary.fetched,
        processed = summary.processed,
        report = %report_path.display(),
        "Run complete"
    );
    Ok(summary)
}

/// Push the report stored for `date` to Notion.
#[instrument(level = "info", skip_all, fields(%date))]
pub async fn sync_saved(config: &Config, date: NaiveDate) -> Result<String, Box<dyn Error>> {
    let notion = NotionSync::new(&config.notion)?;
    let report = json::load_report(Path::new(&config.generator.output_dir), date).await?;
    let url = notion.sync_report(&report).await?;
    info!(%url, entries = report.entries.len(), "Stored report synced to Notion");
    Ok(url)
}

/// Archive report pages older than the configured retention.
pub async fn cleanup(config: &Config) -> Result<usize, Box<dyn Error>> {
    let notion = NotionSync::new(&config.notion)?;
    Ok(notion.cleanup_old_reports(Local::now().date_naive()).await?)
}
