//! Publishing reports to a Notion database.
//!
//! One page per report date. A second run on the same day appends only the
//! entries whose ids are not yet recorded anywhere in the database, then
//! widens the page's `article_ids` multi-select to cover them.

pub mod blocks;
pub mod client;
#[cfg(test)]
mod stub;

use crate::config::NotionConfig;
use crate::error::ApiError;
use crate::models::{Report, ReportEntry};
use chrono::{Duration, NaiveDate};
use client::{NotionClient, Page, MAX_BLOCKS_PER_REQUEST};
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, error, info, instrument, warn};

pub struct NotionSync {
    client: NotionClient,
    config: NotionConfig,
}

impl NotionSync {
    pub fn new(config: &NotionConfig) -> Result<Self, ApiError> {
        if config.api_key.trim().is_empty() {
            return Err(ApiError::Config("Notion API key not configured".into()));
        }
        if config.database_id.trim().is_empty() {
            return Err(ApiError::Config("Notion database id not configured".into()));
        }
        Ok(Self {
            client: NotionClient::new(config.api_key.trim())?,
            config: config.clone(),
        })
    }

    #[cfg(test)]
    fn with_client(client: NotionClient, config: NotionConfig) -> Self {
        Self { client, config }
    }

    /// Publish `report` and return the URL of its page.
    #[instrument(level = "info", skip_all, fields(date = %report.date, entries = report.entries.len()))]
    pub async fn sync_report(&self, report: &Report) -> Result<String, ApiError> {
        let page = match self.find_report_page(report.date).await {
            Some(page) => {
                info!(page_id = %page.id, "Found existing page for date; adding articles");
                page
            }
            None => {
                info!("Creating report page");
                self.create_report_page(report).await?
            }
        };

        let added = self.add_entries(&page, &report.entries).await?;
        info!(added, url = %page.url, "Notion sync complete");
        Ok(page.url)
    }

    /// The report page for `date`. Lookup failures are logged and treated
    /// as "no page yet".
    async fn find_report_page(&self, date: NaiveDate) -> Option<Page> {
        let filter = blocks::report_page_filter(date, &self.config.report_category);
        match self
            .client
            .query_database(&self.config.database_id, filter)
            .await
        {
            Ok(pages) => pages.into_iter().next(),
            Err(e) => {
                error!(error = %e, "Error finding report page");
                None
            }
        }
    }

    async fn create_report_page(&self, report: &Report) -> Result<Page, ApiError> {
        let mut body = json!({
            "parent": { "database_id": self.config.database_id },
            "properties": blocks::page_properties(report, &self.config.report_category),
        });
        match self.config.cover_url.as_deref() {
            Some(cover) if blocks::is_web_url(cover) => {
                body["cover"] = blocks::external_cover(cover);
            }
            Some(cover) => warn!(cover, "Ignoring cover_url that is not an http(s) URL"),
            None => {}
        }
        self.client.create_page(body).await
    }

    /// Append blocks for entries not yet published and record their ids.
    /// Returns how many entries were added.
    ///
    /// Blocks go out one [`EntryBatch`](blocks::EntryBatch) at a time and
    /// `article_ids` is widened after each batch, so a failure part way
    /// through leaves the page and its id list in agreement. Once the page
    /// holds [`MULTI_SELECT_LIMIT`](blocks::MULTI_SELECT_LIMIT) ids the
    /// remaining entries are skipped; recorded ids are never dropped.
    async fn add_entries(&self, page: &Page, entries: &[ReportEntry]) -> Result<usize, ApiError> {
        let mut known = blocks::existing_article_ids(&page.properties);
        let mut seen: HashSet<String> = known.iter().cloned().collect();
        let capacity = blocks::MULTI_SELECT_LIMIT.saturating_sub(known.len());

        let mut pending: Vec<&ReportEntry> = Vec::new();
        for entry in entries {
            if seen.contains(&entry.id) || self.article_exists(&entry.id).await {
                info!(id = %entry.id, title = %entry.title, "Article already in Notion; skipping");
                continue;
            }
            if pending.len() == capacity {
                warn!(
                    id = %entry.id,
                    limit = blocks::MULTI_SELECT_LIMIT,
                    "Page article_ids is full; skipping article"
                );
                continue;
            }
            seen.insert(entry.id.clone());
            pending.push(entry);
        }

        let mut added = 0;
        for batch in blocks::entry_batches(&pending, MAX_BLOCKS_PER_REQUEST) {
            self.client.append_children(&page.id, &batch.blocks).await?;
            known.extend(batch.ids.iter().cloned());
            let body = json!({
                "properties": { "article_ids": blocks::article_ids_property(&known) }
            });
            self.client.update_page(&page.id, body).await?;
            added += batch.ids.len();
            debug!(batch = batch.ids.len(), recorded = known.len(), "Appended batch");
        }
        Ok(added)
    }

    /// Whether any page in the database already lists `article_id`.
    /// A failed lookup counts as "not present".
    pub async fn article_exists(&self, article_id: &str) -> bool {
        match self
            .client
            .query_database(&self.config.database_id, blocks::article_filter(article_id))
            .await
        {
            Ok(pages) => !pages.is_empty(),
            Err(e) => {
                error!(article_id, error = %e, "Error checking article existence");
                false
            }
        }
    }

    /// Archive report pages dated before `today - retention_days`.
    #[instrument(level = "info", skip_all, fields(%today, retention_days = self.config.retention_days))]
    pub async fn cleanup_old_reports(&self, today: NaiveDate) -> Result<usize, ApiError> {
        let cutoff = cleanup_cutoff(today, self.config.retention_days);
        let pages = self
            .client
            .query_database(
                &self.config.database_id,
                blocks::older_than_filter(cutoff, &self.config.report_category),
            )
            .await?;

        for page in &pages {
            self.client
                .update_page(&page.id, json!({ "archived": true }))
                .await?;
        }
        info!(%cutoff, archived = pages.len(), "Cleaned up old reports");
        Ok(pages.len())
    }
}

/// First date that is kept; negative retention is treated as zero.
pub fn cleanup_cutoff(today: NaiveDate, retention_days: i64) -> NaiveDate {
    today - Duration::days(retention_days.max(0))
}
