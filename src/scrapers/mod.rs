//! News crawling: fetch configured feeds and keep the AI-related entries.
//!
//! Each configured [`FeedSource`] is fetched concurrently with one shared
//! HTTP client. A source that fails (network error, non-200, unparseable
//! feed) is logged and contributes nothing; the run carries on with the
//! others.
//!
//! Per entry the crawler:
//! 1. drops it unless title, summary, or tags mention a configured keyword
//! 2. parses the publication date (falls back to now)
//! 3. picks full content over the summary and strips the markup
//!
//! The combined list is deduplicated by URL and sorted newest first.

pub mod feed;

use crate::config::{Config, CrawlerConfig, FeedSource};
use crate::models::RawArticle;
use crate::utils::{article_id, strip_html};
use chrono::Utc;
use feed::{parse_date, parse_feed, FeedEntry};
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::collections::HashSet;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.8, */*;q=0.5";

/// Build the HTTP client used for every feed request.
pub fn build_client(crawler: &CrawlerConfig) -> Result<Client, Box<dyn Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));

    let mut builder = Client::builder()
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .user_agent(crawler.user_agent.clone())
        .default_headers(headers);

    if let Some(proxy) = crawler.proxy.as_deref().filter(|p| !p.is_empty()) {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        info!(%proxy, "Using proxy for feed requests");
    }

    Ok(builder.build()?)
}

/// Fetch every configured source and return unique AI-related articles,
/// newest first.
///
/// # Errors
///
/// Only fails when the HTTP client cannot be built; individual source
/// failures are logged and skipped.
#[instrument(level = "info", skip_all, fields(sources = config.sources.len()))]
pub async fn fetch_news(config: &Config) -> Result<Vec<RawArticle>, Box<dyn Error>> {
    let client = build_client(&config.crawler)?;
    let max = config.crawler.max_articles_per_source;

    let results = join_all(
        config
            .sources
            .iter()
            .map(|source| fetch_source(&client, source, max)),
    )
    .await;

    let mut articles = Vec::new();
    for (source, result) in config.sources.iter().zip(results) {
        match result {
            Ok(found) => {
                info!(source = %source.name, count = found.len(), "Found articles");
                articles.extend(found);
            }
            Err(e) => error!(source = %source.name, error = %e, "Error fetching news"),
        }
    }

    let unique = deduplicate(articles);
    info!(count = unique.len(), "After deduplication");
    Ok(unique)
}

/// Fetch one feed and turn its matching entries into articles.
#[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.feed_url))]
pub async fn fetch_source(
    client: &Client,
    source: &FeedSource,
    max_articles: usize,
) -> Result<Vec<RawArticle>, Box<dyn Error>> {
    let response = client.get(&source.feed_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!("{} returned status {}", source.feed_url, status).into());
    }

    let body = response.text().await?;
    let entries = parse_feed(&body)?;
    info!(entries = entries.len(), "Parsed feed");

    let articles = select_articles(entries, source, max_articles);
    info!(count = articles.len(), "Selected AI-related articles");
    Ok(articles)
}

/// Filter, convert, and cap the entries of one feed.
pub fn select_articles(
    entries: Vec<FeedEntry>,
    source: &FeedSource,
    max_articles: usize,
) -> Vec<RawArticle> {
    let mut articles = Vec::new();
    for entry in entries {
        if articles.len() >= max_articles {
            break;
        }
        if !is_ai_related(&entry, &source.keywords) {
            continue;
        }
        match to_article(entry, &source.name) {
            Some(article) => {
                debug!(title = %article.title, url = %article.url, "Found article");
                articles.push(article);
            }
            None => warn!(source = %source.name, "Skipping entry without a link"),
        }
    }
    articles
}

/// Case-insensitive keyword match over title, summary, and tags.
/// An empty keyword list accepts everything.
pub fn is_ai_related(entry: &FeedEntry, keywords: &[String]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let haystack = format!(
        "{} {} {}",
        entry.title,
        entry.summary,
        entry.tags.join(" ")
    )
    .to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
}

fn to_article(entry: FeedEntry, source: &str) -> Option<RawArticle> {
    let url = entry.link.trim().to_string();
    if url.is_empty() {
        return None;
    }

    let published_date = entry
        .published
        .as_deref()
        .and_then(parse_date)
        .unwrap_or_else(Utc::now);

    let raw_content = if entry.content.trim().is_empty() {
        &entry.summary
    } else {
        &entry.content
    };
    let title = strip_html(&entry.title);
    let mut content = strip_html(raw_content);
    if content.is_empty() {
        content = title.clone();
    }

    Some(RawArticle {
        id: article_id(&url),
        title,
        url,
        content,
        published_date,
        source: source.to_string(),
        author: entry.author,
        tags: entry.tags,
        image_url: entry.image_url,
    })
}

/// Keep the first article seen for each URL, drop URL-less ones, and sort
/// newest first.
pub fn deduplicate(articles: Vec<RawArticle>) -> Vec<RawArticle> {
    let mut seen = HashSet::new();
    let mut unique: Vec<RawArticle> = articles
        .into_iter()
        .filter(|a| !a.url.is_empty() && seen.insert(a.url.clone()))
        .collect();
    unique.sort_by(|a, b| b.published_date.cmp(&a.published_date));
    unique
}
