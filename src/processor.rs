//! Article analysis: summarize, classify, extract key points, score.
//!
//! Each article goes through up to four LLM calls. Only the summary is
//! mandatory: when it fails the article is dropped. Classification, key
//! points, and sentiment degrade to `Uncategorized`, an empty list, and
//! neutral respectively.

use crate::api::{AskAsync, Prompt};
use crate::config::ProcessorConfig;
use crate::error::ApiError;
use crate::models::{Category, ProcessedArticle, RawArticle, Sentiment, SentimentLabel};
use crate::utils::{truncate_chars, truncate_for_log};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::cmp::Ordering;
use tracing::{debug, error, info, instrument, warn};

static BULLET_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]+|\d+[.)])\s*").unwrap());

/// Runs the analysis prompts against an [`AskAsync`] backend.
pub struct ContentProcessor<A> {
    llm: A,
    config: ProcessorConfig,
}

impl<A> ContentProcessor<A>
where
    A: AskAsync,
{
    pub fn new(llm: A, config: ProcessorConfig) -> Self {
        Self { llm, config }
    }

    /// Analyse every article, keep those at or above
    /// `min_relevance_score`, and sort by relevance (ties: newest first).
    #[instrument(level = "info", skip_all, fields(count = articles.len()))]
    pub async fn process_articles(&self, articles: &[RawArticle]) -> Vec<ProcessedArticle> {
        let concurrency = self.config.concurrency.max(1);
        info!(concurrency, "Starting article processing");

        let results: Vec<Option<ProcessedArticle>> = stream::iter(articles.iter().enumerate())
            .map(|(i, article)| async move {
                match self.process_single(article).await {
                    Ok(p) => {
                        info!(index = i, relevance = p.relevance_score, "Processed article");
                        Some(p)
                    }
                    Err(e) => {
                        error!(index = i, url = %article.url, error = %e, "Error processing article; skipping");
                        None
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let processed: Vec<ProcessedArticle> = results.into_iter().flatten().collect();
        let before = processed.len();
        let mut kept: Vec<ProcessedArticle> = processed
            .into_iter()
            .filter(|p| p.relevance_score >= self.config.min_relevance_score)
            .collect();
        if kept.len() < before {
            info!(
                dropped = before - kept.len(),
                min = self.config.min_relevance_score,
                "Dropped articles below relevance threshold"
            );
        }
        sort_by_relevance(&mut kept);
        info!(
            total = articles.len(),
            kept = kept.len(),
            "Completed article processing"
        );
        kept
    }

    /// Run the analysis steps for one article.
    ///
    /// # Errors
    ///
    /// Fails only when the summary cannot be produced.
    #[instrument(level = "debug", skip_all, fields(url = %article.url))]
    pub async fn process_single(&self, article: &RawArticle) -> Result<ProcessedArticle, ApiError> {
        let content = truncate_chars(&article.content, self.config.max_content_chars);

        let summary = self.llm.ask(&summary_prompt(content)).await?;
        let summary = summary.trim().to_string();
        if summary.is_empty() {
            return Err(ApiError::EmptyResponse("summary"));
        }

        let category = if self.config.classify {
            match self.llm.ask(&classify_prompt(content)).await {
                Ok(reply) => {
                    let c = Category::parse_lenient(&reply);
                    debug!(reply = %truncate_for_log(&reply, 80), category = %c, "Classified");
                    c
                }
                Err(e) => {
                    warn!(error = %e, "Classification failed");
                    Category::Uncategorized
                }
            }
        } else {
            Category::Uncategorized
        };

        let key_points = if self.config.key_points {
            match self.llm.ask(&key_points_prompt(content)).await {
                Ok(reply) => parse_key_points(&reply),
                Err(e) => {
                    warn!(error = %e, "Key point extraction failed");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let sentiment = if self.config.sentiment {
            match self.llm.ask(&sentiment_prompt(content)).await {
                Ok(reply) => parse_sentiment(&reply).unwrap_or_else(|| {
                    warn!(reply = %truncate_for_log(&reply, 200), "Unparseable sentiment reply");
                    Sentiment::default()
                }),
                Err(e) => {
                    warn!(error = %e, "Sentiment analysis failed");
                    Sentiment::default()
                }
            }
        } else {
            Sentiment::default()
        };

        let relevance_score = calculate_relevance(&sentiment, key_points.len(), category);

        Ok(ProcessedArticle {
            article: article.clone(),
            summary,
            category,
            key_points,
            sentiment,
            relevance_score,
        })
    }
}

/// Prompt for the mandatory summary step.
///
/// # Arguments
///
/// * `content` - article text, already truncated to `max_content_chars`
///
/// # Returns
///
/// A [`Prompt`] at temperature 0.5 capped at 150 tokens.
pub fn summary_prompt(content: &str) -> Prompt {
    Prompt {
        task: "summary",
        system: "You are a helpful assistant that summarizes articles concisely.".to_string(),
        user: format!("Please summarize the following content:\n\n{content}"),
        temperature: 0.5,
        max_tokens: 150,
    }
}

/// Prompt asking for exactly one category name out of [`Category::ALL`]
/// (minus `Uncategorized`). The reply goes through
/// [`Category::parse_lenient`].
pub fn classify_prompt(content: &str) -> Prompt {
    let names = Category::ALL
        .iter()
        .filter(|c| **c != Category::Uncategorized)
        .map(|c| c.as_str())
        .join(", ");
    Prompt {
        task: "classify",
        system: format!(
            "You are a classifier that categorizes content into one of these categories: {names}. Only respond with the category name, nothing else."
        ),
        user: format!("Classify this content into one of the specified categories:\n\n{content}"),
        temperature: 0.3,
        max_tokens: 50,
    }
}

/// Prompt for 3-5 `- ` prefixed key points; see [`parse_key_points`].
pub fn key_points_prompt(content: &str) -> Prompt {
    Prompt {
        task: "key_points",
        system: "Extract 3-5 key points from the content. Format each point as a separate line starting with '- '. Be concise and factual.".to_string(),
        user: format!("Extract key points from this content:\n\n{content}"),
        temperature: 0.3,
        max_tokens: 200,
    }
}

/// Prompt for a `{"score", "label"}` JSON object; see [`parse_sentiment`].
pub fn sentiment_prompt(content: &str) -> Prompt {
    Prompt {
        task: "sentiment",
        system: "Analyze the sentiment of the content. Respond in JSON format with exactly this structure: {\"score\": <float between -1 and 1>, \"label\": <\"positive\", \"negative\", or \"neutral\">}".to_string(),
        user: format!("Analyze the sentiment of this content:\n\n{content}"),
        temperature: 0.3,
        max_tokens: 100,
    }
}

/// One point per non-empty line, bullets and numbering removed, duplicates
/// dropped.
pub fn parse_key_points(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| BULLET_PREFIX.replace(line, "").trim().to_string())
        .filter(|p| !p.is_empty())
        .unique()
        .collect()
}

#[derive(Debug, Deserialize)]
struct SentimentReply {
    #[serde(default)]
    score: Option<serde_json::Value>,
    #[serde(default)]
    label: Option<String>,
}

/// Read `{"score": .., "label": ..}` out of a reply that may wrap the
/// object in prose or a code fence. The score is clamped to `[-1, 1]`; an
/// unknown label is derived from the score.
pub fn parse_sentiment(reply: &str) -> Option<Sentiment> {
    let parsed = reply.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&reply[start..])
            .into_iter::<SentimentReply>()
            .next()?
            .ok()
    })?;

    let score = match parsed.score {
        Some(serde_json::Value::Number(n)) => n.as_f64()?,
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok()?,
        None => 0.0,
        Some(_) => return None,
    };
    if !score.is_finite() {
        return None;
    }
    let score = score.clamp(-1.0, 1.0);

    let label = match parsed.label.as_deref().map(|l| l.trim().to_lowercase()) {
        Some(l) if l == "positive" => SentimentLabel::Positive,
        Some(l) if l == "negative" => SentimentLabel::Negative,
        Some(l) if l == "neutral" => SentimentLabel::Neutral,
        _ => SentimentLabel::from_score(score),
    };
    Some(Sentiment { score, label })
}

/// Weighted relevance in `[0, 1]`: sentiment strength 30%, key point
/// coverage (five points saturate) 30%, category weight 40%.
pub fn calculate_relevance(sentiment: &Sentiment, key_points: usize, category: Category) -> f64 {
    let sentiment_part = sentiment.score.abs() * 0.3;
    let points_part = (key_points as f64 / 5.0).min(1.0) * 0.3;
    let category_part = category.weight() * 0.4;
    (sentiment_part + points_part + category_part).min(1.0)
}

/// Highest relevance first; equal scores put the newer article first.
pub fn sort_by_relevance(articles: &mut [ProcessedArticle]) {
    articles.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.article.published_date.cmp(&a.article.published_date))
    });
}
