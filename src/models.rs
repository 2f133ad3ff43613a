//! Data models for crawled articles, LLM analysis, and the daily report.
//!
//! - [`RawArticle`]: an AI-related feed entry as crawled
//! - [`ProcessedArticle`]: the same entry after summarization and scoring
//! - [`Report`]: one day's report, the unit written to disk and to Notion
//! - [`Category`] and [`Sentiment`]: the classification vocabulary

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A feed entry that passed the keyword filter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawArticle {
    /// Stable identifier derived from the URL, see [`crate::utils::article_id`].
    pub id: String,
    pub title: String,
    pub url: String,
    /// Plain text with markup stripped.
    pub content: String,
    pub published_date: DateTime<Utc>,
    /// Name of the configured feed this came from.
    pub source: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Topic bucket assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TechnicalInnovation,
    BusinessApplication,
    PolicyRegulation,
    ResearchProgress,
    Uncategorized,
}

impl Category {
    /// Every category, in report order.
    pub const ALL: [Category; 5] = [
        Category::TechnicalInnovation,
        Category::ResearchProgress,
        Category::BusinessApplication,
        Category::PolicyRegulation,
        Category::Uncategorized,
    ];

    /// Machine name as used in prompts and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::TechnicalInnovation => "technical_innovation",
            Category::BusinessApplication => "business_application",
            Category::PolicyRegulation => "policy_regulation",
            Category::ResearchProgress => "research_progress",
            Category::Uncategorized => "uncategorized",
        }
    }

    /// Heading used in Markdown and Notion.
    pub fn label(&self) -> &'static str {
        match self {
            Category::TechnicalInnovation => "Technical Innovation",
            Category::BusinessApplication => "Business Application",
            Category::PolicyRegulation => "Policy & Regulation",
            Category::ResearchProgress => "Research Progress",
            Category::Uncategorized => "Other",
        }
    }

    /// Contribution to the relevance score.
    pub fn weight(&self) -> f64 {
        match self {
            Category::TechnicalInnovation => 1.0,
            Category::BusinessApplication => 0.8,
            Category::PolicyRegulation => 0.7,
            Category::ResearchProgress => 0.9,
            Category::Uncategorized => 0.5,
        }
    }

    /// Interpret a free-form classifier reply.
    ///
    /// Accepts `"Technical Innovation"`, `"technical-innovation."`,
    /// `"Category: research_progress"` and similar; anything unrecognised is
    /// [`Category::Uncategorized`].
    pub fn parse_lenient(reply: &str) -> Category {
        let normalized: String = reply
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect();

        Category::ALL
            .iter()
            .copied()
            .filter(|c| *c != Category::Uncategorized)
            .find(|c| normalized == c.as_str() || normalized.contains(c.as_str()))
            .unwrap_or(Category::Uncategorized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl SentimentLabel {
    /// Label implied by a score when the model gave none we recognise.
    pub fn from_score(score: f64) -> Self {
        if score > 0.1 {
            SentimentLabel::Positive
        } else if score < -0.1 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

/// Tone of an article, `score` in `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct Sentiment {
    pub score: f64,
    pub label: SentimentLabel,
}

/// An article after LLM analysis.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProcessedArticle {
    #[serde(flatten)]
    pub article: RawArticle,
    pub summary: String,
    pub category: Category,
    pub key_points: Vec<String>,
    pub sentiment: Sentiment,
    pub relevance_score: f64,
}

/// One day's report as written to `report_{date}.json`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Report {
    pub date: NaiveDate,
    pub entries: Vec<ReportEntry>,
    pub metadata: ReportMetadata,
}

/// A single row of the report: the flat `{date, category, content,
/// metadata}` record, with the date carried by the enclosing [`Report`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportEntry {
    pub id: String,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub category: Category,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub sentiment: Sentiment,
    pub relevance_score: f64,
    pub published_date: DateTime<Utc>,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportMetadata {
    pub total_articles: usize,
    pub generation_time: DateTime<Utc>,
    pub version: String,
    #[serde(default)]
    pub by_category: BTreeMap<Category, usize>,
}

impl From<&ProcessedArticle> for ReportEntry {
    fn from(p: &ProcessedArticle) -> Self {
        Self {
            id: p.article.id.clone(),
            title: p.article.title.clone(),
            url: p.article.url.clone(),
            summary: p.summary.clone(),
            category: p.category,
            key_points: p.key_points.clone(),
            sentiment: p.sentiment,
            relevance_score: p.relevance_score,
            published_date: p.article.published_date,
            source: p.article.source.clone(),
            image_url: p.article.image_url.clone(),
        }
    }
}

impl Report {
    /// Entries of one category, in report order.
    pub fn entries_in(&self, category: Category) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }
}
