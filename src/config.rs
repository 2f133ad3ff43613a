//! Application configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults (every field has one, so partial files are fine)
//! 2. A YAML file, `config/config.yaml` unless overridden
//! 3. Environment variables for secrets (`GROQ_API_KEY`, `NOTION_API_KEY`,
//!    `NOTION_DATABASE_ID`), optionally loaded from a `.env` file
//!
//! ```yaml
//! sources:
//!   - name: techcrunch
//!     feed_url: https://techcrunch.com/feed/
//!     keywords: [ai, llm]
//! crawler:
//!   update_interval_secs: 3600
//! notion:
//!   auto_cleanup: true
//!   retention_days: 14
//! ```

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

const DEFAULT_KEYWORDS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "neural network",
    "gpt",
    "llm",
];

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Environment variable → config field it overrides.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("GROQ_API_KEY", "processor.groq_api_key"),
    ("NOTION_API_KEY", "notion.api_key"),
    ("NOTION_DATABASE_ID", "notion.database_id"),
];

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub sources: Vec<FeedSource>,
    pub crawler: CrawlerConfig,
    pub processor: ProcessorConfig,
    pub generator: GeneratorConfig,
    pub notion: NotionConfig,
    pub logging: LoggingConfig,
    /// File the settings were read from, `None` when running on defaults.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

/// One RSS or Atom feed to crawl.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FeedSource {
    pub name: String,
    pub feed_url: String,
    /// Entries must mention at least one of these; empty accepts all.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrawlerConfig {
    pub update_interval_secs: u64,
    pub max_articles_per_source: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub groq_api_key: String,
    pub api_base: String,
    pub model: String,
    /// Articles analysed at the same time.
    pub concurrency: usize,
    pub min_relevance_score: f64,
    pub classify: bool,
    pub key_points: bool,
    pub sentiment: bool,
    /// Article text is cut to this many characters before prompting.
    pub max_content_chars: usize,
    pub max_retries: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub output_dir: String,
    pub markdown: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotionConfig {
    pub api_key: String,
    pub database_id: String,
    pub cover_url: Option<String>,
    /// Value of the `category` select that marks report pages.
    pub report_category: String,
    pub auto_cleanup: bool,
    pub retention_days: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: vec![
                FeedSource {
                    name: "techcrunch".to_string(),
                    feed_url: "https://techcrunch.com/feed/".to_string(),
                    keywords: default_keywords(),
                },
                FeedSource {
                    name: "mit_tech_review".to_string(),
                    feed_url: "https://www.technologyreview.com/feed/".to_string(),
                    keywords: default_keywords(),
                },
            ],
            crawler: CrawlerConfig::default(),
            processor: ProcessorConfig::default(),
            generator: GeneratorConfig::default(),
            notion: NotionConfig::default(),
            logging: LoggingConfig::default(),
            loaded_from: None,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 3600,
            max_articles_per_source: 50,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            proxy: None,
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            groq_api_key: String::new(),
            api_base: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            concurrency: 4,
            min_relevance_score: 0.0,
            classify: true,
            key_points: true,
            sentiment: true,
            max_content_chars: 8000,
            max_retries: 5,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: "data/reports".to_string(),
            markdown: true,
        }
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            database_id: String::new(),
            cover_url: None,
            report_category: "AI Daily Report".to_string(),
            auto_cleanup: false,
            retention_days: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Load `.env` from the working directory if there is one.
///
/// Must run before CLI parsing so `env = "..."` arguments see the values.
/// Returns whether a file was loaded.
pub fn load_dotenv() -> bool {
    dotenvy::dotenv().is_ok()
}

impl Config {
    /// Load the YAML file at `path` (falling back to defaults when it does
    /// not exist) and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            let mut parsed = Self::from_yaml_str(&raw)
                .map_err(|e| format!("invalid config file {}: {}", path.display(), e))?;
            parsed.loaded_from = Some(path.to_path_buf());
            parsed
        } else {
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a YAML document. An empty document yields the defaults.
    pub fn from_yaml_str(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Overwrite secrets with non-empty values returned by `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (var, _) in ENV_OVERRIDES {
            let Some(value) = lookup(var).filter(|v| !v.is_empty()) else {
                continue;
            };
            match *var {
                "GROQ_API_KEY" => self.processor.groq_api_key = value,
                "NOTION_API_KEY" => self.notion.api_key = value,
                "NOTION_DATABASE_ID" => self.notion.database_id = value,
                _ => {}
            }
        }
    }

    /// Environment variables whose config field is still empty.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        ENV_OVERRIDES
            .iter()
            .filter(|(_, field)| match *field {
                "processor.groq_api_key" => self.processor.groq_api_key.is_empty(),
                "notion.api_key" => self.notion.api_key.is_empty(),
                "notion.database_id" => self.notion.database_id.is_empty(),
                _ => false,
            })
            .map(|(var, _)| *var)
            .collect()
    }

    /// Log where the settings came from and warn about anything missing.
    pub fn log_validation(&self) {
        match &self.loaded_from {
            Some(p) => info!(path = %p.display(), "Loaded configuration"),
            None => warn!("Config file not found, using default configuration"),
        }
        let missing = self.missing_secrets();
        if !missing.is_empty() {
            warn!(missing = %missing.join(", "), "Missing required environment variables");
        }
        if self.sources.is_empty() {
            warn!("No news sources configured");
        }
        info!(
            sources = self.sources.len(),
            model = %self.processor.model,
            output_dir = %self.generator.output_dir,
            "Configuration ready"
        );
    }
}
