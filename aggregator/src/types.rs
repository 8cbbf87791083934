use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use interfaces::defs::{FeedConfig, FeedSourceEntry, NewsSource, SinkArticle, SourceType};

/// Transient article built from one source fetch. Never persisted beyond the
/// cache TTL; `id` is derived from the normalized URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralArticle {
    pub id: String,
    pub original_url: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub source_id: String,
    pub source_name: String,
}

impl From<&EphemeralArticle> for SinkArticle {
    fn from(article: &EphemeralArticle) -> Self {
        Self {
            url: article.original_url.clone(),
            title: article.title.clone(),
            summary: article.summary.clone(),
            content: article.content.clone(),
            author: article.author.clone(),
            published_at: article.published_at,
            tags: article.tags.clone(),
            image_url: article.image_url.clone(),
        }
    }
}

/// Normalized entry produced by the source fetcher, not yet addressable.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleCandidate {
    pub original_url: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCacheEntry {
    pub items: Vec<EphemeralArticle>,
    pub fetched_at: DateTime<Utc>,
}

impl SourceCacheEntry {
    pub fn empty(fetched_at: DateTime<Utc>) -> Self {
        Self {
            items: Vec::new(),
            fetched_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    pub user_id: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub force_refresh: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub articles: Vec<EphemeralArticle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl AggregationResult {
    pub fn empty() -> Self {
        Self {
            articles: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFetchOutcome {
    pub source_id: String,
    pub source_name: String,
    pub success: bool,
    pub articles_found: usize,
    pub articles_saved: usize,
    pub error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFetchSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources_attempted: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub articles_found: usize,
    pub articles_saved: usize,
    pub results: Vec<SourceFetchOutcome>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Ephemeral-Aggregator/1.0".to_string(),
            timeout_seconds: 10,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn max_feed_bytes(&self) -> u64 {
        self.max_feed_size_mb as u64 * 1024 * 1024
    }
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub cache_ttl_minutes: i64,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub default_bulk_concurrency: usize,
    pub max_bulk_concurrency: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_minutes: 15,
            default_page_size: 20,
            max_page_size: 100,
            default_bulk_concurrency: 5,
            max_bulk_concurrency: 20,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_minutes <= 0 {
            return Err(AggregatorError::Config("cache TTL must be positive".to_string()));
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(AggregatorError::Config("page sizes must be positive".to_string()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(AggregatorError::Config(format!(
                "default page size {} exceeds maximum {}",
                self.default_page_size, self.max_page_size
            )));
        }
        if self.default_bulk_concurrency == 0 || self.max_bulk_concurrency == 0 {
            return Err(AggregatorError::Config("bulk concurrency must be positive".to_string()));
        }
        if self.default_bulk_concurrency > self.max_bulk_concurrency {
            return Err(AggregatorError::Config(format!(
                "default bulk concurrency {} exceeds maximum {}",
                self.default_bulk_concurrency, self.max_bulk_concurrency
            )));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.cache_ttl_minutes)
    }
}

/// Failure of a single source fetch. Always recovered by callers.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Feed from {url} exceeds {limit_bytes} bytes")]
    TooLarge { limit_bytes: u64, url: String },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid header {name}")]
    InvalidHeader { name: String },

    #[error("Source type {0:?} cannot be fetched")]
    UnsupportedSourceType(SourceType),
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("Feed not found: {id}")]
    FeedNotFound { id: String },

    #[error("Feed {feed_id} is not owned by {user_id}")]
    Forbidden { feed_id: String, user_id: String },

    #[error("Registry error: {0}")]
    Registry(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
