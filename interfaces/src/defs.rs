use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Rss,
    Api,
    Scraper,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsSource {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_headers: Option<HashMap<String, String>>,
    // requests per minute
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSourceEntry {
    pub source_id: String,
    #[serde(default = "default_active")]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    pub id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sources: Vec<FeedSourceEntry>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl FeedConfig {
    pub fn enabled_source_ids(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|entry| entry.enabled)
            .map(|entry| entry.source_id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: serde_json::Value,
    pub expire_at: DateTime<Utc>,
}

/// Article shape handed to the persistent sink by the bulk fetch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinkArticle {
    pub url: String,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub saved: usize,
    pub total: usize,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait SourceRegistry: Send + Sync {
    async fn get_news_source_by_id(&self, source_id: &str) -> Result<Option<NewsSource>>;
    async fn list_news_sources(&self) -> Result<Vec<NewsSource>>;
    async fn create_news_source(&self, source: NewsSource) -> Result<()>;
}

#[async_trait]
pub trait FeedRegistry: Send + Sync {
    async fn get_feed_by_id(&self, feed_id: &str) -> Result<Option<FeedConfig>>;
}

/// Shared TTL-keyed store. Writes replace the whole entry.
#[async_trait]
pub trait EphemeralCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn put(&self, key: &str, value: serde_json::Value, expire_at: DateTime<Utc>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

#[async_trait]
pub trait ReliabilityTracker: Send + Sync {
    async fn record_fetch_success(&self, source_id: &str) -> Result<()>;
    async fn record_fetch_failure(&self, source_id: &str, message: &str) -> Result<()>;
}

#[async_trait]
pub trait ArticleSink: Send + Sync {
    async fn save_fetched_articles(&self, source_id: &str, articles: &[SinkArticle]) -> Result<SaveOutcome>;
}

// Object style note:
// Implementations of these traits are owned by the surrounding application
// (registries, persistence, health scoring). The aggregator only ever holds
// them behind `Arc<dyn Trait>` and never assumes anything about storage.
