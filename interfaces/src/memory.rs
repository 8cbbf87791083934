use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::defs::{
    ArticleSink, CacheEntry, EphemeralCache, FeedConfig, FeedRegistry, NewsSource,
    ReliabilityTracker, SaveOutcome, SinkArticle, SourceRegistry,
};

/// Process-local `EphemeralCache`. Expired entries are invisible to `get`
/// and dropped lazily or through `purge_expired`.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expire_at > now);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl EphemeralCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expire_at > Utc::now())
            .cloned())
    }

    async fn put(&self, key: &str, value: serde_json::Value, expire_at: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), CacheEntry { value, expire_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemorySourceRegistry {
    sources: RwLock<Vec<NewsSource>>,
}

impl MemorySourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: Vec<NewsSource>) -> Self {
        Self {
            sources: RwLock::new(sources),
        }
    }
}

#[async_trait]
impl SourceRegistry for MemorySourceRegistry {
    async fn get_news_source_by_id(&self, source_id: &str) -> Result<Option<NewsSource>> {
        let sources = self.sources.read().await;
        Ok(sources.iter().find(|s| s.id == source_id).cloned())
    }

    async fn list_news_sources(&self) -> Result<Vec<NewsSource>> {
        Ok(self.sources.read().await.clone())
    }

    async fn create_news_source(&self, source: NewsSource) -> Result<()> {
        let mut sources = self.sources.write().await;
        if sources.iter().any(|s| s.id == source.id) {
            bail!("news source {} already exists", source.id);
        }
        sources.push(source);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFeedRegistry {
    feeds: RwLock<HashMap<String, FeedConfig>>,
}

impl MemoryFeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feeds(feeds: Vec<FeedConfig>) -> Self {
        Self {
            feeds: RwLock::new(feeds.into_iter().map(|f| (f.id.clone(), f)).collect()),
        }
    }

    pub async fn upsert(&self, feed: FeedConfig) {
        self.feeds.write().await.insert(feed.id.clone(), feed);
    }
}

#[async_trait]
impl FeedRegistry for MemoryFeedRegistry {
    async fn get_feed_by_id(&self, feed_id: &str) -> Result<Option<FeedConfig>> {
        Ok(self.feeds.read().await.get(feed_id).cloned())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceHealth {
    pub successes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    pub last_attempt: Option<DateTime<Utc>>,
}

impl SourceHealth {
    /// Share of successful fetches, 1.0 for a source that was never attempted.
    pub fn score(&self) -> f64 {
        let attempts = self.successes + self.failures;
        if attempts == 0 {
            return 1.0;
        }
        self.successes as f64 / attempts as f64
    }
}

#[derive(Default)]
pub struct MemoryReliabilityTracker {
    health: RwLock<HashMap<String, SourceHealth>>,
}

impl MemoryReliabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn health(&self, source_id: &str) -> Option<SourceHealth> {
        self.health.read().await.get(source_id).cloned()
    }
}

#[async_trait]
impl ReliabilityTracker for MemoryReliabilityTracker {
    async fn record_fetch_success(&self, source_id: &str) -> Result<()> {
        let mut health = self.health.write().await;
        let entry = health.entry(source_id.to_string()).or_default();
        entry.successes += 1;
        entry.last_error = None;
        entry.last_attempt = Some(Utc::now());
        Ok(())
    }

    async fn record_fetch_failure(&self, source_id: &str, message: &str) -> Result<()> {
        let mut health = self.health.write().await;
        let entry = health.entry(source_id.to_string()).or_default();
        entry.failures += 1;
        entry.last_error = Some(message.to_string());
        entry.last_attempt = Some(Utc::now());
        Ok(())
    }
}

/// Keeps saved articles per source, skipping URLs it has already stored.
#[derive(Default)]
pub struct MemoryArticleSink {
    articles: RwLock<HashMap<String, Vec<SinkArticle>>>,
    seen_urls: RwLock<HashSet<String>>,
}

impl MemoryArticleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn articles_for(&self, source_id: &str) -> Vec<SinkArticle> {
        self.articles
            .read()
            .await
            .get(source_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArticleSink for MemoryArticleSink {
    async fn save_fetched_articles(&self, source_id: &str, articles: &[SinkArticle]) -> Result<SaveOutcome> {
        let mut seen = self.seen_urls.write().await;
        let mut stored = self.articles.write().await;
        let bucket = stored.entry(source_id.to_string()).or_default();

        let mut saved = 0;
        for article in articles {
            if seen.insert(article.url.clone()) {
                bucket.push(article.clone());
                saved += 1;
            }
        }

        Ok(SaveOutcome {
            saved,
            total: articles.len(),
            errors: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sink_article(url: &str) -> SinkArticle {
        SinkArticle {
            url: url.to_string(),
            title: "Title".to_string(),
            summary: None,
            content: None,
            author: None,
            published_at: Utc::now(),
            tags: Vec::new(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn cache_hides_expired_entries() {
        let cache = MemoryCache::new();
        cache
            .put("fresh", serde_json::json!(1), Utc::now() + Duration::minutes(5))
            .await
            .unwrap();
        cache
            .put("stale", serde_json::json!(2), Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        assert!(cache.get("fresh").await.unwrap().is_some());
        assert!(cache.get("stale").await.unwrap().is_none());
        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);

        cache.delete("fresh").await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn registry_rejects_duplicate_ids() {
        let registry = MemorySourceRegistry::new();
        let source = NewsSource {
            id: "a".into(),
            name: "A".into(),
            url: "https://a.example/rss".into(),
            source_type: Default::default(),
            is_active: true,
            tags: Vec::new(),
            custom_headers: None,
            rate_limit: None,
        };
        registry.create_news_source(source.clone()).await.unwrap();
        assert!(registry.create_news_source(source).await.is_err());
        assert_eq!(registry.list_news_sources().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tracker_scores_success_ratio() {
        let tracker = MemoryReliabilityTracker::new();
        tracker.record_fetch_success("s").await.unwrap();
        tracker.record_fetch_success("s").await.unwrap();
        tracker.record_fetch_success("s").await.unwrap();
        tracker.record_fetch_failure("s", "timeout").await.unwrap();

        let health = tracker.health("s").await.unwrap();
        assert_eq!(health.successes, 3);
        assert_eq!(health.failures, 1);
        assert_eq!(health.last_error.as_deref(), Some("timeout"));
        assert!((health.score() - 0.75).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn sink_counts_only_new_urls() {
        let sink = MemoryArticleSink::new();
        let first = sink
            .save_fetched_articles("s", &[sink_article("https://a/1"), sink_article("https://a/2")])
            .await
            .unwrap();
        assert_eq!((first.saved, first.total), (2, 2));

        let second = sink
            .save_fetched_articles("s", &[sink_article("https://a/2"), sink_article("https://a/3")])
            .await
            .unwrap();
        assert_eq!((second.saved, second.total), (1, 2));
        assert_eq!(sink.articles_for("s").await.len(), 3);
    }
}
