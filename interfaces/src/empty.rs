use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::defs::{ArticleSink, CacheEntry, EphemeralCache, ReliabilityTracker, SaveOutcome, SinkArticle};

/// Cache that never holds anything; every read is a miss.
pub struct NullCache;

#[async_trait]
impl EphemeralCache for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
        Ok(None)
    }

    async fn put(&self, _key: &str, _value: serde_json::Value, _expire_at: DateTime<Utc>) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }
}

pub struct NullReliabilityTracker;

#[async_trait]
impl ReliabilityTracker for NullReliabilityTracker {
    async fn record_fetch_success(&self, _source_id: &str) -> Result<()> {
        Ok(())
    }

    async fn record_fetch_failure(&self, _source_id: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Sink that accepts articles without keeping them.
pub struct NullArticleSink;

#[async_trait]
impl ArticleSink for NullArticleSink {
    async fn save_fetched_articles(&self, _source_id: &str, articles: &[SinkArticle]) -> Result<SaveOutcome> {
        // Nothing is persisted, so nothing counts as saved.
        Ok(SaveOutcome {
            saved: 0,
            total: articles.len(),
            errors: vec![],
        })
    }
}
