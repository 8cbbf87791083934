use crate::fetcher::SourceFetcher;
use crate::pipeline::{dedupe_keep_newest, sort_newest_first};
use crate::rss_utils::url::article_id;
use crate::types::{ArticleCandidate, EphemeralArticle, NewsSource, SourceCacheEntry};
use chrono::{DateTime, Duration, Utc};
use interfaces::defs::{EphemeralCache, SourceRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub fn cache_key(source_id: &str) -> String {
    format!("ephemeral:source:{}", source_id)
}

/// Give fetched candidates their ids and the source's identity, drop
/// duplicate ids (newest wins) and order newest first.
pub fn articles_from_candidates(candidates: Vec<ArticleCandidate>, source: &NewsSource) -> Vec<EphemeralArticle> {
    let articles = candidates
        .into_iter()
        .map(|c| EphemeralArticle {
            id: article_id(&c.original_url),
            original_url: c.original_url,
            title: c.title,
            summary: c.summary,
            content: c.content,
            author: c.author,
            published_at: c.published_at,
            tags: c.tags,
            image_url: c.image_url,
            source_id: source.id.clone(),
            source_name: source.name.clone(),
        })
        .collect();

    let mut articles = dedupe_keep_newest(articles);
    sort_newest_first(&mut articles);
    articles
}

/// TTL cache in front of the source fetcher. The only place where fetched
/// entries become addressable articles for read paths.
pub struct SourceCache {
    sources: Arc<dyn SourceRegistry>,
    cache: Arc<dyn EphemeralCache>,
    fetcher: Arc<dyn SourceFetcher>,
    ttl: Duration,
}

impl SourceCache {
    pub fn new(
        sources: Arc<dyn SourceRegistry>,
        cache: Arc<dyn EphemeralCache>,
        fetcher: Arc<dyn SourceFetcher>,
        ttl: Duration,
    ) -> Self {
        Self {
            sources,
            cache,
            fetcher,
            ttl,
        }
    }

    /// Items for one source. Never fails: unknown, inactive and failing
    /// sources all come back empty.
    pub async fn get_source_items(&self, source_id: &str, force_refresh: bool) -> SourceCacheEntry {
        let source = match self.sources.get_news_source_by_id(source_id).await {
            Ok(Some(source)) if source.is_active => source,
            Ok(Some(_)) => {
                debug!("Source {} is inactive", source_id);
                return SourceCacheEntry::empty(Utc::now());
            }
            Ok(None) => {
                debug!("Source {} not found", source_id);
                return SourceCacheEntry::empty(Utc::now());
            }
            Err(e) => {
                warn!("Source registry lookup failed for {}: {}", source_id, e);
                return SourceCacheEntry::empty(Utc::now());
            }
        };

        let key = cache_key(source_id);

        if !force_refresh {
            if let Some(entry) = self.read_entry(&key).await {
                if self.is_fresh(&entry, Utc::now()) {
                    debug!("Cache hit for source {} ({} items)", source_id, entry.items.len());
                    return entry;
                }
                debug!("Cache entry for source {} expired", source_id);
            }
        }

        let fetched_at = Utc::now();
        let candidates = match self.fetcher.fetch_source(&source).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Fetch failed for source {}: {}", source_id, e);
                return SourceCacheEntry::empty(fetched_at);
            }
        };

        let entry = SourceCacheEntry {
            items: articles_from_candidates(candidates, &source),
            fetched_at,
        };
        self.write_entry(&key, &entry).await;

        info!("Refreshed source {}: {} items cached", source_id, entry.items.len());
        entry
    }

    pub async fn invalidate(&self, source_id: &str) {
        if let Err(e) = self.cache.delete(&cache_key(source_id)).await {
            warn!("Failed to invalidate cache for source {}: {}", source_id, e);
        }
    }

    /// Fresh while the entry's age is strictly below the TTL.
    pub fn is_fresh(&self, entry: &SourceCacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.fetched_at) < self.ttl
    }

    async fn read_entry(&self, key: &str) -> Option<SourceCacheEntry> {
        let cached = match self.cache.get(key).await {
            Ok(cached) => cached?,
            Err(e) => {
                warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match serde_json::from_value(cached.value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Discarding malformed cache entry {}: {}", key, e);
                None
            }
        }
    }

    async fn write_entry(&self, key: &str, entry: &SourceCacheEntry) {
        let value = match serde_json::to_value(entry) {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to serialize cache entry {}: {}", key, e);
                return;
            }
        };

        let expire_at = entry.fetched_at + self.ttl;
        if let Err(e) = self.cache.put(key, value, expire_at).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }
}
