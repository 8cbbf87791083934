use crate::pipeline::{clamp_limit, decode_cursor, merge_articles, paginate, CompiledFilters};
use crate::source_cache::SourceCache;
use crate::types::{AggregateOptions, AggregationResult, AggregatorConfig, AggregatorError, Result};
use futures::future::join_all;
use interfaces::defs::FeedRegistry;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds one feed's article stream on demand from the per-source caches.
///
/// Nothing is snapshotted between calls: the merged list is recomputed every
/// time, so an offset cursor can drift when a source refreshes between two
/// page requests.
pub struct FeedAggregator {
    feeds: Arc<dyn FeedRegistry>,
    source_cache: Arc<SourceCache>,
    config: AggregatorConfig,
}

impl FeedAggregator {
    pub fn new(feeds: Arc<dyn FeedRegistry>, source_cache: Arc<SourceCache>, config: AggregatorConfig) -> Self {
        Self {
            feeds,
            source_cache,
            config,
        }
    }

    pub async fn aggregate(&self, feed_id: &str, options: AggregateOptions) -> Result<AggregationResult> {
        let feed = self
            .feeds
            .get_feed_by_id(feed_id)
            .await?
            .ok_or_else(|| AggregatorError::FeedNotFound { id: feed_id.to_string() })?;

        if let (Some(user_id), Some(owner_id)) = (options.user_id.as_deref(), feed.owner_id.as_deref()) {
            if user_id != owner_id {
                return Err(AggregatorError::Forbidden {
                    feed_id: feed_id.to_string(),
                    user_id: user_id.to_string(),
                });
            }
        }

        let source_ids = feed.enabled_source_ids();
        if source_ids.is_empty() {
            debug!("Feed {} has no enabled sources", feed_id);
            return Ok(AggregationResult::empty());
        }

        // The cache layer never fails, so joining all of them is all-settle.
        let per_source = join_all(
            source_ids
                .iter()
                .map(|id| self.source_cache.get_source_items(id, options.force_refresh)),
        )
        .await
        .into_iter()
        .map(|entry| entry.items)
        .collect();

        let filters = CompiledFilters::from_feed(&feed);
        let (articles, stats) = merge_articles(per_source, &filters);
        debug!("Feed {} merge: {:?}", feed_id, stats);

        let limit = clamp_limit(options.limit, self.config.default_page_size, self.config.max_page_size);
        let offset = decode_cursor(options.cursor.as_deref());
        let total = articles.len();
        let result = paginate(articles, offset, limit);

        info!(
            "Aggregated feed {} from {} sources: {} articles, returning {} at offset {}",
            feed_id,
            source_ids.len(),
            total,
            result.articles.len(),
            offset
        );
        Ok(result)
    }
}
