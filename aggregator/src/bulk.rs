use crate::fetcher::SourceFetcher;
use crate::source_cache::articles_from_candidates;
use crate::types::{AggregatorConfig, BulkFetchSummary, NewsSource, SinkArticle, SourceFetchOutcome};
use chrono::Utc;
use futures::future::join_all;
use interfaces::defs::{ArticleSink, ReliabilityTracker};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Refreshes many sources for the scheduled job, a fixed number at a time.
pub struct BulkFetcher {
    fetcher: Arc<dyn SourceFetcher>,
    tracker: Arc<dyn ReliabilityTracker>,
    sink: Arc<dyn ArticleSink>,
    default_concurrency: usize,
    max_concurrency: usize,
}

impl BulkFetcher {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        tracker: Arc<dyn ReliabilityTracker>,
        sink: Arc<dyn ArticleSink>,
        config: &AggregatorConfig,
    ) -> Self {
        Self {
            fetcher,
            tracker,
            sink,
            default_concurrency: config.default_bulk_concurrency,
            max_concurrency: config.max_bulk_concurrency,
        }
    }

    pub fn effective_concurrency(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_concurrency)
            .clamp(1, self.max_concurrency.max(1))
    }

    /// Fetch every source in rounds of `concurrency`. Each round runs in
    /// parallel and completes before the next starts; results keep the
    /// input order.
    pub async fn run(&self, sources: &[NewsSource], concurrency: Option<usize>) -> BulkFetchSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let concurrency = self.effective_concurrency(concurrency);

        info!(
            "Bulk fetch {} started: {} sources, concurrency {}",
            run_id,
            sources.len(),
            concurrency
        );

        let mut results = Vec::with_capacity(sources.len());
        for (round, batch) in sources.chunks(concurrency).enumerate() {
            let outcomes = join_all(batch.iter().map(|source| self.fetch_one(source))).await;
            info!("Bulk fetch {} round {} done ({} sources)", run_id, round + 1, outcomes.len());
            results.extend(outcomes);
        }

        let sources_succeeded = results.iter().filter(|r| r.success).count();
        let summary = BulkFetchSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            sources_attempted: results.len(),
            sources_succeeded,
            sources_failed: results.len() - sources_succeeded,
            articles_found: results.iter().map(|r| r.articles_found).sum(),
            articles_saved: results.iter().map(|r| r.articles_saved).sum(),
            results,
        };

        info!(
            "Bulk fetch {} finished: {}/{} sources ok, {} articles found, {} saved",
            run_id,
            summary.sources_succeeded,
            summary.sources_attempted,
            summary.articles_found,
            summary.articles_saved
        );
        summary
    }

    async fn fetch_one(&self, source: &NewsSource) -> SourceFetchOutcome {
        let started = Instant::now();
        let mut outcome = SourceFetchOutcome {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            success: false,
            articles_found: 0,
            articles_saved: 0,
            error: None,
            duration_ms: 0,
        };

        match self.fetcher.fetch_source(source).await {
            Ok(candidates) => {
                let articles = articles_from_candidates(candidates, source);
                let sink_articles: Vec<SinkArticle> = articles.iter().map(SinkArticle::from).collect();
                outcome.success = true;
                outcome.articles_found = articles.len();

                match self.sink.save_fetched_articles(&source.id, &sink_articles).await {
                    Ok(saved) => {
                        outcome.articles_saved = saved.saved;
                        if !saved.errors.is_empty() {
                            warn!("Sink reported {} errors for source {}", saved.errors.len(), source.id);
                        }
                    }
                    Err(e) => {
                        error!("Failed to save articles for source {}: {}", source.id, e);
                        outcome.error = Some(format!("save failed: {}", e));
                    }
                }

                if let Err(e) = self.tracker.record_fetch_success(&source.id).await {
                    warn!("Failed to record success for source {}: {}", source.id, e);
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Bulk fetch failed for source {}: {}", source.id, message);
                if let Err(e) = self.tracker.record_fetch_failure(&source.id, &message).await {
                    warn!("Failed to record failure for source {}: {}", source.id, e);
                }
                outcome.error = Some(message);
            }
        }

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        outcome
    }
}
