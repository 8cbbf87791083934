use crate::parser::FeedParser;
use crate::types::{ArticleCandidate, FetchConfig, FetchError, NewsSource, SourceType};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Fetches one source and normalizes its entries.
///
/// Implementations report every failure through `FetchError`; callers decide
/// how to degrade.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_source(&self, source: &NewsSource) -> Result<Vec<ArticleCandidate>, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
    // last request per source, for sources that declare a rate limit
    rate_limiter: Arc<Mutex<HashMap<String, Instant>>>,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn apply_rate_limit(&self, source: &NewsSource) {
        let Some(per_minute) = source.rate_limit.filter(|r| *r > 0) else {
            return;
        };
        let min_interval = Duration::from_secs(60) / per_minute;

        // Reserve the slot under the lock, sleep outside it.
        let wait_time = {
            let mut rate_limiter = self.rate_limiter.lock().await;
            let now = Instant::now();
            let next_allowed = rate_limiter
                .get(&source.id)
                .map(|last| *last + min_interval)
                .unwrap_or(now);
            let slot = next_allowed.max(now);
            rate_limiter.insert(source.id.clone(), slot);
            slot - now
        };

        if !wait_time.is_zero() {
            debug!("Rate limiting {}: waiting {:?}", source.id, wait_time);
            tokio::time::sleep(wait_time).await;
        }
    }

    fn map_send_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                seconds: self.config.timeout_seconds,
            }
        } else {
            FetchError::Http(err)
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch_source(&self, source: &NewsSource) -> Result<Vec<ArticleCandidate>, FetchError> {
        if source.source_type != SourceType::Rss {
            return Err(FetchError::UnsupportedSourceType(source.source_type));
        }

        let url = Url::parse(&source.url)?;
        let headers = custom_headers(source)?;

        self.apply_rate_limit(source).await;

        let started = Instant::now();
        let fetched_at = Utc::now();
        debug!("Fetching source: {} ({})", source.id, url);

        let mut response = self
            .client
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Source {} answered HTTP {}", source.id, status);
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let limit_bytes = self.config.max_feed_bytes();
        let too_large = || FetchError::TooLarge {
            limit_bytes,
            url: url.to_string(),
        };
        if response.content_length().is_some_and(|len| len > limit_bytes) {
            warn!("Source {} declares a body over {} bytes", source.id, limit_bytes);
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_send_error(e))? {
            if (body.len() + chunk.len()) as u64 > limit_bytes {
                warn!("Source {} body exceeded {} bytes", source.id, limit_bytes);
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        let candidates = FeedParser::parse_candidates(&body, &source.tags, fetched_at)?;

        info!(
            "Fetched source {}: {} entries in {}ms",
            source.id,
            candidates.len(),
            started.elapsed().as_millis()
        );
        Ok(candidates)
    }
}

fn custom_headers(source: &NewsSource) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    let Some(custom) = &source.custom_headers else {
        return Ok(headers);
    };

    for (name, value) in custom {
        let invalid = || FetchError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}
