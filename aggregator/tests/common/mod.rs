// Shared doubles and fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ephemeral_aggregator::{ArticleCandidate, FetchError, NewsSource, SourceFetcher, SourceType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn source(id: &str) -> NewsSource {
    NewsSource {
        id: id.to_string(),
        name: format!("Source {}", id),
        url: format!("https://{}.example/rss", id),
        source_type: SourceType::Rss,
        is_active: true,
        tags: Vec::new(),
        custom_headers: None,
        rate_limit: None,
    }
}

pub fn candidate(url: &str, minutes_ago: i64) -> ArticleCandidate {
    ArticleCandidate {
        original_url: url.to_string(),
        title: format!("Title for {}", url),
        summary: None,
        content: None,
        author: None,
        published_at: base_time() - Duration::minutes(minutes_ago),
        tags: Vec::new(),
        image_url: None,
    }
}

pub fn described(url: &str, minutes_ago: i64, title: &str, summary: &str, tags: &[&str]) -> ArticleCandidate {
    ArticleCandidate {
        title: title.to_string(),
        summary: Some(summary.to_string()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..candidate(url, minutes_ago)
    }
}

#[derive(Clone)]
pub enum Script {
    Items(Vec<ArticleCandidate>),
    Fail(String),
}

/// Fetcher that answers from a per-source script, optionally after a delay,
/// and records call counts and peak concurrency.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    delays_ms: HashMap<String, u64>,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completion_order: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, source_id: &str, script: Script) -> Self {
        self.set(source_id, script);
        self
    }

    pub fn with_delay(mut self, source_id: &str, delay_ms: u64) -> Self {
        self.delays_ms.insert(source_id.to_string(), delay_ms);
        self
    }

    pub fn set(&self, source_id: &str, script: Script) {
        self.scripts.lock().unwrap().insert(source_id.to_string(), script);
    }

    pub fn calls(&self, source_id: &str) -> usize {
        self.calls.lock().unwrap().get(source_id).copied().unwrap_or(0)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn completion_order(&self) -> Vec<String> {
        self.completion_order.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch_source(&self, source: &NewsSource) -> Result<Vec<ArticleCandidate>, FetchError> {
        *self.calls.lock().unwrap().entry(source.id.clone()).or_default() += 1;

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(delay) = self.delays_ms.get(&source.id) {
            tokio::time::sleep(std::time::Duration::from_millis(*delay)).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completion_order.lock().unwrap().push(source.id.clone());

        let script = self.scripts.lock().unwrap().get(&source.id).cloned();
        match script {
            Some(Script::Items(items)) => Ok(items),
            Some(Script::Fail(message)) => Err(FetchError::Parse(message)),
            None => Ok(Vec::new()),
        }
    }
}
