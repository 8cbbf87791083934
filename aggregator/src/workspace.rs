use crate::types::{FeedConfig, NewsSource, Result};
use interfaces::memory::{MemoryFeedRegistry, MemorySourceRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Sources and feeds loaded from a JSON file, for running the aggregator
/// without the surrounding application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceFile {
    #[serde(default)]
    pub sources: Vec<NewsSource>,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

impl WorkspaceFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let workspace: WorkspaceFile = serde_json::from_str(&raw)?;
        info!(
            "Loaded workspace {}: {} sources, {} feeds",
            path.display(),
            workspace.sources.len(),
            workspace.feeds.len()
        );
        Ok(workspace)
    }

    pub fn into_registries(self) -> (MemorySourceRegistry, MemoryFeedRegistry) {
        (
            MemorySourceRegistry::with_sources(self.sources),
            MemoryFeedRegistry::with_feeds(self.feeds),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interfaces::defs::{FeedRegistry, SourceRegistry, SourceType};

    #[tokio::test]
    async fn parses_camel_case_workspace() {
        let json = r#"{
            "sources": [
                {"id": "a", "name": "A", "url": "https://a.example/rss", "tags": ["World"]},
                {"id": "b", "name": "B", "url": "https://b.example/api", "sourceType": "api", "isActive": false}
            ],
            "feeds": [
                {"id": "f", "ownerId": "u1", "sources": [{"sourceId": "a"}, {"sourceId": "b", "enabled": false}],
                 "excludeKeywords": ["satire"]}
            ]
        }"#;
        let workspace: WorkspaceFile = serde_json::from_str(json).unwrap();
        let (sources, feeds) = workspace.into_registries();

        let a = sources.get_news_source_by_id("a").await.unwrap().unwrap();
        assert!(a.is_active);
        assert_eq!(a.source_type, SourceType::Rss);
        let b = sources.get_news_source_by_id("b").await.unwrap().unwrap();
        assert!(!b.is_active);
        assert_eq!(b.source_type, SourceType::Api);

        let feed = feeds.get_feed_by_id("f").await.unwrap().unwrap();
        assert_eq!(feed.enabled_source_ids(), vec!["a".to_string()]);
        assert_eq!(feed.exclude_keywords, vec!["satire".to_string()]);
        assert!(feed.keywords.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = WorkspaceFile::load(Path::new("/nonexistent/workspace.json")).await.unwrap_err();
        assert!(matches!(err, crate::types::AggregatorError::Io(_)));
    }
}
