use anyhow::Result;

use crate::defs::{NewsSource, SourceRegistry, SourceType};

struct DefaultSource {
    id: &'static str,
    name: &'static str,
    url: &'static str,
    tags: &'static [&'static str],
}

const DEFAULT_SOURCES: &[DefaultSource] = &[
    DefaultSource {
        id: "bbc-world",
        name: "BBC News - World",
        url: "https://feeds.bbci.co.uk/news/world/rss.xml",
        tags: &["world", "general"],
    },
    DefaultSource {
        id: "npr-news",
        name: "NPR News",
        url: "https://feeds.npr.org/1001/rss.xml",
        tags: &["us", "general"],
    },
    DefaultSource {
        id: "wsj-world",
        name: "WSJ World News",
        url: "https://feeds.a.dj.com/rss/RSSWorldNews.xml",
        tags: &["world", "business"],
    },
    DefaultSource {
        id: "wsj-markets",
        name: "WSJ Markets",
        url: "https://feeds.a.dj.com/rss/RSSMarketsMain.xml",
        tags: &["markets", "economics"],
    },
    DefaultSource {
        id: "guardian-tech",
        name: "The Guardian - Technology",
        url: "https://www.theguardian.com/uk/technology/rss",
        tags: &["technology"],
    },
];

pub fn default_sources() -> Vec<NewsSource> {
    DEFAULT_SOURCES
        .iter()
        .map(|d| NewsSource {
            id: d.id.to_owned(),
            name: d.name.to_owned(),
            url: d.url.to_owned(),
            source_type: SourceType::Rss,
            is_active: true,
            tags: d.tags.iter().map(|t| (*t).to_owned()).collect(),
            custom_headers: None,
            rate_limit: None,
        })
        .collect()
}

/// Creates every default source the registry does not have yet.
/// Returns how many were created; a second call returns 0.
pub async fn ensure_default_sources(registry: &dyn SourceRegistry) -> Result<usize> {
    let mut created = 0;
    for source in default_sources() {
        if registry.get_news_source_by_id(&source.id).await?.is_some() {
            continue;
        }
        registry.create_news_source(source).await?;
        created += 1;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemorySourceRegistry;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let registry = MemorySourceRegistry::new();
        let first = ensure_default_sources(&registry).await.unwrap();
        assert_eq!(first, DEFAULT_SOURCES.len());
        assert_eq!(ensure_default_sources(&registry).await.unwrap(), 0);
        assert_eq!(registry.list_news_sources().await.unwrap().len(), DEFAULT_SOURCES.len());
    }

    #[tokio::test]
    async fn seeding_skips_existing_ids() {
        let mut existing = default_sources().remove(0);
        existing.name = "Custom".to_owned();
        let registry = MemorySourceRegistry::with_sources(vec![existing]);

        let created = ensure_default_sources(&registry).await.unwrap();
        assert_eq!(created, DEFAULT_SOURCES.len() - 1);
        let kept = registry.get_news_source_by_id("bbc-world").await.unwrap().unwrap();
        assert_eq!(kept.name, "Custom");
    }
}
