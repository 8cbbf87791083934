use crate::rss_utils::feed::{first_inline_image, has_image_extension};
use crate::rss_utils::{tags::merge_tags, url::normalize_article_url};
use crate::types::{ArticleCandidate, FetchError};
use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, MediaContent};
use feed_rs::parser;
use tracing::debug;

pub struct FeedParser;

impl FeedParser {
    /// Parse an RSS/Atom/JSON feed body into article candidates.
    ///
    /// Entries without a link or a title are dropped. Entries without a
    /// usable date are stamped with `fetched_at`.
    pub fn parse_candidates(
        content: &[u8],
        source_tags: &[String],
        fetched_at: DateTime<Utc>,
    ) -> Result<Vec<ArticleCandidate>, FetchError> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| FetchError::Parse(format!("Failed to parse feed: {}", e)))?;

        let total = feed.entries.len();
        let candidates: Vec<ArticleCandidate> = feed
            .entries
            .into_iter()
            .filter_map(|entry| Self::parse_entry(entry, source_tags, fetched_at))
            .collect();

        if candidates.len() < total {
            debug!("Dropped {} entries without link or title", total - candidates.len());
        }

        Ok(candidates)
    }

    fn parse_entry(entry: Entry, source_tags: &[String], fetched_at: DateTime<Utc>) -> Option<ArticleCandidate> {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())?;

        let link = primary_link(&entry)?;
        let image_url = extract_image(&entry);

        let summary = entry.summary.map(|s| s.content);
        let content = entry.content.and_then(|c| c.body);
        let author = entry.authors.first().map(|a| a.name.clone());
        let published_at = entry.published.or(entry.updated).unwrap_or(fetched_at);

        let categories = entry
            .categories
            .iter()
            .map(|c| c.term.as_str());
        let tags = merge_tags(categories, source_tags);

        Some(ArticleCandidate {
            original_url: normalize_article_url(&link),
            title,
            summary,
            content,
            author,
            published_at,
            tags,
            image_url,
        })
    }
}

fn primary_link(entry: &Entry) -> Option<String> {
    let alternate = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")));

    alternate
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
}

/// Typed media must be `image/*`. Untyped media counts only when it has no
/// play duration and its URL ends in an image extension.
fn is_image_content(content: &MediaContent) -> bool {
    match &content.content_type {
        Some(ct) => ct.type_().as_str() == "image",
        None => content.duration.is_none() && content.url.as_ref().is_some_and(has_image_extension),
    }
}

/// Thumbnail, then media content, then an image attachment, then the first
/// inline `<img>` of the body or summary.
fn extract_image(entry: &Entry) -> Option<String> {
    let thumbnail = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.trim().to_string())
        .find(|uri| !uri.is_empty());
    if thumbnail.is_some() {
        return thumbnail;
    }

    let media_content = entry
        .media
        .iter()
        .flat_map(|m| m.content.iter())
        .filter(|c| is_image_content(c))
        .find_map(|c| c.url.as_ref().map(|u| u.to_string()));
    if media_content.is_some() {
        return media_content;
    }

    let attachment = entry
        .links
        .iter()
        .filter(|l| l.media_type.as_deref().is_some_and(|t| t.starts_with("image/")))
        .map(|l| l.href.clone())
        .next();
    if attachment.is_some() {
        return attachment;
    }

    entry
        .content
        .as_ref()
        .and_then(|c| c.body.as_deref())
        .and_then(first_inline_image)
        .or_else(|| entry.summary.as_ref().and_then(|s| first_inline_image(&s.content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Example</title>
    <link>https://news.example</link>
    <description>Example feed</description>
    <item>
      <title>Tariffs rise again</title>
      <link>https://news.example/a?utm_source=rss&amp;id=7</link>
      <description>&lt;p&gt;Summary &lt;img src="https://img.example/inline.jpg"&gt;&lt;/p&gt;</description>
      <pubDate>Tue, 30 Apr 2024 10:00:00 GMT</pubDate>
      <category>World Economics</category>
      <media:thumbnail url="https://img.example/thumb.jpg" />
    </item>
    <item>
      <title>No date here</title>
      <link>https://news.example/b</link>
      <description>&lt;p&gt;Body &lt;img src="https://img.example/b.jpg"&gt;&lt;/p&gt;</description>
    </item>
    <item>
      <title>Missing link</title>
      <description>dropped</description>
    </item>
    <item>
      <link>https://news.example/untitled</link>
      <description>dropped too</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_items() {
        let tags = vec!["Markets".to_string()];
        let items = FeedParser::parse_candidates(RSS.as_bytes(), &tags, now()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title, "Tariffs rise again");
        assert_eq!(first.original_url, "https://news.example/a?id=7");
        assert_eq!(first.published_at, Utc.with_ymd_and_hms(2024, 4, 30, 10, 0, 0).unwrap());
        assert_eq!(first.tags, vec!["world-economics".to_string(), "markets".to_string()]);
        assert_eq!(first.image_url.as_deref(), Some("https://img.example/thumb.jpg"));

        let second = &items[1];
        assert_eq!(second.published_at, now());
        assert_eq!(second.image_url.as_deref(), Some("https://img.example/b.jpg"));
        assert_eq!(second.tags, vec!["markets".to_string()]);
    }

    #[test]
    fn atom_image_attachment() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom</title>
  <id>urn:example:feed</id>
  <updated>2024-04-29T08:00:00Z</updated>
  <entry>
    <title>Atom entry</title>
    <id>urn:example:1</id>
    <link rel="alternate" href="https://atom.example/1"/>
    <link rel="enclosure" type="image/png" href="https://atom.example/1.png"/>
    <updated>2024-04-29T08:00:00Z</updated>
    <summary>Plain summary</summary>
  </entry>
</feed>"#;
        let items = FeedParser::parse_candidates(atom.as_bytes(), &[], now()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].original_url, "https://atom.example/1");
        assert_eq!(items[0].image_url.as_deref(), Some("https://atom.example/1.png"));
        assert_eq!(items[0].published_at, Utc.with_ymd_and_hms(2024, 4, 29, 8, 0, 0).unwrap());
    }

    #[test]
    fn untyped_video_media_loses_to_inline_image() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Video</title>
    <item>
      <title>Clip with still</title>
      <link>https://vid.example/story</link>
      <description>&lt;img src="https://img.example/still.jpg"&gt;</description>
      <media:content url="https://vid.example/v.mp4" medium="video" />
    </item>
    <item>
      <title>Untyped photo</title>
      <link>https://img.example/story</link>
      <media:content url="https://img.example/photo.png" />
    </item>
  </channel>
</rss>"#;
        let items = FeedParser::parse_candidates(rss.as_bytes(), &[], now()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].image_url.as_deref(), Some("https://img.example/still.jpg"));
        assert_eq!(items[1].image_url.as_deref(), Some("https://img.example/photo.png"));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = FeedParser::parse_candidates(b"not a feed", &[], now()).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }
}
