use crate::types::{AggregationResult, EphemeralArticle, FeedConfig};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Lowercased title and summary that keywords are matched against.
pub fn searchable_text(title: &str, summary: Option<&str>) -> String {
    let mut text = title.to_lowercase();
    if let Some(summary) = summary {
        text.push(' ');
        text.push_str(&summary.to_lowercase());
    }
    text
}

/// Feed filters, lowercased once per aggregation.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    keywords: Vec<String>,
    exclude_keywords: Vec<String>,
    topics: HashSet<String>,
}

fn lowered(words: &[String]) -> impl Iterator<Item = String> + '_ {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
}

impl CompiledFilters {
    pub fn from_feed(feed: &FeedConfig) -> Self {
        Self {
            keywords: lowered(&feed.keywords).collect(),
            exclude_keywords: lowered(&feed.exclude_keywords).collect(),
            topics: lowered(&feed.topics).collect(),
        }
    }

    /// An empty keyword list keeps everything.
    pub fn matches_keywords(&self, article: &EphemeralArticle) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let text = searchable_text(&article.title, article.summary.as_deref());
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    pub fn is_excluded(&self, article: &EphemeralArticle) -> bool {
        if self.exclude_keywords.is_empty() {
            return false;
        }
        let text = searchable_text(&article.title, article.summary.as_deref());
        self.exclude_keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// An empty topic set keeps everything.
    pub fn matches_topics(&self, article: &EphemeralArticle) -> bool {
        self.topics.is_empty()
            || article
                .tags
                .iter()
                .any(|tag| self.topics.contains(&tag.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub merged: usize,
    pub keyword_dropped: usize,
    pub excluded: usize,
    pub topic_dropped: usize,
    pub duplicates: usize,
}

fn newest_first(a: &EphemeralArticle, b: &EphemeralArticle) -> Ordering {
    b.published_at
        .cmp(&a.published_at)
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_newest_first(articles: &mut [EphemeralArticle]) {
    articles.sort_by(newest_first);
}

/// One article per id; on collision the later `published_at` wins, the
/// earlier occurrence wins a tie.
pub fn dedupe_keep_newest(articles: Vec<EphemeralArticle>) -> Vec<EphemeralArticle> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(articles.len());
    let mut unique: Vec<EphemeralArticle> = Vec::with_capacity(articles.len());

    for article in articles {
        match index.get(&article.id) {
            Some(&pos) => {
                if article.published_at > unique[pos].published_at {
                    unique[pos] = article;
                }
            }
            None => {
                index.insert(article.id.clone(), unique.len());
                unique.push(article);
            }
        }
    }

    unique
}

/// Concatenate, keyword include, keyword exclude, topic filter, dedupe,
/// sort. The order of the stages is fixed.
pub fn merge_articles(
    per_source: Vec<Vec<EphemeralArticle>>,
    filters: &CompiledFilters,
) -> (Vec<EphemeralArticle>, MergeStats) {
    let mut stats = MergeStats::default();

    let merged: Vec<EphemeralArticle> = per_source.into_iter().flatten().collect();
    stats.merged = merged.len();

    let included: Vec<EphemeralArticle> = merged
        .into_iter()
        .filter(|a| filters.matches_keywords(a))
        .collect();
    stats.keyword_dropped = stats.merged - included.len();

    let kept: Vec<EphemeralArticle> = included
        .into_iter()
        .filter(|a| !filters.is_excluded(a))
        .collect();
    stats.excluded = stats.merged - stats.keyword_dropped - kept.len();

    let on_topic: Vec<EphemeralArticle> = kept
        .into_iter()
        .filter(|a| filters.matches_topics(a))
        .collect();
    let before_dedupe = on_topic.len();
    stats.topic_dropped = stats.merged - stats.keyword_dropped - stats.excluded - before_dedupe;

    let mut unique = dedupe_keep_newest(on_topic);
    stats.duplicates = before_dedupe - unique.len();

    sort_newest_first(&mut unique);
    (unique, stats)
}

/// Absent or zero limits fall back to the default; everything else is
/// clamped to `[1, max]`.
pub fn clamp_limit(limit: Option<i64>, default: usize, max: usize) -> usize {
    match limit {
        None | Some(0) => default.clamp(1, max),
        Some(l) if l < 0 => 1,
        Some(l) => usize::try_from(l).unwrap_or(max).clamp(1, max),
    }
}

/// Cursors are stringified offsets; anything else means "start".
pub fn decode_cursor(cursor: Option<&str>) -> usize {
    cursor
        .and_then(|c| c.trim().parse::<i64>().ok())
        .and_then(|offset| usize::try_from(offset).ok())
        .unwrap_or(0)
}

pub fn paginate(articles: Vec<EphemeralArticle>, offset: usize, limit: usize) -> AggregationResult {
    let total = articles.len();
    let end = offset.saturating_add(limit);
    let has_more = total > end;

    let page = articles.into_iter().skip(offset).take(limit).collect();

    AggregationResult {
        articles: page,
        next_cursor: has_more.then(|| end.to_string()),
        has_more,
    }
}
