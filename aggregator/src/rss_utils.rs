//! Helpers shared by the fetcher, the source cache and the pipeline.

/// URL normalization and article identity
pub mod url {
    use sha2::{Digest, Sha256};

    const ARTICLE_ID_LEN: usize = 32;

    fn is_tracking_param(pair: &str) -> bool {
        let key = pair.split('=').next().unwrap_or_default();
        key.to_ascii_lowercase().starts_with("utm_")
    }

    /// Strip `utm_*` query parameters and the fragment so mirrored links
    /// collapse onto one canonical URL. Other parameters keep their order and
    /// encoding. Links that do not parse are returned trimmed.
    pub fn normalize_article_url(raw: &str) -> String {
        let trimmed = raw.trim();
        let mut parsed = match ::url::Url::parse(trimmed) {
            Ok(parsed) => parsed,
            Err(_) => return trimmed.to_string(),
        };

        parsed.set_fragment(None);

        let kept: Option<String> = parsed.query().map(|query| {
            query
                .split('&')
                .filter(|pair| !pair.is_empty() && !is_tracking_param(pair))
                .collect::<Vec<_>>()
                .join("&")
        });

        match kept {
            Some(query) if !query.is_empty() => parsed.set_query(Some(&query)),
            _ => parsed.set_query(None),
        }

        parsed.to_string()
    }

    /// Deterministic article id: hex SHA-256 prefix of the normalized URL.
    pub fn article_id(normalized_url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalized_url.as_bytes());
        let mut id = hex::encode(hasher.finalize());
        id.truncate(ARTICLE_ID_LEN);
        id
    }
}

/// Tag sanitizing
pub mod tags {
    use std::collections::HashSet;

    pub const MAX_TAG_LEN: usize = 50;
    pub const MAX_TAGS: usize = 10;

    /// Lowercase, hyphen-separated token of at most 50 characters, or `None`
    /// when nothing usable is left.
    pub fn sanitize_tag(raw: &str) -> Option<String> {
        let mut out = String::with_capacity(raw.len());
        for c in raw.trim().to_lowercase().chars() {
            if c.is_alphanumeric() {
                out.push(c);
            } else if (c.is_whitespace() || c == '-' || c == '_') && !out.ends_with('-') {
                out.push('-');
            }
        }

        let capped: String = out.trim_matches('-').chars().take(MAX_TAG_LEN).collect();
        let capped = capped.trim_end_matches('-');
        if capped.is_empty() {
            None
        } else {
            Some(capped.to_string())
        }
    }

    /// Union of entry categories and the source's static tags, sanitized,
    /// first occurrence wins, capped at `MAX_TAGS`.
    pub fn merge_tags<I, S>(categories: I, source_tags: S) -> Vec<String>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let mut seen = HashSet::new();
        categories
            .into_iter()
            .filter_map(|tag| sanitize_tag(tag.as_ref()))
            .chain(source_tags.into_iter().filter_map(|tag| sanitize_tag(tag.as_ref())))
            .filter(|tag| seen.insert(tag.clone()))
            .take(MAX_TAGS)
            .collect()
    }
}

/// Image lookups in feed bodies and media
pub mod feed {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static IMG_SRC: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("static img regex")
    });

    /// `src` of the first `<img>` tag in an HTML fragment.
    pub fn first_inline_image(html: &str) -> Option<String> {
        IMG_SRC
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|src| !src.is_empty())
    }

    const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "avif", "svg", "bmp"];

    /// Whether a URL path ends in a known image file extension.
    pub fn has_image_extension(url: &::url::Url) -> bool {
        url.path()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }
}
