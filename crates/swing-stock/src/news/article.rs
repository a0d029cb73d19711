//! Article body download and text extraction

use super::HostLimiter;
use crate::cache::{CacheKey, StockCache};
use crate::config::SwingConfig;
use crate::error::{Result, StockError};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, instrument, warn};

/// Tried in order; the first selector that yields paragraphs wins
const BODY_SELECTORS: &[&str] = &[
    "article p",
    r#"[itemprop="articleBody"] p"#,
    "div.artText p",
    "div.story-details p",
    "p",
];

const MIN_PARAGRAPH_CHARS: usize = 40;

static SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    BODY_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

/// Cut `text` to at most `limit` characters without splitting a code point
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Pull readable paragraphs out of an article page
pub fn extract_text(html: &str, char_limit: usize) -> Option<String> {
    let document = Html::parse_document(html);

    for selector in SELECTORS.iter() {
        let paragraphs: Vec<String> = document
            .select(selector)
            .map(|p| p.text().collect::<Vec<_>>().join(" "))
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| t.chars().count() >= MIN_PARAGRAPH_CHARS)
            .collect();

        if !paragraphs.is_empty() {
            let joined = paragraphs.join("\n\n");
            return Some(truncate_chars(&joined, char_limit).to_string());
        }
    }
    None
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedArticle {
    url: String,
    text: String,
    fetched_at: DateTime<Utc>,
}

/// Downloads article pages, caching text in memory and on disk
#[derive(Clone)]
pub struct ArticleFetcher {
    client: Client,
    cache: StockCache,
    limiter: HostLimiter,
    cache_dir: Option<PathBuf>,
    char_limit: usize,
    concurrency: usize,
}

impl ArticleFetcher {
    pub fn new(client: Client, cache: StockCache, config: &SwingConfig) -> Self {
        Self {
            client,
            cache,
            limiter: HostLimiter::per_minute(config.news.requests_per_minute),
            cache_dir: Some(config.news.cache_dir.clone()),
            char_limit: config.news.article_char_limit,
            concurrency: config.news.fetch_concurrency.max(1),
        }
    }

    /// Disable or relocate the on-disk cache
    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    fn cache_path(dir: &Path, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        dir.join(format!("{}.json", hex::encode(digest)))
    }

    async fn read_disk(&self, url: &str) -> Option<String> {
        let path = Self::cache_path(self.cache_dir.as_ref()?, url);
        let raw = tokio::fs::read(&path).await.ok()?;
        serde_json::from_slice::<CachedArticle>(&raw).ok().map(|c| c.text)
    }

    async fn write_disk(&self, url: &str, text: &str) -> Result<()> {
        let Some(dir) = &self.cache_dir else {
            return Ok(());
        };
        tokio::fs::create_dir_all(dir).await?;
        let entry = CachedArticle {
            url: url.to_string(),
            text: text.to_string(),
            fetched_at: Utc::now(),
        };
        tokio::fs::write(Self::cache_path(dir, url), serde_json::to_vec(&entry)?).await?;
        Ok(())
    }

    /// Article text for `url`
    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let key = CacheKey::article(url);
        if let Some(text) = self.cache.get_as::<String>(&key).await {
            return Ok(text);
        }
        if let Some(text) = self.read_disk(url).await {
            debug!("Article served from disk cache");
            self.cache.insert_as(key, &text).await;
            return Ok(text);
        }

        self.limiter.wait(url).await;
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let text = extract_text(&html, self.char_limit).ok_or_else(|| StockError::DataUnavailable {
            symbol: url.to_string(),
            reason: "no article text found".to_string(),
        })?;

        if let Err(e) = self.write_disk(url, &text).await {
            warn!(error = %e, "Could not write article cache");
        }
        self.cache.insert_as(key, &text).await;
        Ok(text)
    }

    /// Fetch several articles concurrently; failures are logged and omitted
    pub async fn fetch_many(&self, urls: Vec<String>) -> HashMap<String, String> {
        let bodies: HashMap<String, String> = stream::iter(urls)
            .map(|url| async move {
                let result = self.fetch(&url).await;
                (url, result)
            })
            .buffer_unordered(self.concurrency)
            .filter_map(|(url, result)| async move {
                match result {
                    Ok(text) => Some((url, text)),
                    Err(e) => {
                        debug!(url = %url, error = %e, "Article fetch failed");
                        None
                    }
                }
            })
            .collect()
            .await;
        self.limiter.prune();
        bodies
    }
}
