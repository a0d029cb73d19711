//! RSS/Atom feed collection

use super::{HostLimiter, NewsArticle, normalize_title, resolve_url};
use crate::cache::{CacheKey, StockCache};
use crate::config::SwingConfig;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use scraper::Html;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Google News RSS search scoped to Indian English results
pub fn google_news_feed(query: &str) -> String {
    let q: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    format!("https://news.google.com/rss/search?q={q}&hl=en-IN&gl=IN&ceid=IN:en")
}

fn strip_html(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);
    let text: Vec<&str> = html.root_element().text().collect();
    text.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn host_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| url.to_string())
}

/// Parse feed bytes into articles newer than `cutoff`
///
/// Entries without a link or title are dropped; undated entries are kept.
pub fn parse_feed(bytes: &[u8], feed_url: &str, cutoff: DateTime<Utc>) -> Result<Vec<NewsArticle>> {
    let feed = feed_rs::parser::parse(bytes)?;
    let source = feed
        .title
        .map(|t| t.content)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| host_of(feed_url));

    let articles = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;
            let title = entry.title.map(|t| strip_html(&t.content))?;
            if title.is_empty() {
                return None;
            }

            let published = entry.published.or(entry.updated);
            if published.is_some_and(|p| p < cutoff) {
                return None;
            }

            Some(NewsArticle {
                title,
                url: resolve_url(&url),
                source: source.clone(),
                published,
                summary: entry.summary.map(|s| strip_html(&s.content)).unwrap_or_default(),
                body: None,
                tickers: Vec::new(),
            })
        })
        .collect();

    Ok(articles)
}

/// Drop repeats by URL or normalised title, newest first
pub fn dedupe(mut articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
    articles.sort_by(|a, b| b.published.cmp(&a.published));

    let mut seen_urls = HashSet::new();
    let mut seen_titles = HashSet::new();
    articles.retain(|a| {
        let fresh_url = seen_urls.insert(a.url.clone());
        let fresh_title = seen_titles.insert(normalize_title(&a.title));
        fresh_url && fresh_title
    });
    articles
}

/// Polls feeds with per-host rate limiting and a short-lived cache
pub struct RssCollector {
    client: Client,
    cache: StockCache,
    limiter: HostLimiter,
    max_age: Duration,
}

impl RssCollector {
    pub fn new(client: Client, cache: StockCache, config: &SwingConfig) -> Self {
        Self {
            client,
            cache,
            limiter: HostLimiter::per_minute(config.news.requests_per_minute),
            max_age: Duration::hours(config.news.max_age_hours),
        }
    }

    #[instrument(skip(self))]
    async fn fetch_feed(&self, feed_url: &str) -> Result<Vec<NewsArticle>> {
        let key = CacheKey::feed(feed_url);
        if let Some(articles) = self.cache.get_as::<Vec<NewsArticle>>(&key).await {
            debug!(items = articles.len(), "Using cached feed");
            return Ok(articles);
        }

        self.limiter.wait(feed_url).await;
        let bytes = self
            .client
            .get(feed_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let articles = parse_feed(&bytes, feed_url, Utc::now() - self.max_age)?;
        debug!(items = articles.len(), "Parsed feed");
        self.cache.insert_as(key, &articles).await;
        Ok(articles)
    }

    /// Collect, de-duplicate and sort articles from all feeds
    ///
    /// A failing feed is logged and skipped.
    pub async fn collect(&self, feeds: &[String]) -> Vec<NewsArticle> {
        let results = futures::future::join_all(feeds.iter().map(|f| self.fetch_feed(f))).await;

        let mut all = Vec::new();
        for (feed, result) in feeds.iter().zip(results) {
            match result {
                Ok(articles) => all.extend(articles),
                Err(e) => warn!(feed = %feed, error = %e, "Feed fetch failed, skipping"),
            }
        }

        let articles = dedupe(all);
        info!(feeds = feeds.len(), articles = articles.len(), "Collected news");
        articles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>ET Markets</title>
    <link>https://economictimes.indiatimes.com/markets</link>
    <item>
      <title>Tata Motors shares jump 5% on strong JLR sales</title>
      <link>https://economictimes.indiatimes.com/markets/stocks/news/tata-motors/amp_articleshow/1.cms?utm_source=rss</link>
      <description><![CDATA[<p>JLR volumes <b>rose</b> 12%.</p>]]></description>
      <pubDate>Mon, 03 Jun 2024 09:30:00 +0530</pubDate>
    </item>
    <item>
      <title>Old news about Infosys</title>
      <link>https://economictimes.indiatimes.com/old.cms</link>
      <pubDate>Mon, 20 May 2024 09:30:00 +0530</pubDate>
    </item>
    <item>
      <title>Undated RBI policy preview</title>
      <link>https://economictimes.indiatimes.com/rbi.cms</link>
    </item>
  </channel>
</rss>"#;

    fn cutoff() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_feed() {
        let articles = parse_feed(RSS.as_bytes(), "https://economictimes.indiatimes.com/rss", cutoff()).unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.title, "Tata Motors shares jump 5% on strong JLR sales");
        assert_eq!(first.source, "ET Markets");
        assert_eq!(first.summary, "JLR volumes rose 12%.");
        assert!(!first.url.contains("utm_source"));
        assert!(first.published.is_some());

        assert!(articles[1].published.is_none());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(parse_feed(b"<html>nope</html>", "https://x.com", cutoff()).is_err());
    }

    fn article(title: &str, url: &str, day: u32) -> NewsArticle {
        NewsArticle {
            title: title.into(),
            url: url.into(),
            source: "test".into(),
            published: Some(Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap()),
            summary: String::new(),
            body: None,
            tickers: Vec::new(),
        }
    }

    #[test]
    fn test_dedupe_and_order() {
        let articles = dedupe(vec![
            article("Nifty ends higher", "https://a.com/1", 1),
            article("NIFTY ends higher!", "https://b.com/2", 2),
            article("Sensex slips", "https://a.com/3", 3),
            article("Another take", "https://a.com/3", 1),
        ]);
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Sensex slips", "NIFTY ends higher!"]);
    }

    #[test]
    fn test_google_news_feed() {
        assert_eq!(
            google_news_feed("Tata Motors stock"),
            "https://news.google.com/rss/search?q=Tata+Motors+stock&hl=en-IN&gl=IN&ceid=IN:en"
        );
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_collect_default_feeds() {
        let config = SwingConfig::default();
        let collector = RssCollector::new(
            crate::news::http_client(&config).unwrap(),
            StockCache::new(std::time::Duration::from_secs(60)),
            &config,
        );
        let articles = collector.collect(&config.news.feeds).await;
        assert!(!articles.is_empty());
    }
}
