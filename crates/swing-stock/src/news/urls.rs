//! Canonical article URLs
//!
//! Aggregators wrap links in redirectors and publishers serve AMP copies;
//! both break de-duplication and produce worse article text.

use crate::error::Result;
use reqwest::Client;
use tracing::debug;
use url::Url;

const WRAPPER_PARAMS: &[&str] = &["url", "u"];

fn is_amp_param(key: &str, value: &str) -> bool {
    (key == "amp" && (value == "1" || value == "true"))
        || (key.eq_ignore_ascii_case("outputType") && value == "amp")
}

/// Unwrap redirect wrappers and map AMP pages to their canonical form
///
/// Unparseable input is returned unchanged.
pub fn resolve_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.to_string();
    };

    if let Some(target) = url
        .query_pairs()
        .find(|(k, v)| WRAPPER_PARAMS.contains(&k.as_ref()) && v.starts_with("http"))
        .map(|(_, v)| v.into_owned())
    {
        return resolve_url(&target);
    }

    if let Some(host) = url.host_str().and_then(|h| h.strip_prefix("amp.")).map(str::to_string) {
        let _ = url.set_host(Some(&host));
    }

    let path = url.path().to_string();
    let mut segments: Vec<&str> = path.split('/').filter(|s| *s != "amp").collect();
    if let Some(last) = segments.last_mut() {
        if let Some(stem) = last.strip_suffix(".amp.html") {
            *last = stem;
        } else if let Some(stem) = last.strip_suffix(".amp") {
            *last = stem;
        }
    }
    let mut new_path = segments.join("/");
    if path.ends_with(".amp.html") {
        new_path.push_str(".html");
    }
    if new_path.is_empty() {
        new_path.push('/');
    }
    url.set_path(&new_path);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, v)| !is_amp_param(k, v) && !k.starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    url.to_string()
}

/// Follow HTTP redirects for Google News article links
///
/// Other URLs only go through [`resolve_url`].
pub async fn resolve_redirect(client: &Client, raw: &str) -> Result<String> {
    let is_google_article = Url::parse(raw).is_ok_and(|u| {
        u.host_str() == Some("news.google.com") && u.path().starts_with("/rss/articles/")
    });
    if !is_google_article {
        return Ok(resolve_url(raw));
    }

    let response = client.get(raw).send().await?;
    let landed = response.url().to_string();
    debug!(from = raw, to = %landed, "Resolved redirect");
    Ok(resolve_url(&landed))
}
