//! Page content for the top search hits
//!
//! Snippets are short, so the researcher can pull the readable text of the
//! first few result pages before synthesis. Every fetch is bounded by a
//! timeout and a character cap; a page that fails to load is simply absent
//! from the returned map and the caller keeps using its snippet.

use crate::search::{normalize_url, SearchResult};
use crate::types::{AppError, Result};
use crate::utils::toml_config::SearchConfig;
use futures::future::join_all;
use scraper::Html;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

/// Elements whose text never reaches the extracted content
const SKIPPED_ELEMENTS: &[&str] = &[
    "head", "script", "style", "noscript", "template", "svg", "nav", "footer", "iframe", "form",
];

#[derive(Clone)]
pub struct PageFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_chars: usize,
}

impl PageFetcher {
    pub fn new(timeout: Duration, max_chars: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("lumen/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            timeout,
            max_chars: max_chars.max(1),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.page_timeout(), config.page_max_chars)
    }

    /// Download one page and return its visible text, capped at `max_chars`
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::Search(format!("fetching {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Search(format!(
                "fetching {} returned {}",
                url, status
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();
        if !content_type.starts_with("text/") && !content_type.contains("html") {
            return Err(AppError::Search(format!(
                "{} is {}, not a text page",
                url, content_type
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Search(format!("reading {} failed: {}", url, e)))?;

        let text = extract_text(&body);
        if text.is_empty() {
            return Err(AppError::Search(format!("{} has no readable text", url)));
        }
        Ok(cap_chars(&text, self.max_chars))
    }

    /// Fetch the first `limit` distinct result URLs concurrently
    ///
    /// The map is keyed by the result's URL as returned by the backend.
    pub async fn fetch_top(
        &self,
        results: &[SearchResult],
        limit: usize,
    ) -> HashMap<String, String> {
        let mut seen = HashSet::new();
        let urls: Vec<&str> = results
            .iter()
            .map(|r| r.url.trim())
            .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
            .filter(|url| seen.insert(normalize_url(url)))
            .take(limit)
            .collect();

        let fetched = join_all(urls.iter().map(|url| self.fetch_text(url))).await;

        let mut pages = HashMap::with_capacity(urls.len());
        for (url, outcome) in urls.into_iter().zip(fetched) {
            match outcome {
                Ok(text) => {
                    debug!(url, chars = text.chars().count(), "Fetched page content");
                    pages.insert(url.to_string(), text);
                }
                Err(e) => warn!(url, "Page fetch failed, keeping snippet: {}", e),
            }
        }
        pages
    }
}

/// Visible text of an HTML document with whitespace collapsed
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut words = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| SKIPPED_ELEMENTS.contains(&element.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

fn cap_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{} [truncated]", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_skips_scripts_and_chrome() {
        let html = r#"<!doctype html>
            <html>
              <head><title>Ignored</title><style>p { color: red }</style></head>
              <body>
                <nav>Home | About</nav>
                <h1>Tidal   power</h1>
                <script>var tracking = true;</script>
                <p>Tides are <em>predictable</em> &amp; dense.</p>
                <footer>Copyright</footer>
              </body>
            </html>"#;

        assert_eq!(
            extract_text(html),
            "Tidal power Tides are predictable & dense."
        );
    }

    #[test]
    fn test_cap_chars_respects_char_boundaries() {
        assert_eq!(cap_chars("日本語のテキスト", 3), "日本語 [truncated]");
        assert_eq!(cap_chars("short", 10), "short");
    }
}
