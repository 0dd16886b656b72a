//! Concrete search backends
//!
//! HTTP backends take an overridable base URL so they can be pointed at a local
//! mock server. DuckDuckGo goes through `daedra`.

use crate::search::{SearchBackend, SearchResult};
use crate::types::{AppError, Result};
use crate::utils::toml_config::{SearchBackendKind, SearchConfig};
use async_trait::async_trait;
use scraper::Html;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Instantiate the configured backends in order
///
/// Backends whose credentials are missing from the environment are skipped with
/// a warning rather than failing startup.
pub fn build_backends(config: &SearchConfig) -> Vec<Arc<dyn SearchBackend>> {
    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
    let mut backends: Vec<Arc<dyn SearchBackend>> = Vec::new();

    for kind in &config.backends {
        let missing: Vec<&str> = config
            .credential_envs(*kind)
            .into_iter()
            .filter(|name| env(name).is_none())
            .collect();
        if !missing.is_empty() {
            warn!(
                "Skipping search backend '{}': {} not set",
                kind,
                missing.join(", ")
            );
            continue;
        }

        let backend: Arc<dyn SearchBackend> = match kind {
            SearchBackendKind::Tavily => Arc::new(TavilyBackend::new(
                env(&config.tavily_api_key_env).unwrap_or_default(),
            )),
            SearchBackendKind::SerpApi => Arc::new(SerpApiBackend::new(
                env(&config.serpapi_api_key_env).unwrap_or_default(),
            )),
            SearchBackendKind::Google => Arc::new(GoogleSearchBackend::new(
                env(&config.google_api_key_env).unwrap_or_default(),
                env(&config.google_cse_id_env).unwrap_or_default(),
            )),
            SearchBackendKind::DuckDuckGo => Arc::new(DuckDuckGoBackend::new()),
            SearchBackendKind::Wikipedia => {
                Arc::new(WikipediaBackend::new(&config.wikipedia_lang))
            }
        };
        backends.push(backend);
    }

    info!(
        "Search backends enabled: {}",
        backends
            .iter()
            .map(|b| b.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    backends
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("lumen/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

async fn read_json<T: serde::de::DeserializeOwned>(
    backend: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(AppError::Search(format!(
            "{} returned HTTP {}",
            backend, status
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| AppError::Search(format!("{} returned an unreadable body: {}", backend, e)))
}

fn request_error(backend: &str, e: reqwest::Error) -> AppError {
    AppError::Search(format!("{} request failed: {}", backend, e))
}

// ============= Tavily =============

pub struct TavilyBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyHit>,
}

#[derive(Deserialize)]
struct TavilyHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilyBackend {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: "https://api.tavily.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SearchBackend for TavilyBackend {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": num_results,
            "search_depth": "basic",
        });

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(self.name(), e))?;

        let parsed: TavilyResponse = read_json(self.name(), response).await?;
        Ok(parsed
            .results
            .into_iter()
            .take(num_results)
            .map(|r| SearchResult::new(r.title, r.url, r.content, self.name()))
            .collect())
    }
}

// ============= SerpAPI =============

pub struct SerpApiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<LinkHit>,
}

/// Result shape shared by SerpAPI organic results and Google CSE items
#[derive(Deserialize)]
struct LinkHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerpApiBackend {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            base_url: "https://serpapi.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SearchBackend for SerpApiBackend {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        let num = num_results.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_error(self.name(), e))?;

        let parsed: SerpApiResponse = read_json(self.name(), response).await?;
        Ok(parsed
            .organic_results
            .into_iter()
            .take(num_results)
            .map(|r| SearchResult::new(r.title, r.link, r.snippet, self.name()))
            .collect())
    }
}

// ============= Google Custom Search =============

pub struct GoogleSearchBackend {
    client: reqwest::Client,
    api_key: String,
    cse_id: String,
    base_url: String,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<LinkHit>,
}

/// Google CSE refuses `num` above this
const GOOGLE_MAX_NUM: usize = 10;

impl GoogleSearchBackend {
    pub fn new(api_key: String, cse_id: String) -> Self {
        Self {
            client: http_client(),
            api_key,
            cse_id,
            base_url: "https://www.googleapis.com".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SearchBackend for GoogleSearchBackend {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        let num = num_results.min(GOOGLE_MAX_NUM).to_string();
        let response = self
            .client
            .get(format!("{}/customsearch/v1", self.base_url))
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| request_error(self.name(), e))?;

        let parsed: GoogleResponse = read_json(self.name(), response).await?;
        Ok(parsed
            .items
            .into_iter()
            .take(num_results)
            .map(|r| SearchResult::new(r.title, r.link, r.snippet, self.name()))
            .collect())
    }
}

// ============= DuckDuckGo (daedra) =============

/// DuckDuckGo web search via the daedra crate; needs no credentials
#[derive(Default)]
pub struct DuckDuckGoBackend;

impl DuckDuckGoBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SearchBackend for DuckDuckGoBackend {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Search(format!("duckduckgo search failed: {}", e)))?;

        Ok(response
            .data
            .iter()
            .take(num_results)
            .map(|r| {
                SearchResult::new(
                    r.title.clone(),
                    r.url.clone(),
                    r.description.clone(),
                    self.name(),
                )
            })
            .collect())
    }
}

// ============= Wikipedia =============

pub struct WikipediaBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct WikipediaResponse {
    query: Option<WikipediaQuery>,
}

#[derive(Deserialize)]
struct WikipediaQuery {
    #[serde(default)]
    search: Vec<WikipediaHit>,
}

#[derive(Deserialize)]
struct WikipediaHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

impl WikipediaBackend {
    /// Backend for a language edition, e.g. `en` or `zh`
    pub fn new(lang: &str) -> Self {
        Self {
            client: http_client(),
            base_url: format!("https://{}.wikipedia.org", lang),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Article link with the title percent-encoded as a single path segment
    fn article_url(&self, title: &str) -> String {
        let slug = title.replace(' ', "_");
        match reqwest::Url::parse(&self.base_url) {
            Ok(mut url) => {
                if let Ok(mut segments) = url.path_segments_mut() {
                    segments.pop_if_empty().push("wiki").push(&slug);
                }
                url.to_string()
            }
            Err(_) => format!("{}/wiki/{}", self.base_url.trim_end_matches('/'), slug),
        }
    }
}

/// Text content of a snippet, without the `<span class="searchmatch">` markup
/// and with entities decoded
fn strip_markup(snippet: &str) -> String {
    Html::parse_fragment(snippet)
        .root_element()
        .text()
        .collect()
}

#[async_trait]
impl SearchBackend for WikipediaBackend {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        let limit = num_results.to_string();
        let response = self
            .client
            .get(format!("{}/w/api.php", self.base_url))
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| request_error(self.name(), e))?;

        let parsed: WikipediaResponse = read_json(self.name(), response).await?;
        Ok(parsed
            .query
            .map(|q| q.search)
            .unwrap_or_default()
            .into_iter()
            .take(num_results)
            .map(|hit| {
                SearchResult::new(
                    hit.title.clone(),
                    self.article_url(&hit.title),
                    strip_markup(&hit.snippet),
                    self.name(),
                )
            })
            .collect())
    }
}
