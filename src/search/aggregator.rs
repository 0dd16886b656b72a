use crate::search::{SearchResult, SearchSummary};
use crate::types::Result;
use crate::utils::toml_config::SearchConfig;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A single web search provider
///
/// Implementations report failures as errors; the aggregator decides what to do
/// with them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short identifier used in logs and summaries (e.g. `tavily`)
    fn name(&self) -> &'static str;

    /// Run a query, returning at most `num_results` hits
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>>;
}

/// Results of one aggregated query and its summary
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub summary: SearchSummary,
}

/// Ordered first-success search across several backends
///
/// Backends are tried in order. The first one that returns a non-empty result
/// set within the per-backend timeout wins and later backends are never called.
/// When every backend errors, times out or comes back empty the outcome is an
/// empty result list with a failed summary; searching never returns an error.
#[derive(Clone)]
pub struct SearchAggregator {
    backends: Vec<Arc<dyn SearchBackend>>,
    timeout: Duration,
}

impl SearchAggregator {
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>, timeout: Duration) -> Self {
        Self { backends, timeout }
    }

    /// Build the backend list from `[search]`, skipping backends without credentials
    pub fn from_config(config: &SearchConfig) -> Self {
        let backends = super::backends::build_backends(config);
        if backends.is_empty() {
            warn!("No search backends are available; research will run without web results");
        }
        Self::new(backends, config.timeout())
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn search(&self, query: &str, num_results: usize) -> SearchOutcome {
        let limit = num_results.max(1);

        for backend in &self.backends {
            let name = backend.name();
            debug!(backend = name, query, "Trying search backend");

            match tokio::time::timeout(self.timeout, backend.search(query, limit)).await {
                Ok(Ok(results)) if !results.is_empty() => {
                    let results = dedup_results(results, limit);
                    info!(
                        backend = name,
                        query,
                        results = results.len(),
                        "Search backend returned results"
                    );
                    let summary = SearchSummary::from_results(query, name, &results);
                    return SearchOutcome { results, summary };
                }
                Ok(Ok(_)) => {
                    debug!(backend = name, query, "Search backend returned no results");
                }
                Ok(Err(e)) => {
                    warn!(backend = name, query, "Search backend failed: {}", e);
                }
                Err(_) => {
                    warn!(
                        backend = name,
                        query,
                        "Search backend timed out after {:?}",
                        self.timeout
                    );
                }
            }
        }

        warn!(query, "All search backends failed or returned nothing");
        SearchOutcome {
            results: Vec::new(),
            summary: SearchSummary::failed(query),
        }
    }
}

/// Canonical form of a URL used for deduplication
///
/// Scheme, host and path are lowercased, a trailing slash is removed, the query
/// string is kept and the fragment dropped. Unparseable input is trimmed and
/// lowercased.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match reqwest::Url::parse(trimmed) {
        Ok(parsed) => {
            let mut normalized = format!(
                "{}://{}",
                parsed.scheme(),
                parsed.host_str().unwrap_or_default().to_lowercase()
            );
            if let Some(port) = parsed.port() {
                normalized.push_str(&format!(":{}", port));
            }
            normalized.push_str(parsed.path().to_lowercase().trim_end_matches('/'));
            if let Some(query) = parsed.query() {
                normalized.push('?');
                normalized.push_str(query);
            }
            normalized
        }
        Err(_) => trimmed.trim_end_matches('/').to_lowercase(),
    }
}

/// Drop repeated URLs (first occurrence wins) and cap the list at `limit`
///
/// Results without a URL are kept as-is; they cannot collide with anything.
fn dedup_results(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| r.url.trim().is_empty() || seen.insert(normalize_url(&r.url)))
        .take(limit)
        .collect()
}

const MAX_LISTED: usize = 10;

/// Markdown overview of the searches issued for a research query
pub fn render_search_summaries(summaries: &[SearchSummary], query: &str) -> String {
    if summaries.is_empty() {
        return format!(
            "## Search Results Summary\n\n**Query**: {}\n**Status**: No search results available",
            query
        );
    }

    let total_results: usize = summaries.iter().map(|s| s.total_results).sum();
    let successful = summaries.iter().filter(|s| s.is_success()).count();
    let sources: BTreeSet<&str> = summaries
        .iter()
        .flat_map(|s| s.sources.iter().map(String::as_str))
        .collect();
    let domains: BTreeSet<&str> = summaries
        .iter()
        .flat_map(|s| s.domains.iter().map(String::as_str))
        .collect();
    let engines: BTreeSet<&str> = summaries
        .iter()
        .filter_map(|s| s.engine.as_deref())
        .collect();

    let list_or = |items: &BTreeSet<&str>, empty: &str| {
        if items.is_empty() {
            empty.to_string()
        } else {
            items
                .iter()
                .take(MAX_LISTED)
                .copied()
                .collect::<Vec<_>>()
                .join(", ")
        }
    };

    let mut output = format!(
        "## Search Results Summary\n\n\
         ### Overview\n\
         - **Query**: {}\n\
         - **Total Results Found**: {}\n\
         - **Successful Searches**: {}/{}\n\
         - **Information Sources**: {} different sources\n\
         - **Websites Accessed**: {} domains\n\
         - **Search Engines**: {}\n\n\
         ### Sources Used\n{}\n\n\
         ### Top Domains\n{}\n\n\
         ### Search Details",
        query,
        total_results,
        successful,
        summaries.len(),
        sources.len(),
        domains.len(),
        list_or(&engines, "none"),
        list_or(&sources, "No sources available"),
        list_or(&domains, "No domains available"),
    );

    for (i, summary) in summaries.iter().enumerate() {
        output.push_str(&format!("\n\n#### Search {} - {}", i + 1, summary.query));
        if summary.is_success() {
            output.push_str(&format!(
                "\n- **Engine**: {}\n- **Results**: {} items found\n- **Time**: {}\n- **Status**: Success",
                summary.engine.as_deref().unwrap_or("unknown"),
                summary.total_results,
                summary.timestamp.format("%H:%M:%S"),
            ));
            if !summary.results_preview.is_empty() {
                output.push_str("\n- **Top Results**:");
                for (j, preview) in summary.results_preview.iter().take(2).enumerate() {
                    let title: String = preview.title.chars().take(60).collect();
                    output.push_str(&format!(
                        "\n  {}. {} ({})",
                        j + 1,
                        title,
                        preview.domain().unwrap_or_else(|| "n/a".to_string())
                    ));
                }
            }
        } else {
            output.push_str("\n- **Status**: Failed\n- **Error**: no backend returned results");
        }
    }

    output
}
