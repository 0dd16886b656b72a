//! Web search with ordered provider fallback
//!
//! A [`SearchAggregator`] holds an ordered list of [`SearchBackend`]s and returns
//! the results of the first one that answers with something. Every query it
//! serves also produces a [`SearchSummary`] recording what was found and where.

pub mod aggregator;
pub mod backends;
pub mod page;

pub use aggregator::{
    normalize_url, render_search_summaries, SearchAggregator, SearchBackend, SearchOutcome,
};
pub use page::PageFetcher;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;

/// A single hit returned by a search backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Name of the backend that produced this result
    pub source_engine: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        source_engine: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            source_engine: source_engine.into(),
        }
    }

    /// Lowercased host of the result URL, if it parses
    pub fn domain(&self) -> Option<String> {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    Success,
    Failed,
}

/// Record of one issued search query
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchSummary {
    pub query: String,
    pub total_results: usize,
    /// Normalized URLs of the results
    pub sources: BTreeSet<String>,
    pub domains: BTreeSet<String>,
    /// Backend that answered, if any did
    pub engine: Option<String>,
    pub status: SearchStatus,
    pub timestamp: DateTime<Utc>,
    pub results_preview: Vec<SearchResult>,
}

/// Number of results carried in a summary preview
pub const PREVIEW_LEN: usize = 3;

impl SearchSummary {
    /// Summary for a query that a backend answered
    pub fn from_results(query: &str, engine: &str, results: &[SearchResult]) -> Self {
        let sources = results
            .iter()
            .filter(|r| !r.url.trim().is_empty())
            .map(|r| normalize_url(&r.url))
            .collect();
        let domains = results.iter().filter_map(SearchResult::domain).collect();

        Self {
            query: query.to_string(),
            total_results: results.len(),
            sources,
            domains,
            engine: Some(engine.to_string()),
            status: SearchStatus::Success,
            timestamp: Utc::now(),
            results_preview: results.iter().take(PREVIEW_LEN).cloned().collect(),
        }
    }

    /// Summary for a query that no backend could answer
    pub fn failed(query: &str) -> Self {
        Self {
            query: query.to_string(),
            total_results: 0,
            sources: BTreeSet::new(),
            domains: BTreeSet::new(),
            engine: None,
            status: SearchStatus::Failed,
            timestamp: Utc::now(),
            results_preview: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SearchStatus::Success
    }
}
