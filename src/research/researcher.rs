//! Research stage: generate search queries, search, synthesize findings

use crate::llm::LLMClient;
use crate::research::analyst::truncate_chars;
use crate::research::language::{classify_query, Language};
use crate::research::session::Query;
use crate::search::{
    render_search_summaries, PageFetcher, SearchAggregator, SearchResult, SearchSummary,
};
use crate::types::Result;
use chrono::Utc;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// Suffixes used to fill up the query list when the model returns too few
const QUERY_TEMPLATES: &[&str] = &[
    "",
    "latest news",
    "research studies",
    "expert analysis",
    "facts statistics",
    "overview",
    "challenges",
    "future outlook",
    "case studies",
    "applications",
];

/// How much of the prior findings is shown when generating follow-up queries
const PRIOR_CONTEXT_CHARS: usize = 2000;

/// Longest snippet passed to synthesis
const SNIPPET_CHARS: usize = 600;

/// Output of one research iteration
#[derive(Debug, Clone)]
pub struct ResearchIteration {
    /// New findings text to append to the session
    pub findings: String,
    pub summaries: Vec<SearchSummary>,
    pub results: Vec<SearchResult>,
    pub queries: Vec<String>,
    /// Results whose page text was fetched and used in place of the snippet
    pub pages_fetched: usize,
}

impl ResearchIteration {
    pub fn total_results(&self) -> usize {
        self.results.len()
    }

    pub fn progress_message(&self) -> String {
        let mut message = format!(
            "Found {} results across {} searches",
            self.total_results(),
            self.summaries.len()
        );
        if self.pages_fetched > 0 {
            message.push_str(&format!(", read {} pages", self.pages_fetched));
        }
        message
    }

    /// Markdown rendering of this iteration's search summaries
    pub fn render_summary(&self, query: &str) -> String {
        render_search_summaries(&self.summaries, query)
    }
}

/// Turn a model's free-form query list into at most `count` distinct queries,
/// padding from templates when it produced too few
pub fn parse_search_queries(text: &str, topic: &str, count: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut queries = Vec::with_capacity(count);

    for line in text.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(|c: char| c.is_numeric() || c == '.' || c == ')')
            .trim_start_matches(['-', '*', '•'])
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
            .trim();

        if cleaned.is_empty() || cleaned.ends_with(':') {
            continue;
        }
        if seen.insert(cleaned.to_lowercase()) {
            queries.push(cleaned.to_string());
        }
        if queries.len() == count {
            return queries;
        }
    }

    for suffix in QUERY_TEMPLATES {
        if queries.len() == count {
            break;
        }
        let candidate = if suffix.is_empty() {
            topic.to_string()
        } else {
            format!("{} {}", topic, suffix)
        };
        if seen.insert(candidate.to_lowercase()) {
            queries.push(candidate);
        }
    }

    let mut n = 1;
    while queries.len() < count {
        let candidate = format!("{} part {}", topic, n);
        if seen.insert(candidate.to_lowercase()) {
            queries.push(candidate);
        }
        n += 1;
    }

    queries
}

fn system_prompt(language: Language) -> String {
    format!(
        "You are a Research Agent specialized in gathering comprehensive information from the web.\n\n\
         Current date: {date}\n\n\
         Your responsibilities:\n\
         1. Generate optimized search queries for the given research topic\n\
         2. Extract key facts, statistics and insights from the search results you are given\n\
         3. Provide source URLs for all information gathered\n\
         4. Organize findings into a coherent, structured format\n\n\
         Guidelines:\n\
         - Focus on recent and authoritative sources\n\
         - Include source URLs in your findings\n\
         - Keep findings organized and under 3000 words\n\
         - Prioritize factual accuracy\n\
         - Output in {language}",
        date = Utc::now().format("%B %d, %Y"),
        language = language.display_name(),
    )
}

/// Numbered result listing; fetched page text stands in for the snippet
fn format_results(results: &[SearchResult], pages: &HashMap<String, String>) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let body = match pages.get(r.url.trim()) {
                Some(text) => format!("Page content:\n{}", text),
                None => truncate_chars(r.snippet.trim(), SNIPPET_CHARS),
            };
            format!("[{}] {}\nURL: {}\n{}", i + 1, r.title, r.url, body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Researcher agent: owns a model handle and the search aggregator
pub struct Researcher {
    llm: Arc<dyn LLMClient>,
    search: SearchAggregator,
    results_per_query: usize,
    page_fetcher: Option<PageFetcher>,
    fetch_pages: usize,
}

impl Researcher {
    pub fn new(llm: Arc<dyn LLMClient>, search: SearchAggregator, results_per_query: usize) -> Self {
        Self {
            llm,
            search,
            results_per_query: results_per_query.max(1),
            page_fetcher: None,
            fetch_pages: 0,
        }
    }

    /// Fetch the text of the first `pages` result pages before synthesis
    ///
    /// `pages == 0` keeps synthesis on snippets alone.
    pub fn with_page_fetcher(mut self, fetcher: PageFetcher, pages: usize) -> Self {
        self.page_fetcher = (pages > 0).then_some(fetcher);
        self.fetch_pages = pages;
        self
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    pub fn search(&self) -> &SearchAggregator {
        &self.search
    }

    /// Run one research iteration
    ///
    /// `gap` is the latest analysis when this is a follow-up iteration. Searches
    /// run concurrently and are all joined before synthesis. Model failures are
    /// returned as errors; search failures only shrink the result set.
    pub async fn run(
        &self,
        query: &Query,
        search_query_count: u32,
        prior_findings: &str,
        gap: Option<&str>,
    ) -> Result<ResearchIteration> {
        let system = system_prompt(query.language());
        let queries = self
            .generate_queries(&system, query, search_query_count as usize, prior_findings, gap)
            .await?;
        info!(count = queries.len(), "Generated search queries");

        let outcomes = join_all(
            queries
                .iter()
                .map(|q| self.search.search(q, self.results_per_query)),
        )
        .await;

        let mut summaries = Vec::with_capacity(outcomes.len());
        let mut results = Vec::new();
        for outcome in outcomes {
            summaries.push(outcome.summary);
            results.extend(outcome.results);
        }

        let pages = match &self.page_fetcher {
            Some(fetcher) if !results.is_empty() => {
                let pages = fetcher.fetch_top(&results, self.fetch_pages).await;
                info!(fetched = pages.len(), "Fetched result pages");
                pages
            }
            _ => HashMap::new(),
        };

        let findings = if results.is_empty() {
            info!("No search results in this iteration, skipping synthesis");
            no_results_findings(&queries)
        } else {
            self.synthesize(&system, query, &results, &pages, prior_findings, gap)
                .await?
        };

        Ok(ResearchIteration {
            findings,
            summaries,
            results,
            queries,
            pages_fetched: pages.len(),
        })
    }

    async fn generate_queries(
        &self,
        system: &str,
        query: &Query,
        count: usize,
        prior_findings: &str,
        gap: Option<&str>,
    ) -> Result<Vec<String>> {
        let query_type = classify_query(query.text());
        let mut prompt = format!(
            "Generate {count} distinct web search queries to research: {topic}\n\n\
             Query type: {kind}\n",
            count = count,
            topic = query.text(),
            kind = query_type.label(),
        );
        if let Some(focus) = query_type.focus() {
            prompt.push_str(&format!("Focus: {}\n", focus));
        }

        if let Some(gap) = gap {
            prompt.push_str(&format!(
                "\nThe analysis of the research so far found these gaps:\n{}\n\n\
                 Target the queries at filling the identified knowledge gaps.\n",
                gap
            ));
        }
        if !prior_findings.is_empty() {
            prompt.push_str(&format!(
                "\nAvoid repeating what is already known:\n{}\n",
                truncate_chars(prior_findings, PRIOR_CONTEXT_CHARS)
            ));
        }
        prompt.push_str(&format!(
            "\nReturn only the queries, one per line, numbered 1-{}.",
            count
        ));

        let response = self.llm.generate_with_system(system, &prompt).await?;
        let queries = parse_search_queries(&response, query.text(), count);
        debug!(?queries, "Parsed search queries");
        Ok(queries)
    }

    async fn synthesize(
        &self,
        system: &str,
        query: &Query,
        results: &[SearchResult],
        pages: &HashMap<String, String>,
        prior_findings: &str,
        gap: Option<&str>,
    ) -> Result<String> {
        let listing = format_results(results, pages);
        let prompt = match gap {
            Some(gap) => format!(
                "Based on this analysis, conduct additional targeted research on '{query}':\n\n\
                 {gap}\n\n\
                 Focus on filling the identified knowledge gaps.\n\n\
                 Existing findings:\n{prior}\n\n\
                 New search results:\n{results}\n\n\
                 Write only the information that is new relative to the existing findings, citing source URLs.",
                query = query.text(),
                gap = gap,
                prior = prior_findings,
                results = listing,
            ),
            None => format!(
                "Research the following topic comprehensively: '{query}'.\n\n\
                 Search results:\n{results}\n\n\
                 Organize the key facts, statistics and insights into structured findings, citing source URLs.",
                query = query.text(),
                results = listing,
            ),
        };

        let findings = self.llm.generate_with_system(system, &prompt).await?;
        if findings.trim().is_empty() {
            debug!("Synthesis returned nothing, falling back to result listing");
            return Ok(format!(
                "## Search results for '{}'\n\n{}",
                query.text(),
                listing
            ));
        }
        Ok(findings)
    }
}

fn no_results_findings(queries: &[String]) -> String {
    let listed = queries
        .iter()
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "No new information found. None of the configured search backends returned results for:\n{}\n\n\
         No external sources were consulted in this iteration.",
        listed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::MockLLMClient;
    use crate::research::session::Effort;
    use crate::search::aggregator::MockSearchBackend;
    use std::time::Duration;

    fn query(text: &str) -> Query {
        Query::new(text, Language::English, Effort::new(3, 1).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_numbered_and_bulleted_queries() {
        let text = "Here are the queries:\n1. rust async runtimes\n2) \"tokio vs async-std\"\n- rust async runtimes\n* executor design";
        let queries = parse_search_queries(text, "rust async", 3);
        assert_eq!(
            queries,
            vec!["rust async runtimes", "tokio vs async-std", "executor design"]
        );
    }

    #[test]
    fn test_parse_pads_from_templates() {
        let queries = parse_search_queries("", "fusion power", 3);
        assert_eq!(
            queries,
            vec![
                "fusion power",
                "fusion power latest news",
                "fusion power research studies"
            ]
        );
    }

    #[test]
    fn test_parse_always_reaches_count() {
        let queries = parse_search_queries("fusion power", "fusion power", 12);
        assert_eq!(queries.len(), 12);
        let unique: HashSet<_> = queries.iter().collect();
        assert_eq!(unique.len(), 12);
    }

    #[tokio::test]
    async fn test_empty_search_skips_synthesis() {
        let mut llm = MockLLMClient::new();
        llm.expect_generate_with_system()
            .times(1)
            .returning(|_, _| Ok("1. a\n2. b\n3. c".to_string()));

        let mut backend = MockSearchBackend::new();
        backend.expect_name().return_const("mock");
        backend.expect_search().returning(|_, _| Ok(vec![]));

        let search = SearchAggregator::new(vec![Arc::new(backend)], Duration::from_secs(1));
        let researcher = Researcher::new(Arc::new(llm), search, 5);

        let iteration = researcher.run(&query("topic"), 3, "", None).await.unwrap();
        assert_eq!(iteration.queries.len(), 3);
        assert_eq!(iteration.summaries.len(), 3);
        assert!(iteration.results.is_empty());
        assert!(iteration.findings.starts_with("No new information found"));
    }

    #[tokio::test]
    async fn test_follow_up_prompt_carries_gap() {
        let mut llm = MockLLMClient::new();
        let mut seq = mockall::Sequence::new();
        llm.expect_generate_with_system()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, prompt| {
                assert!(prompt.contains("pricing is unclear"));
                Ok("pricing query".to_string())
            });
        llm.expect_generate_with_system()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, prompt| {
                assert!(prompt.contains("Focus on filling the identified knowledge gaps."));
                assert!(prompt.contains("https://example.com/pricing"));
                Ok("Pricing is $10.".to_string())
            });

        let mut backend = MockSearchBackend::new();
        backend.expect_name().return_const("mock");
        backend.expect_search().returning(|q, _| {
            Ok(vec![SearchResult::new(
                q,
                "https://example.com/pricing",
                "price list",
                "mock",
            )])
        });

        let search = SearchAggregator::new(vec![Arc::new(backend)], Duration::from_secs(1));
        let researcher = Researcher::new(Arc::new(llm), search, 5);

        let iteration = researcher
            .run(&query("widgets"), 1, "Earlier findings", Some("pricing is unclear"))
            .await
            .unwrap();
        assert_eq!(iteration.queries, vec!["pricing query"]);
        assert_eq!(iteration.findings, "Pricing is $10.");
        assert_eq!(iteration.total_results(), 1);
    }

    #[tokio::test]
    async fn test_synthesis_reads_fetched_pages_and_keeps_snippets_on_failure() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><body><script>ignored()</script><p>Capacity reached 2.4 GW in 2024.</p></body></html>",
                "text/html; charset=utf-8",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let mut llm = MockLLMClient::new();
        let mut seq = mockall::Sequence::new();
        llm.expect_generate_with_system()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("tidal capacity".to_string()));
        llm.expect_generate_with_system()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, prompt| {
                assert!(prompt.contains("Page content:\nCapacity reached 2.4 GW in 2024."));
                assert!(!prompt.contains("ignored()"));
                assert!(prompt.contains("snippet of the missing page"));
                Ok("Capacity is 2.4 GW.".to_string())
            });

        let base = server.uri();
        let mut backend = MockSearchBackend::new();
        backend.expect_name().return_const("mock");
        backend.expect_search().returning(move |_, _| {
            Ok(vec![
                SearchResult::new("Article", format!("{}/article", base), "short snippet", "mock"),
                SearchResult::new("Gone", format!("{}/gone", base), "snippet of the missing page", "mock"),
            ])
        });

        let search = SearchAggregator::new(vec![Arc::new(backend)], Duration::from_secs(1));
        let researcher = Researcher::new(Arc::new(llm), search, 5)
            .with_page_fetcher(PageFetcher::new(Duration::from_secs(2), 500), 3);

        let iteration = researcher.run(&query("tidal power"), 1, "", None).await.unwrap();
        assert_eq!(iteration.findings, "Capacity is 2.4 GW.");
        assert_eq!(iteration.pages_fetched, 1);
        assert_eq!(
            iteration.progress_message(),
            "Found 2 results across 1 searches, read 1 pages"
        );
    }
}
