//! HTTP search backends against a local mock server.

use lumen::search::backends::{
    GoogleSearchBackend, SerpApiBackend, TavilyBackend, WikipediaBackend,
};
use lumen::search::{PageFetcher, SearchAggregator, SearchBackend, SearchResult};
use lumen::types::AppError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_tavily_parses_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(json!({"api_key": "tvly-test", "query": "rust async"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"title": "Async Rust", "url": "https://rust-lang.org/async", "content": "Futures and tasks"},
                {"title": "Tokio", "url": "https://tokio.rs", "content": "Runtime"}
            ]
        })))
        .mount(&server)
        .await;

    let backend = TavilyBackend::new("tvly-test".to_string()).with_base_url(server.uri());
    let results = backend.search("rust async", 5).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Async Rust");
    assert_eq!(results[0].snippet, "Futures and tasks");
    assert_eq!(results[0].source_engine, "tavily");
}

#[tokio::test]
async fn test_tavily_http_error_is_search_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let backend = TavilyBackend::new("bad-key".to_string()).with_base_url(server.uri());
    let err = backend.search("anything", 5).await.unwrap_err();

    assert!(matches!(err, AppError::Search(_)));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_serpapi_parses_organic_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "grid storage"))
        .and(query_param("api_key", "serp-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "organic_results": [
                {"title": "Grid storage", "link": "https://energy.example.org/grid", "snippet": "Batteries"}
            ]
        })))
        .mount(&server)
        .await;

    let backend = SerpApiBackend::new("serp-test".to_string()).with_base_url(server.uri());
    let results = backend.search("grid storage", 5).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, "https://energy.example.org/grid");
    assert_eq!(results[0].source_engine, "serpapi");
}

#[tokio::test]
async fn test_google_caps_num_and_truncates() {
    let server = MockServer::start().await;
    let items: Vec<_> = (0..10)
        .map(|i| {
            json!({
                "title": format!("Result {}", i),
                "link": format!("https://example.com/{}", i),
                "snippet": "text"
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .and(query_param("cx", "cse-id"))
        .and(query_param("num", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .mount(&server)
        .await;

    let backend = GoogleSearchBackend::new("key".to_string(), "cse-id".to_string())
        .with_base_url(server.uri());

    let results = backend.search("anything", 25).await.unwrap();
    assert_eq!(results.len(), 10);
}

#[tokio::test]
async fn test_google_missing_items_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/customsearch/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "customsearch#search"})))
        .mount(&server)
        .await;

    let backend = GoogleSearchBackend::new("key".to_string(), "cse-id".to_string())
        .with_base_url(server.uri());

    assert!(backend.search("obscure", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_wikipedia_builds_article_urls_and_strips_markup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .and(query_param("srsearch", "fusion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {
                "search": [
                    {"title": "Fusion power", "snippet": "<span class=\"searchmatch\">Fusion</span> power &amp; energy"}
                ]
            }
        })))
        .mount(&server)
        .await;

    let backend = WikipediaBackend::new("en").with_base_url(server.uri());
    let results = backend.search("fusion", 3).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, format!("{}/wiki/Fusion_power", server.uri()));
    assert_eq!(results[0].snippet, "Fusion power & energy");
}

#[tokio::test]
async fn test_wikipedia_titles_differing_in_reserved_characters_stay_distinct() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {
                "search": [
                    {"title": "C#", "snippet": "Programming language by Microsoft"},
                    {"title": "C", "snippet": "Programming language by Dennis Ritchie"},
                    {"title": "F#", "snippet": "Functional language for .NET"}
                ]
            }
        })))
        .mount(&server)
        .await;

    let backends: Vec<Arc<dyn SearchBackend>> =
        vec![Arc::new(WikipediaBackend::new("en").with_base_url(server.uri()))];
    let aggregator = SearchAggregator::new(backends, Duration::from_secs(2));

    let outcome = aggregator.search("c language", 5).await;
    let urls: Vec<_> = outcome.results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/wiki/C%23", server.uri()),
            format!("{}/wiki/C", server.uri()),
            format!("{}/wiki/F%23", server.uri()),
        ]
    );
}

#[tokio::test]
async fn test_aggregator_falls_back_past_empty_backend() {
    let empty = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&empty)
        .await;

    let wiki = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/w/api.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "query": {"search": [{"title": "Tidal power", "snippet": "Energy from tides"}]}
        })))
        .mount(&wiki)
        .await;

    let backends: Vec<Arc<dyn SearchBackend>> = vec![
        Arc::new(TavilyBackend::new("key".to_string()).with_base_url(empty.uri())),
        Arc::new(WikipediaBackend::new("en").with_base_url(wiki.uri())),
    ];
    let aggregator = SearchAggregator::new(backends, Duration::from_secs(2));

    let outcome = aggregator.search("tidal power", 5).await;
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].source_engine, "wikipedia");
    assert!(outcome.summary.is_success());
}

#[tokio::test]
async fn test_aggregator_times_out_slow_backend() {
    let slow = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"results": [{"title": "Late", "url": "https://late.example.com", "content": ""}]}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;

    let backends: Vec<Arc<dyn SearchBackend>> =
        vec![Arc::new(TavilyBackend::new("key".to_string()).with_base_url(slow.uri()))];
    let aggregator = SearchAggregator::new(backends, Duration::from_millis(200));

    let outcome = aggregator.search("anything", 5).await;
    assert!(outcome.results.is_empty());
    assert!(!outcome.summary.is_success());
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!(
            "<!doctype html><html><head><title>t</title><style>body {{ margin: 0 }}</style></head>\
             <body><nav>Menu</nav>{}<script>track()</script></body></html>",
            body
        ),
        "text/html",
    )
}

#[tokio::test]
async fn test_page_fetcher_extracts_visible_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tides"))
        .respond_with(html_page(
            "<article><h1>Tidal power</h1><p>Tides are <b>predictable</b>.</p></article>",
        ))
        .mount(&server)
        .await;

    let fetcher = PageFetcher::new(Duration::from_secs(2), 4000);
    let text = fetcher
        .fetch_text(&format!("{}/tides", server.uri()))
        .await
        .unwrap();

    assert_eq!(text, "Tidal power Tides are predictable.");
}

#[tokio::test]
async fn test_page_fetcher_caps_length() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/long"))
        .respond_with(html_page(&format!("<p>{}</p>", "word ".repeat(500))))
        .mount(&server)
        .await;

    let fetcher = PageFetcher::new(Duration::from_secs(2), 20);
    let text = fetcher
        .fetch_text(&format!("{}/long", server.uri()))
        .await
        .unwrap();

    assert!(text.starts_with("word word word word"));
    assert!(text.ends_with("[truncated]"));
    assert!(text.chars().count() < 40);
}

#[tokio::test]
async fn test_page_fetcher_rejects_errors_and_binary_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x25, 0x50, 0x44, 0x46], "application/pdf"))
        .mount(&server)
        .await;

    let fetcher = PageFetcher::new(Duration::from_secs(2), 4000);

    let err = fetcher
        .fetch_text(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Search(_)));
    assert!(err.to_string().contains("404"));

    let err = fetcher
        .fetch_text(&format!("{}/report.pdf", server.uri()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("application/pdf"));
}

#[tokio::test]
async fn test_page_fetcher_times_out_slow_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html_page("<p>late</p>").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fetcher = PageFetcher::new(Duration::from_millis(200), 4000);
    let started = std::time::Instant::now();
    let result = fetcher.fetch_text(&format!("{}/slow", server.uri())).await;

    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_fetch_top_limits_dedups_and_skips_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page("<p>Page A</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html_page("<p>Page C</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let uri = server.uri();
    let results = vec![
        SearchResult::new("A", format!("{}/a", uri), "snippet a", "test"),
        SearchResult::new("A again", format!("{}/a/", uri), "snippet a", "test"),
        SearchResult::new("B", format!("{}/b", uri), "snippet b", "test"),
        SearchResult::new("C", format!("{}/c", uri), "snippet c", "test"),
    ];

    let fetcher = PageFetcher::new(Duration::from_secs(2), 4000);
    let pages = fetcher.fetch_top(&results, 2).await;

    assert_eq!(pages.len(), 1);
    assert_eq!(pages.get(&format!("{}/a", uri)).map(String::as_str), Some("Page A"));
}
