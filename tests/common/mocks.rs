//! Mock implementations for testing.
//!
//! Scripted LLM clients and search backends shared by the integration tests, so
//! research sessions can run end to end without a model server or network.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream;
use lumen::llm::{LLMClient, TextStream};
use lumen::search::{SearchBackend, SearchResult};
use lumen::types::{AppError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Characters per chunk when a scripted response is streamed
pub const STREAM_CHUNK_CHARS: usize = 5;

/// LLM client that answers from a script.
///
/// Queued responses are returned in order; once the queue is empty every call
/// gets the fallback response. Streaming calls split the response into
/// [`STREAM_CHUNK_CHARS`]-character chunks.
///
/// ```ignore
/// let analyst = ScriptedLLM::new("Findings are complete.")
///     .then("There is a knowledge gap around pricing.");
/// ```
pub struct ScriptedLLM {
    queue: Mutex<VecDeque<String>>,
    fallback: String,
    should_fail: bool,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl ScriptedLLM {
    pub fn new(fallback: &str) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            should_fail: false,
            delay: None,
            prompts: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    /// Create a client whose every call fails with a model error.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::new("")
        }
    }

    /// Queue a response ahead of the fallback.
    pub fn then(self, response: &str) -> Self {
        self.queue.lock().push_back(response.to_string());
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Calls that reached the client
    pub fn calls(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Calls that produced an answer
    pub fn completed(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    async fn answer(&self, prompt: &str) -> Result<String> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }

        let response = self
            .queue
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(response)
    }

    fn chunked(response: String) -> TextStream {
        let chars: Vec<char> = response.chars().collect();
        let chunks: Vec<Result<String>> = chars
            .chunks(STREAM_CHUNK_CHARS)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Box::new(stream::iter(chunks))
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        self.answer(prompt).await
    }

    async fn stream_with_system(&self, _system: &str, prompt: &str) -> Result<TextStream> {
        Ok(Self::chunked(self.answer(prompt).await?))
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }
}

/// Backend that returns the same `count` hits for every query.
pub struct StaticBackend {
    count: usize,
    calls: AtomicUsize,
}

impl StaticBackend {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for StaticBackend {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn search(&self, _query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..self.count.min(num_results))
            .map(|i| {
                SearchResult::new(
                    format!("Article {}", i + 1),
                    format!("https://news.example.com/article-{}", i + 1),
                    format!("Snippet for article {}", i + 1),
                    "static",
                )
            })
            .collect())
    }
}

/// Backend that never finds anything.
pub struct EmptyBackend;

#[async_trait]
impl SearchBackend for EmptyBackend {
    fn name(&self) -> &'static str {
        "empty"
    }

    async fn search(&self, _query: &str, _num_results: usize) -> Result<Vec<SearchResult>> {
        Ok(vec![])
    }
}

/// Backend that always errors.
pub struct FailingBackend;

#[async_trait]
impl SearchBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn search(&self, _query: &str, _num_results: usize) -> Result<Vec<SearchResult>> {
        Err(AppError::Search("backend unavailable".to_string()))
    }
}

/// Backend that answers only after `delay`.
pub struct SlowBackend {
    pub delay: Duration,
}

#[async_trait]
impl SearchBackend for SlowBackend {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn search(&self, query: &str, _num_results: usize) -> Result<Vec<SearchResult>> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![SearchResult::new(
            "Slow result",
            format!("https://slow.example.com/{}", query.len()),
            "Arrived late",
            "slow",
        )])
    }
}
