//! Shared helpers for the integration tests.

#![allow(dead_code)]

pub mod mocks;

use futures::StreamExt;
use lumen::research::analyst::Analyst;
use lumen::research::researcher::Researcher;
use lumen::research::writer::Writer;
use lumen::research::{ProgressEvent, ResearchCoordinator, ResearchSettings};
use lumen::search::{SearchAggregator, SearchBackend};
use lumen::types::ResearchRequest;
use mocks::{ScriptedLLM, StaticBackend};
use std::sync::Arc;
use std::time::Duration;

pub const SUFFICIENT: &str = "The findings cover the topic comprehensively.";
pub const INSUFFICIENT: &str =
    "There is a knowledge gap regarding manufacturing costs; additional research needed.";
pub const REPORT: &str = "# Report\n\nSolid-state batteries are maturing.";

/// The three agent models plus search backends behind a coordinator
pub struct Harness {
    pub researcher: Arc<ScriptedLLM>,
    pub analyst: Arc<ScriptedLLM>,
    pub writer: Arc<ScriptedLLM>,
    pub backends: Vec<Arc<dyn SearchBackend>>,
    pub settings: ResearchSettings,
}

impl Harness {
    /// Researcher answers with generic findings, the analyst with `analyst`, the
    /// writer with [`REPORT`]; search returns three static hits.
    pub fn new(analyst: ScriptedLLM) -> Self {
        Self {
            researcher: ScriptedLLM::new("Battery energy density improved in 2024.").shared(),
            analyst: analyst.shared(),
            writer: ScriptedLLM::new(REPORT).shared(),
            backends: vec![Arc::new(StaticBackend::new(3))],
            settings: ResearchSettings::default(),
        }
    }

    pub fn with_backends(mut self, backends: Vec<Arc<dyn SearchBackend>>) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_researcher(mut self, researcher: ScriptedLLM) -> Self {
        self.researcher = researcher.shared();
        self
    }

    pub fn with_writer(mut self, writer: ScriptedLLM) -> Self {
        self.writer = writer.shared();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.settings.session_timeout = Some(timeout);
        self
    }

    pub fn build(&self) -> ResearchCoordinator {
        let search = SearchAggregator::new(self.backends.clone(), Duration::from_secs(2));
        ResearchCoordinator::new(
            Researcher::new(self.researcher.clone(), search, 3),
            Analyst::new(self.analyst.clone()),
            Writer::new(self.writer.clone()),
        )
        .with_settings(self.settings.clone())
    }

    pub fn coordinator(&self) -> Arc<ResearchCoordinator> {
        Arc::new(self.build())
    }
}

/// Run a session and collect every event it yields
pub async fn collect_events(
    coordinator: Arc<ResearchCoordinator>,
    request: ResearchRequest,
) -> Vec<ProgressEvent> {
    coordinator.stream(request).collect().await
}

/// Stages of the `status` events, in order
pub fn status_stages(events: &[ProgressEvent]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Status { stage, .. } => Some(stage.as_str()),
            _ => None,
        })
        .collect()
}
