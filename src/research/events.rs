//! Progress events emitted while a research session runs
//!
//! Events serialize to a flat JSON object tagged by `type`, which is exactly what
//! the SSE endpoint writes into each `data:` frame.

use crate::research::analyst::AnalysisVerdict;
use crate::research::language::Language;
use crate::research::session::Stage;
use crate::search::SearchSummary;
use crate::types::{AppError, ErrorKind, Result, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A stage started or changed phase
    Status {
        message: String,
        stage: Stage,
        /// Overall completion, 0-100
        progress: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<StageData>,
    },
    /// A stage produced intermediate output
    Progress {
        message: String,
        stage: Stage,
        progress: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<StageData>,
    },
    ReportStart { message: String },
    ReportChunk { data: ChunkData },
    Complete { data: CompletePayload },
    Error {
        message: String,
        error: String,
        kind: ErrorKind,
    },
}

impl ProgressEvent {
    /// `complete` and `error` end a stream; nothing may follow them
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete { .. } | ProgressEvent::Error { .. }
        )
    }

    pub fn status(stage: Stage, progress: u8, message: impl Into<String>) -> Self {
        ProgressEvent::Status {
            message: message.into(),
            stage,
            progress,
            data: None,
        }
    }

    pub fn progress(
        stage: Stage,
        progress: u8,
        message: impl Into<String>,
        data: StageData,
    ) -> Self {
        ProgressEvent::Progress {
            message: message.into(),
            stage,
            progress,
            data: Some(data),
        }
    }

    pub fn report_chunk(chunk: impl Into<String>) -> Self {
        ProgressEvent::ReportChunk {
            data: ChunkData {
                chunk: chunk.into(),
            },
        }
    }

    pub fn error(err: &AppError) -> Self {
        ProgressEvent::Error {
            message: "Research failed".to_string(),
            error: err.to_string(),
            kind: err.kind(),
        }
    }

    /// Wire name of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            ProgressEvent::Status { .. } => "status",
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::ReportStart { .. } => "report_start",
            ProgressEvent::ReportChunk { .. } => "report_chunk",
            ProgressEvent::Complete { .. } => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            ProgressEvent::Status { stage, .. } | ProgressEvent::Progress { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }

    pub fn progress_value(&self) -> Option<u8> {
        match self {
            ProgressEvent::Status { progress, .. } | ProgressEvent::Progress { progress, .. } => {
                Some(*progress)
            }
            _ => None,
        }
    }
}

/// Stage payload attached to status and progress events
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StageData {
    pub stage_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_summaries: Option<Vec<SearchSummary>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<AnalysisVerdict>,
}

impl StageData {
    pub fn new(stage_output: impl Into<String>) -> Self {
        Self {
            stage_output: stage_output.into(),
            ..Default::default()
        }
    }

    pub fn with_summaries(mut self, summaries: Vec<SearchSummary>) -> Self {
        self.search_summaries = Some(summaries);
        self
    }

    pub fn with_verdict(mut self, verdict: AnalysisVerdict) -> Self {
        self.verdict = Some(verdict);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChunkData {
    pub chunk: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletePayload {
    pub query: String,
    pub final_report: String,
    pub stage_outputs: BTreeMap<Stage, String>,
    pub full_stage_content: BTreeMap<Stage, String>,
    pub sources_gathered: Vec<Source>,
    pub research_metadata: ResearchMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchMetadata {
    /// Follow-up iterations actually run
    pub research_loops: u32,
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub language: Language,
}

/// Ordered, single-consumer event sink for one session
///
/// Emission suspends while the consumer is behind. A dropped receiver cancels
/// the session.
pub struct EventBus {
    tx: mpsc::Sender<ProgressEvent>,
    cancel: CancellationToken,
    terminated: bool,
}

impl EventBus {
    pub fn new(tx: mpsc::Sender<ProgressEvent>, cancel: CancellationToken) -> Self {
        Self {
            tx,
            cancel,
            terminated: false,
        }
    }

    /// Bus plus receiver with the given buffer size
    pub fn channel(
        buffer: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx, cancel), rx)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub async fn emit(&mut self, event: ProgressEvent) -> Result<()> {
        if self.terminated {
            return Err(AppError::Internal(format!(
                "'{}' event emitted after the stream ended",
                event.event_type()
            )));
        }

        let terminal = event.is_terminal();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(AppError::Cancelled),
            sent = self.tx.send(event) => {
                if sent.is_err() {
                    tracing::debug!("Event consumer went away, cancelling session");
                    self.cancel.cancel();
                    return Err(AppError::Cancelled);
                }
            }
        }

        if terminal {
            self.terminated = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = ProgressEvent::status(Stage::Research, 15, "Searching");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["stage"], "research");
        assert_eq!(json["progress"], 15);
        assert!(json.get("data").is_none());

        let chunk = serde_json::to_value(ProgressEvent::report_chunk("abc")).unwrap();
        assert_eq!(chunk["type"], "report_chunk");
        assert_eq!(chunk["data"]["chunk"], "abc");

        let error = serde_json::to_value(ProgressEvent::error(&AppError::Timeout(30))).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["kind"], "timeout");
    }

    #[test]
    fn test_terminal_events() {
        assert!(ProgressEvent::error(&AppError::Cancelled).is_terminal());
        assert!(!ProgressEvent::report_chunk("x").is_terminal());
        assert!(!ProgressEvent::ReportStart {
            message: String::new()
        }
        .is_terminal());
    }

    #[tokio::test]
    async fn test_bus_rejects_events_after_terminal() {
        let (mut bus, mut rx) = EventBus::channel(4, CancellationToken::new());
        bus.emit(ProgressEvent::error(&AppError::Internal("boom".into())))
            .await
            .unwrap();
        assert!(bus.is_terminated());
        assert!(bus.emit(ProgressEvent::report_chunk("late")).await.is_err());

        assert!(rx.recv().await.unwrap().is_terminal());
        drop(bus);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels() {
        let cancel = CancellationToken::new();
        let (mut bus, rx) = EventBus::channel(1, cancel.clone());
        drop(rx);

        let result = bus.emit(ProgressEvent::report_chunk("x")).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
        assert!(cancel.is_cancelled());
    }
}
