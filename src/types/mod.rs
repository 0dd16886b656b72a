use crate::research::events::ResearchMetadata;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============= API Request/Response Types =============

/// A chat-style message; the research topic is taken from the last user message
/// when no explicit `query` is supplied.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Caller-selected preset for how much research to do.
///
/// Explicit counts on the request always win over the preset.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl EffortLevel {
    /// `(initial_search_query_count, max_research_loops)` for the preset
    pub fn counts(self) -> (i64, i64) {
        match self {
            EffortLevel::Low => (1, 1),
            EffortLevel::Medium => (3, 3),
            EffortLevel::High => (5, 10),
        }
    }
}

impl std::str::FromStr for EffortLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(EffortLevel::Low),
            "medium" => Ok(EffortLevel::Medium),
            "high" => Ok(EffortLevel::High),
            other => Err(AppError::Validation(format!(
                "Unknown effort level '{}' (expected low, medium or high)",
                other
            ))),
        }
    }
}

/// Research request consumed by the coordinator.
///
/// Counts are signed so that negative values surface as validation errors
/// rather than deserialization failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ResearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_search_query_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_research_loops: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<EffortLevel>,
}

impl ResearchRequest {
    /// Build a request for a plain query string
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }

    pub fn with_counts(mut self, initial_search_query_count: i64, max_research_loops: i64) -> Self {
        self.initial_search_query_count = Some(initial_search_query_count);
        self.max_research_loops = Some(max_research_loops);
        self
    }

    pub fn with_effort(mut self, effort: EffortLevel) -> Self {
        self.effort = Some(effort);
        self
    }

    /// The research topic: the explicit query, or else the last user message
    pub fn topic(&self) -> Option<&str> {
        self.query
            .as_deref()
            .or_else(|| {
                self.messages
                    .iter()
                    .rev()
                    .find(|m| m.role == MessageRole::User)
                    .map(|m| m.content.as_str())
            })
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// A cited source gathered during research
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Source {
    pub label: String,
    pub value: String,
    pub short_url: String,
}

/// Final result for non-streaming callers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResearchResponse {
    pub query: String,
    pub final_report: String,
    pub sources_gathered: Vec<Source>,
    pub research_metadata: ResearchMetadata,
}

// ============= Error Types =============

/// Wire-level classification of a failure, carried on `error` events
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Model,
    Search,
    Configuration,
    Timeout,
    Cancelled,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Research timed out after {0} seconds")]
    Timeout(u64),

    #[error("Research was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::LLM(_) => ErrorKind::Model,
            AppError::Search(_) => ErrorKind::Search,
            AppError::Configuration(_) => ErrorKind::Configuration,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::Cancelled => ErrorKind::Cancelled,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Validation(_) => axum::http::StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => axum::http::StatusCode::GATEWAY_TIMEOUT,
            AppError::Cancelled => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            AppError::LLM(_)
            | AppError::Search(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
