//! HTTP API Handlers and Routes
//!
//! This module provides the REST API layer for Lumen, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Research (`/api/research`)
//! - `POST /api/research/stream` - Run a research session, streaming progress as SSE
//! - `POST /api/research` - Run a research session and return the final result
//!
//! ## Health (`/api/health`)
//! - `GET /api/health` - Health check endpoint
//!
//! # Streaming
//!
//! Each SSE frame carries one JSON-encoded progress event in its `data` field,
//! tagged by `type` (`status`, `progress`, `report_start`, `report_chunk`,
//! `complete`, `error`). The stream closes after `complete` or `error`.
//!
//! # OpenAPI Documentation
//!
//! When the `swagger-ui` feature is enabled, interactive API documentation
//! is available at `/swagger-ui/`.

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

use utoipa::OpenApi;

/// OpenAPI description of the HTTP surface
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::research::research_stream,
        handlers::research::research,
        handlers::health::health,
    ),
    components(schemas(
        crate::types::ResearchRequest,
        crate::types::ResearchResponse,
        crate::types::ChatMessage,
        crate::types::MessageRole,
        crate::types::EffortLevel,
        crate::types::Source,
        crate::types::ErrorKind,
        crate::research::events::ProgressEvent,
        crate::research::events::ResearchMetadata,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "research", description = "Deep research sessions"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
