use crate::{
    research::events::ProgressEvent,
    types::{ResearchRequest, ResearchResponse, Result},
    AppState,
};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Instant;

/// Serialize a progress event into an SSE frame
fn to_sse(event: &ProgressEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            tracing::error!("Failed to serialize {} event: {}", event.event_type(), e);
            Event::default().data(
                serde_json::json!({
                    "type": "error",
                    "message": "Research failed",
                    "error": format!("failed to encode event: {}", e),
                    "kind": "internal",
                })
                .to_string(),
            )
        }
    }
}

/// Run a research session, streaming progress events
#[utoipa::path(
    post,
    path = "/api/research/stream",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Server-sent progress events", body = ProgressEvent, content_type = "text/event-stream")
    ),
    tag = "research"
)]
pub async fn research_stream(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    tracing::info!(topic = ?payload.topic(), "Streaming research request");

    let events = state
        .coordinator()
        .stream(payload)
        .map(|event| Ok(to_sse(&event)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Run a research session and return the final report
#[utoipa::path(
    post,
    path = "/api/research",
    request_body = ResearchRequest,
    responses(
        (status = 200, description = "Research completed", body = ResearchResponse),
        (status = 400, description = "Invalid input"),
        (status = 500, description = "Research failed"),
        (status = 504, description = "Research timed out")
    ),
    tag = "research"
)]
pub async fn research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>> {
    let start = Instant::now();

    let response = state.coordinator().research(payload).await?;

    tracing::info!(
        duration_ms = start.elapsed().as_millis() as u64,
        research_loops = response.research_metadata.research_loops,
        "Research request complete"
    );
    Ok(Json(response))
}
