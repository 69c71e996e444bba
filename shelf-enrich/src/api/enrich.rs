//! Enrichment API handlers
//!
//! POST /enrich, POST /enrich/batch, GET /enrich/batch/:session_id

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use shelf_common::events::{ProgressTick, ShelfEvent};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{BatchSession, BatchState};
use crate::services::validate_candidates;
use crate::types::{DetectedCandidate, UnifiedRecord};
use crate::AppState;

/// POST /enrich/batch request
#[derive(Debug, Deserialize)]
pub struct StartBatchRequest {
    pub candidates: Vec<DetectedCandidate>,
}

/// POST /enrich/batch response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBatchResponse {
    pub session_id: Uuid,
    pub state: BatchState,
    pub progress: ProgressTick,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// POST /enrich
///
/// Resolve one candidate and return its unified record.
pub async fn enrich_candidate(
    State(state): State<AppState>,
    Json(candidate): Json<DetectedCandidate>,
) -> ApiResult<Json<UnifiedRecord>> {
    validate_candidates(std::slice::from_ref(&candidate))?;

    let record = state.pipeline.enrich_one(&candidate).await;
    tracing::info!(
        title = %record.title,
        source = ?record.source,
        "Candidate enriched"
    );

    Ok(Json(record))
}

/// POST /enrich/batch
///
/// Validate the batch, then resolve it in the background. Returns 202 with
/// the session id; progress arrives over SSE and via the status endpoint.
pub async fn start_batch(
    State(state): State<AppState>,
    Json(request): Json<StartBatchRequest>,
) -> ApiResult<(StatusCode, Json<StartBatchResponse>)> {
    validate_candidates(&request.candidates)?;

    let session = BatchSession::new(request.candidates.len());
    let session_id = session.session_id;
    let response = StartBatchResponse {
        session_id,
        state: session.state,
        progress: session.progress,
        started_at: session.started_at,
    };

    state.sessions.write().await.insert(session);

    state.event_bus.emit_lossy(ShelfEvent::EnrichmentStarted {
        session_id,
        total: request.candidates.len(),
        timestamp: chrono::Utc::now(),
    });

    tracing::info!(
        session_id = %session_id,
        total = request.candidates.len(),
        "Batch enrichment session started"
    );

    let state_clone = state.clone();
    tokio::spawn(async move {
        if let Err(e) = run_batch(state_clone.clone(), session_id, request.candidates).await {
            tracing::error!(session_id = %session_id, error = %e, "Batch enrichment task failed");
            state_clone
                .set_last_error(format!("Batch {} failed: {}", session_id, e))
                .await;
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Drive one batch to completion, mirroring every tick into the session map
/// and onto the event bus
async fn run_batch(
    state: AppState,
    session_id: Uuid,
    candidates: Vec<DetectedCandidate>,
) -> shelf_common::Result<()> {
    let pipeline = state.pipeline.clone();
    let stream = pipeline.enrich_all(candidates)?;
    futures::pin_mut!(stream);

    while let Some(enriched) = stream.next().await {
        let now = chrono::Utc::now();

        let completed = {
            let mut sessions = state.sessions.write().await;
            let session = sessions.get_mut(&session_id).ok_or_else(|| {
                shelf_common::Error::NotFound(format!("Batch session {}", session_id))
            })?;
            session.record_result(&enriched);
            (session.state == BatchState::Completed)
                .then(|| (session.counts, session.duration_ms()))
        };

        state.event_bus.emit_lossy(ShelfEvent::CandidateResolved {
            session_id,
            index: enriched.index,
            title: enriched.record.title.clone(),
            detected_only: enriched.detected_only,
            timestamp: now,
        });
        state.event_bus.emit_lossy(ShelfEvent::EnrichmentProgress {
            session_id,
            progress: enriched.progress,
            timestamp: now,
        });

        if let Some((counts, duration_ms)) = completed {
            tracing::info!(
                session_id = %session_id,
                enriched = counts.enriched,
                detected_only = counts.detected_only,
                duration_ms,
                "Batch enrichment session completed"
            );
            state.event_bus.emit_lossy(ShelfEvent::EnrichmentCompleted {
                session_id,
                counts,
                duration_ms,
                timestamp: chrono::Utc::now(),
            });
        }
    }

    Ok(())
}

/// GET /enrich/batch/:session_id
pub async fn get_batch_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<BatchSession>> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Batch session not found: {}", session_id)))?;

    tracing::debug!(session_id = %session_id, state = ?session.state, "Status query");

    Ok(Json(session))
}

/// Build enrichment routes
pub fn enrich_routes() -> Router<AppState> {
    Router::new()
        .route("/enrich", post(enrich_candidate))
        .route("/enrich/batch", post(start_batch))
        .route("/enrich/batch/:session_id", get(get_batch_status))
        .route("/enrich/events", get(super::sse::enrichment_event_stream))
}
