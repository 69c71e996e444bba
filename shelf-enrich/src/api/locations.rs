//! Location API handlers
//!
//! POST /locations, GET /locations, GET /locations/:id/scan-state,
//! GET /locations/:id/books

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::books::{books_for_location, sources_for_location, Book};
use crate::db::locations::{
    add_photo_ids, get_or_create_location, list_locations, load_location, Location,
};
use crate::error::{ApiError, ApiResult};
use crate::services::compute_delta;
use crate::types::ScanState;
use crate::AppState;

/// POST /locations request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterLocationRequest {
    pub name: String,
    /// Photos to merge into the location's known set
    #[serde(default)]
    pub photo_ids: Vec<String>,
}

/// GET /locations/:id/scan-state response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStateResponse {
    pub location_id: Uuid,
    #[serde(flatten)]
    pub scan: ScanState,
}

/// POST /locations
///
/// Get-or-create by name, then merge photo ids.
pub async fn register_location(
    State(state): State<AppState>,
    Json(request): Json<RegisterLocationRequest>,
) -> ApiResult<Json<Location>> {
    let location = get_or_create_location(&state.db, &request.name).await?;
    let location = add_photo_ids(&state.db, location.id, &request.photo_ids).await?;
    Ok(Json(location))
}

/// GET /locations
pub async fn get_locations(State(state): State<AppState>) -> ApiResult<Json<Vec<Location>>> {
    Ok(Json(list_locations(&state.db).await?))
}

async fn require_location(state: &AppState, id: Uuid) -> ApiResult<Location> {
    load_location(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Location not found: {}", id)))
}

/// GET /locations/:id/scan-state
///
/// Photos not yet referenced by any catalogued book. Callers pass
/// `unprocessedFiles` to the extraction service as its target files.
pub async fn get_scan_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ScanStateResponse>> {
    let location = require_location(&state, id).await?;
    let catalogued = sources_for_location(&state.db, id).await?;

    let scan = compute_delta(&location.photo_ids, &catalogued);
    tracing::debug!(
        location_id = %id,
        status = ?scan.status,
        unprocessed = scan.unprocessed_count,
        "Scan state computed"
    );

    Ok(Json(ScanStateResponse {
        location_id: id,
        scan,
    }))
}

/// GET /locations/:id/books
pub async fn get_location_books(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Book>>> {
    require_location(&state, id).await?;
    Ok(Json(books_for_location(&state.db, id).await?))
}

/// Build location routes
pub fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/locations", get(get_locations).post(register_location))
        .route("/locations/:id/scan-state", get(get_scan_state))
        .route("/locations/:id/books", get(get_location_books))
}
