//! Book sync: persist enriched records for a location
//!
//! POST /books/sync
//!
//! Each book's first source photo is read from
//! `<library_folder>/<location>/<photo>`, stored in the image store, and the
//! book row is written with the stored image's URL and hash. One book failing
//! never stops the rest.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use shelf_common::events::ShelfEvent;
use std::path::{Component, Path};
use uuid::Uuid;

use crate::db::books::{insert_book, BookImage};
use crate::db::locations::get_or_create_location;
use crate::error::ApiResult;
use crate::types::UnifiedRecord;
use crate::AppState;

/// Books to persist for one location
#[derive(Debug, Deserialize)]
pub struct SyncBooksRequest {
    /// Location name (created when unknown)
    pub location: String,
    pub books: Vec<UnifiedRecord>,
}

/// Per-book failure
#[derive(Debug, Serialize)]
pub struct SyncError {
    pub title: String,
    pub error: String,
}

/// POST /books/sync response
#[derive(Debug, Default, Serialize)]
pub struct SyncBooksResponse {
    pub total: usize,
    pub synced: usize,
    pub failed: usize,
    pub errors: Vec<SyncError>,
}

/// POST /books/sync
pub async fn sync_books(
    State(state): State<AppState>,
    Json(request): Json<SyncBooksRequest>,
) -> ApiResult<Json<SyncBooksResponse>> {
    let mut response = SyncBooksResponse {
        total: request.books.len(),
        ..Default::default()
    };

    // Resolved on the first book, reused for the rest
    let mut resolved_location: Option<Uuid> = None;
    let location_name = request.location.trim().to_string();

    for record in &request.books {
        let location_id = match resolved_location {
            Some(id) => id,
            None => {
                let location = get_or_create_location(&state.db, &location_name).await?;
                resolved_location = Some(location.id);
                location.id
            }
        };

        match sync_one(&state, location_id, &location_name, record).await {
            Ok(()) => response.synced += 1,
            Err(e) => {
                tracing::warn!(title = %record.title, error = %e, "Book sync failed");
                response.failed += 1;
                response.errors.push(SyncError {
                    title: record.title.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        location = %location_name,
        total = response.total,
        synced = response.synced,
        failed = response.failed,
        "Book sync finished"
    );

    if let Some(location_id) = resolved_location {
        state.event_bus.emit_lossy(ShelfEvent::BooksSynced {
            location_id,
            synced: response.synced,
            failed: response.failed,
            timestamp: chrono::Utc::now(),
        });
    }

    Ok(Json(response))
}

async fn sync_one(
    state: &AppState,
    location_id: Uuid,
    location_name: &str,
    record: &UnifiedRecord,
) -> shelf_common::Result<()> {
    let photo = record.sources.first().ok_or_else(|| {
        shelf_common::Error::InvalidInput("Book has no source photo".to_string())
    })?;

    if !is_plain_file_name(photo) || !is_plain_file_name(location_name) {
        return Err(shelf_common::Error::InvalidInput(format!(
            "Unsafe photo path: {}/{}",
            location_name, photo
        )));
    }

    let photo_path = state.library_folder.join(location_name).join(photo);
    if !tokio::fs::try_exists(&photo_path).await? {
        return Err(shelf_common::Error::NotFound(format!(
            "Photo {}",
            photo_path.display()
        )));
    }

    let stored = state.image_store.upload_file(&photo_path).await?;

    // Also merges the book's photos into the location, atomically
    insert_book(
        &state.db,
        location_id,
        record,
        BookImage {
            image_url: Some(&stored.url),
            file_hash: Some(&stored.hash),
        },
    )
    .await?;

    Ok(())
}

/// Single normal path component (no separators, no `..`)
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Build book routes
pub fn book_routes() -> Router<AppState> {
    Router::new().route("/books/sync", post(sync_books))
}
