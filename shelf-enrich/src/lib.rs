//! shelf-enrich library interface
//!
//! Book metadata resolution: title normalization, source adapters, fallback
//! querying, field reconciliation, batch orchestration and scan deltas, plus
//! the catalog/image stores and HTTP surface built on them.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sources;
pub mod types;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use services::{EnrichmentPipeline, ImageStore};
use shelf_common::events::EventBus;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::SessionRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Catalog database pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Resolution pipeline over the configured sources
    pub pipeline: Arc<EnrichmentPipeline>,
    /// Content-addressed image store
    pub image_store: ImageStore,
    /// Folder holding `<location>/<photo>` source photos
    pub library_folder: PathBuf,
    /// Batch sessions by id (in-memory only, bounded)
    pub sessions: Arc<RwLock<SessionRegistry>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        pipeline: Arc<EnrichmentPipeline>,
        image_store: ImageStore,
        library_folder: PathBuf,
    ) -> Self {
        Self {
            db,
            event_bus,
            pipeline,
            image_store,
            library_folder,
            sessions: Arc::new(RwLock::new(SessionRegistry::default())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an error for /health
    pub async fn set_last_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::enrich_routes())
        .merge(api::location_routes())
        .merge(api::book_routes())
        .merge(api::image_routes())
        .with_state(state)
}
