//! Catalog store (SQLite)
//!
//! Sole source of truth for which photos have been processed.

pub mod books;
pub mod locations;

use shelf_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "shelf.db";

/// Initialize database connection pool
///
/// Creates the file (and parent directory) when missing, then the schema.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory catalog for tests and dry runs
pub async fn init_memory_pool() -> Result<SqlitePool> {
    // A single connection keeps every query on the same in-memory database
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create the locations and books tables if they don't exist
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            photo_ids TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            location_id TEXT NOT NULL REFERENCES locations(id),
            title TEXT NOT NULL,
            authors TEXT NOT NULL DEFAULT '[]',
            isbn TEXT,
            publisher TEXT,
            publication_date TEXT,
            description TEXT,
            cover_url TEXT,
            source TEXT,
            source_url TEXT,
            sources TEXT NOT NULL DEFAULT '[]',
            image_url TEXT,
            file_hash TEXT,
            date_added TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_location ON books(location_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (locations, books)");

    Ok(())
}

/// Decode a JSON string-array column, treating garbage as empty
pub(crate) fn decode_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Malformed JSON list column, treating as empty");
        Vec::new()
    })
}

pub(crate) fn encode_string_list(values: &[String]) -> Result<String> {
    serde_json::to_string(values)
        .map_err(|e| shelf_common::Error::Internal(format!("Failed to serialize list: {}", e)))
}
