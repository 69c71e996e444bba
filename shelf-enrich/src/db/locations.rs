//! Location persistence
//!
//! A location is a named shelf area plus the ids of every photo taken of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::{decode_string_list, encode_string_list};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Stored location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    /// Every photo known for this location, in upload order
    pub photo_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

fn row_to_location(row: &sqlx::sqlite::SqliteRow) -> Result<Location> {
    let id: String = row.get("id");
    let created_at: String = row.get("created_at");
    let photo_ids: String = row.get("photo_ids");

    Ok(Location {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?,
        name: row.get("name"),
        photo_ids: decode_string_list(&photo_ids),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))?
            .with_timezone(&Utc),
    })
}

/// Find a location by name, creating it when absent
pub async fn get_or_create_location(pool: &SqlitePool, name: &str) -> Result<Location> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Location name is empty".to_string()));
    }

    let new_id = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339();

    retry_on_lock("get_or_create_location", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            "INSERT OR IGNORE INTO locations (id, name, photo_ids, created_at) VALUES (?, ?, '[]', ?)",
        )
        .bind(&new_id)
        .bind(name)
        .bind(&created_at)
        .execute(pool)
        .await?;
        Ok(())
    })
    .await?;

    let row = sqlx::query("SELECT id, name, photo_ids, created_at FROM locations WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;

    let location = row_to_location(&row)?;
    if location.id.to_string() == new_id {
        tracing::info!(location_id = %location.id, name = %name, "Created location");
    }
    Ok(location)
}

/// Merge photo ids into a location, keeping order and skipping duplicates
///
/// The read and the write share one transaction, so concurrent merges into the
/// same location never drop each other's photos.
pub async fn add_photo_ids(pool: &SqlitePool, id: Uuid, photo_ids: &[String]) -> Result<Location> {
    retry_on_lock("add_photo_ids", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let mut tx = pool.begin().await?;
        let location = merge_photo_ids(&mut tx, id, photo_ids).await?;
        tx.commit().await?;
        Ok(location)
    })
    .await
}

/// Merge step of `add_photo_ids` on a caller-owned connection or transaction
pub(crate) async fn merge_photo_ids(
    conn: &mut SqliteConnection,
    id: Uuid,
    photo_ids: &[String],
) -> Result<Location> {
    let id_str = id.to_string();

    // Write first so SQLite takes the write lock before we read
    let touched = sqlx::query("UPDATE locations SET photo_ids = photo_ids WHERE id = ?")
        .bind(&id_str)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if touched == 0 {
        return Err(Error::NotFound(format!("Location {}", id)));
    }

    let row = sqlx::query("SELECT id, name, photo_ids, created_at FROM locations WHERE id = ?")
        .bind(&id_str)
        .fetch_one(&mut *conn)
        .await?;
    let mut location = row_to_location(&row)?;

    let before = location.photo_ids.len();
    for photo_id in photo_ids {
        let photo_id = photo_id.trim();
        if !photo_id.is_empty() && !location.photo_ids.iter().any(|p| p == photo_id) {
            location.photo_ids.push(photo_id.to_string());
        }
    }

    if location.photo_ids.len() == before {
        return Ok(location);
    }

    sqlx::query("UPDATE locations SET photo_ids = ? WHERE id = ?")
        .bind(encode_string_list(&location.photo_ids)?)
        .bind(&id_str)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(
        location_id = %id,
        added = location.photo_ids.len() - before,
        "Added photos to location"
    );

    Ok(location)
}

/// Load a location by id
pub async fn load_location(pool: &SqlitePool, id: Uuid) -> Result<Option<Location>> {
    let row = sqlx::query("SELECT id, name, photo_ids, created_at FROM locations WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_location).transpose()
}

/// All locations, oldest first
pub async fn list_locations(pool: &SqlitePool) -> Result<Vec<Location>> {
    let rows = sqlx::query(
        "SELECT id, name, photo_ids, created_at FROM locations ORDER BY created_at, name",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_location).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let pool = init_memory_pool().await.unwrap();

        let first = get_or_create_location(&pool, "Living Room").await.unwrap();
        let second = get_or_create_location(&pool, " Living Room ").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(list_locations(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let pool = init_memory_pool().await.unwrap();
        assert!(matches!(
            get_or_create_location(&pool, "  ").await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_add_photo_ids_merges_in_order() {
        let pool = init_memory_pool().await.unwrap();
        let location = get_or_create_location(&pool, "Study").await.unwrap();

        add_photo_ids(&pool, location.id, &["a".into(), "b".into()])
            .await
            .unwrap();
        let merged = add_photo_ids(&pool, location.id, &["b".into(), "c".into(), "a".into()])
            .await
            .unwrap();

        assert_eq!(merged.photo_ids, vec!["a", "b", "c"]);
        let reloaded = load_location(&pool, location.id).await.unwrap().unwrap();
        assert_eq!(reloaded.photo_ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_concurrent_merges_keep_every_photo() {
        let pool = init_memory_pool().await.unwrap();
        let location = get_or_create_location(&pool, "Attic").await.unwrap();

        let photos_a: [String; 1] = ["a".into()];
        let photos_b: [String; 1] = ["b".into()];
        let (a, b) = tokio::join!(
            add_photo_ids(&pool, location.id, &photos_a),
            add_photo_ids(&pool, location.id, &photos_b),
        );
        a.unwrap();
        b.unwrap();

        let mut photos = load_location(&pool, location.id)
            .await
            .unwrap()
            .unwrap()
            .photo_ids;
        photos.sort();
        assert_eq!(photos, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_concurrent_merges_on_file_database() {
        let temp = tempfile::TempDir::new().unwrap();
        let pool = crate::db::init_database_pool(&temp.path().join("shelf.db"))
            .await
            .unwrap();
        let location = get_or_create_location(&pool, "Garage").await.unwrap();

        let merges = (0..8).map(|i| {
            let pool = pool.clone();
            let id = location.id;
            tokio::spawn(async move { add_photo_ids(&pool, id, &[format!("IMG_{}", i)]).await })
        });
        for result in futures::future::join_all(merges).await {
            result.unwrap().unwrap();
        }

        let photos = load_location(&pool, location.id)
            .await
            .unwrap()
            .unwrap()
            .photo_ids;
        assert_eq!(photos.len(), 8);
    }

    #[tokio::test]
    async fn test_add_photo_ids_unknown_location() {
        let pool = init_memory_pool().await.unwrap();
        assert!(matches!(
            add_photo_ids(&pool, Uuid::new_v4(), &["a".into()]).await,
            Err(Error::NotFound(_))
        ));
    }
}
