//! Catalogued book persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelf_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::locations::merge_photo_ids;
use super::{decode_string_list, encode_string_list};
use crate::types::{SourceKind, UnifiedRecord};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Stored book: the unified record plus catalog bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub location_id: Uuid,
    #[serde(flatten)]
    pub record: UnifiedRecord,
    /// Stored copy of the source photo
    pub image_url: Option<String>,
    /// SHA-256 of the source photo
    pub file_hash: Option<String>,
    pub date_added: DateTime<Utc>,
}

/// Source photo attached to a new book
#[derive(Debug, Clone, Copy, Default)]
pub struct BookImage<'a> {
    pub image_url: Option<&'a str>,
    pub file_hash: Option<&'a str>,
}

const BOOK_COLUMNS: &str = "id, location_id, title, authors, isbn, publisher, publication_date, \
     description, cover_url, source, source_url, sources, image_url, file_hash, date_added";

fn row_to_book(row: &sqlx::sqlite::SqliteRow) -> Result<Book> {
    let parse_uuid = |column: &str| -> Result<Uuid> {
        let raw: String = row.get(column);
        Uuid::parse_str(&raw).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
    };

    let source: Option<String> = row.get("source");
    let source = match source {
        Some(raw) => Some(raw.parse::<SourceKind>().map_err(Error::Internal)?),
        None => None,
    };

    let authors: String = row.get("authors");
    let sources: String = row.get("sources");
    let date_added: String = row.get("date_added");

    Ok(Book {
        id: parse_uuid("id")?,
        location_id: parse_uuid("location_id")?,
        record: UnifiedRecord {
            title: row.get("title"),
            authors: decode_string_list(&authors),
            isbn: row.get("isbn"),
            publisher: row.get("publisher"),
            publication_date: row.get("publication_date"),
            description: row.get("description"),
            cover_url: row.get("cover_url"),
            source,
            source_url: row.get("source_url"),
            sources: decode_string_list(&sources),
        },
        image_url: row.get("image_url"),
        file_hash: row.get("file_hash"),
        date_added: DateTime::parse_from_rfc3339(&date_added)
            .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))?
            .with_timezone(&Utc),
    })
}

/// Insert a book for a location
///
/// The book's photo ids are merged into the location in the same transaction,
/// so a failure leaves neither the row nor the merge behind.
pub async fn insert_book(
    pool: &SqlitePool,
    location_id: Uuid,
    record: &UnifiedRecord,
    image: BookImage<'_>,
) -> Result<Book> {
    if record.title.trim().is_empty() {
        return Err(Error::InvalidInput("Book title is empty".to_string()));
    }

    // Prepare all data before touching the database
    let book = Book {
        id: Uuid::new_v4(),
        location_id,
        record: record.clone(),
        image_url: image.image_url.map(str::to_string),
        file_hash: image.file_hash.map(str::to_string),
        date_added: Utc::now(),
    };
    let id = book.id.to_string();
    let location = location_id.to_string();
    let authors = encode_string_list(&record.authors)?;
    let sources = encode_string_list(&record.sources)?;
    let source = record.source.map(|s| s.as_str());
    let date_added = book.date_added.to_rfc3339();

    retry_on_lock("insert_book", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let mut tx = pool.begin().await?;

        merge_photo_ids(&mut tx, location_id, &record.sources).await?;

        sqlx::query(&format!(
            "INSERT INTO books ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            BOOK_COLUMNS
        ))
        .bind(&id)
        .bind(&location)
        .bind(&record.title)
        .bind(&authors)
        .bind(&record.isbn)
        .bind(&record.publisher)
        .bind(&record.publication_date)
        .bind(&record.description)
        .bind(&record.cover_url)
        .bind(source)
        .bind(&record.source_url)
        .bind(&sources)
        .bind(&book.image_url)
        .bind(&book.file_hash)
        .bind(&date_added)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    })
    .await?;

    tracing::debug!(book_id = %book.id, location_id = %location_id, title = %record.title, "Inserted book");

    Ok(book)
}

/// Books stored for a location, oldest first
pub async fn books_for_location(pool: &SqlitePool, location_id: Uuid) -> Result<Vec<Book>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM books WHERE location_id = ? ORDER BY date_added, rowid",
        BOOK_COLUMNS
    ))
    .bind(location_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_book).collect()
}

/// Photo-id lists of every book stored for a location
pub async fn sources_for_location(pool: &SqlitePool, location_id: Uuid) -> Result<Vec<Vec<String>>> {
    let rows: Vec<String> = sqlx::query_scalar("SELECT sources FROM books WHERE location_id = ?")
        .bind(location_id.to_string())
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|raw| decode_string_list(raw)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use crate::db::locations::{get_or_create_location, load_location};

    fn record(title: &str, sources: &[&str]) -> UnifiedRecord {
        UnifiedRecord {
            title: title.to_string(),
            authors: vec!["Ursula K. Le Guin".to_string()],
            isbn: Some("9780441478125".to_string()),
            publisher: None,
            publication_date: Some("1969".to_string()),
            description: None,
            cover_url: None,
            source: Some(SourceKind::Catalog),
            source_url: Some("https://books.example/lhod".to_string()),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_reload_book() {
        let pool = init_memory_pool().await.unwrap();
        let location = get_or_create_location(&pool, "Hall").await.unwrap();

        let inserted = insert_book(
            &pool,
            location.id,
            &record("The Left Hand of Darkness", &["IMG_1.jpg"]),
            BookImage {
                image_url: Some("/images/abc"),
                file_hash: Some("abc"),
            },
        )
        .await
        .unwrap();

        let books = books_for_location(&pool, location.id).await.unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0], inserted);
        assert_eq!(books[0].record.source, Some(SourceKind::Catalog));
        assert_eq!(books[0].file_hash.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_sources_for_location_is_scoped() {
        let pool = init_memory_pool().await.unwrap();
        let hall = get_or_create_location(&pool, "Hall").await.unwrap();
        let den = get_or_create_location(&pool, "Den").await.unwrap();

        insert_book(&pool, hall.id, &record("A", &["h1", "h2"]), BookImage::default())
            .await
            .unwrap();
        insert_book(&pool, den.id, &record("B", &["d1"]), BookImage::default())
            .await
            .unwrap();

        let sources = sources_for_location(&pool, hall.id).await.unwrap();
        assert_eq!(sources, vec![vec!["h1".to_string(), "h2".to_string()]]);
    }

    #[tokio::test]
    async fn test_insert_merges_photos_into_location() {
        let pool = init_memory_pool().await.unwrap();
        let hall = get_or_create_location(&pool, "Hall").await.unwrap();

        insert_book(&pool, hall.id, &record("A", &["h1", "h2"]), BookImage::default())
            .await
            .unwrap();

        let reloaded = load_location(&pool, hall.id).await.unwrap().unwrap();
        assert_eq!(reloaded.photo_ids, vec!["h1", "h2"]);
    }

    #[tokio::test]
    async fn test_failed_merge_leaves_no_book_row() {
        let pool = init_memory_pool().await.unwrap();
        let hall = get_or_create_location(&pool, "Hall").await.unwrap();
        sqlx::query("DELETE FROM locations WHERE id = ?")
            .bind(hall.id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let result = insert_book(&pool, hall.id, &record("A", &["h1"]), BookImage::default()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_blank_title_rejected() {
        let pool = init_memory_pool().await.unwrap();
        let hall = get_or_create_location(&pool, "Hall").await.unwrap();
        assert!(matches!(
            insert_book(&pool, hall.id, &record(" ", &[]), BookImage::default()).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_book_json_flattens_record() {
        let book = Book {
            id: Uuid::nil(),
            location_id: Uuid::nil(),
            record: record("A", &["p"]),
            image_url: None,
            file_hash: None,
            date_added: Utc::now(),
        };
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json["title"], "A");
        assert_eq!(json["sourceUrl"], "https://books.example/lhod");
        assert!(json.get("record").is_none());
    }
}
