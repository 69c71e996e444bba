//! Open Library adapter (community open catalog)
//!
//! Search gives abbreviated data. When the hit is a work, two best-effort
//! follow-ups fill the gaps: the work record for the full description and the
//! editions list for ISBN, publisher and date of the most recent edition.

use super::fallback::{search_with_fallback, SearchBackend};
use super::{non_blank, BookSource, HttpTransport, RateLimiter, SourceError};
use crate::types::{PartialRecord, SourceKind};
use crate::utils::{retry_with_delay, RetryPolicy};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const OPEN_LIBRARY_BASE_URL: &str = "https://openlibrary.org";
const COVERS_BASE_URL: &str = "https://covers.openlibrary.org/b/id";
const EDITIONS_LIMIT: &str = "50";

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").expect("valid year pattern"));

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    docs: Vec<SearchDoc>,
}

/// One search hit
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchDoc {
    key: Option<String>,
    title: Option<String>,
    author_name: Vec<String>,
    publisher: Vec<String>,
    first_publish_year: Option<i64>,
    isbn: Vec<String>,
    cover_i: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EditionsResponse {
    entries: Vec<Edition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Edition {
    publishers: Vec<String>,
    publish_date: Option<String>,
    isbn_13: Vec<String>,
    isbn_10: Vec<String>,
}

impl Edition {
    fn year(&self) -> Option<i32> {
        let date = self.publish_date.as_deref()?;
        YEAR.captures_iter(date)
            .filter_map(|c| c.get(1)?.as_str().parse().ok())
            .last()
    }
}

/// Open-catalog adapter
pub struct OpenLibrarySource {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    retry: RetryPolicy,
    rate_limiter: RateLimiter,
}

impl OpenLibrarySource {
    pub fn new(transport: Arc<dyn HttpTransport>, retry: RetryPolicy, min_interval_ms: u64) -> Self {
        Self {
            transport,
            base_url: OPEN_LIBRARY_BASE_URL.to_string(),
            retry,
            rate_limiter: RateLimiter::new(min_interval_ms),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get(&self, operation: &str, url: &str) -> Result<Value, SourceError> {
        retry_with_delay(operation, self.retry, SourceError::is_transient, |_attempt| async move {
            self.rate_limiter.wait().await;
            self.transport.get_json(url, None).await
        })
        .await
    }

    /// Full description from the work record (string or `{value}` form)
    async fn fetch_description(&self, key: &str) -> Result<Option<String>, SourceError> {
        let url = format!("{}{}.json", self.base_url, key);
        let work = self.get("open_library_work", &url).await?;

        let description = match work.get("description") {
            Some(Value::String(text)) => non_blank(Some(text.as_str())),
            Some(Value::Object(obj)) => non_blank(obj.get("value").and_then(Value::as_str)),
            _ => None,
        };
        Ok(description)
    }

    /// Edition with the latest publication year
    async fn fetch_latest_edition(&self, work_key: &str) -> Result<Option<Edition>, SourceError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}{}/editions.json", self.base_url, work_key),
            &[("limit", EDITIONS_LIMIT)],
        )
        .map_err(|e| SourceError::Parse(format!("Invalid editions URL: {}", e)))?;

        let body = self.get("open_library_editions", url.as_str()).await?;
        let editions: EditionsResponse = serde_json::from_value(body)
            .map_err(|e| SourceError::Parse(format!("Editions response: {}", e)))?;

        Ok(editions
            .entries
            .into_iter()
            .filter(|e| e.year().is_some())
            .max_by_key(|e| e.year()))
    }

    fn doc_to_record(&self, doc: &SearchDoc) -> PartialRecord {
        PartialRecord {
            source: SourceKind::OpenCatalog,
            title: non_blank(doc.title.as_deref()),
            authors: doc
                .author_name
                .iter()
                .filter_map(|a| non_blank(Some(a.as_str())))
                .collect(),
            isbn: doc.isbn.first().and_then(|i| non_blank(Some(i.as_str()))),
            publisher: doc.publisher.first().and_then(|p| non_blank(Some(p.as_str()))),
            publication_date: doc.first_publish_year.map(|y| y.to_string()),
            description: None,
            cover_url: doc
                .cover_i
                .filter(|id| *id > 0)
                .map(|id| format!("{}/{}-L.jpg", COVERS_BASE_URL, id)),
            info_link: doc
                .key
                .as_deref()
                .and_then(|k| non_blank(Some(k)))
                .map(|k| format!("{}{}", OPEN_LIBRARY_BASE_URL, k)),
        }
    }
}

#[async_trait]
impl SearchBackend for OpenLibrarySource {
    type Item = SearchDoc;

    async fn search(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Vec<SearchDoc>, SourceError> {
        let mut params: Vec<(&str, &str)> = vec![("title", title)];
        if let Some(author) = author {
            params.push(("author", author));
        }
        params.push(("limit", "1"));

        let url = reqwest::Url::parse_with_params(&format!("{}/search.json", self.base_url), &params)
            .map_err(|e| SourceError::Parse(format!("Invalid search URL: {}", e)))?;

        let body = self.get("open_library_search", url.as_str()).await?;
        let response: SearchResponse = serde_json::from_value(body)
            .map_err(|e| SourceError::Parse(format!("Search response: {}", e)))?;

        Ok(response.docs)
    }
}

#[async_trait]
impl BookSource for OpenLibrarySource {
    fn kind(&self) -> SourceKind {
        SourceKind::OpenCatalog
    }

    async fn query(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Option<PartialRecord>, SourceError> {
        let docs = search_with_fallback(self, title, author).await?;
        let Some(doc) = docs.into_iter().next() else {
            return Ok(None);
        };

        let mut record = self.doc_to_record(&doc);

        if let Some(key) = doc.key.as_deref().filter(|k| k.starts_with('/')) {
            match self.fetch_description(key).await {
                Ok(description) => record.description = description,
                Err(e) => warn!(key = %key, error = %e, "Work description lookup failed"),
            }

            if key.starts_with("/works/") {
                match self.fetch_latest_edition(key).await {
                    Ok(Some(edition)) => fill_from_edition(&mut record, edition),
                    Ok(None) => debug!(key = %key, "No dated editions"),
                    Err(e) => warn!(key = %key, error = %e, "Editions lookup failed"),
                }
            }
        }

        if !record.has_data() {
            return Ok(None);
        }

        tracing::info!(
            title = ?record.title,
            isbn = ?record.isbn,
            "Retrieved work from Open Library"
        );

        Ok(Some(record))
    }
}

/// Fill fields the search hit lacked from an edition
fn fill_from_edition(record: &mut PartialRecord, edition: Edition) {
    if record.isbn.is_none() {
        record.isbn = edition
            .isbn_13
            .iter()
            .chain(edition.isbn_10.iter())
            .find_map(|i| non_blank(Some(i.as_str())));
    }
    if record.publisher.is_none() {
        record.publisher = edition
            .publishers
            .iter()
            .find_map(|p| non_blank(Some(p.as_str())));
    }
    if record.publication_date.is_none() {
        record.publication_date = non_blank(edition.publish_date.as_deref());
    }
}
