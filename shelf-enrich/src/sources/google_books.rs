//! Google Books volumes API adapter (structured catalog)

use super::fallback::{search_with_fallback, SearchBackend};
use super::{non_blank, BookSource, HttpTransport, RateLimiter, SourceError};
use crate::types::{PartialRecord, SourceKind};
use crate::utils::{retry_with_delay, RetryPolicy};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

const GOOGLE_BOOKS_BASE_URL: &str = "https://www.googleapis.com/books/v1";

/// Volumes search response (only the fields we read)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VolumesResponse {
    items: Vec<Volume>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Volume {
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    description: Option<String>,
    industry_identifiers: Vec<IndustryIdentifier>,
    image_links: ImageLinks,
    info_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ImageLinks {
    extra_large: Option<String>,
    large: Option<String>,
    medium: Option<String>,
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

/// Structured-catalog adapter
pub struct GoogleBooksSource {
    transport: Arc<dyn HttpTransport>,
    api_key: Option<String>,
    base_url: String,
    retry: RetryPolicy,
    rate_limiter: RateLimiter,
}

impl GoogleBooksSource {
    /// Keyless access works within Google's anonymous quota
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        api_key: Option<String>,
        retry: RetryPolicy,
        min_interval_ms: u64,
    ) -> Self {
        Self {
            transport,
            api_key,
            base_url: GOOGLE_BOOKS_BASE_URL.to_string(),
            retry,
            rate_limiter: RateLimiter::new(min_interval_ms),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn volumes_url(&self, title: &str, author: Option<&str>) -> Result<String, SourceError> {
        let mut q = format!("intitle:\"{}\"", title);
        if let Some(author) = author {
            q.push_str(&format!("+inauthor:\"{}\"", author));
        }

        let mut params: Vec<(&str, &str)> = vec![("q", q.as_str()), ("maxResults", "1")];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("key", key));
        }

        reqwest::Url::parse_with_params(&format!("{}/volumes", self.base_url), &params)
            .map(|url| url.to_string())
            .map_err(|e| SourceError::Parse(format!("Invalid volumes URL: {}", e)))
    }
}

#[async_trait]
impl SearchBackend for GoogleBooksSource {
    type Item = Volume;

    async fn search(&self, title: &str, author: Option<&str>) -> Result<Vec<Volume>, SourceError> {
        let url = self.volumes_url(title, author)?;

        let body = retry_with_delay(
            "google_books_search",
            self.retry,
            SourceError::is_transient,
            |_attempt| {
                let url = url.as_str();
                async move {
                    self.rate_limiter.wait().await;
                    self.transport.get_json(url, None).await
                }
            },
        )
        .await?;

        let response: VolumesResponse = serde_json::from_value(body)
            .map_err(|e| SourceError::Parse(format!("Volumes response: {}", e)))?;

        Ok(response.items)
    }
}

#[async_trait]
impl BookSource for GoogleBooksSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Catalog
    }

    async fn query(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Option<PartialRecord>, SourceError> {
        let items = search_with_fallback(self, title, author).await?;

        let record = items
            .into_iter()
            .next()
            .map(|volume| volume_to_record(volume.volume_info))
            .filter(PartialRecord::has_data);

        if let Some(record) = &record {
            tracing::info!(
                title = ?record.title,
                isbn = ?record.isbn,
                "Retrieved volume from Google Books"
            );
        }

        Ok(record)
    }
}

fn volume_to_record(info: VolumeInfo) -> PartialRecord {
    let isbn = ["ISBN_13", "ISBN_10"].iter().find_map(|wanted| {
        info.industry_identifiers
            .iter()
            .filter(|id| id.kind == *wanted)
            .find_map(|id| non_blank(id.identifier.as_deref()))
    });

    let links = &info.image_links;
    let cover_url = [
        &links.extra_large,
        &links.large,
        &links.medium,
        &links.thumbnail,
        &links.small_thumbnail,
    ]
    .into_iter()
    .find_map(|link| non_blank(link.as_deref()));

    PartialRecord {
        source: SourceKind::Catalog,
        title: non_blank(info.title.as_deref()),
        authors: info
            .authors
            .iter()
            .filter_map(|a| non_blank(Some(a.as_str())))
            .collect(),
        isbn,
        publisher: non_blank(info.publisher.as_deref()),
        publication_date: non_blank(info.published_date.as_deref()),
        description: non_blank(info.description.as_deref()),
        cover_url,
        info_link: non_blank(info.info_link.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_support::StubTransport;
    use serde_json::json;

    fn source(stub: Arc<StubTransport>) -> GoogleBooksSource {
        GoogleBooksSource::new(stub, Some("k".to_string()), RetryPolicy::once(), 0)
            .with_base_url("http://books.test")
    }

    fn volume() -> serde_json::Value {
        json!({
            "items": [{
                "volumeInfo": {
                    "title": "Akira",
                    "authors": ["Katsuhiro Otomo"],
                    "publisher": "Kodansha",
                    "publishedDate": "2010-03-01",
                    "industryIdentifiers": [
                        {"type": "ISBN_10", "identifier": "1935429086"},
                        {"type": "ISBN_13", "identifier": "9781935429081"}
                    ],
                    "imageLinks": {
                        "thumbnail": "http://img.test/thumb",
                        "smallThumbnail": "http://img.test/small"
                    },
                    "infoLink": "http://books.test/info/akira"
                }
            }]
        })
    }

    #[tokio::test]
    async fn test_maps_volume_fields() {
        let stub = Arc::new(StubTransport::new().respond("volumes", Ok(volume())));
        let record = source(stub.clone())
            .query("Akira", Some("Katsuhiro Otomo"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(record.source, SourceKind::Catalog);
        assert_eq!(record.isbn.as_deref(), Some("9781935429081"));
        assert_eq!(record.cover_url.as_deref(), Some("http://img.test/thumb"));
        assert_eq!(record.info_link.as_deref(), Some("http://books.test/info/akira"));
        assert_eq!(record.authors, vec!["Katsuhiro Otomo"]);

        let urls = stub.urls();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("maxResults=1"));
        assert!(urls[0].contains("key=k"));
        assert!(urls[0].contains("inauthor"));
    }

    #[tokio::test]
    async fn test_widens_to_normalized_title() {
        let stub = Arc::new(
            StubTransport::new()
                .respond("Vol.", Ok(json!({"totalItems": 0})))
                .respond("volumes", Ok(volume())),
        );

        let record = source(stub.clone())
            .query("Akira Vol. 3", Some("Katsuhiro Otomo"))
            .await
            .unwrap();

        assert!(record.is_some());
        assert_eq!(stub.urls().len(), 2);
    }

    #[tokio::test]
    async fn test_no_items_is_no_match() {
        let stub = Arc::new(StubTransport::new().respond("volumes", Ok(json!({"totalItems": 0}))));
        let record = source(stub.clone()).query("Nothing", None).await.unwrap();

        assert!(record.is_none());
        assert_eq!(stub.urls().len(), 1);
        assert!(!stub.urls()[0].contains("inauthor"));
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_as_error() {
        let stub = Arc::new(
            StubTransport::new().respond("volumes", Err(SourceError::Api(403, "quota".to_string()))),
        );
        let result = source(stub).query("Dune", Some("Frank Herbert")).await;
        assert!(matches!(result, Err(SourceError::Api(403, _))));
    }
}
