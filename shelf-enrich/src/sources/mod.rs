//! Bibliographic source adapters
//!
//! Each adapter answers `query(title, author)` with at most one
//! `PartialRecord`. `Ok(None)` is a legitimate no-match; `Err` means the
//! source could not be consulted and the orchestrator degrades it to no-match.

pub mod fallback;
pub mod generative_search;
pub mod google_books;
pub mod open_library;
pub mod transport;

pub use fallback::{plan_variants, search_with_fallback, QueryVariant, SearchBackend};
pub use generative_search::GenerativeSearchSource;
pub use google_books::GoogleBooksSource;
pub use open_library::OpenLibrarySource;
pub use transport::{HttpTransport, ReqwestTransport};

use crate::types::{PartialRecord, SourceKind};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

/// Source adapter errors
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Source not configured: {0}")]
    NotConfigured(String),
}

impl SourceError {
    /// Network failures, server errors and throttling are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Network(_) => true,
            SourceError::Api(status, _) => *status >= 500 || *status == 429,
            SourceError::Parse(_) | SourceError::NotConfigured(_) => false,
        }
    }
}

/// Uniform adapter contract
#[async_trait]
pub trait BookSource: Send + Sync {
    /// Which source class this adapter represents
    fn kind(&self) -> SourceKind;

    /// Look up one book
    ///
    /// `author` may be absent or the "Unknown" sentinel; adapters treat both
    /// as no author constraint.
    async fn query(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Option<PartialRecord>, SourceError>;
}

/// Minimum-interval rate limiter shared by all requests of one adapter
pub(crate) struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub(crate) fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with the rate limit
    pub(crate) async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Trimmed, non-empty string
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SourceError::Network("reset".to_string()).is_transient());
        assert!(SourceError::Api(503, String::new()).is_transient());
        assert!(SourceError::Api(429, String::new()).is_transient());
        assert!(!SourceError::Api(403, String::new()).is_transient());
        assert!(!SourceError::Parse("bad".to_string()).is_transient());
        assert!(!SourceError::NotConfigured("key".to_string()).is_transient());
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(1000);
        assert_eq!(limiter.min_interval, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_rate_limiter_timing() {
        let limiter = RateLimiter::new(200);
        let start = Instant::now();

        limiter.wait().await;
        let first_elapsed = start.elapsed();

        limiter.wait().await;
        let second_elapsed = start.elapsed();

        assert!(first_elapsed < Duration::from_millis(100));
        assert!(second_elapsed >= Duration::from_millis(180));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Ace ")), Some("Ace".to_string()));
        assert_eq!(non_blank(Some("   ")), None);
        assert_eq!(non_blank(None), None);
    }
}
