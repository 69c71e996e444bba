//! Query widening for search-style sources
//!
//! Catalog searches are tried with progressively looser constraints until one
//! returns hits:
//!
//! 1. exact title + author
//! 2. normalized title + author (when normalization changed the title)
//! 3. exact title alone
//! 4. normalized title alone (when normalization changed the title and an
//!    author was supplied)
//!
//! Variants needing an author are skipped when the author is absent or the
//! "Unknown" sentinel. Duplicates and empty titles are never sent.

use super::SourceError;
use crate::services::title_normalizer::normalize;
use crate::types::known_author;
use async_trait::async_trait;
use tracing::{debug, warn};

/// One (title, author) combination to search with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVariant {
    pub title: String,
    pub author: Option<String>,
}

/// A source that answers zero-or-more hits for a query
#[async_trait]
pub trait SearchBackend: Send + Sync {
    type Item: Send;

    async fn search(
        &self,
        title: &str,
        author: Option<&str>,
    ) -> Result<Vec<Self::Item>, SourceError>;
}

/// Ordered, deduplicated variants for a raw (title, author)
pub fn plan_variants(title: &str, author: Option<&str>) -> Vec<QueryVariant> {
    let exact = title.trim();
    let normalized = normalize(exact);
    let changed = normalized != exact;
    let author = known_author(author);

    let mut candidates: Vec<(&str, Option<&str>)> = Vec::with_capacity(4);
    if let Some(a) = author {
        candidates.push((exact, Some(a)));
        if changed {
            candidates.push((normalized.as_str(), Some(a)));
        }
    }
    candidates.push((exact, None));
    if changed && author.is_some() {
        candidates.push((normalized.as_str(), None));
    }

    let mut variants: Vec<QueryVariant> = Vec::with_capacity(candidates.len());
    for (title, author) in candidates {
        if title.is_empty() {
            continue;
        }
        let variant = QueryVariant {
            title: title.to_string(),
            author: author.map(str::to_string),
        };
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    variants
}

/// Run variants in order, stopping at the first non-empty result
///
/// A variant that errors is logged and skipped. The last error is returned
/// only when every attempted variant failed; otherwise an exhausted plan
/// yields an empty list.
pub async fn search_with_fallback<B>(
    backend: &B,
    title: &str,
    author: Option<&str>,
) -> Result<Vec<B::Item>, SourceError>
where
    B: SearchBackend + ?Sized,
{
    let variants = plan_variants(title, author);
    let mut last_error = None;
    let mut any_answered = false;

    for (index, variant) in variants.iter().enumerate() {
        match backend.search(&variant.title, variant.author.as_deref()).await {
            Ok(items) if !items.is_empty() => {
                debug!(
                    variant = index + 1,
                    title = %variant.title,
                    author = ?variant.author,
                    hits = items.len(),
                    "Search variant matched"
                );
                return Ok(items);
            }
            Ok(_) => {
                any_answered = true;
            }
            Err(e) => {
                warn!(
                    variant = index + 1,
                    title = %variant.title,
                    error = %e,
                    "Search variant failed"
                );
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !any_answered => Err(e),
        _ => Ok(Vec::new()),
    }
}
