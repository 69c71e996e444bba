//! Core types for the metadata resolution pipeline
//!
//! - `DetectedCandidate`: a book guessed from shelf photos (input)
//! - `PartialRecord`: what one bibliographic source returned
//! - `UnifiedRecord`: the reconciled output for one candidate
//! - `ScanState`: which photos of a location are still unprocessed

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder author emitted by the vision service when nothing was legible
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Returns the author only when it carries information
///
/// Blank strings and the "Unknown" sentinel are treated as no author.
pub fn known_author(author: Option<&str>) -> Option<&str> {
    author
        .map(str::trim)
        .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case(UNKNOWN_AUTHOR))
}

/// A single detected book, prior to enrichment
///
/// Produced by the external image-understanding service; one per distinct
/// spine inferred from a batch of photos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedCandidate {
    /// Title as read from the spine
    pub title: String,
    /// Author as read from the spine (may be absent or "Unknown")
    #[serde(default)]
    pub author: Option<String>,
    /// Photo identifiers this candidate was derived from
    #[serde(default)]
    pub sources: Vec<String>,
}

impl DetectedCandidate {
    pub fn new(title: impl Into<String>, author: Option<&str>, sources: Vec<String>) -> Self {
        Self {
            title: title.into(),
            author: author.map(str::to_string),
            sources,
        }
    }

    /// Author usable as a query constraint
    pub fn known_author(&self) -> Option<&str> {
        known_author(self.author.as_deref())
    }
}

/// External bibliographic source kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Generative search provider (LLM with web search)
    GenerativeSearch,
    /// Structured book-catalog API
    Catalog,
    /// Community open-catalog API
    OpenCatalog,
}

impl SourceKind {
    /// Catalog-class sources outrank the generative source field by field
    pub fn is_catalog_class(&self) -> bool {
        matches!(self, SourceKind::Catalog | SourceKind::OpenCatalog)
    }

    /// Stable identifier used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GenerativeSearch => "generative_search",
            SourceKind::Catalog => "catalog",
            SourceKind::OpenCatalog => "open_catalog",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generative_search" => Ok(SourceKind::GenerativeSearch),
            "catalog" => Ok(SourceKind::Catalog),
            "open_catalog" => Ok(SourceKind::OpenCatalog),
            other => Err(format!("Unknown source kind: {}", other)),
        }
    }
}

/// Per-source query result
///
/// Every field except `source` may be absent. Transient: never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialRecord {
    pub source: SourceKind,
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub info_link: Option<String>,
}

impl PartialRecord {
    /// Record with no data from the given source
    pub fn empty(source: SourceKind) -> Self {
        Self {
            source,
            title: None,
            authors: Vec::new(),
            isbn: None,
            publisher: None,
            publication_date: None,
            description: None,
            cover_url: None,
            info_link: None,
        }
    }

    /// True when at least one field carries a non-blank value
    pub fn has_data(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.title)
            || self.authors.iter().any(|a| !a.trim().is_empty())
            || present(&self.isbn)
            || present(&self.publisher)
            || present(&self.publication_date)
            || present(&self.description)
            || present(&self.cover_url)
            || present(&self.info_link)
    }
}

/// Reconciled metadata for one candidate
///
/// Each singular field is either `None` or taken whole from exactly one
/// source. `authors` is the deduplicated union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedRecord {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    /// Which source class is authoritative (`None` = detected data only)
    pub source: Option<SourceKind>,
    /// Info link of the authoritative source
    pub source_url: Option<String>,
    /// Photo identifiers carried over from the detection
    #[serde(default)]
    pub sources: Vec<String>,
}

impl UnifiedRecord {
    /// True when no external source contributed anything
    pub fn is_detected_only(&self) -> bool {
        self.source.is_none()
    }
}

/// Whether a location still has photos to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Complete,
}

/// Derived scan delta for one location (never stored)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanState {
    pub status: ScanStatus,
    pub unprocessed_count: usize,
    pub unprocessed_files: Vec<String>,
}
