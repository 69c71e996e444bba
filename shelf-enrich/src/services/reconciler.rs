//! Field reconciliation
//!
//! Merges per-source partial records with the detected candidate into one
//! `UnifiedRecord`. Each singular field is selected independently by fixed
//! priority: catalog-class source, then generative source, then the detected
//! input. Values are taken whole from one source, never blended.

use crate::types::{DetectedCandidate, PartialRecord, SourceKind, UnifiedRecord};
use tracing::debug;

/// Reconcile per-source results into a unified record
///
/// Pure and deterministic. Only the first catalog-class record and the first
/// generative record participate; records of the same class beyond the first
/// are ignored.
pub fn reconcile(detected: &DetectedCandidate, results: &[PartialRecord]) -> UnifiedRecord {
    let catalog = results
        .iter()
        .find(|r| r.source.is_catalog_class() && r.has_data());
    let generative = results
        .iter()
        .find(|r| r.source == SourceKind::GenerativeSearch && r.has_data());

    let ranked: Vec<&PartialRecord> = catalog.into_iter().chain(generative).collect();

    let title = select_field(&ranked, |r| r.title.as_ref())
        .unwrap_or_else(|| detected.title.trim().to_string());

    let authors = merge_authors(&ranked, detected);

    let source = ranked.first().map(|r| r.source);
    let source_url = select_field(&ranked, |r| r.info_link.as_ref());

    let record = UnifiedRecord {
        title,
        authors,
        isbn: select_field(&ranked, |r| r.isbn.as_ref()),
        publisher: select_field(&ranked, |r| r.publisher.as_ref()),
        publication_date: select_field(&ranked, |r| r.publication_date.as_ref()),
        description: select_field(&ranked, |r| r.description.as_ref()),
        cover_url: select_field(&ranked, |r| r.cover_url.as_ref()),
        source,
        source_url,
        sources: detected.sources.clone(),
    };

    debug!(
        title = %record.title,
        source = ?record.source,
        authors = record.authors.len(),
        "Reconciled record"
    );

    record
}

/// First non-blank value of a field across records in priority order
fn select_field<F>(ranked: &[&PartialRecord], field_accessor: F) -> Option<String>
where
    F: Fn(&PartialRecord) -> Option<&String>,
{
    ranked
        .iter()
        .filter_map(|r| field_accessor(r))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Order-preserving exact-string union of source authors
///
/// Falls back to the detected author when no source supplied any. A detected
/// "Unknown" (any case, padded or not) is treated as no author and never
/// becomes the fallback.
fn merge_authors(ranked: &[&PartialRecord], detected: &DetectedCandidate) -> Vec<String> {
    let mut authors: Vec<String> = Vec::new();

    for author in ranked.iter().flat_map(|r| r.authors.iter()) {
        let author = author.trim();
        if !author.is_empty() && !authors.iter().any(|a| a == author) {
            authors.push(author.to_string());
        }
    }

    if authors.is_empty() {
        if let Some(author) = detected.known_author() {
            authors.push(author.to_string());
        }
    }

    authors
}
