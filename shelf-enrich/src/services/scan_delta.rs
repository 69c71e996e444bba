//! Incremental scan delta
//!
//! A photo counts as processed once any catalogued book lists it among its
//! sources. Re-scanning a location only needs the photos outside that set.

use crate::types::{ScanState, ScanStatus};
use std::collections::HashSet;

/// Compute which of a location's photos have not been processed yet
///
/// `catalogued_sources` holds the `sources` list of every book stored for the
/// location. Input order of `location_photo_ids` is preserved and repeated ids
/// are reported once.
pub fn compute_delta<S: AsRef<[String]>>(
    location_photo_ids: &[String],
    catalogued_sources: &[S],
) -> ScanState {
    let processed: HashSet<&str> = catalogued_sources
        .iter()
        .flat_map(|sources| sources.as_ref().iter())
        .map(String::as_str)
        .collect();

    let mut seen = HashSet::new();
    let unprocessed_files: Vec<String> = location_photo_ids
        .iter()
        .filter(|id| !processed.contains(id.as_str()))
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    let status = if unprocessed_files.is_empty() {
        ScanStatus::Complete
    } else {
        ScanStatus::Pending
    };

    ScanState {
        status,
        unprocessed_count: unprocessed_files.len(),
        unprocessed_files,
    }
}
