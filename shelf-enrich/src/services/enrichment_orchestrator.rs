//! Batch enrichment orchestrator
//!
//! **Per candidate:**
//! 1. Generative search and structured catalog are queried concurrently
//! 2. Open catalog is queried only when the structured catalog found nothing
//! 3. Results are reconciled with the detected data
//!
//! **Error Handling:**
//! - Source errors and panics are logged and treated as no-match
//! - A candidate whose sources all fail degrades to detected-only fields
//! - Invalid input is rejected before any source is consulted
//!
//! Candidates are processed sequentially; each completion yields one record
//! and one progress tick, in order.

use crate::services::reconciler::reconcile;
use crate::sources::BookSource;
use crate::types::{DetectedCandidate, PartialRecord, UnifiedRecord};
use futures::{FutureExt, Stream};
use shelf_common::events::ProgressTick;
use shelf_common::{Error, Result};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One resolved candidate plus the batch progress after it
#[derive(Debug, Clone)]
pub struct EnrichedCandidate {
    /// Zero-based position in the submitted batch
    pub index: usize,
    pub record: UnifiedRecord,
    pub progress: ProgressTick,
    /// True when no source contributed
    pub detected_only: bool,
}

/// Resolution pipeline over the three source classes
pub struct EnrichmentPipeline {
    generative: Arc<dyn BookSource>,
    catalog: Arc<dyn BookSource>,
    open_catalog: Arc<dyn BookSource>,
}

impl EnrichmentPipeline {
    pub fn new(
        generative: Arc<dyn BookSource>,
        catalog: Arc<dyn BookSource>,
        open_catalog: Arc<dyn BookSource>,
    ) -> Self {
        Self {
            generative,
            catalog,
            open_catalog,
        }
    }

    /// Resolve a single candidate
    ///
    /// Never fails: every source problem degrades the result instead.
    pub async fn enrich_one(&self, candidate: &DetectedCandidate) -> UnifiedRecord {
        let title = candidate.title.trim();
        let author = candidate.author.as_deref();

        debug!(title = %title, author = ?author, "Enriching candidate");

        let (generative, catalog) = tokio::join!(
            guarded_query(self.generative.as_ref(), title, author),
            guarded_query(self.catalog.as_ref(), title, author),
        );

        let mut results: Vec<PartialRecord> = Vec::with_capacity(2);
        results.extend(generative);
        match catalog {
            Some(record) => results.push(record),
            None => results.extend(guarded_query(self.open_catalog.as_ref(), title, author).await),
        }

        reconcile(candidate, &results)
    }

    /// Resolve a batch, yielding each record as soon as it completes
    ///
    /// Validation happens here, before the stream is returned, so a bad batch
    /// never touches the network.
    pub fn enrich_all(
        &self,
        candidates: Vec<DetectedCandidate>,
    ) -> Result<impl Stream<Item = EnrichedCandidate> + Send + '_> {
        validate_candidates(&candidates)?;
        let total = candidates.len();

        info!(total, "Starting batch enrichment");

        Ok(async_stream::stream! {
            for (index, candidate) in candidates.into_iter().enumerate() {
                let record = self.enrich_one(&candidate).await;
                let detected_only = record.is_detected_only();

                if detected_only {
                    warn!(index, title = %candidate.title, "No source matched, keeping detected data");
                }

                yield EnrichedCandidate {
                    index,
                    record,
                    progress: ProgressTick::new(index + 1, total),
                    detected_only,
                };
            }

            info!(total, "Batch enrichment finished");
        })
    }
}

/// Reject empty batches and blank titles
pub fn validate_candidates(candidates: &[DetectedCandidate]) -> Result<()> {
    if candidates.is_empty() {
        return Err(Error::InvalidInput("Candidate list is empty".to_string()));
    }

    if let Some(index) = candidates.iter().position(|c| c.title.trim().is_empty()) {
        return Err(Error::InvalidInput(format!(
            "Candidate {} has a blank title",
            index
        )));
    }

    Ok(())
}

/// Query one source, converting errors and panics into no-match
async fn guarded_query(
    source: &dyn BookSource,
    title: &str,
    author: Option<&str>,
) -> Option<PartialRecord> {
    let kind = source.kind();

    match AssertUnwindSafe(source.query(title, author)).catch_unwind().await {
        Ok(Ok(Some(record))) => Some(record),
        Ok(Ok(None)) => {
            debug!(source = %kind, title = %title, "No match");
            None
        }
        Ok(Err(e)) => {
            warn!(source = %kind, title = %title, error = %e, "Source query failed");
            None
        }
        Err(_) => {
            error!(source = %kind, title = %title, "Source query panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceError;
    use crate::types::SourceKind;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Found(&'static str),
        Empty,
        Fail,
        Panic,
    }

    struct MockSource {
        kind: SourceKind,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockSource {
        fn new(kind: SourceKind, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                kind,
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BookSource for MockSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn query(
            &self,
            _title: &str,
            _author: Option<&str>,
        ) -> std::result::Result<Option<PartialRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Found(publisher) => {
                    let mut record = PartialRecord::empty(self.kind);
                    record.publisher = Some(publisher.to_string());
                    Ok(Some(record))
                }
                Behavior::Empty => Ok(None),
                Behavior::Fail => Err(SourceError::Network("unreachable".to_string())),
                Behavior::Panic => panic!("adapter bug"),
            }
        }
    }

    fn candidate(title: &str) -> DetectedCandidate {
        DetectedCandidate::new(title, Some("Author"), vec![format!("{}.jpg", title)])
    }

    #[tokio::test]
    async fn test_open_catalog_only_when_catalog_empty() {
        let open = MockSource::new(SourceKind::OpenCatalog, Behavior::Found("Open"));
        let pipeline = EnrichmentPipeline::new(
            MockSource::new(SourceKind::GenerativeSearch, Behavior::Empty),
            MockSource::new(SourceKind::Catalog, Behavior::Found("Catalog")),
            open.clone(),
        );

        let record = pipeline.enrich_one(&candidate("Dune")).await;
        assert_eq!(record.publisher.as_deref(), Some("Catalog"));
        assert_eq!(open.calls.load(Ordering::SeqCst), 0);

        let pipeline = EnrichmentPipeline::new(
            MockSource::new(SourceKind::GenerativeSearch, Behavior::Empty),
            MockSource::new(SourceKind::Catalog, Behavior::Fail),
            open.clone(),
        );
        let record = pipeline.enrich_one(&candidate("Dune")).await;
        assert_eq!(record.publisher.as_deref(), Some("Open"));
        assert_eq!(record.source, Some(SourceKind::OpenCatalog));
        assert_eq!(open.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_sources_degrade_to_detected() {
        let pipeline = EnrichmentPipeline::new(
            MockSource::new(SourceKind::GenerativeSearch, Behavior::Panic),
            MockSource::new(SourceKind::Catalog, Behavior::Panic),
            MockSource::new(SourceKind::OpenCatalog, Behavior::Fail),
        );

        let record = pipeline.enrich_one(&candidate("Dune")).await;
        assert!(record.is_detected_only());
        assert_eq!(record.title, "Dune");
        assert_eq!(record.authors, vec!["Author"]);
    }

    #[tokio::test]
    async fn test_batch_yields_ordered_ticks() {
        let pipeline = EnrichmentPipeline::new(
            MockSource::new(SourceKind::GenerativeSearch, Behavior::Found("Gen")),
            MockSource::new(SourceKind::Catalog, Behavior::Empty),
            MockSource::new(SourceKind::OpenCatalog, Behavior::Empty),
        );

        let items: Vec<EnrichedCandidate> = pipeline
            .enrich_all(vec![candidate("A"), candidate("B")])
            .unwrap()
            .collect()
            .await;

        let ticks: Vec<(usize, usize)> = items
            .iter()
            .map(|i| (i.progress.current, i.progress.total))
            .collect();
        assert_eq!(ticks, vec![(1, 2), (2, 2)]);
        assert_eq!(items[1].record.title, "B");
        assert!(!items[0].detected_only);
    }

    #[tokio::test]
    async fn test_invalid_batches_rejected_before_queries() {
        let generative = MockSource::new(SourceKind::GenerativeSearch, Behavior::Empty);
        let pipeline = EnrichmentPipeline::new(
            generative.clone(),
            MockSource::new(SourceKind::Catalog, Behavior::Empty),
            MockSource::new(SourceKind::OpenCatalog, Behavior::Empty),
        );

        assert!(matches!(
            pipeline.enrich_all(Vec::new()).map(|_| ()),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            pipeline.enrich_all(vec![candidate("A"), candidate("  ")]).map(|_| ()),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(generative.calls.load(Ordering::SeqCst), 0);
    }
}
