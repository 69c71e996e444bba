//! Service modules for the resolution pipeline
//!
//! Pure pieces (normalizer, reconciler, scan delta) sit next to the ones that
//! do I/O (orchestrator, image store).

pub mod enrichment_orchestrator;
pub mod image_store;
pub mod reconciler;
pub mod scan_delta;
pub mod title_normalizer;

pub use enrichment_orchestrator::{validate_candidates, EnrichedCandidate, EnrichmentPipeline};
pub use image_store::{hash_file, ImageStore, StoredImage};
pub use reconciler::reconcile;
pub use scan_delta::compute_delta;
pub use title_normalizer::normalize;
