//! Event types for the shelf event system
//!
//! Provides shared event definitions and the EventBus used to fan enrichment
//! progress out to SSE clients.

mod enrichment_types;

pub use enrichment_types::{BatchOutcomeCounts, ProgressTick};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Shelf event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ShelfEvent {
    /// Batch enrichment session accepted and started
    EnrichmentStarted {
        /// Batch session UUID
        session_id: Uuid,
        /// Number of candidates in the batch
        total: usize,
        /// When the session started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One candidate finished; emitted once per candidate, in order
    EnrichmentProgress {
        /// Batch session UUID
        session_id: Uuid,
        /// Progress after this candidate
        progress: ProgressTick,
        /// When the tick was produced
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A candidate's unified record is available
    CandidateResolved {
        /// Batch session UUID
        session_id: Uuid,
        /// Zero-based index of the candidate in the submitted batch
        index: usize,
        /// Resolved title
        title: String,
        /// True when no source contributed and only detected data was kept
        detected_only: bool,
        /// When the candidate was resolved
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Batch finished (`current == total`)
    EnrichmentCompleted {
        /// Batch session UUID
        session_id: Uuid,
        /// Per-outcome counts
        counts: BatchOutcomeCounts,
        /// Total wall time in milliseconds
        duration_ms: u64,
        /// When the batch completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Enriched records persisted to the catalog for a location
    BooksSynced {
        /// Location UUID
        location_id: Uuid,
        /// Books written
        synced: usize,
        /// Books that failed to persist
        failed: usize,
        /// When the sync finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ShelfEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ShelfEvent::EnrichmentStarted { .. } => "EnrichmentStarted",
            ShelfEvent::EnrichmentProgress { .. } => "EnrichmentProgress",
            ShelfEvent::CandidateResolved { .. } => "CandidateResolved",
            ShelfEvent::EnrichmentCompleted { .. } => "EnrichmentCompleted",
            ShelfEvent::BooksSynced { .. } => "BooksSynced",
        }
    }

    /// Batch session this event belongs to, if any
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            ShelfEvent::EnrichmentStarted { session_id, .. }
            | ShelfEvent::EnrichmentProgress { session_id, .. }
            | ShelfEvent::CandidateResolved { session_id, .. }
            | ShelfEvent::EnrichmentCompleted { session_id, .. } => Some(*session_id),
            ShelfEvent::BooksSynced { .. } => None,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// Wraps a tokio broadcast channel. Slow subscribers lose the oldest events
/// once `capacity` is exceeded.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ShelfEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ShelfEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ShelfEvent,
    ) -> Result<usize, broadcast::error::SendError<ShelfEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ShelfEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
