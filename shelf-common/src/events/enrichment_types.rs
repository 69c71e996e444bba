//! Enrichment event payload types

use serde::{Deserialize, Serialize};

/// Batch progress after a candidate completes
///
/// `current` only grows and equals `total` exactly once, on the final tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressTick {
    /// Candidates completed so far
    pub current: usize,
    /// Candidates in the batch
    pub total: usize,
}

impl ProgressTick {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }

    /// True on the final tick of a batch
    pub fn is_complete(&self) -> bool {
        self.current == self.total
    }

    /// Percentage complete (0.0 - 100.0)
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.current as f64 / self.total as f64) * 100.0
        }
    }
}

/// Outcome counts for a finished batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcomeCounts {
    /// Candidates where at least one source contributed
    pub enriched: usize,
    /// Candidates that fell back to detected data only
    pub detected_only: usize,
}
