//! Batch enrichment session (in-memory state)
//!
//! Sessions live only in the process; a restart forgets them. Completed
//! sessions are evicted by age and count so the map stays bounded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shelf_common::events::{BatchOutcomeCounts, ProgressTick};
use std::collections::HashMap;
use uuid::Uuid;

use crate::services::EnrichedCandidate;
use crate::types::UnifiedRecord;

/// Batch session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    /// Candidates still being resolved
    Running,
    /// Every candidate produced a record
    Completed,
}

/// One batch enrichment run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSession {
    pub session_id: Uuid,
    pub state: BatchState,
    pub progress: ProgressTick,
    /// Records resolved so far, in candidate order
    pub records: Vec<UnifiedRecord>,
    pub counts: BatchOutcomeCounts,
    pub started_at: DateTime<Utc>,
    /// Set once the session completes
    pub ended_at: Option<DateTime<Utc>>,
}

impl BatchSession {
    pub fn new(total: usize) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: BatchState::Running,
            progress: ProgressTick::new(0, total),
            records: Vec::with_capacity(total),
            counts: BatchOutcomeCounts::default(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Record a resolved candidate; completes the session on the final tick
    pub fn record_result(&mut self, enriched: &EnrichedCandidate) {
        self.records.push(enriched.record.clone());
        self.progress = enriched.progress;
        if enriched.detected_only {
            self.counts.detected_only += 1;
        } else {
            self.counts.enriched += 1;
        }

        if enriched.progress.is_complete() {
            self.state = BatchState::Completed;
            self.ended_at = Some(Utc::now());
        }
    }

    /// Wall time so far (or total, once completed)
    pub fn duration_ms(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Completed sessions kept for status queries
pub const DEFAULT_MAX_COMPLETED_SESSIONS: usize = 32;

/// How long a completed session stays queryable
pub const DEFAULT_COMPLETED_SESSION_TTL_SECS: i64 = 3600;

/// Batch sessions by id
///
/// Running sessions are never evicted. Completed ones are dropped once older
/// than the TTL, then oldest first while over the cap.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<Uuid, BatchSession>,
    max_completed: usize,
    completed_ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_limits(
            DEFAULT_MAX_COMPLETED_SESSIONS,
            Duration::seconds(DEFAULT_COMPLETED_SESSION_TTL_SECS),
        )
    }
}

impl SessionRegistry {
    pub fn with_limits(max_completed: usize, completed_ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            max_completed,
            completed_ttl,
        }
    }

    /// Register a new session, evicting stale completed ones first
    pub fn insert(&mut self, session: BatchSession) {
        self.evict(Utc::now());
        self.sessions.insert(session.session_id, session);
    }

    pub fn get(&self, session_id: &Uuid) -> Option<&BatchSession> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &Uuid) -> Option<&mut BatchSession> {
        self.sessions.get_mut(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let before = self.sessions.len();
        let cutoff = now - self.completed_ttl;
        self.sessions
            .retain(|_, s| s.ended_at.map_or(true, |ended| ended > cutoff));

        let mut completed: Vec<(DateTime<Utc>, Uuid)> = self
            .sessions
            .values()
            .filter_map(|s| s.ended_at.map(|ended| (ended, s.session_id)))
            .collect();
        if completed.len() > self.max_completed {
            completed.sort();
            let excess = completed.len() - self.max_completed;
            for (_, id) in completed.into_iter().take(excess) {
                self.sessions.remove(&id);
            }
        }

        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.sessions.len(), "Evicted batch sessions");
        }
    }
}
