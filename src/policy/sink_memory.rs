//! Memory of sinks that recently turned out to be full.

use crate::actor::SinkKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Why a sink was marked full.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FullReason {
    /// Attempts succeeded but the measured quantity did not drop
    NoProgress,
    /// Every attempt in the streak failed with a collaborator error
    TransferFailures,
    /// The sink reported no free capacity and no mergeable stack
    ReportedFull,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FullMark {
    pub marked_at: Instant,
    pub reason: FullReason,
}

/// Sinks excluded from selection until their mark expires.
///
/// Expired marks read as "not full" even before they are purged.
#[derive(Clone, Debug)]
pub struct SinkMemory {
    ttl: Duration,
    marks: HashMap<SinkKey, FullMark>,
}

impl SinkMemory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            marks: HashMap::new(),
        }
    }

    pub fn mark_full(&mut self, key: SinkKey, reason: FullReason, now: Instant) {
        self.marks.insert(
            key,
            FullMark {
                marked_at: now,
                reason,
            },
        );
    }

    pub fn is_full(&self, key: &SinkKey, now: Instant) -> bool {
        self.marks
            .get(key)
            .is_some_and(|mark| !self.expired(mark, now))
    }

    fn expired(&self, mark: &FullMark, now: Instant) -> bool {
        now.saturating_duration_since(mark.marked_at) >= self.ttl
    }

    /// Drop expired marks, returning how many were removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.marks.len();
        self.marks
            .retain(|_, mark| now.saturating_duration_since(mark.marked_at) < ttl);
        before - self.marks.len()
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    /// Live marks, sorted by key.
    pub fn entries(&self, now: Instant) -> Vec<(SinkKey, FullReason)> {
        let mut entries: Vec<_> = self
            .marks
            .iter()
            .filter(|(_, mark)| !self.expired(mark, now))
            .map(|(key, mark)| (key.clone(), mark.reason))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
