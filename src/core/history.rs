//! Bounded behavior transition history.
//!
//! The engine records one [`HistoryEntry`] per applied transition. History is
//! capacity-bounded: once `max_size` entries are stored the oldest entry is
//! evicted first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of retained history entries.
pub const DEFAULT_MAX_HISTORY: usize = 50;

/// Record of a single applied transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The behavior that became current
    pub state: String,
    /// The behavior that was current before
    pub from: String,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
    /// Whether the transition bypassed guards
    pub forced: bool,
}

/// FIFO of applied transitions, bounded by `max_size`.
///
/// # Example
///
/// ```rust
/// use arbiter::core::{HistoryEntry, StateHistory};
/// use chrono::Utc;
///
/// let mut history = StateHistory::new(2);
/// for (from, to) in [("idle", "farming"), ("farming", "idle"), ("idle", "eating")] {
///     history.record(HistoryEntry {
///         state: to.to_string(),
///         from: from.to_string(),
///         timestamp: Utc::now(),
///         forced: false,
///     });
/// }
///
/// assert_eq!(history.len(), 2);
/// let recent = history.recent(10);
/// assert_eq!(recent[0].state, "idle");
/// assert_eq!(recent[1].state, "eating");
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateHistory {
    entries: VecDeque<HistoryEntry>,
    max_size: usize,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl StateHistory {
    /// Create an empty history retaining at most `max_size` entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    /// Append an entry, evicting the oldest ones beyond capacity.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
    }

    /// The `n` most recent entries, oldest first and most recent last.
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Iterate over all retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Get the path of behaviors traversed by the retained entries.
    ///
    /// Starts with the `from` of the oldest retained entry, followed by the
    /// `state` of every entry.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.entries.len() + 1);
        if let Some(first) = self.entries.front() {
            path.push(first.from.as_str());
        }
        path.extend(self.entries.iter().map(|entry| entry.state.as_str()));
        path
    }

    /// Time between the oldest and newest retained entry.
    ///
    /// Returns `None` when the history is empty.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.entries.front()?, self.entries.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}
