//! Guarded, prioritized edges between behaviors.

use super::guard::Guard;
use super::Priority;
use std::fmt;
use std::sync::Arc;

/// A directed edge `from → to`, taken only while its guard passes.
#[derive(Clone)]
pub struct Transition {
    pub from: String,
    pub to: String,
    pub priority: Priority,
    pub guard: Arc<Guard>,
    seq: u64,
}

impl Transition {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        priority: Priority,
        guard: Guard,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            priority,
            guard: Arc::new(guard),
            seq: 0,
        }
    }

    /// Check if this transition can be taken from `current`.
    pub fn can_execute(&self, current: &str) -> bool {
        if current != self.from {
            return false;
        }

        self.guard.check()
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// All transitions known to an engine.
///
/// Lookups return edges in descending priority; edges with equal priority
/// keep their creation order.
#[derive(Clone, Debug, Default)]
pub struct TransitionTable {
    transitions: Vec<Transition>,
    next_seq: u64,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut transition: Transition) {
        transition.seq = self.next_seq;
        self.next_seq += 1;
        self.transitions.push(transition);
    }

    /// Every edge leaving `from`, highest priority first.
    pub fn outgoing(&self, from: &str) -> Vec<Transition> {
        self.sorted(|t| t.from == from)
    }

    /// Every edge `from → to`, highest priority first.
    pub fn between(&self, from: &str, to: &str) -> Vec<Transition> {
        self.sorted(|t| t.from == from && t.to == to)
    }

    fn sorted(&self, keep: impl Fn(&Transition) -> bool) -> Vec<Transition> {
        let mut matching: Vec<Transition> =
            self.transitions.iter().filter(|t| keep(t)).cloned().collect();
        matching.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        matching
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}
