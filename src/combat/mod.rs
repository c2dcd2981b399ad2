//! Combat arbitration: who to fight, how, and when to let go.
//!
//! The pure parts ([`ModeSelector`], [`TargetFilter`], [`should_preempt`])
//! are plain functions over values. [`RetaliationGate`] resolves the race
//! between attacker correlation and its deadline, and [`CombatTask`] runs
//! the engagement loop on top of them.

mod mode;
mod retaliation;
mod target;
mod task;

pub use mode::{CombatMode, ModeSelector};
pub use retaliation::{Retaliation, RetaliationGate, RetaliationSink, RetaliationSource};
pub use target::{should_preempt, Candidate, TargetClass, TargetFilter};
pub use task::{CombatSession, CombatTask, DisengageReason, TickOutcome};
