//! Core behavior arbitration types.
//!
//! This module contains the pure part of the engine:
//! - Behaviors and their registry
//! - Guard predicates for transition control
//! - The prioritized transition table
//! - Bounded history tracking
//!
//! Nothing in here performs I/O or awaits; the async shell lives in
//! [`crate::engine`], [`crate::controller`] and the policy tasks.

mod behavior;
mod guard;
mod history;
mod transition;

pub use behavior::{
    Behavior, BehaviorHooks, BehaviorKind, BehaviorRegistry, NoopHooks, TransitionContext,
};
pub use guard::{Guard, GuardError};
pub(crate) use guard::panic_message;
pub use history::{HistoryEntry, StateHistory, DEFAULT_MAX_HISTORY};
pub use transition::{Transition, TransitionTable};

/// Ordering weight of behaviors, transitions and exclusivity requests.
/// Higher wins.
pub type Priority = i32;
