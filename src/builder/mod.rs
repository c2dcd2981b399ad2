//! Builder API for ergonomic engine construction.
//!
//! This module provides fluent builders for wiring behaviors and guarded
//! transitions into a [`StateMachineEngine`](crate::engine::StateMachineEngine).

pub mod error;
pub mod machine;
pub mod transition;

pub use error::BuildError;
pub use machine::EngineBuilder;
pub use transition::TransitionBuilder;

use crate::core::{Guard, Priority, Transition};

/// Create an unconditional transition.
///
/// # Example
///
/// ```
/// use arbiter::builder::simple_transition;
///
/// let transition = simple_transition("idle", "farming", 40);
/// assert!(transition.can_execute("idle"));
/// ```
pub fn simple_transition(from: &str, to: &str, priority: Priority) -> Transition {
    Transition::new(from, to, priority, Guard::always())
}

/// Create a transition with a guard predicate.
///
/// # Example
///
/// ```
/// use arbiter::builder::guarded_transition;
///
/// let transition = guarded_transition("idle", "eating", 80, || false);
/// assert!(!transition.can_execute("idle"));
/// ```
pub fn guarded_transition<F>(from: &str, to: &str, priority: Priority, guard: F) -> Transition
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    Transition::new(from, to, priority, Guard::new(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_transition_builds() {
        let transition = simple_transition("idle", "farming", 40);

        assert_eq!(transition.from, "idle");
        assert_eq!(transition.to, "farming");
        assert!(transition.can_execute("idle"));
        assert!(!transition.can_execute("farming"));
    }

    #[test]
    fn guarded_transition_respects_guard() {
        let transition = guarded_transition("farming", "idle", 0, || true);
        assert!(transition.can_execute("farming"));

        let transition = guarded_transition("farming", "idle", 0, || false);
        assert!(!transition.can_execute("farming"));
    }
}
