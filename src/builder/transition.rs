//! Builder for constructing behavior transitions.

use crate::builder::error::BuildError;
use crate::core::{Guard, Priority, Transition};

/// Builder for constructing transitions with a fluent API.
///
/// The guard defaults to one that always passes and the priority to `0`.
#[derive(Debug, Default)]
pub struct TransitionBuilder {
    from: Option<String>,
    to: Option<String>,
    priority: Priority,
    guard: Option<Guard>,
}

impl TransitionBuilder {
    /// Create a new transition builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source behavior (required).
    pub fn from(mut self, name: impl Into<String>) -> Self {
        self.from = Some(name.into());
        self
    }

    /// Set the target behavior (required).
    pub fn to(mut self, name: impl Into<String>) -> Self {
        self.to = Some(name.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Add a guard (optional).
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Add a guard using a closure (optional).
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Guard::new(predicate));
        self
    }

    /// Build the transition.
    pub fn build(self) -> Result<Transition, BuildError> {
        let from = self.from.ok_or(BuildError::MissingFromState)?;
        let to = self.to.ok_or(BuildError::MissingToState)?;
        let guard = self.guard.unwrap_or_else(Guard::always);

        Ok(Transition::new(from, to, self.priority, guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn builder_requires_from() {
        let result = TransitionBuilder::new().to("farming").build();
        assert_eq!(result.unwrap_err(), BuildError::MissingFromState);
    }

    #[test]
    fn builder_requires_to() {
        let result = TransitionBuilder::new().from("idle").build();
        assert_eq!(result.unwrap_err(), BuildError::MissingToState);
    }

    #[test]
    fn default_guard_always_passes() {
        let transition = TransitionBuilder::new()
            .from("idle")
            .to("farming")
            .priority(40)
            .build()
            .unwrap();

        assert_eq!(transition.priority, 40);
        assert!(transition.can_execute("idle"));
    }

    #[test]
    fn when_installs_closure_guard() {
        let busy = Arc::new(AtomicBool::new(false));
        let reader = Arc::clone(&busy);
        let transition = TransitionBuilder::new()
            .from("idle")
            .to("depositing")
            .when(move || reader.load(Ordering::SeqCst))
            .build()
            .unwrap();

        assert!(!transition.can_execute("idle"));
        busy.store(true, Ordering::SeqCst);
        assert!(transition.can_execute("idle"));
    }
}
