//! Builder for constructing engines.

use crate::builder::error::BuildError;
use crate::builder::transition::TransitionBuilder;
use crate::clock::{Clock, TokioClock};
use crate::config::EngineConfig;
use crate::core::{Behavior, Transition};
use crate::engine::StateMachineEngine;
use std::sync::Arc;

/// Builder for constructing a [`StateMachineEngine`] with a fluent API.
///
/// Behaviors are registered before any transition is added, so the order of
/// the calls does not matter.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<Arc<dyn Clock>>,
    behaviors: Vec<Behavior>,
    transitions: Vec<Transition>,
}

impl EngineBuilder {
    /// Create a new builder with the default engine configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the clock. Defaults to [`TokioClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register a behavior.
    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behaviors.push(behavior);
        self
    }

    /// Add a transition using a builder.
    /// Returns an error if the builder fails validation.
    pub fn transition(mut self, builder: TransitionBuilder) -> Result<Self, BuildError> {
        let transition = builder.build()?;
        self.transitions.push(transition);
        Ok(self)
    }

    /// Add a pre-built transition.
    pub fn add_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Build the engine.
    /// Returns an error if a transition references an unregistered behavior.
    pub fn build(self) -> Result<StateMachineEngine, BuildError> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let engine = StateMachineEngine::new(&self.config, clock);

        for behavior in self.behaviors {
            engine.register_behavior(behavior);
        }

        for transition in self.transitions {
            engine.add_transition(transition)?;
        }

        Ok(engine)
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("config", &self.config)
            .field("behaviors", &self.behaviors)
            .field("transitions", &self.transitions)
            .finish_non_exhaustive()
    }
}
