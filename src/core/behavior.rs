//! Named behaviors and the registry that holds them.
//!
//! A [`Behavior`] is a tagged value built completely at construction time:
//! its kind, name, priority and hooks never change afterwards. Replacing a
//! behavior means registering a new value under the same name.

use super::Priority;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// What a behavior represents for the actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// The neutral state the engine evaluates outgoing edges from
    Idle,
    Harvest,
    Deposit,
    Feed,
    Combat,
    Navigate,
    /// Application-defined behavior
    Custom,
    /// No-op stand-in registered for an unknown target name
    Placeholder,
}

impl BehaviorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Harvest => "harvest",
            Self::Deposit => "deposit",
            Self::Feed => "feed",
            Self::Combat => "combat",
            Self::Navigate => "navigate",
            Self::Custom => "custom",
            Self::Placeholder => "placeholder",
        }
    }
}

/// Context handed to behavior hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionContext<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub forced: bool,
}

/// Enter/exit callbacks of a behavior.
///
/// Hooks run on the engine's caller after the current behavior has been
/// updated; they must not block.
pub trait BehaviorHooks: Send + Sync {
    fn on_enter(&self, _ctx: &TransitionContext<'_>) {}

    fn on_exit(&self, _ctx: &TransitionContext<'_>) {}
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl BehaviorHooks for NoopHooks {}

/// A named state of the engine.
#[derive(Clone)]
pub struct Behavior {
    kind: BehaviorKind,
    name: String,
    priority: Priority,
    hooks: Arc<dyn BehaviorHooks>,
}

impl Behavior {
    /// Create a behavior with no-op hooks.
    pub fn new(kind: BehaviorKind, name: impl Into<String>, priority: Priority) -> Self {
        Self {
            kind,
            name: name.into(),
            priority,
            hooks: Arc::new(NoopHooks),
        }
    }

    /// Attach hooks. Intended for use while building the value.
    pub fn with_hooks(mut self, hooks: Arc<dyn BehaviorHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// The no-op behavior registered for an unknown target name.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(BehaviorKind::Placeholder, name, 0)
    }

    pub fn kind(&self) -> BehaviorKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn hooks(&self) -> &Arc<dyn BehaviorHooks> {
        &self.hooks
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Registered behaviors, kept in registration order.
#[derive(Clone, Debug, Default)]
pub struct BehaviorRegistry {
    behaviors: Vec<Behavior>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a behavior. Re-registering a name replaces the previous value
    /// in place and returns it.
    pub fn register(&mut self, behavior: Behavior) -> Option<Behavior> {
        match self
            .behaviors
            .iter_mut()
            .find(|existing| existing.name == behavior.name)
        {
            Some(slot) => Some(std::mem::replace(slot, behavior)),
            None => {
                self.behaviors.push(behavior);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Behavior> {
        self.behaviors.iter().find(|b| b.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.behaviors.iter().map(|b| b.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }
}
