//! The async shell around the core: a shared, tickable state machine.
//!
//! [`StateMachineEngine`] owns the behavior registry, the transition table and
//! the history behind a single lock. Callers share it through an `Arc`; the
//! background [`run`](StateMachineEngine::run) loop evaluates guards on the
//! injected [`Clock`](crate::clock::Clock).

mod error;
mod machine;

pub use error::EngineError;
pub use machine::{StateChange, StateMachineEngine};
