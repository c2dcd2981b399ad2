//! Errors of the arbiter command surface.

use crate::actor::MovementError;
use crate::builder::BuildError;
use crate::config::ConfigError;
use crate::controller::{ControllerError, TaskError};
use crate::engine::EngineError;
use thiserror::Error;

/// Errors returned by [`Arbiter`](super::Arbiter) commands.
#[derive(Debug, Error)]
pub enum ArbiterError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to assemble the engine: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Movement(#[from] MovementError),

    #[error("no task named '{0}'")]
    UnknownTask(String),

    /// A higher-priority task claimed the actor mid-command
    #[error("'{0}' was preempted")]
    Preempted(String),
}
