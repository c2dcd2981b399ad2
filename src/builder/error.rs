//! Build errors for engine and transition builders.

use crate::engine::EngineError;
use thiserror::Error;

/// Errors that can occur when building an engine or a transition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Transition source behavior not specified. Call .from(name)")]
    MissingFromState,

    #[error("Transition target behavior not specified. Call .to(name)")]
    MissingToState,

    #[error("Engine rejected the configuration: {0}")]
    Engine(#[from] EngineError),
}
