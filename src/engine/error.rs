//! Engine errors.

use thiserror::Error;

/// Errors returned by [`StateMachineEngine`](super::StateMachineEngine) operations.
///
/// None of these are fatal: the engine stays in a consistent state and keeps
/// ticking after reporting them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("cannot create transition '{from}' -> '{to}': behavior '{missing}' is not registered")]
    UnknownEndpoint {
        from: String,
        to: String,
        missing: String,
    },

    #[error("no transition from '{from}' to '{to}'")]
    NoTransition { from: String, to: String },

    #[error("guards rejected transition from '{from}' to '{to}'")]
    GuardRejected { from: String, to: String },

    #[error("current behavior changed from '{expected}' to '{actual}' during evaluation")]
    StaleTransition { expected: String, actual: String },
}
