//! Controller and task errors.

use crate::core::Priority;
use thiserror::Error;

/// Errors returned by [`AutomationController`](super::AutomationController).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ControllerError {
    /// Another pause or resume is running
    #[error("a pause or resume is already in progress")]
    Busy,

    #[error("no task named '{0}' is registered")]
    UnknownTask(String),

    /// The actor is already leased to another task
    #[error("actor is held by '{holder}' at priority {priority}")]
    Held { holder: String, priority: Priority },

    #[error("task '{name}' failed to start: {source}")]
    Start {
        name: String,
        #[source]
        source: TaskError,
    },
}

/// Errors reported by an [`AutomationTask`](super::AutomationTask).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TaskError {
    /// A cycle of the task is already running
    #[error("task is busy")]
    Busy,

    #[error("no async runtime available to run the task")]
    NoRuntime,

    #[error("automation controller is gone")]
    ControllerGone,

    #[error("could not take exclusive control: {0}")]
    Exclusivity(String),

    #[error("task failed: {0}")]
    Failed(String),
}

impl From<ControllerError> for TaskError {
    fn from(err: ControllerError) -> Self {
        TaskError::Exclusivity(err.to_string())
    }
}
