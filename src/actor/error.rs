//! Collaborator failure types.

use std::time::Duration;
use thiserror::Error;

/// Movement failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MovementError {
    /// A newer goal (or a stop) superseded this one
    #[error("movement goal was cancelled")]
    Cancelled,

    #[error("movement timed out after {0:?}")]
    Timeout(Duration),

    #[error("no path to target: {0}")]
    Unreachable(String),

    #[error("movement failed: {0}")]
    Failed(String),
}

/// Inventory and container failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InventoryError {
    #[error("container unavailable: {0}")]
    Unavailable(String),

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("item not held: {0}")]
    NotHeld(String),
}

/// Failures of physical actions (attacking, harvesting, equipping).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActuatorError {
    #[error("target out of reach")]
    OutOfReach,

    #[error("action failed: {0}")]
    Failed(String),
}

/// Any collaborator failure, as seen by a policy iteration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    #[error(transparent)]
    Movement(#[from] MovementError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Actuator(#[from] ActuatorError),

    #[error("perception unavailable: {0}")]
    Perception(String),
}
