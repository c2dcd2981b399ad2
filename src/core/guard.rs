//! Guard predicates for controlling behavior transitions.
//!
//! Guards are boolean predicates that determine whether a transition may be
//! taken. A guard that fails (returns an error or panics) is never allowed to
//! take down the caller: [`Guard::check`] logs the failure and reports `false`.

use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tracing::warn;

/// Failure raised while evaluating a guard.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GuardError {
    /// The predicate reported that it could not decide.
    #[error("guard evaluation failed: {0}")]
    Failed(String),

    /// The predicate panicked.
    #[error("guard panicked: {0}")]
    Panicked(String),
}

type Predicate = Box<dyn Fn() -> Result<bool, GuardError> + Send + Sync>;

/// Predicate that gates a transition.
///
/// Guards usually close over shared task state (busy flags, counters) and are
/// re-evaluated every time the engine considers the edge.
///
/// # Example
///
/// ```rust
/// use arbiter::core::Guard;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let busy = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&busy);
/// let guard = Guard::new(move || flag.load(Ordering::SeqCst));
///
/// assert!(!guard.check());
/// busy.store(true, Ordering::SeqCst);
/// assert!(guard.check());
/// ```
pub struct Guard {
    predicate: Predicate,
}

impl Guard {
    /// Create a guard from an infallible predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Guard {
            predicate: Box::new(move || Ok(predicate())),
        }
    }

    /// Create a guard from a predicate that may fail.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn() -> Result<bool, GuardError> + Send + Sync + 'static,
    {
        Guard {
            predicate: Box::new(predicate),
        }
    }

    /// A guard that always passes.
    pub fn always() -> Self {
        Self::new(|| true)
    }

    /// Evaluate the predicate, converting a panic into [`GuardError::Panicked`].
    pub fn evaluate(&self) -> Result<bool, GuardError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.predicate)())) {
            Ok(result) => result,
            Err(payload) => Err(GuardError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    /// Evaluate the predicate; any failure is logged and treated as `false`.
    pub fn check(&self) -> bool {
        match self.evaluate() {
            Ok(passed) => passed,
            Err(err) => {
                warn!(error = %err, "guard failed, treating as false");
                false
            }
        }
    }
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
