//! Exclusive control of the actor.

use super::AutomationController;
use crate::core::Priority;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Proof that the holder owns the actor until it hands the lease back with
/// [`AutomationController::release`].
///
/// Dropping a lease that was never released clears the controller's record
/// and resumes the paused tasks on the current runtime.
#[derive(Debug)]
pub struct ExclusiveLease {
    pub(super) id: u64,
    pub(super) epoch: u64,
    pub(super) released: bool,
    holder: String,
    priority: Priority,
    preempt: Arc<AtomicBool>,
    paused: Vec<String>,
    controller: Weak<AutomationController>,
}

impl ExclusiveLease {
    pub(super) fn new(
        id: u64,
        epoch: u64,
        holder: String,
        priority: Priority,
        preempt: Arc<AtomicBool>,
        paused: Vec<String>,
        controller: Weak<AutomationController>,
    ) -> Self {
        Self {
            id,
            epoch,
            released: false,
            holder,
            priority,
            preempt,
            paused,
            controller,
        }
    }

    pub fn holder(&self) -> &str {
        &self.holder
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Tasks stopped when the lease was granted.
    pub fn paused(&self) -> &[String] {
        &self.paused
    }

    /// Whether a higher priority requester asked the holder to yield.
    pub fn is_preempted(&self) -> bool {
        self.preempt.load(Ordering::SeqCst)
    }
}

impl Drop for ExclusiveLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Some(controller) = self.controller.upgrade() {
            controller.abandon(self);
        }
    }
}

/// Controller-side record of the current lease.
#[derive(Debug)]
pub(super) struct LeaseRecord {
    pub id: u64,
    pub holder: String,
    pub priority: Priority,
    pub preempt: Arc<AtomicBool>,
}

/// Public view of the current lease holder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseInfo {
    pub holder: String,
    pub priority: Priority,
    pub preempted: bool,
}
