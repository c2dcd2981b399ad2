//! Goal generations for movement cancellation.
//!
//! Movement adapters call [`GoalTracker::begin`] for every new goal and race
//! their travel future against [`GoalTicket::superseded`]. Beginning another
//! goal or calling [`GoalTracker::cancel`] bumps the generation, which makes
//! every older ticket resolve immediately.

use tokio::sync::watch;

#[derive(Debug)]
pub struct GoalTracker {
    generation: watch::Sender<u64>,
}

impl Default for GoalTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl GoalTracker {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    /// Start a new goal, superseding any previous one.
    pub fn begin(&self) -> GoalTicket {
        self.generation.send_modify(|g| *g += 1);
        GoalTicket {
            generation: *self.generation.borrow(),
            updates: self.generation.subscribe(),
        }
    }

    /// Issue a null goal: supersede whatever is in flight.
    pub fn cancel(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }
}

/// Handle on one goal generation.
#[derive(Debug)]
pub struct GoalTicket {
    generation: u64,
    updates: watch::Receiver<u64>,
}

impl GoalTicket {
    pub fn is_current(&self) -> bool {
        *self.updates.borrow() == self.generation
    }

    /// Resolves once a newer goal or a cancel supersedes this ticket.
    pub async fn superseded(&mut self) {
        while self.is_current() {
            if self.updates.changed().await.is_err() {
                // Tracker dropped: nobody can complete this goal any more.
                return;
            }
        }
    }
}
