//! The race between attacker correlation and the fallback deadline.
//!
//! When the actor takes damage the attacker is usually identified shortly
//! after by a separate signal. [`RetaliationGate::on_damaged`] arms a
//! deadline; whichever of [`on_attacker_identified`](RetaliationGate::on_attacker_identified)
//! and the deadline comes first resolves the event, and the other path
//! becomes a no-op. A newer damage event supersedes a pending one.

use crate::actor::{Entity, EntityId, EntityKind, PerceptionSource};
use crate::clock::Clock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetaliationSource {
    /// The attacker was identified before the deadline
    Correlated,
    /// The deadline passed; the nearest plausible attacker was chosen
    Fallback,
}

/// A resolved damage event.
#[derive(Clone, Debug, PartialEq)]
pub struct Retaliation {
    pub event: u64,
    pub attacker: Entity,
    pub source: RetaliationSource,
}

/// Receiver of resolved damage events.
pub type RetaliationSink = Arc<dyn Fn(Retaliation) + Send + Sync>;

#[derive(Default)]
struct GateState {
    next_event: u64,
    pending: Option<u64>,
    timer: Option<JoinHandle<()>>,
}

struct GateInner {
    deadline: Duration,
    reach: f64,
    perception: Arc<dyn PerceptionSource>,
    clock: Arc<dyn Clock>,
    sink: RetaliationSink,
    state: Mutex<GateState>,
}

impl GateInner {
    fn state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve_fallback(&self, event: u64) {
        {
            let mut state = self.state();
            if state.pending != Some(event) {
                return;
            }
            state.pending = None;
            state.timer = None;
        }

        let attacker = self.perception.find_nearest(
            &|entity: &Entity| matches!(entity.kind, EntityKind::Hostile | EntityKind::Player),
            self.reach,
        );
        match attacker {
            Some(attacker) => {
                info!(event, attacker = %attacker.name, "retaliating against nearest suspect");
                (self.sink)(Retaliation {
                    event,
                    attacker,
                    source: RetaliationSource::Fallback,
                });
            }
            None => debug!(event, "no plausible attacker within reach"),
        }
    }
}

/// Resolves each damage event exactly once.
pub struct RetaliationGate {
    inner: Arc<GateInner>,
}

impl RetaliationGate {
    pub fn new(
        deadline: Duration,
        reach: f64,
        perception: Arc<dyn PerceptionSource>,
        clock: Arc<dyn Clock>,
        sink: RetaliationSink,
    ) -> Self {
        Self {
            inner: Arc::new(GateInner {
                deadline,
                reach,
                perception,
                clock,
                sink,
                state: Mutex::new(GateState::default()),
            }),
        }
    }

    /// Record a damage event and arm its deadline. Returns the event id.
    pub fn on_damaged(&self) -> u64 {
        let event = {
            let mut state = self.inner.state();
            state.next_event += 1;
            let event = state.next_event;
            if let Some(previous) = state.pending.replace(event) {
                debug!(previous, event, "damage event superseded");
            }
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            event
        };

        match Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                let timer = handle.spawn(async move {
                    inner.clock.sleep(inner.deadline).await;
                    inner.resolve_fallback(event);
                });
                let mut state = self.inner.state();
                if state.pending == Some(event) {
                    state.timer = Some(timer);
                }
            }
            Err(_) => {
                warn!(event, "no runtime for the retaliation deadline, resolving now");
                self.inner.resolve_fallback(event);
            }
        }
        event
    }

    /// Correlate the pending damage event with `attacker`.
    ///
    /// Returns `false` when there is no pending event (the deadline already
    /// fired or nothing was damaged) or the attacker is not visible; the
    /// deadline then still decides.
    pub fn on_attacker_identified(&self, attacker: EntityId) -> bool {
        let Some(entity) = self.inner.perception.entity(attacker) else {
            debug!(attacker, "identified attacker is not visible");
            return false;
        };

        let event = {
            let mut state = self.inner.state();
            let Some(event) = state.pending.take() else {
                debug!(attacker, "late correlation ignored");
                return false;
            };
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            event
        };

        info!(event, attacker = %entity.name, "retaliating against identified attacker");
        (self.inner.sink)(Retaliation {
            event,
            attacker: entity,
            source: RetaliationSource::Correlated,
        });
        true
    }

    /// Whether a damage event is waiting for resolution.
    pub fn is_pending(&self) -> bool {
        self.inner.state().pending.is_some()
    }
}

impl std::fmt::Debug for RetaliationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetaliationGate")
            .field("deadline", &self.inner.deadline)
            .field("pending", &self.is_pending())
            .finish_non_exhaustive()
    }
}
