//! Threshold-triggered automation cycles.
//!
//! A [`ThresholdTask`] wraps a [`ThresholdPolicy`] and runs it as an
//! [`AutomationTask`]:
//!
//! - while active, a monitor measures the policy's quantity every
//!   `check_interval` and starts a cycle once it reaches the threshold;
//! - a cycle takes exclusive control of the actor through the controller,
//!   drains the quantity into sinks until it drops below the threshold, and
//!   hands control back;
//! - sinks that stop making progress are remembered as full, and running out
//!   of sinks arms a randomized cooldown that suppresses further triggers.

use super::cooldown::Cooldown;
use super::sink_memory::{FullReason, SinkMemory};
use crate::actor::{ActorContext, CollaboratorError, Sink, SinkKey};
use crate::config::PolicyConfig;
use crate::controller::{AutomationController, AutomationTask, ExclusiveLease, TaskError};
use crate::core::{Guard, Priority};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// What one attempt against a sink reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttemptReport {
    /// Units the sink accepted, as reported by the collaborator
    pub moved: u32,
    /// The sink has no capacity left at all
    pub reported_full: bool,
}

/// The domain-specific half of a threshold task.
#[async_trait]
pub trait ThresholdPolicy: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Exclusivity priority of this policy's cycles.
    fn priority(&self) -> Priority;

    fn settings(&self) -> &PolicyConfig;

    fn threshold(&self) -> u32;

    /// Current value of the watched quantity.
    fn measure(&self, actor: &ActorContext) -> u32;

    /// Move to the work area before the first attempt.
    async fn approach(&self, _actor: &ActorContext) -> Result<(), CollaboratorError> {
        Ok(())
    }

    /// Candidate sinks, most preferred first.
    fn candidates(&self, actor: &ActorContext) -> Vec<Sink>;

    /// Try to drain some of the quantity into `sink`.
    async fn attempt(
        &self,
        actor: &ActorContext,
        sink: &Sink,
    ) -> Result<AttemptReport, CollaboratorError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyPhase {
    Idle,
    Triggered,
    Busy,
    Backoff,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// The task was stopped or paused
    Stopped,
    /// A higher priority requester asked for the actor
    Preempted,
}

/// How a cycle ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    /// The quantity dropped below the target
    Completed {
        before: u32,
        after: u32,
        iterations: u32,
    },
    /// No eligible sink was found repeatedly; a cooldown was armed
    Exhausted { cooldown: Duration },
    /// The iteration bound was hit; a cooldown was armed
    CapReached { cooldown: Duration },
    Aborted { reason: AbortReason },
}

/// Result of one monitor check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Below threshold
    Idle { measured: u32 },
    /// A cooldown is running
    Suppressed { remaining: Duration },
    /// The cycle could not start right now
    Deferred { reason: String },
    Ran(CycleOutcome),
}

/// Diagnostic view of a threshold task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolicyStatus {
    pub name: String,
    pub active: bool,
    pub busy: bool,
    pub phase: PolicyPhase,
    pub cooldown_remaining: Option<Duration>,
    pub full_sinks: Vec<(SinkKey, FullReason)>,
    pub last_outcome: Option<CycleOutcome>,
}

struct PolicyState {
    phase: PolicyPhase,
    memory: SinkMemory,
    cooldown: Cooldown,
    last_outcome: Option<CycleOutcome>,
}

/// Consecutive unproductive attempts against one sink.
struct Streak {
    key: SinkKey,
    count: u32,
    all_errors: bool,
}

/// RAII holder of a task's busy flag.
struct BusyFlag<'a>(&'a AtomicBool);

impl<'a> BusyFlag<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyFlag(flag))
    }
}

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Settles the policy phase when a cycle ends, including a cycle whose
/// future was dropped.
struct SettlePhase<'a, P: ThresholdPolicy>(&'a TaskInner<P>);

impl<P: ThresholdPolicy> Drop for SettlePhase<'_, P> {
    fn drop(&mut self) {
        self.0.settle_phase();
    }
}

struct TaskInner<P> {
    policy: P,
    actor: ActorContext,
    controller: Weak<AutomationController>,
    active: AtomicBool,
    busy: AtomicBool,
    generation: AtomicU64,
    wake: Notify,
    state: Mutex<PolicyState>,
}

impl<P: ThresholdPolicy> TaskInner<P> {
    fn state(&self) -> MutexGuard<'_, PolicyState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn stop(&self) {
        let was_active = self.active.swap(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.wake.notify_waiters();
        if self.busy.load(Ordering::SeqCst) {
            self.actor.movement.stop();
        }
        if was_active {
            info!(task = self.policy.name(), "task stopped");
        }
    }

    async fn check_trigger(&self) -> TriggerOutcome {
        let name = self.policy.name();
        let now = self.actor.clock.now();
        {
            let mut state = self.state();
            if let Some(remaining) = state.cooldown.remaining(now) {
                return TriggerOutcome::Suppressed { remaining };
            }
            if state.cooldown.has_elapsed(now) {
                state.cooldown.clear();
                if state.phase == PolicyPhase::Backoff {
                    state.phase = PolicyPhase::Idle;
                }
                info!(task = name, "cooldown elapsed");
            }
        }

        if self.busy.load(Ordering::SeqCst) {
            return TriggerOutcome::Deferred {
                reason: "cycle already running".to_string(),
            };
        }

        let measured = self.policy.measure(&self.actor);
        let threshold = self.policy.threshold();
        if measured < threshold {
            return TriggerOutcome::Idle { measured };
        }

        info!(task = name, measured, threshold, "threshold reached");
        match self.run_cycle(false).await {
            Ok(outcome) => TriggerOutcome::Ran(outcome),
            Err(err) => {
                debug!(task = name, error = %err, "cycle deferred");
                TriggerOutcome::Deferred {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn run_cycle(&self, forced: bool) -> Result<CycleOutcome, TaskError> {
        let name = self.policy.name();
        let busy = BusyFlag::acquire(&self.busy).ok_or(TaskError::Busy)?;
        let controller = self.controller.upgrade().ok_or(TaskError::ControllerGone)?;
        let generation = self.generation.load(Ordering::SeqCst);

        self.set_phase(PolicyPhase::Triggered);
        let settle = SettlePhase(self);
        let lease = controller.acquire(name, self.policy.priority())?;

        self.set_phase(PolicyPhase::Busy);
        info!(task = name, forced, paused = ?lease.paused(), "cycle started");

        let outcome = self.drive(&lease, generation, forced).await;

        self.state().last_outcome = Some(outcome.clone());
        drop(settle);
        info!(task = name, ?outcome, "cycle finished");

        drop(busy);
        controller.release(lease).await;
        Ok(outcome)
    }

    async fn drive(&self, lease: &ExclusiveLease, generation: u64, forced: bool) -> CycleOutcome {
        let name = self.policy.name();
        let settings = self.policy.settings();
        // A forced cycle drains everything instead of stopping at the threshold.
        let target = if forced { 1 } else { self.policy.threshold() };
        let before = self.policy.measure(&self.actor);
        let mut iterations = 0u32;
        let mut misses = 0u32;
        let mut streak: Option<Streak> = None;

        if let Err(err) = self.policy.approach(&self.actor).await {
            warn!(task = name, error = %err, "failed to reach work area");
        }

        loop {
            if let Some(reason) = self.abort_reason(lease, generation) {
                info!(task = name, ?reason, "cycle aborted");
                return CycleOutcome::Aborted { reason };
            }

            let measured = self.policy.measure(&self.actor);
            if measured < target {
                return CycleOutcome::Completed {
                    before,
                    after: measured,
                    iterations,
                };
            }

            if iterations >= settings.iteration_cap {
                let cooldown = self.arm_cooldown();
                warn!(task = name, iterations, ?cooldown, "iteration cap reached, backing off");
                return CycleOutcome::CapReached { cooldown };
            }
            iterations += 1;

            let Some(sink) = self.select_sink() else {
                misses += 1;
                debug!(task = name, misses, "no eligible sink");
                if misses >= settings.max_locate_misses {
                    self.state().memory.clear();
                    let cooldown = self.arm_cooldown();
                    warn!(task = name, misses, ?cooldown, "no sink left, backing off");
                    return CycleOutcome::Exhausted { cooldown };
                }
                self.actor.clock.sleep(settings.retry_delay).await;
                continue;
            };
            misses = 0;

            debug!(task = name, sink = %sink.key, measured, "attempting sink");
            let result = self.policy.attempt(&self.actor, &sink).await;
            let after = self.policy.measure(&self.actor);

            let failed = match result {
                Ok(report) if report.reported_full => {
                    info!(task = name, sink = %sink.key, "sink reported full");
                    self.mark_full(&sink.key, FullReason::ReportedFull);
                    streak = None;
                    continue;
                }
                Ok(report) if after < measured => {
                    debug!(task = name, sink = %sink.key, moved = report.moved, after, "progress");
                    streak = None;
                    continue;
                }
                Ok(_) => {
                    debug!(task = name, sink = %sink.key, "no progress");
                    false
                }
                Err(err) => {
                    warn!(task = name, sink = %sink.key, error = %err, "attempt failed");
                    true
                }
            };

            let current = match streak.take() {
                Some(previous) if previous.key == sink.key => Streak {
                    key: previous.key,
                    count: previous.count + 1,
                    all_errors: previous.all_errors && failed,
                },
                _ => Streak {
                    key: sink.key.clone(),
                    count: 1,
                    all_errors: failed,
                },
            };

            if current.count >= settings.no_progress_limit {
                let reason = if current.all_errors {
                    FullReason::TransferFailures
                } else {
                    FullReason::NoProgress
                };
                info!(task = name, sink = %sink.key, ?reason, "marking sink full");
                self.mark_full(&current.key, reason);
            } else {
                streak = Some(current);
            }

            self.actor.clock.sleep(settings.retry_delay).await;
        }
    }

    fn abort_reason(&self, lease: &ExclusiveLease, generation: u64) -> Option<AbortReason> {
        if self.generation.load(Ordering::SeqCst) != generation {
            Some(AbortReason::Stopped)
        } else if lease.is_preempted() {
            Some(AbortReason::Preempted)
        } else {
            None
        }
    }

    fn select_sink(&self) -> Option<Sink> {
        let candidates = self.policy.candidates(&self.actor);
        let now = self.actor.clock.now();
        let mut state = self.state();
        state.memory.purge_expired(now);
        candidates
            .into_iter()
            .find(|sink| !state.memory.is_full(&sink.key, now))
    }

    fn mark_full(&self, key: &SinkKey, reason: FullReason) {
        let now = self.actor.clock.now();
        self.state().memory.mark_full(key.clone(), reason, now);
    }

    fn arm_cooldown(&self) -> Duration {
        let now = self.actor.clock.now();
        let mut rng = rand::rng();
        self.state().cooldown.arm(now, &mut rng)
    }

    fn set_phase(&self, phase: PolicyPhase) {
        self.state().phase = phase;
    }

    fn settle_phase(&self) {
        let now = self.actor.clock.now();
        let mut state = self.state();
        state.phase = if state.cooldown.is_active(now) {
            PolicyPhase::Backoff
        } else {
            PolicyPhase::Idle
        };
    }
}

async fn monitor<P: ThresholdPolicy>(inner: Arc<TaskInner<P>>, generation: u64) {
    let interval = inner.policy.settings().check_interval;
    loop {
        let wake = inner.wake.notified();
        tokio::pin!(wake);
        wake.as_mut().enable();
        if !inner.is_current(generation) {
            break;
        }

        tokio::select! {
            _ = &mut wake => continue,
            _ = inner.actor.clock.sleep(interval) => {}
        }
        if !inner.is_current(generation) {
            break;
        }

        let outcome = inner.check_trigger().await;
        debug!(task = inner.policy.name(), ?outcome, "trigger check");
    }
    debug!(task = inner.policy.name(), "monitor exited");
}

/// A [`ThresholdPolicy`] run as an automation task.
pub struct ThresholdTask<P: ThresholdPolicy> {
    inner: Arc<TaskInner<P>>,
}

impl<P: ThresholdPolicy> ThresholdTask<P> {
    pub fn new(policy: P, actor: ActorContext, controller: Weak<AutomationController>) -> Self {
        let settings = policy.settings();
        let state = PolicyState {
            phase: PolicyPhase::Idle,
            memory: SinkMemory::new(settings.sink_ttl),
            cooldown: Cooldown::new(settings.cooldown_min, settings.cooldown_max),
            last_outcome: None,
        };

        Self {
            inner: Arc::new(TaskInner {
                policy,
                actor,
                controller,
                active: AtomicBool::new(false),
                busy: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                wake: Notify::new(),
                state: Mutex::new(state),
            }),
        }
    }

    pub fn policy(&self) -> &P {
        &self.inner.policy
    }

    /// Whether a cycle is running.
    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> PolicyPhase {
        self.inner.state().phase
    }

    /// Guard that passes while the task's busy flag equals `busy`.
    pub fn busy_guard(&self, busy: bool) -> Guard {
        let inner = Arc::downgrade(&self.inner);
        Guard::new(move || {
            inner
                .upgrade()
                .is_some_and(|inner| inner.busy.load(Ordering::SeqCst) == busy)
        })
    }

    /// Run one monitor check right now.
    pub async fn check_trigger(&self) -> TriggerOutcome {
        self.inner.check_trigger().await
    }

    /// Run a cycle regardless of the threshold and of any cooldown.
    pub async fn force_trigger(&self) -> Result<CycleOutcome, TaskError> {
        info!(task = self.inner.policy.name(), "forced trigger");
        self.inner.run_cycle(true).await
    }

    /// Forget full sinks and disarm the cooldown.
    pub fn reset_backoff(&self) {
        let mut state = self.inner.state();
        state.memory.clear();
        state.cooldown.clear();
        if state.phase == PolicyPhase::Backoff {
            state.phase = PolicyPhase::Idle;
        }
    }

    pub fn status(&self) -> PolicyStatus {
        let now = self.inner.actor.clock.now();
        let state = self.inner.state();
        let phase = match state.phase {
            PolicyPhase::Backoff if !state.cooldown.is_active(now) => PolicyPhase::Idle,
            phase => phase,
        };

        PolicyStatus {
            name: self.inner.policy.name().to_string(),
            active: self.inner.active.load(Ordering::SeqCst),
            busy: self.is_busy(),
            phase,
            cooldown_remaining: state.cooldown.remaining(now),
            full_sinks: state.memory.entries(now),
            last_outcome: state.last_outcome.clone(),
        }
    }
}

#[async_trait]
impl<P: ThresholdPolicy> AutomationTask for ThresholdTask<P> {
    fn name(&self) -> &str {
        self.inner.policy.name()
    }

    fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    async fn start(&self) -> Result<(), TaskError> {
        let handle = Handle::try_current().map_err(|_| TaskError::NoRuntime)?;
        if self.inner.active.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        handle.spawn(monitor(Arc::clone(&self.inner), generation));
        info!(task = self.inner.policy.name(), "task started");
        Ok(())
    }

    fn stop(&self) {
        self.inner.stop();
    }
}

impl<P: ThresholdPolicy> Drop for ThresholdTask<P> {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl<P: ThresholdPolicy> std::fmt::Debug for ThresholdTask<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdTask")
            .field("name", &self.inner.policy.name())
            .field("active", &self.is_active())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}
