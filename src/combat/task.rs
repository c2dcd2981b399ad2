//! The combat loop.

use super::mode::{CombatMode, ModeSelector};
use super::retaliation::{Retaliation, RetaliationGate, RetaliationSink};
use super::target::{should_preempt, Candidate, TargetClass, TargetFilter};
use crate::actor::{ActorContext, Entity, EntityId, Position};
use crate::config::CombatConfig;
use crate::controller::{AutomationController, AutomationTask, ControllerError, ExclusiveLease, TaskError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The current engagement. Exists only while a target is engaged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombatSession {
    pub id: Uuid,
    pub target: Entity,
    pub class: TargetClass,
    pub mode: CombatMode,
    /// Distance at which the mode last changed
    pub last_mode_switch_distance: Option<f64>,
    pub started_at: DateTime<Utc>,
    /// Distance at the most recent tick
    pub distance: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisengageReason {
    /// The target is no longer visible
    TargetLost,
    OutOfRange,
    /// The target became excluded
    Excluded,
    /// The combat task was stopped
    Stopped,
    /// A higher priority claim asked for the actor
    Preempted,
}

/// Result of one combat tick.
#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// Nothing to fight
    Idle,
    /// A target exists but the actor could not be taken over
    Waiting { reason: String },
    Engaged {
        target: EntityId,
        mode: CombatMode,
        distance: f64,
    },
    Disengaged { reason: DisengageReason },
}

struct CombatInner {
    config: CombatConfig,
    actor: ActorContext,
    controller: Weak<AutomationController>,
    filter: TargetFilter,
    selector: ModeSelector,
    gate: RetaliationGate,
    active: AtomicBool,
    generation: AtomicU64,
    /// Generation of the most recently spawned loop
    running: AtomicU64,
    wake: Notify,
    session: Mutex<Option<CombatSession>>,
    lease: Mutex<Option<ExclusiveLease>>,
    challenger: Mutex<Option<Retaliation>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CombatInner {
    fn is_current(&self, generation: u64) -> bool {
        self.active.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    fn offer(&self, retaliation: Retaliation) {
        if !self.active.load(Ordering::SeqCst) {
            debug!(attacker = %retaliation.attacker.name, "combat inactive, retaliation dropped");
            return;
        }
        *lock(&self.challenger) = Some(retaliation);
        self.wake.notify_waiters();
    }

    fn retaliation_candidate(&self, origin: Position, retaliation: Retaliation) -> Option<Candidate> {
        let entity = self
            .actor
            .perception
            .entity(retaliation.attacker.id)
            .unwrap_or(retaliation.attacker);
        if self.filter.is_excluded(&entity) {
            debug!(attacker = %entity.name, "excluded attacker, not retaliating");
            return None;
        }
        Some(Candidate {
            class: TargetClass::of(&entity),
            distance: origin.distance_to(&entity.position),
            entity,
        })
    }

    /// The engaged target with fresh distance, or why it was dropped.
    fn refresh(&self, origin: Position) -> Result<Option<Candidate>, DisengageReason> {
        let Some((id, class)) = lock(&self.session)
            .as_ref()
            .map(|session| (session.target.id, session.class))
        else {
            return Ok(None);
        };

        let entity = self
            .actor
            .perception
            .entity(id)
            .ok_or(DisengageReason::TargetLost)?;
        if self.filter.is_excluded(&entity) {
            return Err(DisengageReason::Excluded);
        }
        let distance = origin.distance_to(&entity.position);
        if !self.filter.in_range(class, distance) {
            return Err(DisengageReason::OutOfRange);
        }
        Ok(Some(Candidate {
            entity,
            class,
            distance,
        }))
    }

    fn lease_preempted(&self) -> bool {
        lock(&self.lease)
            .as_ref()
            .is_some_and(|lease| lease.is_preempted())
    }

    async fn tick(&self) -> TickOutcome {
        if self.lease_preempted() {
            info!("yielding the actor to a higher priority claim");
            self.end_session(DisengageReason::Preempted).await;
            return TickOutcome::Disengaged {
                reason: DisengageReason::Preempted,
            };
        }

        let origin = self.actor.perception.self_position();

        let engaged = match self.refresh(origin) {
            Ok(engaged) => engaged,
            Err(reason) => {
                self.end_session(reason).await;
                return TickOutcome::Disengaged { reason };
            }
        };

        // A pending retaliation is held until the lease is granted.
        let retaliation = lock(&self.challenger).clone();
        let challenger = retaliation.and_then(|r| self.retaliation_candidate(origin, r));
        if challenger.is_none() {
            lock(&self.challenger).take();
        }
        let entities = self
            .actor
            .perception
            .entities_within(self.filter.scan_radius());
        let fresh = self.filter.acquire_target(origin, &entities);

        let target = match engaged {
            None => challenger.or(fresh),
            Some(current) => {
                let mut best = current;
                for candidate in [challenger, fresh].into_iter().flatten() {
                    if should_preempt(&best, &candidate) {
                        info!(
                            from = %best.entity.name,
                            to = %candidate.entity.name,
                            "switching target"
                        );
                        best = candidate;
                    }
                }
                Some(best)
            }
        };

        let Some(target) = target else {
            return TickOutcome::Idle;
        };

        if let Err(reason) = self.ensure_lease() {
            debug!(target = %target.entity.name, %reason, "waiting for exclusive control");
            return TickOutcome::Waiting { reason };
        }
        lock(&self.challenger).take();

        let mode = self.engage(&target).await;

        if mode == CombatMode::Melee && target.distance > self.config.melee_reach {
            if let Err(err) = self
                .actor
                .navigate(
                    target.entity.position,
                    self.config.melee_reach,
                    self.config.goto_timeout,
                )
                .await
            {
                debug!(target = %target.entity.name, error = %err, "could not close distance");
            }
        }

        if let Err(err) = self.actor.actuator.attack(&target.entity, mode).await {
            debug!(target = %target.entity.name, error = %err, "attack failed");
        }

        TickOutcome::Engaged {
            target: target.entity.id,
            mode,
            distance: target.distance,
        }
    }

    fn ensure_lease(&self) -> Result<(), String> {
        let mut lease = lock(&self.lease);
        if lease.is_some() {
            return Ok(());
        }
        let controller = self
            .controller
            .upgrade()
            .ok_or_else(|| TaskError::ControllerGone.to_string())?;

        match controller.acquire(CombatTask::NAME, self.config.priority) {
            Ok(granted) => {
                *lease = Some(granted);
                Ok(())
            }
            Err(err @ ControllerError::Held { .. }) | Err(err @ ControllerError::Busy) => {
                Err(err.to_string())
            }
            Err(err) => {
                warn!(error = %err, "unexpected controller error");
                Err(err.to_string())
            }
        }
    }

    /// Update or open the session for `target`; returns the mode to fight in.
    async fn engage(&self, target: &Candidate) -> CombatMode {
        let ranged = self.actor.actuator.has_ranged();
        let (mode, changed) = {
            let mut session = lock(&self.session);
            match session.as_mut() {
                Some(current) if current.target.id == target.entity.id => {
                    let next = self.selector.next(current.mode, target.distance, ranged);
                    let changed = next != current.mode;
                    if changed {
                        info!(
                            target = %target.entity.name,
                            from = ?current.mode,
                            to = ?next,
                            distance = target.distance,
                            "combat mode switch"
                        );
                        current.mode = next;
                        current.last_mode_switch_distance = Some(target.distance);
                    }
                    current.target = target.entity.clone();
                    current.distance = target.distance;
                    (next, changed)
                }
                _ => {
                    let mode = self.selector.initial(target.distance, ranged);
                    let opened = CombatSession {
                        id: Uuid::new_v4(),
                        target: target.entity.clone(),
                        class: target.class,
                        mode,
                        last_mode_switch_distance: None,
                        started_at: self.actor.clock.wall(),
                        distance: target.distance,
                    };
                    info!(
                        session = %opened.id,
                        target = %target.entity.name,
                        class = ?target.class,
                        ?mode,
                        "engaging"
                    );
                    *session = Some(opened);
                    (mode, true)
                }
            }
        };

        if changed {
            if let Err(err) = self.actor.actuator.equip(mode).await {
                warn!(?mode, error = %err, "failed to equip weapon");
            }
        }
        mode
    }

    async fn end_session(&self, reason: DisengageReason) {
        let ended = lock(&self.session).take();
        let lease = lock(&self.lease).take();

        if let Some(session) = &ended {
            info!(session = %session.id, target = %session.target.name, ?reason, "disengaged");
            self.actor.movement.stop();
        }

        if let Some(lease) = lease {
            match self.controller.upgrade() {
                Some(controller) => {
                    controller.release(lease).await;
                }
                None => debug!("controller gone, dropping lease"),
            }
        }
    }
}

async fn combat_loop(inner: Arc<CombatInner>, generation: u64) {
    loop {
        let wake = inner.wake.notified();
        tokio::pin!(wake);
        wake.as_mut().enable();
        if !inner.is_current(generation) {
            break;
        }

        tokio::select! {
            _ = &mut wake => {}
            _ = inner.actor.clock.sleep(inner.config.tick) => {}
        }
        if !inner.is_current(generation) {
            break;
        }

        let outcome = inner.tick().await;
        debug!(?outcome, "combat tick");
    }
    // A restarted task owns the session from here on.
    if inner.running.load(Ordering::SeqCst) == generation {
        inner.end_session(DisengageReason::Stopped).await;
    }
    debug!(generation, "combat loop exited");
}

/// Combat arbitration run as an automation task.
///
/// While engaged the task holds the controller's exclusive lease at combat
/// priority, which preempts any running policy cycle.
pub struct CombatTask {
    inner: Arc<CombatInner>,
}

impl CombatTask {
    pub const NAME: &'static str = "combat";

    pub fn new(
        config: CombatConfig,
        actor: ActorContext,
        controller: Weak<AutomationController>,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<CombatInner>| {
            let weak = weak.clone();
            let sink: RetaliationSink = Arc::new(move |retaliation: Retaliation| {
                if let Some(inner) = weak.upgrade() {
                    inner.offer(retaliation);
                }
            });
            let gate = RetaliationGate::new(
                config.retaliation_deadline,
                config.melee_reach,
                Arc::clone(&actor.perception),
                Arc::clone(&actor.clock),
                sink,
            );

            CombatInner {
                filter: TargetFilter::from_config(&config),
                selector: ModeSelector::from_config(&config),
                config,
                actor,
                controller,
                gate,
                active: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                running: AtomicU64::new(0),
                wake: Notify::new(),
                session: Mutex::new(None),
                lease: Mutex::new(None),
                challenger: Mutex::new(None),
            }
        });
        Self { inner }
    }

    /// Run one combat tick right now.
    pub async fn tick(&self) -> TickOutcome {
        self.inner.tick().await
    }

    pub fn session(&self) -> Option<CombatSession> {
        lock(&self.inner.session).clone()
    }

    pub fn is_engaged(&self) -> bool {
        lock(&self.inner.session).is_some()
    }

    /// The actor took damage.
    pub fn on_damaged(&self) -> u64 {
        self.inner.gate.on_damaged()
    }

    /// The attacker of the pending damage event was identified.
    pub fn on_attacker_identified(&self, attacker: EntityId) -> bool {
        self.inner.gate.on_attacker_identified(attacker)
    }

    pub fn gate(&self) -> &RetaliationGate {
        &self.inner.gate
    }

    /// End the current engagement and hand the actor back.
    pub async fn disengage(&self) {
        self.inner.end_session(DisengageReason::Stopped).await;
    }
}

#[async_trait]
impl AutomationTask for CombatTask {
    fn name(&self) -> &str {
        Self::NAME
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
        self.inner.running.store(generation, Ordering::SeqCst);
        handle.spawn(combat_loop(Arc::clone(&self.inner), generation));
        info!(task = Self::NAME, "task started");
        Ok(())
    }

    fn stop(&self) {
        let was_active = self.inner.active.swap(false, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.challenger).take();
        self.inner.wake.notify_waiters();
        if was_active {
            info!(task = Self::NAME, "task stopped");
        }
    }
}

impl Drop for CombatTask {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CombatTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatTask")
            .field("active", &self.is_active())
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}
