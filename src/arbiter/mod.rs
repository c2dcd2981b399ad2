//! The assembled arbiter: engine, controller, policy tasks and combat.
//!
//! [`Arbiter`] wires the pieces together and is the command surface an
//! application talks to. Each policy task gets a behavior of its own; the
//! engine moves from idle into that behavior while the task is busy and back
//! once it is done. Combat and user navigation take the actor over through
//! the controller's exclusive lease.

mod error;

pub use error::ArbiterError;

use crate::actor::{ActorContext, EntityId, Position};
use crate::builder::{EngineBuilder, TransitionBuilder};
use crate::combat::{CombatSession, CombatTask};
use crate::config::ArbiterConfig;
use crate::controller::{AutomationController, AutomationTask, TaskError};
use crate::core::{Behavior, BehaviorKind, Guard, HistoryEntry};
use crate::engine::{StateChange, StateMachineEngine};
use crate::policy::{CycleOutcome, DepositPolicy, EatPolicy, FarmPolicy, ThresholdTask};
use crate::snapshot::ArbiterSnapshot;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Behavior names of the assembled engine.
pub mod behaviors {
    pub const FARMING: &str = "farming";
    pub const DEPOSITING: &str = "depositing";
    pub const EATING: &str = "eating";
    pub const FIGHTING: &str = "fighting";
    pub const NAVIGATING: &str = "navigating";
}

/// Lease holder name of user-issued navigation.
const NAVIGATION: &str = "navigate";

/// How often navigation checks whether it has been preempted.
const PREEMPT_POLL: Duration = Duration::from_millis(100);

/// A complete behavior arbiter for one actor.
pub struct Arbiter {
    config: ArbiterConfig,
    actor: ActorContext,
    engine: Arc<StateMachineEngine>,
    controller: Arc<AutomationController>,
    deposit: Arc<ThresholdTask<DepositPolicy>>,
    farm: Arc<ThresholdTask<FarmPolicy>>,
    eat: Arc<ThresholdTask<EatPolicy>>,
    combat: Arc<CombatTask>,
}

impl Arbiter {
    /// Validate `config` and assemble an arbiter acting through `actor`.
    ///
    /// Nothing runs yet: start tasks with [`start_task`](Self::start_task)
    /// and the engine loop with [`spawn`](Self::spawn).
    pub fn new(config: ArbiterConfig, actor: ActorContext) -> Result<Self, ArbiterError> {
        let config = config.validated()?;

        let controller = Arc::new(AutomationController::new(Arc::clone(&actor.movement)));
        let deposit = Arc::new(ThresholdTask::new(
            DepositPolicy::new(config.deposit.clone()),
            actor.clone(),
            Arc::downgrade(&controller),
        ));
        let farm = Arc::new(ThresholdTask::new(
            FarmPolicy::new(config.farm.clone()),
            actor.clone(),
            Arc::downgrade(&controller),
        ));
        let eat = Arc::new(ThresholdTask::new(
            EatPolicy::new(config.eat.clone()),
            actor.clone(),
            Arc::downgrade(&controller),
        ));
        let combat = Arc::new(CombatTask::new(
            config.combat.clone(),
            actor.clone(),
            Arc::downgrade(&controller),
        ));

        controller.register(Arc::clone(&farm) as Arc<dyn AutomationTask>);
        controller.register(Arc::clone(&deposit) as Arc<dyn AutomationTask>);
        controller.register(Arc::clone(&eat) as Arc<dyn AutomationTask>);

        let idle = config.engine.idle_state.clone();
        let routes = [
            (
                behaviors::FARMING,
                BehaviorKind::Harvest,
                config.farm.priority,
                farm.busy_guard(true),
                farm.busy_guard(false),
            ),
            (
                behaviors::DEPOSITING,
                BehaviorKind::Deposit,
                config.deposit.priority,
                deposit.busy_guard(true),
                deposit.busy_guard(false),
            ),
            (
                behaviors::EATING,
                BehaviorKind::Feed,
                config.eat.priority,
                eat.busy_guard(true),
                eat.busy_guard(false),
            ),
            (
                behaviors::FIGHTING,
                BehaviorKind::Combat,
                config.combat.priority,
                engaged_guard(&combat, true),
                engaged_guard(&combat, false),
            ),
        ];

        let mut builder = EngineBuilder::new()
            .config(config.engine.clone())
            .clock(Arc::clone(&actor.clock))
            .behavior(Behavior::new(
                BehaviorKind::Navigate,
                behaviors::NAVIGATING,
                config.engine.navigation_priority,
            ));
        for (name, kind, priority, enter, leave) in routes {
            builder = builder
                .behavior(Behavior::new(kind, name, priority))
                .transition(
                    TransitionBuilder::new()
                        .from(idle.as_str())
                        .to(name)
                        .priority(priority)
                        .guard(enter),
                )?
                .transition(
                    TransitionBuilder::new()
                        .from(name)
                        .to(idle.as_str())
                        .priority(priority)
                        .guard(leave),
                )?;
        }
        let engine = Arc::new(builder.build()?);

        info!(idle = %idle, behaviors = engine.behaviors().len(), "arbiter assembled");
        Ok(Self {
            config,
            actor,
            engine,
            controller,
            deposit,
            farm,
            eat,
            combat,
        })
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<StateMachineEngine> {
        &self.engine
    }

    pub fn controller(&self) -> &Arc<AutomationController> {
        &self.controller
    }

    pub fn deposit(&self) -> &ThresholdTask<DepositPolicy> {
        &self.deposit
    }

    pub fn farm(&self) -> &ThresholdTask<FarmPolicy> {
        &self.farm
    }

    pub fn eat(&self) -> &ThresholdTask<EatPolicy> {
        &self.eat
    }

    pub fn combat(&self) -> &CombatTask {
        &self.combat
    }

    pub fn set_state(&self, name: &str, force: bool) -> Result<StateChange, ArbiterError> {
        Ok(self.engine.set_state(name, force)?)
    }

    pub fn state(&self) -> String {
        self.engine.state()
    }

    /// The `n` most recent transitions, oldest first.
    pub fn history(&self, n: usize) -> Vec<HistoryEntry> {
        self.engine.history(n)
    }

    /// Start a registered task or combat.
    pub async fn start_task(&self, name: &str) -> Result<(), ArbiterError> {
        if name == CombatTask::NAME {
            return Ok(self.combat.start().await?);
        }
        Ok(self.controller.start(name).await?)
    }

    pub fn stop_task(&self, name: &str) -> Result<(), ArbiterError> {
        if name == CombatTask::NAME {
            self.combat.stop();
            return Ok(());
        }
        Ok(self.controller.stop(name)?)
    }

    /// Stop every running task and remember them for [`resume_all`](Self::resume_all).
    pub fn pause_all(&self) -> Result<Vec<String>, ArbiterError> {
        Ok(self.controller.pause_all()?)
    }

    pub async fn resume_all(&self) -> Result<Vec<String>, ArbiterError> {
        Ok(self.controller.resume_all().await?)
    }

    /// Stop everything, combat included, and return to idle.
    pub fn stop_all(&self) -> Vec<String> {
        let mut stopped = self.controller.stop_all();
        if self.combat.is_active() {
            self.combat.stop();
            stopped.push(CombatTask::NAME.to_string());
        }

        let idle = self.engine.idle_state().to_string();
        if let Err(err) = self.engine.set_state(&idle, true) {
            warn!(error = %err, "could not return to idle");
        }
        stopped
    }

    /// Run a cycle of the named policy regardless of threshold and cooldown.
    pub async fn force_trigger(&self, name: &str) -> Result<CycleOutcome, ArbiterError> {
        let outcome = match name {
            DepositPolicy::NAME => self.deposit.force_trigger().await?,
            FarmPolicy::NAME => self.farm.force_trigger().await?,
            EatPolicy::NAME => self.eat.force_trigger().await?,
            _ => return Err(ArbiterError::UnknownTask(name.to_string())),
        };
        Ok(outcome)
    }

    /// Walk to `target` with exclusive control of the actor.
    ///
    /// Running tasks are paused for the duration and resumed afterwards. A
    /// higher-priority claim (combat) cuts the walk short.
    pub async fn navigate_to(&self, target: Position) -> Result<(), ArbiterError> {
        let lease = self
            .controller
            .acquire(NAVIGATION, self.config.engine.navigation_priority)?;
        self.engine.set_state(behaviors::NAVIGATING, true)?;
        let navigating = ReturnToIdle(self.engine.as_ref());
        info!(%target, "navigating on request");

        let walk = self.actor.navigate(
            target,
            self.config.engine.goto_tolerance,
            self.config.engine.goto_timeout,
        );
        let preempted = async {
            while !lease.is_preempted() {
                self.actor.clock.sleep(PREEMPT_POLL).await;
            }
        };
        let result = tokio::select! {
            result = walk => result.map_err(ArbiterError::from),
            _ = preempted => {
                self.actor.movement.stop();
                Err(ArbiterError::Preempted(NAVIGATION.to_string()))
            }
        };

        drop(navigating);
        self.controller.release(lease).await;
        result
    }

    /// The actor took damage.
    pub fn on_damaged(&self) -> u64 {
        self.combat.on_damaged()
    }

    /// The attacker of the pending damage event was identified.
    pub fn on_attacker_identified(&self, attacker: EntityId) -> bool {
        self.combat.on_attacker_identified(attacker)
    }

    pub fn combat_session(&self) -> Option<CombatSession> {
        self.combat.session()
    }

    pub fn snapshot(&self) -> ArbiterSnapshot {
        let mut snapshot = ArbiterSnapshot::new(self.engine.state(), self.actor.clock.wall());
        snapshot.history = self.engine.history(self.config.engine.max_history);
        snapshot.active_tasks = self.controller.active_tasks();
        if self.combat.is_active() {
            snapshot.active_tasks.push(CombatTask::NAME.to_string());
        }
        snapshot.paused_tasks = self.controller.paused_tasks();
        snapshot.exclusive_holder = self.controller.exclusive_holder();
        snapshot.policies = vec![self.farm.status(), self.deposit.status(), self.eat.status()];
        snapshot.combat = self.combat.session();
        snapshot
    }

    /// Run the engine loop on the current runtime.
    pub fn spawn(&self) -> Result<JoinHandle<()>, ArbiterError> {
        let handle = Handle::try_current().map_err(|_| TaskError::NoRuntime)?;
        let engine = Arc::clone(&self.engine);
        Ok(handle.spawn(async move { engine.run().await }))
    }

    /// Stop everything and end the engine loop.
    pub fn shutdown(&self) {
        self.stop_all();
        self.engine.shutdown();
        info!("arbiter shut down");
    }
}

impl std::fmt::Debug for Arbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arbiter")
            .field("state", &self.engine.state())
            .field("active", &self.controller.active_tasks())
            .field("engaged", &self.combat.is_engaged())
            .finish_non_exhaustive()
    }
}

/// Guard that passes while combat's engagement equals `engaged`.
fn engaged_guard(combat: &Arc<CombatTask>, engaged: bool) -> Guard {
    let combat = Arc::downgrade(combat);
    Guard::new(move || {
        combat
            .upgrade()
            .is_some_and(|combat| combat.is_engaged() == engaged)
    })
}


/// Forces the engine back to idle when dropped.
struct ReturnToIdle<'a>(&'a StateMachineEngine);

impl Drop for ReturnToIdle<'_> {
    fn drop(&mut self) {
        let idle = self.0.idle_state().to_string();
        if let Err(err) = self.0.set_state(&idle, true) {
            warn!(error = %err, "could not return to idle after navigating");
        }
    }
}
