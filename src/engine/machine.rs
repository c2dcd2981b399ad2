//! The behavior arbitration state machine.

use super::error::EngineError;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::core::{
    panic_message, Behavior, BehaviorKind, BehaviorRegistry, Guard, HistoryEntry, Priority,
    StateHistory, Transition, TransitionContext, TransitionTable,
};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Outcome of a successful [`StateMachineEngine::set_state`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateChange {
    /// The requested behavior was already current
    Unchanged,
    /// The current behavior changed
    Applied { from: String, to: String },
}

struct EngineState {
    registry: BehaviorRegistry,
    transitions: TransitionTable,
    current: String,
    history: StateHistory,
}

/// Priority-aware finite state machine over named behaviors.
///
/// Exactly one behavior is current at a time. Transitions are applied only
/// from the current behavior and only while one of their guards passes,
/// unless forced. Guards and hooks are evaluated without the internal lock
/// held, so they may call back into read-only engine methods.
pub struct StateMachineEngine {
    state: Mutex<EngineState>,
    idle: String,
    tick: Duration,
    clock: Arc<dyn Clock>,
    shutdown: Notify,
}

impl StateMachineEngine {
    /// Create an engine whose current behavior is the configured idle state.
    pub fn new(config: &EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let mut registry = BehaviorRegistry::new();
        registry.register(Behavior::new(BehaviorKind::Idle, config.idle_state.clone(), 0));

        Self {
            state: Mutex::new(EngineState {
                registry,
                transitions: TransitionTable::new(),
                current: config.idle_state.clone(),
                history: StateHistory::new(config.max_history),
            }),
            idle: config.idle_state.clone(),
            tick: config.tick,
            clock,
            shutdown: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a behavior; re-registering a name replaces it.
    pub fn register_behavior(&self, behavior: Behavior) {
        let name = behavior.name().to_string();
        if self.lock().registry.register(behavior).is_some() {
            debug!(behavior = %name, "behavior replaced");
        } else {
            debug!(behavior = %name, "behavior registered");
        }
    }

    /// Add a guarded edge between two registered behaviors.
    pub fn create_transition(
        &self,
        from: &str,
        to: &str,
        guard: Guard,
        priority: Priority,
    ) -> Result<(), EngineError> {
        self.add_transition(Transition::new(from, to, priority, guard))
    }

    /// Add a pre-built edge. Both endpoints must be registered.
    pub fn add_transition(&self, transition: Transition) -> Result<(), EngineError> {
        let mut state = self.lock();
        let missing = [&transition.from, &transition.to]
            .into_iter()
            .find(|name| !state.registry.contains(name));

        if let Some(missing) = missing {
            let err = EngineError::UnknownEndpoint {
                from: transition.from.clone(),
                to: transition.to.clone(),
                missing: missing.clone(),
            };
            warn!(error = %err, "transition rejected");
            return Err(err);
        }

        debug!(
            from = %transition.from,
            to = %transition.to,
            priority = transition.priority,
            "transition created"
        );
        state.transitions.add(transition);
        Ok(())
    }

    /// Request the current behavior to become `name`.
    ///
    /// An unregistered `name` is registered as a no-op placeholder first.
    /// Without `force`, an edge `current → name` whose guard passes right now
    /// is required.
    pub fn set_state(&self, name: &str, force: bool) -> Result<StateChange, EngineError> {
        let (from, edges) = {
            let mut state = self.lock();
            if !state.registry.contains(name) {
                warn!(behavior = name, "unknown behavior, registering placeholder");
                state.registry.register(Behavior::placeholder(name));
            }
            if state.current == name {
                return Ok(StateChange::Unchanged);
            }
            let from = state.current.clone();
            let edges = state.transitions.between(&from, name);
            (from, edges)
        };

        if !force {
            if edges.is_empty() {
                return Err(EngineError::NoTransition {
                    from,
                    to: name.to_string(),
                });
            }
            if !edges.iter().any(|edge| edge.guard.check()) {
                debug!(from = %from, to = name, "guards rejected transition");
                return Err(EngineError::GuardRejected {
                    from,
                    to: name.to_string(),
                });
            }
        }

        self.apply(&from, name, force)
    }

    /// One background tick.
    ///
    /// From the idle behavior every outgoing edge is considered, highest
    /// priority first. From any other behavior only its edges back to idle
    /// are considered. Returns the behavior that became current, if any.
    pub fn evaluate(&self) -> Option<String> {
        let (current, edges) = {
            let state = self.lock();
            let current = state.current.clone();
            let edges = if current == self.idle {
                state.transitions.outgoing(&current)
            } else {
                state.transitions.between(&current, &self.idle)
            };
            (current, edges)
        };

        let edge = edges.into_iter().find(|edge| edge.can_execute(&current))?;
        match self.apply(&edge.from, &edge.to, false) {
            Ok(_) => Some(edge.to),
            Err(err) => {
                debug!(error = %err, "discarding stale evaluation");
                None
            }
        }
    }

    fn apply(&self, from: &str, to: &str, forced: bool) -> Result<StateChange, EngineError> {
        let (exiting, entering) = {
            let mut state = self.lock();
            if state.current != from {
                return Err(EngineError::StaleTransition {
                    expected: from.to_string(),
                    actual: state.current.clone(),
                });
            }

            state.current = to.to_string();
            let timestamp = self.clock.wall();
            state.history.record(HistoryEntry {
                state: to.to_string(),
                from: from.to_string(),
                timestamp,
                forced,
            });

            (
                state.registry.get(from).cloned(),
                state.registry.get(to).cloned(),
            )
        };

        info!(from, to, forced, "behavior transition");

        let ctx = TransitionContext { from, to, forced };
        if let Some(behavior) = exiting {
            run_hook(&behavior, "exit", || behavior.hooks().on_exit(&ctx));
        }
        if let Some(behavior) = entering {
            run_hook(&behavior, "enter", || behavior.hooks().on_enter(&ctx));
        }

        Ok(StateChange::Applied {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Name of the current behavior.
    pub fn state(&self) -> String {
        self.lock().current.clone()
    }

    /// The current behavior value.
    pub fn current_behavior(&self) -> Option<Behavior> {
        let state = self.lock();
        state.registry.get(&state.current).cloned()
    }

    pub fn idle_state(&self) -> &str {
        &self.idle
    }

    /// Whether `name` is registered.
    pub fn has_behavior(&self, name: &str) -> bool {
        self.lock().registry.contains(name)
    }

    /// Look a behavior up by name.
    pub fn behavior(&self, name: &str) -> Option<Behavior> {
        self.lock().registry.get(name).cloned()
    }

    /// Registered behavior names, in registration order.
    pub fn behaviors(&self) -> Vec<String> {
        self.lock().registry.names()
    }

    pub fn transition_count(&self) -> usize {
        self.lock().transitions.len()
    }

    /// Up to `n` most recent history entries, most recent last.
    pub fn history(&self, n: usize) -> Vec<HistoryEntry> {
        self.lock().history.recent(n)
    }

    /// A copy of the full retained history.
    pub fn history_snapshot(&self) -> StateHistory {
        self.lock().history.clone()
    }

    /// Evaluate guards every tick until [`shutdown`](Self::shutdown) is called.
    pub async fn run(&self) {
        info!(tick = ?self.tick, idle = %self.idle, "engine loop started");
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => break,
                _ = self.clock.sleep(self.tick) => {
                    self.evaluate();
                }
            }
        }
        info!("engine loop stopped");
    }

    /// Stop the [`run`](Self::run) loop. A shutdown issued before the loop
    /// starts is remembered.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

impl std::fmt::Debug for StateMachineEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachineEngine")
            .field("current", &self.state())
            .field("idle", &self.idle)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

fn run_hook(behavior: &Behavior, phase: &str, hook: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(hook)) {
        error!(
            behavior = behavior.name(),
            phase,
            panic = %panic_message(payload.as_ref()),
            "behavior hook panicked"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::core::BehaviorHooks;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn engine() -> StateMachineEngine {
        StateMachineEngine::new(&EngineConfig::default(), Arc::new(ManualClock::new()))
    }

    fn with_behaviors(names: &[(&str, Priority)]) -> StateMachineEngine {
        let engine = engine();
        for (name, priority) in names {
            engine.register_behavior(Behavior::new(BehaviorKind::Custom, *name, *priority));
        }
        engine
    }

    fn flag(value: bool) -> (Arc<AtomicBool>, Guard) {
        let flag = Arc::new(AtomicBool::new(value));
        let reader = Arc::clone(&flag);
        (flag, Guard::new(move || reader.load(Ordering::SeqCst)))
    }

    #[derive(Default)]
    struct Recorder {
        entered: AtomicUsize,
        exited: AtomicUsize,
    }

    impl BehaviorHooks for Recorder {
        fn on_enter(&self, _ctx: &TransitionContext<'_>) {
            self.entered.fetch_add(1, Ordering::SeqCst);
        }

        fn on_exit(&self, _ctx: &TransitionContext<'_>) {
            self.exited.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn starts_in_idle_with_empty_history() {
        let engine = engine();
        assert_eq!(engine.state(), "idle");
        assert!(engine.history(10).is_empty());
        assert_eq!(
            engine.current_behavior().map(|b| b.kind()),
            Some(BehaviorKind::Idle)
        );
    }

    #[test]
    fn guarded_transition_applies() {
        let engine = with_behaviors(&[("farming", 40)]);
        engine
            .create_transition("idle", "farming", Guard::always(), 40)
            .unwrap();

        let change = engine.set_state("farming", false).unwrap();
        assert_eq!(
            change,
            StateChange::Applied {
                from: "idle".to_string(),
                to: "farming".to_string()
            }
        );
        assert_eq!(engine.state(), "farming");

        let history = engine.history(5);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, "idle");
        assert!(!history[0].forced);
    }

    #[test]
    fn rejected_guard_leaves_state() {
        let engine = with_behaviors(&[("farming", 40)]);
        engine
            .create_transition("idle", "farming", Guard::new(|| false), 40)
            .unwrap();

        let err = engine.set_state("farming", false).unwrap_err();
        assert!(matches!(err, EngineError::GuardRejected { .. }));
        assert_eq!(engine.state(), "idle");
        assert!(engine.history(5).is_empty());
    }

    #[test]
    fn missing_edge_is_reported() {
        let engine = with_behaviors(&[("farming", 40)]);
        let err = engine.set_state("farming", false).unwrap_err();
        assert_eq!(
            err,
            EngineError::NoTransition {
                from: "idle".to_string(),
                to: "farming".to_string()
            }
        );
    }

    #[test]
    fn any_passing_parallel_edge_suffices() {
        let engine = with_behaviors(&[("eating", 80)]);
        engine
            .create_transition("idle", "eating", Guard::new(|| false), 90)
            .unwrap();
        engine
            .create_transition("idle", "eating", Guard::always(), 10)
            .unwrap();

        assert!(engine.set_state("eating", false).is_ok());
    }

    #[test]
    fn same_state_is_unchanged_without_hooks() {
        let engine = engine();
        let hooks = Arc::new(Recorder::default());
        engine.register_behavior(
            Behavior::new(BehaviorKind::Idle, "idle", 0).with_hooks(hooks.clone()),
        );

        assert_eq!(engine.set_state("idle", true).unwrap(), StateChange::Unchanged);
        assert_eq!(hooks.entered.load(Ordering::SeqCst), 0);
        assert!(engine.history(5).is_empty());
    }

    #[test]
    fn forced_transition_fires_hooks() {
        let engine = engine();
        let hooks = Arc::new(Recorder::default());
        engine.register_behavior(
            Behavior::new(BehaviorKind::Combat, "fighting", 100).with_hooks(hooks.clone()),
        );

        engine.set_state("fighting", true).unwrap();
        assert_eq!(hooks.entered.load(Ordering::SeqCst), 1);

        engine.set_state("idle", true).unwrap();
        assert_eq!(hooks.exited.load(Ordering::SeqCst), 1);
        assert!(engine.history(5).iter().all(|entry| entry.forced));
    }

    #[test]
    fn unknown_target_registers_placeholder() {
        let engine = engine();

        let err = engine.set_state("fihgting", false).unwrap_err();
        assert!(matches!(err, EngineError::NoTransition { .. }));
        assert_eq!(
            engine.behavior("fihgting").map(|b| b.kind()),
            Some(BehaviorKind::Placeholder)
        );

        engine.set_state("fihgting", true).unwrap();
        assert_eq!(engine.state(), "fihgting");
    }

    #[test]
    fn transition_with_unknown_endpoint_is_rejected() {
        let engine = engine();
        let err = engine
            .create_transition("idle", "nowhere", Guard::always(), 1)
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::UnknownEndpoint {
                from: "idle".to_string(),
                to: "nowhere".to_string(),
                missing: "nowhere".to_string()
            }
        );
        assert_eq!(engine.transition_count(), 0);
    }

    #[test]
    fn evaluate_prefers_higher_priority() {
        let engine = with_behaviors(&[("farming", 40), ("eating", 80)]);
        engine
            .create_transition("idle", "farming", Guard::always(), 40)
            .unwrap();
        engine
            .create_transition("idle", "eating", Guard::always(), 80)
            .unwrap();

        assert_eq!(engine.evaluate(), Some("eating".to_string()));
    }

    #[test]
    fn evaluate_ties_use_creation_order() {
        let engine = with_behaviors(&[("farming", 40), ("depositing", 40)]);
        engine
            .create_transition("idle", "depositing", Guard::always(), 40)
            .unwrap();
        engine
            .create_transition("idle", "farming", Guard::always(), 40)
            .unwrap();

        assert_eq!(engine.evaluate(), Some("depositing".to_string()));
    }

    #[test]
    fn evaluate_never_preempts_non_idle_state() {
        let engine = with_behaviors(&[("farming", 40), ("fighting", 100)]);
        let busy = Arc::new(AtomicBool::new(true));
        let reader = Arc::clone(&busy);
        engine
            .create_transition("farming", "fighting", Guard::always(), 100)
            .unwrap();
        engine
            .create_transition("farming", "idle", Guard::new(move || !reader.load(Ordering::SeqCst)), 0)
            .unwrap();

        engine.set_state("farming", true).unwrap();
        assert_eq!(engine.evaluate(), None);
        assert_eq!(engine.state(), "farming");

        busy.store(false, Ordering::SeqCst);
        assert_eq!(engine.evaluate(), Some("idle".to_string()));
    }

    #[test]
    fn guard_may_read_engine_state() {
        let engine = Arc::new(with_behaviors(&[("farming", 40)]));
        let reader = Arc::clone(&engine);
        engine
            .create_transition("idle", "farming", Guard::new(move || reader.state() == "idle"), 40)
            .unwrap();

        assert!(engine.set_state("farming", false).is_ok());
    }

    #[test]
    fn panicking_hook_does_not_abort_transition() {
        struct Exploding;
        impl BehaviorHooks for Exploding {
            fn on_enter(&self, _ctx: &TransitionContext<'_>) {
                panic!("hook exploded");
            }
        }

        let engine = engine();
        engine.register_behavior(
            Behavior::new(BehaviorKind::Custom, "fragile", 1).with_hooks(Arc::new(Exploding)),
        );

        engine.set_state("fragile", true).unwrap();
        assert_eq!(engine.state(), "fragile");
    }

    #[test]
    fn history_is_bounded() {
        let config = EngineConfig {
            max_history: 3,
            ..EngineConfig::default()
        };
        let engine = StateMachineEngine::new(&config, Arc::new(ManualClock::new()));
        engine.register_behavior(Behavior::new(BehaviorKind::Custom, "busy", 1));

        for _ in 0..5 {
            engine.set_state("busy", true).unwrap();
            engine.set_state("idle", true).unwrap();
        }

        let history = engine.history(100);
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].state, "idle");
        assert_eq!(engine.history(2).len(), 2);
    }

    #[tokio::test]
    async fn run_ticks_on_clock_until_shutdown() {
        let clock = Arc::new(ManualClock::new());
        let engine = Arc::new(StateMachineEngine::new(&EngineConfig::default(), clock.clone()));
        engine.register_behavior(Behavior::new(BehaviorKind::Harvest, "farming", 40));
        let (wanted, guard) = flag(false);
        engine.create_transition("idle", "farming", guard, 40).unwrap();

        let runner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run().await })
        };

        tokio::task::yield_now().await;
        wanted.store(true, Ordering::SeqCst);
        clock.advance(Duration::from_secs(1));
        tokio::task::yield_now().await;
        assert_eq!(engine.state(), "idle");

        clock.advance(Duration::from_secs(1));
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(engine.state(), "farming");

        engine.shutdown();
        runner.await.unwrap();
    }
}
