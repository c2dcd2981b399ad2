//! In-memory world shared by the integration tests.

#![allow(dead_code)]

use arbiter::actor::{
    ActorContext, Actuator, ActuatorError, BlockHit, BlockQuery, Entity, EntityId, EntityKind,
    GoalTracker, InventoryError, InventorySource, ItemStack, MovementController, MovementError,
    PerceptionSource, Position, Sink, SinkKey, TransferReport, VitalsSource,
};
use arbiter::clock::{Clock, TokioClock};
use arbiter::combat::CombatMode;
use arbiter::controller::{AutomationTask, TaskError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const ORIGIN: Position = Position::new(0.0, 64.0, 0.0);

/// How a container reacts to transfers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkBehavior {
    /// Takes everything offered
    Accept,
    /// Takes nothing but claims to have room
    Stuck,
    /// Takes nothing and reports no room
    Full,
    /// The transfer call fails
    Fail,
    /// Takes one item per transfer
    Trickle,
}

#[derive(Default)]
struct WorldState {
    position: Position,
    entities: Vec<Entity>,
    blocks: Vec<(BlockHit, bool)>,
    items: BTreeMap<String, u32>,
    sinks: HashMap<SinkKey, SinkBehavior>,
    transfers: Vec<SinkKey>,
    consumed: Vec<String>,
    harvested: Vec<Position>,
    attacks: Vec<(EntityId, CombatMode)>,
    equipped: Vec<CombatMode>,
}

/// A fake world implementing every collaborator trait.
pub struct FakeWorld {
    state: Mutex<WorldState>,
    goals: GoalTracker,
    moving: AtomicBool,
    stops: AtomicUsize,
    food: AtomicU32,
    ranged: AtomicBool,
    /// Time needed per block travelled
    pace: Duration,
}

impl FakeWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(WorldState {
                position: ORIGIN,
                ..WorldState::default()
            }),
            goals: GoalTracker::new(),
            moving: AtomicBool::new(false),
            stops: AtomicUsize::new(0),
            food: AtomicU32::new(20),
            ranged: AtomicBool::new(false),
            pace: Duration::from_millis(200),
        })
    }

    fn state(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap()
    }

    pub fn context(self: &Arc<Self>) -> ActorContext {
        self.context_with_clock(Arc::new(TokioClock))
    }

    pub fn context_with_clock(self: &Arc<Self>, clock: Arc<dyn Clock>) -> ActorContext {
        ActorContext {
            movement: self.clone(),
            perception: self.clone(),
            inventory: self.clone(),
            vitals: self.clone(),
            actuator: self.clone(),
            clock,
        }
    }

    pub fn give(&self, item: &str, count: u32) {
        *self.state().items.entry(item.to_string()).or_default() += count;
    }

    pub fn carried(&self, item: &str) -> u32 {
        self.state().items.get(item).copied().unwrap_or(0)
    }

    pub fn add_container(&self, kind: &str, position: Position, behavior: SinkBehavior) -> SinkKey {
        let key = position.block_key();
        let mut state = self.state();
        state.blocks.push((
            BlockHit {
                kind: kind.to_string(),
                position,
            },
            false,
        ));
        state.sinks.insert(key.clone(), behavior);
        key
    }

    pub fn set_sink_behavior(&self, key: &SinkKey, behavior: SinkBehavior) {
        self.state().sinks.insert(key.clone(), behavior);
    }

    pub fn add_crop(&self, kind: &str, position: Position, mature: bool) {
        self.state().blocks.push((
            BlockHit {
                kind: kind.to_string(),
                position,
            },
            mature,
        ));
    }

    pub fn spawn_entity(&self, id: EntityId, name: &str, kind: EntityKind, position: Position) {
        let mut state = self.state();
        state.entities.retain(|entity| entity.id != id);
        state.entities.push(Entity {
            id,
            name: name.to_string(),
            kind,
            position,
        });
    }

    pub fn move_entity(&self, id: EntityId, position: Position) {
        if let Some(entity) = self.state().entities.iter_mut().find(|e| e.id == id) {
            entity.position = position;
        }
    }

    pub fn despawn(&self, id: EntityId) {
        self.state().entities.retain(|entity| entity.id != id);
    }

    pub fn set_food(&self, food: u32) {
        self.food.store(food, Ordering::SeqCst);
    }

    pub fn set_ranged(&self, ranged: bool) {
        self.ranged.store(ranged, Ordering::SeqCst);
    }

    pub fn teleport(&self, position: Position) {
        self.state().position = position;
    }

    pub fn transfers(&self) -> Vec<SinkKey> {
        self.state().transfers.clone()
    }

    pub fn consumed(&self) -> Vec<String> {
        self.state().consumed.clone()
    }

    pub fn harvested(&self) -> Vec<Position> {
        self.state().harvested.clone()
    }

    pub fn attacks(&self) -> Vec<(EntityId, CombatMode)> {
        self.state().attacks.clone()
    }

    pub fn equipped(&self) -> Vec<CombatMode> {
        self.state().equipped.clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MovementController for FakeWorld {
    async fn goto(&self, target: Position, tolerance: f64) -> Result<(), MovementError> {
        let mut ticket = self.goals.begin();
        let distance = self.state().position.distance_to(&target);
        let travel = self.pace.mul_f64((distance - tolerance).max(0.0));
        self.moving.store(true, Ordering::SeqCst);

        let result = tokio::select! {
            _ = ticket.superseded() => Err(MovementError::Cancelled),
            _ = tokio::time::sleep(travel) => {
                self.state().position = target;
                Ok(())
            }
        };
        if ticket.is_current() {
            self.moving.store(false, Ordering::SeqCst);
        }
        result
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.goals.cancel();
        self.moving.store(false, Ordering::SeqCst);
    }

    fn is_moving(&self) -> bool {
        self.moving.load(Ordering::SeqCst)
    }
}

impl PerceptionSource for FakeWorld {
    fn self_position(&self) -> Position {
        self.state().position
    }

    fn entities_within(&self, radius: f64) -> Vec<Entity> {
        let state = self.state();
        state
            .entities
            .iter()
            .filter(|entity| state.position.distance_to(&entity.position) <= radius)
            .cloned()
            .collect()
    }

    fn entity(&self, id: EntityId) -> Option<Entity> {
        self.state().entities.iter().find(|e| e.id == id).cloned()
    }

    fn find_blocks(&self, query: &BlockQuery) -> Vec<BlockHit> {
        self.state()
            .blocks
            .iter()
            .filter(|(hit, mature)| {
                query.kinds.contains(&hit.kind)
                    && query.center.distance_to(&hit.position) <= query.radius
                    && (*mature || !query.mature_only)
            })
            .map(|(hit, _)| hit.clone())
            .take(query.max_results)
            .collect()
    }
}

#[async_trait]
impl InventorySource for FakeWorld {
    fn count(&self, item: &str) -> u32 {
        self.carried(item)
    }

    fn items(&self) -> Vec<ItemStack> {
        self.state()
            .items
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(kind, count)| ItemStack {
                kind: kind.clone(),
                count: *count,
            })
            .collect()
    }

    async fn transfer(
        &self,
        sink: &Sink,
        item: &str,
        amount: u32,
    ) -> Result<TransferReport, InventoryError> {
        let mut state = self.state();
        state.transfers.push(sink.key.clone());
        let behavior = state
            .sinks
            .get(&sink.key)
            .copied()
            .unwrap_or(SinkBehavior::Accept);
        match behavior {
            SinkBehavior::Accept => {
                let carried = state.items.entry(item.to_string()).or_default();
                let moved = amount.min(*carried);
                *carried -= moved;
                Ok(TransferReport {
                    moved,
                    free_slots: 10,
                    mergeable: true,
                })
            }
            SinkBehavior::Stuck => Ok(TransferReport {
                moved: 0,
                free_slots: 3,
                mergeable: false,
            }),
            SinkBehavior::Trickle => {
                let carried = state.items.entry(item.to_string()).or_default();
                let moved = amount.min(*carried).min(1);
                *carried -= moved;
                Ok(TransferReport {
                    moved,
                    free_slots: 10,
                    mergeable: true,
                })
            }
            SinkBehavior::Full => Ok(TransferReport::default()),
            SinkBehavior::Fail => Err(InventoryError::TransferFailed(sink.key.to_string())),
        }
    }

    async fn consume(&self, item: &str) -> Result<(), InventoryError> {
        {
            let mut state = self.state();
            let carried = state.items.entry(item.to_string()).or_default();
            if *carried == 0 {
                return Err(InventoryError::NotHeld(item.to_string()));
            }
            *carried -= 1;
            state.consumed.push(item.to_string());
        }
        let food = self.food.load(Ordering::SeqCst);
        self.food.store((food + 5).min(20), Ordering::SeqCst);
        Ok(())
    }
}

impl VitalsSource for FakeWorld {
    fn food(&self) -> u32 {
        self.food.load(Ordering::SeqCst)
    }

    fn health(&self) -> f32 {
        20.0
    }
}

#[async_trait]
impl Actuator for FakeWorld {
    fn has_ranged(&self) -> bool {
        self.ranged.load(Ordering::SeqCst)
    }

    async fn equip(&self, mode: CombatMode) -> Result<(), ActuatorError> {
        self.state().equipped.push(mode);
        Ok(())
    }

    async fn attack(&self, target: &Entity, mode: CombatMode) -> Result<(), ActuatorError> {
        self.state().attacks.push((target.id, mode));
        Ok(())
    }

    async fn harvest(&self, position: Position) -> Result<(), ActuatorError> {
        let mut state = self.state();
        let before = state.blocks.len();
        state
            .blocks
            .retain(|(hit, mature)| !(*mature && hit.position == position));
        if state.blocks.len() == before {
            return Err(ActuatorError::OutOfReach);
        }
        state.harvested.push(position);
        Ok(())
    }
}

/// Shared log of task starts and stops.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: String) {
        self.0.lock().unwrap().push(event);
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Automation task that only records being started and stopped.
pub struct FakeTask {
    name: String,
    active: AtomicBool,
    log: EventLog,
    fail_start: AtomicBool,
}

impl FakeTask {
    pub fn new(name: &str, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            active: AtomicBool::new(false),
            log: log.clone(),
            fail_start: AtomicBool::new(false),
        })
    }

    pub fn fail_next_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AutomationTask for FakeTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    async fn start(&self) -> Result<(), TaskError> {
        if self.fail_start.swap(false, Ordering::SeqCst) {
            return Err(TaskError::Failed(format!("{} refused to start", self.name)));
        }
        self.active.store(true, Ordering::SeqCst);
        self.log.push(format!("start {}", self.name));
        Ok(())
    }

    fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.log.push(format!("stop {}", self.name));
        }
    }
}

pub fn at(x: f64, z: f64) -> Position {
    Position::new(x, 64.0, z)
}
