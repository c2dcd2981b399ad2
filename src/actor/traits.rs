//! Interfaces the arbitration core consumes.
//!
//! These are implemented outside the crate (pathfinding, world scanning,
//! inventory I/O). Tests implement them with in-memory fakes.

use super::error::{ActuatorError, InventoryError, MovementError};
use super::types::{BlockHit, BlockQuery, Entity, EntityId, ItemStack, Position, Sink, TransferReport};
use crate::combat::CombatMode;
use async_trait::async_trait;

/// Shared movement resource of the actor.
///
/// Issuing a new goal, or calling [`stop`](MovementController::stop), must make
/// any caller still awaiting a previous goal fail fast with
/// [`MovementError::Cancelled`]. See [`GoalTracker`](super::GoalTracker).
#[async_trait]
pub trait MovementController: Send + Sync {
    /// Walk to within `tolerance` of `target`.
    async fn goto(&self, target: Position, tolerance: f64) -> Result<(), MovementError>;

    /// Cancel the in-flight goal, if any.
    fn stop(&self);

    fn is_moving(&self) -> bool;
}

/// World and entity scanning.
pub trait PerceptionSource: Send + Sync {
    fn self_position(&self) -> Position;

    /// Every visible entity within `radius` of the actor, the actor excluded.
    fn entities_within(&self, radius: f64) -> Vec<Entity>;

    /// Look an entity up by id.
    fn entity(&self, id: EntityId) -> Option<Entity>;

    fn find_blocks(&self, query: &BlockQuery) -> Vec<BlockHit>;

    /// Nearest entity within `radius` accepted by `predicate`.
    fn find_nearest(&self, predicate: &dyn Fn(&Entity) -> bool, radius: f64) -> Option<Entity> {
        let origin = self.self_position();
        self.entities_within(radius)
            .into_iter()
            .filter(|entity| predicate(entity))
            .min_by(|a, b| {
                origin
                    .distance_to(&a.position)
                    .total_cmp(&origin.distance_to(&b.position))
            })
    }
}

/// Carried items and container transfers.
#[async_trait]
pub trait InventorySource: Send + Sync {
    fn count(&self, item: &str) -> u32;

    fn items(&self) -> Vec<ItemStack>;

    /// Move up to `amount` of `item` into `sink`.
    async fn transfer(
        &self,
        sink: &Sink,
        item: &str,
        amount: u32,
    ) -> Result<TransferReport, InventoryError>;

    /// Eat or otherwise use one `item`.
    async fn consume(&self, item: &str) -> Result<(), InventoryError>;
}

/// Actor vitals.
pub trait VitalsSource: Send + Sync {
    fn food(&self) -> u32;

    fn health(&self) -> f32;
}

/// Physical actions of the actor.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Whether a ranged weapon (and ammunition) is available.
    fn has_ranged(&self) -> bool;

    async fn equip(&self, mode: CombatMode) -> Result<(), ActuatorError>;

    async fn attack(&self, target: &Entity, mode: CombatMode) -> Result<(), ActuatorError>;

    async fn harvest(&self, position: Position) -> Result<(), ActuatorError>;
}
