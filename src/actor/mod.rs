//! The controlled actor, seen through its collaborators.
//!
//! There is no global actor: every component receives an [`ActorContext`] at
//! construction, so several independent arbiters can coexist and tests can
//! plug in fakes.

mod error;
mod goal;
mod traits;
mod types;

pub use error::{ActuatorError, CollaboratorError, InventoryError, MovementError};
pub use goal::{GoalTicket, GoalTracker};
pub use traits::{Actuator, InventorySource, MovementController, PerceptionSource, VitalsSource};
pub use types::{
    BlockHit, BlockQuery, Entity, EntityId, EntityKind, ItemStack, Position, Sink, SinkKey,
    TransferReport,
};

use crate::clock::{self, Clock};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Everything a component needs to act on the world.
#[derive(Clone)]
pub struct ActorContext {
    pub movement: Arc<dyn MovementController>,
    pub perception: Arc<dyn PerceptionSource>,
    pub inventory: Arc<dyn InventorySource>,
    pub vitals: Arc<dyn VitalsSource>,
    pub actuator: Arc<dyn Actuator>,
    pub clock: Arc<dyn Clock>,
}

impl ActorContext {
    /// Walk to `target`, bounded by `limit`.
    ///
    /// Already being within `tolerance` is an immediate success. On timeout the
    /// in-flight goal is cancelled so the movement resource is left idle.
    pub async fn navigate(
        &self,
        target: Position,
        tolerance: f64,
        limit: Duration,
    ) -> Result<(), MovementError> {
        let here = self.perception.self_position();
        if here.distance_to(&target) <= tolerance {
            return Ok(());
        }

        debug!(%target, tolerance, "navigating");
        match clock::with_timeout(
            self.clock.as_ref(),
            limit,
            self.movement.goto(target, tolerance),
        )
        .await
        {
            Some(result) => result,
            None => {
                self.movement.stop();
                Err(MovementError::Timeout(limit))
            }
        }
    }
}

impl std::fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("position", &self.perception.self_position())
            .field("moving", &self.movement.is_moving())
            .finish_non_exhaustive()
    }
}
