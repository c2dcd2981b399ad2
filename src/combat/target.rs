//! Target eligibility, acquisition and retention.

use crate::actor::{Entity, EntityKind, Position};
use crate::config::CombatConfig;
use serde::{Deserialize, Serialize};

/// Threat class of a target. A closer target of a lower class never displaces a higher one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TargetClass {
    Creature,
    Actor,
}

impl TargetClass {
    pub fn of(entity: &Entity) -> Self {
        match entity.kind {
            EntityKind::Player => TargetClass::Actor,
            _ => TargetClass::Creature,
        }
    }
}

/// An eligible target with its distance at evaluation time.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub entity: Entity,
    pub class: TargetClass,
    pub distance: f64,
}

/// Which entities may be fought, and how far away.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetFilter {
    hostile_radius: f64,
    actor_radius: f64,
    hostile_actors: Vec<String>,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl TargetFilter {
    pub fn from_config(config: &CombatConfig) -> Self {
        Self {
            hostile_radius: config.hostile_radius,
            actor_radius: config.actor_radius,
            hostile_actors: config.hostile_actors.clone(),
            include: config.include.clone(),
            exclude: config.exclude.clone(),
        }
    }

    /// Radius to scan for candidates.
    pub fn scan_radius(&self) -> f64 {
        self.hostile_radius.max(self.actor_radius)
    }

    pub fn is_excluded(&self, entity: &Entity) -> bool {
        self.exclude.iter().any(|name| *name == entity.name)
    }

    /// Whether an engaged target of `class` at `distance` is still in range.
    pub fn in_range(&self, class: TargetClass, distance: f64) -> bool {
        match class {
            TargetClass::Creature => distance <= self.hostile_radius,
            TargetClass::Actor => distance <= self.actor_radius,
        }
    }

    /// Class of `entity` if it may be targeted at `distance`.
    ///
    /// Exclusion always wins. A non-empty include list is authoritative:
    /// only listed names qualify, regardless of kind, within the actor
    /// radius.
    pub fn eligible(&self, entity: &Entity, distance: f64) -> Option<TargetClass> {
        if self.is_excluded(entity) {
            return None;
        }

        if !self.include.is_empty() {
            let listed = self.include.iter().any(|name| *name == entity.name);
            return (listed && distance <= self.actor_radius).then(|| TargetClass::of(entity));
        }

        match entity.kind {
            EntityKind::Hostile if distance <= self.hostile_radius => Some(TargetClass::Creature),
            EntityKind::Player
                if distance <= self.actor_radius
                    && self.hostile_actors.iter().any(|name| *name == entity.name) =>
            {
                Some(TargetClass::Actor)
            }
            _ => None,
        }
    }

    /// Nearest eligible entity. Equal distances favour the higher class.
    pub fn acquire_target(&self, origin: Position, entities: &[Entity]) -> Option<Candidate> {
        entities
            .iter()
            .filter_map(|entity| {
                let distance = origin.distance_to(&entity.position);
                self.eligible(entity, distance).map(|class| Candidate {
                    entity: entity.clone(),
                    class,
                    distance,
                })
            })
            .min_by(|a, b| {
                a.distance
                    .total_cmp(&b.distance)
                    .then_with(|| b.class.cmp(&a.class))
            })
    }
}

/// Whether `challenger` should replace the engaged `current` target.
///
/// The challenger must be strictly closer and of the same or a higher class.
/// A lower class never wins, however close.
pub fn should_preempt(current: &Candidate, challenger: &Candidate) -> bool {
    challenger.entity.id != current.entity.id
        && challenger.class >= current.class
        && challenger.distance < current.distance
}
