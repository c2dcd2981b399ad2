//! Plain values exchanged with the collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in the actor's world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance.
    pub fn distance_to(&self, other: &Position) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Block-aligned key, stable for every point inside the same block.
    pub fn block_key(&self) -> SinkKey {
        SinkKey(format!(
            "{},{},{}",
            self.x.floor() as i64,
            self.y.floor() as i64,
            self.z.floor() as i64
        ))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1}, {:.1})", self.x, self.y, self.z)
    }
}

pub type EntityId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Another controllable actor (a player)
    Player,
    /// A hostile creature
    Hostile,
    Passive,
    Other,
}

/// Something the perception layer can see.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub position: Position,
}

/// Identity of a sink, used as the key of the full-sink memory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SinkKey(pub String);

impl fmt::Display for SinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything a policy drains its measured quantity into: a container for
/// deposits, a crop for harvesting, a food stack for eating.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sink {
    pub key: SinkKey,
    pub label: String,
    pub position: Option<Position>,
}

impl Sink {
    /// A sink located in the world, keyed by its block.
    pub fn at(label: impl Into<String>, position: Position) -> Self {
        Self {
            key: position.block_key(),
            label: label.into(),
            position: Some(position),
        }
    }

    /// A sink that lives in the actor's inventory.
    pub fn item(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            key: SinkKey(format!("item:{kind}")),
            label: kind,
            position: None,
        }
    }
}

/// Block search issued to the perception layer.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockQuery {
    pub kinds: Vec<String>,
    pub center: Position,
    pub radius: f64,
    /// Only report fully grown crops
    pub mature_only: bool,
    pub max_results: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockHit {
    pub kind: String,
    pub position: Position,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: String,
    pub count: u32,
}

/// What a container reported after a transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Items the container accepted
    pub moved: u32,
    /// Empty slots left in the container
    pub free_slots: u32,
    /// Whether a partial stack of the item could still be topped up
    pub mergeable: bool,
}

impl TransferReport {
    /// The container has no room at all for the item.
    pub fn is_full(&self) -> bool {
        self.moved == 0 && self.free_slots == 0 && !self.mergeable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn block_key_floors_coordinates() {
        let a = Position::new(10.2, 64.9, -3.1);
        let b = Position::new(10.8, 64.0, -3.9);
        assert_eq!(a.block_key(), b.block_key());
        assert_eq!(a.block_key().to_string(), "10,64,-4");
    }

    #[test]
    fn item_sink_is_keyed_by_kind() {
        let sink = Sink::item("bread");
        assert_eq!(sink.key, SinkKey("item:bread".to_string()));
        assert!(sink.position.is_none());
    }

    #[test]
    fn transfer_report_full_detection() {
        let full = TransferReport {
            moved: 0,
            free_slots: 0,
            mergeable: false,
        };
        assert!(full.is_full());

        let mergeable = TransferReport {
            mergeable: true,
            ..full
        };
        assert!(!mergeable.is_full());
    }
}
