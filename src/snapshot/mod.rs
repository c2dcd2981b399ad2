//! Point-in-time status reports of an arbiter.
//!
//! A snapshot captures what the arbiter is doing: the current behavior, the
//! recent transition history, which tasks run or are paused, who holds the
//! exclusive lease, and the status of every policy task and the combat
//! session. Snapshots are diagnostic; nothing is restored from them.

use crate::combat::CombatSession;
use crate::controller::LeaseInfo;
use crate::core::HistoryEntry;
use crate::policy::PolicyStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod error;

pub use error::SnapshotError;

/// Version identifier for the snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable status of an arbiter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArbiterSnapshot {
    /// Snapshot format version
    pub version: u32,

    /// Unique snapshot identifier
    pub id: Uuid,

    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,

    /// Name of the current behavior
    pub state: String,

    /// Recent transitions, oldest first
    pub history: Vec<HistoryEntry>,

    /// Tasks currently running
    pub active_tasks: Vec<String>,

    /// Tasks stopped by the most recent pause, in resume order
    pub paused_tasks: Vec<String>,

    pub exclusive_holder: Option<LeaseInfo>,

    pub policies: Vec<PolicyStatus>,

    /// The engagement in progress, if any
    pub combat: Option<CombatSession>,
}

impl ArbiterSnapshot {
    /// Start a snapshot of `state` taken at `taken_at`; the remaining fields
    /// are filled in by the caller.
    pub fn new(state: impl Into<String>, taken_at: DateTime<Utc>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id: Uuid::new_v4(),
            taken_at,
            state: state.into(),
            history: Vec::new(),
            active_tasks: Vec::new(),
            paused_tasks: Vec::new(),
            exclusive_holder: None,
            policies: Vec::new(),
            combat: None,
        }
    }

    /// Find the status of the policy task called `name`.
    pub fn policy(&self, name: &str) -> Option<&PolicyStatus> {
        self.policies.iter().find(|status| status.name == name)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        let found = value
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| SnapshotError::DeserializationFailed("missing version".to_string()))?;
        check_version(u32::try_from(found).unwrap_or(u32::MAX))?;

        serde_json::from_value(value).map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        // The version is the leading field, so it decodes on its own.
        let found: u32 = bincode::deserialize(bytes)
            .map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))?;
        check_version(found)?;

        bincode::deserialize(bytes).map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
    }
}

fn check_version(found: u32) -> Result<(), SnapshotError> {
    if found == SNAPSHOT_VERSION {
        Ok(())
    } else {
        Err(SnapshotError::UnsupportedVersion {
            found,
            supported: SNAPSHOT_VERSION,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Entity, EntityKind, Position, SinkKey};
    use crate::combat::{CombatMode, TargetClass};
    use crate::policy::{CycleOutcome, FullReason, PolicyPhase};
    use std::time::Duration;

    fn sample() -> ArbiterSnapshot {
        let now = Utc::now();
        let mut snapshot = ArbiterSnapshot::new("depositing", now);
        snapshot.history.push(HistoryEntry {
            state: "depositing".to_string(),
            from: "idle".to_string(),
            timestamp: now,
            forced: false,
        });
        snapshot.active_tasks = vec!["deposit".to_string()];
        snapshot.paused_tasks = vec!["farm".to_string(), "eat".to_string()];
        snapshot.exclusive_holder = Some(LeaseInfo {
            holder: "deposit".to_string(),
            priority: 60,
            preempted: false,
        });
        snapshot.policies.push(PolicyStatus {
            name: "deposit".to_string(),
            active: true,
            busy: true,
            phase: PolicyPhase::Busy,
            cooldown_remaining: Some(Duration::from_secs(42)),
            full_sinks: vec![(SinkKey("1,64,-3".to_string()), FullReason::NoProgress)],
            last_outcome: Some(CycleOutcome::Completed {
                before: 70,
                after: 0,
                iterations: 3,
            }),
        });
        snapshot.combat = Some(CombatSession {
            id: Uuid::new_v4(),
            target: Entity {
                id: 7,
                name: "zombie".to_string(),
                kind: EntityKind::Hostile,
                position: Position::new(3.0, 64.0, 0.0),
            },
            class: TargetClass::Creature,
            mode: CombatMode::Melee,
            last_mode_switch_distance: None,
            started_at: now,
            distance: 3.0,
        });
        snapshot
    }

    #[test]
    fn json_preserves_every_field() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"depositing\""));

        let restored = ArbiterSnapshot::from_json(&json).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn binary_preserves_every_field() {
        let snapshot = sample();
        let restored = ArbiterSnapshot::from_bytes(&snapshot.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn rejects_other_json_versions() {
        let mut snapshot = sample();
        snapshot.version = SNAPSHOT_VERSION + 1;
        let json = snapshot.to_json().unwrap();

        let result = ArbiterSnapshot::from_json(&json);
        assert!(matches!(
            result,
            Err(SnapshotError::UnsupportedVersion { found: 2, supported: 1 })
        ));
    }

    #[test]
    fn rejects_other_binary_versions() {
        let mut snapshot = sample();
        snapshot.version = 9;
        let bytes = snapshot.to_bytes().unwrap();

        assert!(matches!(
            ArbiterSnapshot::from_bytes(&bytes),
            Err(SnapshotError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn malformed_input_is_a_deserialization_error() {
        assert!(matches!(
            ArbiterSnapshot::from_json("{not json"),
            Err(SnapshotError::DeserializationFailed(_))
        ));
        assert!(matches!(
            ArbiterSnapshot::from_json("{\"state\": \"idle\"}"),
            Err(SnapshotError::DeserializationFailed(_))
        ));
        assert!(matches!(
            ArbiterSnapshot::from_bytes(&[1, 0]),
            Err(SnapshotError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn finds_policy_by_name() {
        let snapshot = sample();
        assert_eq!(snapshot.policy("deposit").map(|s| s.phase), Some(PolicyPhase::Busy));
        assert!(snapshot.policy("farm").is_none());
    }
}
