//! Melee/ranged selection with hysteresis.

use crate::config::CombatConfig;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatMode {
    Melee,
    Ranged,
}

/// Chooses the combat mode from the distance to the target.
///
/// Switching to ranged needs `distance > switch_distance + buffer`;
/// switching back needs `distance <= switch_distance`. Distances inside
/// `(switch_distance, switch_distance + buffer]` keep the current mode.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModeSelector {
    switch_distance: f64,
    buffer: f64,
}

impl ModeSelector {
    pub fn new(switch_distance: f64, buffer: f64) -> Self {
        Self {
            switch_distance,
            buffer,
        }
    }

    pub fn from_config(config: &CombatConfig) -> Self {
        Self::new(config.mode_switch_distance, config.hysteresis_buffer)
    }

    /// Mode for a fresh engagement.
    pub fn initial(&self, distance: f64, ranged_available: bool) -> CombatMode {
        self.next(CombatMode::Melee, distance, ranged_available)
    }

    pub fn next(&self, current: CombatMode, distance: f64, ranged_available: bool) -> CombatMode {
        match current {
            CombatMode::Melee if ranged_available && distance > self.switch_distance + self.buffer => {
                CombatMode::Ranged
            }
            CombatMode::Ranged if !ranged_available || distance <= self.switch_distance => {
                CombatMode::Melee
            }
            mode => mode,
        }
    }
}
