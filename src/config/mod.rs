//! Arbiter configuration.
//!
//! Every section has defaults matching the documented constants, so an empty
//! JSON object is a valid configuration. Durations are written as integer
//! milliseconds. Reading the configuration from disk is left to the
//! application; [`ArbiterConfig::from_json_str`] parses an already loaded
//! document.

mod validate;

pub use validate::{ConfigError, ConfigViolation};

use crate::actor::Position;
use crate::core::{Priority, DEFAULT_MAX_HISTORY};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    pub engine: EngineConfig,
    pub deposit: DepositConfig,
    pub farm: FarmConfig,
    pub eat: EatConfig,
    pub combat: CombatConfig,
}

impl ArbiterConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validated()
    }
}

/// State machine engine settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the neutral behavior
    pub idle_state: String,
    /// Interval of background guard evaluation
    #[serde(with = "millis")]
    pub tick: Duration,
    pub max_history: usize,
    /// Exclusivity priority of user-issued navigation
    pub navigation_priority: Priority,
    pub goto_tolerance: f64,
    #[serde(with = "millis")]
    pub goto_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_state: "idle".to_string(),
            tick: Duration::from_secs(2),
            max_history: DEFAULT_MAX_HISTORY,
            navigation_priority: 90,
            goto_tolerance: 1.5,
            goto_timeout: Duration::from_secs(60),
        }
    }
}

/// Shared knobs of every threshold-triggered policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Interval of the idle trigger check
    #[serde(with = "millis")]
    pub check_interval: Duration,
    /// Pause after an iteration that made no progress
    #[serde(with = "millis")]
    pub retry_delay: Duration,
    /// Consecutive "no eligible sink" outcomes before backing off
    pub max_locate_misses: u32,
    /// Consecutive no-progress attempts before a sink is marked full
    pub no_progress_limit: u32,
    #[serde(with = "millis")]
    pub sink_ttl: Duration,
    #[serde(with = "millis")]
    pub cooldown_min: Duration,
    #[serde(with = "millis")]
    pub cooldown_max: Duration,
    /// Upper bound on iterations of one cycle
    pub iteration_cap: u32,
    #[serde(with = "millis")]
    pub goto_timeout: Duration,
    /// Distance from which a sink can be used
    pub reach: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            retry_delay: Duration::from_millis(500),
            max_locate_misses: 3,
            no_progress_limit: 2,
            sink_ttl: Duration::from_secs(10 * 60),
            cooldown_min: Duration::from_secs(5 * 60),
            cooldown_max: Duration::from_secs(10 * 60),
            iteration_cap: 64,
            goto_timeout: Duration::from_secs(30),
            reach: 3.0,
        }
    }
}

/// Deposit policy: unload carried resources into containers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositConfig {
    /// Carried count at which a deposit cycle starts
    pub threshold: u32,
    /// Item kinds that are deposited and counted
    pub items: Vec<String>,
    /// Block kinds accepted as containers
    pub container_kinds: Vec<String>,
    /// Where the containers are; the actor's position when unset
    pub area: Option<Position>,
    pub search_radius: f64,
    pub priority: Priority,
    pub policy: PolicyConfig,
}

impl Default for DepositConfig {
    fn default() -> Self {
        Self {
            threshold: 64,
            items: strings(&["wheat", "carrot", "potato", "beetroot"]),
            container_kinds: strings(&["chest", "barrel"]),
            area: None,
            search_radius: 16.0,
            priority: 60,
            policy: PolicyConfig::default(),
        }
    }
}

/// Farm policy: harvest mature crops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmConfig {
    /// Mature crops in the area at which a harvest cycle starts
    pub threshold: u32,
    pub crop_kinds: Vec<String>,
    pub area: Option<Position>,
    pub radius: f64,
    pub priority: Priority,
    pub policy: PolicyConfig,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            threshold: 4,
            crop_kinds: strings(&["wheat", "carrots", "potatoes", "beetroots"]),
            area: None,
            radius: 24.0,
            priority: 40,
            policy: PolicyConfig::default(),
        }
    }
}

/// Eat policy: keep the food level up.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EatConfig {
    /// Eating starts once food is at or below this level
    pub food_threshold: u32,
    pub max_food: u32,
    /// Food kinds, most preferred first
    pub foods: Vec<String>,
    pub priority: Priority,
    pub policy: PolicyConfig,
}

impl Default for EatConfig {
    fn default() -> Self {
        Self {
            food_threshold: 14,
            max_food: 20,
            foods: strings(&["cooked_beef", "bread", "baked_potato", "carrot"]),
            priority: 80,
            policy: PolicyConfig {
                check_interval: Duration::from_secs(3),
                ..PolicyConfig::default()
            },
        }
    }
}

/// Combat arbitration settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Search radius for hostile creatures
    pub hostile_radius: f64,
    /// Search radius for hostile actors
    pub actor_radius: f64,
    /// Actors treated as hostile
    pub hostile_actors: Vec<String>,
    /// When non-empty, the only eligible targets
    pub include: Vec<String>,
    /// Never targeted
    pub exclude: Vec<String>,
    /// Boundary distance between melee and ranged
    pub mode_switch_distance: f64,
    pub hysteresis_buffer: f64,
    pub melee_reach: f64,
    #[serde(with = "millis")]
    pub retaliation_deadline: Duration,
    #[serde(with = "millis")]
    pub tick: Duration,
    #[serde(with = "millis")]
    pub goto_timeout: Duration,
    pub priority: Priority,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            hostile_radius: 16.0,
            actor_radius: 32.0,
            hostile_actors: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            mode_switch_distance: 6.0,
            hysteresis_buffer: 2.0,
            melee_reach: 3.0,
            retaliation_deadline: Duration::from_millis(150),
            tick: Duration::from_millis(250),
            goto_timeout: Duration::from_secs(5),
            priority: 100,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// `Duration` as integer milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
