//! Validation-based configuration checks.
//!
//! Uses Stillwater's `Validation` to accumulate ALL violations instead of
//! stopping at the first one, so a broken configuration is reported in a
//! single pass.

use super::{ArbiterConfig, CombatConfig, PolicyConfig};
use std::time::Duration;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

type Check = Validation<(), NonEmptyVec<ConfigViolation>>;

/// A single configuration problem.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigViolation {
    #[error("{field} must be greater than zero")]
    Zero { field: String },

    #[error("{field} must be positive (got {value})")]
    NonPositive { field: String, value: f64 },

    #[error("{field} must list at least one entry")]
    Empty { field: String },

    #[error("{field}: minimum ({min:?}) exceeds maximum ({max:?})")]
    InvertedRange {
        field: String,
        min: Duration,
        max: Duration,
    },

    #[error("{field} ({value}) must not be smaller than {other} ({other_value})")]
    Smaller {
        field: String,
        value: f64,
        other: String,
        other_value: f64,
    },

    #[error("eat.food_threshold ({threshold}) must be below eat.max_food ({max})")]
    FoodThreshold { threshold: u32, max: u32 },
}

/// Errors produced while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", describe(.violations))]
    Invalid { violations: Vec<ConfigViolation> },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

fn describe(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ArbiterConfig {
    /// Check every section, accumulating ALL violations.
    pub fn validate(&self) -> Check {
        let mut checks = vec![
            not_empty("engine.idle_state", self.engine.idle_state.is_empty()),
            nonzero_duration("engine.tick", self.engine.tick),
            nonzero("engine.max_history", self.engine.max_history as u64),
            positive("engine.goto_tolerance", self.engine.goto_tolerance),
            nonzero_duration("engine.goto_timeout", self.engine.goto_timeout),
            nonzero("deposit.threshold", u64::from(self.deposit.threshold)),
            not_empty("deposit.items", self.deposit.items.is_empty()),
            not_empty("deposit.container_kinds", self.deposit.container_kinds.is_empty()),
            positive("deposit.search_radius", self.deposit.search_radius),
            nonzero("farm.threshold", u64::from(self.farm.threshold)),
            not_empty("farm.crop_kinds", self.farm.crop_kinds.is_empty()),
            positive("farm.radius", self.farm.radius),
            not_empty("eat.foods", self.eat.foods.is_empty()),
            food_threshold(self.eat.food_threshold, self.eat.max_food),
        ];
        checks.extend(policy_checks("deposit.policy", &self.deposit.policy));
        checks.extend(policy_checks("farm.policy", &self.farm.policy));
        checks.extend(policy_checks("eat.policy", &self.eat.policy));
        checks.extend(combat_checks(&self.combat));

        Validation::all_vec(checks).map(|_| ())
    }

    /// Consume the configuration, returning it only if it is valid.
    pub fn validated(self) -> Result<Self, ConfigError> {
        match self.validate() {
            Validation::Success(()) => Ok(self),
            Validation::Failure(violations) => Err(ConfigError::Invalid {
                violations: violations.iter().cloned().collect(),
            }),
        }
    }
}

fn policy_checks(section: &str, policy: &PolicyConfig) -> Vec<Check> {
    let field = |name: &str| format!("{section}.{name}");
    vec![
        nonzero_duration(&field("check_interval"), policy.check_interval),
        nonzero(&field("max_locate_misses"), u64::from(policy.max_locate_misses)),
        nonzero(&field("no_progress_limit"), u64::from(policy.no_progress_limit)),
        nonzero(&field("iteration_cap"), u64::from(policy.iteration_cap)),
        nonzero_duration(&field("goto_timeout"), policy.goto_timeout),
        positive(&field("reach"), policy.reach),
        ordered_range(&field("cooldown"), policy.cooldown_min, policy.cooldown_max),
    ]
}

fn combat_checks(combat: &CombatConfig) -> Vec<Check> {
    let mut checks = vec![
        positive("combat.hostile_radius", combat.hostile_radius),
        positive("combat.actor_radius", combat.actor_radius),
        positive("combat.mode_switch_distance", combat.mode_switch_distance),
        positive("combat.melee_reach", combat.melee_reach),
        nonzero_duration("combat.retaliation_deadline", combat.retaliation_deadline),
        nonzero_duration("combat.tick", combat.tick),
        nonzero_duration("combat.goto_timeout", combat.goto_timeout),
    ];
    checks.push(if combat.hysteresis_buffer < 0.0 {
        Validation::fail(ConfigViolation::NonPositive {
            field: "combat.hysteresis_buffer".to_string(),
            value: combat.hysteresis_buffer,
        })
    } else {
        Validation::success(())
    });
    checks.push(if combat.actor_radius < combat.hostile_radius {
        Validation::fail(ConfigViolation::Smaller {
            field: "combat.actor_radius".to_string(),
            value: combat.actor_radius,
            other: "combat.hostile_radius".to_string(),
            other_value: combat.hostile_radius,
        })
    } else {
        Validation::success(())
    });
    checks
}

fn nonzero(field: &str, value: u64) -> Check {
    if value == 0 {
        Validation::fail(ConfigViolation::Zero {
            field: field.to_string(),
        })
    } else {
        Validation::success(())
    }
}

fn nonzero_duration(field: &str, value: Duration) -> Check {
    if value.is_zero() {
        Validation::fail(ConfigViolation::Zero {
            field: field.to_string(),
        })
    } else {
        Validation::success(())
    }
}

fn positive(field: &str, value: f64) -> Check {
    if value > 0.0 && value.is_finite() {
        Validation::success(())
    } else {
        Validation::fail(ConfigViolation::NonPositive {
            field: field.to_string(),
            value,
        })
    }
}

fn not_empty(field: &str, empty: bool) -> Check {
    if empty {
        Validation::fail(ConfigViolation::Empty {
            field: field.to_string(),
        })
    } else {
        Validation::success(())
    }
}

fn ordered_range(field: &str, min: Duration, max: Duration) -> Check {
    if min > max {
        Validation::fail(ConfigViolation::InvertedRange {
            field: field.to_string(),
            min,
            max,
        })
    } else {
        Validation::success(())
    }
}

fn food_threshold(threshold: u32, max: u32) -> Check {
    if threshold >= max {
        Validation::fail(ConfigViolation::FoodThreshold { threshold, max })
    } else {
        Validation::success(())
    }
}
