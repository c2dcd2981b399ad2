//! Keep the food level up.

use super::threshold::{AttemptReport, ThresholdPolicy};
use crate::actor::{ActorContext, CollaboratorError, Sink};
use crate::config::{EatConfig, PolicyConfig};
use crate::core::Priority;
use async_trait::async_trait;

/// Eats when food drops to the configured level.
///
/// The measured quantity is hunger (`max_food - food`), so the shared
/// "fire at or above threshold" rule reads as "eat at or below
/// `food_threshold`". Food stacks in the inventory are the sinks, tried in
/// preference order.
#[derive(Clone, Debug)]
pub struct EatPolicy {
    config: EatConfig,
}

impl EatPolicy {
    pub const NAME: &'static str = "eat";

    pub fn new(config: EatConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ThresholdPolicy for EatPolicy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> Priority {
        self.config.priority
    }

    fn settings(&self) -> &PolicyConfig {
        &self.config.policy
    }

    fn threshold(&self) -> u32 {
        self.config
            .max_food
            .saturating_sub(self.config.food_threshold)
    }

    fn measure(&self, actor: &ActorContext) -> u32 {
        self.config.max_food.saturating_sub(actor.vitals.food())
    }

    fn candidates(&self, actor: &ActorContext) -> Vec<Sink> {
        self.config
            .foods
            .iter()
            .filter(|food| actor.inventory.count(food) > 0)
            .map(Sink::item)
            .collect()
    }

    async fn attempt(
        &self,
        actor: &ActorContext,
        sink: &Sink,
    ) -> Result<AttemptReport, CollaboratorError> {
        actor.inventory.consume(&sink.label).await?;
        Ok(AttemptReport {
            moved: 1,
            reported_full: false,
        })
    }
}
