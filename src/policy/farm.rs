//! Harvest mature crops.

use super::threshold::{AttemptReport, ThresholdPolicy};
use crate::actor::{ActorContext, BlockHit, BlockQuery, CollaboratorError, Position, Sink};
use crate::config::{FarmConfig, PolicyConfig};
use crate::core::Priority;
use async_trait::async_trait;

const MAX_CROPS: usize = 256;

/// Harvests once enough crops in the farm area are mature. Each crop is a
/// sink; a crop that survives repeated harvesting is skipped for a while.
#[derive(Clone, Debug)]
pub struct FarmPolicy {
    config: FarmConfig,
}

impl FarmPolicy {
    pub const NAME: &'static str = "farm";

    pub fn new(config: FarmConfig) -> Self {
        Self { config }
    }

    fn mature_crops(&self, actor: &ActorContext) -> Vec<BlockHit> {
        let center: Position = self
            .config
            .area
            .unwrap_or_else(|| actor.perception.self_position());
        actor.perception.find_blocks(&BlockQuery {
            kinds: self.config.crop_kinds.clone(),
            center,
            radius: self.config.radius,
            mature_only: true,
            max_results: MAX_CROPS,
        })
    }
}

#[async_trait]
impl ThresholdPolicy for FarmPolicy {
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
        self.config.threshold
    }

    fn measure(&self, actor: &ActorContext) -> u32 {
        u32::try_from(self.mature_crops(actor).len()).unwrap_or(u32::MAX)
    }

    async fn approach(&self, actor: &ActorContext) -> Result<(), CollaboratorError> {
        if let Some(area) = self.config.area {
            let policy = &self.config.policy;
            actor
                .navigate(area, self.config.radius, policy.goto_timeout)
                .await?;
        }
        Ok(())
    }

    fn candidates(&self, actor: &ActorContext) -> Vec<Sink> {
        let here = actor.perception.self_position();
        let mut crops = self.mature_crops(actor);
        crops.sort_by(|a, b| {
            here.distance_to(&a.position)
                .total_cmp(&here.distance_to(&b.position))
        });
        crops
            .into_iter()
            .map(|crop| Sink::at(crop.kind, crop.position))
            .collect()
    }

    async fn attempt(
        &self,
        actor: &ActorContext,
        sink: &Sink,
    ) -> Result<AttemptReport, CollaboratorError> {
        let position = sink
            .position
            .ok_or_else(|| CollaboratorError::Perception(format!("crop {} has no position", sink.key)))?;
        let policy = &self.config.policy;
        actor
            .navigate(position, policy.reach, policy.goto_timeout)
            .await?;
        actor.actuator.harvest(position).await?;

        Ok(AttemptReport {
            moved: 1,
            reported_full: false,
        })
    }
}
