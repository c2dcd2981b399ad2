//! Unload carried resources into nearby containers.

use super::threshold::{AttemptReport, ThresholdPolicy};
use crate::actor::{ActorContext, BlockQuery, CollaboratorError, Position, Sink};
use crate::config::{DepositConfig, PolicyConfig};
use crate::core::Priority;
use async_trait::async_trait;
use tracing::debug;

const MAX_CONTAINERS: usize = 32;

/// Deposits every configured item kind once the carried total reaches the
/// threshold.
#[derive(Clone, Debug)]
pub struct DepositPolicy {
    config: DepositConfig,
}

impl DepositPolicy {
    pub const NAME: &'static str = "deposit";

    pub fn new(config: DepositConfig) -> Self {
        Self { config }
    }

    fn center(&self, actor: &ActorContext) -> Position {
        self.config
            .area
            .unwrap_or_else(|| actor.perception.self_position())
    }
}

#[async_trait]
impl ThresholdPolicy for DepositPolicy {
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
        self.config
            .items
            .iter()
            .map(|item| actor.inventory.count(item))
            .sum()
    }

    async fn approach(&self, actor: &ActorContext) -> Result<(), CollaboratorError> {
        let Some(area) = self.config.area else {
            return Ok(());
        };
        let policy = &self.config.policy;
        actor
            .navigate(area, self.config.search_radius, policy.goto_timeout)
            .await?;
        Ok(())
    }

    fn candidates(&self, actor: &ActorContext) -> Vec<Sink> {
        let query = BlockQuery {
            kinds: self.config.container_kinds.clone(),
            center: self.center(actor),
            radius: self.config.search_radius,
            mature_only: false,
            max_results: MAX_CONTAINERS,
        };
        let here = actor.perception.self_position();
        let mut hits = actor.perception.find_blocks(&query);
        hits.sort_by(|a, b| {
            here.distance_to(&a.position)
                .total_cmp(&here.distance_to(&b.position))
        });
        hits.into_iter()
            .map(|hit| Sink::at(hit.kind, hit.position))
            .collect()
    }

    async fn attempt(
        &self,
        actor: &ActorContext,
        sink: &Sink,
    ) -> Result<AttemptReport, CollaboratorError> {
        let position = sink
            .position
            .ok_or_else(|| CollaboratorError::Perception(format!("container {} has no position", sink.key)))?;
        let policy = &self.config.policy;
        actor
            .navigate(position, policy.reach, policy.goto_timeout)
            .await?;

        let mut report = AttemptReport::default();
        for item in &self.config.items {
            let carried = actor.inventory.count(item);
            if carried == 0 {
                continue;
            }

            let transfer = actor.inventory.transfer(sink, item, carried).await?;
            debug!(sink = %sink.key, item = %item, moved = transfer.moved, "deposited");
            report.moved += transfer.moved;
            if transfer.is_full() {
                report.reported_full = true;
                break;
            }
        }
        Ok(report)
    }
}
