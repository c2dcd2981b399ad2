//! Threshold-triggered policies and the framework that runs them.

mod cooldown;
mod deposit;
mod eat;
mod farm;
mod sink_memory;
mod threshold;

pub use cooldown::Cooldown;
pub use deposit::DepositPolicy;
pub use eat::EatPolicy;
pub use farm::FarmPolicy;
pub use sink_memory::{FullMark, FullReason, SinkMemory};
pub use threshold::{
    AbortReason, AttemptReport, CycleOutcome, PolicyPhase, PolicyStatus, ThresholdPolicy,
    ThresholdTask, TriggerOutcome,
};
