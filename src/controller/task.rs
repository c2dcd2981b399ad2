//! The capability every automation loop exposes to the controller.

use super::error::TaskError;
use async_trait::async_trait;

/// A long-lived automation loop that can be paused and resumed.
///
/// `start` may await until the loop is running; `stop` must return promptly
/// and must not call back into the controller. Loops check their active flag
/// between steps rather than being suspended mid-operation.
#[async_trait]
pub trait AutomationTask: Send + Sync {
    fn name(&self) -> &str;

    fn is_active(&self) -> bool;

    async fn start(&self) -> Result<(), TaskError>;

    fn stop(&self);
}
