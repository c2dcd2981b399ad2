//! Automation controller: pause, resume and exclusive control of the actor.

mod automation;
mod error;
mod lease;
mod task;

pub use automation::AutomationController;
pub use error::{ControllerError, TaskError};
pub use lease::{ExclusiveLease, LeaseInfo};
pub use task::AutomationTask;
