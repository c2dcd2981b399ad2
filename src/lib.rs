//! Arbiter: behavior arbitration for an autonomous agent
//!
//! Arbiter decides what an actor does at any moment. It follows the "pure
//! core, imperative shell" split: behaviors, guards, transitions, history,
//! combat mode hysteresis and target selection are plain synchronous values
//! and functions, while the engine loop, the automation controller and the
//! task runners form a thin async shell on tokio.
//!
//! # Core Concepts
//!
//! - **Engine**: a priority-aware state machine over named behaviors, driven
//!   by guards and a bounded history
//! - **Controller**: pause, resume and stop of automation tasks, plus an
//!   exclusive lease that hands the actor to one task at a time
//! - **Policies**: threshold-triggered tasks (farm, deposit, eat) with
//!   full-sink memory and cooldown backoff
//! - **Combat**: target acquisition, melee/ranged hysteresis, retaliation and
//!   target retention
//!
//! # Example
//!
//! ```rust
//! use arbiter::builder::{EngineBuilder, TransitionBuilder};
//! use arbiter::core::{Behavior, BehaviorKind};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let hungry = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&hungry);
//!
//! let engine = EngineBuilder::new()
//!     .behavior(Behavior::new(BehaviorKind::Feed, "eating", 80))
//!     .transition(
//!         TransitionBuilder::new()
//!             .from("idle")
//!             .to("eating")
//!             .priority(80)
//!             .when(move || flag.load(Ordering::SeqCst)),
//!     )
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(engine.evaluate(), None);
//! hungry.store(true, Ordering::SeqCst);
//! assert_eq!(engine.evaluate().as_deref(), Some("eating"));
//! assert_eq!(engine.state(), "eating");
//! ```

pub mod actor;
pub mod arbiter;
pub mod builder;
pub mod clock;
pub mod combat;
pub mod config;
pub mod controller;
pub mod core;
pub mod engine;
pub mod policy;
pub mod snapshot;

// Re-export commonly used types
pub use crate::arbiter::{Arbiter, ArbiterError};
pub use crate::config::ArbiterConfig;
pub use crate::core::{Behavior, BehaviorKind, Guard, HistoryEntry, StateHistory, Transition};
pub use crate::engine::{StateChange, StateMachineEngine};
pub use crate::snapshot::ArbiterSnapshot;
