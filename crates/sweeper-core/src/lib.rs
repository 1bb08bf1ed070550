//! Core of the stale-order sweeper.
//!
//! This module provides the sweep engine that cancels stale unpaid orders, the
//! scheduler that runs it periodically and on demand without overlap, and the
//! builder that wires both up from configuration.

pub mod builder;
pub mod engine;
pub mod scheduler;

pub use builder::{BuilderError, SweeperBuilder, SweeperFactories};
pub use engine::{event_bus::EventBus, EngineError, SweepEngine, SweepOptions};
pub use scheduler::{SchedulerError, SweepScheduler};
