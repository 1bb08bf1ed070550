//! Common types module for the stale-order sweeper.
//!
//! This module defines the data types shared by every sweeper crate: orders
//! and their statuses, the sweep settings with their validator, sweep results
//! and events, and the schema machinery used to validate implementation
//! configuration tables.

/// Sweep lifecycle events published on the engine's event bus.
pub mod events;
/// Orders, order statuses and the statuses a sweep may target.
pub mod order;
/// Registry trait for named, self-registering implementations.
pub mod registry;
/// Sweep settings and the validator that normalizes raw input.
pub mod settings;
/// Storage namespaces used by the key/value backends.
pub mod storage;
/// Per-status tallies and the aggregate result of a sweep.
pub mod sweep;
/// Configuration validation types for implementation tables.
pub mod validation;

pub use events::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use settings::*;
pub use storage::*;
pub use sweep::*;
pub use validation::*;
