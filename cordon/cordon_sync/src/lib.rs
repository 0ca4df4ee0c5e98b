#![deny(warnings)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Cordon Sync
//!
//! Blocking coordination primitives for a fixed population of worker threads
//! sharing scarce, stateful resources.
//!
//! This crate provides:
//!
//! - An exclusive device that at most one worker holds at a time
//! - A fixed-capacity pool of interchangeable slots
//! - A bounded producer/consumer channel with a role-termination protocol
//! - The monitor, latch and role-identity primitives the above are built from
//!
//! Every component guards its state with exactly one mutex and one condition
//! variable. No operation takes two component locks at once, so the components
//! compose freely when a worker calls them one after another.

/// Bounded producer/consumer channel with shutdown liveness
pub mod channel;

/// Construction-time configuration
pub mod config;

/// Error types for coordination failures
pub mod error;

/// Single exclusive device arbitration
pub mod exclusive;

/// Fixed-capacity pool of interchangeable slots
pub mod pool;

/// Logical worker identity used to label operations
pub mod role;

/// Monitor, latch and sequence primitives
pub mod sync;

pub use channel::{BoundedChannel, ChannelConfig, Transfer};
pub use config::CoordinatorConfig;
pub use error::{CoordinationError, Result};
pub use exclusive::{ExclusiveResource, InputChannels, SampleSource};
pub use pool::{ResourcePool, SlotHandle};
pub use role::{RoleId, RoleKind, RoleRegistry};
pub use sync::{Latch, Monitor, MonitorStats, WakePolicy};
