//! Low-level synchronization primitives the coordination components are built on.
//!
//! - [`Monitor`]: one mutex plus one condition, with wait statistics
//! - [`Latch`]: a flag that flips false to true exactly once
//! - [`Sequence`]: process-wide monotone id source

pub mod latch;
pub mod monitor;

pub use latch::{Latch, Sequence};
pub use monitor::{Monitor, MonitorGuard, MonitorStats, WakePolicy};
