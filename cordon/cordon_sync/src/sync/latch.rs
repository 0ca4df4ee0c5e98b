//! Latched flags and id sequences.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A flag that transitions from unset to set exactly once and never reverts.
///
/// Reads are lock-free. Components that pair a latch with a [`Monitor`] set
/// it while holding the monitor lock, so waiters re-checking their predicate
/// under the lock always observe it.
///
/// [`Monitor`]: crate::sync::Monitor
#[derive(Debug, Default)]
pub struct Latch {
    flag: AtomicBool,
}

impl Latch {
    /// Create an unset latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latch.
    ///
    /// Returns true only for the call that performed the transition.
    pub fn latch(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    /// Whether the latch has been set.
    pub fn is_latched(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A sequence number that can be safely incremented across threads.
#[derive(Debug)]
pub struct Sequence {
    value: AtomicU64,
}

impl Sequence {
    /// Create a sequence starting from `start`.
    pub const fn new(start: u64) -> Self {
        Self {
            value: AtomicU64::new(start),
        }
    }

    /// Get the next sequence number.
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst)
    }
}
