//! Error types for coordination failures.
//!
//! Only two things can go wrong inside this crate: a caller breaks the
//! hold/release contract of a component, or a component is constructed with a
//! configuration it cannot honor. Both indicate a bug in the calling worker and
//! are surfaced immediately rather than retried.
//!
//! A put or get that returns without transferring because the opposite role
//! has fully terminated is not an error; see [`crate::channel::Transfer`].

use crate::role::{RoleId, RoleKind};
use thiserror::Error;

/// Errors returned by the coordination components.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinationError {
    /// The exclusive resource was used or released by a role that does not hold it
    #[error("exclusive resource is not held by role {role} (holder: {holder:?})")]
    NotHeld {
        /// The role that made the call
        role: RoleId,
        /// The role that actually holds the resource, if any
        holder: Option<RoleId>,
    },

    /// A slot was released while it was already free
    #[error("slot {0} is not held")]
    SlotNotHeld(usize),

    /// A slot handle was released to a pool that did not issue it
    #[error("slot {slot} was issued by a different pool")]
    ForeignHandle {
        /// Id of the slot named by the handle
        slot: usize,
    },

    /// The device has no input channel with the given selector
    #[error("unknown input channel {selector} (device has {channels})")]
    UnknownSelector {
        /// The requested channel
        selector: usize,
        /// Number of channels on the device
        channels: usize,
    },

    /// More termination announcements than configured members of a role
    #[error("every {0} has already terminated")]
    RoleExhausted(RoleKind),

    /// A component was constructed with an unusable configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CoordinationError {
    /// Whether this error reports a broken hold/release contract.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            Self::NotHeld { .. }
                | Self::SlotNotHeld(_)
                | Self::ForeignHandle { .. }
                | Self::UnknownSelector { .. }
                | Self::RoleExhausted(_)
        )
    }
}

/// Result type for coordination operations.
pub type Result<T> = std::result::Result<T, CoordinationError>;
