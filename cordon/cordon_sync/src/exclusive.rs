//! Arbitration of a single exclusive device.
//!
//! An [`ExclusiveResource`] wraps one device that at most one role may hold at
//! a time. Acquiring blocks until the device is free; releasing marks it free
//! and wakes the waiters, which re-check and re-block if another waiter won.
//!
//! The device itself is a [`SampleSource`]: a bank of input channels read
//! while the device is held.

use crate::error::{CoordinationError, Result};
use crate::role::RoleId;
use crate::sync::{Monitor, MonitorStats, WakePolicy};
use log::debug;

/// A device with numbered input channels that can be sampled.
pub trait SampleSource: Send + Sync {
    /// Number of input channels on the device
    fn channel_count(&self) -> usize;

    /// Sample channel `selector`, or `None` if the device has no such channel
    fn sample(&self, selector: usize) -> Option<f64>;
}

/// A bank of input channels with fixed raw values.
///
/// Sampling a channel returns twice its raw value.
#[derive(Debug, Clone, PartialEq)]
pub struct InputChannels {
    raw: Vec<i64>,
}

impl InputChannels {
    /// Create `count` channels where channel `i` carries raw value `i`.
    pub fn new(count: usize) -> Self {
        Self {
            raw: (0..count as i64).collect(),
        }
    }

    /// Create channels with explicit raw values.
    pub fn from_values(raw: Vec<i64>) -> Self {
        Self { raw }
    }
}

impl SampleSource for InputChannels {
    fn channel_count(&self) -> usize {
        self.raw.len()
    }

    fn sample(&self, selector: usize) -> Option<f64> {
        self.raw.get(selector).map(|value| *value as f64 * 2.0)
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    holder: Option<RoleId>,
    selected: usize,
}

/// A device that at most one role holds at any instant.
pub struct ExclusiveResource<S: SampleSource = InputChannels> {
    state: Monitor<DeviceState>,
    source: S,
    wake_policy: WakePolicy,
}

impl<S: SampleSource> ExclusiveResource<S> {
    /// Create a free resource around `source`, waking all waiters on release.
    pub fn new(source: S) -> Self {
        Self::with_wake_policy(source, WakePolicy::All)
    }

    /// Create a free resource with an explicit release wake policy.
    ///
    /// Every waiter waits on the same predicate, so [`WakePolicy::One`] is
    /// sufficient here.
    pub fn with_wake_policy(source: S, wake_policy: WakePolicy) -> Self {
        Self {
            state: Monitor::with_name(DeviceState::default(), "exclusive"),
            source,
            wake_policy,
        }
    }

    /// Block until the resource is free, then hold it as `role`.
    ///
    /// The role's own number becomes the selected input channel for
    /// [`ExclusiveResource::sample`].
    pub fn acquire(&self, role: RoleId) {
        let mut state = self.state.lock();
        debug!("Role {} requested the device", role);

        if state.holder.is_some() {
            debug!("Role {} is about to be suspended until the device is free", role);
        }
        state.wait_while(|s| s.holder.is_some());

        state.holder = Some(role);
        state.selected = role.index().unwrap_or(usize::MAX);
        debug!("Role {} locked the device", role);
    }

    /// Hold the resource as `role` if it is free right now.
    pub fn try_acquire(&self, role: RoleId) -> bool {
        let mut state = self.state.lock();
        if state.holder.is_some() {
            return false;
        }

        state.holder = Some(role);
        state.selected = role.index().unwrap_or(usize::MAX);
        debug!("Role {} locked the device (try_acquire)", role);
        true
    }

    /// Sample input channel `selector`. The caller must hold the resource.
    pub fn read(&self, role: RoleId, selector: usize) -> Result<f64> {
        let state = self.state.lock();
        Self::check_holder(state.holder, role)?;
        self.sample_channel(role, selector)
    }

    /// Sample the channel selected when `role` acquired the resource.
    pub fn sample(&self, role: RoleId) -> Result<f64> {
        let state = self.state.lock();
        Self::check_holder(state.holder, role)?;
        self.sample_channel(role, state.selected)
    }

    /// Mark the resource free and wake waiters. The caller must hold it.
    pub fn release(&self, role: RoleId) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_holder(state.holder, role)?;

        state.holder = None;
        state.notify(self.wake_policy);
        debug!("Role {} released the device", role);
        Ok(())
    }

    /// The role currently holding the resource.
    pub fn holder(&self) -> Option<RoleId> {
        self.state.lock().holder
    }

    /// Whether any role holds the resource.
    pub fn is_held(&self) -> bool {
        self.holder().is_some()
    }

    /// The wrapped device.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Wake policy applied on release.
    pub fn wake_policy(&self) -> WakePolicy {
        self.wake_policy
    }

    /// Monitor statistics for this resource.
    pub fn stats(&self) -> MonitorStats {
        self.state.stats()
    }

    fn check_holder(holder: Option<RoleId>, role: RoleId) -> Result<()> {
        if holder == Some(role) {
            Ok(())
        } else {
            Err(CoordinationError::NotHeld { role, holder })
        }
    }

    fn sample_channel(&self, role: RoleId, selector: usize) -> Result<f64> {
        let value = self
            .source
            .sample(selector)
            .ok_or(CoordinationError::UnknownSelector {
                selector,
                channels: self.source.channel_count(),
            })?;
        debug!("Role {} got sample value {} from channel {}", role, value, selector);
        Ok(value)
    }
}
