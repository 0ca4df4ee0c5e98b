//! Bounded producer/consumer channel with a role-termination protocol.
//!
//! A [`BoundedChannel`] tracks how many items are buffered, between zero and
//! its capacity. Producers block while it is full, consumers while it is
//! empty. Each producer and consumer announces its own termination; once every
//! member of one role has terminated, the opposite role's blocked calls return
//! [`Transfer::Abandoned`] instead of waiting for a partner that will never
//! come.

use crate::error::{CoordinationError, Result};
use crate::role::{RoleId, RoleKind};
use crate::sync::{Latch, Monitor, MonitorGuard, MonitorStats};
use log::{debug, info, warn};
use serde::Serialize;

/// Construction-time shape of a bounded channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelConfig {
    /// Maximum number of buffered items
    pub capacity: usize,

    /// Number of producers that will announce termination
    pub producers: usize,

    /// Number of consumers that will announce termination
    pub consumers: usize,
}

impl ChannelConfig {
    /// Create a channel configuration.
    pub fn new(capacity: usize, producers: usize, consumers: usize) -> Self {
        Self {
            capacity,
            producers,
            consumers,
        }
    }

    /// Reject configurations a channel cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CoordinationError::InvalidConfig(
                "channel capacity must be at least 1".to_string(),
            ));
        }
        if self.producers == 0 || self.consumers == 0 {
            return Err(CoordinationError::InvalidConfig(format!(
                "channel needs at least one producer and one consumer (got {} and {})",
                self.producers, self.consumers
            )));
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new(10, 3, 2)
    }
}

/// Outcome of a put or get.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// The item was deposited or withdrawn
    Completed {
        /// Number of buffered items right after the transfer
        count: usize,
    },

    /// Nothing was transferred because the opposite role has fully terminated
    Abandoned,
}

impl Transfer {
    /// Whether an item was transferred.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Whether the call gave up because its partner role is gone.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned)
    }

    /// Buffered count after a completed transfer.
    pub fn count(&self) -> Option<usize> {
        match self {
            Self::Completed { count } => Some(*count),
            Self::Abandoned => None,
        }
    }
}

#[derive(Debug)]
struct ChannelState {
    count: usize,
    active_producers: usize,
    active_consumers: usize,
}

/// A counter-based bounded buffer shared by producers and consumers.
pub struct BoundedChannel {
    config: ChannelConfig,
    state: Monitor<ChannelState>,

    // Set only while holding `state`; read lock-free by the pre-checks.
    producers_done: Latch,
    consumers_done: Latch,
}

impl BoundedChannel {
    /// Create an empty channel.
    pub fn new(config: ChannelConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            state: Monitor::with_name(
                ChannelState {
                    count: 0,
                    active_producers: config.producers,
                    active_consumers: config.consumers,
                },
                "channel",
            ),
            producers_done: Latch::new(),
            consumers_done: Latch::new(),
        })
    }

    /// Deposit one item, blocking while the channel is full.
    ///
    /// Returns [`Transfer::Abandoned`] without depositing if the channel is
    /// still full when every consumer has terminated.
    pub fn put(&self, role: RoleId) -> Transfer {
        let capacity = self.config.capacity;
        let mut state = self.state.lock();

        if state.count == capacity {
            debug!("Buffer is full, producer {} is about to suspend", role);
            let consumers_done = &self.consumers_done;
            state.wait_while(|s| s.count == capacity && !consumers_done.is_latched());

            if state.count == capacity {
                debug!(
                    "Producer {} abandoned its deposit: every consumer has terminated",
                    role
                );
                return Transfer::Abandoned;
            }
        }

        Self::deposit(&mut state, role)
    }

    /// Withdraw one item, blocking while the channel is empty.
    ///
    /// Returns [`Transfer::Abandoned`] without withdrawing if the channel is
    /// still empty when every producer has terminated.
    pub fn get(&self, role: RoleId) -> Transfer {
        let mut state = self.state.lock();

        if state.count == 0 {
            debug!("Buffer is empty, consumer {} is about to suspend", role);
            let producers_done = &self.producers_done;
            state.wait_while(|s| s.count == 0 && !producers_done.is_latched());

            if state.count == 0 {
                debug!(
                    "Consumer {} abandoned its withdrawal: every producer has terminated",
                    role
                );
                return Transfer::Abandoned;
            }
        }

        Self::withdraw(&mut state, role)
    }

    /// Deposit one item if that can be done without blocking.
    ///
    /// Returns `None` when the channel is full and consumers remain.
    pub fn try_put(&self, role: RoleId) -> Option<Transfer> {
        let mut state = self.state.lock();

        if state.count == self.config.capacity {
            return self.consumers_done.is_latched().then_some(Transfer::Abandoned);
        }
        Some(Self::deposit(&mut state, role))
    }

    /// Withdraw one item if that can be done without blocking.
    ///
    /// Returns `None` when the channel is empty and producers remain.
    pub fn try_get(&self, role: RoleId) -> Option<Transfer> {
        let mut state = self.state.lock();

        if state.count == 0 {
            return self.producers_done.is_latched().then_some(Transfer::Abandoned);
        }
        Some(Self::withdraw(&mut state, role))
    }

    fn deposit(state: &mut MonitorGuard<'_, ChannelState>, role: RoleId) -> Transfer {
        state.count += 1;
        let count = state.count;
        state.notify_all();
        debug!("Producer {} deposited, count = {}", role, count);
        Transfer::Completed { count }
    }

    fn withdraw(state: &mut MonitorGuard<'_, ChannelState>, role: RoleId) -> Transfer {
        state.count -= 1;
        let count = state.count;
        state.notify_all();
        debug!("Consumer {} withdrew, count = {}", role, count);
        Transfer::Completed { count }
    }

    /// Announce that one producer has finished for good.
    ///
    /// The last announcement releases every consumer blocked on an empty
    /// channel. Announcing more often than the configured population is an
    /// error and leaves the counters untouched.
    pub fn producer_terminated(&self, role: RoleId) -> Result<()> {
        self.terminate(RoleKind::Producer, role)
    }

    /// Announce that one consumer has finished for good.
    ///
    /// The last announcement releases every producer blocked on a full
    /// channel.
    pub fn consumer_terminated(&self, role: RoleId) -> Result<()> {
        self.terminate(RoleKind::Consumer, role)
    }

    fn terminate(&self, kind: RoleKind, role: RoleId) -> Result<()> {
        let mut state = self.state.lock();
        let (active, done) = match kind {
            RoleKind::Producer => (&mut state.active_producers, &self.producers_done),
            RoleKind::Consumer => (&mut state.active_consumers, &self.consumers_done),
        };

        if *active == 0 {
            warn!("Stray termination from {} {}", kind, role);
            return Err(CoordinationError::RoleExhausted(kind));
        }

        *active -= 1;
        let remaining = *active;
        debug!("{} {} terminated, {} still active", kind, role, remaining);

        if remaining == 0 && done.latch() {
            info!("All {}s have terminated", kind);
            state.notify_all();
        }
        Ok(())
    }

    /// Whether every producer has terminated.
    pub fn has_no_active_producers(&self) -> bool {
        self.producers_done.is_latched()
    }

    /// Whether every consumer has terminated.
    pub fn has_no_active_consumers(&self) -> bool {
        self.consumers_done.is_latched()
    }

    /// Number of buffered items.
    pub fn count(&self) -> usize {
        self.state.lock().count
    }

    /// Maximum number of buffered items.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Producers that have not yet terminated.
    pub fn active_producers(&self) -> usize {
        self.state.lock().active_producers
    }

    /// Consumers that have not yet terminated.
    pub fn active_consumers(&self) -> usize {
        self.state.lock().active_consumers
    }

    /// The configuration this channel was built with.
    pub fn config(&self) -> ChannelConfig {
        self.config
    }

    /// Monitor statistics for this channel.
    pub fn stats(&self) -> MonitorStats {
        self.state.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn role(id: u32) -> RoleId {
        RoleId::new(id)
    }

    #[test]
    fn test_config_validation() {
        assert!(ChannelConfig::default().validate().is_ok());
        assert!(BoundedChannel::new(ChannelConfig::new(0, 1, 1)).is_err());
        assert!(BoundedChannel::new(ChannelConfig::new(1, 0, 1)).is_err());
        assert!(BoundedChannel::new(ChannelConfig::new(1, 1, 0)).is_err());
    }

    #[test]
    fn test_put_then_get() {
        let channel = BoundedChannel::new(ChannelConfig::new(2, 1, 1)).unwrap();

        assert_eq!(channel.put(role(0)), Transfer::Completed { count: 1 });
        assert_eq!(channel.put(role(0)), Transfer::Completed { count: 2 });
        assert_eq!(channel.try_put(role(0)), None);
        assert_eq!(channel.get(role(1)), Transfer::Completed { count: 1 });
        assert_eq!(channel.get(role(1)), Transfer::Completed { count: 0 });
        assert_eq!(channel.try_get(role(1)), None);
        assert_eq!(channel.count(), 0);
    }

    #[test]
    fn test_get_blocks_until_put() {
        let channel = Arc::new(BoundedChannel::new(ChannelConfig::new(1, 1, 1)).unwrap());
        let (tx, rx) = bounded(1);

        let consumer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || tx.send(channel.get(role(1))).unwrap())
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        channel.put(role(0));

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, Transfer::Completed { count: 0 });
        consumer.join().unwrap();
    }

    #[test]
    fn test_blocked_get_abandoned_when_producers_terminate() {
        let channel = Arc::new(BoundedChannel::new(ChannelConfig::new(3, 2, 1)).unwrap());
        let (tx, rx) = bounded(1);

        let consumer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || tx.send(channel.get(role(9))).unwrap())
        };

        channel.producer_terminated(role(0)).unwrap();
        assert!(!channel.has_no_active_producers());
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        channel.producer_terminated(role(1)).unwrap();
        assert!(channel.has_no_active_producers());

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome, Transfer::Abandoned);
        consumer.join().unwrap();
        assert_eq!(channel.count(), 0);
    }

    #[test]
    fn test_blocked_put_abandoned_when_consumers_terminate() {
        let channel = Arc::new(BoundedChannel::new(ChannelConfig::new(1, 1, 1)).unwrap());
        channel.put(role(0));

        let (tx, rx) = bounded(1);
        let producer = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || tx.send(channel.put(role(0))).unwrap())
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        channel.consumer_terminated(role(1)).unwrap();

        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(outcome.is_abandoned());
        producer.join().unwrap();
        assert_eq!(channel.count(), 1);
        assert_eq!(channel.try_put(role(0)), Some(Transfer::Abandoned));
    }

    #[test]
    fn test_put_with_space_completes_after_consumers_terminate() {
        let channel = BoundedChannel::new(ChannelConfig::new(2, 1, 1)).unwrap();
        channel.consumer_terminated(role(1)).unwrap();

        assert!(channel.has_no_active_consumers());
        assert_eq!(channel.put(role(0)), Transfer::Completed { count: 1 });
        assert_eq!(channel.get(role(0)).count(), Some(0));
    }

    #[test]
    fn test_stray_termination_is_guarded() {
        let channel = BoundedChannel::new(ChannelConfig::new(1, 1, 2)).unwrap();

        channel.producer_terminated(role(0)).unwrap();
        assert_eq!(
            channel.producer_terminated(role(0)),
            Err(CoordinationError::RoleExhausted(RoleKind::Producer))
        );
        assert_eq!(channel.active_producers(), 0);
        assert!(channel.has_no_active_producers());

        channel.consumer_terminated(role(1)).unwrap();
        assert_eq!(channel.active_consumers(), 1);
        assert!(!channel.has_no_active_consumers());
        channel.consumer_terminated(role(2)).unwrap();
        assert!(channel.consumer_terminated(role(2)).is_err());
        assert_eq!(channel.active_consumers(), 0);
    }

    #[test]
    fn test_producers_and_consumers_drain() {
        let producers = 3;
        let consumers = 2;
        let iterations = 100;
        let channel = Arc::new(
            BoundedChannel::new(ChannelConfig::new(10, producers, consumers)).unwrap(),
        );
        let mut handles = vec![];

        for id in 0..producers {
            let channel = Arc::clone(&channel);
            handles.push(thread::spawn(move || {
                let mut deposited = 0i64;
                for _ in 0..iterations {
                    if channel.has_no_active_consumers() {
                        break;
                    }
                    let outcome = channel.put(role(id as u32));
                    if let Some(count) = outcome.count() {
                        assert!(count <= 10);
                        deposited += 1;
                    }
                }
                channel.producer_terminated(role(id as u32)).unwrap();
                deposited
            }));
        }

        for id in 0..consumers {
            let channel = Arc::clone(&channel);
            handles.push(thread::spawn(move || {
                let mut withdrawn = 0i64;
                for _ in 0..iterations {
                    if channel.has_no_active_producers() {
                        break;
                    }
                    if channel.get(role(100 + id as u32)).is_completed() {
                        withdrawn += 1;
                    }
                }
                channel.consumer_terminated(role(100 + id as u32)).unwrap();
                -withdrawn
            }));
        }

        let balance: i64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(balance, channel.count() as i64);
        assert!(channel.count() <= channel.capacity());
        assert!(channel.has_no_active_producers());
        assert!(channel.has_no_active_consumers());
    }
}
