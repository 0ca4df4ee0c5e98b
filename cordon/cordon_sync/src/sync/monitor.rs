//! Mutex and condition variable pair with wait statistics.
//!
//! A [`Monitor`] owns one piece of shared state. Callers lock it, inspect the
//! state, and suspend on the monitor's condition until another caller changes
//! the state and notifies. Every wait re-checks its predicate after waking, so
//! spurious wakeups and notify-all herds are harmless.

use log::trace;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// How many waiters a state change wakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakePolicy {
    /// Wake every waiter; each re-checks its own predicate
    #[default]
    All,
    /// Wake a single waiter
    One,
}

/// Statistics about monitor usage
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    /// Number of times the monitor lock was taken
    pub acquisition_count: usize,

    /// Number of times a caller suspended on the condition
    pub wait_count: usize,

    /// Number of notify-all calls
    pub notify_all_count: usize,

    /// Number of notify-one calls
    pub notify_one_count: usize,

    /// Number of waiters actually woken by notifications
    pub woken_count: usize,

    /// Total time spent suspended on the condition (microseconds)
    pub total_wait_time_us: u64,

    /// Maximum time spent in a single suspension (microseconds)
    pub max_wait_time_us: u64,
}

#[derive(Debug, Default)]
struct MonitorCounters {
    acquisition_count: AtomicUsize,
    wait_count: AtomicUsize,
    notify_all_count: AtomicUsize,
    notify_one_count: AtomicUsize,
    woken_count: AtomicUsize,
    total_wait_time_us: AtomicU64,
    max_wait_time_us: AtomicU64,
}

impl MonitorCounters {
    fn record_wait(&self, wait_time_us: u64) {
        self.total_wait_time_us
            .fetch_add(wait_time_us, Ordering::Relaxed);

        let mut current_max = self.max_wait_time_us.load(Ordering::Relaxed);
        while wait_time_us > current_max {
            match self.max_wait_time_us.compare_exchange(
                current_max,
                wait_time_us,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_max = actual,
            }
        }
    }
}

/// A mutex-protected state plus the condition its waiters suspend on.
pub struct Monitor<T> {
    mutex: Mutex<T>,
    condvar: Condvar,
    counters: MonitorCounters,
    name: Option<String>,
}

/// Exclusive access to a monitor's state.
///
/// While a guard is alive the caller owns the state. [`MonitorGuard::wait`]
/// gives the lock up for the duration of the suspension and takes it back
/// before returning.
pub struct MonitorGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    monitor: &'a Monitor<T>,
}

impl<T> Monitor<T> {
    /// Create a new monitor around `value`
    pub fn new(value: T) -> Self {
        Self {
            mutex: Mutex::new(value),
            condvar: Condvar::new(),
            counters: MonitorCounters::default(),
            name: None,
        }
    }

    /// Create a new monitor with a name for debugging
    pub fn with_name(value: T, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(value)
        }
    }

    /// Lock the monitor
    pub fn lock(&self) -> MonitorGuard<'_, T> {
        let guard = self.mutex.lock();
        self.counters
            .acquisition_count
            .fetch_add(1, Ordering::Relaxed);
        trace!("Monitor locked: {}", self.label());

        MonitorGuard {
            guard,
            monitor: self,
        }
    }

    /// Try to lock the monitor without blocking
    pub fn try_lock(&self) -> Option<MonitorGuard<'_, T>> {
        let guard = self.mutex.try_lock()?;
        self.counters
            .acquisition_count
            .fetch_add(1, Ordering::Relaxed);
        trace!("Monitor locked (try_lock): {}", self.label());

        Some(MonitorGuard {
            guard,
            monitor: self,
        })
    }

    /// Get the statistics for this monitor
    pub fn stats(&self) -> MonitorStats {
        let c = &self.counters;
        MonitorStats {
            acquisition_count: c.acquisition_count.load(Ordering::Relaxed),
            wait_count: c.wait_count.load(Ordering::Relaxed),
            notify_all_count: c.notify_all_count.load(Ordering::Relaxed),
            notify_one_count: c.notify_one_count.load(Ordering::Relaxed),
            woken_count: c.woken_count.load(Ordering::Relaxed),
            total_wait_time_us: c.total_wait_time_us.load(Ordering::Relaxed),
            max_wait_time_us: c.max_wait_time_us.load(Ordering::Relaxed),
        }
    }

    /// Reset the statistics
    pub fn reset_stats(&self) {
        let c = &self.counters;
        c.acquisition_count.store(0, Ordering::Relaxed);
        c.wait_count.store(0, Ordering::Relaxed);
        c.notify_all_count.store(0, Ordering::Relaxed);
        c.notify_one_count.store(0, Ordering::Relaxed);
        c.woken_count.store(0, Ordering::Relaxed);
        c.total_wait_time_us.store(0, Ordering::Relaxed);
        c.max_wait_time_us.store(0, Ordering::Relaxed);
    }

    /// Get the name of this monitor
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed")
    }
}

impl<T: Default> Default for Monitor<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> MonitorGuard<'_, T> {
    /// Suspend until notified, releasing the lock meanwhile.
    ///
    /// Returning does not mean anything changed; callers must re-check.
    pub fn wait(&mut self) {
        let counters = &self.monitor.counters;
        counters.wait_count.fetch_add(1, Ordering::Relaxed);
        trace!("Monitor wait: {}", self.monitor.label());

        let start = Instant::now();
        self.monitor.condvar.wait(&mut self.guard);
        counters.record_wait(start.elapsed().as_micros() as u64);
    }

    /// Suspend for as long as `condition` holds on the state.
    pub fn wait_while<F>(&mut self, mut condition: F)
    where
        F: FnMut(&T) -> bool,
    {
        while condition(&*self.guard) {
            self.wait();
        }
    }

    /// Wake every waiter. Returns how many were woken.
    pub fn notify_all(&self) -> usize {
        let counters = &self.monitor.counters;
        counters.notify_all_count.fetch_add(1, Ordering::Relaxed);
        let woken = self.monitor.condvar.notify_all();
        counters.woken_count.fetch_add(woken, Ordering::Relaxed);
        woken
    }

    /// Wake a single waiter. Returns whether one was woken.
    pub fn notify_one(&self) -> bool {
        let counters = &self.monitor.counters;
        counters.notify_one_count.fetch_add(1, Ordering::Relaxed);
        let woken = self.monitor.condvar.notify_one();
        if woken {
            counters.woken_count.fetch_add(1, Ordering::Relaxed);
        }
        woken
    }

    /// Wake waiters according to `policy`. Returns how many were woken.
    pub fn notify(&self, policy: WakePolicy) -> usize {
        match policy {
            WakePolicy::All => self.notify_all(),
            WakePolicy::One => usize::from(self.notify_one()),
        }
    }
}

impl<T> std::ops::Deref for MonitorGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<T> std::ops::DerefMut for MonitorGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
