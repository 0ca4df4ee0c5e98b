//! Fixed-capacity pool of interchangeable slots.
//!
//! A [`ResourcePool`] owns `capacity` resources, each behind a slot with a
//! stable id in `0..capacity`. Acquiring hands out the lowest-numbered free
//! slot, blocking while every slot is held. Releasing frees the slot and wakes
//! every waiter so each can re-scan.

use crate::error::{CoordinationError, Result};
use crate::role::RoleId;
use crate::sync::{Monitor, MonitorStats, Sequence};
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

static POOL_IDS: Sequence = Sequence::new(1);

#[derive(Debug, Clone)]
struct Slot {
    id: usize,
    held: bool,
    holder: Option<RoleId>,
}

/// A pool of `capacity` interchangeable resources.
pub struct ResourcePool<T> {
    /// Identity used to reject handles issued by another pool
    pool_id: u64,

    /// Slot table, in ascending id order
    slots: Monitor<Vec<Slot>>,

    /// Resources, indexed by slot id
    resources: Vec<T>,
}

/// A slot handed out by [`ResourcePool::acquire`].
///
/// The handle is the caller's proof of holding the slot. Releasing consumes
/// it. A handle dropped without release returns its slot to the pool.
pub struct SlotHandle<T> {
    pool: Arc<ResourcePool<T>>,
    id: usize,
    role: RoleId,
    acquired_at: Instant,
    released: bool,
}

impl<T> ResourcePool<T> {
    /// Create a pool owning `resources`; slot `i` holds `resources[i]`.
    pub fn new(resources: Vec<T>) -> Result<Arc<Self>> {
        if resources.is_empty() {
            return Err(CoordinationError::InvalidConfig(
                "resource pool capacity must be at least 1".to_string(),
            ));
        }

        let slots = (0..resources.len())
            .map(|id| Slot {
                id,
                held: false,
                holder: None,
            })
            .collect();

        let pool_id = POOL_IDS.next();
        debug!(
            "Created resource pool {} with {} slots",
            pool_id,
            resources.len()
        );

        Ok(Arc::new(Self {
            pool_id,
            slots: Monitor::with_name(slots, format!("pool-{}", pool_id)),
            resources,
        }))
    }

    /// Create a pool of `capacity` resources built by `make(slot_id)`.
    pub fn from_fn<F>(capacity: usize, make: F) -> Result<Arc<Self>>
    where
        F: FnMut(usize) -> T,
    {
        Self::new((0..capacity).map(make).collect())
    }

    /// Block until a slot is free, then hold it as `role`.
    ///
    /// Among free slots the lowest id wins. No ordering among waiting callers
    /// is guaranteed.
    pub fn acquire(self: &Arc<Self>, role: RoleId) -> SlotHandle<T> {
        let mut slots = self.slots.lock();
        debug!("Role {} requested a slot", role);

        loop {
            if let Some(slot) = slots.iter_mut().find(|slot| !slot.held) {
                slot.held = true;
                slot.holder = Some(role);
                let id = slot.id;
                debug!("Role {} was given slot {}", role, id);
                return self.handle(id, role);
            }

            debug!(
                "Role {} is about to be suspended until a slot is free",
                role
            );
            slots.wait();
        }
    }

    /// Hold a free slot as `role` if one is available right now.
    pub fn try_acquire(self: &Arc<Self>, role: RoleId) -> Option<SlotHandle<T>> {
        let mut slots = self.slots.lock();
        let slot = slots.iter_mut().find(|slot| !slot.held)?;
        slot.held = true;
        slot.holder = Some(role);
        let id = slot.id;
        debug!("Role {} was given slot {} (try_acquire)", role, id);
        Some(self.handle(id, role))
    }

    /// Return the slot named by `handle` to the pool and wake every waiter.
    pub fn release(&self, mut handle: SlotHandle<T>) -> Result<()> {
        if handle.pool.pool_id != self.pool_id {
            return Err(CoordinationError::ForeignHandle { slot: handle.id });
        }

        handle.released = true;
        self.release_slot(handle.id, handle.role)
    }

    fn release_slot(&self, id: usize, role: RoleId) -> Result<()> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(id)
            .ok_or(CoordinationError::ForeignHandle { slot: id })?;

        if !slot.held {
            return Err(CoordinationError::SlotNotHeld(id));
        }
        slot.held = false;
        slot.holder = None;

        slots.notify_all();
        debug!("Role {} released slot {}", role, id);
        Ok(())
    }

    fn handle(self: &Arc<Self>, id: usize, role: RoleId) -> SlotHandle<T> {
        SlotHandle {
            pool: Arc::clone(self),
            id,
            role,
            acquired_at: Instant::now(),
            released: false,
        }
    }

    /// Number of slots; fixed for the pool's lifetime.
    pub fn capacity(&self) -> usize {
        self.resources.len()
    }

    /// Number of slots not currently held.
    pub fn available_count(&self) -> usize {
        self.slots.lock().iter().filter(|slot| !slot.held).count()
    }

    /// Number of slots currently held.
    pub fn held_count(&self) -> usize {
        self.capacity() - self.available_count()
    }

    /// Ids of the held slots with the role holding each, in ascending id order.
    pub fn holders(&self) -> Vec<(usize, RoleId)> {
        self.slots
            .lock()
            .iter()
            .filter_map(|slot| slot.holder.map(|role| (slot.id, role)))
            .collect()
    }

    /// Monitor statistics for this pool.
    pub fn stats(&self) -> MonitorStats {
        self.slots.stats()
    }
}

impl<T> SlotHandle<T> {
    /// Stable id of the held slot.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Role the slot was handed to.
    pub fn role(&self) -> RoleId {
        self.role
    }

    /// The resource behind the slot.
    pub fn resource(&self) -> &T {
        &self.pool.resources[self.id]
    }

    /// Time since the slot was acquired.
    pub fn held_duration(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Return the slot to the pool that issued it.
    pub fn release(self) -> Result<()> {
        let pool = Arc::clone(&self.pool);
        pool.release(self)
    }
}

impl<T> fmt::Debug for SlotHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotHandle")
            .field("pool", &self.pool.pool_id)
            .field("id", &self.id)
            .field("role", &self.role)
            .finish()
    }
}

impl<T> Drop for SlotHandle<T> {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(
            "Slot {} dropped by role {} without release; returning it to the pool",
            self.id, self.role
        );
        if let Err(e) = self.pool.release_slot(self.id, self.role) {
            warn!("Failed to return slot {}: {}", self.id, e);
        }
    }
}
