//! Logical worker identity.
//!
//! Every blocking operation in this crate takes the caller's [`RoleId`] as an
//! explicit argument. The id is used to label log lines and, for the exclusive
//! resource, to check that the releasing role is the holding role.
//!
//! [`RoleRegistry`] is provided for driver code that only knows which OS thread
//! it is running on and needs to recover the logical worker number from it.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::thread::{self, ThreadId};

/// Logical number of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(u32);

impl RoleId {
    /// Sentinel returned for threads that never registered a role.
    pub const UNKNOWN: RoleId = RoleId(u32::MAX);

    /// Create a role id from a worker number.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The worker number, or `None` for [`RoleId::UNKNOWN`].
    pub fn get(self) -> Option<u32> {
        if self == Self::UNKNOWN {
            None
        } else {
            Some(self.0)
        }
    }

    /// Whether this is the sentinel id.
    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }

    /// Interpret the worker number as an index, e.g. an input channel selector.
    pub fn index(self) -> Option<usize> {
        self.get().map(|id| id as usize)
    }
}

impl From<u32> for RoleId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(id) => write!(f, "{}", id),
            None => write!(f, "?"),
        }
    }
}

/// Which side of a bounded channel a worker is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    /// Deposits items
    Producer,
    /// Withdraws items
    Consumer,
}

impl RoleKind {
    /// The role on the other side of the channel.
    pub fn opposite(self) -> Self {
        match self {
            Self::Producer => Self::Consumer,
            Self::Consumer => Self::Producer,
        }
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producer => write!(f, "producer"),
            Self::Consumer => write!(f, "consumer"),
        }
    }
}

/// Association from OS thread to logical worker number.
///
/// Lookups for a thread that never registered yield [`RoleId::UNKNOWN`].
#[derive(Debug, Default)]
pub struct RoleRegistry {
    roles: RwLock<HashMap<ThreadId, RoleId>>,
}

impl RoleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the calling thread to `role`.
    ///
    /// A thread registers once; a second registration keeps the first binding
    /// and returns it.
    pub fn register(&self, role: RoleId) -> RoleId {
        let mut roles = self.roles.write();
        *roles.entry(thread::current().id()).or_insert(role)
    }

    /// Role of the calling thread.
    pub fn current(&self) -> RoleId {
        self.lookup(thread::current().id())
    }

    /// Role bound to `thread`.
    pub fn lookup(&self, thread: ThreadId) -> RoleId {
        self.roles
            .read()
            .get(&thread)
            .copied()
            .unwrap_or(RoleId::UNKNOWN)
    }

    /// Number of registered threads.
    pub fn len(&self) -> usize {
        self.roles.read().len()
    }

    /// Whether no thread has registered.
    pub fn is_empty(&self) -> bool {
        self.roles.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_role_display() {
        assert_eq!(RoleId::new(3).to_string(), "3");
        assert_eq!(RoleId::UNKNOWN.to_string(), "?");
        assert_eq!(RoleId::UNKNOWN.index(), None);
        assert_eq!(RoleId::from(4).index(), Some(4));
    }

    #[test]
    fn test_unregistered_thread_is_unknown() {
        let registry = RoleRegistry::new();
        assert!(registry.current().is_unknown());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_keeps_first_binding() {
        let registry = RoleRegistry::new();
        assert_eq!(registry.register(RoleId::new(1)), RoleId::new(1));
        assert_eq!(registry.register(RoleId::new(9)), RoleId::new(1));
        assert_eq!(registry.current(), RoleId::new(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_threads() {
        let registry = Arc::new(RoleRegistry::new());
        let mut handles = vec![];

        for id in 0..6 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                registry.register(RoleId::new(id));
                assert_eq!(registry.current(), RoleId::new(id));
                thread::current().id()
            }));
        }

        let threads: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(registry.len(), 6);
        for (id, thread) in threads.into_iter().enumerate() {
            assert_eq!(registry.lookup(thread), RoleId::new(id as u32));
        }

        // The test thread itself never registered
        assert_eq!(registry.current(), RoleId::UNKNOWN);
    }
}
