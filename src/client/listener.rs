//! Beacon listeners and their registry
//!
//! Listeners are registered as `Arc<dyn ...>` and identified by their
//! allocation: registering the same `Arc` twice is a no-op, and so is
//! removing one that was never registered.
//!
//! Sets are copy-on-write. Registration and removal swap in a new list under
//! a short write lock; the dispatcher takes a snapshot and iterates it
//! without holding any lock, so callbacks may freely (un)subscribe and a
//! listener added or removed mid-delivery is neither skipped twice nor
//! notified twice for the current beacon.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::protocol::beacon::{AircraftBeacon, AircraftDescriptor, ReceiverBeacon};

/// Subscriber for aircraft beacons
///
/// Called on the dispatcher task: a slow callback delays every later beacon.
pub trait AircraftBeaconListener: Send + Sync {
    fn on_update(&self, beacon: &AircraftBeacon, descriptor: Option<&AircraftDescriptor>);
}

impl<F> AircraftBeaconListener for F
where
    F: Fn(&AircraftBeacon, Option<&AircraftDescriptor>) + Send + Sync,
{
    fn on_update(&self, beacon: &AircraftBeacon, descriptor: Option<&AircraftDescriptor>) {
        self(beacon, descriptor)
    }
}

/// Subscriber for receiver beacons
///
/// Called on the dispatcher task, like [`AircraftBeaconListener`].
pub trait ReceiverBeaconListener: Send + Sync {
    fn on_update(&self, beacon: &ReceiverBeacon);
}

impl<F> ReceiverBeaconListener for F
where
    F: Fn(&ReceiverBeacon) + Send + Sync,
{
    fn on_update(&self, beacon: &ReceiverBeacon) {
        self(beacon)
    }
}

/// Insertion-ordered, copy-on-write set of listeners
pub struct ListenerSet<L: ?Sized> {
    entries: RwLock<Arc<Vec<Arc<L>>>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        ListenerSet {
            entries: RwLock::new(Arc::new(Vec::new())),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `listener` unless already present; returns whether it was added
    pub fn insert(&self, listener: Arc<L>) -> bool {
        let mut entries = self.entries.write();
        if entries.iter().any(|entry| same_listener(entry, &listener)) {
            return false;
        }

        let mut next = Vec::with_capacity(entries.len() + 1);
        next.extend(entries.iter().cloned());
        next.push(listener);
        *entries = Arc::new(next);
        true
    }

    /// Removes `listener` if present; returns whether it was removed
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut entries = self.entries.write();
        if !entries.iter().any(|entry| same_listener(entry, listener)) {
            return false;
        }

        let next = entries
            .iter()
            .filter(|entry| !same_listener(entry, listener))
            .cloned()
            .collect();
        *entries = Arc::new(next);
        true
    }

    /// Current listeners, in registration order
    pub fn snapshot(&self) -> Arc<Vec<Arc<L>>> {
        Arc::clone(&self.entries.read())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<L: ?Sized> core::fmt::Debug for ListenerSet<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("len", &self.len())
            .finish()
    }
}

fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Listener sets shared by the client facade and the dispatcher
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    pub aircraft: ListenerSet<dyn AircraftBeaconListener>,
    pub receiver: ListenerSet<dyn ReceiverBeaconListener>,
}
