//! Broadcast hub for live location updates.
//!
//! The hub owns a registry of subscriber queues and fans every published
//! update out to all of them. Delivery is best effort, at most once per
//! connected subscriber per event: late subscribers miss earlier events
//! and nothing is buffered or replayed.
//!
//! Each subscriber gets its own unbounded queue; the registry lock is
//! held for the whole fan-out of one event, which gives every subscriber
//! the same global publish order. The lock never covers a durable write
//! or socket I/O. A production hardening would bound each queue and
//! drop or disconnect subscribers that exceed it; that backpressure
//! extension is deliberately not implemented here.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::report::LocationUpdate;

/// A live subscription to location updates.
///
/// Owned exclusively by one connection for its connected lifetime.
/// Dropping the subscription closes its queue; the hub prunes the dead
/// entry on the next publish.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<LocationUpdate>,
}

impl Subscription {
    /// The hub-assigned subscriber id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Receive the next update, or `None` once the hub is dropped or
    /// this subscription is unsubscribed.
    pub async fn recv(&mut self) -> Option<LocationUpdate> {
        self.rx.recv().await
    }
}

/// Fan-out registry of live dashboard subscribers.
///
/// An explicit owned service object, shared by handle wherever
/// connections are accepted; not a module-level singleton.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<u64, mpsc::UnboundedSender<LocationUpdate>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber and return its subscription handle.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        self.lock_subscribers().insert(id, tx);
        debug!(subscriber_id = id, "Subscriber registered");

        Subscription { id, rx }
    }

    /// Remove a subscriber by id.
    ///
    /// Idempotent: returns `true` only on the call that actually
    /// removed the entry, so concurrent disconnect signals deregister
    /// exactly once.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = self.lock_subscribers().remove(&id).is_some();
        if removed {
            debug!(subscriber_id = id, "Subscriber deregistered");
        }
        removed
    }

    /// Publish an update to every current subscriber.
    ///
    /// Returns the number of subscribers the event was queued for.
    /// Subscribers whose queue has been closed are pruned.
    pub fn publish(&self, update: &LocationUpdate) -> usize {
        let mut subscribers = self.lock_subscribers();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (&id, tx) in subscribers.iter() {
            if tx.send(update.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        for id in dead {
            subscribers.remove(&id);
            debug!(subscriber_id = id, "Pruned closed subscriber queue");
        }

        delivered
    }

    /// Number of currently registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn lock_subscribers(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<LocationUpdate>>> {
        // A poisoned lock only means a panic elsewhere; the map itself
        // is still consistent.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
