//! Dependency sets
//!
//! A [`Dep`] is the set of subscribers that depend on one `(object, key)`
//! pair. Subscribers are kept in insertion order and notified in that order.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use crate::value::{ObjectId, PropertyKey};

/// The subscribers of a single reactive property.
///
/// Cloning shares the same set.
#[derive(Clone)]
pub struct Dep {
    inner: Arc<DepInner>,
}

struct DepInner {
    target: ObjectId,
    key: PropertyKey,
    subscribers: Mutex<IndexMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl Dep {
    /// Create an empty dependency set for `key` on `target`.
    pub fn new(target: ObjectId, key: PropertyKey) -> Self {
        Self {
            inner: Arc::new(DepInner {
                target,
                key,
                subscribers: Mutex::new(IndexMap::new()),
            }),
        }
    }

    /// The object whose property this set belongs to.
    pub fn target(&self) -> ObjectId {
        self.inner.target
    }

    pub fn key(&self) -> &PropertyKey {
        &self.inner.key
    }

    /// Record the active subscriber, if there is one.
    ///
    /// Returns true if a new edge was added. Without an active subscriber
    /// the read is simply not tracked.
    pub fn depend(&self) -> bool {
        let Some(subscriber) = ReactiveContext::current_subscriber() else {
            return false;
        };
        self.add_subscriber(subscriber)
    }

    /// Add a subscriber. Adding one that is already present is a no-op.
    pub fn add_subscriber(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let id = subscriber.subscriber_id();
        let inserted = {
            let mut subscribers = self.inner.subscribers.lock();
            if subscribers.contains_key(&id) {
                false
            } else {
                subscribers.insert(id, Arc::clone(&subscriber));
                true
            }
        };

        if inserted {
            trace!(target_object = %self.inner.target, key = %self.inner.key, "dependency recorded");
            subscriber.on_track(self);
        }
        inserted
    }

    /// Remove a subscriber, keeping the order of the others.
    pub fn remove_subscriber(&self, id: SubscriberId) -> bool {
        let removed = self.inner.subscribers.lock().shift_remove(&id);
        removed.is_some()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.lock().contains_key(&id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Subscriber IDs in notification order.
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.inner.subscribers.lock().keys().copied().collect()
    }

    /// Re-run every subscriber, in insertion order.
    ///
    /// Membership is snapshotted first: subscribers that run may add or
    /// remove themselves without affecting this pass. Returns the number of
    /// subscribers notified.
    pub fn notify(&self) -> usize {
        let snapshot: SmallVec<[Arc<dyn Subscriber>; 4]> =
            self.inner.subscribers.lock().values().cloned().collect();

        trace!(
            target_object = %self.inner.target,
            key = %self.inner.key,
            subscribers = snapshot.len(),
            "notifying"
        );

        let count = snapshot.len();
        for subscriber in snapshot {
            subscriber.update();
        }
        count
    }

    pub fn downgrade(&self) -> WeakDep {
        WeakDep(Arc::downgrade(&self.inner))
    }

    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("target", &self.inner.target)
            .field("key", &self.inner.key)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A non-owning reference to a [`Dep`], held by subscribers.
#[derive(Clone)]
pub struct WeakDep(Weak<DepInner>);

impl WeakDep {
    pub fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(|inner| Dep { inner })
    }
}
