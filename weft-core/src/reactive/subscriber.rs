//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! Effects and watchers are subscribers; dependency sets only ever see them
//! through the [`Subscriber`] trait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::dep::Dep;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. Dependency sets are keyed
/// by this ID, which is what makes registering the same subscriber twice a
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that can be re-run when one of its dependencies changes.
pub trait Subscriber: Send + Sync {
    /// Get the subscriber ID used for deduplication inside dependency sets.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-run the computation. Invoked by [`Dep::notify`].
    fn update(self: Arc<Self>);

    /// Called once when a dependency set first records this subscriber.
    fn on_track(&self, _dep: &Dep) {}
}
