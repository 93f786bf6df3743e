//! Dependency Registry
//!
//! The registry is the process-wide map from `(object, key)` to the
//! dependency set of that property. Interceptors call into it on every
//! read (to track) and every write (to trigger).
//!
//! # How It Works
//!
//! 1. When a reactive property is read inside an effect, the registry finds
//!    or creates the dependency set for it and records the effect.
//!
//! 2. When a reactive property is written, the registry looks the set up
//!    and notifies every subscriber in it. Writes to properties nobody has
//!    read find no set and do nothing.
//!
//! 3. When an object is dropped, its whole entry is forgotten.
//!
//! # Thread Safety
//!
//! The outer map is a `DashMap`, so different objects rarely contend. No
//! shard lock is held while subscribers run.

use std::sync::OnceLock;

use dashmap::DashMap;
use indexmap::IndexMap;
use tracing::trace;

use super::context::ReactiveContext;
use super::dep::Dep;
use crate::value::{ObjectId, PropertyKey};

type TargetDeps = IndexMap<PropertyKey, Dep>;

// Global registry of dependency sets, keyed by object identity.
static TARGETS: OnceLock<DashMap<ObjectId, TargetDeps>> = OnceLock::new();

fn targets() -> &'static DashMap<ObjectId, TargetDeps> {
    TARGETS.get_or_init(DashMap::new)
}

/// The global dependency registry.
pub struct DependencyRegistry;

impl DependencyRegistry {
    /// Get the dependency set for `key` on `target`, creating it if absent.
    pub fn dep_for(target: ObjectId, key: &PropertyKey) -> Dep {
        targets()
            .entry(target)
            .or_default()
            .entry(key.clone())
            .or_insert_with(|| Dep::new(target, key.clone()))
            .clone()
    }

    /// Get the dependency set for `key` on `target`, if one exists.
    pub fn lookup(target: ObjectId, key: &PropertyKey) -> Option<Dep> {
        targets()
            .get(&target)
            .and_then(|deps| deps.get(key).cloned())
    }

    /// Record that the active effect read `key` on `target`.
    ///
    /// Reads outside any effect are not tracked and create nothing.
    pub fn track(target: ObjectId, key: &PropertyKey) -> bool {
        if !ReactiveContext::is_active() {
            return false;
        }
        Self::dep_for(target, key).depend()
    }

    /// Notify every effect that read `key` on `target`.
    ///
    /// Returns the number of subscribers notified.
    pub fn trigger(target: ObjectId, key: &PropertyKey) -> usize {
        match Self::lookup(target, key) {
            Some(dep) => dep.notify(),
            None => {
                trace!(target_object = %target, key = %key, "trigger without dependents");
                0
            }
        }
    }

    /// Drop every dependency set of `target`.
    pub fn forget(target: ObjectId) {
        // Dropping the removed sets can release effects whose closures own
        // other objects, which call back in here; the shard lock must be
        // released by then.
        let removed = targets().remove(&target);
        drop(removed);
    }

    /// Check if any dependency set exists for `target`.
    pub fn contains(target: ObjectId) -> bool {
        targets().contains_key(&target)
    }

    /// Keys of `target` that have a dependency set, in creation order.
    pub fn tracked_keys(target: ObjectId) -> Vec<PropertyKey> {
        targets()
            .get(&target)
            .map(|deps| deps.keys().cloned().collect())
            .unwrap_or_default()
    }
}
