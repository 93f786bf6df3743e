//! Dependency Tracking
//!
//! This module implements the tracking half of the engine: dependency sets,
//! the registry that maps `(object, key)` pairs to them, effects, and the
//! context that decides which effect a read is attributed to.
//!
//! # Concepts
//!
//! ## Dependencies
//!
//! A [`Dep`] is the set of subscribers interested in one property of one
//! object. Subscribers are kept in the order they first subscribed and each
//! appears at most once. Notifying a dep runs every subscriber in that
//! order, synchronously.
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that re-runs whenever a property it read
//! is written. Effects run immediately when created.
//!
//! ## Watchers
//!
//! A [`Watcher`] is an effect that caches its result and reports changes to
//! a callback.
//!
//! # Implementation Notes
//!
//! Tracking is implicit. A thread-local stack records which subscriber is
//! currently running; every tracked read adds that subscriber to the dep for
//! the property read. Nested effects push onto the stack and pop when they
//! finish, so the outer effect keeps collecting dependencies afterwards.

mod context;
mod dep;
mod effect;
mod registry;
mod subscriber;
mod watch;

pub use context::{untracked, ReactiveContext};
pub use dep::{Dep, WeakDep};
pub use effect::Effect;
pub use registry::DependencyRegistry;
pub use subscriber::{Subscriber, SubscriberId};
pub use watch::Watcher;
