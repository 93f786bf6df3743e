//! Property Interception
//!
//! An interceptor sits between a reactive handle and the raw data of one
//! object. Reads go through it so they can be tracked, writes go through it
//! so they can notify.
//!
//! # Strategies
//!
//! Two interchangeable strategies implement [`Interceptor`]:
//!
//! - [`AccessorInterceptor`] (`Strategy::Accessor`): installs an accessor
//!   for every property eagerly and recursively when the object is wrapped.
//!   Properties added later are only observed when added through
//!   `Reactive::set`. Sequences are observed as a whole: every mutating
//!   operation notifies the container once.
//!
//! - [`ProxyInterceptor`] (`Strategy::Proxy`): intercepts every read and
//!   write uniformly, wrapping nested objects lazily on first read. Sequence
//!   operations are observed as the index and length writes they perform.
//!
//! The proxy strategy is the default.
//!
//! # Attachment
//!
//! Each object carries at most one interceptor, attached the first time the
//! object is wrapped. Wrapping again returns the existing one, whatever
//! strategy it uses.

mod accessor;
mod proxy;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use accessor::AccessorInterceptor;
pub use proxy::ProxyInterceptor;

use crate::error::{ReactiveError, Result};
use crate::value::{Object, PropertyKey, SequenceOp, Value, MAX_SEQUENCE_LEN};

/// Which interception strategy to use for newly wrapped objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Eager per-property accessors, container-level sequence tracking.
    Accessor,
    /// Uniform interception with lazy nested wrapping.
    #[default]
    Proxy,
}

/// Observes reads and writes of one object.
///
/// Every method receives the object it is attached to. Keys are given as
/// the caller wrote them and normalized by the implementation.
pub trait Interceptor: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Called once, right after the interceptor is attached to `target`.
    fn attach(&self, target: &Object);

    /// Tracked read. Returns `None` if the key is absent.
    fn get(&self, target: &Object, key: PropertyKey) -> Option<Value>;

    /// Write, notifying dependents unless the value is unchanged.
    fn set(&self, target: &Object, key: PropertyKey, value: Value) -> Result<()>;

    /// Remove a key, returning the previous value.
    fn delete(&self, target: &Object, key: PropertyKey) -> Result<Option<Value>>;

    /// Tracked iteration over own keys.
    fn keys(&self, target: &Object) -> Vec<PropertyKey>;

    /// Tracked element or entry count.
    fn len(&self, target: &Object) -> usize;

    /// Apply a mutating sequence operation, returning removed elements.
    fn mutate(&self, target: &Object, op: SequenceOp) -> Result<Vec<Value>>;
}

/// Make `value` reactive with `strategy` if it is structured.
///
/// Primitives are left alone; already reactive objects keep their
/// interceptor.
pub fn observe(value: &Value, strategy: Strategy) {
    if let Value::Object(object) = value {
        observe_object(object, strategy);
    }
}

/// Attach an interceptor to `object` unless it already has one.
pub fn observe_object(object: &Object, strategy: Strategy) -> Arc<dyn Interceptor> {
    if let Some(existing) = object.interceptor() {
        return Arc::clone(existing);
    }

    let interceptor: Arc<dyn Interceptor> = match strategy {
        Strategy::Accessor => Arc::new(AccessorInterceptor::new()),
        Strategy::Proxy => Arc::new(ProxyInterceptor),
    };

    if object.attach_interceptor(Arc::clone(&interceptor)) {
        debug!(object = %object.id(), ?strategy, "interceptor attached");
        interceptor.attach(object);
        interceptor
    } else {
        // Another thread attached first; use theirs.
        object.interceptor().cloned().unwrap_or(interceptor)
    }
}

/// Interpret a value written to a sequence's length.
pub(crate) fn length_from(value: &Value) -> Result<usize> {
    match value {
        Value::Number(n)
            if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_SEQUENCE_LEN as f64 =>
        {
            Ok(*n as usize)
        }
        other => Err(ReactiveError::InvalidLength(other.clone())),
    }
}

pub(crate) fn invalid_key(key: PropertyKey, kind: &'static str) -> ReactiveError {
    ReactiveError::InvalidKey { key, kind }
}

/// Reject sequence indices at or above [`MAX_SEQUENCE_LEN`].
pub(crate) fn check_index(index: usize) -> Result<usize> {
    if index < MAX_SEQUENCE_LEN {
        Ok(index)
    } else {
        Err(invalid_key(PropertyKey::Index(index), "sequence"))
    }
}
