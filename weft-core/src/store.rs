//! Reactive Store
//!
//! The store is the entry point of the engine. It turns plain values into
//! reactive ones and creates effects over them.
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::{Store, StoreConfig, Strategy};
//!
//! let store = Store::new(StoreConfig::default().with_strategy(Strategy::Accessor));
//! let state = store.reactive(serde_json::json!({ "count": 0 }))?;
//!
//! let s = state.clone();
//! store.run_effect(move || println!("count = {:?}", s.get("count")));
//!
//! state.set("count", 1)?;  // prints "count = Some(Number(1.0))"
//! state.set("count", 1)?;  // unchanged, prints nothing
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ReactiveError, Result};
use crate::intercept::{observe, observe_object, Interceptor, Strategy};
use crate::reactive::{Effect, Watcher};
use crate::value::{Object, ObjectId, PropertyKey, SequenceOp, Value};

/// Store configuration.
///
/// Deserializes from JSON such as
/// `{"strategy": "accessor", "prune_stale_dependencies": true}`; missing
/// fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Interception strategy for objects this store wraps.
    pub strategy: Strategy,

    /// Detach effects from all their dependencies before each re-run.
    ///
    /// Off by default: an effect stays subscribed to everything it ever
    /// read.
    pub prune_stale_dependencies: bool,
}

impl StoreConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_pruning(mut self, prune: bool) -> Self {
        self.prune_stale_dependencies = prune;
        self
    }
}

/// Creates reactive values and effects.
#[derive(Debug, Clone, Default)]
pub struct Store {
    config: StoreConfig,
}

impl Store {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn with_strategy(strategy: Strategy) -> Self {
        Self::new(StoreConfig::default().with_strategy(strategy))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Make a value reactive.
    ///
    /// Primitives are returned unchanged. Objects are returned as the same
    /// object with an interceptor attached; wrapping an object that already
    /// has one keeps it.
    pub fn wrap(&self, value: impl Into<Value>) -> Value {
        let value = value.into();
        observe(&value, self.config.strategy);
        value
    }

    /// Make a structured value reactive and return its handle.
    pub fn reactive(&self, value: impl Into<Value>) -> Result<Reactive> {
        match self.wrap(value) {
            Value::Object(object) => {
                let interceptor = observe_object(&object, self.config.strategy);
                Ok(Reactive::new(object, interceptor))
            }
            _ => Err(ReactiveError::NotStructured),
        }
    }

    /// Create an effect and run it once to collect its dependencies.
    pub fn run_effect<F>(&self, run: F) -> Effect
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Effect::create(run, self.config.prune_stale_dependencies);
        effect.run();
        effect
    }

    /// Call `callback(new, old)` whenever the value returned by `getter`
    /// changes.
    pub fn watch<G, C>(&self, getter: G, callback: C) -> Watcher
    where
        G: Fn() -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        Watcher::create(getter, callback, self.config.prune_stale_dependencies)
    }

    /// Watch a dotted property path such as `"user.name"` under `root`.
    pub fn watch_path<C>(&self, root: &Reactive, path: &str, callback: C) -> Watcher
    where
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let root = root.clone();
        let path = path.to_owned();
        self.watch(
            move || root.get_path(&path).unwrap_or_default(),
            callback,
        )
    }
}

/// [`Store::wrap`] with the default configuration.
pub fn wrap(value: impl Into<Value>) -> Value {
    Store::default().wrap(value)
}

/// [`Store::reactive`] with the default configuration.
pub fn reactive(value: impl Into<Value>) -> Result<Reactive> {
    Store::default().reactive(value)
}

/// [`Store::run_effect`] with the default configuration.
pub fn run_effect<F>(run: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Store::default().run_effect(run)
}

/// Handle to a reactive record or sequence.
///
/// All reads are tracked by the active effect and all writes notify, as
/// decided by the object's interceptor. Cloning the handle is cheap and
/// refers to the same object.
#[derive(Clone)]
pub struct Reactive {
    object: Object,
    interceptor: Arc<dyn Interceptor>,
}

impl Reactive {
    fn new(object: Object, interceptor: Arc<dyn Interceptor>) -> Self {
        Self {
            object,
            interceptor,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.object.id()
    }

    /// The underlying object, for untracked inspection.
    pub fn object(&self) -> &Object {
        &self.object
    }

    pub fn strategy(&self) -> Strategy {
        self.interceptor.strategy()
    }

    pub fn is_sequence(&self) -> bool {
        self.object.is_sequence()
    }

    /// Read a property or element.
    pub fn get(&self, key: impl Into<PropertyKey>) -> Option<Value> {
        self.interceptor.get(&self.object, key.into())
    }

    /// Read a nested reactive object.
    pub fn child(&self, key: impl Into<PropertyKey>) -> Option<Reactive> {
        self.get(key).and_then(|value| value.as_reactive())
    }

    /// Read a dotted path such as `"user.name"` or `"list.0"`.
    ///
    /// Every segment is a tracked read. Returns `None` if a segment is
    /// missing or an intermediate value is not structured.
    pub fn get_path(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.get(first)?;
        for segment in segments {
            current = current.as_reactive()?.get(segment)?;
        }
        Some(current)
    }

    /// Write a property or element.
    ///
    /// This is the only way to change a reactive object, and the only way to
    /// add new properties that will be observed.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Result<()> {
        self.interceptor.set(&self.object, key.into(), value.into())
    }

    /// Remove a property, returning its value.
    pub fn delete(&self, key: impl Into<PropertyKey>) -> Result<Option<Value>> {
        self.interceptor.delete(&self.object, key.into())
    }

    /// Own keys, tracking the object's shape.
    pub fn keys(&self) -> Vec<PropertyKey> {
        self.interceptor.keys(&self.object)
    }

    pub fn len(&self) -> usize {
        self.interceptor.len(&self.object)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a sequence operation, returning the removed elements.
    pub fn mutate(&self, op: SequenceOp) -> Result<Vec<Value>> {
        self.interceptor.mutate(&self.object, op)
    }

    /// Append an element, returning the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        self.mutate(SequenceOp::Push(vec![value.into()]))?;
        Ok(self.object.len_untracked())
    }

    pub fn pop(&self) -> Result<Option<Value>> {
        Ok(self.mutate(SequenceOp::Pop)?.into_iter().next())
    }

    pub fn shift(&self) -> Result<Option<Value>> {
        Ok(self.mutate(SequenceOp::Shift)?.into_iter().next())
    }

    /// Insert an element at the front, returning the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        self.mutate(SequenceOp::Unshift(vec![value.into()]))?;
        Ok(self.object.len_untracked())
    }

    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Result<Vec<Value>> {
        self.mutate(SequenceOp::Splice {
            start,
            delete_count,
            items,
        })
    }

    pub fn sort(&self) -> Result<()> {
        self.mutate(SequenceOp::Sort).map(drop)
    }

    pub fn reverse(&self) -> Result<()> {
        self.mutate(SequenceOp::Reverse).map(drop)
    }

    /// Snapshot as JSON without tracking.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Value::Object(self.object.clone()).to_json()
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.object.ptr_eq(&other.object)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("object", &self.object)
            .field("strategy", &self.strategy())
            .finish()
    }
}

impl From<Reactive> for Value {
    fn from(reactive: Reactive) -> Self {
        Value::Object(reactive.object)
    }
}

impl Value {
    /// Get a reactive handle if this value is a reactive object.
    pub fn as_reactive(&self) -> Option<Reactive> {
        let object = self.as_object()?;
        let interceptor = object.interceptor()?;
        Some(Reactive::new(object.clone(), Arc::clone(interceptor)))
    }
}
