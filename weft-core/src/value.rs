//! Data Model
//!
//! Reactive stores operate on dynamically shaped data: records (ordered
//! string-keyed maps) and sequences, nested arbitrarily, with primitive
//! leaves. This module defines that data model independently of any
//! tracking.
//!
//! # Identity
//!
//! Structured values live behind an [`Object`] handle. Cloning the handle
//! shares the underlying data, and two handles are equal only if they point
//! to the same object. Dependency bookkeeping is keyed by [`ObjectId`], so
//! identity rather than structural equality decides which effects re-run.
//!
//! # Raw access
//!
//! Everything on [`Object`] is untracked. Once an interceptor has been
//! attached (the object is reactive), the raw mutators refuse to write so
//! that every change goes through the interceptor and is observed.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{ReactiveError, Result};
use crate::intercept::Interceptor;
use crate::reactive::DependencyRegistry;

/// Upper bound on sequence length. Valid indices are below it.
pub const MAX_SEQUENCE_LEN: usize = u32::MAX as usize;

/// Counter for generating unique object IDs.
static OBJECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of a structured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        Self(OBJECT_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The key under which a dependency is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// A named record property.
    Name(String),

    /// A sequence slot.
    Index(usize),

    /// The length of a sequence.
    Length,

    /// Container-level key: the set of keys or elements changed.
    Shape,
}

impl PropertyKey {
    /// Convert the key to the form used by the given kind of container.
    ///
    /// Sequences accept `"length"` and canonical decimal indices (`"3"`, not
    /// `"03"` or `"+3"`) as names; records treat indices as names.
    pub fn normalize_for(self, data: &Data) -> Self {
        match (data, self) {
            (Data::Sequence(_), PropertyKey::Name(name)) => {
                if name == "length" {
                    PropertyKey::Length
                } else {
                    match canonical_index(&name) {
                        Some(index) => PropertyKey::Index(index),
                        None => PropertyKey::Name(name),
                    }
                }
            }
            (Data::Record(_), PropertyKey::Index(index)) => PropertyKey::Name(index.to_string()),
            (_, key) => key,
        }
    }
}

/// Parse a name as a sequence index if it is written in canonical decimal
/// form and below [`MAX_SEQUENCE_LEN`].
fn canonical_index(name: &str) -> Option<usize> {
    let digits = !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit());
    if !digits || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    name.parse::<usize>()
        .ok()
        .filter(|&index| index < MAX_SEQUENCE_LEN)
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(name) => f.write_str(name),
            PropertyKey::Index(index) => write!(f, "{index}"),
            PropertyKey::Length => f.write_str("length"),
            PropertyKey::Shape => f.write_str("<shape>"),
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::Name(name.to_owned())
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::Name(name)
    }
}

impl From<usize> for PropertyKey {
    fn from(index: usize) -> Self {
        PropertyKey::Index(index)
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(Object),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a record or a sequence.
    pub fn is_structured(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Build a fresh, untracked value tree from JSON.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Object(Object::from_data(Data::Sequence(
                items.into_iter().map(Value::from_json).collect(),
            ))),
            serde_json::Value::Object(map) => Value::Object(Object::from_data(Data::Record(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from_json(value)))
                    .collect(),
            ))),
        }
    }

    /// Snapshot this value as JSON without tracking any reads.
    ///
    /// Non-finite numbers become `null`. Fails if the object graph is cyclic.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut visiting = HashSet::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(&self, visiting: &mut HashSet<ObjectId>) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(object) => {
                if !visiting.insert(object.id()) {
                    return Err(ReactiveError::Cycle(object.id()));
                }
                // Copy out so no lock is held while descending.
                let data = object.read(Data::clone);
                let json = match data {
                    Data::Record(map) => {
                        let mut out = serde_json::Map::with_capacity(map.len());
                        for (key, value) in map {
                            out.insert(key, value.to_json_inner(visiting)?);
                        }
                        serde_json::Value::Object(out)
                    }
                    Data::Sequence(items) => serde_json::Value::Array(
                        items
                            .iter()
                            .map(|item| item.to_json_inner(visiting))
                            .collect::<Result<_>>()?,
                    ),
                };
                visiting.remove(&object.id());
                json
            }
        })
    }

    /// Total order used by `sort`: null, booleans, numbers, strings, objects.
    pub fn sort_order(a: &Value, b: &Value) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
                Value::Object(_) => 4,
            }
        }

        match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => x.total_cmp(y),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Object(x), Value::Object(y)) => x.id().cmp(&y.id()),
            _ => rank(a).cmp(&rank(b)),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    // Integral values round-trip as JSON integers.
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Object(Object::from_data(Data::Sequence(items)))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

/// The contents of a structured value.
#[derive(Debug, Clone)]
pub enum Data {
    Record(IndexMap<String, Value>),
    Sequence(Vec<Value>),
}

impl Data {
    /// Human-readable kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Data::Record(_) => "record",
            Data::Sequence(_) => "sequence",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Data::Record(map) => map.len(),
            Data::Sequence(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a key. The key must already be normalized for this container.
    pub fn get(&self, key: &PropertyKey) -> Option<Value> {
        match (self, key) {
            (Data::Record(map), PropertyKey::Name(name)) => map.get(name).cloned(),
            (Data::Sequence(items), PropertyKey::Index(index)) => items.get(*index).cloned(),
            (Data::Sequence(items), PropertyKey::Length) => Some(Value::from(items.len())),
            _ => None,
        }
    }

    pub fn contains(&self, key: &PropertyKey) -> bool {
        match (self, key) {
            (Data::Record(map), PropertyKey::Name(name)) => map.contains_key(name),
            (Data::Sequence(items), PropertyKey::Index(index)) => *index < items.len(),
            _ => false,
        }
    }

    /// Own keys in iteration order.
    pub fn keys(&self) -> Vec<PropertyKey> {
        match self {
            Data::Record(map) => map.keys().cloned().map(PropertyKey::Name).collect(),
            Data::Sequence(items) => (0..items.len()).map(PropertyKey::Index).collect(),
        }
    }

    /// Every structured value directly contained in this container.
    pub fn children(&self) -> Vec<Object> {
        let values: Box<dyn Iterator<Item = &Value>> = match self {
            Data::Record(map) => Box::new(map.values()),
            Data::Sequence(items) => Box::new(items.iter()),
        };
        values.filter_map(|value| value.as_object().cloned()).collect()
    }
}

/// A mutating sequence operation.
#[derive(Debug, Clone)]
pub enum SequenceOp {
    /// Append elements at the end.
    Push(Vec<Value>),
    /// Remove the last element.
    Pop,
    /// Remove the first element.
    Shift,
    /// Insert elements at the front.
    Unshift(Vec<Value>),
    /// Remove `delete_count` elements at `start` and insert `items` there.
    /// Out-of-range bounds are clamped.
    Splice {
        start: usize,
        delete_count: usize,
        items: Vec<Value>,
    },
    /// Sort in place using [`Value::sort_order`].
    Sort,
    /// Reverse in place.
    Reverse,
}

/// What a [`SequenceOp`] removed and inserted.
#[derive(Debug, Clone, Default)]
pub struct SequenceEdit {
    pub removed: Vec<Value>,
    pub inserted: Vec<Value>,
}

impl SequenceOp {
    /// Apply the operation to raw elements.
    pub fn apply(self, items: &mut Vec<Value>) -> SequenceEdit {
        match self {
            SequenceOp::Push(values) => {
                items.extend(values.iter().cloned());
                SequenceEdit {
                    removed: Vec::new(),
                    inserted: values,
                }
            }
            SequenceOp::Pop => SequenceEdit {
                removed: items.pop().into_iter().collect(),
                inserted: Vec::new(),
            },
            SequenceOp::Shift => SequenceEdit {
                removed: if items.is_empty() {
                    Vec::new()
                } else {
                    vec![items.remove(0)]
                },
                inserted: Vec::new(),
            },
            SequenceOp::Unshift(values) => {
                items.splice(0..0, values.iter().cloned());
                SequenceEdit {
                    removed: Vec::new(),
                    inserted: values,
                }
            }
            SequenceOp::Splice {
                start,
                delete_count,
                items: values,
            } => {
                let start = start.min(items.len());
                let end = start + delete_count.min(items.len() - start);
                let removed: Vec<Value> = items.splice(start..end, values.iter().cloned()).collect();
                SequenceEdit {
                    removed,
                    inserted: values,
                }
            }
            SequenceOp::Sort => {
                items.sort_by(Value::sort_order);
                SequenceEdit::default()
            }
            SequenceOp::Reverse => {
                items.reverse();
                SequenceEdit::default()
            }
        }
    }
}

/// Shared handle to a record or sequence.
#[derive(Clone)]
pub struct Object(Arc<ObjectInner>);

struct ObjectInner {
    id: ObjectId,
    data: RwLock<Data>,
    /// Attached once, when the object is first made reactive.
    interceptor: OnceLock<Arc<dyn Interceptor>>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        DependencyRegistry::forget(self.id);
    }
}

impl Object {
    pub fn from_data(data: Data) -> Self {
        Self(Arc::new(ObjectInner {
            id: ObjectId::next(),
            data: RwLock::new(data),
            interceptor: OnceLock::new(),
        }))
    }

    /// Create an empty record.
    pub fn record() -> Self {
        Self::from_data(Data::Record(IndexMap::new()))
    }

    /// Create an empty sequence.
    pub fn sequence() -> Self {
        Self::from_data(Data::Sequence(Vec::new()))
    }

    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::from_data(Data::Record(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        ))
    }

    pub fn from_items<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::from_data(Data::Sequence(items.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn is_sequence(&self) -> bool {
        self.read(|data| matches!(data, Data::Sequence(_)))
    }

    pub fn kind(&self) -> &'static str {
        self.read(Data::kind)
    }

    /// Check if two handles point to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Get the attached interceptor, if the object is reactive.
    pub fn interceptor(&self) -> Option<&Arc<dyn Interceptor>> {
        self.0.interceptor.get()
    }

    pub fn is_reactive(&self) -> bool {
        self.interceptor().is_some()
    }

    /// Attach an interceptor. Returns false if one was already attached.
    pub(crate) fn attach_interceptor(&self, interceptor: Arc<dyn Interceptor>) -> bool {
        self.0.interceptor.set(interceptor).is_ok()
    }

    /// Inspect the raw data. The lock is held for the duration of `f`.
    pub fn read<R>(&self, f: impl FnOnce(&Data) -> R) -> R {
        f(&self.0.data.read())
    }

    /// Mutate the raw data. Callers must not notify while `f` runs.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Data) -> R) -> R {
        f(&mut self.0.data.write())
    }

    /// Read a key without tracking.
    pub fn get_untracked(&self, key: impl Into<PropertyKey>) -> Option<Value> {
        let key = key.into();
        self.read(|data| {
            let key = key.normalize_for(data);
            data.get(&key)
        })
    }

    pub fn len_untracked(&self) -> usize {
        self.read(Data::len)
    }

    /// Insert into a plain record.
    ///
    /// Fails once the object is reactive.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        self.ensure_plain()?;
        let key = key.into();
        let value = value.into();
        self.write(|data| match data {
            Data::Record(map) => Ok(map.insert(key, value)),
            Data::Sequence(_) => Err(ReactiveError::InvalidKey {
                key: PropertyKey::Name(key),
                kind: "sequence",
            }),
        })
    }

    /// Append to a plain sequence.
    ///
    /// Fails once the object is reactive.
    pub fn push(&self, value: impl Into<Value>) -> Result<()> {
        self.ensure_plain()?;
        let id = self.id();
        let value = value.into();
        self.write(|data| match data {
            Data::Sequence(items) => {
                items.push(value);
                Ok(())
            }
            Data::Record(_) => Err(ReactiveError::NotASequence(id)),
        })
    }

    fn ensure_plain(&self) -> Result<()> {
        if self.is_reactive() {
            Err(ReactiveError::AlreadyReactive(self.id()))
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Object graphs may be cyclic, so do not descend.
        let (kind, len) = self.read(|data| (data.kind(), data.len()));
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("kind", &kind)
            .field("len", &len)
            .field("reactive", &self.is_reactive())
            .finish()
    }
}
