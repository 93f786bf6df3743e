//! Uniform interception.
//!
//! Every read tracks `(object, key)` and every write notifies it. Nothing is
//! installed up front: nested objects are wrapped when they are first read.
//!
//! Sequence mutations need no special casing. An operation is applied to the
//! raw elements and then observed as the writes it amounts to: each index
//! whose value changed is notified, and `length` is notified if the length
//! changed. `push` on a three-element sequence therefore notifies index 3 and
//! `length`; sorting an already sorted sequence notifies nothing.

use smallvec::{smallvec, SmallVec};

use super::{check_index, invalid_key, length_from, observe_object, Interceptor, Strategy};
use crate::error::{ReactiveError, Result};
use crate::reactive::DependencyRegistry;
use crate::value::{Data, Object, PropertyKey, SequenceOp, Value};

type Changes = SmallVec<[PropertyKey; 4]>;

/// Interceptor that observes every access uniformly.
#[derive(Debug, Default)]
pub struct ProxyInterceptor;

impl ProxyInterceptor {
    fn notify_all(target: &Object, changes: &[PropertyKey]) {
        for key in changes {
            DependencyRegistry::trigger(target.id(), key);
        }
    }
}

/// Keys whose observable value differs between `before` and `after`.
fn diff(before: &[Value], after: &[Value]) -> Changes {
    let mut changes: Changes = (0..before.len().max(after.len()))
        .filter(|&index| before.get(index) != after.get(index))
        .map(PropertyKey::Index)
        .collect();
    if before.len() != after.len() {
        changes.push(PropertyKey::Length);
    }
    changes
}

impl Interceptor for ProxyInterceptor {
    fn strategy(&self) -> Strategy {
        Strategy::Proxy
    }

    fn attach(&self, _target: &Object) {}

    fn get(&self, target: &Object, key: PropertyKey) -> Option<Value> {
        let (key, value) = target.read(|data| {
            let key = key.normalize_for(data);
            let value = data.get(&key);
            (key, value)
        });

        // Missing keys are tracked too, so adding them later notifies.
        DependencyRegistry::track(target.id(), &key);

        if let Some(Value::Object(child)) = &value {
            observe_object(child, Strategy::Proxy);
        }
        value
    }

    fn set(&self, target: &Object, key: PropertyKey, value: Value) -> Result<()> {
        let changes = target.write(|data| -> Result<Changes> {
            let key = key.normalize_for(data);
            match (data, key) {
                (Data::Record(map), PropertyKey::Name(name)) => {
                    match map.get(&name).map(|current| *current == value) {
                        Some(true) => Ok(Changes::new()),
                        Some(false) => {
                            map.insert(name.clone(), value);
                            Ok(smallvec![PropertyKey::Name(name)])
                        }
                        None => {
                            map.insert(name.clone(), value);
                            Ok(smallvec![PropertyKey::Name(name), PropertyKey::Shape])
                        }
                    }
                }
                (Data::Sequence(items), PropertyKey::Index(index)) => {
                    if let Some(slot) = items.get_mut(index) {
                        if *slot == value {
                            return Ok(Changes::new());
                        }
                        *slot = value;
                        return Ok(smallvec![PropertyKey::Index(index)]);
                    }
                    // Writing past the end pads with nulls, like a sparse write.
                    let index = check_index(index)?;
                    let old_len = items.len();
                    items.resize(index, Value::Null);
                    items.push(value);
                    let mut changes: Changes = (old_len..=index).map(PropertyKey::Index).collect();
                    changes.push(PropertyKey::Length);
                    Ok(changes)
                }
                (Data::Sequence(items), PropertyKey::Length) => {
                    let new_len = length_from(&value)?;
                    let old_len = items.len();
                    if new_len == old_len {
                        return Ok(Changes::new());
                    }
                    items.resize(new_len, Value::Null);
                    let mut changes: Changes = smallvec![PropertyKey::Length];
                    changes.extend((new_len.min(old_len)..new_len.max(old_len)).map(PropertyKey::Index));
                    Ok(changes)
                }
                (data, key) => Err(invalid_key(key, data.kind())),
            }
        })?;

        Self::notify_all(target, &changes);
        Ok(())
    }

    fn delete(&self, target: &Object, key: PropertyKey) -> Result<Option<Value>> {
        let (removed, changes) = target.write(|data| -> Result<(Option<Value>, Changes)> {
            let key = key.normalize_for(data);
            match (data, key) {
                (Data::Record(map), PropertyKey::Name(name)) => match map.shift_remove(&name) {
                    Some(old) => Ok((
                        Some(old),
                        smallvec![PropertyKey::Name(name), PropertyKey::Shape],
                    )),
                    None => Ok((None, Changes::new())),
                },
                (Data::Sequence(items), PropertyKey::Index(index)) => match items.get_mut(index) {
                    Some(slot) => {
                        let old = std::mem::take(slot);
                        let changes = if old.is_null() {
                            Changes::new()
                        } else {
                            smallvec![PropertyKey::Index(index)]
                        };
                        Ok((Some(old), changes))
                    }
                    None => Ok((None, Changes::new())),
                },
                (data, key) => Err(invalid_key(key, data.kind())),
            }
        })?;

        Self::notify_all(target, &changes);
        Ok(removed)
    }

    fn keys(&self, target: &Object) -> Vec<PropertyKey> {
        let (keys, shape_key) = target.read(|data| {
            let shape_key = match data {
                Data::Record(_) => PropertyKey::Shape,
                Data::Sequence(_) => PropertyKey::Length,
            };
            (data.keys(), shape_key)
        });
        DependencyRegistry::track(target.id(), &shape_key);
        keys
    }

    fn len(&self, target: &Object) -> usize {
        let (len, shape_key) = target.read(|data| {
            let shape_key = match data {
                Data::Record(_) => PropertyKey::Shape,
                Data::Sequence(_) => PropertyKey::Length,
            };
            (data.len(), shape_key)
        });
        DependencyRegistry::track(target.id(), &shape_key);
        len
    }

    fn mutate(&self, target: &Object, op: SequenceOp) -> Result<Vec<Value>> {
        let id = target.id();
        let (removed, changes) = target.write(|data| match data {
            Data::Sequence(items) => {
                let before = items.clone();
                let edit = op.apply(items);
                Ok((edit.removed, diff(&before, items)))
            }
            Data::Record(_) => Err(ReactiveError::NotASequence(id)),
        })?;

        Self::notify_all(target, &changes);
        Ok(removed)
    }
}
