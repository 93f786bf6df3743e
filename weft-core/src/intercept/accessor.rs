//! Eager accessor installation.
//!
//! When an object is wrapped, every property it has at that moment gets an
//! accessor with its own dependency set, and every nested structured value
//! is wrapped the same way, recursively. Reads of a property without an
//! accessor are not tracked; [`Interceptor::set`] is the only way to add one
//! later, and doing so notifies the container-level (`Shape`) dependency.
//!
//! Sequences do not get per-index accessors. Any read of a sequence tracks
//! its `Shape`, and every mutating operation notifies `Shape` once per call,
//! whether or not it changed anything.

use std::fmt;

use indexmap::IndexSet;
use parking_lot::RwLock;

use super::{check_index, invalid_key, length_from, observe, observe_object, Interceptor, Strategy};
use crate::error::{ReactiveError, Result};
use crate::reactive::DependencyRegistry;
use crate::value::{Data, Object, PropertyKey, SequenceOp, Value};

/// Interceptor that installs per-property accessors up front.
pub struct AccessorInterceptor {
    /// Record keys that have an accessor.
    installed: RwLock<IndexSet<String>>,
}

impl AccessorInterceptor {
    pub fn new() -> Self {
        Self {
            installed: RwLock::new(IndexSet::new()),
        }
    }

    /// Keys that currently have an accessor, in installation order.
    pub fn installed_keys(&self) -> Vec<String> {
        self.installed.read().iter().cloned().collect()
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.read().contains(name)
    }

    fn install(&self, target: &Object, name: &str) {
        self.installed.write().insert(name.to_owned());
        DependencyRegistry::dep_for(target.id(), &PropertyKey::Name(name.to_owned()));
    }

    fn notify_shape(target: &Object) -> usize {
        DependencyRegistry::dep_for(target.id(), &PropertyKey::Shape).notify()
    }

    /// Reading a property that holds a container also subscribes to the
    /// container's shape.
    fn track_child_shape(value: &Value) {
        if let Value::Object(child) = value {
            if child.is_reactive() {
                DependencyRegistry::track(child.id(), &PropertyKey::Shape);
            }
        }
    }

    fn resize(&self, target: &Object, new_len: usize) -> Result<()> {
        let len = target.len_untracked();
        let op = match new_len.cmp(&len) {
            std::cmp::Ordering::Equal => return Ok(()),
            std::cmp::Ordering::Less => SequenceOp::Splice {
                start: new_len,
                delete_count: len - new_len,
                items: Vec::new(),
            },
            std::cmp::Ordering::Greater => SequenceOp::Push(vec![Value::Null; new_len - len]),
        };
        self.mutate(target, op).map(drop)
    }
}

impl Default for AccessorInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AccessorInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorInterceptor")
            .field("installed", &*self.installed.read())
            .finish()
    }
}

impl Interceptor for AccessorInterceptor {
    fn strategy(&self) -> Strategy {
        Strategy::Accessor
    }

    fn attach(&self, target: &Object) {
        DependencyRegistry::dep_for(target.id(), &PropertyKey::Shape);

        let (names, children) = target.read(|data| {
            let names: Vec<String> = match data {
                Data::Record(map) => map.keys().cloned().collect(),
                Data::Sequence(_) => Vec::new(),
            };
            (names, data.children())
        });

        for name in &names {
            self.install(target, name);
        }
        // Objects already wrapped (including cycles back to `target`) are
        // left as they are.
        for child in &children {
            observe_object(child, Strategy::Accessor);
        }
    }

    fn get(&self, target: &Object, key: PropertyKey) -> Option<Value> {
        let (key, value, is_sequence) = target.read(|data| {
            let key = key.normalize_for(data);
            let value = data.get(&key);
            (key, value, matches!(data, Data::Sequence(_)))
        });

        if is_sequence {
            DependencyRegistry::track(target.id(), &PropertyKey::Shape);
            return value;
        }

        if let PropertyKey::Name(name) = &key {
            if self.is_installed(name) {
                DependencyRegistry::track(target.id(), &key);
                if let Some(value) = &value {
                    Self::track_child_shape(value);
                }
            }
        }
        value
    }

    fn set(&self, target: &Object, key: PropertyKey, value: Value) -> Result<()> {
        let (key, len, is_sequence) = target.read(|data| {
            (
                key.normalize_for(data),
                data.len(),
                matches!(data, Data::Sequence(_)),
            )
        });

        if is_sequence {
            return match key {
                PropertyKey::Index(index) if index < len => {
                    if target.get_untracked(index).as_ref() == Some(&value) {
                        return Ok(());
                    }
                    self.mutate(
                        target,
                        SequenceOp::Splice {
                            start: index,
                            delete_count: 1,
                            items: vec![value],
                        },
                    )
                    .map(drop)
                }
                PropertyKey::Index(index) => {
                    let index = check_index(index)?;
                    let mut items = vec![Value::Null; index - len];
                    items.push(value);
                    self.mutate(
                        target,
                        SequenceOp::Splice {
                            start: len,
                            delete_count: 0,
                            items,
                        },
                    )
                    .map(drop)
                }
                PropertyKey::Length => self.resize(target, length_from(&value)?),
                key => Err(invalid_key(key, "sequence")),
            };
        }

        let name = match key {
            PropertyKey::Name(name) => name,
            key => return Err(invalid_key(key, "record")),
        };

        if self.is_installed(&name) {
            let changed = target.write(|data| match data {
                Data::Record(map) => {
                    if map.get(&name) == Some(&value) {
                        false
                    } else {
                        map.insert(name.clone(), value.clone());
                        true
                    }
                }
                Data::Sequence(_) => false,
            });
            // Writing the current value is a no-op.
            if !changed {
                return Ok(());
            }
            observe(&value, Strategy::Accessor);
            DependencyRegistry::dep_for(target.id(), &PropertyKey::Name(name)).notify();
        } else {
            target.write(|data| {
                if let Data::Record(map) = data {
                    map.insert(name.clone(), value.clone());
                }
            });
            self.install(target, &name);
            observe(&value, Strategy::Accessor);
            // Readers from before a delete are still subscribed to the key.
            DependencyRegistry::trigger(target.id(), &PropertyKey::Name(name));
            Self::notify_shape(target);
        }
        Ok(())
    }

    fn delete(&self, target: &Object, key: PropertyKey) -> Result<Option<Value>> {
        let (key, len, is_sequence) = target.read(|data| {
            (
                key.normalize_for(data),
                data.len(),
                matches!(data, Data::Sequence(_)),
            )
        });

        if is_sequence {
            return match key {
                PropertyKey::Index(index) if index < len => {
                    let removed = self.mutate(
                        target,
                        SequenceOp::Splice {
                            start: index,
                            delete_count: 1,
                            items: Vec::new(),
                        },
                    )?;
                    Ok(removed.into_iter().next())
                }
                PropertyKey::Index(_) => Ok(None),
                key => Err(invalid_key(key, "sequence")),
            };
        }

        let name = match key {
            PropertyKey::Name(name) => name,
            key => return Err(invalid_key(key, "record")),
        };

        let removed = target.write(|data| match data {
            Data::Record(map) => map.shift_remove(&name),
            Data::Sequence(_) => None,
        });
        if removed.is_some() {
            self.installed.write().shift_remove(&name);
            DependencyRegistry::trigger(target.id(), &PropertyKey::Name(name));
            Self::notify_shape(target);
        }
        Ok(removed)
    }

    fn keys(&self, target: &Object) -> Vec<PropertyKey> {
        DependencyRegistry::track(target.id(), &PropertyKey::Shape);
        target.read(Data::keys)
    }

    fn len(&self, target: &Object) -> usize {
        DependencyRegistry::track(target.id(), &PropertyKey::Shape);
        target.len_untracked()
    }

    fn mutate(&self, target: &Object, op: SequenceOp) -> Result<Vec<Value>> {
        let id = target.id();
        let edit = target.write(|data| match data {
            Data::Sequence(items) => Ok(op.apply(items)),
            Data::Record(_) => Err(ReactiveError::NotASequence(id)),
        })?;

        for value in &edit.inserted {
            observe(value, Strategy::Accessor);
        }
        // Every mutating call notifies, even when nothing moved.
        Self::notify_shape(target);
        Ok(edit.removed)
    }
}
