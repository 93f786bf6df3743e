//! Watchers
//!
//! A watcher is an effect that caches the value produced by a getter and
//! calls back with the new and previous value whenever a re-run produces a
//! different one.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::context::untracked;
use super::effect::Effect;
use crate::value::Value;

/// Calls back when a tracked computation changes its result.
///
/// The callback does not run for the initial evaluation, and it runs
/// untracked, so whatever it reads does not become a dependency.
pub struct Watcher {
    effect: Effect,
    value: Arc<Mutex<Option<Value>>>,
}

impl Watcher {
    /// Create a watcher and evaluate `getter` once.
    pub fn new<G, C>(getter: G, callback: C) -> Self
    where
        G: Fn() -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        Self::create(getter, callback, false)
    }

    pub(crate) fn create<G, C>(getter: G, callback: C, prune_stale: bool) -> Self
    where
        G: Fn() -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let value: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let cache = Arc::clone(&value);

        let effect = Effect::create(
            move || {
                let new_value = getter();
                // The lock is released before the callback, which may write.
                let old_value = cache.lock().replace(new_value.clone());
                match old_value {
                    Some(old_value) if old_value != new_value => {
                        trace!(?old_value, ?new_value, "watched value changed");
                        untracked(|| callback(&new_value, &old_value));
                    }
                    _ => {}
                }
            },
            prune_stale,
        );
        effect.run();

        Self { effect, value }
    }

    /// The most recent result of the getter.
    pub fn value(&self) -> Value {
        self.value.lock().clone().unwrap_or_default()
    }

    /// The effect driving this watcher.
    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    /// Stop watching.
    pub fn dispose(&self) {
        self.effect.dispose();
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("effect", &self.effect)
            .field("value", &*self.value.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::Strategy;
    use crate::store::Store;
    use serde_json::json;

    #[test]
    fn callback_skips_first_run_and_unchanged_results() {
        for strategy in [Strategy::Accessor, Strategy::Proxy] {
            let state = Store::with_strategy(strategy)
                .reactive(json!({"a": 1, "b": 1}))
                .unwrap();
            let seen = Arc::new(Mutex::new(Vec::new()));

            let s = state.clone();
            let log = Arc::clone(&seen);
            let watcher = Watcher::new(
                move || {
                    let a = s.get("a").and_then(|v| v.as_f64()).unwrap_or(0.0);
                    let b = s.get("b").and_then(|v| v.as_f64()).unwrap_or(0.0);
                    Value::from(a.max(b))
                },
                move |new, old| log.lock().push((new.clone(), old.clone())),
            );
            assert_eq!(watcher.value(), Value::from(1));
            assert!(seen.lock().is_empty());

            state.set("a", 2).unwrap();
            assert_eq!(*seen.lock(), vec![(Value::from(2), Value::from(1))]);

            // Max unchanged: the getter re-runs but no callback.
            state.set("b", 2).unwrap();
            assert_eq!(watcher.effect().run_count(), 3);
            assert_eq!(seen.lock().len(), 1);
            assert_eq!(watcher.value(), Value::from(2));
        }
    }

    #[test]
    fn disposed_watcher_stops_calling_back() {
        let state = Store::default().reactive(json!({"a": 1})).unwrap();
        let calls = Arc::new(Mutex::new(0));

        let s = state.clone();
        let c = Arc::clone(&calls);
        let watcher = Watcher::new(
            move || s.get("a").unwrap_or_default(),
            move |_, _| *c.lock() += 1,
        );
        state.set("a", 2).unwrap();
        watcher.dispose();
        state.set("a", 3).unwrap();

        assert_eq!(*calls.lock(), 1);
        assert_eq!(watcher.value(), Value::from(2));
    }

    #[test]
    fn callback_reads_are_not_tracked() {
        let state = Store::default().reactive(json!({"a": 1, "other": 0})).unwrap();
        let calls = Arc::new(Mutex::new(0));

        let s = state.clone();
        let reader = state.clone();
        let c = Arc::clone(&calls);
        let _watcher = Watcher::new(
            move || s.get("a").unwrap_or_default(),
            move |_, _| {
                reader.get("other");
                *c.lock() += 1;
            },
        );
        state.set("a", 2).unwrap();
        state.set("other", 1).unwrap();

        assert_eq!(*calls.lock(), 1);
    }
}
