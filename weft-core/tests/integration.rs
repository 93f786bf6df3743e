//! Integration Tests for the Reactive Store
//!
//! These tests verify that stores, effects and both interception strategies
//! work together correctly.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use parking_lot::Mutex;
use serde_json::json;

use weft_core::reactive::{DependencyRegistry, ReactiveContext};
use weft_core::{
    untracked, wrap, PropertyKey, Reactive, ReactiveError, Store, StoreConfig, Strategy, Value,
};

const STRATEGIES: [Strategy; 2] = [Strategy::Accessor, Strategy::Proxy];

fn store(strategy: Strategy) -> Store {
    Store::with_strategy(strategy)
}

fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
    let count = Arc::new(AtomicI32::new(0));
    (count.clone(), count)
}

fn number(state: &Reactive, key: &str) -> f64 {
    state.get(key).and_then(|value| value.as_f64()).unwrap_or(f64::NAN)
}

/// Test the counter scenario: one log line per distinct write.
#[test]
fn counter_logs_once_per_change() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "count": 0 })).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let s = state.clone();
        let l = log.clone();
        store.run_effect(move || l.lock().push(number(&s, "count")));
        assert_eq!(*log.lock(), vec![0.0]);

        state.set("count", 1).unwrap();
        assert_eq!(*log.lock(), vec![0.0, 1.0]);

        // Writing the current value is silent.
        state.set("count", 1).unwrap();
        assert_eq!(*log.lock(), vec![0.0, 1.0]);

        state.set("count", 2).unwrap();
        assert_eq!(*log.lock(), vec![0.0, 1.0, 2.0], "strategy {strategy:?}");
    }
}

/// Test that the effect has re-run by the time the write returns.
#[test]
fn write_reruns_effect_synchronously() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "x": 1 })).unwrap();
        let (runs, runs_clone) = counter();

        let s = state.clone();
        let effect = store.run_effect(move || {
            s.get("x");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        state.set("x", 2).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(effect.run_count(), 2);
    }
}

/// Test that writing one property leaves effects on other properties alone.
#[test]
fn effects_are_isolated_by_property() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "a": 1, "b": 1, "c": 1 })).unwrap();
        let (runs, runs_clone) = counter();

        let s = state.clone();
        store.run_effect(move || {
            s.get("b");
            s.get("c");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        state.set("a", 2).unwrap();
        state.set("a", 3).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        state.set("c", 2).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}

/// Test that reads outside any effect are not tracked.
#[test]
fn reads_outside_effects_are_not_tracked() {
    for strategy in STRATEGIES {
        let state = store(strategy).reactive(json!({ "a": 1 })).unwrap();
        assert!(!ReactiveContext::is_active());

        state.get("a");
        let dep = DependencyRegistry::lookup(state.id(), &PropertyKey::from("a"));
        assert!(dep.map_or(true, |dep| dep.subscriber_count() == 0));
    }
}

/// Test that effects on the same property run in subscription order.
#[test]
fn effects_run_in_subscription_order() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "k": 0 })).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let s = state.clone();
            let o = order.clone();
            store.run_effect(move || {
                s.get("k");
                o.lock().push(name);
            });
        }
        order.lock().clear();

        state.set("k", 1).unwrap();
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }
}

/// Test that wrapping twice yields the same object.
#[test]
fn wrapping_is_idempotent() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let once = store.wrap(json!({ "nested": { "a": 1 } }));
        let twice = store.wrap(once.clone());
        assert_eq!(once, twice);

        let first = once.as_reactive().unwrap();
        let second = store.reactive(twice).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.id(), second.id());
    }
}

/// Test that an object wrapped by one strategy keeps it when wrapped by the other.
#[test]
fn first_strategy_wins() {
    let value = Store::with_strategy(Strategy::Accessor).wrap(json!({ "a": 1 }));
    let handle = Store::with_strategy(Strategy::Proxy).reactive(value).unwrap();
    assert_eq!(handle.strategy(), Strategy::Accessor);
}

/// Test that primitives pass through wrapping untouched.
#[test]
fn primitives_are_not_wrapped() {
    assert_eq!(wrap(3), Value::from(3));
    assert_eq!(wrap("text"), Value::from("text"));
    assert_eq!(wrap(Value::Null), Value::Null);
    assert!(matches!(
        Store::default().reactive(true),
        Err(ReactiveError::NotStructured)
    ));
}

/// Test that a nested property re-runs its readers when reassigned.
#[test]
fn nested_property_write_reruns_reader() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "user": { "name": "A" } })).unwrap();
        let names = Arc::new(Mutex::new(Vec::new()));

        let s = state.clone();
        let n = names.clone();
        store.run_effect(move || {
            n.lock().push(s.get_path("user.name").unwrap_or_default());
        });

        state.child("user").unwrap().set("name", "B").unwrap();
        assert_eq!(*names.lock(), vec![Value::from("A"), Value::from("B")]);
    }
}

/// Test that dependencies follow property paths, not deep equality.
#[test]
fn replacing_parent_does_not_rerun_reader_of_old_child() {
    let store = store(Strategy::Accessor);
    let state = store.reactive(json!({ "user": { "name": "A" } })).unwrap();
    let user = state.child("user").unwrap();
    let (runs, runs_clone) = counter();

    let u = user.clone();
    store.run_effect(move || {
        u.get("name");
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    state.set("user", json!({ "name": "Z" })).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(state.get_path("user.name"), Some(Value::from("Z")));

    // The detached child still notifies its own readers.
    user.set("name", "B").unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that reading through the parent makes the parent a dependency too.
#[test]
fn replacing_parent_reruns_reader_of_path() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "user": { "name": "A" } })).unwrap();
        let names = Arc::new(Mutex::new(Vec::new()));

        let s = state.clone();
        let n = names.clone();
        store.run_effect(move || {
            n.lock().push(s.get_path("user.name").unwrap_or_default());
        });

        state.set("user", json!({ "name": "Z" })).unwrap();
        assert_eq!(names.lock().last(), Some(&Value::from("Z")));

        // The replacement is reactive as well.
        state.child("user").unwrap().set("name", "Y").unwrap();
        assert_eq!(names.lock().last(), Some(&Value::from("Y")));
    }
}

/// Test that a push re-runs a sequence reader exactly once.
#[test]
fn push_notifies_sequence_reader_once() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let list = store.reactive(json!(["a", "b", "c"])).unwrap();
        let (runs, runs_clone) = counter();

        let l = list.clone();
        store.run_effect(move || {
            for index in 0..l.len() {
                l.get(index);
            }
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        list.push("d").unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2, "strategy {strategy:?}");
        assert_eq!(list.to_json().unwrap(), json!(["a", "b", "c", "d"]));
    }
}

/// Test that the accessor strategy notifies on every mutating call.
#[test]
fn accessor_notifies_sort_of_sorted_sequence() {
    let store = store(Strategy::Accessor);
    let list = store.reactive(json!([1, 2, 3])).unwrap();
    let (runs, runs_clone) = counter();

    let l = list.clone();
    store.run_effect(move || {
        l.len();
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    list.sort().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    list.sort().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// Test that the proxy strategy only notifies slots that changed.
#[test]
fn proxy_skips_sort_of_sorted_sequence() {
    let store = store(Strategy::Proxy);
    let list = store.reactive(json!([3, 1, 2])).unwrap();
    let (runs, runs_clone) = counter();

    let l = list.clone();
    store.run_effect(move || {
        l.get(0usize);
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    list.sort().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(list.to_json().unwrap(), json!([1, 2, 3]));

    list.sort().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that elements inserted into a sequence become reactive.
#[test]
fn inserted_elements_are_reactive() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let list = store.reactive(json!([])).unwrap();
        list.push(json!({ "done": false })).unwrap();

        let item = list.child(0usize).unwrap();
        let (runs, runs_clone) = counter();
        let i = item.clone();
        store.run_effect(move || {
            i.get("done");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        item.set("done", true).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}

/// Test that adding a property notifies effects that iterated the keys.
#[test]
fn adding_property_notifies_key_iteration() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "a": 1 })).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = state.clone();
        let k = seen.clone();
        store.run_effect(move || k.lock().push(s.keys().len()));

        state.set("b", 2).unwrap();
        assert_eq!(*seen.lock(), vec![1, 2]);

        state.delete("a").unwrap();
        assert_eq!(*seen.lock(), vec![1, 2, 1]);
    }
}

/// Test that a property added through `set` is tracked from then on.
#[test]
fn added_property_is_tracked() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({})).unwrap();
        state.set("late", 1).unwrap();

        let (runs, runs_clone) = counter();
        let s = state.clone();
        store.run_effect(move || {
            s.get("late");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        state.set("late", 2).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}

/// Test that the proxy strategy tracks keys that do not exist yet.
#[test]
fn proxy_tracks_missing_keys() {
    let store = store(Strategy::Proxy);
    let state = store.reactive(json!({})).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let s = state.clone();
    let k = seen.clone();
    store.run_effect(move || k.lock().push(s.get("later")));

    state.set("later", "here").unwrap();
    assert_eq!(*seen.lock(), vec![None, Some(Value::from("here"))]);
}

/// Test that plain objects cannot be mutated behind the interceptor's back.
#[test]
fn raw_writes_to_reactive_objects_fail() {
    for strategy in STRATEGIES {
        let list = store(strategy).reactive(json!([1])).unwrap();
        assert!(matches!(
            list.object().push(2),
            Err(ReactiveError::AlreadyReactive(_))
        ));
        assert_eq!(list.len(), 1);
    }
}

/// Test that an effect created inside another does not end outer tracking.
#[test]
fn nested_effect_keeps_outer_tracking() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "before": 0, "after": 0 })).unwrap();
        let (runs, runs_clone) = counter();

        let s = state.clone();
        let inner_store = store.clone();
        store.run_effect(move || {
            s.get("before");
            inner_store.run_effect(|| {});
            s.get("after");
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        state.set("after", 1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}

/// Test that an effect writing what it reads settles once values repeat.
#[test]
fn self_write_settles_on_equal_value() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "n": 0 })).unwrap();
        let (runs, runs_clone) = counter();

        let s = state.clone();
        store.run_effect(move || {
            let n = number(&s, "n");
            runs_clone.fetch_add(1, Ordering::SeqCst);
            s.set("n", n.min(3.0) + if n < 3.0 { 1.0 } else { 0.0 }).unwrap();
        });

        // 0 -> 1 -> 2 -> 3, then the write of 3 is a no-op.
        assert_eq!(number(&state, "n"), 3.0);
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }
}

/// Test that untracked reads inside an effect create no dependency.
#[test]
fn untracked_reads_do_not_subscribe() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "seen": 0, "hidden": 0 })).unwrap();
        let (runs, runs_clone) = counter();

        let s = state.clone();
        store.run_effect(move || {
            s.get("seen");
            untracked(|| s.get("hidden"));
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        state.set("hidden", 1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        state.set("seen", 1).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}

/// Test pruning of dependencies an effect stopped reading.
#[test]
fn pruning_store_drops_stale_branches() {
    for prune in [false, true] {
        let store = Store::new(StoreConfig::default().with_pruning(prune));
        let state = store
            .reactive(json!({ "flag": true, "yes": 0, "no": 0 }))
            .unwrap();
        let (runs, runs_clone) = counter();

        let s = state.clone();
        store.run_effect(move || {
            if s.get("flag") == Some(Value::from(true)) {
                s.get("yes");
            } else {
                s.get("no");
            }
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        state.set("flag", false).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        state.set("yes", 1).unwrap();
        let expected = if prune { 2 } else { 3 };
        assert_eq!(runs.load(Ordering::SeqCst), expected, "prune = {prune}");
    }
}

/// Test disposing an effect through its handle.
#[test]
fn disposed_effect_stops_running() {
    let store = Store::default();
    let state = store.reactive(json!({ "x": 0 })).unwrap();
    let (runs, runs_clone) = counter();

    let s = state.clone();
    let effect = store.run_effect(move || {
        s.get("x");
        runs_clone.fetch_add(1, Ordering::SeqCst);
    });

    effect.dispose();
    state.set("x", 1).unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(effect.dependency_count(), 0);
}

/// Test watching a property path.
#[test]
fn watch_path_reports_new_and_old() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "user": { "name": "A" } })).unwrap();
        let changes = Arc::new(Mutex::new(Vec::new()));

        let c = changes.clone();
        let watcher = store.watch_path(&state, "user.name", move |new, old| {
            c.lock().push((new.clone(), old.clone()));
        });
        assert_eq!(watcher.value(), Value::from("A"));

        state.set("user", json!({ "name": "B" })).unwrap();
        state.child("user").unwrap().set("name", "C").unwrap();

        assert_eq!(
            *changes.lock(),
            vec![
                (Value::from("B"), Value::from("A")),
                (Value::from("C"), Value::from("B")),
            ]
        );
    }
}

/// Test loading store configuration from JSON.
#[test]
fn store_config_from_json() {
    let config =
        StoreConfig::from_json(r#"{ "strategy": "accessor", "prune_stale_dependencies": true }"#)
            .unwrap();
    assert_eq!(config.strategy, Strategy::Accessor);
    assert!(config.prune_stale_dependencies);

    let store = Store::new(config);
    let state = store.reactive(json!({})).unwrap();
    assert_eq!(state.strategy(), Strategy::Accessor);

    assert!(StoreConfig::from_json("not json").is_err());
}

/// Test that a dropped object's dependencies leave the registry.
#[test]
fn dropped_object_is_forgotten() {
    let state = Store::default().reactive(json!({ "a": 1 })).unwrap();
    let id = state.id();

    let s = state.clone();
    let effect = weft_core::run_effect(move || {
        s.get("a");
    });
    assert!(DependencyRegistry::contains(id));

    // The effect's closure holds the only other handle.
    effect.dispose();
    drop(effect);
    drop(state);
    assert!(!DependencyRegistry::contains(id));
}

/// Test that a snapshot reflects writes made through the handle.
#[test]
fn to_json_reflects_writes() {
    for strategy in STRATEGIES {
        let state = store(strategy)
            .reactive(json!({ "items": [1, 2], "meta": { "ok": true } }))
            .unwrap();
        state.child("items").unwrap().push(3).unwrap();
        state.child("meta").unwrap().set("ok", false).unwrap();
        state.set("extra", Value::Null).unwrap();

        assert_eq!(
            state.to_json().unwrap(),
            json!({ "items": [1, 2, 3], "meta": { "ok": false }, "extra": null })
        );
    }
}

/// Test that a cyclic structure can be wrapped but not serialized.
#[test]
fn cycles_wrap_but_do_not_serialize() {
    for strategy in STRATEGIES {
        let object = weft_core::Object::record();
        object.insert("me", object.clone()).unwrap();

        let state = store(strategy).reactive(object.clone()).unwrap();
        assert_eq!(state.child("me"), Some(state.clone()));
        assert!(matches!(state.to_json(), Err(ReactiveError::Cycle(_))));

        // Break the cycle so the object can be released.
        state.delete("me").unwrap();
    }
}

/// Test that deleting a property and adding it back re-runs its readers.
#[test]
fn delete_then_re_add_reruns_reader() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "a": 1 })).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let s = state.clone();
        let l = log.clone();
        store.run_effect(move || l.lock().push(s.get("a")));

        assert_eq!(state.delete("a").unwrap(), Some(Value::from(1)));
        assert_eq!(*log.lock(), vec![Some(Value::from(1)), None]);

        state.set("a", 5).unwrap();
        assert_eq!(
            *log.lock(),
            vec![Some(Value::from(1)), None, Some(Value::from(5))],
            "strategy {strategy:?}"
        );
    }
}

/// Test that oversized lengths and indices are rejected without allocating.
#[test]
fn oversized_sequence_writes_are_rejected() {
    for strategy in STRATEGIES {
        let list = store(strategy).reactive(json!([1, 2])).unwrap();

        assert!(matches!(
            list.set(PropertyKey::Length, 1e300),
            Err(ReactiveError::InvalidLength(_))
        ));
        assert!(matches!(
            list.set(usize::MAX, 1),
            Err(ReactiveError::InvalidKey { kind: "sequence", .. })
        ));
        assert!(matches!(
            list.set("4294967295", 1),
            Err(ReactiveError::InvalidKey { kind: "sequence", .. })
        ));
        assert_eq!(list.to_json().unwrap(), json!([1, 2]));
    }
}

/// Test that non-canonical index names do not address sequence slots.
#[test]
fn non_canonical_index_names_are_not_indices() {
    for strategy in STRATEGIES {
        let list = store(strategy).reactive(json!(["a", "b"])).unwrap();
        assert_eq!(list.get("1"), Some(Value::from("b")));
        assert_eq!(list.get("01"), None);
        assert_eq!(list.get_path("1"), Some(Value::from("b")));
        assert!(matches!(
            list.set("01", "x"),
            Err(ReactiveError::InvalidKey { .. })
        ));
    }
}

/// Test that effects running at the same time on different threads only
/// subscribe to what they read themselves.
#[test]
fn concurrent_effects_track_their_own_reads() {
    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store.reactive(json!({ "left": 0, "right": 0 })).unwrap();
        let barrier = Arc::new(Barrier::new(2));

        let spawn = |key: &'static str| {
            let store = store.clone();
            let s = state.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let first_run = AtomicBool::new(true);
                let runs = Arc::new(AtomicI32::new(0));
                let r = runs.clone();
                let effect = store.run_effect(move || {
                    s.get(key);
                    // Both effects are mid-run on their own threads here.
                    if first_run.swap(false, Ordering::SeqCst) {
                        barrier.wait();
                    }
                    r.fetch_add(1, Ordering::SeqCst);
                });
                (effect, runs)
            })
        };
        let left = spawn("left");
        let right = spawn("right");
        let (left, left_runs) = left.join().unwrap();
        let (right, right_runs) = right.join().unwrap();

        let left_dep = DependencyRegistry::lookup(state.id(), &PropertyKey::from("left")).unwrap();
        let right_dep = DependencyRegistry::lookup(state.id(), &PropertyKey::from("right")).unwrap();
        assert_eq!(left_dep.subscriber_ids(), vec![left.subscriber_id()]);
        assert_eq!(right_dep.subscriber_ids(), vec![right.subscriber_id()]);
        assert_eq!(left.dependency_count(), 1);
        assert_eq!(right.dependency_count(), 1);

        state.set("left", 1).unwrap();
        assert_eq!(left_runs.load(Ordering::SeqCst), 2);
        assert_eq!(right_runs.load(Ordering::SeqCst), 1);
    }
}

/// Test that writers on several threads each re-run only their own effect.
#[test]
fn concurrent_writers_notify_their_own_effects() {
    const THREADS: usize = 4;
    const WRITES: i32 = 100;

    for strategy in STRATEGIES {
        let store = store(strategy);
        let state = store
            .reactive(json!({ "k0": 0, "k1": 0, "k2": 0, "k3": 0 }))
            .unwrap();

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let store = store.clone();
                let state = state.clone();
                thread::spawn(move || {
                    let key = format!("k{i}");
                    let (runs, runs_clone) = counter();
                    let s = state.clone();
                    let k = key.clone();
                    let effect = store.run_effect(move || {
                        s.get(k.as_str());
                        runs_clone.fetch_add(1, Ordering::SeqCst);
                    });
                    for n in 1..=WRITES {
                        state.set(key.as_str(), n).unwrap();
                    }
                    effect.dispose();
                    runs.load(Ordering::SeqCst)
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), WRITES + 1);
        }
        assert_eq!(
            state.to_json().unwrap(),
            json!({ "k0": WRITES, "k1": WRITES, "k2": WRITES, "k3": WRITES })
        );
    }
}
