//! Counter demo.
//!
//! A renderer effect draws the counter, an event source writes to the store,
//! and a host loop drives the events. Run with:
//!
//! ```text
//! RUST_LOG=weft_core=debug cargo run --example counter -- accessor
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use weft_core::{Reactive, Result, Store, StoreConfig, Strategy, Value};

enum Event {
    Increment,
    Reset,
    Rename(&'static str),
    AddTodo(&'static str),
}

fn render(state: &Reactive, output: &Mutex<Vec<String>>) {
    let label = state
        .get("label")
        .and_then(|value| value.as_str().map(str::to_owned))
        .unwrap_or_default();
    let count = state.get("count").and_then(|value| value.as_f64()).unwrap_or(0.0);
    let line = format!("{label}: {count}");
    println!("render  | {line}");
    output.lock().push(line);
}

fn handle(state: &Reactive, event: Event) -> Result<()> {
    match event {
        Event::Increment => {
            let count = state.get("count").and_then(|value| value.as_f64()).unwrap_or(0.0);
            state.set("count", count + 1.0)
        }
        Event::Reset => state.set("count", 0),
        Event::Rename(label) => state.set("label", label),
        Event::AddTodo(title) => {
            let todos = state.child("todos").ok_or(weft_core::ReactiveError::NotStructured)?;
            todos.push(json!({ "title": title, "done": false }))?;
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let strategy = match std::env::args().nth(1).as_deref() {
        Some("accessor") => Strategy::Accessor,
        _ => Strategy::Proxy,
    };
    let store = Store::new(StoreConfig::default().with_strategy(strategy));
    println!("strategy | {strategy:?}");

    let state = store.reactive(json!({
        "label": "clicks",
        "count": 0,
        "todos": [],
    }))?;

    let output = Arc::new(Mutex::new(Vec::new()));
    let (s, o) = (state.clone(), Arc::clone(&output));
    let _renderer = store.run_effect(move || render(&s, &o));

    let todos = state.child("todos").ok_or(weft_core::ReactiveError::NotStructured)?;
    let t = todos.clone();
    let _todo_count = store.run_effect(move || println!("todos   | {} item(s)", t.len()));

    let _watcher = store.watch_path(&state, "count", |new: &Value, old: &Value| {
        println!("watch   | count {old:?} -> {new:?}");
    });

    let events = vec![
        Event::Increment,
        Event::Increment,
        // Same value again: nothing renders.
        Event::Rename("clicks"),
        Event::Rename("taps"),
        Event::AddTodo("write docs"),
        Event::Reset,
    ];

    // Host loop: one event per tick.
    for (tick, event) in events.into_iter().enumerate() {
        println!("tick {tick}");
        handle(&state, event)?;
    }

    println!("rendered {} frame(s)", output.lock().len());
    println!("final   | {}", state.to_json()?);
    Ok(())
}
