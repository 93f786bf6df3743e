//! Weft Core
//!
//! This crate provides a fine-grained reactive state engine. Plain records
//! and sequences are made reactive; effects that read them re-run
//! automatically, and only for the properties they actually read.
//!
//! It implements:
//!
//! - A dynamically shaped data model with identity semantics
//! - Per-property dependency tracking through a thread-local context stack
//! - Effects and watchers
//! - Two interchangeable interception strategies
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: Records, sequences and primitive values
//! - `reactive`: Dependency sets, the registry, effects and tracking context
//! - `intercept`: The accessor and proxy interception strategies
//! - `store`: The entry point tying strategies to effects
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use weft_core::{reactive, run_effect};
//!
//! let state = reactive(json!({ "count": 0, "label": "clicks" }))?;
//!
//! let s = state.clone();
//! run_effect(move || {
//!     println!("{:?} {:?}", s.get("label"), s.get("count"));
//! });
//!
//! // Effect re-runs, prints the new count.
//! state.set("count", 5)?;
//!
//! // Same value: nothing runs.
//! state.set("count", 5)?;
//! ```

pub mod error;
pub mod intercept;
pub mod reactive;
pub mod store;
pub mod value;

pub use error::{ReactiveError, Result};
pub use intercept::{Interceptor, Strategy};
pub use reactive::{untracked, Effect, Watcher};
pub use store::{reactive, run_effect, wrap, Reactive, Store, StoreConfig};
pub use value::{Data, Object, ObjectId, PropertyKey, SequenceOp, Value};
