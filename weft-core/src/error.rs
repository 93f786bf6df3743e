//! Error types for the reactive store.
//!
//! Most edge cases in the engine are policy decisions (untracked reads, no-op
//! writes) and never surface as errors. The variants here cover API misuse:
//! asking for a typed handle over a primitive, sequence operations on a
//! record, or mutating a wrapped object behind its interceptor's back.

use thiserror::Error;

use crate::value::{ObjectId, PropertyKey, Value};

/// Errors produced by the reactive store.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// Only records and sequences can be made reactive.
    #[error("value is not structured and cannot be made reactive")]
    NotStructured,

    /// A sequence operation was applied to a record.
    #[error("object {0} is a record, not a sequence")]
    NotASequence(ObjectId),

    /// The key does not address anything on this kind of object.
    #[error("key `{key}` is not valid for a {kind}")]
    InvalidKey {
        key: PropertyKey,
        kind: &'static str,
    },

    /// A sequence length must be a non-negative integer.
    #[error("invalid sequence length: {0:?}")]
    InvalidLength(Value),

    /// The object has an interceptor attached; raw mutation would bypass it.
    #[error("object {0} is reactive; write through its reactive handle")]
    AlreadyReactive(ObjectId),

    /// The object graph contains a cycle and cannot be serialized.
    #[error("cycle detected at object {0} while serializing")]
    Cycle(ObjectId),

    /// The store configuration could not be parsed.
    #[error("invalid store configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
