//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! When a reactive property is read, the current computation is registered
//! as a dependent of that property.
//!
//! # Implementation
//!
//! We use a thread-local stack. Running an effect pushes it; the returned
//! guard pops it when dropped, even if the effect panics. An effect created
//! or re-run inside another effect therefore hands tracking back to the
//! outer one when it finishes.
//!
//! Entries may also be empty ([`untracked`]), which suspends tracking for a
//! region without touching the entries below it.

use std::cell::RefCell;
use std::sync::Arc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack: the running computation, or
/// `None` for an untracked region.
struct ContextEntry {
    subscriber: Option<Arc<dyn Subscriber>>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// The context is exited when the returned guard is dropped.
    pub fn enter(subscriber: Arc<dyn Subscriber>) -> Self {
        let subscriber_id = Some(subscriber.subscriber_id());
        Self::push(Some(subscriber));
        Self { subscriber_id }
    }

    /// Enter a region in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        Self::push(None);
        Self {
            subscriber_id: None,
        }
    }

    fn push(subscriber: Option<Arc<dyn Subscriber>>) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry { subscriber });
        });
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.subscriber.is_some())
        })
    }

    /// Get the subscriber that reads should be attributed to, if any.
    pub fn current_subscriber() -> Option<Arc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.clone())
        })
    }

    pub fn current_subscriber_id() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.as_ref().map(|s| s.subscriber_id()))
        })
    }

    /// Number of entries on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Take the entry out first so the subscriber is released after the
        // stack borrow ends.
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = popped {
            let popped_id = entry.subscriber.as_ref().map(|s| s.subscriber_id());
            debug_assert_eq!(
                popped_id, self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id, popped_id
            );
        }
    }
}

/// Run `f` without tracking any reads it performs.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}
