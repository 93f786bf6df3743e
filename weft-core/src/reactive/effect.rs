//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever reactive
//! data it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. Every reactive read during a run records the effect in that
//!    property's dependency set.
//!
//! 3. A write to any of those properties calls [`Effect::update`], which
//!    runs the function again, synchronously, before the write returns.
//!
//! # Stale Dependencies
//!
//! By default an effect stays subscribed to every property it ever read,
//! even if a later run no longer reads it. Effects created with pruning
//! enabled instead detach from all their dependency sets before each run
//! and re-subscribe through tracking.
//!
//! # Use Cases
//!
//! Effects are used to synchronize reactive state with the outside world:
//!
//! - Rendering output when state changes
//! - Logging state changes
//! - Feeding derived values back into other stores

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::context::ReactiveContext;
use super::dep::{Dep, WeakDep};
use super::subscriber::{Subscriber, SubscriberId};

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique effect ID.
fn next_effect_id() -> u64 {
    EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let state = weft_core::reactive(serde_json::json!({ "count": 0 }))?;
///
/// let s = state.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {:?}", s.get("count"));
/// });
///
/// state.set("count", 5)?;  // Prints: "Count is: Some(Number(5.0))"
/// ```
pub struct Effect {
    inner: Arc<EffectInner>,
}

struct EffectInner {
    /// Unique identifier for this effect.
    id: u64,

    /// The subscriber ID used for dependency tracking.
    subscriber_id: SubscriberId,

    /// The effect function.
    run: Box<dyn Fn() + Send + Sync>,

    /// Dependency sets this effect belongs to.
    dependencies: Mutex<Vec<WeakDep>>,

    /// Whether the effect has been disposed.
    disposed: AtomicBool,

    /// Number of times the effect has run.
    run_count: AtomicUsize,

    /// Detach from all dependency sets before each run.
    prune_stale: bool,
}

impl EffectInner {
    fn execute(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        if self.prune_stale {
            self.detach();
        }

        debug!(effect = self.id, run = self.run_count.load(Ordering::Relaxed), "running effect");

        {
            let subscriber: Arc<dyn Subscriber> = self.clone();
            let _ctx = ReactiveContext::enter(subscriber);
            (self.run)();
        }

        self.run_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Remove this effect from every dependency set it belongs to.
    fn detach(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.lock());
        for dep in dependencies.iter().filter_map(WeakDep::upgrade) {
            dep.remove_subscriber(self.subscriber_id);
        }
    }
}

impl Subscriber for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn update(self: Arc<Self>) {
        self.execute();
    }

    fn on_track(&self, dep: &Dep) {
        self.dependencies.lock().push(dep.downgrade());
    }
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::create(run, false);
        effect.run();
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// Useful for cases where you want to control when the effect first runs.
    pub fn new_lazy<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::create(run, false)
    }

    pub(crate) fn create<F>(run: F, prune_stale: bool) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EffectInner {
                id: next_effect_id(),
                subscriber_id: SubscriberId::new(),
                run: Box::new(run),
                dependencies: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
                prune_stale,
            }),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Run the effect function, tracking every reactive read it performs.
    ///
    /// Does nothing once the effect is disposed.
    pub fn run(&self) {
        self.inner.execute();
    }

    /// Alias of [`Effect::run`]; this is what dependency sets invoke.
    pub fn update(&self) {
        self.inner.execute();
    }

    /// Dispose of the effect.
    ///
    /// The effect leaves every dependency set it belongs to and will not run
    /// again.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.detach();
        debug!(effect = self.inner.id, "effect disposed");
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Check if the effect detaches from its dependencies before each run.
    pub fn prunes_stale_dependencies(&self) -> bool {
        self.inner.prune_stale
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of live dependency sets the effect belongs to.
    pub fn dependency_count(&self) -> usize {
        self.inner
            .dependencies
            .lock()
            .iter()
            .filter_map(WeakDep::upgrade)
            .filter(|dep| dep.contains(self.inner.subscriber_id))
            .count()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
