//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a
//! property it read changes.
//!
//! # How Effects Work
//!
//! 1. When created through [`Runtime::create_effect`], the effect runs its
//!    function immediately to establish initial dependencies.
//!
//! 2. Every tracked read performed while the effect is on top of the effect
//!    stack subscribes it to that `(object, property)` pair.
//!
//! 3. A write to a subscribed pair re-runs the effect synchronously.
//!
//! Subscriptions are never cleared: an effect stays subscribed to every pair
//! it has read at some point. Effects are identified by [`EffectId`], so a
//! repeated read does not subscribe the same effect twice.
//!
//! [`Runtime::create_effect`]: super::Runtime::create_effect

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::Result;

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The body of an effect. Errors propagate to whoever ran the effect.
pub type EffectFn = dyn Fn() -> Result<()> + Send + Sync;

/// A side-effecting computation that runs when dependencies change.
///
/// Cloning an `Effect` yields another handle to the same computation.
///
/// # Example
///
/// ```rust,ignore
/// let runtime = Runtime::new();
/// let data = runtime.wrap_json(json!({ "count": 0 })).as_observable().cloned().unwrap();
///
/// let reader = data.clone();
/// runtime.create_effect(move || {
///     println!("Count is: {}", reader.get("count"));
///     Ok(())
/// });
///
/// data.set("count", 5.into()); // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    id: EffectId,

    /// The effect function.
    run: Arc<EffectFn>,

    /// Number of times the effect has run.
    run_count: Arc<AtomicUsize>,
}

impl Effect {
    /// Create a new effect without running it.
    ///
    /// Use [`Runtime::create_effect`](super::Runtime::create_effect) to
    /// create and run one in a single step.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self {
            id: EffectId::new(),
            run: Arc::new(run),
            run_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }

    /// Call the effect body. Dependency tracking is the caller's job.
    pub(crate) fn invoke(&self) -> Result<()> {
        self.run_count.fetch_add(1, Ordering::SeqCst);
        (self.run)()
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
