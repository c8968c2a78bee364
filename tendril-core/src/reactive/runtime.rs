//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects observables and
//! effects. It owns the dependency registry and the effect stack, and runs
//! effects when the properties they read change.
//!
//! # How It Works
//!
//! 1. Every observable holds a handle to the runtime that created it.
//!
//! 2. When an effect reads a property through [`Observable::get`], the runtime
//!    records `(object, property) -> effect` in the registry.
//!
//! 3. When a property is written through [`Observable::set`], the runtime
//!    looks up the effects registered for that pair and runs each of them,
//!    synchronously and in registration order, before the write returns.
//!
//! There is no batching: every write fans out immediately. Errors raised by
//! fanned-out effects do not stop the fan-out; they are reported to the
//! runtime's unhandled-error list instead.
//!
//! # Lifetime
//!
//! The registry only grows. Effects stay registered for every pair they have
//! ever read, including pairs on objects that are no longer reachable.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use thiserror::Error;

use super::context::EffectStack;
use super::effect::{Effect, EffectId};
use super::observable::{Observable, ObservableId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::value::{Key, Value};

/// Reasons the runtime refuses to run an effect or to store a write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The effect is already running further up the stack: its own writes
    /// (directly or through other effects) triggered it again.
    #[error("effect {0} was re-triggered while it was still running")]
    Cycle(EffectId),

    /// Too many effects are nested on the stack.
    #[error("effect nesting exceeded the limit of {limit}")]
    DepthExceeded { limit: usize },

    /// An array write past the largest supported length.
    #[error("array index {index} is out of range (limit {limit})")]
    IndexOutOfRange { index: usize, limit: usize },

    /// `length` was set to something that is not a valid array length.
    #[error("invalid array length `{0}`")]
    InvalidLength(String),
}

/// Effects registered per property of one observed object.
type PropertyEffects = IndexMap<Key, IndexMap<EffectId, Effect>>;

struct RuntimeInner {
    config: Config,

    /// Raw object -> property -> dependent effects, in registration order.
    registry: DashMap<ObservableId, PropertyEffects>,

    /// The effects currently executing.
    stack: EffectStack,

    /// Errors raised by effects and listeners that nobody handled.
    unhandled: Mutex<Vec<Error>>,
}

/// Handle to a reactive runtime.
///
/// One runtime is created per page (or test) and cloned into every
/// observable and directive handler. Clones share all state.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: Config) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                config,
                registry: DashMap::new(),
                stack: EffectStack::default(),
                unhandled: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Whether two handles refer to the same runtime.
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Wrapping
    // ------------------------------------------------------------------

    /// Put a value under this runtime's reactive control.
    ///
    /// Primitives are returned unchanged. Structured values already owned by
    /// this runtime are returned as-is. Anything else is rebuilt bottom-up:
    /// nested values are wrapped before their container.
    pub fn wrap(&self, value: Value) -> Value {
        match value {
            Value::Object(observable) if observable.runtime().ptr_eq(self) => {
                Value::Object(observable)
            }
            Value::Object(foreign) => {
                let entries = foreign.snapshot();
                if foreign.is_array() {
                    Value::Object(self.array(entries.into_iter().map(|(_, v)| v)))
                } else {
                    Value::Object(self.object(entries))
                }
            }
            primitive => primitive,
        }
    }

    /// Wrap JSON data.
    pub fn wrap_json(&self, json: serde_json::Value) -> Value {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s),
            Json::Array(items) => Value::Object(
                self.array(items.into_iter().map(|item| self.wrap_json(item))),
            ),
            Json::Object(map) => Value::Object(self.object(
                map.into_iter()
                    .map(|(k, v)| (Key::from(k), self.wrap_json(v))),
            )),
        }
    }

    /// Create an observed object. Values are wrapped first.
    pub fn object<I>(&self, entries: I) -> Observable
    where
        I: IntoIterator<Item = (Key, Value)>,
    {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key, self.wrap(value)))
            .collect();
        Observable::new_object(self.clone(), entries)
    }

    /// Create an observed array. Items are wrapped first.
    pub fn array<I>(&self, items: I) -> Observable
    where
        I: IntoIterator<Item = Value>,
    {
        let items = items.into_iter().map(|item| self.wrap(item)).collect();
        Observable::new_array(self.clone(), items)
    }

    // ------------------------------------------------------------------
    // Effects
    // ------------------------------------------------------------------

    /// Create an effect and run it once to establish its dependencies.
    ///
    /// An error from the first run is reported, not returned: the effect
    /// stays registered for whatever it read before failing.
    pub fn create_effect<F>(&self, run: F) -> Effect
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        let effect = Effect::new(run);
        if let Err(error) = self.run_effect(&effect) {
            self.report(error);
        }
        effect
    }

    /// Run an effect with dependency tracking.
    ///
    /// The effect is pushed on the effect stack for the duration of the call
    /// and popped afterwards, whatever the outcome.
    pub fn run_effect(&self, effect: &Effect) -> Result<()> {
        let stack = &self.inner.stack;

        if stack.contains(effect.id()) {
            tracing::warn!(effect = %effect.id(), "cyclic effect re-run skipped");
            return Err(ReactiveError::Cycle(effect.id()).into());
        }

        let limit = self.inner.config.max_effect_depth;
        if stack.depth() >= limit {
            tracing::warn!(effect = %effect.id(), limit, "effect nesting limit reached");
            return Err(ReactiveError::DepthExceeded { limit }.into());
        }

        let _frame = stack.enter(Some(effect.clone()));
        effect.invoke()
    }

    /// Run `f` without attributing its reads to the current effect.
    pub fn untracked<T>(&self, f: impl FnOnce() -> T) -> T {
        let _frame = self.inner.stack.enter(None);
        f()
    }

    /// The effect reads are currently attributed to.
    pub fn current_effect(&self) -> Option<Effect> {
        self.inner.stack.current()
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking(&self) -> bool {
        self.current_effect().is_some()
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Record that the current effect (if any) read `key` on `target`.
    pub(crate) fn track(&self, target: ObservableId, key: &Key) {
        let Some(effect) = self.inner.stack.current() else {
            return;
        };

        let mut properties = self.inner.registry.entry(target).or_default();
        let effects = properties.entry(key.clone()).or_default();
        if !effects.contains_key(&effect.id()) {
            tracing::trace!(effect = %effect.id(), target = target.raw(), %key, "subscribed");
            effects.insert(effect.id(), effect);
        }
    }

    /// Run every effect that depends on `key` of `target`.
    pub(crate) fn trigger(&self, target: ObservableId, key: &Key) {
        // Copy the effects out so no registry lock is held while they run.
        let effects: Vec<Effect> = self
            .inner
            .registry
            .get(&target)
            .and_then(|properties| {
                properties
                    .get(key)
                    .map(|effects| effects.values().cloned().collect())
            })
            .unwrap_or_default();

        if effects.is_empty() {
            return;
        }

        tracing::trace!(target = target.raw(), %key, count = effects.len(), "fan-out");

        for effect in effects {
            if let Err(error) = self.run_effect(&effect) {
                self.report(error);
            }
        }
    }

    /// Number of effects subscribed to `key` of `observable`.
    pub fn dependent_count(&self, observable: &Observable, key: impl Into<Key>) -> usize {
        let key = key.into();
        self.inner
            .registry
            .get(&observable.id())
            .and_then(|properties| properties.get(&key).map(IndexMap::len))
            .unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Unhandled errors
    // ------------------------------------------------------------------

    /// Report an error that escaped an effect or listener.
    ///
    /// The error is logged and kept until [`take_errors`](Self::take_errors).
    pub fn report(&self, error: Error) {
        tracing::error!(%error, "unhandled binding error");
        self.inner.unhandled.lock().push(error);
    }

    /// Drain the errors reported so far.
    pub fn take_errors(&self) -> Vec<Error> {
        std::mem::take(&mut *self.inner.unhandled.lock())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("observed_objects", &self.inner.registry.len())
            .field("depth", &self.inner.stack.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
        let count = Arc::new(AtomicI32::new(0));
        (count.clone(), count)
    }

    #[test]
    fn create_effect_runs_immediately() {
        let runtime = Runtime::new();
        let (runs, runs_clone) = counter();

        let effect = runtime.create_effect(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
        assert!(!runtime.is_tracking());
    }

    #[test]
    fn trigger_runs_registered_effects_in_order() {
        let runtime = Runtime::new();
        let data = runtime.object([(Key::from("x"), Value::from(1))]);
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second"] {
            let data = data.clone();
            let order = order.clone();
            runtime.create_effect(move || {
                data.get("x");
                order.lock().push(label);
                Ok(())
            });
        }

        order.lock().clear();
        runtime.trigger(data.id(), &Key::from("x"));
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn repeated_reads_register_once() {
        let runtime = Runtime::new();
        let data = runtime.object([(Key::from("x"), Value::from(1))]);

        let reader = data.clone();
        runtime.create_effect(move || {
            reader.get("x");
            reader.get("x");
            Ok(())
        });

        assert_eq!(runtime.dependent_count(&data, "x"), 1);
    }

    #[test]
    fn effect_errors_are_reported_not_propagated() {
        let runtime = Runtime::new();
        runtime.create_effect(|| Err(Error::Config("boom".to_string())));

        let errors = runtime.take_errors();
        assert_eq!(errors, vec![Error::Config("boom".to_string())]);
        assert!(runtime.take_errors().is_empty());
    }

    #[test]
    fn self_triggering_effect_is_cut_off() {
        let runtime = Runtime::new();
        let data = runtime.object([(Key::from("n"), Value::from(0))]);
        let (runs, runs_clone) = counter();

        let target = data.clone();
        runtime.create_effect(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
            let n = target.get("n").to_number();
            target.set("n", Value::from(n + 1.0));
            Ok(())
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(data.peek(&Key::from("n")), Value::from(1));
        assert!(matches!(
            runtime.take_errors().as_slice(),
            [Error::Reactive(ReactiveError::Cycle(_))]
        ));
    }

    #[test]
    fn depth_limit_is_reported() {
        let runtime = Runtime::with_config(Config::default().with_max_effect_depth(1));
        let inner_runtime = runtime.clone();
        let (inner_runs, inner_runs_clone) = counter();

        runtime.create_effect(move || {
            let runs = inner_runs_clone.clone();
            inner_runtime.create_effect(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            Ok(())
        });

        assert_eq!(inner_runs.load(Ordering::SeqCst), 0);
        assert!(matches!(
            runtime.take_errors().as_slice(),
            [Error::Reactive(ReactiveError::DepthExceeded { limit: 1 })]
        ));
    }

    #[test]
    fn untracked_reads_do_not_subscribe() {
        let runtime = Runtime::new();
        let data = runtime.object([(Key::from("x"), Value::from(1))]);

        let reader = data.clone();
        let inner = runtime.clone();
        runtime.create_effect(move || {
            inner.untracked(|| reader.get("x"));
            Ok(())
        });

        assert_eq!(runtime.dependent_count(&data, "x"), 0);
    }
}
