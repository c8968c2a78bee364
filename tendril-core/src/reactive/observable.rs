//! Observable Implementation
//!
//! An Observable is the reactive container for structured data: an object
//! with named properties or an array with indexed items. All reads and
//! writes go through explicit accessors so the runtime can track them.
//!
//! # How Observables Work
//!
//! 1. [`get`](Observable::get) reads a property. If an effect is running,
//!    the runtime subscribes it to `(this object, key)`.
//!
//! 2. [`set`](Observable::set) wraps the new value (so assigned objects are
//!    reactive too), stores it, then re-runs every effect subscribed to
//!    `(this object, key)`.
//!
//! 3. Arrays expose `length`. A write that changes the length also notifies
//!    effects that read `length`.
//!
//! # Thread Safety
//!
//! The properties sit behind a `parking_lot` lock that is released before
//! any effect runs, so effects may freely read and write the object that
//! triggered them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::runtime::{ReactiveError, Runtime};
use crate::value::{Key, Value};

/// Largest length an array may grow to through writes.
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Unique identifier for an observed object; the registry is keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservableId(u64);

impl ObservableId {
    /// Generate a new unique observable ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObservableId {
    fn default() -> Self {
        Self::new()
    }
}

/// Raw storage behind an observable.
enum Props {
    Object(IndexMap<Key, Value>),
    Array {
        items: Vec<Value>,
        /// Non-index properties set on an array.
        named: IndexMap<Key, Value>,
    },
}

impl Props {
    fn lookup(&self, key: &Key) -> Value {
        match self {
            Props::Object(entries) => entries.get(key).cloned().unwrap_or_default(),
            Props::Array { items, named } => match key {
                Key::Index(index) => items.get(*index).cloned().unwrap_or_default(),
                key if key.is_length() => Value::from(items.len()),
                key => named.get(key).cloned().unwrap_or_default(),
            },
        }
    }

    fn contains(&self, key: &Key) -> bool {
        match self {
            Props::Object(entries) => entries.contains_key(key),
            Props::Array { items, named } => match key {
                Key::Index(index) => *index < items.len(),
                key => key.is_length() || named.contains_key(key),
            },
        }
    }

    /// Store a value. Returns `true` if an array length changed. Arrays
    /// refuse to grow past [`MAX_ARRAY_LENGTH`].
    fn store(&mut self, key: Key, value: Value) -> Result<bool, ReactiveError> {
        match self {
            Props::Object(entries) => {
                entries.insert(key, value);
                Ok(false)
            }
            Props::Array { items, named } => match key {
                Key::Index(index) => {
                    if index >= MAX_ARRAY_LENGTH {
                        return Err(ReactiveError::IndexOutOfRange {
                            index,
                            limit: MAX_ARRAY_LENGTH,
                        });
                    }
                    let before = items.len();
                    if index >= items.len() {
                        items.resize(index + 1, Value::Undefined);
                    }
                    items[index] = value;
                    Ok(items.len() != before)
                }
                key if key.is_length() => {
                    let length = array_length(&value)?;
                    let before = items.len();
                    items.resize(length, Value::Undefined);
                    Ok(items.len() != before)
                }
                key => {
                    named.insert(key, value);
                    Ok(false)
                }
            },
        }
    }
}

/// Validate a value written to an array's `length`.
fn array_length(value: &Value) -> Result<usize, ReactiveError> {
    let length = value.to_number();
    if !(length >= 0.0 && length.fract() == 0.0) || length > MAX_ARRAY_LENGTH as f64 {
        return Err(ReactiveError::InvalidLength(value.to_display_string()));
    }
    Ok(length as usize)
}

/// A reactive object or array.
///
/// Cloning an `Observable` yields another handle to the same data.
#[derive(Clone)]
pub struct Observable {
    id: ObservableId,
    runtime: Runtime,
    props: Arc<RwLock<Props>>,
}

impl Observable {
    /// Values must already be wrapped by `runtime`.
    pub(crate) fn new_object(runtime: Runtime, entries: IndexMap<Key, Value>) -> Self {
        Self {
            id: ObservableId::new(),
            runtime,
            props: Arc::new(RwLock::new(Props::Object(entries))),
        }
    }

    /// Items must already be wrapped by `runtime`.
    pub(crate) fn new_array(runtime: Runtime, items: Vec<Value>) -> Self {
        Self {
            id: ObservableId::new(),
            runtime,
            props: Arc::new(RwLock::new(Props::Array {
                items,
                named: IndexMap::new(),
            })),
        }
    }

    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// The runtime this observable reports reads and writes to.
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn is_array(&self) -> bool {
        matches!(*self.props.read(), Props::Array { .. })
    }

    /// Whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Observable) -> bool {
        Arc::ptr_eq(&self.props, &other.props)
    }

    /// Read a property, subscribing the running effect to it.
    ///
    /// Missing properties read as `Undefined`.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        self.runtime.track(self.id, &key);
        self.peek(&key)
    }

    /// Read a property without tracking.
    pub fn peek(&self, key: &Key) -> Value {
        self.props.read().lookup(key)
    }

    /// Whether the property exists. Untracked.
    pub fn contains_key(&self, key: &Key) -> bool {
        self.props.read().contains(key)
    }

    /// Write a property and re-run the effects that read it.
    ///
    /// A write the container refuses (see [`try_set`](Self::try_set)) is
    /// reported to the runtime and leaves the data unchanged.
    pub fn set(&self, key: impl Into<Key>, value: Value) {
        if let Err(error) = self.try_set(key, value) {
            self.runtime.report(error.into());
        }
    }

    /// Write a property, failing for array indices at or past
    /// [`MAX_ARRAY_LENGTH`] and for `length` values that are not valid
    /// array lengths. Nothing is stored or notified on failure.
    pub fn try_set(&self, key: impl Into<Key>, value: Value) -> Result<(), ReactiveError> {
        let key = key.into();
        let mut value = self.runtime.wrap(value);
        // Coercing the new length may read observables, this one included.
        if key.is_length() && self.is_array() {
            value = Value::from(array_length(&value)?);
        }

        let length_changed = self.props.write().store(key.clone(), value)?;

        self.runtime.trigger(self.id, &key);
        if length_changed && !key.is_length() {
            self.runtime.trigger(self.id, &Key::length());
        }
        Ok(())
    }

    /// Tracked length of an array, or number of properties of an object.
    pub fn len(&self) -> usize {
        self.runtime.track(self.id, &Key::length());
        match &*self.props.read() {
            Props::Object(entries) => entries.len(),
            Props::Array { items, .. } => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked copy of an array's items: subscribes to `length` and every
    /// index. Objects yield their property values.
    pub fn items(&self) -> Vec<Value> {
        if !self.is_array() {
            return self.object_values();
        }
        let length = self.len();
        (0..length).map(|index| self.get(Key::Index(index))).collect()
    }

    fn object_values(&self) -> Vec<Value> {
        let keys: Vec<Key> = match &*self.props.read() {
            Props::Object(entries) => entries.keys().cloned().collect(),
            Props::Array { .. } => Vec::new(),
        };
        keys.into_iter().map(|key| self.get(key)).collect()
    }

    /// Append to an array, notifying the new index and `length`.
    pub fn push(&self, value: Value) -> usize {
        let index = match &*self.props.read() {
            Props::Array { items, .. } => items.len(),
            Props::Object(_) => return 0,
        };
        self.set(Key::Index(index), value);
        index + 1
    }

    /// Remove the last item of an array, notifying its index and `length`.
    pub fn pop(&self) -> Value {
        let popped = match &mut *self.props.write() {
            Props::Array { items, .. } => items.pop().map(|value| (items.len(), value)),
            Props::Object(_) => None,
        };
        match popped {
            Some((index, value)) => {
                self.runtime.trigger(self.id, &Key::Index(index));
                self.runtime.trigger(self.id, &Key::length());
                value
            }
            None => Value::Undefined,
        }
    }

    /// Untracked copy of all entries, in order.
    pub fn snapshot(&self) -> Vec<(Key, Value)> {
        match &*self.props.read() {
            Props::Object(entries) => entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Props::Array { items, .. } => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Key::Index(i), v.clone()))
                .collect(),
        }
    }
}

impl PartialEq for Observable {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, len) = match &*self.props.read() {
            Props::Object(entries) => ("object", entries.len()),
            Props::Array { items, .. } => ("array", items.len()),
        };
        f.debug_struct("Observable")
            .field("id", &self.id.raw())
            .field("kind", &kind)
            .field("len", &len)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
