//! DOM events.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::node::Element;
use crate::value::{Key, Value};

struct EventInner {
    kind: String,
    bubbles: bool,
    default_prevented: AtomicBool,
    propagation_stopped: AtomicBool,
    target: Mutex<Option<Element>>,
    current_target: Mutex<Option<Element>>,
}

/// An event travelling through the element tree.
///
/// Cloning yields another handle to the same event, so flags set by one
/// listener are seen by the dispatcher and by later listeners.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// A bubbling event of the given type (`"click"`, `"submit"`, ...).
    pub fn new(kind: impl Into<String>) -> Self {
        Self::with_bubbles(kind, true)
    }

    pub fn with_bubbles(kind: impl Into<String>, bubbles: bool) -> Self {
        Self {
            inner: Arc::new(EventInner {
                kind: kind.into(),
                bubbles,
                default_prevented: AtomicBool::new(false),
                propagation_stopped: AtomicBool::new(false),
                target: Mutex::new(None),
                current_target: Mutex::new(None),
            }),
        }
    }

    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    pub fn bubbles(&self) -> bool {
        self.inner.bubbles
    }

    pub fn prevent_default(&self) {
        self.inner.default_prevented.store(true, Ordering::SeqCst);
    }

    pub fn default_prevented(&self) -> bool {
        self.inner.default_prevented.load(Ordering::SeqCst)
    }

    pub fn stop_propagation(&self) {
        self.inner.propagation_stopped.store(true, Ordering::SeqCst);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.inner.propagation_stopped.load(Ordering::SeqCst)
    }

    /// The element the event was dispatched on.
    pub fn target(&self) -> Option<Element> {
        self.inner.target.lock().clone()
    }

    /// The element whose listeners are currently running.
    pub fn current_target(&self) -> Option<Element> {
        self.inner.current_target.lock().clone()
    }

    pub(crate) fn set_target(&self, target: &Element) {
        *self.inner.target.lock() = Some(target.clone());
    }

    pub(crate) fn set_current_target(&self, current: Option<&Element>) {
        *self.inner.current_target.lock() = current.cloned();
    }

    /// Property read from an expression (`$event.type`).
    pub fn property(&self, key: &Key) -> Value {
        match key.to_string().as_str() {
            "type" => Value::string(self.kind()),
            "bubbles" => Value::Bool(self.bubbles()),
            "defaultPrevented" => Value::Bool(self.default_prevented()),
            _ => Value::Undefined,
        }
    }

    pub fn ptr_eq(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.inner.kind)
            .field("default_prevented", &self.default_prevented())
            .field("propagation_stopped", &self.propagation_stopped())
            .finish()
    }
}
