//! Values
//!
//! Everything an expression can produce or a data object can hold. Structured
//! values (objects and arrays) are always [`Observable`] containers, so a
//! value reachable from reactive data is itself reactive. Primitives are
//! plain and never tracked.
//!
//! Coercions follow the host scripting rules the templates are written
//! against: truthiness, `ToNumber`, `ToString` and the two equality
//! operators.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::dom::Event;
use crate::expr::Function;
use crate::reactive::{Observable, ObservableId};

/// A property key.
///
/// Numeric keys are normalised to [`Key::Index`], so `list["0"]` and
/// `list[0]` address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(Arc<str>),
    Index(usize),
}

impl Key {
    /// The `length` key exposed by arrays.
    pub fn length() -> Self {
        Key::Name(Arc::from("length"))
    }

    /// Parse a textual key, normalising canonical non-negative integers.
    pub fn parse(text: &str) -> Self {
        let canonical = !text.is_empty()
            && text.bytes().all(|b| b.is_ascii_digit())
            && (text == "0" || !text.starts_with('0'));
        match text.parse::<usize>() {
            Ok(index) if canonical => Key::Index(index),
            _ => Key::Name(Arc::from(text)),
        }
    }

    /// Derive a key from a computed member expression (`a[expr]`).
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= usize::MAX as f64 => {
                Key::Index(*n as usize)
            }
            other => Key::parse(&other.to_display_string()),
        }
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == "length")
    }
}

impl From<&str> for Key {
    fn from(text: &str) -> Self {
        Key::parse(text)
    }
}

impl From<String> for Key {
    fn from(text: String) -> Self {
        Key::parse(&text)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// An object or array. Both live behind an [`Observable`].
    Object(Observable),
    Function(Function),
    Event(Event),
}

impl Value {
    pub fn string(text: impl AsRef<str>) -> Self {
        Value::String(Arc::from(text.as_ref()))
    }

    /// Name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(o) if o.is_array() => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Event(_) => "event",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_observable(&self) -> Option<&Observable> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The observable behind this value, if it is an array.
    pub fn as_array(&self) -> Option<&Observable> {
        self.as_observable().filter(|o| o.is_array())
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Function(_) | Value::Event(_) => true,
        }
    }

    /// Numeric coercion.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Object(o) if o.is_array() => {
                Value::string(self.to_display_string()).to_number()
            }
            _ => f64::NAN,
        }
    }

    /// String coercion, as used by `+` concatenation and `join`.
    ///
    /// Arrays are joined with `,` through tracked reads, so a binding that
    /// prints a list re-runs when the list changes.
    pub fn to_display_string(&self) -> String {
        self.display(&mut SmallVec::new())
    }

    fn display(&self, seen: &mut SmallVec<[ObservableId; 4]>) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.to_string(),
            Value::Object(o) if o.is_array() => join_items(o, ",", seen),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(_) => "function".to_string(),
            Value::Event(e) => format!("[object Event:{}]", e.kind()),
        }
    }

    /// Text assigned to an element's content. `null` renders as empty text.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_display_string(),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Event(a), Value::Event(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_equals(other),
            (_, Value::Bool(_)) => self.loose_equals(&Value::Number(other.to_number())),
            (Value::Number(a), Value::String(_)) => *a == other.to_number(),
            (Value::String(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Object(_), Value::String(_) | Value::Number(_)) => {
                Value::string(self.to_display_string()).loose_equals(other)
            }
            (Value::String(_) | Value::Number(_), Value::Object(_)) => {
                self.loose_equals(&Value::string(other.to_display_string()))
            }
            _ => self.strict_equals(other),
        }
    }

    /// Untracked JSON snapshot. Functions, events and `undefined` become
    /// `null`, non-finite numbers too.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Undefined | Value::Null | Value::Function(_) | Value::Event(_) => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Json::String(s.to_string()),
            Value::Object(o) if o.is_array() => {
                Json::Array(o.snapshot().into_iter().map(|(_, v)| v.to_json()).collect())
            }
            Value::Object(o) => Json::Object(
                o.snapshot()
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Join an array's items with `separator`. Nullish items and arrays already
/// being joined further up print as empty text.
pub(crate) fn join(list: &Observable, separator: &str) -> String {
    join_items(list, separator, &mut SmallVec::new())
}

fn join_items(list: &Observable, separator: &str, seen: &mut SmallVec<[ObservableId; 4]>) -> String {
    if seen.contains(&list.id()) {
        return String::new();
    }
    seen.push(list.id());
    let parts: Vec<String> = list
        .items()
        .iter()
        .map(|item| match item {
            Value::Undefined | Value::Null => String::new(),
            other => other.display(seen),
        })
        .collect();
    seen.pop();
    parts.join(separator)
}

/// Format a number the way the host prints it: `1` rather than `1.0`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n) => write!(f, "Number({})", format_number(*n)),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Object(o) => write!(f, "{:?}", o),
            Value::Function(func) => write!(f, "{:?}", func),
            Value::Event(e) => write!(f, "{:?}", e),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

/// Structural equality for primitives, identity for everything else.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.strict_equals(other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Observable> for Value {
    fn from(o: Observable) -> Self {
        Value::Object(o)
    }
}
