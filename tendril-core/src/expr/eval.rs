//! Tree-walking evaluator.
//!
//! Expressions run against a [`Scope`] (the runtime plus an optional data
//! object) and a set of [`Extras`] (named bindings such as loop variables or
//! `$event`). Identifiers resolve against extras first, then against the
//! data object's properties. Data reads go through [`Observable::get`], so
//! an expression evaluated inside an effect subscribes that effect to
//! exactly the properties it touched.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::ast::{AssignOp, BinaryOp, Expr, Literal, LogicalOp, UnaryOp};
use super::EvalError;
use crate::reactive::{Observable, Runtime};
use crate::value::{self as values, Key, Value};

type EvalResult<T = Value> = Result<T, EvalError>;

/// Arguments of a call. Most calls take at most two.
type Args = SmallVec<[Value; 2]>;

/// The data an expression can see: the runtime it allocates through and
/// the data object whose properties act as variables.
#[derive(Clone, Debug)]
pub struct Scope {
    runtime: Runtime,
    data: Option<Observable>,
}

impl Scope {
    /// A scope with no data object. Only extras and literals resolve.
    pub fn empty(runtime: Runtime) -> Self {
        Self {
            runtime,
            data: None,
        }
    }

    /// A scope exposing `data`'s properties as variables.
    pub fn new(data: Observable) -> Self {
        Self {
            runtime: data.runtime().clone(),
            data: Some(data),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn data(&self) -> Option<&Observable> {
        self.data.as_ref()
    }
}

/// Named bindings layered over a scope. They shadow data properties and
/// cannot be reassigned.
#[derive(Clone, Debug, Default)]
pub struct Extras {
    bindings: IndexMap<Arc<str>, Value>,
}

impl Extras {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of these extras with one more binding.
    pub fn with(&self, name: &str, value: Value) -> Self {
        let mut extended = self.clone();
        extended.bindings.insert(Arc::from(name), value);
        extended
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// A parsed expression, ready to be evaluated any number of times.
#[derive(Clone, Debug)]
pub struct Program {
    source: Arc<str>,
    body: Arc<Expr>,
}

impl Program {
    pub fn parse(source: &str) -> EvalResult<Self> {
        let body = super::parser::parse(source)?;
        Ok(Self {
            source: Arc::from(source),
            body: Arc::new(body),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, scope: &Scope, extras: &Extras) -> EvalResult {
        Interpreter { scope, extras }.eval(&self.body)
    }
}

/// A resolved assignment target.
enum Place {
    Binding(String),
    Property { base: Value, key: Key },
}

struct Closure {
    params: Arc<[String]>,
    body: Arc<Expr>,
    scope: Scope,
    extras: Extras,
}

/// An arrow function value. It captures the scope and extras it was
/// created in.
#[derive(Clone)]
pub struct Function(Arc<Closure>);

impl Function {
    /// Call with positional arguments. Missing arguments are `undefined`,
    /// extra ones are ignored.
    pub fn call(&self, args: &[Value]) -> EvalResult {
        let closure = &self.0;
        let mut extras = closure.extras.clone();
        for (i, param) in closure.params.iter().enumerate() {
            extras = extras.with(param, args.get(i).cloned().unwrap_or_default());
        }
        Interpreter {
            scope: &closure.scope,
            extras: &extras,
        }
        .eval(&closure.body)
    }

    pub fn arity(&self) -> usize {
        self.0.params.len()
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.0.params.join(", "))
    }
}

struct Interpreter<'a> {
    scope: &'a Scope,
    extras: &'a Extras,
}

impl Interpreter<'_> {
    fn eval(&self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Undefined => Value::Undefined,
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::string(s),
            }),

            Expr::Ident(name) => self.lookup(name),

            Expr::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::Object(self.scope.runtime.array(items)))
            }

            Expr::Object(entries) => {
                let entries = entries
                    .iter()
                    .map(|(key, value)| -> EvalResult<(Key, Value)> {
                        Ok((Key::from(key.as_str()), self.eval(value)?))
                    })
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::Object(self.scope.runtime.object(entries)))
            }

            Expr::Member { object, property } => {
                let base = self.eval(object)?;
                get_property(&base, &Key::from(property.as_str()))
            }

            Expr::Index { object, index } => {
                let base = self.eval(object)?;
                let key = Key::from_value(&self.eval(index)?);
                get_property(&base, &key)
            }

            Expr::Call { callee, args } => self.call(callee, args),

            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                })
            }

            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }

            Expr::Logical { op, left, right } => {
                let left = self.eval(left)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => self.eval(right),
                }
            }

            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }

            Expr::Assign { op, target, value } => {
                let place = self.place(target)?;
                let value = match op {
                    AssignOp::Assign => self.eval(value)?,
                    AssignOp::Compound(op) => {
                        let current = self.read(&place)?;
                        binary(*op, &current, &self.eval(value)?)
                    }
                };
                self.write(place, value.clone())?;
                Ok(value)
            }

            Expr::Update {
                delta,
                prefix,
                target,
            } => {
                let place = self.place(target)?;
                let old = self.read(&place)?.to_number();
                let new = old + delta;
                self.write(place, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }

            Expr::Arrow { params, body } => Ok(Value::Function(Function(Arc::new(Closure {
                params: params.clone(),
                body: body.clone(),
                scope: self.scope.clone(),
                extras: self.extras.clone(),
            })))),

            Expr::Sequence(statements) => {
                let mut last = Value::Undefined;
                for statement in statements {
                    last = self.eval(statement)?;
                }
                Ok(last)
            }
        }
    }

    fn lookup(&self, name: &str) -> EvalResult {
        if let Some(value) = self.extras.get(name) {
            return Ok(value.clone());
        }

        let Some(data) = &self.scope.data else {
            return Err(EvalError::UndefinedIdentifier(name.to_string()));
        };

        let key = Key::from(name);
        let present = data.contains_key(&key);
        // Read even when missing, so the effect re-runs once the property
        // appears.
        let value = data.get(key);
        if present {
            Ok(value)
        } else {
            Err(EvalError::UndefinedIdentifier(name.to_string()))
        }
    }

    /// Resolve an assignment target. Object and index expressions are
    /// evaluated here, once, so compound writes do not repeat them.
    fn place(&self, target: &Expr) -> EvalResult<Place> {
        match target {
            Expr::Ident(name) => {
                if self.extras.contains(name) {
                    return Err(EvalError::ReadOnlyBinding(name.clone()));
                }
                Ok(Place::Binding(name.clone()))
            }
            Expr::Member { object, property } => Ok(Place::Property {
                base: self.eval(object)?,
                key: Key::from(property.as_str()),
            }),
            Expr::Index { object, index } => {
                let base = self.eval(object)?;
                let key = Key::from_value(&self.eval(index)?);
                Ok(Place::Property { base, key })
            }
            _ => Err(EvalError::InvalidAssignmentTarget),
        }
    }

    fn read(&self, place: &Place) -> EvalResult {
        match place {
            Place::Binding(name) => self.lookup(name),
            Place::Property { base, key } => get_property(base, key),
        }
    }

    fn write(&self, place: Place, value: Value) -> EvalResult<()> {
        match place {
            Place::Binding(name) => match &self.scope.data {
                Some(data) => Ok(data.try_set(name.as_str(), value)?),
                None => Err(EvalError::UndefinedIdentifier(name)),
            },
            Place::Property { base, key } => set_property(&base, key, value),
        }
    }

    fn call(&self, callee: &Expr, args: &[Expr]) -> EvalResult {
        let args = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<EvalResult<Args>>()?;

        let (receiver, key) = match callee {
            Expr::Member { object, property } => {
                (self.eval(object)?, Key::from(property.as_str()))
            }
            Expr::Index { object, index } => {
                let receiver = self.eval(object)?;
                (receiver, Key::from_value(&self.eval(index)?))
            }
            other => {
                return match self.eval(other)? {
                    Value::Function(function) => function.call(&args),
                    value => Err(EvalError::NotCallable {
                        callee: value.type_name().to_string(),
                    }),
                };
            }
        };

        if receiver.is_nullish() {
            return Err(EvalError::ReadOfNullish {
                key: key.to_string(),
                base: receiver.type_name(),
            });
        }

        // An own property holding a function wins over built-in methods.
        if let Value::Object(object) = &receiver {
            if object.contains_key(&key) {
                return match object.get(key.clone()) {
                    Value::Function(function) => function.call(&args),
                    _ => Err(EvalError::NotCallable {
                        callee: key.to_string(),
                    }),
                };
            }
        }

        call_builtin(&receiver, &key, &args)
    }
}

/// Member read on any value.
fn get_property(base: &Value, key: &Key) -> EvalResult {
    match base {
        Value::Undefined | Value::Null => Err(EvalError::ReadOfNullish {
            key: key.to_string(),
            base: base.type_name(),
        }),
        Value::Object(object) => Ok(object.get(key.clone())),
        Value::String(s) => Ok(match key {
            key if key.is_length() => Value::from(s.chars().count()),
            Key::Index(index) => s
                .chars()
                .nth(*index)
                .map(|c| Value::string(c.to_string()))
                .unwrap_or_default(),
            _ => Value::Undefined,
        }),
        Value::Event(event) => Ok(event.property(key)),
        Value::Function(function) if key.is_length() => Ok(Value::from(function.arity())),
        _ => Ok(Value::Undefined),
    }
}

/// Member write. Writes to primitives are silently dropped.
fn set_property(base: &Value, key: Key, value: Value) -> EvalResult<()> {
    match base {
        Value::Undefined | Value::Null => Err(EvalError::WriteToNullish {
            key: key.to_string(),
            base: base.type_name(),
        }),
        Value::Object(object) => Ok(object.try_set(key, value)?),
        _ => Ok(()),
    }
}

fn call_builtin(receiver: &Value, key: &Key, args: &[Value]) -> EvalResult {
    let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
    let Key::Name(name) = key else {
        return Err(EvalError::NotCallable {
            callee: key.to_string(),
        });
    };

    match (receiver, &**name) {
        (Value::Object(list), "push") if list.is_array() => {
            let mut length = list.len();
            for value in args {
                list.try_set(Key::Index(length), value.clone())?;
                length += 1;
            }
            Ok(Value::from(length))
        }
        (Value::Object(list), "pop") if list.is_array() => Ok(list.pop()),
        (Value::Object(list), "includes") if list.is_array() => {
            let needle = arg(0);
            Ok(Value::Bool(list.items().iter().any(|item| same_value_zero(item, &needle))))
        }
        (Value::Object(list), "join") if list.is_array() => {
            let separator = match arg(0) {
                Value::Undefined => ",".to_string(),
                other => other.to_display_string(),
            };
            Ok(Value::from(values::join(list, &separator)))
        }
        (Value::String(s), "toUpperCase") => Ok(Value::from(s.to_uppercase())),
        (Value::String(s), "toLowerCase") => Ok(Value::from(s.to_lowercase())),
        (Value::String(s), "trim") => Ok(Value::string(s.trim())),
        (Value::String(s), "includes") => {
            Ok(Value::Bool(s.contains(arg(0).to_display_string().as_str())))
        }
        (Value::Event(event), "preventDefault") => {
            event.prevent_default();
            Ok(Value::Undefined)
        }
        (Value::Event(event), "stopPropagation") => {
            event.stop_propagation();
            Ok(Value::Undefined)
        }
        (value, "toString") => Ok(Value::from(value.to_display_string())),
        _ => Err(EvalError::NotCallable {
            callee: format!("{}.{}", receiver.type_name(), name),
        }),
    }
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let numeric = |f: fn(f64, f64) -> f64| Value::Number(f(left.to_number(), right.to_number()));

    match op {
        BinaryOp::Add => {
            let concat = matches!(left, Value::String(_) | Value::Object(_))
                || matches!(right, Value::String(_) | Value::Object(_));
            if concat {
                Value::from(left.to_display_string() + &right.to_display_string())
            } else {
                numeric(|a, b| a + b)
            }
        }
        BinaryOp::Sub => numeric(|a, b| a - b),
        BinaryOp::Mul => numeric(|a, b| a * b),
        BinaryOp::Div => numeric(|a, b| a / b),
        BinaryOp::Mod => numeric(|a, b| a % b),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            Value::Bool(compare(op, left, right))
        }
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::Ne => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNe => Value::Bool(!left.strict_equals(right)),
    }
}

/// Relational comparison: lexicographic for two strings, numeric otherwise.
/// Any comparison involving `NaN` is false.
fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveError;
    use serde_json::json;

    fn scope(json: serde_json::Value) -> Scope {
        let runtime = Runtime::new();
        let data = runtime.wrap_json(json);
        Scope::new(data.as_observable().cloned().expect("object"))
    }

    fn eval(scope: &Scope, source: &str) -> EvalResult {
        Program::parse(source)?.eval(scope, &Extras::new())
    }

    #[test]
    fn arithmetic_and_concatenation() {
        let scope = scope(json!({ "count": 2, "name": "ada" }));
        assert_eq!(eval(&scope, "count * 3 + 1").unwrap(), Value::from(7));
        assert_eq!(eval(&scope, "7 % 4 - -1").unwrap(), Value::from(4));
        assert_eq!(eval(&scope, "'n=' + count").unwrap(), Value::from("n=2"));
        assert_eq!(eval(&scope, "name.toUpperCase()").unwrap(), Value::from("ADA"));
        assert_eq!(eval(&scope, "name.length").unwrap(), Value::from(3));
        assert_eq!(eval(&scope, "1 / 0").unwrap(), Value::Number(f64::INFINITY));
    }

    #[test]
    fn comparisons_and_logic() {
        let scope = scope(json!({ "a": 1, "b": "1", "flag": false }));
        assert_eq!(eval(&scope, "a == b").unwrap(), Value::Bool(true));
        assert_eq!(eval(&scope, "a === b").unwrap(), Value::Bool(false));
        assert_eq!(eval(&scope, "a < 2 && 'x' < 'y'").unwrap(), Value::Bool(true));
        assert_eq!(eval(&scope, "flag || 'fallback'").unwrap(), Value::from("fallback"));
        assert_eq!(eval(&scope, "flag && missing").unwrap(), Value::Bool(false));
        assert_eq!(eval(&scope, "flag ? 'on' : 'off'").unwrap(), Value::from("off"));
        assert_eq!(eval(&scope, "!flag").unwrap(), Value::Bool(true));
    }

    #[test]
    fn assignments_write_through_to_data() {
        let scope = scope(json!({ "count": 0, "user": { "name": "a" }, "items": [] }));

        assert_eq!(eval(&scope, "count++").unwrap(), Value::from(0));
        assert_eq!(eval(&scope, "++count").unwrap(), Value::from(2));
        assert_eq!(eval(&scope, "count += 10").unwrap(), Value::from(12));
        eval(&scope, "user.name = 'b'; items.push(1, 2)").unwrap();

        let data = scope.data().unwrap();
        assert_eq!(data.peek(&Key::from("count")), Value::from(12));
        assert_eq!(
            data.peek(&Key::from("user")).to_json(),
            json!({ "name": "b" })
        );
        assert_eq!(data.peek(&Key::from("items")).to_json(), json!([1, 2]));
    }

    #[test]
    fn compound_targets_are_evaluated_once() {
        let scope = scope(json!({ "calls": 0, "box": { "x": 1 }, "list": [5] }));
        eval(&scope, "next = () => (calls += 1) && box").unwrap();

        assert_eq!(eval(&scope, "next().x += 1").unwrap(), Value::from(2));
        assert_eq!(eval(&scope, "next().x++").unwrap(), Value::from(2));
        assert_eq!(eval(&scope, "list[(calls += 1) - 3] *= 2").unwrap(), Value::from(10));

        let data = scope.data().unwrap();
        assert_eq!(data.peek(&Key::from("calls")), Value::from(3));
        assert_eq!(data.peek(&Key::from("box")).to_json(), json!({ "x": 3 }));
        assert_eq!(data.peek(&Key::from("list")).to_json(), json!([10]));
    }

    #[test]
    fn oversized_array_writes_fail_cleanly() {
        let scope = scope(json!({ "list": [1] }));

        assert!(matches!(
            eval(&scope, "list[1e18] = 2"),
            Err(EvalError::Write(ReactiveError::IndexOutOfRange { .. }))
        ));
        assert_eq!(
            eval(&scope, "list.length = 1e18"),
            Err(EvalError::Write(ReactiveError::InvalidLength(
                "1000000000000000000".to_string()
            )))
        );
        assert_eq!(
            scope.data().unwrap().peek(&Key::from("list")).to_json(),
            json!([1])
        );
    }

    #[test]
    fn extras_shadow_data_and_are_read_only() {
        let scope = scope(json!({ "item": "data" }));
        let extras = Extras::new().with("item", Value::from("extra"));

        let program = Program::parse("item").unwrap();
        assert_eq!(program.eval(&scope, &extras).unwrap(), Value::from("extra"));

        let program = Program::parse("item = 1").unwrap();
        assert_eq!(
            program.eval(&scope, &extras),
            Err(EvalError::ReadOnlyBinding("item".to_string()))
        );
    }

    #[test]
    fn literals_build_reactive_values() {
        let scope = scope(json!({}));
        let value = eval(&scope, "{ a: [1, { b: 2 }], 'c d': null }").unwrap();
        assert_eq!(value.to_json(), json!({ "a": [1, { "b": 2 }], "c d": null }));

        let object = value.as_observable().unwrap();
        assert!(object.runtime().ptr_eq(scope.runtime()));
    }

    #[test]
    fn arrow_functions_capture_their_scope() {
        let scope = scope(json!({ "base": 10 }));
        let add = eval(&scope, "(x, y) => base + x + y").unwrap();
        let add = add.as_function().unwrap();
        assert_eq!(add.arity(), 2);
        assert_eq!(
            add.call(&[Value::from(1), Value::from(2)]).unwrap(),
            Value::from(13)
        );

        assert_eq!(eval(&scope, "((n) => n * 2)(4)").unwrap(), Value::from(8));
    }

    #[test]
    fn evaluation_errors() {
        let scope = scope(json!({ "nothing": null, "n": 1 }));

        assert_eq!(
            eval(&scope, "missing"),
            Err(EvalError::UndefinedIdentifier("missing".to_string()))
        );
        assert_eq!(
            eval(&scope, "nothing.x"),
            Err(EvalError::ReadOfNullish {
                key: "x".to_string(),
                base: "null",
            })
        );
        assert_eq!(
            eval(&scope, "nothing.x = 1"),
            Err(EvalError::WriteToNullish {
                key: "x".to_string(),
                base: "null",
            })
        );
        assert!(matches!(eval(&scope, "n()"), Err(EvalError::NotCallable { .. })));
        assert!(matches!(eval(&scope, "n.nope()"), Err(EvalError::NotCallable { .. })));
    }

    #[test]
    fn empty_scope_resolves_only_literals() {
        let scope = Scope::empty(Runtime::new());
        assert_eq!(eval(&scope, "1 + 1").unwrap(), Value::from(2));
        assert!(matches!(
            eval(&scope, "x"),
            Err(EvalError::UndefinedIdentifier(_))
        ));
    }
}
