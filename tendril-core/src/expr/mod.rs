//! Expression Evaluation
//!
//! Directive values are small expressions (`count + 1`, `item.done`,
//! `open = !open`). This module lexes, parses and evaluates them against an
//! explicit scope.
//!
//! # Architecture
//!
//! 1. `lexer` splits the text into tokens
//! 2. `parser` builds an [`ast::Expr`] tree
//! 3. `eval` walks the tree against a [`Scope`] and [`Extras`]
//!
//! Nothing is compiled to host code: an expression can only reach the data
//! object, the extras and the handful of built-in methods the evaluator
//! knows about.

pub mod ast;
mod eval;
mod lexer;
mod parser;

pub use eval::{Extras, Function, Program, Scope};
pub use parser::parse;

use thiserror::Error;

use crate::reactive::ReactiveError;
use crate::value::Value;

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid number literal `{text}`")]
    InvalidNumber { text: String },

    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("`{0}` is not defined")]
    UndefinedIdentifier(String),

    #[error("cannot read property `{key}` of {base}")]
    ReadOfNullish { key: String, base: &'static str },

    #[error("cannot set property `{key}` of {base}")]
    WriteToNullish { key: String, base: &'static str },

    #[error("{callee} is not a function")]
    NotCallable { callee: String },

    #[error("cannot assign to read-only binding `{0}`")]
    ReadOnlyBinding(String),

    /// The observed object refused the write.
    #[error(transparent)]
    Write(#[from] ReactiveError),
}

/// Parse and evaluate `source` in one step.
///
/// `extras` bindings shadow properties of the scope's data object.
pub fn evaluate(source: &str, scope: &Scope, extras: &Extras) -> Result<Value, EvalError> {
    Program::parse(source)?.eval(scope, extras)
}
