//! Crate-level error type.
//!
//! Each subsystem has its own error enum; this module folds them into one
//! `Error` so effects and listeners can propagate any of them with `?`.

use thiserror::Error;

use crate::directive::DirectiveError;
use crate::dom::MarkupError;
use crate::expr::EvalError;
use crate::reactive::ReactiveError;

/// Any error raised while binding or running a template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An expression failed to parse or evaluate.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// The runtime refused to run an effect or to store a write.
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    /// A directive attribute could not be interpreted.
    #[error(transparent)]
    Directive(#[from] DirectiveError),

    /// Markup could not be read into a document.
    #[error(transparent)]
    Markup(#[from] MarkupError),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias using the crate [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
