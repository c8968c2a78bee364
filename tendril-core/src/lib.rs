//! Tendril Core
//!
//! This crate provides a minimal reactive templating engine. Plain data is
//! bound to elements through declarative attributes, and bound regions are
//! re-rendered when the data they read changes.
//!
//! It implements:
//!
//! - Observable containers with automatic dependency tracking
//! - An effect runner with a re-entrant effect stack
//! - A safe expression language evaluated against an explicit scope
//! - A directive walker (`data`, `text`, `show`, `on`, `for`)
//!
//! # Architecture
//!
//! - `reactive`: observables, effects and the dependency registry
//! - `expr`: lexer, parser and evaluator for directive expressions
//! - `dom`: the in-memory element tree and markup reader
//! - `directive`: attribute grammar, walker and handlers
//! - `app`: finds data roots in a document and binds them
//!
//! # Example
//!
//! ```rust
//! use tendril_core::{app, Document, Value};
//!
//! let doc = Document::parse(
//!     r#"<div a-data="{ count: 0 }">
//!          <span a-text="count"></span>
//!          <button a-on:click="count++"></button>
//!        </div>"#,
//! )
//! .unwrap();
//!
//! let app = app::start(&doc);
//! let button = doc.root().query_all_with_attribute("a-on:click")[0].clone();
//! button.dispatch("click");
//!
//! assert_eq!(app.data(0).unwrap().get("count"), Value::from(1));
//! assert!(doc.to_markup().contains("<span a-text=\"count\">1</span>"));
//! ```

pub mod app;
pub mod config;
pub mod directive;
pub mod dom;
mod error;
pub mod expr;
pub mod reactive;
pub mod value;

pub use app::{App, DataSource};
pub use config::Config;
pub use directive::{Directive, DirectiveError, Walker};
pub use dom::{Document, Element, Event, MarkupError, Node};
pub use error::{Error, Result};
pub use expr::{evaluate, EvalError, Extras, Scope};
pub use reactive::{Effect, Observable, ReactiveError, Runtime};
pub use value::{Key, Value};
