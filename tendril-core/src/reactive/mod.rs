//! Reactive Primitives
//!
//! This module implements the reactive core: observables, effects and the
//! runtime that connects them.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An [`Observable`] is a container for structured data (an object or an
//! array). When one of its properties is read while an effect is running,
//! the runtime records that the effect depends on that exact
//! `(object, property)` pair. When the property is written, every effect
//! that depends on it runs again.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation, such as writing a value
//! into the DOM. It runs once when created and again, synchronously, every
//! time a property it read is written.
//!
//! ## Runtime
//!
//! The [`Runtime`] owns the dependency registry and the stack of running
//! effects. It is created once per page and threaded into every observable
//! and directive handler; there is no global state.
//!
//! # Implementation Notes
//!
//! Tracking works through explicit `get`/`set` accessors rather than
//! transparent interception. Running effects live on a stack, so an effect
//! created while another runs tracks its own reads and hands tracking back
//! to the outer effect when it returns.

mod context;
mod effect;
mod observable;
mod runtime;

pub use effect::{Effect, EffectFn, EffectId};
pub use observable::{Observable, ObservableId};
pub use runtime::{ReactiveError, Runtime};
