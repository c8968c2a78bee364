//! Directive handlers.
//!
//! Each handler compiles its expression once and then either installs an
//! effect (text, show, for) or an event listener (on).

use super::{Directive, DirectiveError, Walker};
use crate::dom::{Element, Node};
use crate::error::Result;
use crate::expr::{Extras, Program, Scope};
use crate::value::Value;

/// Whether the walker should continue into an element's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Descend {
    Children,
    /// The handler owns the subtree.
    Skip,
}

pub(super) fn text(
    walker: &Walker,
    element: &Element,
    directive: &Directive,
    scope: &Scope,
    extras: &Extras,
) -> Result<Descend> {
    let program = Program::parse(&directive.expression)?;
    let element = element.clone();
    let scope = scope.clone();
    let extras = extras.clone();

    walker.runtime().create_effect(move || {
        let value = program.eval(&scope, &extras)?;
        element.set_text_content(value.to_text());
        Ok(())
    });

    Ok(Descend::Children)
}

pub(super) fn show(
    walker: &Walker,
    element: &Element,
    directive: &Directive,
    scope: &Scope,
    extras: &Extras,
) -> Result<Descend> {
    let program = Program::parse(&directive.expression)?;
    let element = element.clone();
    let scope = scope.clone();
    let extras = extras.clone();

    walker.runtime().create_effect(move || {
        let visible = program.eval(&scope, &extras)?.is_truthy();
        element.set_style("display", if visible { "block" } else { "none" });
        Ok(())
    });

    Ok(Descend::Children)
}

/// Event binding. No effect: the expression runs untracked each time the
/// event fires, with `$event` bound to the event.
pub(super) fn on(
    walker: &Walker,
    element: &Element,
    directive: &Directive,
    scope: &Scope,
    extras: &Extras,
) -> Result<Descend> {
    let event_name = directive
        .argument
        .clone()
        .filter(|name| !name.is_empty())
        .ok_or(DirectiveError::MissingEventName)?;
    let program = Program::parse(&directive.expression)?;
    let prevent = directive.has_modifier("prevent");
    let stop = directive.has_modifier("stop");

    let runtime = walker.runtime().clone();
    let scope = scope.clone();
    let extras = extras.clone();

    element.add_event_listener(event_name, move |event| {
        if prevent {
            event.prevent_default();
        }
        if stop {
            event.stop_propagation();
        }

        let extras = extras.with("$event", Value::Event(event.clone()));
        if let Err(error) = runtime.untracked(|| program.eval(&scope, &extras)) {
            runtime.report(error.into());
        }
    });

    Ok(Descend::Children)
}

/// `for="<name> in <expr>"`: the first child becomes the template and is
/// re-stamped once per item whenever the list changes.
pub(super) fn repeat(
    walker: &Walker,
    element: &Element,
    directive: &Directive,
    scope: &Scope,
    extras: &Extras,
) -> Result<Descend> {
    let (name, source) = split_for(&directive.expression)?;
    let program = Program::parse(source)?;

    let Some(template) = element.take_first_child() else {
        tracing::debug!(expression = %directive.expression, "repeat without a template");
        return Ok(Descend::Skip);
    };

    let runtime = walker.runtime().clone();
    let host = element.clone();
    let walker = walker.clone();
    let scope = scope.clone();
    let extras = extras.clone();

    runtime.create_effect(move || {
        host.clear_children();

        let value = program.eval(&scope, &extras)?;
        let Some(list) = value.as_array() else {
            return Ok(());
        };

        for item in list.items() {
            let node = template.deep_clone();
            if let Node::Element(copy) = &node {
                walker.walk(copy, &scope, &extras.with(&name, item));
            }
            host.append_child(node);
        }
        Ok(())
    });

    Ok(Descend::Skip)
}

/// Split `"<name> in <expr>"` into the loop variable and the list source.
fn split_for(expression: &str) -> Result<(String, &str), DirectiveError> {
    let malformed = || DirectiveError::MalformedFor {
        expression: expression.to_string(),
    };

    let (name, source) = expression.split_once(" in ").ok_or_else(malformed)?;
    let (name, source) = (name.trim(), source.trim());
    if !is_identifier(name) || source.is_empty() {
        return Err(malformed());
    }
    Ok((name.to_string(), source))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
