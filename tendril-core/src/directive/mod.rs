//! Directives
//!
//! A directive is an attribute named `prefix-name[:argument][.modifier]*`
//! whose value is an unevaluated expression:
//!
//! ```text
//! a-text="count"
//! a-on:submit.prevent="save()"
//! a-for="item in items"
//! ```
//!
//! [`Walker`] finds them in an element subtree and hands each to the handler
//! for its name. Handlers tie DOM mutations to data reads through effects.

mod handlers;
mod walker;

use smallvec::SmallVec;
use thiserror::Error;

pub use walker::Walker;

/// Errors raised while interpreting a directive attribute.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectiveError {
    #[error("malformed repeat expression `{expression}`, expected `<name> in <expr>`")]
    MalformedFor { expression: String },

    #[error("event directive without an event name")]
    MissingEventName,

    #[error("data declaration evaluated to {found}, expected an object")]
    DataNotObject { found: &'static str },
}

/// Built-in directive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Data,
    Text,
    Show,
    On,
    For,
    Unknown,
}

impl DirectiveKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "data" => DirectiveKind::Data,
            "text" => DirectiveKind::Text,
            "show" => DirectiveKind::Show,
            "on" => DirectiveKind::On,
            "for" => DirectiveKind::For,
            _ => DirectiveKind::Unknown,
        }
    }
}

/// A parsed directive attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Name with the prefix stripped (`on`, `text`, ...).
    pub name: String,
    /// Text after the first `:` (`click` in `on:click`).
    pub argument: Option<String>,
    pub modifiers: SmallVec<[String; 2]>,
    pub expression: String,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        DirectiveKind::from_name(&self.name)
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

/// Parse one attribute. Returns `None` when the name does not carry
/// `prefix` or nothing follows it.
pub fn parse_attribute(prefix: &str, name: &str, value: &str) -> Option<Directive> {
    let rest = name.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }

    let mut parts = rest.split('.');
    let head = parts.next().unwrap_or_default();
    let modifiers = parts.map(str::to_string).collect();

    let (name, argument) = match head.split_once(':') {
        Some((name, argument)) => (name, Some(argument.to_string())),
        None => (head, None),
    };

    Some(Directive {
        name: name.to_string(),
        argument,
        modifiers,
        expression: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_directive() {
        let d = parse_attribute("a-", "a-text", "count").unwrap();
        assert_eq!(d.name, "text");
        assert_eq!(d.argument, None);
        assert!(d.modifiers.is_empty());
        assert_eq!(d.expression, "count");
        assert_eq!(d.kind(), DirectiveKind::Text);
    }

    #[test]
    fn argument_and_modifiers() {
        let d = parse_attribute("a-", "a-on:submit.prevent.stop", "save()").unwrap();
        assert_eq!(d.kind(), DirectiveKind::On);
        assert_eq!(d.argument.as_deref(), Some("submit"));
        assert_eq!(d.modifiers.as_slice(), ["prevent", "stop"]);
        assert!(d.has_modifier("stop"));
        assert!(!d.has_modifier("once"));
    }

    #[test]
    fn argument_splits_on_first_colon() {
        let d = parse_attribute("a-", "a-on:update:value", "x").unwrap();
        assert_eq!(d.name, "on");
        assert_eq!(d.argument.as_deref(), Some("update:value"));
    }

    #[test]
    fn foreign_attributes_are_not_directives() {
        assert!(parse_attribute("a-", "class", "x").is_none());
        assert!(parse_attribute("a-", "a-", "x").is_none());
        assert!(parse_attribute("x-", "a-text", "x").is_none());
    }

    #[test]
    fn unknown_names_parse() {
        let d = parse_attribute("x-", "x-bind:title", "t").unwrap();
        assert_eq!(d.kind(), DirectiveKind::Unknown);
    }
}
