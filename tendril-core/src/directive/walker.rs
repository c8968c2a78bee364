use std::sync::Arc;

use super::handlers::{self, Descend};
use super::{parse_attribute, Directive, DirectiveKind};
use crate::dom::Element;
use crate::error::Result;
use crate::expr::{Extras, Scope};
use crate::reactive::Runtime;

/// Traverses an element subtree and binds every directive it finds.
#[derive(Clone, Debug)]
pub struct Walker {
    runtime: Runtime,
    prefix: Arc<str>,
}

impl Walker {
    /// A walker using the runtime's configured attribute prefix.
    pub fn new(runtime: Runtime) -> Self {
        let prefix = Arc::from(runtime.config().prefix.as_str());
        Self { runtime, prefix }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Bind `element` and its descendants against `scope` and `extras`.
    ///
    /// Directives run in attribute order. A directive that fails is reported
    /// to the runtime and the rest of the subtree is still bound, except
    /// below a repeat directive that could not be set up. Child elements
    /// carrying their own data declaration are separate roots and are left
    /// alone.
    pub fn walk(&self, element: &Element, scope: &Scope, extras: &Extras) {
        tracing::debug!(tag = element.tag(), "walk");

        let mut descend = Descend::Children;
        for (name, value) in element.attributes() {
            let Some(directive) = parse_attribute(&self.prefix, &name, &value) else {
                continue;
            };

            match self.dispatch(element, &directive, scope, extras) {
                Ok(Descend::Skip) => descend = Descend::Skip,
                Ok(Descend::Children) => {}
                Err(error) => {
                    if directive.kind() == DirectiveKind::For {
                        descend = Descend::Skip;
                    }
                    self.runtime.report(error);
                }
            }
        }

        if descend == Descend::Skip {
            return;
        }

        let data_attribute = self.data_attribute();
        for child in element.child_elements() {
            if child.has_attribute(&data_attribute) {
                tracing::debug!(tag = child.tag(), "nested root left for its own mount");
                continue;
            }
            self.walk(&child, scope, extras);
        }
    }

    fn dispatch(
        &self,
        element: &Element,
        directive: &Directive,
        scope: &Scope,
        extras: &Extras,
    ) -> Result<Descend> {
        match directive.kind() {
            DirectiveKind::Data => Ok(Descend::Children),
            DirectiveKind::Text => handlers::text(self, element, directive, scope, extras),
            DirectiveKind::Show => handlers::show(self, element, directive, scope, extras),
            DirectiveKind::On => handlers::on(self, element, directive, scope, extras),
            DirectiveKind::For => handlers::repeat(self, element, directive, scope, extras),
            DirectiveKind::Unknown => {
                tracing::debug!(name = %directive.name, "unknown directive ignored");
                Ok(Descend::Children)
            }
        }
    }

    pub(crate) fn data_attribute(&self) -> String {
        self.runtime.config().attribute("data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dom::Document;
    use crate::value::Value;

    fn bind(markup: &str, runtime: &Runtime, data: &[(&str, Value)]) -> Document {
        let doc = Document::parse(markup).unwrap();
        let data = runtime.object(data.iter().map(|(k, v)| ((*k).into(), v.clone())));
        Walker::new(runtime.clone()).walk(doc.root(), &Scope::new(data), &Extras::new());
        doc
    }

    #[test]
    fn binds_nested_elements() {
        let rt = Runtime::new();
        let doc = bind(
            r#"<div><p a-text="a"></p><section><span a-text="b"></span></section></div>"#,
            &rt,
            &[("a", Value::from(1)), ("b", Value::from("x"))],
        );
        assert_eq!(doc.to_markup(), r#"<div><p a-text="a">1</p><section><span a-text="b">x</span></section></div>"#);
    }

    #[test]
    fn skips_children_with_their_own_data() {
        let rt = Runtime::new();
        let doc = bind(
            r#"<div><p a-data="{ a: 2 }"><span id="inner" a-text="a"></span></p></div>"#,
            &rt,
            &[("a", Value::from(1))],
        );
        assert_eq!(doc.element_by_id("inner").unwrap().text_content(), "");
        assert!(rt.take_errors().is_empty());
    }

    #[test]
    fn unknown_directives_are_ignored() {
        let rt = Runtime::new();
        let doc = bind(r#"<p a-bind:title="a" a-text="a"></p>"#, &rt, &[("a", Value::from(3))]);
        assert_eq!(doc.root().text_content(), "3");
        assert!(rt.take_errors().is_empty());
    }

    #[test]
    fn honours_configured_prefix() {
        let rt = Runtime::with_config(Config::default().with_prefix("x-"));
        let doc = bind(r#"<p x-text="a" a-text="'no'"></p>"#, &rt, &[("a", Value::from("yes"))]);
        assert_eq!(doc.root().text_content(), "yes");
    }

    #[test]
    fn failing_directive_does_not_stop_siblings() {
        let rt = Runtime::new();
        let doc = bind(
            r#"<div><p id="bad" a-text="missing.deep"></p><p id="good" a-text="a"></p></div>"#,
            &rt,
            &[("a", Value::from("ok"))],
        );
        assert_eq!(doc.element_by_id("good").unwrap().text_content(), "ok");
        assert_eq!(rt.take_errors().len(), 1);
    }
}
