//! Host document.
//!
//! An in-memory element tree with the operations templates need: attribute
//! and child traversal, text mutation, inline style, event listeners with
//! bubbling dispatch, and deep cloning.

mod event;
pub mod markup;
mod node;

pub use event::Event;
pub use markup::MarkupError;
pub use node::{Element, Listener, Node};

/// A parsed document. Top-level nodes hang off a synthetic `body` root.
#[derive(Clone, Debug)]
pub struct Document {
    root: Element,
}

impl Document {
    /// An empty document.
    pub fn new() -> Self {
        Self {
            root: Element::new("body"),
        }
    }

    pub fn parse(source: &str) -> Result<Self, MarkupError> {
        let document = Self::new();
        for node in markup::parse(source)? {
            document.root.append_child(node);
        }
        Ok(document)
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// First element (document order) whose `id` attribute matches.
    pub fn element_by_id(&self, id: &str) -> Option<Element> {
        self.root
            .descendants()
            .into_iter()
            .find(|element| element.attribute("id").as_deref() == Some(id))
    }

    /// Markup of everything below the root.
    pub fn to_markup(&self) -> String {
        self.root.inner_html()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
