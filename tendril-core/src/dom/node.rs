//! Element tree.
//!
//! A small in-memory stand-in for the host document: elements with ordered
//! attributes, inline style, children, event listeners and a parent link.
//! Handles are cheap to clone; all clones see the same node.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::event::Event;

/// An event listener callback.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Elements whose markup never has a closing tag.
pub(crate) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// A child of an element.
#[derive(Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    /// Deep copy without listeners.
    pub fn deep_clone(&self) -> Node {
        match self {
            Node::Element(element) => Node::Element(element.deep_clone()),
            Node::Text(text) => Node::Text(text.clone()),
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Node::Element(element) => element.text_content(),
            Node::Text(text) => text.clone(),
        }
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.write_markup(out),
            Node::Text(text) => out.push_str(&escape(text, false)),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Element(element) => write!(f, "{:?}", element),
            Node::Text(text) => write!(f, "Text({:?})", text),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

#[derive(Default)]
struct ElementState {
    attributes: IndexMap<String, String>,
    style: IndexMap<String, String>,
    children: Vec<Node>,
    parent: Weak<ElementInner>,
    listeners: Vec<(String, Listener)>,
}

struct ElementInner {
    tag: String,
    state: RwLock<ElementState>,
}

/// Handle to an element.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ElementInner {
                tag: tag.into(),
                state: RwLock::new(ElementState::default()),
            }),
        }
    }

    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    pub fn ptr_eq(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.state.read().attributes.get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.inner.state.read().attributes.contains_key(name)
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .state
            .write()
            .attributes
            .insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.inner.state.write().attributes.shift_remove(name)
    }

    /// All attributes in declaration order.
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.inner
            .state
            .read()
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Style
    // ------------------------------------------------------------------

    pub fn style(&self, property: &str) -> Option<String> {
        self.inner.state.read().style.get(property).cloned()
    }

    pub fn set_style(&self, property: impl Into<String>, value: impl Into<String>) {
        self.inner
            .state
            .write()
            .style
            .insert(property.into(), value.into());
    }

    /// Whether inline style hides the element.
    pub fn is_hidden(&self) -> bool {
        self.style("display").as_deref() == Some("none")
    }

    // ------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------

    pub fn parent(&self) -> Option<Element> {
        self.inner
            .state
            .read()
            .parent
            .upgrade()
            .map(|inner| Element { inner })
    }

    pub fn children(&self) -> Vec<Node> {
        self.inner.state.read().children.clone()
    }

    /// Child elements in document order, skipping text.
    pub fn child_elements(&self) -> Vec<Element> {
        self.inner
            .state
            .read()
            .children
            .iter()
            .filter_map(|child| child.as_element().cloned())
            .collect()
    }

    pub fn child_count(&self) -> usize {
        self.inner.state.read().children.len()
    }

    /// Append a child. An element is first detached from its old parent.
    pub fn append_child(&self, child: impl Into<Node>) {
        let child = child.into();
        if let Node::Element(element) = &child {
            element.detach();
            element.inner.state.write().parent = Arc::downgrade(&self.inner);
        }
        self.inner.state.write().children.push(child);
    }

    pub fn append_text(&self, text: impl Into<String>) {
        self.append_child(Node::Text(text.into()));
    }

    /// Detach and return the first child node.
    pub fn take_first_child(&self) -> Option<Node> {
        let child = {
            let mut state = self.inner.state.write();
            if state.children.is_empty() {
                return None;
            }
            state.children.remove(0)
        };
        if let Node::Element(element) = &child {
            element.inner.state.write().parent = Weak::new();
        }
        Some(child)
    }

    /// Remove every child.
    pub fn clear_children(&self) {
        let children = std::mem::take(&mut self.inner.state.write().children);
        for child in children {
            if let Node::Element(element) = child {
                element.inner.state.write().parent = Weak::new();
            }
        }
    }

    /// Remove this element from its parent, if it has one.
    pub fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        parent
            .inner
            .state
            .write()
            .children
            .retain(|child| !matches!(child, Node::Element(e) if e.ptr_eq(self)));
        self.inner.state.write().parent = Weak::new();
    }

    /// This element and all descendant elements, in document order.
    pub fn descendants(&self) -> Vec<Element> {
        let mut out = vec![self.clone()];
        for child in self.child_elements() {
            out.extend(child.descendants());
        }
        out
    }

    /// Elements in this subtree (including this one) carrying `attribute`.
    pub fn query_all_with_attribute(&self, attribute: &str) -> Vec<Element> {
        self.descendants()
            .into_iter()
            .filter(|element| element.has_attribute(attribute))
            .collect()
    }

    /// Deep copy: attributes, style and children. Listeners and the parent
    /// link are not copied.
    pub fn deep_clone(&self) -> Element {
        let copy = Element::new(self.tag());
        {
            let state = self.inner.state.read();
            let mut target = copy.inner.state.write();
            target.attributes = state.attributes.clone();
            target.style = state.style.clone();
        }
        for child in self.children() {
            copy.append_child(child.deep_clone());
        }
        copy
    }

    // ------------------------------------------------------------------
    // Text
    // ------------------------------------------------------------------

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        self.children().iter().map(Node::text_content).collect()
    }

    /// Replace all children with a single text node (none for empty text).
    pub fn set_text_content(&self, text: impl Into<String>) {
        let text = text.into();
        self.clear_children();
        if !text.is_empty() {
            self.inner.state.write().children.push(Node::Text(text));
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn add_event_listener<F>(&self, kind: impl Into<String>, listener: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner
            .state
            .write()
            .listeners
            .push((kind.into(), Arc::new(listener)));
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.inner
            .state
            .read()
            .listeners
            .iter()
            .filter(|(k, _)| k == kind)
            .count()
    }

    /// Dispatch `event` at this element and bubble it up through the
    /// ancestors. Listeners on one element all run even if one of them stops
    /// propagation. Returns `false` if the default action was prevented.
    pub fn dispatch_event(&self, event: &Event) -> bool {
        event.set_target(self);

        let mut current = Some(self.clone());
        while let Some(element) = current {
            let listeners: Vec<Listener> = element
                .inner
                .state
                .read()
                .listeners
                .iter()
                .filter(|(kind, _)| kind == event.kind())
                .map(|(_, listener)| listener.clone())
                .collect();

            event.set_current_target(Some(&element));
            for listener in listeners {
                listener(event);
            }

            if event.propagation_stopped() || !event.bubbles() {
                break;
            }
            current = element.parent();
        }
        event.set_current_target(None);

        !event.default_prevented()
    }

    /// Convenience for dispatching a fresh bubbling event.
    pub fn dispatch(&self, kind: &str) -> Event {
        let event = Event::new(kind);
        self.dispatch_event(&event);
        event
    }

    // ------------------------------------------------------------------
    // Serialisation
    // ------------------------------------------------------------------

    /// Markup for this element and its subtree. Inline style is written as a
    /// `style` attribute.
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out);
        out
    }

    /// Markup for the children only.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            child.write_markup(&mut out);
        }
        out
    }

    fn write_markup(&self, out: &mut String) {
        let (attributes, style) = {
            let state = self.inner.state.read();
            (state.attributes.clone(), state.style.clone())
        };

        out.push('<');
        out.push_str(self.tag());
        for (name, value) in &attributes {
            out.push_str(&format!(" {}=\"{}\"", name, escape(value, true)));
        }
        if !style.is_empty() {
            let declarations: Vec<String> = style
                .iter()
                .map(|(property, value)| format!("{}: {}", property, value))
                .collect();
            out.push_str(&format!(" style=\"{}\"", declarations.join("; ")));
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&self.tag()) {
            return;
        }
        for child in self.children() {
            child.write_markup(out);
        }
        out.push_str(&format!("</{}>", self.tag()));
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Element")
            .field("tag", &self.inner.tag)
            .field("attributes", &state.attributes)
            .field("children", &state.children.len())
            .finish()
    }
}
