//! Markup reader.
//!
//! Reads the subset of HTML templates are written in: elements, quoted,
//! unquoted or bare attributes, text, comments, self-closing and void
//! elements, and the five basic character entities. Whitespace-only text
//! between tags is dropped.

use thiserror::Error;

use super::node::{Element, Node, VOID_ELEMENTS};

/// Errors raised while reading markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    #[error("unexpected end of markup")]
    UnexpectedEof,

    #[error("expected `</{expected}>` but found `</{found}>`")]
    MismatchedClose { expected: String, found: String },

    #[error("element `<{0}>` is never closed")]
    Unclosed(String),

    #[error("invalid tag at offset {offset}")]
    InvalidTag { offset: usize },
}

/// Read `source` into a list of top-level nodes.
pub fn parse(source: &str) -> Result<Vec<Node>, MarkupError> {
    Reader {
        src: source,
        pos: 0,
    }
    .read_document()
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn read_document(&mut self) -> Result<Vec<Node>, MarkupError> {
        // Open elements; the bottom entry collects top-level nodes.
        let mut stack: Vec<Element> = Vec::new();
        let mut top: Vec<Node> = Vec::new();

        while self.pos < self.src.len() {
            if self.eat("<!--") {
                match self.rest().find("-->") {
                    Some(end) => self.pos += end + 3,
                    None => return Err(MarkupError::UnexpectedEof),
                }
            } else if self.rest().starts_with("</") {
                let offset = self.pos;
                self.pos += 2;
                let name = self.take_while(is_name_char).to_ascii_lowercase();
                self.skip_whitespace();
                if name.is_empty() || !self.eat(">") {
                    return Err(MarkupError::InvalidTag { offset });
                }
                let open = stack.pop().ok_or_else(|| MarkupError::MismatchedClose {
                    expected: String::new(),
                    found: name.clone(),
                })?;
                if open.tag() != name {
                    return Err(MarkupError::MismatchedClose {
                        expected: open.tag().to_string(),
                        found: name,
                    });
                }
                attach(&stack, &mut top, Node::Element(open));
            } else if self.rest().starts_with('<') {
                let (element, closed) = self.read_open_tag()?;
                if closed || VOID_ELEMENTS.contains(&element.tag()) {
                    attach(&stack, &mut top, Node::Element(element));
                } else {
                    stack.push(element);
                }
            } else {
                let raw = self.take_while(|c| c != '<');
                if !raw.trim().is_empty() {
                    attach(&stack, &mut top, Node::Text(decode_entities(raw)));
                }
            }
        }

        match stack.pop() {
            Some(open) => Err(MarkupError::Unclosed(open.tag().to_string())),
            None => Ok(top),
        }
    }

    /// Read `<tag attr...>` and report whether it was self-closed.
    fn read_open_tag(&mut self) -> Result<(Element, bool), MarkupError> {
        let offset = self.pos;
        self.bump();
        let tag = self.take_while(is_name_char);
        if tag.is_empty() {
            return Err(MarkupError::InvalidTag { offset });
        }
        let element = Element::new(tag.to_ascii_lowercase());

        loop {
            self.skip_whitespace();
            if self.eat("/>") {
                return Ok((element, true));
            }
            if self.eat(">") {
                return Ok((element, false));
            }
            if self.peek().is_none() {
                return Err(MarkupError::UnexpectedEof);
            }

            let name = self.take_while(is_attribute_name_char);
            if name.is_empty() {
                return Err(MarkupError::InvalidTag { offset: self.pos });
            }
            self.skip_whitespace();
            let value = if self.eat("=") {
                self.skip_whitespace();
                self.read_attribute_value()?
            } else {
                String::new()
            };
            element.set_attribute(name, value);
        }
    }

    fn read_attribute_value(&mut self) -> Result<String, MarkupError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let raw = self.take_while(|c| c != quote);
                if !self.eat(&quote.to_string()) {
                    return Err(MarkupError::UnexpectedEof);
                }
                Ok(decode_entities(raw))
            }
            Some(_) => {
                let raw = self.take_while(|c| !c.is_whitespace() && c != '>');
                Ok(decode_entities(raw))
            }
            None => Err(MarkupError::UnexpectedEof),
        }
    }
}

fn attach(stack: &[Element], top: &mut Vec<Node>, node: Node) {
    match stack.last() {
        Some(parent) => parent.append_child(node),
        None => top.push(node),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'
}

fn is_attribute_name_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '=' | '>' | '/' | '"' | '\'')
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
