// Lenient XML to JSON-tree conversion for upstream feeds.
// The produced shape mirrors what the route adapters expect from JSON upstreams:
// attributes are merged into the element's fields, repeated siblings collapse into arrays,
// text-only elements become plain strings and mixed text lands under "_".

use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

pub const TEXT_KEY: &str = "_";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XmlError {
    #[error("document has no root element")]
    NoRootElement,

    #[error("malformed XML at position {position}: {message}")]
    Malformed { position: u64, message: String },
}

struct Node {
    name: String,
    fields: Vec<(String, Value)>,
    text: String,
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            fields: Vec::new(),
            text: String::new(),
        }
    }

    fn from_start(start: &BytesStart) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut node = Node::new(name);

        let mut attributes = start.html_attributes();
        attributes.with_checks(false);
        for attribute in attributes {
            let Ok(attribute) = attribute else {
                break;
            };
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attribute.value);
            let value = match unescape(&raw) {
                Ok(value) => value.into_owned(),
                Err(_) => raw.into_owned(),
            };
            node.fields.push((key, Value::String(value)));
        }
        node
    }

    fn into_value(self) -> Value {
        let text = self.text.trim();
        if self.fields.is_empty() {
            return Value::String(text.to_string());
        }

        let mut map = Map::new();
        for (key, value) in self.fields {
            push_field(&mut map, key, value);
        }
        if !text.is_empty() {
            push_field(&mut map, TEXT_KEY.to_string(), Value::String(text.to_string()));
        }
        Value::Object(map)
    }
}

fn push_field(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(key, value);
        }
    }
}

struct TreeBuilder {
    // Index 0 is the document node; it never closes
    stack: Vec<Node>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Node::new(String::new())],
        }
    }

    fn has_content(&self) -> bool {
        self.stack.len() > 1 || !self.stack[0].fields.is_empty()
    }

    fn open(&mut self, node: Node) {
        self.stack.push(node);
    }

    fn close_top(&mut self) {
        if self.stack.len() <= 1 {
            return;
        }
        if let Some(node) = self.stack.pop() {
            let name = node.name.clone();
            let value = node.into_value();
            if let Some(parent) = self.stack.last_mut() {
                parent.fields.push((name, value));
            }
        }
    }

    // Closes everything above and including the nearest open element with this name.
    // End tags that match nothing are dropped.
    fn close_named(&mut self, name: &[u8]) {
        let position = self
            .stack
            .iter()
            .skip(1)
            .rposition(|node| node.name.as_bytes() == name);

        if let Some(index) = position.map(|p| p + 1) {
            while self.stack.len() > index {
                self.close_top();
            }
        }
    }

    fn empty(&mut self, node: Node) {
        self.open(node);
        self.close_top();
    }

    fn text(&mut self, text: &str) {
        if let Some(node) = self.stack.last_mut() {
            node.text.push_str(text);
        }
    }

    fn finish(mut self) -> Result<Value, XmlError> {
        while self.stack.len() > 1 {
            self.close_top();
        }
        let document = self.stack.pop().ok_or(XmlError::NoRootElement)?;
        if document.fields.is_empty() {
            return Err(XmlError::NoRootElement);
        }

        let mut map = Map::new();
        for (key, value) in document.fields {
            push_field(&mut map, key, value);
        }
        Ok(Value::Object(map))
    }
}

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

// Feeds routinely carry bare `&` in titles; escape those so the reader does not stop on them.
// CDATA sections are copied as-is, their content is never unescaped.
fn escape_bare_ampersands(xml: &str) -> Cow<'_, str> {
    if !xml.contains('&') {
        return Cow::Borrowed(xml);
    }

    let mut out = String::with_capacity(xml.len() + 16);
    let mut rest = xml;
    while let Some(start) = rest.find(CDATA_OPEN) {
        escape_segment(&mut out, &rest[..start]);
        let body = start + CDATA_OPEN.len();
        let end = rest[body..]
            .find(CDATA_CLOSE)
            .map_or(rest.len(), |i| body + i + CDATA_CLOSE.len());
        out.push_str(&rest[start..end]);
        rest = &rest[end..];
    }
    escape_segment(&mut out, rest);
    Cow::Owned(out)
}

fn escape_segment(out: &mut String, segment: &str) {
    let mut rest = segment;
    while let Some(index) = rest.find('&') {
        out.push_str(&rest[..index]);
        let tail = &rest[index + 1..];
        if is_reference(tail) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = tail;
    }
    out.push_str(rest);
}

fn is_reference(tail: &str) -> bool {
    let Some(end) = tail.find(';') else {
        return false;
    };
    let name = &tail[..end];
    if name.is_empty() || name.len() > 32 {
        return false;
    }
    match name.strip_prefix('#') {
        Some(digits) => match digits.strip_prefix(['x', 'X']) {
            Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
            None => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
        },
        None => name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'),
    }
}

fn resolve_reference(name: &str) -> Cow<'static, str> {
    if let Some(code) = name.strip_prefix('#') {
        let parsed = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        if let Some(c) = parsed.and_then(char::from_u32) {
            return Cow::Owned(c.to_string());
        }
    } else if let Some(resolved) = resolve_predefined_entity(name) {
        return Cow::Borrowed(resolved);
    } else if name == "nbsp" {
        return Cow::Borrowed("\u{a0}");
    }
    // Unknown entities survive verbatim
    Cow::Owned(format!("&{};", name))
}

/// Parses loosely-structured XML into a JSON tree rooted at the document
/// element's name, e.g. `{"rss": {"version": "2.0", "channel": {...}}}`.
///
/// Mismatched and unmatched end tags are tolerated, elements left open at
/// the end of input are closed, and a reader error after the root element
/// has started truncates the document instead of failing it.
pub fn parse_lenient(xml: &str) -> Result<Value, XmlError> {
    let source = escape_bare_ampersands(xml);
    let mut reader = Reader::from_str(&source);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
    }

    let mut builder = TreeBuilder::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => builder.open(Node::from_start(&e)),
            Ok(Event::Empty(e)) => builder.empty(Node::from_start(&e)),
            Ok(Event::End(e)) => builder.close_named(e.name().as_ref()),
            Ok(Event::Text(e)) => builder.text(&String::from_utf8_lossy(&e)),
            Ok(Event::CData(e)) => builder.text(&String::from_utf8_lossy(&e)),
            Ok(Event::GeneralRef(e)) => {
                let name = String::from_utf8_lossy(&e);
                builder.text(&resolve_reference(&name));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                if builder.has_content() {
                    tracing::debug!(
                        position = reader.error_position(),
                        error = %e,
                        "truncating malformed XML document"
                    );
                    break;
                }
                return Err(XmlError::Malformed {
                    position: reader.error_position(),
                    message: e.to_string(),
                });
            }
            _ => (),
        }
    }

    builder.finish()
}
