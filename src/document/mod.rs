//! Key/value document tree used by the section serializer.
//!
//! The serializer never talks to a concrete document library. It builds and
//! walks [`Node`] trees and hands them to a [`DocumentCodec`], which parses
//! and renders text under an explicit capacity budget. Budget accounting uses
//! [`Node::footprint`], which approximates the memory a pooled document
//! would need on the device.

mod json;

pub use json::JsonCodec;

use thiserror::Error;

/// Fixed cost of one node slot.
pub const NODE_SLOT_BYTES: usize = 16;

/// Errors raised by a codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The document does not fit in `capacity` bytes.
    #[error("document needs {needed} bytes, capacity is {capacity}")]
    NoMemory {
        /// Bytes the document requires.
        needed: usize,
        /// Bytes that were available.
        capacity: usize,
    },

    /// Malformed or truncated text.
    #[error("{0}")]
    Syntax(String),
}

/// Parses text into a [`Node`] tree and renders it back, both under a capacity.
pub trait DocumentCodec {
    /// Parse `text` into a tree no larger than `capacity` bytes.
    fn parse(&self, text: &str, capacity: usize) -> Result<Node, DocumentError>;

    /// Render `node` to text, failing if the tree exceeds `capacity` bytes.
    fn render(&self, node: &Node, capacity: usize) -> Result<String, DocumentError>;
}

/// A structured document value.
///
/// Objects keep insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Explicit null.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Any number, widened to `f64`.
    Number(f64),
    /// String literal.
    String(String),
    /// Ordered list.
    Array(Vec<Node>),
    /// Key/value pairs in document order.
    Object(Vec<(String, Node)>),
}

impl Node {
    /// Empty object.
    pub fn object() -> Self {
        Node::Object(Vec::new())
    }

    /// Number node for a single-precision value, using its shortest decimal form.
    pub fn from_f32(value: f32) -> Self {
        if !value.is_finite() {
            return Node::Null;
        }
        let widened = value.to_string().parse::<f64>().unwrap_or(f64::from(value));
        Node::Number(widened)
    }

    /// Insert or replace `key` in an object. No-op for other node kinds.
    pub fn insert(&mut self, key: &str, value: impl Into<Node>) -> &mut Self {
        if let Node::Object(entries) = self {
            let value = value.into();
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key.to_string(), value)),
            }
        }
        self
    }

    /// Value at `key` if this is an object.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// True when this is an object holding `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// True for [`Node::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Entries if this is an object.
    pub fn as_object(&self) -> Option<&[(String, Node)]> {
        match self {
            Node::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "bool",
            Node::Number(_) => "number",
            Node::String(_) => "string",
            Node::Array(_) => "array",
            Node::Object(_) => "object",
        }
    }

    /// Text form of a scalar, as a loosely typed document would coerce it.
    pub fn to_text(&self) -> String {
        match self {
            Node::Null => String::new(),
            Node::Bool(b) => b.to_string(),
            Node::Number(n) => format_number(*n),
            Node::String(s) => s.clone(),
            Node::Array(_) | Node::Object(_) => String::new(),
        }
    }

    /// Approximate pooled memory needed to hold this tree.
    pub fn footprint(&self) -> usize {
        NODE_SLOT_BYTES
            + match self {
                Node::String(s) => s.len() + 1,
                Node::Array(items) => items.iter().map(Node::footprint).sum(),
                Node::Object(entries) => entries
                    .iter()
                    .map(|(k, v)| k.len() + 1 + v.footprint())
                    .sum(),
                _ => 0,
            }
    }
}

/// Integers print without a fractional part.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::String(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::String(value)
    }
}

impl From<f32> for Node {
    fn from(value: f32) -> Self {
        Node::from_f32(value)
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Node::Number(f64::from(value))
    }
}

impl From<u8> for Node {
    fn from(value: u8) -> Self {
        Node::Number(f64::from(value))
    }
}

impl From<usize> for Node {
    fn from(value: usize) -> Self {
        Node::Number(value as f64)
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(value: Option<T>) -> Self {
        value.map_or(Node::Null, Into::into)
    }
}

impl From<Vec<Node>> for Node {
    fn from(value: Vec<Node>) -> Self {
        Node::Array(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut node = Node::object();
        node.insert("a", 1).insert("b", true).insert("a", "x");
        assert_eq!(
            node,
            Node::Object(vec![
                ("a".into(), Node::String("x".into())),
                ("b".into(), Node::Bool(true)),
            ])
        );
    }

    #[test]
    fn test_footprint_counts_keys_and_strings() {
        assert_eq!(Node::Null.footprint(), 16);
        assert_eq!(Node::from("abc").footprint(), 20);
        let mut obj = Node::object();
        obj.insert("id", "m1");
        // object slot + key "id\0" + string slot + "m1\0"
        assert_eq!(obj.footprint(), 16 + 3 + 16 + 3);
    }

    #[test]
    fn test_f32_uses_shortest_form() {
        assert_eq!(Node::from(0.1f32), Node::Number(0.1));
        assert_eq!(Node::from(f32::NAN), Node::Null);
        assert_eq!(Node::Number(2000.0).to_text(), "2000");
        assert_eq!(Node::Number(1.5).to_text(), "1.5");
    }
}
