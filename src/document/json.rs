use serde_json::{Map, Number, Value};

use super::{DocumentCodec, DocumentError, Node};

/// JSON text codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl DocumentCodec for JsonCodec {
    fn parse(&self, text: &str, capacity: usize) -> Result<Node, DocumentError> {
        // The raw text has to fit before any tree is built.
        if text.len() > capacity {
            return Err(DocumentError::NoMemory {
                needed: text.len(),
                capacity,
            });
        }
        let value: Value =
            serde_json::from_str(text).map_err(|e| DocumentError::Syntax(e.to_string()))?;
        let node = from_value(value);
        let needed = node.footprint();
        if needed > capacity {
            return Err(DocumentError::NoMemory { needed, capacity });
        }
        Ok(node)
    }

    fn render(&self, node: &Node, capacity: usize) -> Result<String, DocumentError> {
        let needed = node.footprint();
        if needed > capacity {
            return Err(DocumentError::NoMemory { needed, capacity });
        }
        serde_json::to_string(&to_value(node)).map_err(|e| DocumentError::Syntax(e.to_string()))
    }
}

fn from_value(value: Value) -> Node {
    match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::Bool(b),
        Value::Number(n) => n.as_f64().map_or(Node::Null, Node::Number),
        Value::String(s) => Node::String(s),
        Value::Array(items) => Node::Array(items.into_iter().map(from_value).collect()),
        Value::Object(map) => Node::Object(map.into_iter().map(|(k, v)| (k, from_value(v))).collect()),
    }
}

fn to_value(node: &Node) -> Value {
    match node {
        Node::Null => Value::Null,
        Node::Bool(b) => Value::Bool(*b),
        Node::Number(n) => number_value(*n),
        Node::String(s) => Value::String(s.clone()),
        Node::Array(items) => Value::Array(items.iter().map(to_value).collect()),
        Node::Object(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(k.clone(), to_value(v));
            }
            Value::Object(map)
        }
    }
}

fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        return Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(Value::Null, Value::Number)
}
