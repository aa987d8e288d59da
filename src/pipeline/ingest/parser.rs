//! Document parser adapter: raw bytes → untyped [`Node`] tree.
//!
//! YAML goes through `serde_yaml`, JSON through `serde_json`; both land in
//! the same format-agnostic tree so the decomposer never sees either crate's
//! value type. Parsing is blocking work and is only ever run through the
//! bounded executor.

use thiserror::Error;

use super::format::InputFormat;

/// Format-agnostic parsed document.
///
/// Mapping entries keep document order; duplicate keys are resolved by the
/// underlying parser before they reach this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Node>),
    Mapping(Vec<(String, Node)>),
}

impl Node {
    /// Look up a key in a mapping. Non-mappings have no keys.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    /// Short type label used in schema error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "boolean",
            Node::Integer(_) => "integer",
            Node::Float(_) => "float",
            Node::String(_) => "string",
            Node::Sequence(_) => "sequence",
            Node::Mapping(_) => "mapping",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{format} parse error: {message}")]
pub struct ParseError {
    pub format: InputFormat,
    pub message: String,
}

impl ParseError {
    fn new(format: InputFormat, message: impl Into<String>) -> Self {
        Self {
            format,
            message: message.into(),
        }
    }
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse raw document bytes of a detected format.
pub fn parse_document(bytes: &[u8], format: InputFormat) -> Result<Node, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ParseError::new(format, format!("input is not valid UTF-8: {e}")))?;

    match format {
        InputFormat::Yaml => parse_yaml(text),
        InputFormat::Json => parse_json(text),
        InputFormat::Unsupported => Err(ParseError::new(format, "no parser for this format")),
    }
}

fn parse_yaml(text: &str) -> Result<Node, ParseError> {
    let mut value: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| ParseError::new(InputFormat::Yaml, e.to_string()))?;
    value
        .apply_merge()
        .map_err(|e| ParseError::new(InputFormat::Yaml, e.to_string()))?;
    yaml_to_node(value)
}

/// Convert a YAML value, handling tags without ever constructing objects.
///
/// `!float`/`!double` coerce their scalar to a float. Every other tag
/// (`!JetMemoryBlock`, `!PartitionMemoryBlocks`, ...) is dropped and the
/// tagged content is kept as plain data.
fn yaml_to_node(value: serde_yaml::Value) -> Result<Node, ParseError> {
    use serde_yaml::Value;

    Ok(match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::Bool(b),
        Value::Number(n) => yaml_number(&n)?,
        Value::String(s) => Node::String(s),
        Value::Sequence(items) => Node::Sequence(
            items
                .into_iter()
                .map(yaml_to_node)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Mapping(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map {
                entries.push((yaml_key(key)?, yaml_to_node(value)?));
            }
            Node::Mapping(entries)
        }
        Value::Tagged(tagged) => {
            let tagged = *tagged;
            if tagged.tag == "float" || tagged.tag == "double" {
                yaml_float(&tagged.tag.to_string(), tagged.value)?
            } else {
                tracing::trace!(tag = %tagged.tag, "Stripping YAML tag");
                yaml_to_node(tagged.value)?
            }
        }
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Result<Node, ParseError> {
    if let Some(i) = n.as_i64() {
        Ok(Node::Integer(i))
    } else if n.is_f64() {
        Ok(Node::Float(n.as_f64().unwrap_or(f64::NAN)))
    } else {
        Err(ParseError::new(
            InputFormat::Yaml,
            format!("integer {n} does not fit in 64-bit signed range"),
        ))
    }
}

fn yaml_float(tag: &str, value: serde_yaml::Value) -> Result<Node, ParseError> {
    use serde_yaml::Value;

    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.map(Node::Float).ok_or_else(|| {
        ParseError::new(
            InputFormat::Yaml,
            format!("{tag} tag requires a numeric scalar"),
        )
    })
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, ParseError> {
    use serde_yaml::Value;

    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("null".into()),
        Value::Tagged(tagged) => yaml_key(tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => Err(ParseError::new(
            InputFormat::Yaml,
            "mapping keys must be scalars",
        )),
    }
}

fn parse_json(text: &str) -> Result<Node, ParseError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| ParseError::new(InputFormat::Json, e.to_string()))?;
    json_to_node(value)
}

fn json_to_node(value: serde_json::Value) -> Result<Node, ParseError> {
    use serde_json::Value;

    Ok(match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::Bool(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Node::Integer(i)
            } else if n.is_f64() {
                Node::Float(n.as_f64().unwrap_or(f64::NAN))
            } else {
                return Err(ParseError::new(
                    InputFormat::Json,
                    format!("integer {n} does not fit in 64-bit signed range"),
                ));
            }
        }
        Value::String(s) => Node::String(s),
        Value::Array(items) => Node::Sequence(
            items
                .into_iter()
                .map(json_to_node)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, value) in map {
                entries.push((key, json_to_node(value)?));
            }
            Node::Mapping(entries)
        }
    })
}
