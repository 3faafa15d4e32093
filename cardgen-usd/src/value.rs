//! USDA values
//!
//! A loosely typed value tree covering everything that can appear on the
//! right-hand side of `=` in a USDA layer. Attribute type names are kept on
//! the property, so a `float3` and a `double3` are both a `Tuple` here.

use cardgen_core::{Point3d, Vector3d};
use std::fmt::{self, Write};

/// List-op prefix on a metadata entry (`prepend references = ...`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListOp {
    Add,
    Append,
    Delete,
    Prepend,
    Reorder,
}

impl ListOp {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "add" => Some(ListOp::Add),
            "append" => Some(ListOp::Append),
            "delete" => Some(ListOp::Delete),
            "prepend" => Some(ListOp::Prepend),
            "reorder" => Some(ListOp::Reorder),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ListOp::Add => "add",
            ListOp::Append => "append",
            ListOp::Delete => "delete",
            ListOp::Prepend => "prepend",
            ListOp::Reorder => "reorder",
        }
    }
}

/// One `key = value` entry of a metadata block
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataEntry {
    pub list_op: Option<ListOp>,
    pub key: String,
    pub value: Value,
}

/// An ordered metadata block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub entries: Vec<MetadataEntry>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Explicit (non list-op) value of `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|entry| entry.key == key && entry.list_op.is_none())
            .map(|entry| &entry.value)
    }

    /// Value of `key` authored with a specific list op
    pub fn get_list_op(&self, key: &str, op: ListOp) -> Option<&Value> {
        self.entries
            .iter()
            .find(|entry| entry.key == key && entry.list_op == Some(op))
            .map(|entry| &entry.value)
    }

    /// Set the explicit value of `key`, replacing every prior opinion
    pub fn set(&mut self, key: &str, value: Value) {
        self.entries.retain(|entry| entry.key != key);
        self.entries.push(MetadataEntry {
            list_op: None,
            key: key.to_string(),
            value,
        });
    }

    /// Remove every entry for `key`
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|entry| entry.key != key);
    }

    /// Add `item` to a list-valued key unless it is already present.
    ///
    /// An explicit list is extended in place; otherwise the item goes into
    /// the `prepend` list op.
    pub fn prepend_unique(&mut self, key: &str, item: Value) {
        for entry in self.entries.iter_mut().filter(|entry| entry.key == key) {
            if matches!(entry.list_op, None | Some(ListOp::Prepend)) {
                if let Value::List(items) = &mut entry.value {
                    if !items.contains(&item) {
                        items.insert(0, item);
                    }
                    return;
                }
            }
        }
        self.entries.push(MetadataEntry {
            list_op: Some(ListOp::Prepend),
            key: key.to_string(),
            value: Value::List(vec![item]),
        });
    }

    /// Items of a list-op composed key in strength order: prepended,
    /// explicit (or added), then appended. Deleted items are dropped.
    pub fn list_items(&self, key: &str) -> Vec<&Value> {
        let mut items: Vec<&Value> = Vec::new();
        for op in [Some(ListOp::Prepend), None, Some(ListOp::Add), Some(ListOp::Append)] {
            for entry in self
                .entries
                .iter()
                .filter(|entry| entry.key == key && entry.list_op == op)
            {
                items.extend(entry.value.items());
            }
        }
        if let Some(deleted) = self.get_list_op(key, ListOp::Delete) {
            let deleted = deleted.items();
            items.retain(|item| !deleted.contains(item));
        }
        items
    }
}

/// One typed entry of a dictionary value (`string name = "x"`)
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    pub type_name: String,
    pub key: String,
    pub value: Value,
}

/// A USDA value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer literal, written back digit for digit
    Int(i128),
    Number(f64),
    String(String),
    /// Bare identifier: `true`, `None`, `public`, ...
    Ident(String),
    Asset(String),
    Path(String),
    /// `@asset@</Prim>` or an asset/path followed by a layer offset block
    Reference {
        asset: Option<String>,
        prim_path: Option<String>,
        arguments: Metadata,
    },
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Dictionary(Vec<DictEntry>),
    TimeSamples(Vec<(f64, Value)>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn token(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn asset(s: impl Into<String>) -> Self {
        Value::Asset(s.into())
    }

    pub fn bool(b: bool) -> Self {
        Value::Ident(if b { "true" } else { "false" }.to_string())
    }

    pub fn vec3(v: &Vector3d) -> Self {
        Value::Tuple(vec![Value::Number(v.x), Value::Number(v.y), Value::Number(v.z)])
    }

    /// Check for the `None` value block
    pub fn is_blocked(&self) -> bool {
        matches!(self, Value::Ident(ident) if ident == "None")
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Ident(ident) if ident == "true" => Some(true),
            Value::Ident(ident) if ident == "false" => Some(false),
            Value::Int(n) => Some(*n != 0),
            Value::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    /// String-ish content: strings, tokens and identifiers
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Ident(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_asset(&self) -> Option<&str> {
        match self {
            Value::Asset(a) => Some(a),
            Value::Reference { asset: Some(a), .. } => Some(a),
            _ => None,
        }
    }

    /// Numeric tuple of any length
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        match self {
            Value::Tuple(items) => items.iter().map(Value::as_f64).collect(),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vector3d> {
        match self.as_numbers()?.as_slice() {
            [x, y, z] => Some(Vector3d::new(*x, *y, *z)),
            _ => None,
        }
    }

    /// Array of 3-tuples, as authored for `points` or `extent`
    pub fn as_point_array(&self) -> Option<Vec<Point3d>> {
        match self {
            Value::List(items) => items
                .iter()
                .map(|item| item.as_vec3().map(Point3d::from))
                .collect(),
            _ => None,
        }
    }

    /// Array of strings or tokens
    pub fn as_string_array(&self) -> Option<Vec<&str>> {
        match self {
            Value::List(items) => items.iter().map(Value::as_str).collect(),
            _ => None,
        }
    }

    /// A 4x4 matrix authored as a tuple of four row tuples
    pub fn as_matrix_rows(&self) -> Option<[[f64; 4]; 4]> {
        let rows = match self {
            Value::Tuple(rows) if rows.len() == 4 => rows,
            _ => return None,
        };
        let mut out = [[0.0; 4]; 4];
        for (r, row) in rows.iter().enumerate() {
            let numbers = row.as_numbers()?;
            if numbers.len() != 4 {
                return None;
            }
            out[r].copy_from_slice(&numbers);
        }
        Some(out)
    }

    /// Asset and prim path of a reference or payload item
    pub fn as_reference(&self) -> Option<(Option<&str>, Option<&str>)> {
        match self {
            Value::Asset(asset) => Some((Some(asset.as_str()), None)),
            Value::Path(path) => Some((None, Some(path.as_str()))),
            Value::Reference {
                asset, prim_path, ..
            } => Some((asset.as_deref(), prim_path.as_deref())),
            _ => None,
        }
    }

    /// Items of a list, or the value itself when authored as a single item
    pub fn items(&self) -> Vec<&Value> {
        match self {
            Value::List(items) => items.iter().collect(),
            Value::Ident(ident) if ident == "None" => Vec::new(),
            other => vec![other],
        }
    }

    /// Look up a dictionary entry by key
    pub fn dict_get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dictionary(entries) => entries
                .iter()
                .find(|entry| entry.key == key)
                .map(|entry| &entry.value),
            _ => None,
        }
    }
}

pub(crate) fn format_number(n: f64, out: &mut String) {
    if n.is_nan() {
        out.push_str("nan");
    } else if n.is_infinite() {
        out.push_str(if n > 0.0 { "inf" } else { "-inf" });
    } else {
        let _ = write!(out, "{}", n);
    }
}

pub(crate) fn quote_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

pub(crate) fn quote_asset(s: &str, out: &mut String) {
    if s.contains('@') {
        out.push_str("@@@");
        out.push_str(s);
        out.push_str("@@@");
    } else {
        out.push('@');
        out.push_str(s);
        out.push('@');
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        crate::writer::write_value(self, 0, &mut out);
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        let mut out = String::new();
        format_number(50.0, &mut out);
        out.push(' ');
        format_number(0.25, &mut out);
        out.push(' ');
        format_number(f64::NEG_INFINITY, &mut out);
        assert_eq!(out, "50 0.25 -inf");
    }

    #[test]
    fn test_string_escaping() {
        let mut out = String::new();
        quote_string("say \"hi\"\n", &mut out);
        assert_eq!(out, r#""say \"hi\"\n""#);
    }

    #[test]
    fn test_prepend_unique() {
        let mut metadata = Metadata::new();
        metadata.prepend_unique("apiSchemas", Value::string("GeomModelAPI"));
        metadata.prepend_unique("apiSchemas", Value::string("GeomModelAPI"));
        let items = metadata.list_items("apiSchemas");
        assert_eq!(items, vec![&Value::string("GeomModelAPI")]);
        assert!(metadata.get_list_op("apiSchemas", ListOp::Prepend).is_some());
    }

    #[test]
    fn test_list_items_honor_delete() {
        let mut metadata = Metadata::new();
        metadata.entries.push(MetadataEntry {
            list_op: Some(ListOp::Prepend),
            key: "references".to_string(),
            value: Value::List(vec![Value::asset("a.usda"), Value::asset("b.usda")]),
        });
        metadata.entries.push(MetadataEntry {
            list_op: Some(ListOp::Delete),
            key: "references".to_string(),
            value: Value::asset("a.usda"),
        });
        assert_eq!(metadata.list_items("references"), vec![&Value::asset("b.usda")]);
    }

    #[test]
    fn test_point_array() {
        let value = Value::List(vec![
            Value::Tuple(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]),
            Value::Tuple(vec![Value::Number(-1.0), Value::Number(0.0), Value::Number(0.5)]),
        ]);
        let points = value.as_point_array().unwrap();
        assert_eq!(points[1], Point3d::new(-1.0, 0.0, 0.5));
        assert!(Value::Number(1.0).as_point_array().is_none());
    }
}
