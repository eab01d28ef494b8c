// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime values and bundle instances.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Map;

use crate::error::SchemaError;
use crate::schema::{BundleSchema, FieldShape};

/// JSON object used for record payloads.
pub type Record = Map<String, serde_json::Value>;

/// Value stored in a bundle field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value; the field is not materialized.
    Null,
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    /// Sequence of text lines.
    Lines(Vec<String>),
    /// Single mapping.
    Record(Record),
    /// Sequence of mappings.
    Records(Vec<Record>),
    Bytes(Vec<u8>),
    /// Any other JSON payload, for custom kinds.
    Json(serde_json::Value),
    /// Filesystem path, typically the source of a copy-mode field.
    Path(PathBuf),
    /// Nested bundle instance.
    Bundle(Bundle),
    /// Ordered collection of bundle instances.
    Bundles(Vec<Bundle>),
}

impl Value {
    /// Convert a JSON value, picking the closest payload variant.
    ///
    /// Arrays of objects (and empty arrays) become [`Value::Records`], arrays
    /// of strings become [`Value::Lines`].
    pub fn from_json(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::Text(s),
            Json::Object(map) => Value::Record(map),
            Json::Array(items) => {
                if items.iter().all(|item| item.is_object()) {
                    Value::Records(
                        items
                            .into_iter()
                            .filter_map(|item| match item {
                                Json::Object(map) => Some(map),
                                _ => None,
                            })
                            .collect(),
                    )
                } else if items.iter().all(|item| item.is_string()) {
                    Value::Lines(
                        items
                            .into_iter()
                            .filter_map(|item| match item {
                                Json::String(s) => Some(s),
                                _ => None,
                            })
                            .collect(),
                    )
                } else {
                    Value::Json(Json::Array(items))
                }
            }
        }
    }

    /// Short description of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Lines(_) => "lines",
            Value::Record(_) => "record",
            Value::Records(_) => "records",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Path(_) => "path",
            Value::Bundle(_) => "bundle",
            Value::Bundles(_) => "bundle collection",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render a scalar as text. Non-scalars return `None`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Text(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Path(p) => Some(p.display().to_string()),
            Value::Json(json) => json_scalar_text(json),
            _ => None,
        }
    }

    /// Interpret the value as a filesystem path (copy mode).
    pub fn as_path(&self) -> Option<PathBuf> {
        match self {
            Value::Text(s) => Some(PathBuf::from(s)),
            Value::Path(p) => Some(p.clone()),
            _ => None,
        }
    }

    pub fn as_bundle(&self) -> Option<&Bundle> {
        match self {
            Value::Bundle(bundle) => Some(bundle),
            _ => None,
        }
    }
}

fn json_scalar_text(json: &serde_json::Value) -> Option<String> {
    match json {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

/// Non-finite floats become [`Value::Null`].
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self {
        Value::Path(p)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<Record> for Value {
    fn from(map: Record) -> Self {
        Value::Record(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl From<Bundle> for Value {
    fn from(bundle: Bundle) -> Self {
        Value::Bundle(bundle)
    }
}

impl From<Vec<Bundle>> for Value {
    fn from(bundles: Vec<Bundle>) -> Self {
        Value::Bundles(bundles)
    }
}

/// Key-value access used by naming templates and callables.
pub trait Attributes {
    /// Text rendering of attribute `name`, or `None` if there is none.
    fn attribute(&self, name: &str) -> Option<String>;
}

impl Attributes for Value {
    fn attribute(&self, name: &str) -> Option<String> {
        match self {
            Value::Record(map) => map.get(name).map(json_attribute_text),
            Value::Json(serde_json::Value::Object(map)) => map.get(name).map(json_attribute_text),
            Value::Bundle(bundle) => bundle.attribute(name),
            _ => None,
        }
    }
}

fn json_attribute_text(json: &serde_json::Value) -> String {
    json_scalar_text(json).unwrap_or_else(|| json.to_string())
}

/// An instance of a [`BundleSchema`].
#[derive(Clone)]
pub struct Bundle {
    schema: Arc<BundleSchema>,
    values: HashMap<String, Value>,
}

impl Bundle {
    /// Empty instance; every field starts as [`Value::Null`].
    pub fn new(schema: &Arc<BundleSchema>) -> Self {
        Bundle {
            schema: Arc::clone(schema),
            values: HashMap::new(),
        }
    }

    /// Set a field, checking it is declared and that the value fits its shape.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self, SchemaError> {
        let value = value.into();
        let spec = self
            .schema
            .field(field)
            .ok_or_else(|| SchemaError::UnknownField {
                bundle: self.schema.name().to_string(),
                field: field.to_string(),
            })?;
        check_shape(field, spec.shape(), &value)?;
        self.values.insert(field.to_string(), value);
        Ok(self)
    }

    /// Builder-style [`Bundle::set`].
    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Result<Self, SchemaError> {
        self.set(field, value)?;
        Ok(self)
    }

    /// Value of `field`; unset declared fields read as [`Value::Null`].
    pub fn get(&self, field: &str) -> Option<&Value> {
        static NULL: Value = Value::Null;
        match self.values.get(field) {
            Some(value) => Some(value),
            None if self.schema.field(field).is_some() => Some(&NULL),
            None => None,
        }
    }

    pub fn schema(&self) -> &Arc<BundleSchema> {
        &self.schema
    }
}

impl PartialEq for Bundle {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.values == other.values
    }
}

impl Attributes for Bundle {
    fn attribute(&self, name: &str) -> Option<String> {
        self.values.get(name).and_then(Value::as_text)
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for field in self.schema.fields() {
            if let Some(value) = self.values.get(field.name()) {
                map.entry(&field.name(), value);
            }
        }
        map.finish()
    }
}

fn check_shape(field: &str, shape: &FieldShape, value: &Value) -> Result<(), SchemaError> {
    let mismatch = |expected: String| SchemaError::ShapeMismatch {
        field: field.to_string(),
        expected,
        actual: value.type_name().to_string(),
    };
    match (shape, value) {
        (_, Value::Null) => Ok(()),
        (FieldShape::Value | FieldShape::File(_), Value::Bundle(_) | Value::Bundles(_)) => {
            Err(mismatch("a payload".to_string()))
        }
        (FieldShape::Value | FieldShape::File(_), _) => Ok(()),
        (FieldShape::Dir(child), Value::Bundle(bundle)) => {
            if bundle.schema().name() == child.name() {
                Ok(())
            } else {
                Err(SchemaError::ShapeMismatch {
                    field: field.to_string(),
                    expected: format!("bundle `{}`", child.name()),
                    actual: format!("bundle `{}`", bundle.schema().name()),
                })
            }
        }
        (FieldShape::DirList(child), Value::Bundles(bundles)) => {
            match bundles.iter().find(|b| b.schema().name() != child.name()) {
                None => Ok(()),
                Some(other) => Err(SchemaError::ShapeMismatch {
                    field: field.to_string(),
                    expected: format!("bundles `{}`", child.name()),
                    actual: format!("bundle `{}`", other.schema().name()),
                }),
            }
        }
        (FieldShape::Dir(child), _) => Err(mismatch(format!("bundle `{}`", child.name()))),
        (FieldShape::DirList(child), _) => Err(mismatch(format!("bundles `{}`", child.name()))),
    }
}
