// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Format registry: value kind -> (default extension, encoder).
//!
//! Encoder selection is always by the declared [`ValueKind`] of a field. An
//! explicit extension on a placement only changes the file name, so a record
//! field renamed to `.cfg` is still written as JSON.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::SchemaError;
use crate::value::Value;

/// Declared value kind of a file field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Plain text scalar (`txt`).
    Text,
    /// Sequence of text lines (`txt`).
    Lines,
    /// Single mapping (`json`).
    Record,
    /// Sequence of mappings (`jsonl`).
    Records,
    /// Raw bytes (`bin`).
    Bytes,
    /// Application-defined kind, registered with [`FormatRegistry::register`].
    Custom(String),
}

impl ValueKind {
    /// Parse a kind name as used in schema documents.
    ///
    /// Unknown names become [`ValueKind::Custom`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" | "str" => Self::Text,
            "lines" => Self::Lines,
            "record" | "json" | "mapping" => Self::Record,
            "records" | "jsonl" => Self::Records,
            "bytes" | "binary" => Self::Bytes,
            _ => Self::Custom(name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Lines => "lines",
            Self::Record => "record",
            Self::Records => "records",
            Self::Bytes => "bytes",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure to encode a runtime value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EncodeError(pub String);

impl EncodeError {
    pub fn unexpected(expected: &str, value: &Value) -> Self {
        EncodeError(format!("expected {}, got {}", expected, value.type_name()))
    }
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        EncodeError(err.to_string())
    }
}

/// Encoder function turning a value into file bytes.
pub type Encoder = Arc<dyn Fn(&Value) -> Result<Vec<u8>, EncodeError> + Send + Sync>;

/// A registered format.
#[derive(Clone)]
pub struct Format {
    extension: String,
    encoder: Encoder,
}

impl Format {
    pub fn extension(&self) -> &str {
        &self.extension
    }
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Format")
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

/// Maps value kinds to extensions and encoders.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: HashMap<ValueKind, Format>,
}

impl FormatRegistry {
    /// Registry with the built-in text, JSON and JSON-lines formats.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.insert(ValueKind::Text, "txt", Arc::new(encode_text));
        registry.insert(ValueKind::Lines, "txt", Arc::new(encode_lines));
        registry.insert(ValueKind::Record, "json", Arc::new(encode_record));
        registry.insert(ValueKind::Records, "jsonl", Arc::new(encode_records));
        registry.insert(ValueKind::Bytes, "bin", Arc::new(encode_bytes));
        registry
    }

    /// Registry without any formats.
    pub fn empty() -> Self {
        FormatRegistry {
            formats: HashMap::new(),
        }
    }

    /// Register (or replace) the format for `kind`.
    pub fn register<F>(
        &mut self,
        kind: ValueKind,
        extension: &str,
        encoder: F,
    ) -> Result<(), SchemaError>
    where
        F: Fn(&Value) -> Result<Vec<u8>, EncodeError> + Send + Sync + 'static,
    {
        let extension = normalize_extension(extension)?;
        self.insert(kind, &extension, Arc::new(encoder));
        Ok(())
    }

    /// Change the default extension of an already registered kind.
    pub fn register_extension(
        &mut self,
        kind: &ValueKind,
        extension: &str,
    ) -> Result<(), SchemaError> {
        let extension = normalize_extension(extension)?;
        let format = self
            .formats
            .get_mut(kind)
            .ok_or_else(|| SchemaError::UnknownKind(kind.to_string()))?;
        format.extension = extension;
        Ok(())
    }

    /// Look up the format for `kind`.
    pub fn resolve(&self, kind: &ValueKind) -> Option<&Format> {
        self.formats.get(kind)
    }

    /// Encode `value` with `format`'s encoder.
    pub fn encode(&self, value: &Value, format: &Format) -> Result<Vec<u8>, EncodeError> {
        (format.encoder)(value)
    }

    /// Registered kinds, sorted by name.
    pub fn kinds(&self) -> Vec<&ValueKind> {
        let mut kinds: Vec<&ValueKind> = self.formats.keys().collect();
        kinds.sort_by(|a, b| a.name().cmp(b.name()));
        kinds
    }

    fn insert(&mut self, kind: ValueKind, extension: &str, encoder: Encoder) {
        self.formats.insert(
            kind,
            Format {
                extension: extension.to_string(),
                encoder,
            },
        );
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip a leading dot and reject empty or path-like extensions.
pub fn normalize_extension(extension: &str) -> Result<String, SchemaError> {
    let trimmed = extension.trim();
    let ext = trimmed.strip_prefix('.').unwrap_or(trimmed);
    if ext.is_empty() || ext.contains(|c: char| c == '/' || c == '\\') {
        return Err(SchemaError::InvalidExtension(extension.to_string()));
    }
    Ok(ext.to_string())
}

fn encode_text(value: &Value) -> Result<Vec<u8>, EncodeError> {
    value
        .as_text()
        .map(String::into_bytes)
        .ok_or_else(|| EncodeError::unexpected("a text scalar", value))
}

fn encode_lines(value: &Value) -> Result<Vec<u8>, EncodeError> {
    match value {
        Value::Lines(lines) => {
            let mut out = Vec::new();
            for line in lines {
                out.extend_from_slice(line.as_bytes());
                out.push(b'\n');
            }
            Ok(out)
        }
        other => Err(EncodeError::unexpected("a sequence of lines", other)),
    }
}

fn encode_record(value: &Value) -> Result<Vec<u8>, EncodeError> {
    match value {
        Value::Record(map) => Ok(serde_json::to_vec_pretty(map)?),
        Value::Json(json @ serde_json::Value::Object(_)) => Ok(serde_json::to_vec_pretty(json)?),
        other => Err(EncodeError::unexpected("a record", other)),
    }
}

fn encode_records(value: &Value) -> Result<Vec<u8>, EncodeError> {
    match value {
        Value::Records(rows) => {
            let mut out = Vec::new();
            for row in rows {
                serde_json::to_writer(&mut out, row)?;
                out.push(b'\n');
            }
            Ok(out)
        }
        other => Err(EncodeError::unexpected("a sequence of records", other)),
    }
}

fn encode_bytes(value: &Value) -> Result<Vec<u8>, EncodeError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.clone()),
        Value::Text(text) => Ok(text.as_bytes().to_vec()),
        other => Err(EncodeError::unexpected("bytes", other)),
    }
}
