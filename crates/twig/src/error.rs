// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for schema declaration and materialization.

use std::path::PathBuf;
use thiserror::Error;

use crate::format::ValueKind;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors caused by a schema or instance that cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("bundle `{bundle}` has no field named `{field}`")]
    UnknownField { bundle: String, field: String },

    #[error("bundle `{bundle}` declares field `{field}` more than once")]
    DuplicateField { bundle: String, field: String },

    #[error("field `{field}` expects {expected}, got {actual}")]
    ShapeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("missing attribute `{attribute}` while naming field `{field}`")]
    MissingAttribute { field: String, attribute: String },

    #[error("malformed template `{template}`: {reason}")]
    MalformedTemplate { template: String, reason: String },

    #[error("field `{field}` resolved to an empty name")]
    EmptyName { field: String },

    #[error("field `{field}` resolved to invalid path segment `{segment}`")]
    InvalidSegment { field: String, segment: String },

    #[error("invalid extension `{0}`")]
    InvalidExtension(String),

    #[error("no format registered for kind `{0}`")]
    UnknownKind(String),
}

/// Materialization errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("name collision at `{}`", path.display())]
    NameCollision { path: PathBuf },

    #[error("field `{field}` cannot be encoded as {kind}: {reason}")]
    UnsupportedKind {
        field: String,
        kind: ValueKind,
        reason: String,
    },

    #[error("destination `{}` already exists and is not empty", .0.display())]
    DestinationNotEmpty(PathBuf),

    #[error("I/O error at `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
