// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Output configuration.
//!
//! Usually read from the `[output]` table of a schema document:
//!
//! ```toml
//! [output]
//! on_existing = "fail_if_not_empty"
//!
//! [output.extensions]
//! records = "ndjson"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::format::{normalize_extension, FormatRegistry, ValueKind};

/// What to do when the destination directory already has content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingPolicy {
    /// Write into it; files at resolved paths are overwritten.
    #[default]
    Overwrite,
    /// Refuse to write unless the destination is missing or empty.
    FailIfNotEmpty,
}

/// Options for one materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    pub on_existing: ExistingPolicy,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_existing(mut self, policy: ExistingPolicy) -> Self {
        self.on_existing = policy;
        self
    }
}

/// Serializable output settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Policy for a non-empty destination.
    #[serde(default)]
    pub on_existing: ExistingPolicy,

    /// Default extension overrides, keyed by kind name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
}

impl OutputConfig {
    /// Check that every extension override is usable.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for extension in self.extensions.values() {
            normalize_extension(extension)?;
        }
        Ok(())
    }

    /// Apply the extension overrides to `registry`.
    pub fn apply(&self, registry: &mut FormatRegistry) -> Result<(), SchemaError> {
        for (kind, extension) in &self.extensions {
            registry.register_extension(&ValueKind::from_name(kind), extension)?;
        }
        Ok(())
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            on_existing: self.on_existing,
        }
    }
}
