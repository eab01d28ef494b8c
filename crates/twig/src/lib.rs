// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Twig: declarative directory-tree materialization
//!
//! Describe a bundle type once, with per-field naming, container and format
//! metadata, then write any instance of it to disk as a directory tree.
//!
//! # Features
//!
//! - **Schemas**: fields are plain values, files, nested bundles or
//!   collections of bundles
//! - **Naming**: templates, attribute references or callables, resolved
//!   against the owning bundle or the field's own value
//! - **Formats**: text, JSON and JSON-lines built in, custom kinds
//!   registered at runtime
//! - **Copy mode**: file fields whose value is a path to copy
//! - **Documents**: TOML schema documents with JSON instance data
//!
//! # Quick Start
//!
//! ```no_run
//! use twig::{Bundle, BundleSchema, Materializer, NamingRule, Placement, Scope, ValueKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let report = BundleSchema::builder("Report")
//!     .value("name")
//!     .file_with(
//!         "body",
//!         ValueKind::Text,
//!         Placement::new().name(NamingRule::template("{name}")?),
//!     )
//!     .file("metadata", ValueKind::Record)
//!     .build()?;
//!
//! let bundle = Bundle::new(&report)
//!     .with("name", "alpha")?
//!     .with("body", "Hello")?
//!     .with("metadata", serde_json::json!({"score": 10}))?;
//!
//! // The root bundle writes straight into the destination:
//! // out/alpha.txt, out/metadata.json
//! Materializer::new().write(&bundle, "out")?;
//!
//! // Wrapped in a directory named after the report:
//! // out/alpha/alpha.txt, out/alpha/metadata.json
//! let wrapper = BundleSchema::builder("Wrapper")
//!     .dir_with(
//!         "report",
//!         &report,
//!         Placement::new().name(NamingRule::template("{name}")?.with_scope(Scope::Element)),
//!     )
//!     .build()?;
//! let wrapped = Bundle::new(&wrapper).with("report", bundle)?;
//! Materializer::new().write(&wrapped, "out")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema Document
//!
//! ```toml
//! root = "Report"
//!
//! [[bundles]]
//! name = "Report"
//! fields = [
//!   { name = "name", shape = "value" },
//!   { name = "body", shape = "file", kind = "text", naming = "{name}" },
//!   { name = "metadata", shape = "file", kind = "record" },
//! ]
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod format;
pub mod materialize;
pub mod naming;
pub mod schema;
pub mod sink;
pub mod value;

pub use config::{ExistingPolicy, OutputConfig, WriteOptions};
pub use document::{DocumentError, LoadedSchema, SchemaDocument};
pub use error::{Error, Result, SchemaError};
pub use format::{EncodeError, Format, FormatRegistry, ValueKind};
pub use materialize::{Entry, EntryKind, Manifest, Materializer, Warning};
pub use naming::{NameSource, NamingRule, Scope, Subject, Template};
pub use schema::{BundleSchema, Container, FieldShape, FieldSpec, Placement};
pub use sink::{FsSink, MemorySink, Sink};
pub use value::{Attributes, Bundle, Record, Value};
