// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema descriptor.
//!
//! A [`BundleSchema`] is a data-only description of a bundle type: its fields
//! in declaration order, each with a [`FieldShape`] and a [`Placement`]. It is
//! built once, before any instance exists, and shared through an [`Arc`].
//!
//! ```
//! use twig::{BundleSchema, NamingRule, Placement, Scope, ValueKind};
//!
//! let report = BundleSchema::builder("Report")
//!     .value("name")
//!     .file_with(
//!         "body",
//!         ValueKind::Text,
//!         Placement::new().name(NamingRule::template("{name}").unwrap()),
//!     )
//!     .file("metadata", ValueKind::Record)
//!     .build()
//!     .unwrap();
//!
//! let set = BundleSchema::builder("ReportSet")
//!     .dir_list_with(
//!         "reports",
//!         &report,
//!         Placement::new().name(NamingRule::field("name").with_scope(Scope::Element)),
//!     )
//!     .file("summary", ValueKind::Record)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(set.fields().len(), 2);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::SchemaError;
use crate::format::{normalize_extension, ValueKind};
use crate::naming::NamingRule;

/// Declared shape of a field.
#[derive(Debug, Clone)]
pub enum FieldShape {
    /// Plain attribute: usable by naming rules, never materialized.
    Value,
    /// File holding a payload of the given kind.
    File(ValueKind),
    /// Directory holding one nested bundle.
    Dir(Arc<BundleSchema>),
    /// Collection of bundles, one directory per element.
    DirList(Arc<BundleSchema>),
}

impl FieldShape {
    /// Container kind, `None` for plain attributes.
    pub fn container(&self) -> Option<Container> {
        match self {
            FieldShape::Value => None,
            FieldShape::File(_) => Some(Container::File),
            FieldShape::Dir(_) | FieldShape::DirList(_) => Some(Container::Dir),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldShape::DirList(_))
    }
}

/// Target container of a materialized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    File,
    Dir,
}

/// Per-field naming, format and copy metadata.
#[derive(Debug, Clone, Default)]
pub struct Placement {
    name: Option<NamingRule>,
    prefix: Option<NamingRule>,
    extension: Option<String>,
    copyfile: bool,
}

impl Placement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Naming rule for the field's own segment.
    pub fn name(mut self, rule: NamingRule) -> Self {
        self.name = Some(rule);
        self
    }

    /// Naming rule for an ancestor directory wrapping the field's name.
    pub fn prefix(mut self, rule: NamingRule) -> Self {
        self.prefix = Some(rule);
        self
    }

    /// Explicit file extension. Normalized when the schema is built.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Treat the field value as the path of a file to copy.
    pub fn copyfile(mut self, enabled: bool) -> Self {
        self.copyfile = enabled;
        self
    }

    pub fn name_rule(&self) -> Option<&NamingRule> {
        self.name.as_ref()
    }

    pub fn prefix_rule(&self) -> Option<&NamingRule> {
        self.prefix.as_ref()
    }

    pub fn explicit_extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn is_copyfile(&self) -> bool {
        self.copyfile
    }
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    shape: FieldShape,
    placement: Placement,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, shape: FieldShape, placement: Placement) -> Self {
        FieldSpec {
            name: name.into(),
            shape,
            placement,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &FieldShape {
        &self.shape
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }
}

/// Description of a bundle type.
#[derive(Debug, Clone)]
pub struct BundleSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl BundleSchema {
    pub fn builder(name: impl Into<String>) -> BundleSchemaBuilder {
        BundleSchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Builder for [`BundleSchema`].
#[derive(Debug)]
pub struct BundleSchemaBuilder {
    name: String,
    fields: Vec<FieldSpec>,
}

impl BundleSchemaBuilder {
    /// Add a plain attribute.
    pub fn value(self, name: &str) -> Self {
        self.field(FieldSpec::new(name, FieldShape::Value, Placement::new()))
    }

    /// Add a file field with default placement.
    pub fn file(self, name: &str, kind: ValueKind) -> Self {
        self.file_with(name, kind, Placement::new())
    }

    pub fn file_with(self, name: &str, kind: ValueKind, placement: Placement) -> Self {
        self.field(FieldSpec::new(name, FieldShape::File(kind), placement))
    }

    /// Add a directory holding one nested bundle.
    pub fn dir(self, name: &str, child: &Arc<BundleSchema>) -> Self {
        self.dir_with(name, child, Placement::new())
    }

    pub fn dir_with(self, name: &str, child: &Arc<BundleSchema>, placement: Placement) -> Self {
        self.field(FieldSpec::new(
            name,
            FieldShape::Dir(Arc::clone(child)),
            placement,
        ))
    }

    /// Add a collection of nested bundles.
    pub fn dir_list(self, name: &str, child: &Arc<BundleSchema>) -> Self {
        self.dir_list_with(name, child, Placement::new())
    }

    pub fn dir_list_with(
        self,
        name: &str,
        child: &Arc<BundleSchema>,
        placement: Placement,
    ) -> Self {
        self.field(FieldSpec::new(
            name,
            FieldShape::DirList(Arc::clone(child)),
            placement,
        ))
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Validate field names and extensions and freeze the schema.
    pub fn build(self) -> Result<Arc<BundleSchema>, SchemaError> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for mut field in self.fields {
            if !seen.insert(field.name.clone()) {
                return Err(SchemaError::DuplicateField {
                    bundle: self.name,
                    field: field.name,
                });
            }
            if let Some(ext) = field.placement.extension.take() {
                field.placement.extension = Some(normalize_extension(&ext)?);
            }
            fields.push(field);
        }
        Ok(Arc::new(BundleSchema {
            name: self.name,
            fields,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::Scope;

    #[test]
    fn test_builder_keeps_declaration_order() {
        let schema = BundleSchema::builder("MyBundle")
            .value("slug")
            .file("my_file", ValueKind::Text)
            .file("slug_file", ValueKind::Text)
            .build()
            .unwrap();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["slug", "my_file", "slug_file"]);
    }

    #[test]
    fn test_container_follows_shape() {
        let child = BundleSchema::builder("Child").build().unwrap();
        let schema = BundleSchema::builder("Parent")
            .value("label")
            .file("text", ValueKind::Text)
            .dir("one", &child)
            .dir_list("many", &child)
            .build()
            .unwrap();
        let container = |name: &str| schema.field(name).unwrap().shape().container();
        assert_eq!(container("label"), None);
        assert_eq!(container("text"), Some(Container::File));
        assert_eq!(container("one"), Some(Container::Dir));
        assert_eq!(container("many"), Some(Container::Dir));
        assert!(schema.field("many").unwrap().shape().is_collection());
        assert!(!schema.field("one").unwrap().shape().is_collection());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = BundleSchema::builder("Dup")
            .value("a")
            .file("a", ValueKind::Text)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateField {
                bundle: "Dup".into(),
                field: "a".into(),
            }
        );
    }

    #[test]
    fn test_extension_normalized() {
        let schema = BundleSchema::builder("Ext")
            .file_with("my_file", ValueKind::Text, Placement::new().extension(".bin"))
            .build()
            .unwrap();
        let placement = schema.field("my_file").unwrap().placement();
        assert_eq!(placement.explicit_extension(), Some("bin"));

        let err = BundleSchema::builder("Ext")
            .file_with("bad", ValueKind::Text, Placement::new().extension(" "))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidExtension(_)));
    }

    #[test]
    fn test_placement_rules() {
        let placement = Placement::new()
            .prefix(NamingRule::template("processed").unwrap())
            .name(NamingRule::field("slug").with_scope(Scope::Element))
            .copyfile(true);
        assert_eq!(placement.name_rule().unwrap().scope(), Scope::Element);
        assert_eq!(placement.prefix_rule().unwrap().scope(), Scope::Owner);
        assert!(placement.is_copyfile());
    }
}
