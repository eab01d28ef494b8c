// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema documents.
//!
//! A TOML document declares bundles by name; fields reference other bundles
//! by name, in any order. [`SchemaDocument::build`] resolves the references
//! into [`BundleSchema`]s and [`LoadedSchema::instance`] turns JSON instance
//! data into a [`Bundle`] of the root type.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OutputConfig;
use crate::error::SchemaError;
use crate::format::{FormatRegistry, ValueKind};
use crate::materialize::Materializer;
use crate::naming::{NamingRule, Scope};
use crate::schema::{BundleSchema, FieldShape, FieldSpec, Placement};
use crate::value::{Bundle, Value};

/// Document loading errors.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Invalid document: {0}")]
    Invalid(String),
}

/// Field shape as written in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeDecl {
    Value,
    File,
    Dir,
    DirList,
}

/// Naming rule as written in a document.
///
/// A bare string is a template in `self` scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleDecl {
    Bare(String),
    Template {
        template: String,
        #[serde(default)]
        scope: Scope,
    },
    Field {
        field: String,
        #[serde(default)]
        scope: Scope,
    },
}

impl RuleDecl {
    pub fn to_rule(&self) -> Result<NamingRule, SchemaError> {
        match self {
            RuleDecl::Bare(template) => NamingRule::template(template),
            RuleDecl::Template { template, scope } => {
                Ok(NamingRule::template(template)?.with_scope(*scope))
            }
            RuleDecl::Field { field, scope } => {
                Ok(NamingRule::field(field.as_str()).with_scope(*scope))
            }
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub shape: ShapeDecl,

    /// Payload kind, file fields only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Nested bundle name, `dir` and `dir_list` fields only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naming: Option<RuleDecl>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<RuleDecl>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub copyfile: bool,
}

impl FieldDecl {
    fn placement(&self) -> Result<Placement, SchemaError> {
        let mut placement = Placement::new().copyfile(self.copyfile);
        if let Some(rule) = &self.naming {
            placement = placement.name(rule.to_rule()?);
        }
        if let Some(rule) = &self.prefix {
            placement = placement.prefix(rule.to_rule()?);
        }
        if let Some(extension) = &self.extension {
            placement = placement.extension(extension.as_str());
        }
        Ok(placement)
    }
}

/// Bundle declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDecl {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

/// Parsed schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Name of the bundle instance data describes.
    pub root: String,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub bundles: Vec<BundleDecl>,
}

impl SchemaDocument {
    /// Load and validate a document from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, DocumentError> {
        let document: Self = toml::from_str(content)?;
        document.validate()?;
        Ok(document)
    }

    /// Check declarations that do not need reference resolution.
    pub fn validate(&self) -> Result<(), DocumentError> {
        if self.root.is_empty() {
            return Err(DocumentError::Invalid("No root bundle configured".into()));
        }
        self.output.validate()?;

        let mut names = HashSet::new();
        for bundle in &self.bundles {
            if !names.insert(bundle.name.as_str()) {
                return Err(DocumentError::Invalid(format!(
                    "Bundle `{}` is declared more than once",
                    bundle.name
                )));
            }
            for field in &bundle.fields {
                validate_field(&bundle.name, field)?;
            }
        }
        if !names.contains(self.root.as_str()) {
            return Err(DocumentError::Invalid(format!(
                "Root bundle `{}` is not declared",
                self.root
            )));
        }
        Ok(())
    }

    /// Resolve every bundle against the built-in formats.
    pub fn build(&self) -> Result<LoadedSchema, DocumentError> {
        self.build_with(&FormatRegistry::new())
    }

    /// Resolve every bundle; file kinds must be registered in `registry`.
    pub fn build_with(&self, registry: &FormatRegistry) -> Result<LoadedSchema, DocumentError> {
        self.validate()?;
        let decls: HashMap<&str, &BundleDecl> =
            self.bundles.iter().map(|b| (b.name.as_str(), b)).collect();
        let mut resolver = Resolver {
            decls,
            registry,
            built: BTreeMap::new(),
            stack: Vec::new(),
        };
        for bundle in &self.bundles {
            resolver.resolve(&bundle.name)?;
        }
        let root = resolver
            .built
            .get(&self.root)
            .cloned()
            .ok_or_else(|| DocumentError::Invalid(format!("Root bundle `{}` is not declared", self.root)))?;
        Ok(LoadedSchema {
            root,
            bundles: resolver.built,
            output: self.output.clone(),
        })
    }

    /// Example document, used by `twigctl gen-schema`.
    pub fn example() -> Self {
        let field = |name: &str, shape: ShapeDecl| FieldDecl {
            name: name.to_string(),
            shape,
            kind: None,
            bundle: None,
            naming: None,
            prefix: None,
            extension: None,
            copyfile: false,
        };
        SchemaDocument {
            root: "ReportSet".into(),
            output: OutputConfig::default(),
            bundles: vec![
                BundleDecl {
                    name: "Report".into(),
                    fields: vec![
                        field("name", ShapeDecl::Value),
                        FieldDecl {
                            kind: Some("text".into()),
                            naming: Some(RuleDecl::Template {
                                template: "{name}".into(),
                                scope: Scope::Owner,
                            }),
                            ..field("body", ShapeDecl::File)
                        },
                        FieldDecl {
                            kind: Some("record".into()),
                            ..field("metadata", ShapeDecl::File)
                        },
                    ],
                },
                BundleDecl {
                    name: "ReportSet".into(),
                    fields: vec![
                        FieldDecl {
                            bundle: Some("Report".into()),
                            naming: Some(RuleDecl::Template {
                                template: "{name}".into(),
                                scope: Scope::Element,
                            }),
                            ..field("reports", ShapeDecl::DirList)
                        },
                        FieldDecl {
                            kind: Some("record".into()),
                            ..field("summary", ShapeDecl::File)
                        },
                    ],
                },
            ],
        }
    }
}

fn validate_field(bundle: &str, field: &FieldDecl) -> Result<(), DocumentError> {
    let invalid = |reason: &str| {
        DocumentError::Invalid(format!(
            "Field `{}` of bundle `{}` {}",
            field.name, bundle, reason
        ))
    };
    if field.name.is_empty() {
        return Err(DocumentError::Invalid(format!(
            "Bundle `{}` has a field with an empty name",
            bundle
        )));
    }
    match field.shape {
        ShapeDecl::File => {
            if field.kind.is_none() {
                return Err(invalid("needs a `kind`"));
            }
            if field.bundle.is_some() {
                return Err(invalid("is a file and cannot name a `bundle`"));
            }
        }
        ShapeDecl::Dir | ShapeDecl::DirList => {
            if field.bundle.is_none() {
                return Err(invalid("needs a `bundle`"));
            }
            if field.kind.is_some() || field.extension.is_some() || field.copyfile {
                return Err(invalid("is a directory and takes no `kind`, `extension` or `copyfile`"));
            }
        }
        ShapeDecl::Value => {
            if field.kind.is_some() || field.bundle.is_some() || field.copyfile {
                return Err(invalid("is a plain value and is never materialized"));
            }
        }
    }
    Ok(())
}

struct Resolver<'a> {
    decls: HashMap<&'a str, &'a BundleDecl>,
    registry: &'a FormatRegistry,
    built: BTreeMap<String, Arc<BundleSchema>>,
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn resolve(&mut self, name: &str) -> Result<Arc<BundleSchema>, DocumentError> {
        if let Some(schema) = self.built.get(name) {
            return Ok(Arc::clone(schema));
        }
        if self.stack.iter().any(|n| n == name) {
            let mut chain = self.stack.clone();
            chain.push(name.to_string());
            return Err(DocumentError::Invalid(format!(
                "Bundle reference cycle: {}",
                chain.join(" -> ")
            )));
        }
        let decl = *self.decls.get(name).ok_or_else(|| {
            DocumentError::Invalid(format!(
                "Unknown bundle `{}` referenced by `{}`",
                name,
                self.stack.last().map(String::as_str).unwrap_or("root")
            ))
        })?;

        self.stack.push(name.to_string());
        let mut builder = BundleSchema::builder(name);
        for field in &decl.fields {
            let shape = match field.shape {
                ShapeDecl::Value => FieldShape::Value,
                ShapeDecl::File => {
                    let kind = ValueKind::from_name(field.kind.as_deref().unwrap_or_default());
                    if self.registry.resolve(&kind).is_none() {
                        return Err(DocumentError::Invalid(format!(
                            "Field `{}` of bundle `{}` uses unknown kind `{}`",
                            field.name, name, kind
                        )));
                    }
                    FieldShape::File(kind)
                }
                ShapeDecl::Dir => FieldShape::Dir(self.resolve(field.bundle.as_deref().unwrap_or_default())?),
                ShapeDecl::DirList => {
                    FieldShape::DirList(self.resolve(field.bundle.as_deref().unwrap_or_default())?)
                }
            };
            builder = builder.field(FieldSpec::new(field.name.as_str(), shape, field.placement()?));
        }
        self.stack.pop();

        let schema = builder.build()?;
        self.built.insert(name.to_string(), Arc::clone(&schema));
        Ok(schema)
    }
}

/// Documents with every bundle reference resolved.
#[derive(Debug, Clone)]
pub struct LoadedSchema {
    root: Arc<BundleSchema>,
    bundles: BTreeMap<String, Arc<BundleSchema>>,
    output: OutputConfig,
}

impl LoadedSchema {
    pub fn root(&self) -> &Arc<BundleSchema> {
        &self.root
    }

    pub fn bundle(&self, name: &str) -> Option<&Arc<BundleSchema>> {
        self.bundles.get(name)
    }

    pub fn bundles(&self) -> impl Iterator<Item = &Arc<BundleSchema>> {
        self.bundles.values()
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Materializer configured from the document's `[output]` table.
    pub fn materializer(&self) -> Result<Materializer, DocumentError> {
        self.materializer_with(FormatRegistry::new())
    }

    pub fn materializer_with(&self, mut registry: FormatRegistry) -> Result<Materializer, DocumentError> {
        self.output.apply(&mut registry)?;
        Ok(Materializer::with_registry(registry).options(self.output.write_options()))
    }

    /// Build a root bundle instance from JSON data.
    pub fn instance(&self, data: serde_json::Value) -> Result<Bundle, DocumentError> {
        instance_of(&self.root, data)
    }

    /// Read JSON instance data from a file.
    pub fn load_instance<P: AsRef<Path>>(&self, path: P) -> Result<Bundle, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        self.instance(serde_json::from_str(&content)?)
    }
}

fn json_type(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a bool",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn instance_of(schema: &Arc<BundleSchema>, data: serde_json::Value) -> Result<Bundle, DocumentError> {
    let serde_json::Value::Object(map) = data else {
        return Err(DocumentError::Invalid(format!(
            "Bundle `{}` expects an object, got {}",
            schema.name(),
            json_type(&data)
        )));
    };
    let mut bundle = Bundle::new(schema);
    for (key, json) in map {
        let field = schema.field(&key).ok_or_else(|| SchemaError::UnknownField {
            bundle: schema.name().to_string(),
            field: key.clone(),
        })?;
        let value = field_value(schema, field, json)?;
        bundle.set(&key, value)?;
    }
    Ok(bundle)
}

fn field_value(
    schema: &BundleSchema,
    field: &FieldSpec,
    json: serde_json::Value,
) -> Result<Value, DocumentError> {
    use serde_json::Value as Json;

    let mismatch = |expected: &str, json: &Json| {
        DocumentError::Invalid(format!(
            "Field `{}` of bundle `{}` expects {}, got {}",
            field.name(),
            schema.name(),
            expected,
            json_type(json)
        ))
    };
    if json.is_null() {
        return Ok(Value::Null);
    }
    match field.shape() {
        FieldShape::Value => Ok(Value::from_json(json)),
        FieldShape::File(_) if field.placement().is_copyfile() => match json {
            Json::String(path) => Ok(Value::Path(path.into())),
            other => Err(mismatch("a path string", &other)),
        },
        FieldShape::File(kind) => match (kind, json) {
            (ValueKind::Bytes, Json::String(s)) => Ok(Value::Bytes(s.into_bytes())),
            (ValueKind::Bytes, other) => Err(mismatch("a string", &other)),
            (ValueKind::Lines, Json::Array(items)) if items.is_empty() => Ok(Value::Lines(Vec::new())),
            (ValueKind::Custom(_), other) => Ok(Value::Json(other)),
            (_, other) => Ok(Value::from_json(other)),
        },
        FieldShape::Dir(child) => Ok(Value::Bundle(instance_of(child, json)?)),
        FieldShape::DirList(child) => match json {
            Json::Array(items) => Ok(Value::Bundles(
                items
                    .into_iter()
                    .map(|item| instance_of(child, item))
                    .collect::<Result<_, _>>()?,
            )),
            other => Err(mismatch("an array", &other)),
        },
    }
}
