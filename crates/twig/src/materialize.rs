// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Materializer: turns a bundle instance into a directory tree.
//!
//! Each directory level is handled in two steps. First every field is
//! resolved to a relative path and an action (create directory, write bytes,
//! copy a file); encoding happens here too. Then the level's paths are checked
//! for collisions and only after that are the actions executed, recursing into
//! child bundles depth first.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{ExistingPolicy, WriteOptions};
use crate::error::{Error, Result, SchemaError};
use crate::format::{FormatRegistry, ValueKind};
use crate::naming::{self, Scope, Subject};
use crate::schema::{FieldShape, FieldSpec};
use crate::sink::{FsSink, Sink};
use crate::value::{Bundle, Value};

/// Non-fatal condition recorded during a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    /// A copy-mode source did not exist; the value was written as text instead.
    CopySourceMissing { field: String, source: PathBuf },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::CopySourceMissing { field, source } => write!(
                f,
                "copy source `{}` for field `{}` does not exist, wrote it as text",
                source.display(),
                field
            ),
        }
    }
}

/// Kind of a produced entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    Dir,
    File { bytes: u64 },
    Copy { source: PathBuf, bytes: u64 },
}

/// A produced directory or file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub path: PathBuf,
    #[serde(flatten)]
    pub kind: EntryKind,
}

/// Everything one write produced, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub entries: Vec<Entry>,
    pub warnings: Vec<Warning>,
}

impl Manifest {
    /// Paths of written or copied files.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(|e| !matches!(e.kind, EntryKind::Dir))
            .map(|e| e.path.as_path())
    }

    pub fn directories(&self) -> impl Iterator<Item = &Path> {
        self.entries
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::Dir))
            .map(|e| e.path.as_path())
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| match e.kind {
                EntryKind::Dir => 0,
                EntryKind::File { bytes } | EntryKind::Copy { bytes, .. } => bytes,
            })
            .sum()
    }
}

enum Action<'a> {
    /// Prefix directory of a collection; may be shared between fields.
    Prefix { path: PathBuf },
    /// Directory of a nested bundle.
    Child { path: PathBuf, bundle: &'a Bundle },
    Write { path: PathBuf, bytes: Vec<u8> },
    Copy { path: PathBuf, source: PathBuf },
}

impl Action<'_> {
    fn path(&self) -> &Path {
        match self {
            Action::Prefix { path }
            | Action::Child { path, .. }
            | Action::Write { path, .. }
            | Action::Copy { path, .. } => path,
        }
    }

    fn is_file(&self) -> bool {
        matches!(self, Action::Write { .. } | Action::Copy { .. })
    }
}

/// Writes bundle instances to directory trees.
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    registry: FormatRegistry,
    options: WriteOptions,
}

impl Materializer {
    /// Materializer with the built-in formats and default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: FormatRegistry) -> Self {
        Materializer {
            registry,
            options: WriteOptions::default(),
        }
    }

    pub fn options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FormatRegistry {
        &mut self.registry
    }

    /// Write `bundle` under `destination` on the real filesystem.
    pub fn write(&self, bundle: &Bundle, destination: impl AsRef<Path>) -> Result<()> {
        self.materialize(bundle, destination).map(|_| ())
    }

    /// Like [`Materializer::write`], returning what was produced.
    pub fn materialize(&self, bundle: &Bundle, destination: impl AsRef<Path>) -> Result<Manifest> {
        self.materialize_into(&mut FsSink, bundle, destination.as_ref())
    }

    /// Write `bundle` under `destination` through `sink`.
    pub fn materialize_into(
        &self,
        sink: &mut dyn Sink,
        bundle: &Bundle,
        destination: &Path,
    ) -> Result<Manifest> {
        if self.options.on_existing == ExistingPolicy::FailIfNotEmpty {
            let empty = sink
                .is_empty_dir(destination)
                .map_err(|e| Error::io(destination, e))?;
            if !empty {
                return Err(Error::DestinationNotEmpty(destination.to_path_buf()));
            }
        }
        sink.create_dir_all(destination)
            .map_err(|e| Error::io(destination, e))?;

        let mut manifest = Manifest::default();
        self.write_level(sink, bundle, destination, &mut manifest)?;
        tracing::info!(
            "Materialized `{}` into {}: {} entries, {} bytes, {} warnings",
            bundle.schema().name(),
            destination.display(),
            manifest.entries.len(),
            manifest.total_bytes(),
            manifest.warnings.len()
        );
        Ok(manifest)
    }

    fn write_level(
        &self,
        sink: &mut dyn Sink,
        bundle: &Bundle,
        dir: &Path,
        manifest: &mut Manifest,
    ) -> Result<()> {
        let mut actions = Vec::new();
        for field in bundle.schema().fields() {
            let Some(value) = bundle.get(field.name()).filter(|v| !v.is_null()) else {
                continue;
            };
            self.plan_field(sink, bundle, field, value, &mut actions, manifest)?;
        }
        check_collisions(dir, &actions)?;

        for action in actions {
            let target = dir.join(action.path());
            match action {
                Action::Prefix { .. } => {
                    sink.create_dir_all(&target)
                        .map_err(|e| Error::io(&target, e))?;
                    tracing::debug!("Created {}", target.display());
                    push_dir(manifest, target);
                }
                Action::Child { bundle: child, .. } => {
                    sink.create_dir_all(&target)
                        .map_err(|e| Error::io(&target, e))?;
                    tracing::debug!("Created {}", target.display());
                    push_dir(manifest, target.clone());
                    self.write_level(sink, child, &target, manifest)?;
                }
                Action::Write { bytes, .. } => {
                    ensure_parent(sink, &target)?;
                    sink.write_file(&target, &bytes)
                        .map_err(|e| Error::io(&target, e))?;
                    tracing::debug!("Wrote {} ({} bytes)", target.display(), bytes.len());
                    manifest.entries.push(Entry {
                        path: target,
                        kind: EntryKind::File {
                            bytes: bytes.len() as u64,
                        },
                    });
                }
                Action::Copy { source, .. } => {
                    ensure_parent(sink, &target)?;
                    let bytes = sink
                        .copy_file(&source, &target)
                        .map_err(|e| Error::io(&source, e))?;
                    tracing::debug!("Copied {} -> {}", source.display(), target.display());
                    manifest.entries.push(Entry {
                        path: target,
                        kind: EntryKind::Copy { source, bytes },
                    });
                }
            }
        }
        Ok(())
    }

    fn plan_field<'a>(
        &self,
        sink: &dyn Sink,
        owner: &'a Bundle,
        field: &FieldSpec,
        value: &'a Value,
        actions: &mut Vec<Action<'a>>,
        manifest: &mut Manifest,
    ) -> Result<()> {
        match field.shape() {
            FieldShape::Value => Ok(()),
            FieldShape::File(kind) => {
                let path = naming::resolve(field, owner, Subject::of(value), None)?;
                if field.placement().is_copyfile() {
                    actions.push(self.plan_copy(sink, field, kind, value, path, manifest)?);
                } else {
                    let (extension, bytes) = self.encode(field, kind, value)?;
                    actions.push(Action::Write {
                        path: with_extension(path, Some(&extension)),
                        bytes,
                    });
                }
                Ok(())
            }
            FieldShape::Dir(_) => {
                let child = value.as_bundle().ok_or_else(|| shape_error(field, value))?;
                let path = naming::resolve(field, owner, Subject::Bundle(child), None)?;
                actions.push(Action::Child {
                    path,
                    bundle: child,
                });
                Ok(())
            }
            FieldShape::DirList(_) => {
                let Value::Bundles(children) = value else {
                    return Err(shape_error(field, value));
                };
                if children.is_empty() {
                    if let Some(path) = empty_collection_prefix(field, owner, value)? {
                        actions.push(Action::Prefix { path });
                    }
                }
                for (index, child) in children.iter().enumerate() {
                    let subject = Subject::Bundle(child);
                    let path = naming::resolve(field, owner, subject, Some(index))?;
                    if let Some(prefix) = naming::resolve_prefix(field, owner, subject, Some(index))? {
                        actions.push(Action::Prefix { path: prefix });
                    }
                    actions.push(Action::Child {
                        path,
                        bundle: child,
                    });
                }
                Ok(())
            }
        }
    }

    fn plan_copy<'a>(
        &self,
        sink: &dyn Sink,
        field: &FieldSpec,
        kind: &ValueKind,
        value: &Value,
        path: PathBuf,
        manifest: &mut Manifest,
    ) -> Result<Action<'a>> {
        let source = value.as_path().ok_or_else(|| Error::UnsupportedKind {
            field: field.name().to_string(),
            kind: kind.clone(),
            reason: format!("copy mode expects a path, got {}", value.type_name()),
        })?;

        if sink.is_dir(&source) {
            return Err(Error::UnsupportedKind {
                field: field.name().to_string(),
                kind: kind.clone(),
                reason: format!("copy source `{}` is a directory", source.display()),
            });
        }
        if sink.is_file(&source) {
            let extension = match field.placement().explicit_extension() {
                Some(ext) => Some(ext.to_string()),
                None => source
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned()),
            };
            return Ok(Action::Copy {
                path: with_extension(path, extension.as_deref()),
                source,
            });
        }

        let warning = Warning::CopySourceMissing {
            field: field.name().to_string(),
            source,
        };
        tracing::warn!("{}", warning);
        manifest.warnings.push(warning);

        let text = value.as_text().unwrap_or_default();
        let extension = field
            .placement()
            .explicit_extension()
            .map(str::to_string)
            .or_else(|| {
                self.registry
                    .resolve(kind)
                    .map(|format| format.extension().to_string())
            })
            .unwrap_or_else(|| "txt".to_string());
        Ok(Action::Write {
            path: with_extension(path, Some(&extension)),
            bytes: text.into_bytes(),
        })
    }

    /// Extension and bytes for a file field. Encoder choice is by `kind` only.
    fn encode(&self, field: &FieldSpec, kind: &ValueKind, value: &Value) -> Result<(String, Vec<u8>)> {
        let format = self
            .registry
            .resolve(kind)
            .ok_or_else(|| Error::UnsupportedKind {
                field: field.name().to_string(),
                kind: kind.clone(),
                reason: "no format registered".to_string(),
            })?;
        let bytes = self
            .registry
            .encode(value, format)
            .map_err(|e| Error::UnsupportedKind {
                field: field.name().to_string(),
                kind: kind.clone(),
                reason: e.0,
            })?;
        let extension = field
            .placement()
            .explicit_extension()
            .unwrap_or(format.extension())
            .to_string();
        Ok((extension, bytes))
    }
}

/// Prefix directory of a collection without elements. Only owner-scoped
/// prefixes apply; one that needs the element index has nothing to name.
fn empty_collection_prefix(
    field: &FieldSpec,
    owner: &Bundle,
    value: &Value,
) -> Result<Option<PathBuf>> {
    match field.placement().prefix_rule() {
        Some(rule) if rule.scope() == Scope::Owner => {}
        _ => return Ok(None),
    }
    match naming::resolve_prefix(field, owner, Subject::of(value), None) {
        Ok(path) => Ok(path),
        Err(SchemaError::MissingAttribute { attribute, .. }) if attribute == "index" => {
            tracing::debug!(
                "Skipping prefix of empty collection `{}`: it depends on the element index",
                field.name()
            );
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn shape_error(field: &FieldSpec, value: &Value) -> Error {
    SchemaError::ShapeMismatch {
        field: field.name().to_string(),
        expected: match field.shape() {
            FieldShape::DirList(_) => "a bundle collection".to_string(),
            _ => "a bundle".to_string(),
        },
        actual: value.type_name().to_string(),
    }
    .into()
}

/// Append `.ext` to the last component, keeping any dots already in the name.
fn with_extension(path: PathBuf, extension: Option<&str>) -> PathBuf {
    match extension {
        Some(ext) if !ext.is_empty() => {
            let mut raw: OsString = path.into_os_string();
            raw.push(".");
            raw.push(ext);
            PathBuf::from(raw)
        }
        _ => path,
    }
}

fn ensure_parent(sink: &mut dyn Sink, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        sink.create_dir_all(parent)
            .map_err(|e| Error::io(parent, e))?;
    }
    Ok(())
}

fn push_dir(manifest: &mut Manifest, path: PathBuf) {
    if !manifest.directories().any(|p| p == path.as_path()) {
        manifest.entries.push(Entry {
            path,
            kind: EntryKind::Dir,
        });
    }
}

/// Leaf paths within one level must be distinct, no file may sit where
/// another entry needs a directory, and nothing else at the level may reach
/// into a nested bundle's directory. Shared prefix directories are allowed.
fn check_collisions(dir: &Path, actions: &[Action<'_>]) -> Result<()> {
    let mut leaves: HashSet<&Path> = HashSet::new();
    for action in actions {
        if matches!(action, Action::Prefix { .. }) {
            continue;
        }
        if !leaves.insert(action.path()) {
            return Err(Error::NameCollision {
                path: dir.join(action.path()),
            });
        }
    }
    for action in actions {
        if let Action::Prefix { path } = action {
            if leaves.contains(path.as_path()) {
                return Err(Error::NameCollision {
                    path: dir.join(path),
                });
            }
        }
    }
    for child in actions.iter().filter_map(|a| match a {
        Action::Child { path, .. } => Some(path.as_path()),
        _ => None,
    }) {
        let nested = actions
            .iter()
            .map(Action::path)
            .find(|other| *other != child && other.starts_with(child));
        if let Some(nested) = nested {
            return Err(Error::NameCollision {
                path: dir.join(nested),
            });
        }
    }
    for file in actions.iter().filter(|a| a.is_file()).map(Action::path) {
        let blocked = actions
            .iter()
            .map(Action::path)
            .any(|other| other != file && other.starts_with(file));
        if blocked {
            return Err(Error::NameCollision {
                path: dir.join(file),
            });
        }
    }
    Ok(())
}
