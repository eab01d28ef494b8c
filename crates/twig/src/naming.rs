// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name resolution.
//!
//! A [`NamingRule`] is an explicit `(source, scope)` pair:
//!
//! - [`NameSource::Template`]: `{identifier}` substitution, `{{`/`}}` escape a
//!   brace. A template without tokens is a literal name.
//! - [`NameSource::Field`]: a single attribute, same as the template `{name}`.
//! - [`NameSource::Callable`]: user function receiving the scope object and
//!   the element index (`Some` only for collection elements).
//!
//! [`Scope::Owner`] ("self") resolves against the bundle owning the field,
//! [`Scope::Element`] ("field") against the field's own value. The resolver
//! never guesses the scope.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::schema::FieldSpec;
use crate::value::{Attributes, Bundle, Value};

/// User naming function.
pub type NameFn = Arc<dyn Fn(Subject<'_>, Option<usize>) -> String + Send + Sync>;

/// Object a naming rule is resolved against.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Bundle(&'a Bundle),
    Value(&'a Value),
}

impl<'a> Subject<'a> {
    /// Wrap a field value; nested bundles are unwrapped.
    pub fn of(value: &'a Value) -> Self {
        match value {
            Value::Bundle(bundle) => Subject::Bundle(bundle),
            other => Subject::Value(other),
        }
    }

    pub fn bundle(&self) -> Option<&'a Bundle> {
        match *self {
            Subject::Bundle(bundle) => Some(bundle),
            Subject::Value(value) => value.as_bundle(),
        }
    }

    pub fn value(&self) -> Option<&'a Value> {
        match *self {
            Subject::Bundle(_) => None,
            Subject::Value(value) => Some(value),
        }
    }
}

impl Attributes for Subject<'_> {
    fn attribute(&self, name: &str) -> Option<String> {
        match self {
            Subject::Bundle(bundle) => bundle.attribute(name),
            Subject::Value(value) => value.attribute(name),
        }
    }
}

/// Which object a rule reads its attributes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scope {
    /// The bundle owning the field.
    #[default]
    #[serde(rename = "self")]
    Owner,
    /// The field's value: the collection element, nested bundle or payload.
    #[serde(rename = "field")]
    Element,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Token(String),
}

/// Parsed `{identifier}` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    parts: Vec<Part>,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let malformed = |reason: &str| SchemaError::MalformedTemplate {
            template: raw.to_string(),
            reason: reason.to_string(),
        };
        if raw.is_empty() {
            return Err(malformed("template is empty"));
        }

        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut token = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(malformed("unterminated `{`")),
                            Some(c) => token.push(c),
                        }
                    }
                    let token = token.trim();
                    if !is_identifier(token) {
                        return Err(malformed("token is not an identifier"));
                    }
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(Part::Token(token.to_string()));
                }
                '}' => return Err(malformed("unmatched `}`")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }
        Ok(Template {
            raw: raw.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the template has no tokens.
    pub fn is_literal(&self) -> bool {
        self.parts.iter().all(|p| matches!(p, Part::Literal(_)))
    }

    /// Identifiers referenced by the template, in order.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Token(t) => Some(t.as_str()),
            Part::Literal(_) => None,
        })
    }

    fn render(
        &self,
        scope: &dyn Attributes,
        index: Option<usize>,
        field: &str,
    ) -> Result<String, SchemaError> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(s) => out.push_str(s),
                Part::Token(token) => out.push_str(&lookup(scope, token, index, field)?),
            }
        }
        Ok(out)
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// `{index}` falls back to the element index when the scope object has no
/// attribute of that name.
fn lookup(
    scope: &dyn Attributes,
    attribute: &str,
    index: Option<usize>,
    field: &str,
) -> Result<String, SchemaError> {
    if let Some(value) = scope.attribute(attribute) {
        return Ok(value);
    }
    match index {
        Some(index) if attribute == "index" => Ok(index.to_string()),
        _ => Err(SchemaError::MissingAttribute {
            field: field.to_string(),
            attribute: attribute.to_string(),
        }),
    }
}

/// Source of a name.
#[derive(Clone)]
pub enum NameSource {
    Template(Template),
    Field(String),
    Callable(NameFn),
}

impl fmt::Debug for NameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameSource::Template(t) => f.debug_tuple("Template").field(&t.as_str()).finish(),
            NameSource::Field(name) => f.debug_tuple("Field").field(name).finish(),
            NameSource::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// A naming source paired with its scope.
#[derive(Debug, Clone)]
pub struct NamingRule {
    source: NameSource,
    scope: Scope,
}

impl NamingRule {
    /// Template rule in owner scope.
    pub fn template(template: &str) -> Result<Self, SchemaError> {
        Ok(NamingRule {
            source: NameSource::Template(Template::parse(template)?),
            scope: Scope::Owner,
        })
    }

    /// Attribute reference in owner scope.
    pub fn field(attribute: impl Into<String>) -> Self {
        NamingRule {
            source: NameSource::Field(attribute.into()),
            scope: Scope::Owner,
        }
    }

    /// Callable rule in owner scope.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(Subject<'_>, Option<usize>) -> String + Send + Sync + 'static,
    {
        NamingRule {
            source: NameSource::Callable(Arc::new(f)),
            scope: Scope::Owner,
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn source(&self) -> &NameSource {
        &self.source
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Resolve the rule to a string.
    pub fn resolve(
        &self,
        field: &str,
        owner: &Bundle,
        subject: Subject<'_>,
        index: Option<usize>,
    ) -> Result<String, SchemaError> {
        let scope = match self.scope {
            Scope::Owner => Subject::Bundle(owner),
            Scope::Element => subject,
        };
        match &self.source {
            NameSource::Template(template) => template.render(&scope, index, field),
            NameSource::Field(attribute) => lookup(&scope, attribute, index, field),
            NameSource::Callable(f) => Ok(f(scope, index)),
        }
    }
}

/// Name used when a field declares no naming rule.
pub fn default_name(field: &str, index: Option<usize>) -> String {
    match index {
        Some(index) => format!("{}_{}", field, index),
        None => field.to_string(),
    }
}

/// Resolve the relative path of `field`: optional prefix directory joined
/// with the field's own name.
pub fn resolve(
    field: &FieldSpec,
    owner: &Bundle,
    subject: Subject<'_>,
    index: Option<usize>,
) -> Result<PathBuf, SchemaError> {
    let placement = field.placement();
    let name = match placement.name_rule() {
        Some(rule) => rule.resolve(field.name(), owner, subject, index)?,
        None => default_name(field.name(), index),
    };
    if name.is_empty() {
        return Err(SchemaError::EmptyName {
            field: field.name().to_string(),
        });
    }
    check_segment(field.name(), &name)?;

    let mut path = PathBuf::new();
    if let Some(prefix) = resolve_prefix(field, owner, subject, index)? {
        path.push(prefix);
    }
    path.push(name);
    Ok(path)
}

/// Resolve only the prefix of `field`. Empty prefixes resolve to `None`.
pub fn resolve_prefix(
    field: &FieldSpec,
    owner: &Bundle,
    subject: Subject<'_>,
    index: Option<usize>,
) -> Result<Option<PathBuf>, SchemaError> {
    let Some(rule) = field.placement().prefix_rule() else {
        return Ok(None);
    };
    let prefix = rule.resolve(field.name(), owner, subject, index)?;
    if prefix.is_empty() {
        return Ok(None);
    }
    check_segment(field.name(), &prefix)?;
    Ok(Some(PathBuf::from(prefix)))
}

/// Names may span several components but must stay relative.
fn check_segment(field: &str, segment: &str) -> Result<(), SchemaError> {
    let valid = Path::new(segment)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && Path::new(segment)
            .components()
            .any(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidSegment {
            field: field.to_string(),
            segment: segment.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ValueKind;
    use crate::schema::{BundleSchema, Placement};
    use serde_json::json;

    fn node_schema() -> Arc<BundleSchema> {
        BundleSchema::builder("Node")
            .value("slug")
            .file("payload", ValueKind::Text)
            .build()
            .unwrap()
    }

    fn node(slug: &str) -> Bundle {
        Bundle::new(&node_schema()).with("slug", slug).unwrap()
    }

    fn field_with(placement: Placement) -> FieldSpec {
        FieldSpec::new(
            "nodes",
            crate::schema::FieldShape::DirList(node_schema()),
            placement,
        )
    }

    #[test]
    fn test_template_parse() {
        let t = Template::parse("{label}_{index}.v1").unwrap();
        assert_eq!(t.tokens().collect::<Vec<_>>(), ["label", "index"]);
        assert!(!t.is_literal());
        assert!(Template::parse("static").unwrap().is_literal());
        assert!(Template::parse("{{literal}}").unwrap().is_literal());
    }

    #[test]
    fn test_template_parse_errors() {
        for bad in ["", "{open", "close}", "{}", "{a b}", "{1x}", "{a{b}"] {
            assert!(
                matches!(Template::parse(bad), Err(SchemaError::MalformedTemplate { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_template_owner_scope() {
        let owner = node("alpha");
        let rule = NamingRule::template("{slug}-report").unwrap();
        let name = rule
            .resolve("body", &owner, Subject::Value(&Value::Null), None)
            .unwrap();
        assert_eq!(name, "alpha-report");
    }

    #[test]
    fn test_template_escapes() {
        let owner = node("a");
        let rule = NamingRule::template("{{{slug}}}").unwrap();
        let name = rule
            .resolve("body", &owner, Subject::Value(&Value::Null), None)
            .unwrap();
        assert_eq!(name, "{a}");
    }

    #[test]
    fn test_element_scope_reads_element() {
        let owner = Bundle::new(&node_schema()).with("slug", "owner").unwrap();
        let element = node("n1");
        let rule = NamingRule::field("slug").with_scope(Scope::Element);
        let name = rule
            .resolve("nodes", &owner, Subject::Bundle(&element), Some(0))
            .unwrap();
        assert_eq!(name, "n1");
    }

    #[test]
    fn test_element_scope_reads_record_keys() {
        let owner = node("owner");
        let payload = Value::from_json(json!({"id": "rec-7"}));
        let rule = NamingRule::template("{id}").unwrap().with_scope(Scope::Element);
        let name = rule
            .resolve("data", &owner, Subject::of(&payload), None)
            .unwrap();
        assert_eq!(name, "rec-7");
    }

    #[test]
    fn test_missing_attribute_fails() {
        let owner = node("a");
        let rule = NamingRule::template("{title}").unwrap();
        let err = rule
            .resolve("body", &owner, Subject::Value(&Value::Null), None)
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingAttribute {
                field: "body".into(),
                attribute: "title".into(),
            }
        );
    }

    #[test]
    fn test_index_token_only_for_elements() {
        let owner = node("a");
        let rule = NamingRule::template("item-{index}").unwrap();
        let subject = Subject::Value(&Value::Null);
        assert_eq!(
            rule.resolve("items", &owner, subject, Some(3)).unwrap(),
            "item-3"
        );
        assert!(rule.resolve("items", &owner, subject, None).is_err());
    }

    #[test]
    fn test_callable_receives_index() {
        let owner = node("owner");
        let element = node("n1");
        let rule = NamingRule::callable(|subject, index| {
            let slug = subject.attribute("slug").unwrap_or_default();
            match index {
                Some(i) => format!("{}-{}", slug, i),
                None => slug,
            }
        })
        .with_scope(Scope::Element);
        assert_eq!(
            rule.resolve("nodes", &owner, Subject::Bundle(&element), Some(0))
                .unwrap(),
            "n1-0"
        );
        assert_eq!(
            rule.resolve("nodes", &owner, Subject::Bundle(&element), None)
                .unwrap(),
            "n1"
        );
    }

    #[test]
    fn test_subject_accessors() {
        let element = node("n1");
        let nested = Value::Bundle(node("n2"));
        let text = Value::from("plain");

        let subject = Subject::Bundle(&element);
        assert_eq!(subject.bundle().map(|b| b.schema().name()), Some("Node"));
        assert!(subject.value().is_none());

        // `of` unwraps nested bundles; a raw `Value` subject still exposes them
        assert!(Subject::of(&nested).value().is_none());
        assert!(Subject::Value(&nested).bundle().is_some());

        let subject = Subject::of(&text);
        assert!(subject.bundle().is_none());
        assert_eq!(subject.value().and_then(Value::as_text), Some("plain".to_string()));
    }

    #[test]
    fn test_default_names() {
        assert_eq!(default_name("body", None), "body");
        assert_eq!(default_name("reports", Some(2)), "reports_2");
    }

    #[test]
    fn test_resolve_with_prefix() {
        let owner = node("root");
        let element = node("n1");
        let field = field_with(
            Placement::new()
                .prefix(NamingRule::template("processed").unwrap())
                .name(NamingRule::field("slug").with_scope(Scope::Element)),
        );
        let path = resolve(&field, &owner, Subject::Bundle(&element), Some(0)).unwrap();
        assert_eq!(path, PathBuf::from("processed/n1"));
    }

    #[test]
    fn test_resolve_default_for_elements() {
        let owner = node("root");
        let element = node("n1");
        let field = field_with(Placement::new());
        let path = resolve(&field, &owner, Subject::Bundle(&element), Some(4)).unwrap();
        assert_eq!(path, PathBuf::from("nodes_4"));
    }

    #[test]
    fn test_resolve_rejects_bad_segments() {
        let owner = node("..");
        let element = node("n1");
        let field = field_with(Placement::new().name(NamingRule::field("slug")));
        let err = resolve(&field, &owner, Subject::Bundle(&element), Some(0)).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSegment { .. }));

        let owner = node("");
        let err = resolve(&field, &owner, Subject::Bundle(&element), Some(0)).unwrap_err();
        assert!(matches!(err, SchemaError::EmptyName { .. }));

        let owner = node("/etc");
        let err = resolve(&field, &owner, Subject::Bundle(&element), Some(0)).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSegment { .. }));
    }

    #[test]
    fn test_empty_prefix_ignored() {
        let owner = node("");
        let element = node("n1");
        let field = field_with(
            Placement::new()
                .prefix(NamingRule::field("slug"))
                .name(NamingRule::field("slug").with_scope(Scope::Element)),
        );
        let path = resolve(&field, &owner, Subject::Bundle(&element), Some(0)).unwrap();
        assert_eq!(path, PathBuf::from("n1"));
    }
}
