// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use twig::{
    Attributes, Bundle, BundleSchema, Error, Materializer, MemorySink, NamingRule, Placement,
    SchemaDocument, Scope, ValueKind,
};

fn report_schema() -> Arc<BundleSchema> {
    BundleSchema::builder("Report")
        .value("name")
        .file_with(
            "body",
            ValueKind::Text,
            Placement::new().name(NamingRule::template("{name}").unwrap()),
        )
        .file("metadata", ValueKind::Record)
        .build()
        .unwrap()
}

fn report(schema: &Arc<BundleSchema>, name: &str, body: &str) -> Bundle {
    Bundle::new(schema)
        .with("name", name)
        .unwrap()
        .with("body", body)
        .unwrap()
        .with("metadata", json!({"score": body.len()}))
        .unwrap()
}

fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    files.sort();
    files
}

#[test]
fn test_report_set_layout() {
    let schema = report_schema();
    let set = BundleSchema::builder("ReportSet")
        .dir_list_with(
            "reports",
            &schema,
            Placement::new().name(NamingRule::template("{name}").unwrap().with_scope(Scope::Element)),
        )
        .file("summary", ValueKind::Record)
        .build()
        .unwrap();
    let bundle = Bundle::new(&set)
        .with("reports", vec![report(&schema, "a", "A"), report(&schema, "b", "B")])
        .unwrap()
        .with("summary", json!({"count": 2}))
        .unwrap();

    let dir = tempfile::tempdir().expect("tempdir");
    Materializer::new().write(&bundle, dir.path()).unwrap();

    let expected: Vec<PathBuf> = [
        "a/a.txt",
        "a/metadata.json",
        "b/b.txt",
        "b/metadata.json",
        "summary.json",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    assert_eq!(list_files(dir.path()), expected);
    assert_eq!(fs::read_to_string(dir.path().join("b/b.txt")).unwrap(), "B");
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary, json!({"count": 2}));
}

#[test]
fn test_prefix_with_callable_element_names() {
    let node = BundleSchema::builder("Node")
        .value("id")
        .file("payload", ValueKind::Text)
        .build()
        .unwrap();
    let tree = BundleSchema::builder("Tree")
        .value("label")
        .dir_list_with(
            "nodes",
            &node,
            Placement::new()
                .prefix(NamingRule::template("{label}").unwrap())
                .name(
                    NamingRule::callable(|subject, index| {
                        format!(
                            "node-{}-{}",
                            subject.attribute("id").unwrap_or_default(),
                            index.unwrap_or_default()
                        )
                    })
                    .with_scope(Scope::Element),
                ),
        )
        .build()
        .unwrap();

    for count in [0usize, 1, 3] {
        let nodes: Vec<Bundle> = (0..count)
            .map(|i| {
                Bundle::new(&node)
                    .with("id", i as i64 * 10)
                    .unwrap()
                    .with("payload", format!("p{i}"))
                    .unwrap()
            })
            .collect();
        let bundle = Bundle::new(&tree)
            .with("label", "forest")
            .unwrap()
            .with("nodes", nodes)
            .unwrap();

        let mut sink = MemorySink::new();
        let manifest = Materializer::new()
            .materialize_into(&mut sink, &bundle, Path::new("out"))
            .unwrap();
        assert!(sink.is_dir("out/forest"), "prefix missing for {count} nodes");
        assert_eq!(manifest.files().count(), count);
        for i in 0..count {
            let path = format!("out/forest/node-{}-{}/payload.txt", i * 10, i);
            assert_eq!(sink.read_to_string(&path), Some(format!("p{i}")), "{path}");
        }
    }
}

#[test]
fn test_callable_disambiguates_collisions() {
    let schema = report_schema();
    let by_name = |rule: NamingRule| {
        BundleSchema::builder("ReportSet")
            .dir_list_with("reports", &schema, Placement::new().name(rule))
            .build()
            .unwrap()
    };
    let items = vec![report(&schema, "same", "1"), report(&schema, "same", "2")];

    let colliding = by_name(NamingRule::field("name").with_scope(Scope::Element));
    let bundle = Bundle::new(&colliding).with("reports", items.clone()).unwrap();
    let err = Materializer::new()
        .materialize_into(&mut MemorySink::new(), &bundle, Path::new("out"))
        .unwrap_err();
    assert!(matches!(err, Error::NameCollision { .. }));

    let disambiguated = by_name(
        NamingRule::callable(|subject, index| {
            format!(
                "{}-{}",
                subject.attribute("name").unwrap_or_default(),
                index.unwrap_or_default()
            )
        })
        .with_scope(Scope::Element),
    );
    let bundle = Bundle::new(&disambiguated).with("reports", items).unwrap();
    let mut sink = MemorySink::new();
    Materializer::new()
        .materialize_into(&mut sink, &bundle, Path::new("out"))
        .unwrap();
    assert_eq!(sink.read_to_string("out/same-0/same.txt").as_deref(), Some("1"));
    assert_eq!(sink.read_to_string("out/same-1/same.txt").as_deref(), Some("2"));
}

#[test]
fn test_default_names_are_deterministic() {
    let schema = report_schema();
    let set = BundleSchema::builder("ReportSet")
        .dir_list("reports", &schema)
        .build()
        .unwrap();
    let bundle = Bundle::new(&set)
        .with(
            "reports",
            vec![report(&schema, "x", "1"), report(&schema, "y", "2")],
        )
        .unwrap();

    let first = tempfile::tempdir().expect("tempdir");
    let second = tempfile::tempdir().expect("tempdir");
    Materializer::new().write(&bundle, first.path()).unwrap();
    Materializer::new().write(&bundle, second.path()).unwrap();
    let files = list_files(first.path());
    assert_eq!(files, list_files(second.path()));
    assert!(files.contains(&PathBuf::from("reports_0/x.txt")));
    assert!(files.contains(&PathBuf::from("reports_1/y.txt")));
}

#[test]
fn test_overwrite_is_default() {
    let schema = report_schema();
    let dir = tempfile::tempdir().expect("tempdir");
    Materializer::new()
        .write(&report(&schema, "alpha", "first"), dir.path())
        .unwrap();
    Materializer::new()
        .write(&report(&schema, "alpha", "second"), dir.path())
        .unwrap();
    assert_eq!(
        fs::read_to_string(dir.path().join("alpha.txt")).unwrap(),
        "second"
    );
}

#[test]
fn test_document_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let schema_path = dir.path().join("assets.toml");
    let source = dir.path().join("logo.png");
    fs::write(&source, [0x89u8, b'P', b'N', b'G']).unwrap();
    fs::write(
        &schema_path,
        r#"
root = "Site"

[output.extensions]
records = "ndjson"

[[bundles]]
name = "Site"
fields = [
  { name = "slug", shape = "value" },
  { name = "logo", shape = "file", kind = "bytes", copyfile = true, prefix = { field = "slug" } },
  { name = "missing", shape = "file", kind = "text", copyfile = true },
  { name = "events", shape = "file", kind = "records" },
  { name = "notes", shape = "file", kind = "lines", extension = "md" },
]
"#,
    )
    .unwrap();
    let loaded = SchemaDocument::from_file(&schema_path).unwrap().build().unwrap();
    let bundle = loaded
        .instance(json!({
            "slug": "home",
            "logo": source.display().to_string(),
            "missing": "nowhere/else.txt",
            "events": [{"id": 1}, {"id": 2}],
            "notes": ["one", "two"]
        }))
        .unwrap();

    let out = dir.path().join("out");
    let manifest = loaded.materializer().unwrap().materialize(&bundle, &out).unwrap();
    assert_eq!(
        fs::read(out.join("home/logo.png")).unwrap(),
        [0x89u8, b'P', b'N', b'G']
    );
    assert_eq!(
        fs::read_to_string(out.join("missing.txt")).unwrap(),
        "nowhere/else.txt"
    );
    assert_eq!(
        fs::read_to_string(out.join("events.ndjson")).unwrap(),
        "{\"id\":1}\n{\"id\":2}\n"
    );
    assert_eq!(fs::read_to_string(out.join("notes.md")).unwrap(), "one\ntwo\n");
    assert_eq!(manifest.warnings.len(), 1);
}
