// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Twig CLI
//!
//! Renders TOML schema documents and JSON instance data to directory trees.
//!
//! # Usage
//!
//! ```bash
//! # Write an example schema document
//! twigctl gen-schema --output reports.toml
//!
//! # Check a schema document
//! twigctl validate --schema reports.toml
//!
//! # Show the tree an instance would produce, without touching the disk
//! twigctl plan --schema reports.toml --data reports.json
//!
//! # Materialize it
//! twigctl render --schema reports.toml --data reports.json --output out/
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use twig::{
    ExistingPolicy, FieldShape, LoadedSchema, Manifest, MemorySink, SchemaDocument, WriteOptions,
};

/// Twig directory-tree materializer
#[derive(Parser, Debug)]
#[command(name = "twigctl")]
#[command(about = "Twig CLI - render schema documents to directory trees")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Materialize an instance into a directory
    Render {
        /// Schema document (TOML)
        #[arg(short, long)]
        schema: PathBuf,

        /// Instance data (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Destination directory
        #[arg(short, long)]
        output: PathBuf,

        /// Refuse to write into a non-empty destination
        #[arg(long)]
        fail_if_not_empty: bool,
    },

    /// Print the tree an instance would produce
    Plan {
        /// Schema document (TOML)
        #[arg(short, long)]
        schema: PathBuf,

        /// Instance data (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Print the manifest as JSON instead of a tree
        #[arg(long)]
        json: bool,
    },

    /// Validate a schema document
    Validate {
        /// Schema document (TOML)
        #[arg(short, long)]
        schema: PathBuf,
    },

    /// Generate an example schema document
    GenSchema {
        /// Output file path
        #[arg(short, long, default_value = "twig.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Render {
            schema,
            data,
            output,
            fail_if_not_empty,
        } => cmd_render(&schema, &data, &output, fail_if_not_empty),
        Commands::Plan { schema, data, json } => cmd_plan(&schema, &data, json),
        Commands::Validate { schema } => cmd_validate(&schema),
        Commands::GenSchema { output } => cmd_gen_schema(&output),
    }
}

fn load_schema(path: &Path) -> Result<LoadedSchema> {
    let document = SchemaDocument::from_file(path)
        .with_context(|| format!("Failed to load schema document {}", path.display()))?;
    let loaded = document
        .build()
        .with_context(|| format!("Failed to resolve schema document {}", path.display()))?;
    tracing::debug!(
        "Loaded schema document {} (root `{}`, {} bundles)",
        path.display(),
        loaded.root().name(),
        loaded.bundles().count()
    );
    Ok(loaded)
}

fn cmd_render(schema: &Path, data: &Path, output: &Path, fail_if_not_empty: bool) -> Result<()> {
    let loaded = load_schema(schema)?;
    let bundle = loaded
        .load_instance(data)
        .with_context(|| format!("Failed to load instance data {}", data.display()))?;

    tracing::info!("Rendering {} into {}", data.display(), output.display());
    let mut materializer = loaded.materializer()?;
    if fail_if_not_empty {
        materializer =
            materializer.options(WriteOptions::new().on_existing(ExistingPolicy::FailIfNotEmpty));
    }
    let manifest = materializer
        .materialize(&bundle, output)
        .with_context(|| format!("Failed to materialize into {}", output.display()))?;

    print_summary(&manifest, output);
    Ok(())
}

fn cmd_plan(schema: &Path, data: &Path, json: bool) -> Result<()> {
    let loaded = load_schema(schema)?;
    let bundle = loaded
        .load_instance(data)
        .with_context(|| format!("Failed to load instance data {}", data.display()))?;

    tracing::info!("Planning {} (nothing is written)", data.display());
    let root = Path::new(loaded.root().name());
    let mut sink = MemorySink::new();
    let manifest = loaded
        .materializer()?
        .materialize_into(&mut sink, &bundle, root)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        print!("{}", sink.render_tree(root));
        for warning in &manifest.warnings {
            println!("warning: {}", warning);
        }
    }
    Ok(())
}

fn cmd_validate(schema: &Path) -> Result<()> {
    let loaded = load_schema(schema)?;
    println!("Schema valid!");
    println!();
    println!("Root: {}", loaded.root().name());
    let materializer = loaded.materializer()?;
    let kinds: Vec<String> = materializer
        .registry()
        .kinds()
        .into_iter()
        .map(|kind| kind.to_string())
        .collect();
    println!("Kinds: {}", kinds.join(", "));
    println!("Bundles: {}", loaded.bundles().count());
    for bundle in loaded.bundles() {
        println!("  {}", bundle.name());
        for field in bundle.fields() {
            let shape = match field.shape() {
                FieldShape::Value => "value".to_string(),
                FieldShape::File(kind) => format!("file ({})", kind),
                FieldShape::Dir(child) => format!("dir ({})", child.name()),
                FieldShape::DirList(child) => format!("dir_list ({})", child.name()),
            };
            println!("    {}: {}", field.name(), shape);
        }
    }
    Ok(())
}

fn cmd_gen_schema(output: &Path) -> Result<()> {
    let toml_str = toml::to_string_pretty(&SchemaDocument::example())?;

    let content = format!(
        r#"# Twig schema document
# Generated by twigctl gen-schema

{}
"#,
        toml_str
    );

    std::fs::write(output, content)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Generated schema document: {}", output.display());
    Ok(())
}

fn print_summary(manifest: &Manifest, output: &Path) {
    println!("Materialized into {}", output.display());
    println!(
        "  {} directories, {} files, {}",
        manifest.directories().count(),
        manifest.files().count(),
        format_bytes(manifest.total_bytes())
    );
    for warning in &manifest.warnings {
        println!("  warning: {}", warning);
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
