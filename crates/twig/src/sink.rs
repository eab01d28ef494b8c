// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! I/O sinks: where a materialized tree is written.
//!
//! [`FsSink`] writes to the real filesystem. [`MemorySink`] keeps the tree in
//! memory, which is what `twigctl plan` and most tests use.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem primitives used by the materializer.
pub trait Sink {
    /// Create `path` and all missing ancestors. Existing directories are fine.
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()>;

    /// Create or overwrite the file at `path`.
    fn write_file(&mut self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Copy `from` to `to`, returning the number of bytes copied.
    fn copy_file(&mut self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Whether `path` names an existing regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Whether `path` names an existing directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Whether `path` is missing or an empty directory.
    fn is_empty_dir(&self, path: &Path) -> io::Result<bool>;
}

/// Sink backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSink;

impl Sink for FsSink {
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write_file(&mut self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn copy_file(&mut self, from: &Path, to: &Path) -> io::Result<u64> {
        fs::copy(from, to)
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_empty_dir(&self, path: &Path) -> io::Result<bool> {
        match fs::read_dir(path) {
            Ok(mut entries) => Ok(entries.next().is_none()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(err) => Err(err),
        }
    }
}

/// Entry of a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryEntry {
    Dir,
    File(Vec<u8>),
}

/// In-memory sink.
///
/// Copy sources are looked up in the sink first and then on the real
/// filesystem, so copy-mode fields behave as they would with [`FsSink`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemorySink {
    entries: BTreeMap<PathBuf, MemoryEntry>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of the file at `path`.
    pub fn read(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        match self.entries.get(path.as_ref()) {
            Some(MemoryEntry::File(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn read_to_string(&self, path: impl AsRef<Path>) -> Option<String> {
        self.read(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        matches!(self.entries.get(path.as_ref()), Some(MemoryEntry::Dir))
    }

    /// All files, sorted by path.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().filter_map(|(path, entry)| match entry {
            MemoryEntry::File(_) => Some(path.as_path()),
            MemoryEntry::Dir => None,
        })
    }

    /// All entries, sorted by path.
    pub fn entries(&self) -> impl Iterator<Item = (&Path, &MemoryEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_path(), entry))
    }

    /// Render the entries under `root` as an indented tree.
    pub fn render_tree(&self, root: impl AsRef<Path>) -> String {
        let root = root.as_ref();
        let mut out = format!("{}/\n", root.display());
        for (path, entry) in self.entries() {
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let depth = relative.components().count();
            if depth == 0 {
                continue;
            }
            let name = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push_str(&"  ".repeat(depth));
            match entry {
                MemoryEntry::Dir => out.push_str(&format!("{}/\n", name)),
                MemoryEntry::File(bytes) => {
                    out.push_str(&format!("{} ({} bytes)\n", name, bytes.len()))
                }
            }
        }
        out
    }

    fn check_parent(&self, path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => match self.entries.get(parent) {
                Some(MemoryEntry::Dir) => Ok(()),
                Some(MemoryEntry::File(_)) => Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is a file", parent.display()),
                )),
                None => Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", parent.display()),
                )),
            },
            _ => Ok(()),
        }
    }
}

impl Sink for MemorySink {
    fn create_dir_all(&mut self, path: &Path) -> io::Result<()> {
        let mut current = PathBuf::new();
        for component in path.components() {
            current.push(component);
            match self.entries.get(&current) {
                Some(MemoryEntry::File(_)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} is a file", current.display()),
                    ))
                }
                Some(MemoryEntry::Dir) => {}
                None => {
                    self.entries.insert(current.clone(), MemoryEntry::Dir);
                }
            }
        }
        Ok(())
    }

    fn write_file(&mut self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.check_parent(path)?;
        if self.is_dir(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a directory", path.display()),
            ));
        }
        self.entries
            .insert(path.to_path_buf(), MemoryEntry::File(contents.to_vec()));
        Ok(())
    }

    fn copy_file(&mut self, from: &Path, to: &Path) -> io::Result<u64> {
        let bytes = match self.read(from) {
            Some(bytes) => bytes.to_vec(),
            None => fs::read(from)?,
        };
        let len = bytes.len() as u64;
        self.write_file(to, &bytes)?;
        Ok(len)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.read(path).is_some() || path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.entries.get(path), Some(MemoryEntry::Dir)) || path.is_dir()
    }

    fn is_empty_dir(&self, path: &Path) -> io::Result<bool> {
        match self.entries.get(path) {
            None => Ok(true),
            Some(MemoryEntry::File(_)) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", path.display()),
            )),
            Some(MemoryEntry::Dir) => Ok(!self
                .entries
                .range(path.to_path_buf()..)
                .skip(1)
                .any(|(p, _)| p.starts_with(path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_sink_dirs_and_files() {
        let mut sink = MemorySink::new();
        sink.create_dir_all(Path::new("out/a/b")).unwrap();
        assert!(sink.is_dir("out"));
        assert!(sink.is_dir("out/a"));
        sink.write_file(Path::new("out/a/b/x.txt"), b"hi").unwrap();
        assert_eq!(sink.read("out/a/b/x.txt"), Some(&b"hi"[..]));
        assert!(sink.is_file(Path::new("out/a/b/x.txt")));

        // create_dir_all is idempotent, writes overwrite
        sink.create_dir_all(Path::new("out/a/b")).unwrap();
        sink.write_file(Path::new("out/a/b/x.txt"), b"again").unwrap();
        assert_eq!(sink.read_to_string("out/a/b/x.txt").as_deref(), Some("again"));
    }

    #[test]
    fn test_memory_sink_requires_parent() {
        let mut sink = MemorySink::new();
        let err = sink.write_file(Path::new("missing/x.txt"), b"").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_memory_sink_file_blocks_dir() {
        let mut sink = MemorySink::new();
        sink.create_dir_all(Path::new("out")).unwrap();
        sink.write_file(Path::new("out/x"), b"").unwrap();
        assert!(sink.create_dir_all(Path::new("out/x/y")).is_err());
        assert!(sink.write_file(Path::new("out"), b"").is_err());
    }

    #[test]
    fn test_memory_sink_is_empty_dir() {
        let mut sink = MemorySink::new();
        assert!(sink.is_empty_dir(Path::new("out")).unwrap());
        sink.create_dir_all(Path::new("out")).unwrap();
        sink.create_dir_all(Path::new("out2")).unwrap();
        assert!(sink.is_empty_dir(Path::new("out")).unwrap());
        sink.write_file(Path::new("out/a"), b"").unwrap();
        assert!(!sink.is_empty_dir(Path::new("out")).unwrap());
        assert!(sink.is_empty_dir(Path::new("out2")).unwrap());
    }

    #[test]
    fn test_memory_sink_copies_from_disk() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("data.raw");
        fs::write(&source, [0u8, 1, 2]).unwrap();

        let mut sink = MemorySink::new();
        sink.create_dir_all(Path::new("out")).unwrap();
        let copied = sink.copy_file(&source, Path::new("out/asset.raw")).unwrap();
        assert_eq!(copied, 3);
        assert_eq!(sink.read("out/asset.raw"), Some(&[0u8, 1, 2][..]));
    }

    #[test]
    fn test_fs_sink_is_empty_dir() {
        let dir = tempdir().expect("tempdir");
        let sink = FsSink;
        assert!(sink.is_empty_dir(&dir.path().join("missing")).unwrap());
        assert!(sink.is_empty_dir(dir.path()).unwrap());
        fs::write(dir.path().join("f"), b"x").unwrap();
        assert!(!sink.is_empty_dir(dir.path()).unwrap());
    }

    #[test]
    fn test_memory_sink_entries_sorted() {
        let mut sink = MemorySink::new();
        sink.create_dir_all(Path::new("out/b")).unwrap();
        sink.write_file(Path::new("out/a.txt"), b"a").unwrap();
        let entries: Vec<_> = sink.entries().collect();
        assert_eq!(
            entries,
            [
                (Path::new("out"), &MemoryEntry::Dir),
                (Path::new("out/a.txt"), &MemoryEntry::File(b"a".to_vec())),
                (Path::new("out/b"), &MemoryEntry::Dir),
            ]
        );
    }

    #[test]
    fn test_is_dir_checks_sink_then_disk() {
        let dir = tempdir().expect("tempdir");
        let mut sink = MemorySink::new();
        sink.create_dir_all(Path::new("out")).unwrap();
        sink.write_file(Path::new("out/f"), b"").unwrap();
        assert!(Sink::is_dir(&sink, Path::new("out")));
        assert!(!Sink::is_dir(&sink, Path::new("out/f")));
        assert!(Sink::is_dir(&sink, dir.path()));
        assert!(FsSink.is_dir(dir.path()));
        assert!(!FsSink.is_dir(&dir.path().join("missing")));
    }

    #[test]
    fn test_render_tree() {
        let mut sink = MemorySink::new();
        sink.create_dir_all(Path::new("out/alpha")).unwrap();
        sink.write_file(Path::new("out/alpha/alpha.txt"), b"Hello").unwrap();
        let tree = sink.render_tree("out");
        assert_eq!(tree, "out/\n  alpha/\n    alpha.txt (5 bytes)\n");
    }
}
