// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 Oakwatch contributors

//! Filename -> source path index for serving originals
//!
//! The orchestrator builds a fresh index during each scan and publishes it
//! wholesale; lookups read an immutable snapshot and never observe a
//! half-built index. An older snapshot stays visible until the next publish
//! completes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;
use walkdir::WalkDir;

/// How deep and how far the last-resort filename search will go.
const SEARCH_MAX_DEPTH: usize = 4;
const SEARCH_MAX_ENTRIES: usize = 10_000;

/// Immutable filename -> path snapshot from the most recent completed scan.
#[derive(Debug, Default)]
pub struct ImageIndex {
    entries: HashMap<String, PathBuf>,
}

impl ImageIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        Self { entries: entries.into_iter().collect() }
    }

    pub fn get(&self, filename: &str) -> Option<&Path> {
        self.entries.get(filename).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}

/// Shared handle over the published snapshot. Only the orchestrator writes,
/// and only at publish time.
#[derive(Debug, Default)]
pub struct SharedIndex {
    inner: RwLock<Arc<ImageIndex>>,
}

impl SharedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the published snapshot.
    pub fn publish(&self, index: ImageIndex) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(index);
    }

    /// Current snapshot; cheap clone of the `Arc`.
    pub fn snapshot(&self) -> Arc<ImageIndex> {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Full lookup path: exact index hit, then a direct probe under the mount,
/// then a bounded recursive filename search.
pub fn lookup_with_fallback(
    index: &ImageIndex,
    mount: &Path,
    filename: &str,
) -> Option<PathBuf> {
    if let Some(path) = index.get(filename) {
        return Some(path.to_path_buf());
    }

    let direct = mount.join(filename);
    if direct.is_file() {
        debug!("Index miss for {}, found by direct probe", filename);
        return Some(direct);
    }

    search_by_name(mount, filename)
}

fn search_by_name(mount: &Path, filename: &str) -> Option<PathBuf> {
    WalkDir::new(mount)
        .max_depth(SEARCH_MAX_DEPTH)
        .into_iter()
        .filter_map(|e| e.ok())
        .take(SEARCH_MAX_ENTRIES)
        .find(|e| e.file_type().is_file() && e.file_name().to_string_lossy() == filename)
        .map(|e| e.into_path())
}
