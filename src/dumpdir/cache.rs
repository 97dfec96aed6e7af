//! Per-run cache of loaded dump directories, keyed by path.
//!
//! Owned by a single run and passed down by `&mut`; nothing is shared across
//! runs. Population happens on the caller's thread only (read-through,
//! populate-once), so later parallel verification sees a frozen map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::DumpDirectory;

#[derive(Debug, Default)]
pub struct DirCache {
    dirs: HashMap<PathBuf, DumpDirectory>,
}

impl DirCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached directory for `path`, loading it on first use.
    pub fn get_or_load(&mut self, project: &str, path: &Path) -> &DumpDirectory {
        self.dirs
            .entry(path.to_path_buf())
            .or_insert_with(|| DumpDirectory::load(project, path))
    }

    pub fn get(&self, path: &Path) -> Option<&DumpDirectory> {
        self.dirs.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.dirs.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}
