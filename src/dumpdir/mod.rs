//! Dated dump directory: `<dumps_root>/<project>/<yyyyMMdd>/`.
//!
//! Состав:
//! - sidecar.rs: разбор dumpruninfo.txt и `<project>-<stamp>-sha1sums.txt`.
//! - checksum.rs: потоковый SHA-1 и параллельная проверка набора файлов.
//! - cache.rs: DirCache, не более одного DumpDirectory на путь за прогон.
//!
//! Sidecars are read once when the directory is first examined. A missing or
//! malformed sidecar does not fail anything: the directory is kept with
//! `load_success() == false` and callers skip it.

pub mod cache;
pub mod checksum;
pub mod sidecar;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::RegistryError;
use crate::registry::{DumpRegistry, STATUS_DONE};
use crate::util::read_content_lines;

pub use cache::DirCache;
pub use checksum::sha1_file_hex;
pub use sidecar::{checksum_file_name, DumpStatus, INFO_FILE_NAME};

/// Files resolved for a list of dump types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    /// All files, in the order of the requested types.
    pub files: Vec<PathBuf>,
    /// Requested types that resolved to no file at all.
    pub empty_types: Vec<String>,
}

impl FileSet {
    /// Every requested type contributed at least one file.
    pub fn is_complete(&self) -> bool {
        self.empty_types.is_empty() && !self.files.is_empty()
    }
}

#[derive(Debug)]
pub struct DumpDirectory {
    project: String,
    path: PathBuf,
    stamp: String,
    status: HashMap<String, DumpStatus>,
    checksums: HashMap<String, String>,
    load_success: bool,
}

impl DumpDirectory {
    /// Build the directory object and read its sidecars. Never fails: load
    /// errors are logged and recorded in `load_success`.
    pub fn load(project: &str, path: &Path) -> Self {
        let stamp = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut dir = Self {
            project: project.to_string(),
            path: path.to_path_buf(),
            stamp,
            status: HashMap::new(),
            checksums: HashMap::new(),
            load_success: false,
        };

        match dir.read_sidecars() {
            Ok(()) => {
                dir.load_success = true;
                debug!(
                    "dumpdir: loaded {} ({} status entries, {} checksums)",
                    dir.path.display(),
                    dir.status.len(),
                    dir.checksums.len()
                );
            }
            Err(e) => {
                // частично прочитанные данные не используем
                dir.status.clear();
                dir.checksums.clear();
                warn!("dumpdir: data load error in {}: {:#}", dir.path.display(), e);
            }
        }
        dir
    }

    fn read_sidecars(&mut self) -> Result<()> {
        let info = self.path.join(INFO_FILE_NAME);
        let sums = self.path.join(checksum_file_name(&self.project, &self.stamp));

        if !info.is_file() {
            return Err(anyhow!("no info file found: {}", info.display()));
        }
        if !sums.is_file() {
            return Err(anyhow!("no SHA1 checksum file found: {}", sums.display()));
        }

        for line in read_content_lines(&info)? {
            let (name, st) = sidecar::parse_run_info_line(&line)
                .with_context(|| format!("parse {}", info.display()))?;
            self.status.insert(name, st);
        }
        for line in read_content_lines(&sums)? {
            let (file, hex) = sidecar::parse_checksum_line(&line)
                .with_context(|| format!("parse {}", sums.display()))?;
            self.checksums.insert(file, hex);
        }
        Ok(())
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name, i.e. the `yyyyMMdd` stamp used in file names.
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    pub fn load_success(&self) -> bool {
        self.load_success
    }

    /// Direct status entry for a type (no fallback).
    pub fn status(&self, ty: &str) -> Option<&DumpStatus> {
        self.status.get(ty)
    }

    /// Expected hex SHA-1 for a file name.
    pub fn checksum(&self, file_name: &str) -> Option<&str> {
        self.checksums.get(file_name).map(String::as_str)
    }

    /// True iff every type resolves (with status fallbacks) to "done".
    pub fn is_ready<S: AsRef<str>>(
        &self,
        registry: &DumpRegistry,
        types: &[S],
    ) -> Result<bool, RegistryError> {
        for ty in types {
            let ty = ty.as_ref();
            let state = registry.resolve_status(self, ty)?;
            if state != STATUS_DONE {
                let updated = self
                    .status(ty)
                    .and_then(|st| st.updated.as_deref())
                    .unwrap_or("-");
                info!(
                    "dumpdir: {} not ready yet, status of dump {}: {} (updated {})",
                    self.stamp, ty, state, updated
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Concatenate the files of every type. Types without files are logged
    /// and listed in `FileSet::empty_types`.
    pub fn resolve_files<S: AsRef<str>>(
        &self,
        registry: &DumpRegistry,
        types: &[S],
    ) -> Result<FileSet, RegistryError> {
        let mut set = FileSet::default();
        for ty in types {
            let ty = ty.as_ref();
            let files = registry.resolve_files(self, ty)?;
            if files.is_empty() {
                warn!(
                    "dumpdir: no files found for dump {} in {}",
                    ty,
                    self.path.display()
                );
                set.empty_types.push(ty.to_string());
            }
            set.files.extend(files);
        }
        Ok(set)
    }

    /// Compare the file's SHA-1 against the sidecar entry for its name.
    /// Missing entry, mismatch and I/O errors all yield false.
    pub fn verify_checksum(&self, path: &Path) -> bool {
        let file_name = match path.file_name() {
            Some(n) => n.to_string_lossy(),
            None => {
                warn!("checksum: not a file path: {}", path.display());
                return false;
            }
        };

        let Some(expected) = self.checksum(&file_name) else {
            warn!("checksum: no sha1 checksum found for file {}", file_name);
            return false;
        };

        match sha1_file_hex(path) {
            Ok(actual) if actual == expected => {
                debug!("checksum: ok {}", file_name);
                true
            }
            Ok(actual) => {
                warn!(
                    "checksum: SHA1 mismatch for file {} (expected {}, got {})",
                    file_name, expected, actual
                );
                false
            }
            Err(e) => {
                warn!("checksum: unable to hash {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Verify a whole file set on up to `workers` threads.
    pub fn verify_all(&self, paths: &[PathBuf], workers: usize) -> bool {
        checksum::check_all(paths, workers, |p| self.verify_checksum(p))
    }
}
