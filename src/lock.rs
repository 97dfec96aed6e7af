//! Single-run advisory lock (fs2).
//!
//! Lock file path: `<history>.lock` next to the history file.
//! A second run that finds the lock held fails fast instead of racing on the
//! history and queue files. Lock is released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::util::sibling_with_suffix;

pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // ошибки unlock на drop игнорируем
        let _ = self.file.unlock();
    }
}

pub fn lock_file_path(history: &Path) -> PathBuf {
    sibling_with_suffix(history, ".lock")
}

/// Try to take the exclusive run lock guarding `history`.
/// Returns Err if another run holds it.
pub fn try_acquire_run_lock(history: &Path) -> Result<RunLock> {
    let path = lock_file_path(history);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    file.try_lock_exclusive().with_context(|| {
        format!(
            "try_lock_exclusive failed: {} (another run in progress?)",
            path.display()
        )
    })?;
    Ok(RunLock { file, path })
}
