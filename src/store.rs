//! History and pending-queue files.
//!
//! - history (`.dumpsrc`): one TrackedEntry per line; rewritten as a whole
//!   via tmp+rename, never edited in place.
//! - pending queue (`dumps_pending`): append-only job lines; drained by an
//!   external executor.

use anyhow::{Context, Result};
use log::info;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::entry::TrackedEntry;
use crate::util::{read_content_lines, write_atomic};

#[derive(Debug, Clone)]
pub struct EntryStore {
    history: PathBuf,
    pending: PathBuf,
}

impl EntryStore {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(history: P, pending: Q) -> Self {
        Self {
            history: history.into(),
            pending: pending.into(),
        }
    }

    pub fn history_path(&self) -> &Path {
        &self.history
    }

    pub fn pending_path(&self) -> &Path {
        &self.pending
    }

    /// Load every entry of the history file. A malformed line fails the
    /// whole load.
    pub fn load(&self) -> Result<Vec<TrackedEntry>> {
        let lines = read_content_lines(&self.history)
            .with_context(|| format!("load dump history {}", self.history.display()))?;
        let mut entries = Vec::with_capacity(lines.len());
        for line in &lines {
            let e = TrackedEntry::parse_line(line)
                .with_context(|| format!("{}: bad entry '{}'", self.history.display(), line))?;
            entries.push(e);
        }
        info!(
            "store: dump history retrieved ({} items) from {}",
            entries.len(),
            self.history.display()
        );
        Ok(entries)
    }

    /// Rewrite the history file with every entry.
    pub fn save_history(&self, entries: &[TrackedEntry]) -> Result<()> {
        let mut out = String::new();
        for e in entries {
            out.push_str(&e.to_line());
            out.push('\n');
        }
        write_atomic(&self.history, out.as_bytes())
            .with_context(|| format!("write dump history {}", self.history.display()))?;
        info!("store: wrote {} entries to {}", entries.len(), self.history.display());
        Ok(())
    }

    /// Append job lines to the pending queue (created if missing) and fsync.
    pub fn append_jobs(&self, jobs: &[String]) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.pending)
            .with_context(|| format!("open {}", self.pending.display()))?;

        let mut buf = String::new();
        for job in jobs {
            buf.push_str(job);
            buf.push('\n');
        }
        f.write_all(buf.as_bytes())
            .with_context(|| format!("append {}", self.pending.display()))?;
        f.sync_all()
            .with_context(|| format!("fsync {}", self.pending.display()))?;

        info!(
            "store: registered {} job(s) into {}",
            jobs.len(),
            self.pending.display()
        );
        Ok(())
    }
}
