//! DumpWatcher: per-entry retry loop over dump candidates and the final
//! persist step.
//!
//! Для каждой записи:
//! - кандидаты (каталоги новее курсора) обходятся строго от новых к старым;
//! - первый кандидат, прошедший статус + резолв файлов + SHA-1, обновляет запись;
//! - без rolldown смотрим только самый новый кандидат.
//!
//! Persist (once per run, only if some entry was updated):
//! 1) append job lines to the pending queue (fsync);
//! 2) rewrite the history file (tmp+rename).
//! A crash between 1 and 2 re-queues the same jobs next run instead of
//! losing them.

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::config::WatchConfig;
use crate::dumpdir::{DirCache, DumpDirectory};
use crate::entry::TrackedEntry;
use crate::lock::{try_acquire_run_lock, RunLock};
use crate::locator::list_candidates;
use crate::registry::DumpRegistry;
use crate::report::RunReport;
use crate::store::EntryStore;

pub struct DumpWatcher {
    registry: DumpRegistry,
    dumps_root: PathBuf,
    verify_workers: usize,
    dry_run: bool,
}

impl DumpWatcher {
    pub fn new(registry: DumpRegistry, cfg: &WatchConfig) -> Self {
        Self {
            registry,
            dumps_root: cfg.dumps_root.clone(),
            verify_workers: cfg.verify_workers,
            dry_run: cfg.dry_run,
        }
    }

    /// Load the registry named by `cfg` and build a watcher.
    pub fn from_config(cfg: &WatchConfig) -> Result<Self> {
        Ok(Self::new(cfg.load_registry()?, cfg))
    }

    pub fn registry(&self) -> &DumpRegistry {
        &self.registry
    }

    pub fn dumps_root(&self) -> &Path {
        &self.dumps_root
    }

    /// Batch mode: every entry of the history file.
    pub fn run_batch(&self, store: &EntryStore) -> Result<RunReport> {
        let _lock = self.lock(store)?;
        let mut entries = store.load()?;
        let mut cache = DirCache::new();
        let mut report = self.new_report();

        self.process_entries(&mut entries, &mut cache, &mut report)?;
        self.persist(store, &entries, true, &mut report)?;
        Ok(report)
    }

    /// Ad-hoc mode: one entry that is not part of the history file. Its job
    /// is queued, the history file is left alone.
    pub fn run_single(&self, store: &EntryStore, entry: TrackedEntry) -> Result<(TrackedEntry, RunReport)> {
        let _lock = self.lock(store)?;
        let mut entries = vec![entry];
        let mut cache = DirCache::new();
        let mut report = self.new_report();

        self.process_entries(&mut entries, &mut cache, &mut report)?;
        self.persist(store, &entries, false, &mut report)?;

        let entry = entries
            .pop()
            .ok_or_else(|| anyhow!("ad-hoc entry vanished"))?;
        Ok((entry, report))
    }

    /// Resolve every entry against the dumps on disk. Fatal errors (missing
    /// project directory, config problems) abort before anything is written.
    pub fn process_entries(
        &self,
        entries: &mut [TrackedEntry],
        cache: &mut DirCache,
        report: &mut RunReport,
    ) -> Result<()> {
        report.entries_total += entries.len() as u64;
        for entry in entries.iter_mut() {
            self.process_entry(entry, cache, report)?;
        }
        report.entries_updated = entries.iter().filter(|e| e.updated).count() as u64;
        Ok(())
    }

    /// Candidate loop for one entry. Returns whether the entry got updated.
    pub fn process_entry(
        &self,
        entry: &mut TrackedEntry,
        cache: &mut DirCache,
        report: &mut RunReport,
    ) -> Result<bool> {
        info!(
            "watcher: processing entry for project {} (job {})",
            entry.project,
            entry.script.as_deref().unwrap_or("-")
        );

        let project_root = self.dumps_root().join(&entry.project);
        let candidates = list_candidates(&entry.project, &project_root, entry.date, cache)?;
        if candidates.is_empty() {
            info!("watcher: no directories are available to process this entry");
            return Ok(false);
        }

        for c in &candidates {
            report.candidates_seen += 1;
            let dir = cache
                .get(&c.path)
                .ok_or_else(|| anyhow!("candidate not cached: {}", c.path.display()))?;

            if dir.load_success() {
                info!("watcher: reading from {}", dir.path().display());
                self.try_candidate(entry, dir, c.date, report)?;
            } else {
                info!("watcher: ignoring {} (data load error)", dir.path().display());
                report.candidates_unloadable += 1;
            }

            if entry.updated || !entry.rolldown {
                break;
            }
        }
        Ok(entry.updated)
    }

    fn try_candidate(
        &self,
        entry: &mut TrackedEntry,
        dir: &DumpDirectory,
        date: NaiveDate,
        report: &mut RunReport,
    ) -> Result<bool> {
        if !dir.is_ready(&self.registry, &entry.dump_types)? {
            report.candidates_not_ready += 1;
            return Ok(false);
        }

        let set = dir.resolve_files(&self.registry, &entry.dump_types)?;
        if !set.is_complete() {
            warn!(
                "watcher: status checks passed in {}, but no matching files were found for {}",
                dir.path().display(),
                set.empty_types.join(",")
            );
            report.candidates_incomplete += 1;
            return Ok(false);
        }

        if !dir.verify_all(&set.files, self.verify_workers) {
            report.candidates_bad_checksum += 1;
            return Ok(false);
        }

        info!(
            "watcher: marked {} file(s) from {} for further processing",
            set.files.len(),
            dir.path().display()
        );
        entry.mark_updated(date, set.files);
        Ok(true)
    }

    fn persist(
        &self,
        store: &EntryStore,
        entries: &[TrackedEntry],
        rewrite_history: bool,
        report: &mut RunReport,
    ) -> Result<()> {
        if !entries.iter().any(|e| e.updated) {
            info!("watcher: no changes detected");
            return Ok(());
        }

        let jobs: Vec<String> = entries.iter().filter_map(TrackedEntry::job_line).collect();
        for job in &jobs {
            info!("watcher: job {}", job);
        }
        report.jobs = jobs.clone();

        if self.dry_run {
            info!(
                "watcher: dry run, skipping {} job(s) for {} and history rewrite",
                jobs.len(),
                store.pending_path().display()
            );
            return Ok(());
        }

        store.append_jobs(&jobs)?;
        report.jobs_queued = jobs.len() as u64;

        if rewrite_history {
            store.save_history(entries)?;
            report.history_written = true;
        }
        Ok(())
    }

    fn lock(&self, store: &EntryStore) -> Result<Option<RunLock>> {
        if self.dry_run {
            return Ok(None);
        }
        let lock = try_acquire_run_lock(store.history_path())?;
        debug!("watcher: run lock {}", lock.path().display());
        Ok(Some(lock))
    }

    fn new_report(&self) -> RunReport {
        RunReport {
            dry_run: self.dry_run,
            ..RunReport::default()
        }
    }
}
