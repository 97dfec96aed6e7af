//! Centralized configuration for dumpwatch.
//!
//! Goals:
//! - Single place to collect paths and tunables instead of scattering env lookups.
//! - WatchConfig::from_env() reads DUMPWATCH_* variables; CLI flags override
//!   through the fluent `with_*` setters.
//!
//! Env:
//! - DUMPWATCH_DUMPS_ROOT    (default ./data/dumps/public)
//! - DUMPWATCH_HISTORY       (default ./.dumpsrc)
//! - DUMPWATCH_PENDING       (default ./dumps_pending)
//! - DUMPWATCH_DUMP_CONFIG   (default: bundled dump-config.json)
//! - DUMPWATCH_VERIFY_WORKERS (default 1 = sequential checksum verification)
//! - DUMPWATCH_DRY_RUN       (default false; "1|true|on|yes" => true)

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;

use crate::registry::DumpRegistry;

pub const DEFAULT_DUMPS_ROOT: &str = "./data/dumps/public";
pub const DEFAULT_HISTORY: &str = "./.dumpsrc";
pub const DEFAULT_PENDING: &str = "./dumps_pending";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchConfig {
    /// Parent of all project directories (`<root>/<project>/<yyyyMMdd>/`).
    pub dumps_root: PathBuf,

    /// History file with one tracked entry per line.
    pub history_path: PathBuf,

    /// Append-only job queue.
    pub pending_path: PathBuf,

    /// Dump-type config JSON. None: use the bundled one.
    pub dump_config: Option<PathBuf>,

    /// Threads used to verify checksums of one candidate (<= 1: sequential).
    pub verify_workers: usize,

    /// Resolve and verify, but write nothing.
    pub dry_run: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dumps_root: PathBuf::from(DEFAULT_DUMPS_ROOT),
            history_path: PathBuf::from(DEFAULT_HISTORY),
            pending_path: PathBuf::from(DEFAULT_PENDING),
            dump_config: None,
            verify_workers: 1,
            dry_run: false,
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}

impl WatchConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(p) = env_path("DUMPWATCH_DUMPS_ROOT") {
            cfg.dumps_root = p;
        }
        if let Some(p) = env_path("DUMPWATCH_HISTORY") {
            cfg.history_path = p;
        }
        if let Some(p) = env_path("DUMPWATCH_PENDING") {
            cfg.pending_path = p;
        }
        if let Some(p) = env_path("DUMPWATCH_DUMP_CONFIG") {
            cfg.dump_config = Some(p);
        }

        if let Ok(v) = std::env::var("DUMPWATCH_VERIFY_WORKERS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.verify_workers = n;
            }
        }

        if let Ok(v) = std::env::var("DUMPWATCH_DRY_RUN") {
            cfg.dry_run = env_flag(&v);
        }

        cfg
    }

    pub fn with_dumps_root<P: Into<PathBuf>>(mut self, p: P) -> Self {
        self.dumps_root = p.into();
        self
    }

    pub fn with_history_path<P: Into<PathBuf>>(mut self, p: P) -> Self {
        self.history_path = p.into();
        self
    }

    pub fn with_pending_path<P: Into<PathBuf>>(mut self, p: P) -> Self {
        self.pending_path = p.into();
        self
    }

    pub fn with_dump_config<P: Into<PathBuf>>(mut self, p: Option<P>) -> Self {
        self.dump_config = p.map(Into::into);
        self
    }

    pub fn with_verify_workers(mut self, n: usize) -> Self {
        self.verify_workers = n;
        self
    }

    pub fn with_dry_run(mut self, on: bool) -> Self {
        self.dry_run = on;
        self
    }

    /// Load the dump-type registry this config points at.
    pub fn load_registry(&self) -> Result<DumpRegistry> {
        match &self.dump_config {
            Some(p) => DumpRegistry::load(p),
            None => DumpRegistry::bundled(),
        }
    }
}

impl fmt::Display for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WatchConfig {{ \
             dumps_root: {}, \
             history_path: {}, \
             pending_path: {}, \
             dump_config: {}, \
             verify_workers: {}, \
             dry_run: {} \
             }}",
            self.dumps_root.display(),
            self.history_path.display(),
            self.pending_path.display(),
            self.dump_config
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "bundled".to_string()),
            self.verify_workers,
            self.dry_run,
        )
    }
}
