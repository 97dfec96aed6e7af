//! Dump-type registry (load-once, read-only).
//!
//! Формат (JSON):
//! {
//!   "<type>": {
//!     "name": "pages-articles",        // фрагмент имени файла
//!     "exts": ["xml", "bz2"],          // расширения, склеиваются через '.'
//!     "multi": true,                   // опционально: многочастный дамп
//!     "statusfallback": "<type>",      // опционально: чей статус смотреть, если своего нет
//!     "dumpfallback": "<type>"         // опционально: чьи файлы брать, если частей 0
//!   },
//!   ...
//! }
//!
//! File names:
//! - single: `<project>-<stamp>-<name>.<exts>`
//! - multi:  `<project>-<stamp>-<name><i>.<exts>`, i = 0, 1, ... up to the first missing part.
//!
//! Fallback chains are walked iteratively with a visited list; a repeated type
//! name is reported as `RegistryError::FallbackCycle`.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::dumpdir::DumpDirectory;
use crate::error::RegistryError;

/// Status reported for a type with no entry and no status fallback.
pub const STATUS_UNKNOWN: &str = "unknown";

/// The only status that counts as ready.
pub const STATUS_DONE: &str = "done";

const BUNDLED_CONFIG: &str = include_str!("../dump-config.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpTypeConfig {
    pub name: String,
    pub exts: Vec<String>,
    #[serde(default)]
    pub multi: bool,
    #[serde(default, rename = "statusfallback", skip_serializing_if = "Option::is_none")]
    pub status_fallback: Option<String>,
    #[serde(default, rename = "dumpfallback", skip_serializing_if = "Option::is_none")]
    pub dump_fallback: Option<String>,
}

impl DumpTypeConfig {
    /// Build the file name of this type inside `<project>/<stamp>`.
    /// `part` is only meaningful for multi-part types.
    pub fn file_name(&self, project: &str, stamp: &str, part: Option<u32>) -> String {
        let mut s = format!("{}-{}-{}", project, stamp, self.name);
        if let Some(i) = part {
            s.push_str(&i.to_string());
        }
        if !self.exts.is_empty() {
            s.push('.');
            s.push_str(&self.exts.join("."));
        }
        s
    }
}

#[derive(Debug, Clone, Default)]
pub struct DumpRegistry {
    types: BTreeMap<String, DumpTypeConfig>,
}

impl DumpRegistry {
    pub fn from_json(text: &str) -> Result<Self> {
        let types: BTreeMap<String, DumpTypeConfig> =
            serde_json::from_str(text).context("parse dump config")?;
        Ok(Self { types })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("load dump config {}", path.display()))
    }

    /// Config compiled into the binary (dump-config.json at the crate root).
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_CONFIG).context("bundled dump config")
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn get(&self, ty: &str) -> Result<&DumpTypeConfig, RegistryError> {
        self.types
            .get(ty)
            .ok_or_else(|| RegistryError::UnknownDumpType(ty.to_string()))
    }

    /// Status of `ty` in `dir`, following `statusfallback` when the directory
    /// has no entry for a type. Returns STATUS_UNKNOWN at the end of the chain.
    pub fn resolve_status<'d>(
        &self,
        dir: &'d DumpDirectory,
        ty: &str,
    ) -> Result<&'d str, RegistryError> {
        let mut chain: Vec<&str> = Vec::new();
        let mut cur = ty;
        loop {
            let cfg = self.get(cur)?;
            if chain.contains(&cur) {
                return Err(cycle("status", &chain, cur));
            }
            chain.push(cur);

            if let Some(st) = dir.status(cur) {
                return Ok(st.state.as_str());
            }
            match cfg.status_fallback.as_deref() {
                Some(next) => {
                    debug!("status: {} has no entry, falling back to {}", cur, next);
                    cur = next;
                }
                None => return Ok(STATUS_UNKNOWN),
            }
        }
    }

    /// Physical files of `ty` in `dir`.
    ///
    /// Single-file types are synthesized without an existence check; they are
    /// only proven to exist by checksum verification. Multi-part types are
    /// probed on disk, and an empty probe switches to `dumpfallback` if set.
    pub fn resolve_files(
        &self,
        dir: &DumpDirectory,
        ty: &str,
    ) -> Result<Vec<PathBuf>, RegistryError> {
        let mut chain: Vec<&str> = Vec::new();
        let mut cur = ty;
        loop {
            let cfg = self.get(cur)?;
            if chain.contains(&cur) {
                return Err(cycle("dump", &chain, cur));
            }
            chain.push(cur);

            if !cfg.multi {
                let name = cfg.file_name(dir.project(), dir.stamp(), None);
                return Ok(vec![dir.path().join(name)]);
            }

            let parts = probe_parts(dir, cfg);
            if parts.is_empty() {
                if let Some(next) = cfg.dump_fallback.as_deref() {
                    debug!("files: {} has no parts in {}, falling back to {}", cur, dir.path().display(), next);
                    cur = next;
                    continue;
                }
            }
            return Ok(parts);
        }
    }

    /// Walk every type's fallback chains and report the first dangling
    /// reference or cycle.
    pub fn check(&self) -> Result<(), RegistryError> {
        for ty in self.types.keys() {
            self.walk_chain(ty, "status", |c| c.status_fallback.as_deref())?;
            self.walk_chain(ty, "dump", |c| c.dump_fallback.as_deref())?;
        }
        Ok(())
    }

    fn walk_chain<'a, F>(&'a self, start: &'a str, kind: &'static str, next: F) -> Result<(), RegistryError>
    where
        F: Fn(&'a DumpTypeConfig) -> Option<&'a str>,
    {
        let mut chain: Vec<&str> = Vec::new();
        let mut cur = start;
        loop {
            let cfg = self.get(cur)?;
            if chain.contains(&cur) {
                return Err(cycle(kind, &chain, cur));
            }
            chain.push(cur);
            match next(cfg) {
                Some(n) => cur = n,
                None => return Ok(()),
            }
        }
    }
}

fn probe_parts(dir: &DumpDirectory, cfg: &DumpTypeConfig) -> Vec<PathBuf> {
    let mut parts = Vec::new();
    for i in 0u32.. {
        let p = dir
            .path()
            .join(cfg.file_name(dir.project(), dir.stamp(), Some(i)));
        if !p.exists() {
            break;
        }
        parts.push(p);
    }
    parts
}

fn cycle(kind: &'static str, chain: &[&str], repeated: &str) -> RegistryError {
    let mut s = chain.join(" -> ");
    s.push_str(" -> ");
    s.push_str(repeated);
    RegistryError::FallbackCycle { kind, chain: s }
}
