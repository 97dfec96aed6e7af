//! Candidate search under `<dumps_root>/<project>/`.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dumpdir::DirCache;
use crate::util::parse_stamp;

/// Symlink maintained upstream to the most recent run; never a candidate.
pub const LATEST_DIR: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub date: NaiveDate,
    pub path: PathBuf,
}

/// List dated subdirectories of `project_root` strictly newer than `after`,
/// newest first. Every returned candidate is loaded into `cache`.
///
/// `project` names the sidecar and dump files. It is the entry's project id,
/// not the resolved directory name: `project_root` may be a symlink to a
/// mount with another name.
///
/// Names that are not `yyyyMMdd` dates are skipped silently. A missing or
/// unreadable `project_root` is an error.
pub fn list_candidates(
    project: &str,
    project_root: &Path,
    after: NaiveDate,
    cache: &mut DirCache,
) -> Result<Vec<Candidate>> {
    if !project_root.is_dir() {
        return Err(anyhow!("unable to access {}", project_root.display()));
    }
    // ключ кэша: абсолютный путь
    let root = fs::canonicalize(project_root)
        .with_context(|| format!("canonicalize {}", project_root.display()))?;

    let mut out = Vec::new();
    let rd = fs::read_dir(&root).with_context(|| format!("read_dir {}", root.display()))?;
    for entry in rd {
        let entry = entry.with_context(|| format!("read_dir {}", root.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name == LATEST_DIR {
            continue;
        }
        let Some(date) = parse_stamp(name) else {
            debug!("locator: skip non-dated entry {}", path.display());
            continue;
        };
        if date <= after {
            continue;
        }
        out.push(Candidate { date, path });
    }

    out.sort_by(|a, b| b.date.cmp(&a.date));

    for c in &out {
        let dir = cache.get_or_load(project, &c.path);
        if !dir.load_success() {
            info!("locator: {} excluded (data load error)", c.path.display());
        }
    }

    debug!(
        "locator: {} candidate(s) after {} in {}",
        out.len(),
        after,
        root.display()
    );
    Ok(out)
}
