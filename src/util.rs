//! util: общие хелперы для sidecar/history файлов.
//!
//! Содержит:
//! - read_content_lines(): строки файла без пустых и `#`-комментариев.
//! - parse_stamp()/format_stamp(): даты каталогов дампов (`yyyyMMdd`).
//! - write_atomic(): запись файла через tmp+rename.
//! - to_hex(): lowercase hex.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Формат даты в именах каталогов и в history (`date=`).
pub const STAMP_FORMAT: &str = "%Y%m%d";

/// Read a UTF-8 text file and keep only meaningful lines:
/// blank lines and lines starting with `#` are dropped.
pub fn read_content_lines(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Parse a `yyyyMMdd` stamp. Anything other than exactly 8 ASCII digits
/// forming a valid calendar date yields None.
pub fn parse_stamp(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(s, STAMP_FORMAT).ok()
}

pub fn format_stamp(date: NaiveDate) -> String {
    date.format(STAMP_FORMAT).to_string()
}

/// `<path>` + suffix, e.g. `.dumpsrc` -> `.dumpsrc.lock`.
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Атомарная перезапись: пишем в `<path>.tmp`, fsync, затем rename поверх.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = sibling_with_suffix(path, ".tmp");

    let mut f = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp)
        .with_context(|| format!("open {}", tmp.display()))?;
    f.write_all(data)
        .with_context(|| format!("write {}", tmp.display()))?;
    let _ = f.sync_all();
    drop(f);

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
