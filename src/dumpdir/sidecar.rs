//! Sidecar files produced upstream next to every dump run.
//!
//! - `dumpruninfo.txt`: `name:<type>; status:<state>; updated:<ts>`
//! - `<project>-<stamp>-sha1sums.txt`: `<sha1hex> <filename>` (sha1sum output,
//!   optional `*` binary marker before the name)

use crate::error::SidecarError;

pub const INFO_FILE_NAME: &str = "dumpruninfo.txt";
pub const SHA1_FILE_SUFFIX: &str = "sha1sums.txt";

/// Status line of one job in `dumpruninfo.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpStatus {
    pub state: String,
    pub updated: Option<String>,
}

pub fn checksum_file_name(project: &str, stamp: &str) -> String {
    format!("{}-{}-{}", project, stamp, SHA1_FILE_SUFFIX)
}

/// Parse one `dumpruninfo.txt` line into (type, status).
/// Fields are `key:value` pairs separated by ';'; `name` and `status` are
/// mandatory, unknown keys are ignored.
pub fn parse_run_info_line(line: &str) -> Result<(String, DumpStatus), SidecarError> {
    let mut name = None;
    let mut state = None;
    let mut updated = None;

    for field in line.split(';') {
        let Some((key, value)) = field.trim().split_once(':') else {
            continue;
        };
        match key.trim() {
            "name" => name = Some(value.trim().to_string()),
            "status" => state = Some(value.trim().to_string()),
            "updated" => updated = Some(value.trim().to_string()),
            _ => {}
        }
    }

    let name = name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| SidecarError::MissingRunInfoField {
            field: "name",
            line: line.to_string(),
        })?;
    let state = state.ok_or_else(|| SidecarError::MissingRunInfoField {
        field: "status",
        line: line.to_string(),
    })?;

    Ok((name, DumpStatus { state, updated }))
}

/// Parse one checksum line into (file name, lowercase hex digest).
pub fn parse_checksum_line(line: &str) -> Result<(String, String), SidecarError> {
    let mut it = line.split_whitespace();
    let (Some(hex), Some(file), None) = (it.next(), it.next(), it.next()) else {
        return Err(SidecarError::MalformedChecksum(line.to_string()));
    };
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SidecarError::MalformedChecksum(line.to_string()));
    }
    let file = file.strip_prefix('*').unwrap_or(file);
    if file.is_empty() {
        return Err(SidecarError::MalformedChecksum(line.to_string()));
    }
    Ok((file.to_string(), hex.to_ascii_lowercase()))
}
