//! Per-run counters and outcome, printable as text or JSON.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub entries_total: u64,
    pub entries_updated: u64,

    // кандидаты (по всем записям)
    pub candidates_seen: u64,
    pub candidates_unloadable: u64,
    pub candidates_not_ready: u64,
    pub candidates_incomplete: u64,
    pub candidates_bad_checksum: u64,

    pub jobs_queued: u64,
    pub history_written: bool,
    pub dry_run: bool,

    /// Job lines produced by this run (queued unless dry_run).
    pub jobs: Vec<String>,
}

impl RunReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn any_updated(&self) -> bool {
        self.entries_updated > 0
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run report{}", if self.dry_run { " (dry run)" } else { "" })?;
        writeln!(f, "  entries        = {}", self.entries_total)?;
        writeln!(f, "  updated        = {}", self.entries_updated)?;
        writeln!(f, "  candidates     = {}", self.candidates_seen)?;
        writeln!(f, "    unloadable   = {}", self.candidates_unloadable)?;
        writeln!(f, "    not ready    = {}", self.candidates_not_ready)?;
        writeln!(f, "    incomplete   = {}", self.candidates_incomplete)?;
        writeln!(f, "    bad checksum = {}", self.candidates_bad_checksum)?;
        writeln!(f, "  jobs queued    = {}", self.jobs_queued)?;
        write!(f, "  history        = {}", if self.history_written { "written" } else { "unchanged" })?;
        for job in &self.jobs {
            write!(f, "\n  job: {}", job)?;
        }
        Ok(())
    }
}
