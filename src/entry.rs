//! Tracked entry: one recurring job waiting for new dumps of a project.
//!
//! History line format:
//!   `project=<id>; date=<yyyyMMdd>; dumptypes=<a,b,...>[; norolldown][; script=<cmd>]`
//!
//! `script=` always comes last when written and swallows the rest of the line
//! when read, so commands may contain ';' and '='.

use chrono::NaiveDate;
use log::warn;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::EntryError;
use crate::util::{format_stamp, parse_stamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntry {
    pub project: String,
    /// Last processed dump date (the cursor).
    pub date: NaiveDate,
    pub dump_types: Vec<String>,
    pub script: Option<String>,
    /// Accept an older ready dump when the newest one is not ready.
    pub rolldown: bool,

    // ----- per-run state (not persisted) -----
    pub updated: bool,
    pub files: Vec<PathBuf>,
}

impl TrackedEntry {
    pub fn new<S: Into<String>>(project: S, date: NaiveDate, dump_types: Vec<String>) -> Self {
        Self {
            project: project.into(),
            date,
            dump_types,
            script: None,
            rolldown: true,
            updated: false,
            files: Vec::new(),
        }
    }

    pub fn with_script<S: Into<String>>(mut self, script: S) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_rolldown(mut self, on: bool) -> Self {
        self.rolldown = on;
        self
    }

    /// Parse one history line.
    pub fn parse_line(line: &str) -> Result<Self, EntryError> {
        let mut project: Option<String> = None;
        let mut date: Option<NaiveDate> = None;
        let mut dump_types: Option<Vec<String>> = None;
        let mut script: Option<String> = None;
        let mut rolldown = true;

        // хвост после `script=` берём как есть, без trim
        let mut rest = line.trim_start();
        while !rest.is_empty() {
            if let Some(command) = rest.strip_prefix("script=") {
                script = Some(command.to_string());
                break;
            }
            let (param, tail) = rest.split_once(';').unwrap_or((rest, ""));
            rest = tail.trim_start();

            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (key, value) = param.split_once('=').unwrap_or((param, ""));

            match key.trim() {
                "project" => project = Some(value.trim().to_string()),
                "date" => {
                    let v = value.trim();
                    date = Some(parse_stamp(v).ok_or_else(|| EntryError::InvalidDate(v.to_string()))?);
                }
                "dumptypes" => {
                    dump_types = Some(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(str::to_string)
                            .collect(),
                    )
                }
                "norolldown" => rolldown = false,
                "script" => script = Some(value.trim().to_string()),
                _ => warn!("entry: ignoring unrecognized parameter '{}' in: {}", param, line),
            }
        }

        let project = project
            .filter(|p| !p.is_empty())
            .ok_or(EntryError::MissingField("project"))?;
        let date = date.ok_or(EntryError::MissingField("date"))?;
        let dump_types = dump_types.ok_or(EntryError::MissingField("dumptypes"))?;
        if dump_types.is_empty() {
            return Err(EntryError::EmptyDumpTypes);
        }

        Ok(Self {
            project,
            date,
            dump_types,
            script,
            rolldown,
            updated: false,
            files: Vec::new(),
        })
    }

    /// Serialize back to a history line (per-run state is dropped).
    pub fn to_line(&self) -> String {
        let mut s = format!(
            "project={}; date={}; dumptypes={}",
            self.project,
            format_stamp(self.date),
            self.dump_types.join(",")
        );
        if !self.rolldown {
            s.push_str("; norolldown");
        }
        if let Some(script) = &self.script {
            s.push_str("; script=");
            s.push_str(script);
        }
        s
    }

    /// Record a verified dump for this run.
    pub fn mark_updated(&mut self, date: NaiveDate, files: Vec<PathBuf>) {
        self.updated = true;
        self.date = date;
        self.files = files;
    }

    /// Queue line `<script> <file> <file> ...` for an updated entry with a
    /// non-blank script.
    pub fn job_line(&self) -> Option<String> {
        if !self.updated {
            return None;
        }
        let script = self.script.as_deref().filter(|s| !s.trim().is_empty())?;
        let mut job = script.to_string();
        for f in &self.files {
            job.push(' ');
            job.push_str(&f.display().to_string());
        }
        Some(job)
    }
}

impl FromStr for TrackedEntry {
    type Err = EntryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_line(s)
    }
}

impl fmt::Display for TrackedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}
