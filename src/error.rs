//! Typed errors for conditions callers need to tell apart.
//!
//! Everything else travels as `anyhow::Error` with context.

use thiserror::Error;

/// Dump-type configuration problems. Always fatal for a run:
/// the configuration is assumed complete and acyclic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown dump type '{0}'")]
    UnknownDumpType(String),

    #[error("{kind} fallback cycle: {chain}")]
    FallbackCycle { kind: &'static str, chain: String },
}

/// A history line (or ad-hoc entry) that cannot become a tracked entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("missing '{0}' parameter")]
    MissingField(&'static str),

    #[error("unrecognized date '{0}' (expected yyyyMMdd)")]
    InvalidDate(String),

    #[error("empty 'dumptypes' list")]
    EmptyDumpTypes,
}

/// Malformed line in a per-snapshot sidecar file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SidecarError {
    #[error("run info line without '{field}': {line}")]
    MissingRunInfoField { field: &'static str, line: String },

    #[error("malformed checksum line: {0}")]
    MalformedChecksum(String),
}
