//! Error types for trajectory detection.
//!
//! Three failure families share one enum: format errors (malformed or
//! truncated trajectory text), bond-service errors (the external perception
//! call failed or returned garbage), and configuration errors (unsupported
//! format kind, bad element table, unparsable config). Header-scan failures
//! are fatal to a run; step-scoped variants carry the offending step id so
//! the caller can decide between skipping the step and aborting.

use super::perception::PerceptionError;
use super::FormatKind;
use crate::model::types::ParseElementError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("failed to parse {format} data: {details} (at line ~{line})")]
    Parse {
        format: FormatKind,
        line: usize,
        details: String,
    },

    /// Fewer than two step boundaries were found while scanning the header,
    /// so no stride can be recovered. Fatal: nothing further can be parsed.
    #[error("fewer than two step boundaries found in {format} data: file is truncated or not a {format} trajectory")]
    MissingStepBoundary { format: FormatKind },

    #[error("step {step}: expected {expected} atoms but found {found}")]
    AtomCountMismatch {
        step: usize,
        expected: usize,
        found: usize,
    },

    #[error("step {step}: atom id {id} appears more than once")]
    DuplicateAtomId { step: usize, id: usize },

    #[error("step {step}: atom id {id} is outside 1..={n_atoms}")]
    AtomIdOutOfRange {
        step: usize,
        id: usize,
        n_atoms: usize,
    },

    #[error("species index {species} has no entry in the element table ({table_len} entries)")]
    UnknownSpecies { species: usize, table_len: usize },

    #[error("unsupported trajectory format kind: '{0}'")]
    UnsupportedFormat(String),

    #[error("dump detection requires a bond perceiver")]
    MissingPerceiver,

    #[error("failed to parse detection config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Element(#[from] ParseElementError),

    /// Bond perception failed for one step. Local to that step; the caller
    /// chooses whether to retry, skip, or abort.
    #[error("step {step}: bond perception failed: {source}")]
    Perception {
        step: usize,
        #[source]
        source: PerceptionError,
    },
}

impl Error {
    pub fn parse(format: FormatKind, line: usize, details: impl Into<String>) -> Self {
        Self::Parse {
            format,
            line,
            details: details.into(),
        }
    }
}
