//! Trajectory-to-molecule detection engine.
//!
//! Two incompatible on-disk trajectory layouts are supported, selected by
//! [`FormatKind`]:
//!
//! - `bond` — LAMMPS bond tables: every atom line carries its neighbor ids
//!   and fractional bond orders, so bonds are recovered by direct parsing.
//! - `dump` — LAMMPS coordinate dumps with `ITEM:` headers: only positions
//!   are stored, so bonds are recovered by handing each step's coordinates
//!   to a [`BondPerceiver`](perception::BondPerceiver).
//!
//! Neither layout delimits steps explicitly. A one-time header scan over the
//! first two step blocks recovers the atom count, the fixed line stride of
//! one block, and the static per-atom species vector; after that, every step
//! is an independent `stride`-sized slice of the file and can be processed
//! on any worker thread.

pub mod error;
pub mod fingerprint;
pub mod molecule;
pub mod perception;

mod bond_file;
mod config;
mod dump;

use std::fmt;
use std::io::BufRead;
use std::str::FromStr;

use serde::Deserialize;

use crate::model::table::ElementTable;
use crate::model::types::Element;

use error::Error;
use fingerprint::StepFingerprints;
use molecule::StepMolecules;
use perception::BondPerceiver;

pub use bond_file::BondDetector;
pub use config::{DetectConfig, PerceptionConfig};
pub use dump::{DumpDetector, LineKind};

/// On-disk trajectory layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// Explicit neighbor-list format (LAMMPS bond table).
    Bond,
    /// Coordinate-dump format with `ITEM:` headers (LAMMPS dump).
    Dump,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatKind::Bond => write!(f, "bond"),
            FormatKind::Dump => write!(f, "dump"),
        }
    }
}

impl FromStr for FormatKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bond" => Ok(FormatKind::Bond),
            "dump" => Ok(FormatKind::Dump),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// File-wide facts recovered by the one-time header scan.
///
/// `species` is indexed by `atom id - 1` and holds zero-based species type
/// indices; it is fixed for the whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub n_atoms: usize,
    pub stride: usize,
    pub species: Vec<usize>,
}

/// The raw lines of one step block, tagged with the step ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStep {
    pub index: usize,
    pub lines: Vec<String>,
}

/// Iterator slicing a trajectory into consecutive `stride`-sized blocks.
///
/// A trailing partial block is yielded as-is; the step readers report it as
/// an atom-count mismatch instead of dropping it silently.
pub struct StepChunks<R> {
    lines: std::io::Lines<R>,
    stride: usize,
    index: usize,
}

impl<R: BufRead> StepChunks<R> {
    pub fn new(reader: R, stride: usize) -> Self {
        Self {
            lines: reader.lines(),
            stride,
            index: 0,
        }
    }
}

impl<R: BufRead> Iterator for StepChunks<R> {
    type Item = Result<RawStep, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut lines = Vec::with_capacity(self.stride);
        while lines.len() < self.stride {
            match self.lines.next() {
                Some(Ok(line)) => lines.push(line),
                Some(Err(source)) => return Some(Err(Error::Io { source })),
                None => break,
            }
        }
        if lines.is_empty() {
            return None;
        }
        let step = RawStep {
            index: self.index,
            lines,
        };
        self.index += 1;
        Some(Ok(step))
    }
}

/// Undirected per-atom adjacency over zero-based atom indices, plus the
/// bond levels aligned with each atom's own bond list.
///
/// `neighbors` upholds the symmetry invariant: if `j` is listed for `i`,
/// `i` is listed for `j`. `levels[i]` holds one small integer per bond of
/// atom `i` and is consumed by fingerprinting only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondTopology {
    pub neighbors: Vec<Vec<usize>>,
    pub levels: Vec<Vec<u8>>,
}

/// Format-dispatched detection engine.
///
/// Each variant implements the same four operations — header scan
/// (constructor), bond recovery, fingerprint extraction, and molecule
/// assignment — over its own layout.
#[derive(Debug)]
pub enum Detector {
    Bond(BondDetector),
    Dump(DumpDetector),
}

impl Detector {
    /// Scans the header of `reader` and builds the detector for `kind`.
    ///
    /// The dump layout needs a bond perceiver; passing `None` for it is a
    /// configuration error. The bond layout ignores `perceiver`.
    pub fn scan<R: BufRead>(
        kind: FormatKind,
        reader: R,
        table: &ElementTable,
        perceiver: Option<Box<dyn BondPerceiver + Send + Sync>>,
    ) -> Result<Self, Error> {
        match kind {
            FormatKind::Bond => BondDetector::scan(reader, table).map(Detector::Bond),
            FormatKind::Dump => {
                let perceiver = perceiver.ok_or(Error::MissingPerceiver)?;
                DumpDetector::scan(reader, table, perceiver).map(Detector::Dump)
            }
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Detector::Bond(d) => d.header(),
            Detector::Dump(d) => d.header(),
        }
    }

    #[inline]
    pub fn n_atoms(&self) -> usize {
        self.header().n_atoms
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.header().stride
    }

    /// Per-atom elements resolved once from the header species vector.
    pub fn elements(&self) -> &[Element] {
        match self {
            Detector::Bond(d) => d.elements(),
            Detector::Dump(d) => d.elements(),
        }
    }

    /// Chunks a fresh reader over the same file into step blocks.
    pub fn steps<R: BufRead>(&self, reader: R) -> StepChunks<R> {
        StepChunks::new(reader, self.stride())
    }

    /// Recovers the bond topology of one step.
    pub fn bonds(&self, step: &RawStep) -> Result<BondTopology, Error> {
        match self {
            Detector::Bond(d) => d.bonds(step),
            Detector::Dump(d) => d.bonds(step),
        }
    }

    /// Groups the step's atoms by bond-type fingerprint.
    pub fn fingerprints(&self, step: &RawStep) -> Result<StepFingerprints, Error> {
        match self {
            Detector::Bond(d) => d.fingerprints(step),
            Detector::Dump(d) => d.fingerprints(step),
        }
    }

    /// Partitions the step's atoms into molecules via bond connectivity.
    pub fn molecules(&self, step: &RawStep) -> Result<StepMolecules, Error> {
        match self {
            Detector::Bond(d) => d.molecules(step),
            Detector::Dump(d) => d.molecules(step),
        }
    }
}

/// Resolves the header species vector against the element table, failing on
/// any species index the table does not cover.
pub(crate) fn resolve_elements(
    header: &Header,
    table: &ElementTable,
) -> Result<Vec<Element>, Error> {
    header
        .species
        .iter()
        .map(|&species| {
            table.get(species).ok_or(Error::UnknownSpecies {
                species,
                table_len: table.len(),
            })
        })
        .collect()
}

/// Parses token `pos` of a whitespace-split line, mapping absence and parse
/// failure alike to a positioned parse error.
pub(crate) fn parse_token<T: FromStr>(
    tokens: &[&str],
    pos: usize,
    format: FormatKind,
    line: usize,
    what: &str,
) -> Result<T, Error> {
    tokens
        .get(pos)
        .and_then(|tok| tok.parse().ok())
        .ok_or_else(|| Error::parse(format, line, format!("invalid or missing {what}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn detector_is_shareable_across_threads() {
        assert_send_sync::<Detector>();
        assert_send_sync::<Header>();
        assert_send_sync::<ElementTable>();
    }

    #[test]
    fn format_kind_from_str() {
        assert_eq!("bond".parse::<FormatKind>().unwrap(), FormatKind::Bond);
        assert_eq!("dump".parse::<FormatKind>().unwrap(), FormatKind::Dump);
        let err = "xyz".parse::<FormatKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(s) if s == "xyz"));
    }

    #[test]
    fn format_kind_display() {
        assert_eq!(FormatKind::Bond.to_string(), "bond");
        assert_eq!(FormatKind::Dump.to_string(), "dump");
    }

    #[test]
    fn chunks_whole_blocks() {
        let data = "a\nb\nc\nd\ne\nf\n";
        let chunks: Vec<_> = StepChunks::new(Cursor::new(data), 3)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].lines, vec!["a", "b", "c"]);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].lines, vec!["d", "e", "f"]);
    }

    #[test]
    fn yields_trailing_partial_block() {
        let data = "a\nb\nc\nd\n";
        let chunks: Vec<_> = StepChunks::new(Cursor::new(data), 3)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].lines, vec!["d"]);
    }

    #[test]
    fn dump_scan_without_perceiver_is_a_config_error() {
        let table = ElementTable::from_symbols(&["C"]).unwrap();
        let result = Detector::scan(FormatKind::Dump, Cursor::new(""), &table, None);
        assert!(matches!(result, Err(Error::MissingPerceiver)));
    }
}
