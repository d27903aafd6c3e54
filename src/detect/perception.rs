//! Bond-perception service boundary.
//!
//! The coordinate-dump path cannot read bonds off the file, so it delegates
//! to an external perception service: elements and positions go in, a table
//! of (i, j, order) triples comes out. The service is modeled behind the
//! narrow [`BondPerceiver`] trait so detection logic can be tested against
//! a fixed in-memory table ([`TablePerceiver`]) instead of a real
//! cheminformatics toolkit.
//!
//! [`ObabelPerceiver`] is the production implementation: it pipes the step
//! through an Open Babel style converter command and parses the
//! `@<TRIPOS>BOND` section of the resulting MOL2 document. Aromatic bonds
//! come back as the `ar` token and are mapped to level
//! [`AROMATIC_BOND_LEVEL`] so they can never collide with an ordinary
//! integer order.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::model::types::Element;

/// Bond level standing in for the aromatic sentinel.
pub const AROMATIC_BOND_LEVEL: u8 = 9;

#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("failed to launch bond perception command '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O with bond perception command failed: {source}")]
    ChildIo {
        #[source]
        source: std::io::Error,
    },

    #[error("bond perception timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("bond perception command exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("unparsable bond table output: {details} (at line ~{line})")]
    Output { line: usize, details: String },

    #[error("bond table references atom index {index} beyond {n_atoms} atoms")]
    IndexOutOfRange { index: usize, n_atoms: usize },
}

impl PerceptionError {
    pub fn output(line: usize, details: impl Into<String>) -> Self {
        Self::Output {
            line,
            details: details.into(),
        }
    }
}

/// Bond order as reported by the perception service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerceivedOrder {
    Order(u8),
    Aromatic,
}

impl PerceivedOrder {
    /// The bond level used in fingerprints; aromatic maps to
    /// [`AROMATIC_BOND_LEVEL`].
    #[inline]
    pub fn level(&self) -> u8 {
        match self {
            PerceivedOrder::Order(n) => *n,
            PerceivedOrder::Aromatic => AROMATIC_BOND_LEVEL,
        }
    }
}

/// One perceived bond over zero-based indices into the submitted atom set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerceivedBond {
    pub i: usize,
    pub j: usize,
    pub order: PerceivedOrder,
}

/// The perception boundary: elements, positions, and box edges in, bond
/// triples out.
///
/// Implementations must behave as a pure function of their input: the same
/// atoms in the same order yield the same table. Failures are recoverable
/// per step; the caller decides whether to retry or skip.
pub trait BondPerceiver {
    fn perceive(
        &self,
        elements: &[Element],
        positions: &[[f64; 3]],
        box_edges: [f64; 3],
    ) -> Result<Vec<PerceivedBond>, PerceptionError>;
}

/// Deterministic perceiver returning a fixed bond table.
///
/// Useful in tests and for callers that computed bonds elsewhere.
#[derive(Debug, Clone, Default)]
pub struct TablePerceiver {
    bonds: Vec<PerceivedBond>,
}

impl TablePerceiver {
    pub fn new(bonds: Vec<PerceivedBond>) -> Self {
        Self { bonds }
    }
}

impl BondPerceiver for TablePerceiver {
    fn perceive(
        &self,
        _elements: &[Element],
        _positions: &[[f64; 3]],
        _box_edges: [f64; 3],
    ) -> Result<Vec<PerceivedBond>, PerceptionError> {
        Ok(self.bonds.clone())
    }
}

const BOND_SECTION: &str = "@<TRIPOS>BOND";
const SECTION_PREFIX: &str = "@<TRIPOS>";

/// Parses the `@<TRIPOS>BOND` section of a MOL2 document.
///
/// Bond records read `bond_id atom_i atom_j order` with 1-based atom ids;
/// the order token is a small integer or `ar` for aromatic. Anything else
/// is a typed output error rather than a silently skipped record.
pub fn parse_tripos_bonds(mol2: &str) -> Result<Vec<PerceivedBond>, PerceptionError> {
    let mut bonds = Vec::new();
    let mut in_bonds = false;
    for (index, line) in mol2.lines().enumerate() {
        let line_no = index + 1;
        if line.starts_with(SECTION_PREFIX) {
            in_bonds = line.trim_end().eq_ignore_ascii_case(BOND_SECTION);
            continue;
        }
        if !in_bonds {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < 4 {
            return Err(PerceptionError::output(
                line_no,
                "bond record needs an id, two atom ids, and an order",
            ));
        }
        let i: usize = tokens[1]
            .parse()
            .map_err(|_| PerceptionError::output(line_no, "invalid first atom id"))?;
        let j: usize = tokens[2]
            .parse()
            .map_err(|_| PerceptionError::output(line_no, "invalid second atom id"))?;
        if i == 0 || j == 0 {
            return Err(PerceptionError::output(
                line_no,
                "atom ids in bond records are 1-based",
            ));
        }
        let order = parse_order(tokens[3], line_no)?;
        bonds.push(PerceivedBond {
            i: i - 1,
            j: j - 1,
            order,
        });
    }
    Ok(bonds)
}

fn parse_order(token: &str, line_no: usize) -> Result<PerceivedOrder, PerceptionError> {
    if token == "ar" {
        return Ok(PerceivedOrder::Aromatic);
    }
    token
        .parse::<u8>()
        .map(PerceivedOrder::Order)
        .map_err(|_| PerceptionError::output(line_no, format!("unsupported bond order token '{token}'")))
}

/// Perceiver backed by an Open Babel style converter subprocess.
///
/// The step is serialized as XYZ text, piped through
/// `<program> -ixyz -omol2`, and the bond table is read from the MOL2
/// output. An optional deadline bounds the call; on expiry the child is
/// killed and the step fails with [`PerceptionError::Timeout`].
///
/// XYZ carries no periodic cell, so the box edges are not forwarded to the
/// converter.
#[derive(Debug, Clone)]
pub struct ObabelPerceiver {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ObabelPerceiver {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("obabel"),
            timeout: None,
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn convert(&self, xyz: &str) -> Result<String, PerceptionError> {
        let program = self.program.display().to_string();
        let mut child = Command::new(&self.program)
            .args(["-ixyz", "-omol2"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PerceptionError::Launch { program, source })?;

        // Drain both output pipes on their own threads before feeding
        // stdin, otherwise a chatty child can fill a pipe and deadlock.
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(xyz.as_bytes())
                .map_err(|source| PerceptionError::ChildIo { source })?;
        }

        let status = self.wait(&mut child)?;
        let stdout = join_reader(stdout);
        let stderr = join_reader(stderr);

        if !status.success() {
            return Err(PerceptionError::Failed { status, stderr });
        }
        Ok(stdout)
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, PerceptionError> {
        let Some(timeout) = self.timeout else {
            return child
                .wait()
                .map_err(|source| PerceptionError::ChildIo { source });
        };
        let deadline = Instant::now() + timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(PerceptionError::Timeout { timeout });
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                Err(source) => return Err(PerceptionError::ChildIo { source }),
            }
        }
    }
}

impl Default for ObabelPerceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl BondPerceiver for ObabelPerceiver {
    fn perceive(
        &self,
        elements: &[Element],
        positions: &[[f64; 3]],
        _box_edges: [f64; 3],
    ) -> Result<Vec<PerceivedBond>, PerceptionError> {
        let xyz = to_xyz(elements, positions);
        let mol2 = self.convert(&xyz)?;
        parse_tripos_bonds(&mol2)
    }
}

/// Serializes the step in the fixed-width XYZ layout the converter's column
/// parser expects.
pub(crate) fn to_xyz(elements: &[Element], positions: &[[f64; 3]]) -> String {
    let mut out = format!("{}\ntraj-detect\n", elements.len());
    for (element, pos) in elements.iter().zip(positions.iter()) {
        out.push_str(&format!(
            "{:2} {:22.15} {:22.15} {:22.15}\n",
            element.symbol(),
            pos[0],
            pos[1],
            pos[2]
        ));
    }
    out
}

fn spawn_reader<R: std::io::Read + Send + 'static>(
    source: Option<R>,
) -> Option<thread::JoinHandle<String>> {
    source.map(|mut reader| {
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = reader.read_to_string(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BENZENE_FRAGMENT: &str = "\
@<TRIPOS>MOLECULE
traj-detect
3 3 0 0 0
SMALL
GASTEIGER

@<TRIPOS>ATOM
      1 C           0.0000    1.3960    0.0000 C.ar    1  UNL1        0.0000
      2 C           1.2090    0.6980    0.0000 C.ar    1  UNL1        0.0000
      3 H           1.2090   -0.6980    0.0000 H       1  UNL1        0.0000
@<TRIPOS>BOND
     1     1     2   ar
     2     2     3    1
";

    #[test]
    fn parses_bond_section_only() {
        let bonds = parse_tripos_bonds(BENZENE_FRAGMENT).unwrap();
        assert_eq!(
            bonds,
            vec![
                PerceivedBond {
                    i: 0,
                    j: 1,
                    order: PerceivedOrder::Aromatic,
                },
                PerceivedBond {
                    i: 1,
                    j: 2,
                    order: PerceivedOrder::Order(1),
                },
            ]
        );
    }

    #[test]
    fn aromatic_maps_to_level_nine() {
        assert_eq!(PerceivedOrder::Aromatic.level(), AROMATIC_BOND_LEVEL);
        assert_eq!(PerceivedOrder::Order(2).level(), 2);
    }

    #[test]
    fn empty_document_has_no_bonds() {
        assert_eq!(parse_tripos_bonds("").unwrap(), Vec::new());
        assert_eq!(
            parse_tripos_bonds("@<TRIPOS>MOLECULE\nname\n").unwrap(),
            Vec::new()
        );
    }

    #[test]
    fn rejects_unsupported_order_token() {
        let doc = "@<TRIPOS>BOND\n1 1 2 am\n";
        let err = parse_tripos_bonds(doc).unwrap_err();
        assert!(matches!(err, PerceptionError::Output { line: 2, .. }));
    }

    #[test]
    fn rejects_short_bond_record() {
        let doc = "@<TRIPOS>BOND\n1 1 2\n";
        let err = parse_tripos_bonds(doc).unwrap_err();
        assert!(matches!(err, PerceptionError::Output { line: 2, .. }));
    }

    #[test]
    fn rejects_zero_atom_id() {
        let doc = "@<TRIPOS>BOND\n1 0 2 1\n";
        let err = parse_tripos_bonds(doc).unwrap_err();
        assert!(matches!(err, PerceptionError::Output { line: 2, .. }));
    }

    #[test]
    fn stops_at_next_section() {
        let doc = "@<TRIPOS>BOND\n1 1 2 1\n@<TRIPOS>SUBSTRUCTURE\nnot a bond line\n";
        let bonds = parse_tripos_bonds(doc).unwrap();
        assert_eq!(bonds.len(), 1);
    }

    #[test]
    fn xyz_layout_is_fixed_width() {
        let xyz = to_xyz(
            &[Element::C, Element::H],
            &[[0.0, 0.0, 0.0], [1.09, 0.0, 0.0]],
        );
        let lines: Vec<&str> = xyz.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "2");
        assert_eq!(lines[1], "traj-detect");
        assert!(lines[2].starts_with("C "));
        assert!(lines[3].starts_with("H "));
        assert!(lines[2].contains("0.000000000000000"));
        assert!(lines[3].contains("1.090000000000000"));
    }

    #[test]
    fn table_perceiver_echoes_its_table() {
        let bond = PerceivedBond {
            i: 0,
            j: 1,
            order: PerceivedOrder::Order(3),
        };
        let perceiver = TablePerceiver::new(vec![bond]);
        let out = perceiver
            .perceive(&[Element::C, Element::C], &[[0.0; 3], [1.2; 3]], [10.0; 3])
            .unwrap();
        assert_eq!(out, vec![bond]);
    }
}
