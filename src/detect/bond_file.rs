//! LAMMPS bond-table trajectory format (the `bond` kind).
//!
//! Every step block opens with comment lines, one of which is the repeated
//! `# Number of particles N` boundary marker, followed by one line per atom:
//! the atom id, its species type, the neighbor count, the neighbor ids, and
//! the fractional bond orders. Bonds are recovered by direct parsing; no
//! external perception is involved.

use std::io::BufRead;

use super::error::Error;
use super::fingerprint::{self, StepFingerprints};
use super::molecule::{self, StepMolecules};
use super::{parse_token, BondTopology, FormatKind, Header, RawStep};
use crate::model::table::ElementTable;
use crate::model::types::Element;

const BOUNDARY_MARKER: &str = "# Number of particles";

/// Detector over the explicit neighbor-list layout.
#[derive(Debug)]
pub struct BondDetector {
    header: Header,
    elements: Vec<Element>,
}

impl BondDetector {
    /// Scans the first two step blocks and resolves per-atom elements.
    pub fn scan<R: BufRead>(reader: R, table: &ElementTable) -> Result<Self, Error> {
        let header = scan_header(reader)?;
        let elements = super::resolve_elements(&header, table)?;
        Ok(Self { header, elements })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn bonds(&self, step: &RawStep) -> Result<BondTopology, Error> {
        read_bonds(step, &self.header)
    }

    pub fn fingerprints(&self, step: &RawStep) -> Result<StepFingerprints, Error> {
        let topology = self.bonds(step)?;
        Ok(StepFingerprints {
            step: step.index,
            groups: fingerprint::group_by_fingerprint(&self.elements, &topology.levels),
        })
    }

    pub fn molecules(&self, step: &RawStep) -> Result<StepMolecules, Error> {
        let topology = self.bonds(step)?;
        Ok(StepMolecules {
            step: step.index,
            molecules: molecule::assign_molecules(&topology.neighbors),
            atoms: None,
        })
    }
}

/// Scans for the first two boundary markers, recording the particle count
/// and the species assignments of the first block along the way.
pub(crate) fn scan_header<R: BufRead>(reader: R) -> Result<Header, Error> {
    let mut first_boundary: Option<usize> = None;
    let mut second_boundary: Option<usize> = None;
    let mut n_atoms = 0usize;
    let mut species: Option<Vec<usize>> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        if line.starts_with('#') {
            if line.starts_with(BOUNDARY_MARKER) {
                if first_boundary.is_some() {
                    second_boundary = Some(index);
                    break;
                }
                first_boundary = Some(index);
                n_atoms = first_integer(&line).ok_or_else(|| {
                    Error::parse(
                        FormatKind::Bond,
                        line_no,
                        "boundary line carries no particle count",
                    )
                })?;
                species = Some(vec![0; n_atoms]);
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        let species = species.as_mut().ok_or_else(|| {
            Error::parse(
                FormatKind::Bond,
                line_no,
                "atom line before the first 'Number of particles' boundary",
            )
        })?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let id: usize = parse_token(&tokens, 0, FormatKind::Bond, line_no, "atom id")?;
        let ty: usize = parse_token(&tokens, 1, FormatKind::Bond, line_no, "species type")?;
        if id == 0 || id > n_atoms {
            return Err(Error::parse(
                FormatKind::Bond,
                line_no,
                format!("atom id {id} is outside 1..={n_atoms}"),
            ));
        }
        if ty == 0 {
            return Err(Error::parse(
                FormatKind::Bond,
                line_no,
                "species type must be positive",
            ));
        }
        species[id - 1] = ty - 1;
    }

    match (first_boundary, second_boundary, species) {
        (Some(first), Some(second), Some(species)) => Ok(Header {
            n_atoms,
            stride: second - first,
            species,
        }),
        _ => Err(Error::MissingStepBoundary {
            format: FormatKind::Bond,
        }),
    }
}

/// Parses one step's bond table into adjacency and bond levels.
///
/// Each atom line reads `id type nbonds` followed by `nbonds` neighbor ids
/// and `nbonds` bond orders. Tables written by LAMMPS carry a molecule-id
/// column between the neighbor and order blocks; plain tables do not. The
/// order offset is derived from the token count so both layouts parse.
pub(crate) fn read_bonds(step: &RawStep, header: &Header) -> Result<BondTopology, Error> {
    let n = header.n_atoms;
    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut levels: Vec<Vec<u8>> = vec![Vec::new(); n];
    let mut seen = vec![false; n];

    for (offset, line) in step.lines.iter().enumerate() {
        let line_no = step.index * header.stride + offset + 1;
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let id: usize = parse_token(&tokens, 0, FormatKind::Bond, line_no, "atom id")?;
        if id == 0 || id > n {
            return Err(Error::AtomIdOutOfRange {
                step: step.index,
                id,
                n_atoms: n,
            });
        }
        if seen[id - 1] {
            return Err(Error::DuplicateAtomId {
                step: step.index,
                id,
            });
        }
        seen[id - 1] = true;

        let nbonds: usize = parse_token(&tokens, 2, FormatKind::Bond, line_no, "bond count")?;
        if tokens.len() < 3 + nbonds {
            return Err(Error::parse(
                FormatKind::Bond,
                line_no,
                format!("expected {nbonds} neighbor ids"),
            ));
        }
        let orders_at = if tokens.len() >= 4 + 2 * nbonds {
            4 + nbonds
        } else {
            3 + nbonds
        };
        if tokens.len() < orders_at + nbonds {
            return Err(Error::parse(
                FormatKind::Bond,
                line_no,
                format!("expected {nbonds} bond orders"),
            ));
        }

        let slot = id - 1;
        for k in 0..nbonds {
            let neighbor: usize =
                parse_token(&tokens, 3 + k, FormatKind::Bond, line_no, "neighbor id")?;
            if neighbor == 0 || neighbor > n {
                return Err(Error::AtomIdOutOfRange {
                    step: step.index,
                    id: neighbor,
                    n_atoms: n,
                });
            }
            let order: f64 =
                parse_token(&tokens, orders_at + k, FormatKind::Bond, line_no, "bond order")?;
            neighbors[slot].push(neighbor - 1);
            levels[slot].push(round_order(order));
        }
    }

    let found = seen.iter().filter(|&&s| s).count();
    if found != n {
        return Err(Error::AtomCountMismatch {
            step: step.index,
            expected: n,
            found,
        });
    }

    symmetrize(&mut neighbors);
    Ok(BondTopology { neighbors, levels })
}

/// First integer token on a line; the particle count on boundary lines.
fn first_integer(line: &str) -> Option<usize> {
    line.split_whitespace().find_map(|tok| tok.parse().ok())
}

/// Rounds a fractional bond order to the nearest integer with a floor of 1:
/// anything that made it into the table counts as at least a single bond.
fn round_order(raw: f64) -> u8 {
    raw.round().max(1.0) as u8
}

/// Adds the reverse direction of any one-sided edge, upholding the
/// undirected adjacency invariant.
fn symmetrize(neighbors: &mut [Vec<usize>]) {
    let mut missing: Vec<(usize, usize)> = Vec::new();
    for (i, list) in neighbors.iter().enumerate() {
        for &j in list {
            if !neighbors[j].contains(&i) {
                missing.push((j, i));
            }
        }
    }
    for (j, i) in missing {
        neighbors[j].push(i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::Element;
    use std::io::Cursor;

    // Two blocks of a 4-atom chain 1-2-3-4 with orders 1.0, 2.0, 1.0 and a
    // molecule-id column between neighbors and orders.
    fn chain_file() -> String {
        let block = "\
# Timestep 0
# Number of particles 4
1 1 1 2 1 1.0
2 1 2 1 3 1 1.0 2.0
3 1 2 2 4 1 2.0 1.0
4 1 1 3 1 1.0
";
        format!("{block}{block}")
    }

    fn chain_step() -> RawStep {
        let lines = chain_file()
            .lines()
            .take(6)
            .map(str::to_string)
            .collect();
        RawStep { index: 0, lines }
    }

    fn chain_header() -> Header {
        Header {
            n_atoms: 4,
            stride: 6,
            species: vec![0; 4],
        }
    }

    #[test]
    fn scan_recovers_stride_and_species() {
        let header = scan_header(Cursor::new(chain_file())).unwrap();
        assert_eq!(header.n_atoms, 4);
        assert_eq!(header.stride, 6);
        assert_eq!(header.species, vec![0, 0, 0, 0]);
    }

    #[test]
    fn scan_maps_species_to_zero_based() {
        let data = "\
# Number of particles 2
1 2 0
2 1 0
# Number of particles 2
1 2 0
2 1 0
";
        let header = scan_header(Cursor::new(data)).unwrap();
        assert_eq!(header.stride, 3);
        assert_eq!(header.species, vec![1, 0]);
    }

    #[test]
    fn scan_fails_without_second_boundary() {
        let data = "\
# Number of particles 2
1 1 0
2 1 0
";
        let err = scan_header(Cursor::new(data)).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingStepBoundary {
                format: FormatKind::Bond
            }
        ));
    }

    #[test]
    fn scan_rejects_atom_line_before_boundary() {
        let data = "1 1 0\n# Number of particles 1\n";
        let err = scan_header(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 1, .. }));
    }

    #[test]
    fn scan_rejects_out_of_range_id() {
        let data = "\
# Number of particles 2
5 1 0
";
        let err = scan_header(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn reads_chain_bonds_and_levels() {
        let topology = read_bonds(&chain_step(), &chain_header()).unwrap();
        assert_eq!(topology.neighbors[0], vec![1]);
        assert_eq!(topology.neighbors[1], vec![0, 2]);
        assert_eq!(topology.neighbors[2], vec![1, 3]);
        assert_eq!(topology.neighbors[3], vec![2]);
        assert_eq!(topology.levels[0], vec![1]);
        assert_eq!(topology.levels[1], vec![1, 2]);
        assert_eq!(topology.levels[2], vec![2, 1]);
        assert_eq!(topology.levels[3], vec![1]);
    }

    #[test]
    fn reads_layout_without_molecule_column() {
        let step = RawStep {
            index: 0,
            lines: vec![
                "# Number of particles 2".to_string(),
                "1 1 1 2 1.0".to_string(),
                "2 1 1 1 1.0".to_string(),
            ],
        };
        let header = Header {
            n_atoms: 2,
            stride: 3,
            species: vec![0, 0],
        };
        let topology = read_bonds(&step, &header).unwrap();
        assert_eq!(topology.neighbors[0], vec![1]);
        assert_eq!(topology.neighbors[1], vec![0]);
    }

    #[test]
    fn rounds_orders_to_nearest_with_floor_one() {
        let step = RawStep {
            index: 0,
            lines: vec![
                "1 1 2 2 3 1 0.4 1.6".to_string(),
                "2 1 1 1 1 0.4".to_string(),
                "3 1 1 1 1 1.6".to_string(),
            ],
        };
        let header = Header {
            n_atoms: 3,
            stride: 3,
            species: vec![0; 3],
        };
        let topology = read_bonds(&step, &header).unwrap();
        assert_eq!(topology.levels[0], vec![1, 2]);
    }

    #[test]
    fn rejects_duplicate_atom_line() {
        let step = RawStep {
            index: 3,
            lines: vec!["1 1 0 1".to_string(), "1 1 0 1".to_string()],
        };
        let header = Header {
            n_atoms: 2,
            stride: 2,
            species: vec![0, 0],
        };
        let err = read_bonds(&step, &header).unwrap_err();
        assert!(matches!(err, Error::DuplicateAtomId { step: 3, id: 1 }));
    }

    #[test]
    fn rejects_truncated_trailing_block() {
        let step = RawStep {
            index: 2,
            lines: vec![
                "# Timestep 20".to_string(),
                "# Number of particles 4".to_string(),
                "1 1 1 2 1 1.0".to_string(),
                "2 1 1 1 1 1.0".to_string(),
            ],
        };
        let err = read_bonds(&step, &chain_header()).unwrap_err();
        assert!(matches!(
            err,
            Error::AtomCountMismatch {
                step: 2,
                expected: 4,
                found: 2
            }
        ));
    }

    #[test]
    fn rejects_out_of_range_neighbor() {
        let step = RawStep {
            index: 0,
            lines: vec!["1 1 1 9 1 1.0".to_string()],
        };
        let header = Header {
            n_atoms: 2,
            stride: 1,
            species: vec![0, 0],
        };
        let err = read_bonds(&step, &header).unwrap_err();
        assert!(matches!(
            err,
            Error::AtomIdOutOfRange {
                id: 9,
                n_atoms: 2,
                ..
            }
        ));
    }

    #[test]
    fn rejects_truncated_bond_line() {
        let step = RawStep {
            index: 0,
            lines: vec!["1 1 3 2".to_string()],
        };
        let header = Header {
            n_atoms: 3,
            stride: 1,
            species: vec![0; 3],
        };
        let err = read_bonds(&step, &header).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn symmetrize_adds_missing_reverse_edges() {
        let mut neighbors = vec![vec![1], vec![], vec![1]];
        symmetrize(&mut neighbors);
        assert_eq!(neighbors[1], vec![0, 2]);
    }

    #[test]
    fn detector_end_to_end_on_chain() {
        let table = ElementTable::from_symbols(&["C"]).unwrap();
        let detector = BondDetector::scan(Cursor::new(chain_file()), &table).unwrap();
        assert_eq!(detector.elements(), &[Element::C; 4]);

        let result = detector.molecules(&chain_step()).unwrap();
        assert_eq!(result.step, 0);
        assert_eq!(result.molecules, vec![vec![1, 2, 3, 4]]);
        assert!(result.atoms.is_none());

        let prints = detector.fingerprints(&chain_step()).unwrap();
        let labels: std::collections::HashMap<String, Vec<usize>> = prints
            .groups
            .iter()
            .map(|(key, ids)| (key.to_string(), ids.clone()))
            .collect();
        assert_eq!(labels["C1"], vec![1, 4]);
        assert_eq!(labels["C12"], vec![2, 3]);
    }
}
