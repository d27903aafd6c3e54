//! LAMMPS coordinate-dump trajectory format (the `dump` kind).
//!
//! Dump files interleave `ITEM:` header lines with data lines; the header
//! kind in effect decides how each data line is read. Only coordinates are
//! stored, so per-step bonds are inferred by handing the atom set to a
//! [`BondPerceiver`].

use std::fmt;
use std::io::BufRead;

use super::error::Error;
use super::fingerprint::{self, StepFingerprints};
use super::molecule::{self, StepMolecules};
use super::perception::{BondPerceiver, PerceptionError};
use super::{parse_token, BondTopology, FormatKind, Header, RawStep};
use crate::model::atom::Atom;
use crate::model::step::StepBlock;
use crate::model::table::ElementTable;
use crate::model::types::Element;

const ITEM_PREFIX: &str = "ITEM:";

/// Classification of a dump header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Timestep,
    Atoms,
    Number,
    Box,
    Other,
}

impl LineKind {
    /// Classifies a line by its `ITEM:` sentinel. Total over all strings:
    /// anything without a recognized sentinel is `Other`.
    pub fn classify(line: &str) -> LineKind {
        if line.starts_with("ITEM: TIMESTEP") {
            LineKind::Timestep
        } else if line.starts_with("ITEM: ATOMS") {
            LineKind::Atoms
        } else if line.starts_with("ITEM: NUMBER OF ATOMS") {
            LineKind::Number
        } else if line.starts_with("ITEM: BOX") {
            LineKind::Box
        } else {
            LineKind::Other
        }
    }
}

/// Detector over the coordinate-dump layout.
pub struct DumpDetector {
    header: Header,
    elements: Vec<Element>,
    table: ElementTable,
    perceiver: Box<dyn BondPerceiver + Send + Sync>,
}

impl fmt::Debug for DumpDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DumpDetector")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl DumpDetector {
    /// Scans the first two step blocks and resolves per-atom elements.
    pub fn scan<R: BufRead>(
        reader: R,
        table: &ElementTable,
        perceiver: Box<dyn BondPerceiver + Send + Sync>,
    ) -> Result<Self, Error> {
        let header = scan_header(reader)?;
        let elements = super::resolve_elements(&header, table)?;
        Ok(Self {
            header,
            elements,
            table: table.clone(),
            perceiver,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Parses one step block into its atom set, box, and timestep.
    pub fn read_step(&self, step: &RawStep) -> Result<StepBlock, Error> {
        read_step(step, &self.header, &self.table)
    }

    pub fn bonds(&self, step: &RawStep) -> Result<BondTopology, Error> {
        let block = self.read_step(step)?;
        infer_bonds(step.index, &block, self.perceiver.as_ref())
    }

    pub fn fingerprints(&self, step: &RawStep) -> Result<StepFingerprints, Error> {
        let topology = self.bonds(step)?;
        Ok(StepFingerprints {
            step: step.index,
            groups: fingerprint::group_by_fingerprint(&self.elements, &topology.levels),
        })
    }

    /// Assigns molecules and also hands back the parsed atom set, since the
    /// caller has already paid for the coordinate parse.
    pub fn molecules(&self, step: &RawStep) -> Result<StepMolecules, Error> {
        let block = self.read_step(step)?;
        let topology = infer_bonds(step.index, &block, self.perceiver.as_ref())?;
        Ok(StepMolecules {
            step: step.index,
            molecules: molecule::assign_molecules(&topology.neighbors),
            atoms: Some(block),
        })
    }
}

/// Scans for the first two `NUMBER OF ATOMS` data lines, recording the atom
/// count and the first block's species assignments along the way.
pub(crate) fn scan_header<R: BufRead>(reader: R) -> Result<Header, Error> {
    let mut section = LineKind::Other;
    let mut seen_item = false;
    let mut first_boundary: Option<usize> = None;
    let mut second_boundary: Option<usize> = None;
    let mut n_atoms = 0usize;
    let mut species: Option<Vec<usize>> = None;

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = index + 1;
        if line.starts_with(ITEM_PREFIX) {
            section = LineKind::classify(&line);
            seen_item = true;
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if !seen_item {
            return Err(Error::parse(
                FormatKind::Dump,
                line_no,
                "data line before the first ITEM header",
            ));
        }
        match section {
            LineKind::Number => {
                if first_boundary.is_some() {
                    second_boundary = Some(index);
                    break;
                }
                first_boundary = Some(index);
                let tokens: Vec<&str> = line.split_whitespace().collect();
                n_atoms = parse_token(&tokens, 0, FormatKind::Dump, line_no, "atom count")?;
                species = Some(vec![0; n_atoms]);
            }
            LineKind::Atoms => {
                let species = species.as_mut().ok_or_else(|| {
                    Error::parse(
                        FormatKind::Dump,
                        line_no,
                        "ATOMS record before NUMBER OF ATOMS",
                    )
                })?;
                let tokens: Vec<&str> = line.split_whitespace().collect();
                let id: usize = parse_token(&tokens, 0, FormatKind::Dump, line_no, "atom id")?;
                let ty: usize =
                    parse_token(&tokens, 1, FormatKind::Dump, line_no, "species type")?;
                if id == 0 || id > n_atoms {
                    return Err(Error::parse(
                        FormatKind::Dump,
                        line_no,
                        format!("atom id {id} is outside 1..={n_atoms}"),
                    ));
                }
                if ty == 0 {
                    return Err(Error::parse(
                        FormatKind::Dump,
                        line_no,
                        "species type must be positive",
                    ));
                }
                species[id - 1] = ty - 1;
            }
            _ => {}
        }
    }

    match (first_boundary, second_boundary, species) {
        (Some(first), Some(second), Some(species)) => Ok(Header {
            n_atoms,
            stride: second - first,
            species,
        }),
        _ => Err(Error::MissingStepBoundary {
            format: FormatKind::Dump,
        }),
    }
}

/// Drives the section state machine over one step block.
///
/// Atoms may arrive in any id order; the result is sorted ascending. The
/// atom count, id uniqueness, id range, box edge count, and presence of a
/// timestep are all enforced.
pub(crate) fn read_step(
    step: &RawStep,
    header: &Header,
    table: &ElementTable,
) -> Result<StepBlock, Error> {
    let n = header.n_atoms;
    let mut section = LineKind::Other;
    let mut seen_item = false;
    let mut timestep: Option<i64> = None;
    let mut box_edges: Vec<f64> = Vec::with_capacity(3);
    let mut atoms: Vec<Atom> = Vec::with_capacity(n);
    let mut seen = vec![false; n];

    for (offset, line) in step.lines.iter().enumerate() {
        let line_no = step.index * header.stride + offset + 1;
        if line.starts_with(ITEM_PREFIX) {
            section = LineKind::classify(line);
            seen_item = true;
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }
        if !seen_item {
            return Err(Error::parse(
                FormatKind::Dump,
                line_no,
                "data line before the first ITEM header",
            ));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match section {
            LineKind::Timestep => {
                timestep = Some(parse_token(
                    &tokens,
                    0,
                    FormatKind::Dump,
                    line_no,
                    "timestep",
                )?);
            }
            LineKind::Box => {
                let lo: f64 = parse_token(&tokens, 0, FormatKind::Dump, line_no, "box lower bound")?;
                let hi: f64 = parse_token(&tokens, 1, FormatKind::Dump, line_no, "box upper bound")?;
                box_edges.push(hi - lo);
            }
            LineKind::Atoms => {
                let id: usize = parse_token(&tokens, 0, FormatKind::Dump, line_no, "atom id")?;
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
                let ty: usize =
                    parse_token(&tokens, 1, FormatKind::Dump, line_no, "species type")?;
                if ty == 0 {
                    return Err(Error::parse(
                        FormatKind::Dump,
                        line_no,
                        "species type must be positive",
                    ));
                }
                let element = table.get(ty - 1).ok_or(Error::UnknownSpecies {
                    species: ty - 1,
                    table_len: table.len(),
                })?;
                let x: f64 = parse_token(&tokens, 2, FormatKind::Dump, line_no, "x coordinate")?;
                let y: f64 = parse_token(&tokens, 3, FormatKind::Dump, line_no, "y coordinate")?;
                let z: f64 = parse_token(&tokens, 4, FormatKind::Dump, line_no, "z coordinate")?;
                atoms.push(Atom::new(id, element, [x, y, z]));
            }
            LineKind::Number | LineKind::Other => {}
        }
    }

    if atoms.len() != n {
        return Err(Error::AtomCountMismatch {
            step: step.index,
            expected: n,
            found: atoms.len(),
        });
    }
    let first_line = step.index * header.stride + 1;
    let timestep = timestep.ok_or_else(|| {
        Error::parse(
            FormatKind::Dump,
            first_line,
            "step block carries no TIMESTEP record",
        )
    })?;
    if box_edges.len() != 3 {
        return Err(Error::parse(
            FormatKind::Dump,
            first_line,
            format!("expected 3 box bound lines, found {}", box_edges.len()),
        ));
    }
    atoms.sort_by_key(|a| a.id);
    Ok(StepBlock {
        timestep,
        box_edges: [box_edges[0], box_edges[1], box_edges[2]],
        atoms,
    })
}

/// Hands the step's atoms to the perceiver and folds the returned bond
/// table into an undirected adjacency with per-endpoint bond levels.
pub(crate) fn infer_bonds(
    step_index: usize,
    block: &StepBlock,
    perceiver: &dyn BondPerceiver,
) -> Result<BondTopology, Error> {
    let n = block.atoms.len();
    let elements: Vec<Element> = block.atoms.iter().map(|a| a.element).collect();
    let positions: Vec<[f64; 3]> = block.atoms.iter().map(|a| a.position).collect();
    let bonds = perceiver
        .perceive(&elements, &positions, block.box_edges)
        .map_err(|source| Error::Perception {
            step: step_index,
            source,
        })?;

    let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut levels: Vec<Vec<u8>> = vec![Vec::new(); n];
    for bond in &bonds {
        if bond.i >= n || bond.j >= n {
            return Err(Error::Perception {
                step: step_index,
                source: PerceptionError::IndexOutOfRange {
                    index: bond.i.max(bond.j),
                    n_atoms: n,
                },
            });
        }
        let level = bond.order.level();
        neighbors[bond.i].push(bond.j);
        neighbors[bond.j].push(bond.i);
        levels[bond.i].push(level);
        levels[bond.j].push(level);
    }
    Ok(BondTopology { neighbors, levels })
}
