//! A pure Rust library for turning raw molecular-dynamics trajectories into
//! per-atom, per-step labeled data for machine-learning training sets. For
//! every step it recovers which atoms are bonded, partitions atoms into
//! molecules by connectivity, and computes a compact, hashable bond-type
//! fingerprint per atom.
//!
//! # Features
//!
//! - **Two trajectory layouts** — LAMMPS bond tables (explicit neighbor
//!   lists with fractional bond orders) and LAMMPS coordinate dumps
//!   (`ITEM:` headers, positions only), selected by [`FormatKind`]
//! - **Stride recovery** — a one-time header scan over the first two step
//!   blocks recovers the atom count, the fixed per-step line stride, and
//!   the static species vector; every later step is an independent slice
//! - **Bond perception boundary** — dump input infers bonds through the
//!   narrow [`BondPerceiver`] trait, with an Open Babel subprocess adapter
//!   ([`ObabelPerceiver`]) and an in-memory test double ([`TablePerceiver`])
//! - **Parallel-safe by construction** — detectors are immutable after the
//!   header scan and `Send + Sync`; steps can be processed on any worker
//!
//! # Quick Start
//!
//! Scan a bond-table trajectory, then fingerprint and partition its first
//! step:
//!
//! ```
//! use std::io::Cursor;
//! use traj_detect::{Detector, ElementTable, FormatKind};
//!
//! let data = "\
//! ## Timestep 0
//! ## Number of particles 4
//! 1 1 1 2 1 1.0
//! 2 1 2 1 3 1 1.0 2.0
//! 3 1 2 2 4 1 2.0 1.0
//! 4 1 1 3 1 1.0
//! ## Timestep 10
//! ## Number of particles 4
//! 1 1 1 2 1 1.0
//! 2 1 2 1 3 1 1.0 2.0
//! 3 1 2 2 4 1 2.0 1.0
//! 4 1 1 3 1 1.0
//! ";
//!
//! let table = ElementTable::from_symbols(&["C"])?;
//! let detector = Detector::scan(FormatKind::Bond, Cursor::new(data), &table, None)?;
//! assert_eq!(detector.n_atoms(), 4);
//! assert_eq!(detector.stride(), 6);
//!
//! let mut steps = detector.steps(Cursor::new(data));
//! let step = steps.next().expect("trajectory has a first step")?;
//!
//! // The 1-2-3-4 chain is one molecule.
//! let molecules = detector.molecules(&step)?;
//! assert_eq!(molecules.molecules, vec![vec![1, 2, 3, 4]]);
//!
//! // The two chain-center carbons share the (C, [1, 2]) fingerprint.
//! let prints = detector.fingerprints(&step)?;
//! let centers = prints
//!     .groups
//!     .iter()
//!     .find(|(key, _)| key.to_string() == "C12")
//!     .map(|(_, ids)| ids.clone());
//! assert_eq!(centers, Some(vec![2, 3]));
//! # Ok::<(), traj_detect::Error>(())
//! ```
//!
//! # Module Organization
//!
//! - [`detect`] — the detection engine: format dispatch, header scanning,
//!   step readers, bond recovery, fingerprints, molecule assignment,
//!   perception boundary, configuration
//!
//! # Data Types
//!
//! ## Input
//!
//! - [`ElementTable`] — species type index to [`Element`] mapping
//! - [`FormatKind`] — trajectory layout selection
//! - [`DetectConfig`] — TOML-loadable run configuration
//!
//! ## Per step
//!
//! - [`RawStep`] — one step's raw lines, from [`StepChunks`]
//! - [`StepBlock`] — parsed atoms, box, and timestep (dump only)
//! - [`BondTopology`] — undirected adjacency plus bond levels
//! - [`StepFingerprints`] — fingerprint key to atom-id grouping
//! - [`StepMolecules`] — the molecule partition
//!
//! ## Perception boundary
//!
//! - [`BondPerceiver`] — elements + positions + box in, bond triples out
//! - [`PerceivedBond`] / [`PerceivedOrder`] — the returned triples
//! - [`AROMATIC_BOND_LEVEL`] — the aromatic sentinel's numeric level

mod model;

pub mod detect;

pub use model::atom::Atom;
pub use model::step::StepBlock;
pub use model::table::ElementTable;
pub use model::types::{Element, ParseElementError};

pub use detect::error::Error;
pub use detect::fingerprint::{group_by_fingerprint, Fingerprint, StepFingerprints};
pub use detect::molecule::{assign_molecules, StepMolecules};
pub use detect::perception::{
    parse_tripos_bonds, BondPerceiver, ObabelPerceiver, PerceivedBond, PerceivedOrder,
    PerceptionError, TablePerceiver, AROMATIC_BOND_LEVEL,
};
pub use detect::{
    BondDetector, BondTopology, DetectConfig, Detector, DumpDetector, FormatKind, Header,
    LineKind, PerceptionConfig, RawStep, StepChunks,
};
