use super::atom::Atom;

/// One trajectory step: its recorded timestep, periodic box edge lengths,
/// and the atom set sorted ascending by atom id.
#[derive(Debug, Clone, PartialEq)]
pub struct StepBlock {
    pub timestep: i64,
    pub box_edges: [f64; 3],
    pub atoms: Vec<Atom>,
}

impl StepBlock {
    #[inline]
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }
}
