use std::str::FromStr;

use super::types::{Element, ParseElementError};

/// Immutable mapping from zero-based species type index to chemical element.
///
/// Trajectory files identify atoms by a per-simulation species index rather
/// than by element; the caller supplies this table once before any parsing
/// begins and it is shared read-only for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTable {
    elements: Vec<Element>,
}

impl ElementTable {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn from_symbols<S: AsRef<str>>(symbols: &[S]) -> Result<Self, ParseElementError> {
        let elements = symbols
            .iter()
            .map(|s| Element::from_str(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(elements))
    }

    #[inline]
    pub fn get(&self, species: usize) -> Option<Element> {
        self.elements.get(species).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
