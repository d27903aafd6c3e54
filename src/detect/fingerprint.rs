//! Bond-type fingerprints: the canonical (element, sorted bond orders) key
//! used to bucket chemically-equivalent atom observations.

use std::collections::HashMap;
use std::fmt;

use crate::model::types::Element;

/// Canonical per-atom bond-type key.
///
/// The order list is sorted at construction, so two atoms with the same
/// multiset of bond orders compare equal no matter how their neighbors were
/// enumerated. Changing a single order value or the element yields a
/// different key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    element: Element,
    orders: Vec<u8>,
}

impl Fingerprint {
    pub fn new(element: Element, mut orders: Vec<u8>) -> Self {
        orders.sort_unstable();
        Self { element, orders }
    }

    #[inline]
    pub fn element(&self) -> Element {
        self.element
    }

    #[inline]
    pub fn orders(&self) -> &[u8] {
        &self.orders
    }
}

impl fmt::Display for Fingerprint {
    /// Compact class label: the element symbol followed by the sorted
    /// orders, e.g. `C112` for a carbon with bonds of order 1, 1, and 2.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.element.symbol())?;
        for order in &self.orders {
            write!(f, "{order}")?;
        }
        Ok(())
    }
}

/// Fingerprint grouping of one step, tagged with the step ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFingerprints {
    pub step: usize,
    pub groups: HashMap<Fingerprint, Vec<usize>>,
}

/// Groups atoms by fingerprint.
///
/// `elements` and `levels` are parallel, indexed by zero-based atom index;
/// the returned id lists are 1-based and ascending because atoms are
/// visited in index order.
pub fn group_by_fingerprint(
    elements: &[Element],
    levels: &[Vec<u8>],
) -> HashMap<Fingerprint, Vec<usize>> {
    let mut groups: HashMap<Fingerprint, Vec<usize>> = HashMap::new();
    for (index, (element, orders)) in elements.iter().zip(levels.iter()).enumerate() {
        let key = Fingerprint::new(*element, orders.clone());
        groups.entry(key).or_default().push(index + 1);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_under_neighbor_permutation() {
        let a = Fingerprint::new(Element::C, vec![1, 2, 1]);
        let b = Fingerprint::new(Element::C, vec![2, 1, 1]);
        assert_eq!(a, b);
        assert_eq!(a.orders(), &[1, 1, 2]);
    }

    #[test]
    fn sensitive_to_order_value_and_element() {
        let base = Fingerprint::new(Element::C, vec![1, 2]);
        assert_ne!(base, Fingerprint::new(Element::C, vec![1, 3]));
        assert_ne!(base, Fingerprint::new(Element::N, vec![1, 2]));
    }

    #[test]
    fn display_is_symbol_then_sorted_orders() {
        let key = Fingerprint::new(Element::C, vec![2, 1, 1]);
        assert_eq!(key.to_string(), "C112");
        let aromatic = Fingerprint::new(Element::N, vec![9, 9, 1]);
        assert_eq!(aromatic.to_string(), "N199");
    }

    #[test]
    fn groups_atom_ids_ascending() {
        let elements = [Element::C, Element::H, Element::C, Element::H];
        let levels = vec![vec![1, 2], vec![1], vec![2, 1], vec![1]];
        let groups = group_by_fingerprint(&elements, &levels);
        assert_eq!(groups.len(), 2);
        assert_eq!(
            groups[&Fingerprint::new(Element::C, vec![1, 2])],
            vec![1, 3]
        );
        assert_eq!(groups[&Fingerprint::new(Element::H, vec![1])], vec![2, 4]);
    }

    #[test]
    fn bondless_atom_gets_empty_key() {
        let elements = [Element::Ar];
        let levels = vec![Vec::new()];
        let groups = group_by_fingerprint(&elements, &levels);
        assert_eq!(groups[&Fingerprint::new(Element::Ar, Vec::new())], vec![1]);
        assert_eq!(
            Fingerprint::new(Element::Ar, Vec::new()).to_string(),
            "Ar"
        );
    }
}
