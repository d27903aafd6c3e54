use super::types::Element;

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// 1-based atom id as written in the trajectory.
    pub id: usize,
    pub element: Element,
    pub position: [f64; 3],
}

impl Atom {
    pub fn new(id: usize, element: Element, position: [f64; 3]) -> Self {
        Self {
            id,
            element,
            position,
        }
    }
}
