use nalgebra::Point3;

/// A single atom of an [`AtomicConfiguration`](super::configuration::AtomicConfiguration).
///
/// The `index` is assigned once by the lattice builder and never changes
/// afterwards: atoms may be removed or displaced, but surviving atoms keep
/// their index so that relaxed coordinates can be matched to the undisplaced
/// reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Stable identifier assigned in lattice order.
    pub index: usize,
    /// Position in the species table of the owning configuration.
    pub species: usize,
    /// Cartesian coordinates in Angstroms, in the dislocation frame.
    pub position: Point3<f64>,
    /// Whether the atom belongs to the fixed boundary shell. The external
    /// relaxation engine is expected to hold these atoms in place.
    pub fixed: bool,
}

impl Atom {
    /// Creates a free (non-fixed) atom.
    ///
    /// # Arguments
    ///
    /// * `index` - The stable lattice index of the atom.
    /// * `species` - Index into the owning configuration's species table.
    /// * `position` - The Cartesian coordinates of the atom.
    pub fn new(index: usize, species: usize, position: Point3<f64>) -> Self {
        Self {
            index,
            species,
            position,
            fixed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_atom_is_not_fixed() {
        let atom = Atom::new(7, 0, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(atom.index, 7);
        assert_eq!(atom.species, 0);
        assert_eq!(atom.position, Point3::new(1.0, 2.0, 3.0));
        assert!(!atom.fixed);
    }

    #[test]
    fn atom_equality_and_clone_works() {
        let mut atom = Atom::new(1, 0, Point3::origin());
        atom.fixed = true;
        assert_eq!(atom.clone(), atom);
    }
}
