use super::atom::Atom;
use crate::core::crystal::orientation::Axis;
use crate::core::utils::geometry::wrap_symmetric;
use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("Cell matrix is singular")]
    SingularCell,

    #[error("Species index {index} is out of range ({count} species defined)")]
    UnknownSpecies { index: usize, count: usize },

    #[error("Duplicate atom index {0}")]
    DuplicateIndex(usize),

    #[error("Dissociated dislocation must have at least one partial")]
    NoPartials,

    #[error("Invalid kink specification: {0}")]
    InvalidKink(String),
}

/// Boundary condition along one cell axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Boundary {
    #[default]
    Periodic,
    /// Free surface (cluster) boundary; the cell vector only records the extent.
    Open,
}

/// Atoms together with the simulation cell.
///
/// Cell vectors are the columns of `cell`; the cell spans `origin + cell · s`
/// for fractional coordinates `s ∈ [0, 1)³`. All positions are Cartesian and
/// expressed in the dislocation frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicConfiguration {
    cell: Matrix3<f64>,
    inverse_cell: Matrix3<f64>,
    origin: Point3<f64>,
    boundaries: [Boundary; 3],
    species: Vec<String>,
    atoms: Vec<Atom>,
}

impl AtomicConfiguration {
    /// Creates an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SingularCell`] if the cell vectors are linearly
    /// dependent.
    pub fn new(
        cell: Matrix3<f64>,
        origin: Point3<f64>,
        boundaries: [Boundary; 3],
        species: Vec<String>,
    ) -> Result<Self, ModelError> {
        let inverse_cell = cell.try_inverse().ok_or(ModelError::SingularCell)?;
        Ok(Self {
            cell,
            inverse_cell,
            origin,
            boundaries,
            species,
            atoms: Vec::new(),
        })
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn cell_vector(&self, axis: Axis) -> Vector3<f64> {
        self.cell.column(axis.index()).into_owned()
    }

    /// Replaces one cell vector.
    pub fn set_cell_vector(&mut self, axis: Axis, vector: Vector3<f64>) -> Result<(), ModelError> {
        let mut cell = self.cell;
        cell.set_column(axis.index(), &vector);
        self.inverse_cell = cell.try_inverse().ok_or(ModelError::SingularCell)?;
        self.cell = cell;
        Ok(())
    }

    pub fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    pub fn boundaries(&self) -> &[Boundary; 3] {
        &self.boundaries
    }

    pub fn is_periodic(&self, axis: Axis) -> bool {
        self.boundaries[axis.index()] == Boundary::Periodic
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn species_name(&self, atom: &Atom) -> Option<&str> {
        self.species.get(atom.species).map(String::as_str)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Appends an atom.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownSpecies`] if the atom refers to a species
    /// outside the table.
    pub fn push(&mut self, atom: Atom) -> Result<(), ModelError> {
        if atom.species >= self.species.len() {
            return Err(ModelError::UnknownSpecies {
                index: atom.species,
                count: self.species.len(),
            });
        }
        self.atoms.push(atom);
        Ok(())
    }

    /// Keeps only the atoms for which `keep` returns true, preserving order.
    pub fn retain<F: FnMut(&Atom) -> bool>(&mut self, keep: F) {
        self.atoms.retain(keep);
    }

    /// Volume spanned by the cell vectors.
    pub fn volume(&self) -> f64 {
        self.cell.determinant().abs()
    }

    pub fn fractional(&self, position: &Point3<f64>) -> Vector3<f64> {
        self.inverse_cell * (position - self.origin)
    }

    /// Shortest periodic image of a separation vector.
    ///
    /// Only periodic axes are wrapped; separations along open axes are
    /// returned unchanged.
    pub fn minimum_image(&self, separation: &Vector3<f64>) -> Vector3<f64> {
        let mut s = self.inverse_cell * separation;
        for axis in Axis::ALL {
            if self.is_periodic(axis) {
                let i = axis.index();
                s[i] = wrap_symmetric(s[i], 1.0);
            }
        }
        self.cell * s
    }

    /// Maps every atom back into the cell along periodic axes.
    pub fn wrap(&mut self) {
        for atom in &mut self.atoms {
            let mut s = self.inverse_cell * (atom.position - self.origin);
            for axis in Axis::ALL {
                if self.boundaries[axis.index()] == Boundary::Periodic {
                    let i = axis.index();
                    s[i] -= s[i].floor();
                }
            }
            atom.position = self.origin + self.cell * s;
        }
    }

    /// Position in the atom list for each stable atom index.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateIndex`] if two atoms share an index.
    pub fn index_map(&self) -> Result<HashMap<usize, usize>, ModelError> {
        let mut map = HashMap::with_capacity(self.atoms.len());
        for (slot, atom) in self.atoms.iter().enumerate() {
            if map.insert(atom.index, slot).is_some() {
                return Err(ModelError::DuplicateIndex(atom.index));
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_config(boundaries: [Boundary; 3]) -> AtomicConfiguration {
        AtomicConfiguration::new(
            Matrix3::from_diagonal(&Vector3::new(10.0, 20.0, 5.0)),
            Point3::origin(),
            boundaries,
            vec!["Fe".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn singular_cell_is_rejected() {
        let result = AtomicConfiguration::new(
            Matrix3::zeros(),
            Point3::origin(),
            [Boundary::Periodic; 3],
            vec![],
        );
        assert_eq!(result, Err(ModelError::SingularCell));
    }

    #[test]
    fn minimum_image_wraps_only_periodic_axes() {
        let config = box_config([Boundary::Open, Boundary::Open, Boundary::Periodic]);
        let d = config.minimum_image(&Vector3::new(9.0, 15.0, 4.0));
        assert!((d - Vector3::new(9.0, 15.0, -1.0)).norm() < 1e-12);
    }

    #[test]
    fn minimum_image_of_half_cell_does_not_depend_on_image() {
        let config = box_config([Boundary::Open, Boundary::Open, Boundary::Periodic]);
        for z in [-2.5, 2.5, 7.5, -7.5, 12.5] {
            let d = config.minimum_image(&Vector3::new(0.0, 0.0, z));
            assert!((d.z - 2.5).abs() < 1e-12, "{z} -> {}", d.z);
        }
    }

    #[test]
    fn minimum_image_respects_tilted_cell() {
        let mut cell = Matrix3::from_diagonal(&Vector3::new(10.0, 10.0, 10.0));
        cell[(0, 2)] = 2.0;
        let config = AtomicConfiguration::new(
            cell,
            Point3::origin(),
            [Boundary::Open, Boundary::Open, Boundary::Periodic],
            vec!["X".to_string()],
        )
        .unwrap();
        let d = config.minimum_image(&Vector3::new(2.5, 0.0, 9.5));
        assert!((d - Vector3::new(0.5, 0.0, -0.5)).norm() < 1e-12);
    }

    #[test]
    fn wrap_brings_atoms_into_cell() {
        let mut config = box_config([Boundary::Periodic; 3]);
        config
            .push(Atom::new(0, 0, Point3::new(-1.0, 21.0, 12.0)))
            .unwrap();
        config.wrap();
        let p = config.atoms()[0].position;
        assert!((p - Point3::new(9.0, 1.0, 2.0)).norm() < 1e-12);
    }

    #[test]
    fn push_rejects_unknown_species() {
        let mut config = box_config([Boundary::Periodic; 3]);
        let result = config.push(Atom::new(0, 3, Point3::origin()));
        assert_eq!(result, Err(ModelError::UnknownSpecies { index: 3, count: 1 }));
    }

    #[test]
    fn index_map_detects_duplicates() {
        let mut config = box_config([Boundary::Periodic; 3]);
        config.push(Atom::new(4, 0, Point3::origin())).unwrap();
        config.push(Atom::new(9, 0, Point3::origin())).unwrap();
        let map = config.index_map().unwrap();
        assert_eq!(map[&9], 1);

        config.push(Atom::new(4, 0, Point3::origin())).unwrap();
        assert_eq!(config.index_map(), Err(ModelError::DuplicateIndex(4)));
    }

    #[test]
    fn set_cell_vector_updates_inverse() {
        let mut config = box_config([Boundary::Periodic; 3]);
        config
            .set_cell_vector(Axis::X, Vector3::new(12.0, 0.0, 0.0))
            .unwrap();
        let s = config.fractional(&Point3::new(6.0, 0.0, 0.0));
        assert!((s.x - 0.5).abs() < 1e-12);
        assert_eq!(
            config.set_cell_vector(Axis::Y, Vector3::zeros()),
            Err(ModelError::SingularCell)
        );
    }
}
