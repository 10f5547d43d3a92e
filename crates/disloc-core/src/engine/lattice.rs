use super::config::{Dimensions, Extent};
use super::error::DislocationError;
use crate::core::crystal::orientation::{Axis, CrystalOrientation};
use crate::core::crystal::structure::{Crystal, CrystalError};
use crate::core::models::atom::Atom;
use crate::core::models::configuration::{AtomicConfiguration, Boundary};
use nalgebra::{Matrix3, Point3, Vector3};
use tracing::{debug, instrument};

/// Fractional tolerance for deciding whether a site lies on a cell face.
const FACE_TOLERANCE: f64 = 1e-9;
/// Resolution of the position keys used for sorting.
const SORT_RESOLUTION: f64 = 1e-6;

/// Generates defect-free oriented crystals.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeBuilder {
    crystal: Crystal,
    orientation: CrystalOrientation,
    species: String,
    boundaries: [Boundary; 3],
}

impl LatticeBuilder {
    pub fn new(crystal: Crystal, orientation: CrystalOrientation, species: &str) -> Self {
        Self {
            crystal,
            orientation,
            species: species.to_string(),
            boundaries: [Boundary::Periodic; 3],
        }
    }

    pub fn boundaries(mut self, boundaries: [Boundary; 3]) -> Self {
        self.boundaries = boundaries;
        self
    }

    pub fn boundary_conditions(&self) -> &[Boundary; 3] {
        &self.boundaries
    }

    pub fn crystal(&self) -> &Crystal {
        &self.crystal
    }

    pub fn orientation(&self) -> &CrystalOrientation {
        &self.orientation
    }

    /// Minimal periodic repeat along each cell axis.
    pub fn repeat_lengths(&self) -> Result<[f64; 3], CrystalError> {
        let mut lengths = [0.0; 3];
        for axis in Axis::ALL {
            lengths[axis.index()] = self.crystal.repeat_length(self.orientation.direction(axis))?;
        }
        Ok(lengths)
    }

    /// Cell edge lengths for `dimensions`, always whole repeats.
    pub fn box_lengths(&self, dimensions: &Dimensions) -> Result<[f64; 3], DislocationError> {
        let repeats = self.repeat_lengths()?;
        let mut lengths = [0.0; 3];
        for i in 0..3 {
            let count = match dimensions.extents[i] {
                Extent::Repeats(n) => n,
                Extent::Length(l) => {
                    if !(l > 0.0) {
                        return Err(DislocationError::InvalidInput(format!(
                            "cell length must be positive, got {l}"
                        )));
                    }
                    ((l / repeats[i]) - FACE_TOLERANCE).ceil().max(1.0) as usize
                }
            };
            if count == 0 {
                return Err(DislocationError::InvalidInput(format!(
                    "axis {i} needs at least one repeat"
                )));
            }
            lengths[i] = count as f64 * repeats[i];
        }
        Ok(lengths)
    }

    /// Orthogonal box `[0, L_x) × [0, L_y) × [0, L_z)` aligned with the
    /// orientation axes.
    #[instrument(skip_all, name = "lattice_build")]
    pub fn build(&self, dimensions: &Dimensions) -> Result<AtomicConfiguration, DislocationError> {
        let lengths = self.box_lengths(dimensions)?;
        let cell = Matrix3::from_diagonal(&Vector3::new(lengths[0], lengths[1], lengths[2]));
        self.build_in_cell(&cell)
    }

    /// Every lattice site with fractional coordinates in `[0, 1)³` of `cell`.
    ///
    /// Atoms are sorted by `z`, then `y`, then `x` and indexed in that order.
    ///
    /// # Errors
    ///
    /// Returns [`CrystalError::IncommensurateCell`] when the cell vectors are not
    /// lattice translations, detected as a site count that disagrees with the
    /// cell volume.
    pub fn build_in_cell(&self, cell: &Matrix3<f64>) -> Result<AtomicConfiguration, DislocationError> {
        let mut config = AtomicConfiguration::new(
            *cell,
            Point3::origin(),
            self.boundaries,
            vec![self.species.clone()],
        )?;
        let inverse = cell
            .try_inverse()
            .ok_or(DislocationError::InvalidInput("singular cell".into()))?;
        let rotation = self.orientation.rotation();
        let a = self.crystal.lattice_constant();

        let mut lower = Vector3::repeat(f64::INFINITY);
        let mut upper = Vector3::repeat(f64::NEG_INFINITY);
        for corner in 0..8 {
            let s = Vector3::new(
                (corner & 1) as f64,
                ((corner >> 1) & 1) as f64,
                ((corner >> 2) & 1) as f64,
            );
            let q = rotation.transpose() * (cell * s) / a;
            lower = lower.inf(&q);
            upper = upper.sup(&q);
        }
        let lo = lower.map(|v| v.floor() as i64 - 1);
        let hi = upper.map(|v| v.ceil() as i64 + 1);

        let basis = self.crystal.structure().basis();
        let mut sites = Vec::new();
        for i in lo.x..=hi.x {
            for j in lo.y..=hi.y {
                for k in lo.z..=hi.z {
                    for b in basis {
                        let q = Vector3::new(i as f64 + b[0], j as f64 + b[1], k as f64 + b[2]) * a;
                        let p = rotation * q;
                        let s = inverse * p;
                        if s.iter().all(|&v| v >= -FACE_TOLERANCE && v < 1.0 - FACE_TOLERANCE) {
                            sites.push(Point3::from(p));
                        }
                    }
                }
            }
        }

        let expected = (config.volume() / self.crystal.atomic_volume()).round() as usize;
        if sites.len() != expected {
            return Err(CrystalError::IncommensurateCell {
                expected,
                found: sites.len(),
            }
            .into());
        }

        sites.sort_by_key(|p| {
            [
                (p.z / SORT_RESOLUTION).round() as i64,
                (p.y / SORT_RESOLUTION).round() as i64,
                (p.x / SORT_RESOLUTION).round() as i64,
            ]
        });
        for (index, position) in sites.into_iter().enumerate() {
            config.push(Atom::new(index, 0, position))?;
        }
        debug!(atoms = config.len(), "Lattice generated.");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crystal::structure::CrystalStructure;

    fn bcc_screw_builder() -> LatticeBuilder {
        let crystal = Crystal::new(CrystalStructure::Bcc, 3.0).unwrap();
        let orientation = CrystalOrientation::new([1, 1, -2], [-1, 1, 0], [1, 1, 1]).unwrap();
        LatticeBuilder::new(crystal, orientation, "Fe")
    }

    #[test]
    fn cubic_cell_has_basis_times_repeats_atoms() {
        for (structure, per_cell) in [
            (CrystalStructure::SimpleCubic, 1),
            (CrystalStructure::Bcc, 2),
            (CrystalStructure::Fcc, 4),
            (CrystalStructure::Diamond, 8),
        ] {
            let crystal = Crystal::new(structure, 2.0).unwrap();
            let builder = LatticeBuilder::new(crystal, CrystalOrientation::cubic(), "X");
            let config = builder.build(&Dimensions::repeats([2, 3, 4])).unwrap();
            assert_eq!(config.len(), 24 * per_cell, "{structure}");
        }
    }

    #[test]
    fn oriented_bcc_cell_matches_volume() {
        let builder = bcc_screw_builder();
        let config = builder.build(&Dimensions::repeats([3, 5, 2])).unwrap();
        let a: f64 = 3.0;
        let volume = (3.0 * a * 6f64.sqrt()) * (5.0 * a * 2f64.sqrt()) * (2.0 * a * 3f64.sqrt() / 2.0);
        let expected = (volume / (a.powi(3) / 2.0)).round() as usize;
        assert_eq!(config.len(), expected);
    }

    #[test]
    fn atoms_are_sorted_and_indexed() {
        let config = bcc_screw_builder()
            .build(&Dimensions::repeats([2, 2, 2]))
            .unwrap();
        for (slot, atom) in config.atoms().iter().enumerate() {
            assert_eq!(atom.index, slot);
        }
        for pair in config.atoms().windows(2) {
            let (p, q) = (pair[0].position, pair[1].position);
            assert!(p.z <= q.z + SORT_RESOLUTION);
        }
    }

    #[test]
    fn build_is_deterministic() {
        let builder = bcc_screw_builder();
        let first = builder.build(&Dimensions::repeats([2, 3, 1])).unwrap();
        let second = builder.build(&Dimensions::repeats([2, 3, 1])).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn every_atom_has_full_first_shell_under_periodic_images() {
        let config = bcc_screw_builder()
            .build(&Dimensions::repeats([2, 2, 3]))
            .unwrap();
        let nn = 3.0 * 3f64.sqrt() / 2.0;
        for p in config.atoms() {
            let count = config
                .atoms()
                .iter()
                .filter(|q| {
                    let d = config.minimum_image(&(q.position - p.position)).norm();
                    (d - nn).abs() < 1e-6
                })
                .count();
            assert_eq!(count, 8, "atom {}", p.index);
        }
    }

    #[test]
    fn length_extent_rounds_up_to_whole_repeats() {
        let builder = bcc_screw_builder();
        let lengths = builder
            .box_lengths(&Dimensions::lengths([10.0, 10.0, 10.0]))
            .unwrap();
        let repeats = builder.repeat_lengths().unwrap();
        for i in 0..3 {
            let n = lengths[i] / repeats[i];
            assert!((n - n.round()).abs() < 1e-9);
            assert!(lengths[i] >= 10.0);
        }
    }

    #[test]
    fn non_lattice_cell_is_rejected() {
        let builder = bcc_screw_builder();
        let cell = Matrix3::from_diagonal(&Vector3::new(10.0, 10.0, 0.5));
        assert!(matches!(
            builder.build_in_cell(&cell),
            Err(DislocationError::Crystal {
                source: CrystalError::IncommensurateCell { .. }
            })
        ));
    }

    #[test]
    fn zero_repeats_is_invalid() {
        let result = bcc_screw_builder().build(&Dimensions::repeats([0, 1, 1]));
        assert!(matches!(result, Err(DislocationError::InvalidInput(_))));
    }
}
