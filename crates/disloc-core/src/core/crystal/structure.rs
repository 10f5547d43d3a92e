use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CrystalError {
    #[error("Unknown crystal structure: '{0}'")]
    UnknownStructure(String),

    #[error("Lattice constant must be positive, got {0}")]
    InvalidLatticeConstant(f64),

    #[error("Lattice direction must be non-zero")]
    ZeroDirection,

    #[error("Directions {first:?} and {second:?} are not orthogonal")]
    NotOrthogonal { first: [i32; 3], second: [i32; 3] },

    #[error("Orientation {x:?}, {y:?}, {z:?} is left-handed")]
    LeftHanded { x: [i32; 3], y: [i32; 3], z: [i32; 3] },

    #[error("Cell holds {found} lattice sites but its volume implies {expected}")]
    IncommensurateCell { expected: usize, found: usize },
}

/// Cubic Bravais lattice plus basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrystalStructure {
    #[serde(rename = "sc")]
    SimpleCubic,
    Bcc,
    Fcc,
    Diamond,
}

const SC_BASIS: [[f64; 3]; 1] = [[0.0, 0.0, 0.0]];
const BCC_BASIS: [[f64; 3]; 2] = [[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]];
const FCC_BASIS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.5, 0.5],
    [0.5, 0.0, 0.5],
    [0.5, 0.5, 0.0],
];
const DIAMOND_BASIS: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.5, 0.5],
    [0.5, 0.0, 0.5],
    [0.5, 0.5, 0.0],
    [0.25, 0.25, 0.25],
    [0.25, 0.75, 0.75],
    [0.75, 0.25, 0.75],
    [0.75, 0.75, 0.25],
];

impl CrystalStructure {
    /// Fractional positions of the basis atoms inside the conventional cubic cell.
    pub fn basis(&self) -> &'static [[f64; 3]] {
        match self {
            Self::SimpleCubic => &SC_BASIS,
            Self::Bcc => &BCC_BASIS,
            Self::Fcc => &FCC_BASIS,
            Self::Diamond => &DIAMOND_BASIS,
        }
    }

    /// Whether `(a/2)·h` is a translation of the Bravais lattice.
    ///
    /// Diamond shares the FCC translation group.
    pub fn is_translation(&self, half_units: &[i32; 3]) -> bool {
        let odd = half_units.iter().filter(|h| h.rem_euclid(2) == 1).count();
        match self {
            Self::SimpleCubic => odd == 0,
            Self::Bcc => odd == 0 || odd == 3,
            Self::Fcc | Self::Diamond => odd % 2 == 0,
        }
    }

    /// First and second neighbor distances in units of the lattice constant.
    pub fn neighbor_shells(&self) -> (f64, f64) {
        match self {
            Self::SimpleCubic => (1.0, 2f64.sqrt()),
            Self::Bcc => (3f64.sqrt() / 2.0, 1.0),
            Self::Fcc => (1.0 / 2f64.sqrt(), 1.0),
            Self::Diamond => (3f64.sqrt() / 4.0, 1.0 / 2f64.sqrt()),
        }
    }
}

impl FromStr for CrystalStructure {
    type Err = CrystalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sc" | "simple_cubic" => Ok(Self::SimpleCubic),
            "bcc" => Ok(Self::Bcc),
            "fcc" => Ok(Self::Fcc),
            "diamond" => Ok(Self::Diamond),
            _ => Err(CrystalError::UnknownStructure(s.to_string())),
        }
    }
}

impl fmt::Display for CrystalStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SimpleCubic => "sc",
            Self::Bcc => "bcc",
            Self::Fcc => "fcc",
            Self::Diamond => "diamond",
        };
        write!(f, "{name}")
    }
}

/// A cubic crystal: structure and lattice constant (Å).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crystal {
    structure: CrystalStructure,
    lattice_constant: f64,
}

impl Crystal {
    pub fn new(structure: CrystalStructure, lattice_constant: f64) -> Result<Self, CrystalError> {
        if !(lattice_constant > 0.0 && lattice_constant.is_finite()) {
            return Err(CrystalError::InvalidLatticeConstant(lattice_constant));
        }
        Ok(Self {
            structure,
            lattice_constant,
        })
    }

    pub fn structure(&self) -> CrystalStructure {
        self.structure
    }

    pub fn lattice_constant(&self) -> f64 {
        self.lattice_constant
    }

    /// Volume per atom.
    pub fn atomic_volume(&self) -> f64 {
        self.lattice_constant.powi(3) / self.structure.basis().len() as f64
    }

    pub fn nearest_neighbor_distance(&self) -> f64 {
        self.structure.neighbor_shells().0 * self.lattice_constant
    }

    pub fn second_neighbor_distance(&self) -> f64 {
        self.structure.neighbor_shells().1 * self.lattice_constant
    }

    /// Cartesian vector `fraction · a · [uvw]` in the crystal frame,
    /// e.g. `lattice_vector([1, 1, 1], 0.5)` for the BCC Burgers vector.
    pub fn lattice_vector(&self, direction: [i32; 3], fraction: f64) -> Vector3<f64> {
        Vector3::new(
            direction[0] as f64,
            direction[1] as f64,
            direction[2] as f64,
        ) * (fraction * self.lattice_constant)
    }

    /// Shortest lattice translation along `direction`.
    pub fn repeat_vector(&self, direction: [i32; 3]) -> Result<Vector3<f64>, CrystalError> {
        let reduced = reduce_direction(direction)?;
        let fraction = if self.structure.is_translation(&reduced) {
            0.5
        } else {
            1.0
        };
        Ok(self.lattice_vector(reduced, fraction))
    }

    /// Length of the minimal periodic repeat along `direction`.
    pub fn repeat_length(&self, direction: [i32; 3]) -> Result<f64, CrystalError> {
        self.repeat_vector(direction).map(|v| v.norm())
    }

    /// All lattice translations of length at most `radius`, zero included,
    /// expressed in the frame whose axes are the rows of `rotation`.
    pub fn translations_within(&self, radius: f64, rotation: &Matrix3<f64>) -> Vec<Vector3<f64>> {
        let half = 0.5 * self.lattice_constant;
        let bound = (radius / half).ceil() as i32;
        let mut translations = Vec::new();
        for i in -bound..=bound {
            for j in -bound..=bound {
                for k in -bound..=bound {
                    let h = [i, j, k];
                    if !self.structure.is_translation(&h) {
                        continue;
                    }
                    let t = Vector3::new(i as f64, j as f64, k as f64) * half;
                    if t.norm() <= radius + 1e-9 * self.lattice_constant {
                        translations.push(rotation * t);
                    }
                }
            }
        }
        translations
    }
}

/// Divides out the greatest common divisor of the components.
pub fn reduce_direction(direction: [i32; 3]) -> Result<[i32; 3], CrystalError> {
    let divisor = direction
        .iter()
        .fold(0, |acc, &v| gcd(acc, v.unsigned_abs() as i32));
    if divisor == 0 {
        return Err(CrystalError::ZeroDirection);
    }
    Ok(direction.map(|v| v / divisor))
}

fn gcd(a: i32, b: i32) -> i32 {
    if b == 0 { a.abs() } else { gcd(b, a % b) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn parses_structure_names() {
        assert_eq!("BCC".parse::<CrystalStructure>(), Ok(CrystalStructure::Bcc));
        assert_eq!("sc".parse::<CrystalStructure>(), Ok(CrystalStructure::SimpleCubic));
        assert!(matches!(
            "hcp".parse::<CrystalStructure>(),
            Err(CrystalError::UnknownStructure(_))
        ));
    }

    #[test]
    fn translation_membership_follows_bravais_lattice() {
        assert!(CrystalStructure::Bcc.is_translation(&[1, 1, 1]));
        assert!(!CrystalStructure::Bcc.is_translation(&[1, 1, 0]));
        assert!(CrystalStructure::Fcc.is_translation(&[1, 1, 0]));
        assert!(!CrystalStructure::Fcc.is_translation(&[1, 1, 1]));
        assert!(CrystalStructure::Diamond.is_translation(&[0, 1, -1]));
        assert!(!CrystalStructure::SimpleCubic.is_translation(&[1, 0, 0]));
        assert!(CrystalStructure::SimpleCubic.is_translation(&[2, 0, 0]));
    }

    #[test]
    fn repeat_lengths_match_known_values() {
        let a = 3.0;
        let bcc = Crystal::new(CrystalStructure::Bcc, a).unwrap();
        assert!(f64_approx_equal(bcc.repeat_length([1, 1, 1]).unwrap(), a * 3f64.sqrt() / 2.0));
        assert!(f64_approx_equal(bcc.repeat_length([1, 1, -2]).unwrap(), a * 6f64.sqrt()));
        assert!(f64_approx_equal(bcc.repeat_length([-2, 2, 0]).unwrap(), a * 2f64.sqrt()));

        let fcc = Crystal::new(CrystalStructure::Fcc, a).unwrap();
        assert!(f64_approx_equal(fcc.repeat_length([1, 1, 0]).unwrap(), a / 2f64.sqrt()));
        assert!(f64_approx_equal(fcc.repeat_length([1, 1, 1]).unwrap(), a * 3f64.sqrt()));
        assert!(f64_approx_equal(fcc.repeat_length([1, 1, -2]).unwrap(), a * 6f64.sqrt() / 2.0));
    }

    #[test]
    fn zero_direction_is_rejected() {
        assert_eq!(reduce_direction([0, 0, 0]), Err(CrystalError::ZeroDirection));
        assert_eq!(reduce_direction([2, -4, 6]), Ok([1, -2, 3]));
    }

    #[test]
    fn rejects_non_positive_lattice_constant() {
        assert_eq!(
            Crystal::new(CrystalStructure::Fcc, 0.0),
            Err(CrystalError::InvalidLatticeConstant(0.0))
        );
    }

    #[test]
    fn translations_within_nearest_neighbor_shell() {
        let fcc = Crystal::new(CrystalStructure::Fcc, 4.0).unwrap();
        let radius = fcc.nearest_neighbor_distance();
        let translations = fcc.translations_within(radius, &Matrix3::identity());
        // origin plus the twelve <110>/2 vectors
        assert_eq!(translations.len(), 13);
        assert!(translations.iter().any(|t| t.norm() == 0.0));
    }

    #[test]
    fn atomic_volume_divides_cell_by_basis() {
        let diamond = Crystal::new(CrystalStructure::Diamond, 2.0).unwrap();
        assert!(f64_approx_equal(diamond.atomic_volume(), 1.0));
    }
}
