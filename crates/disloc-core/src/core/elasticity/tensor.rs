use super::error::ElasticityError;
use nalgebra::{Matrix3, Matrix6};

/// Maps a pair of Cartesian indices onto the corresponding Voigt index.
const VOIGT_INDEX: [[usize; 3]; 3] = [[0, 5, 4], [5, 1, 3], [4, 3, 2]];

/// Inverse of [`VOIGT_INDEX`]: the Cartesian index pair for each Voigt index.
const VOIGT_PAIRS: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (1, 2), (0, 2), (0, 1)];

/// Symmetric 6×6 stiffness matrix in Voigt notation.
///
/// The matrix is validated on construction (symmetric and positive-definite)
/// and is immutable afterwards. Rotation produces a new tensor expressed in a
/// different Cartesian frame; the physical content is unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElasticConstants {
    voigt: Matrix6<f64>,
}

impl ElasticConstants {
    /// Builds the tensor from a full Voigt matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ElasticityError::NotSymmetric`] when `C_IJ != C_JI` beyond a
    /// relative tolerance of `1e-10`, and [`ElasticityError::NotPositiveDefinite`]
    /// when the Cholesky factorization fails.
    pub fn from_voigt(voigt: Matrix6<f64>) -> Result<Self, ElasticityError> {
        let scale = voigt.amax().max(f64::MIN_POSITIVE);
        for row in 0..6 {
            for col in (row + 1)..6 {
                if (voigt[(row, col)] - voigt[(col, row)]).abs() > 1e-10 * scale {
                    return Err(ElasticityError::NotSymmetric { row, col });
                }
            }
        }
        if voigt.cholesky().is_none() {
            return Err(ElasticityError::NotPositiveDefinite);
        }
        Ok(Self { voigt })
    }

    /// Cubic crystal with the three independent constants `C11`, `C12`, `C44`.
    pub fn cubic(c11: f64, c12: f64, c44: f64) -> Result<Self, ElasticityError> {
        let mut voigt = Matrix6::zeros();
        for i in 0..3 {
            for j in 0..3 {
                voigt[(i, j)] = if i == j { c11 } else { c12 };
            }
            voigt[(i + 3, i + 3)] = c44;
        }
        Self::from_voigt(voigt)
    }

    /// Isotropic solid from its shear modulus and Poisson ratio.
    pub fn isotropic(shear_modulus: f64, poisson_ratio: f64) -> Result<Self, ElasticityError> {
        if shear_modulus <= 0.0 {
            return Err(ElasticityError::InvalidModuli(format!(
                "shear modulus must be positive, got {shear_modulus}"
            )));
        }
        if !(-1.0 < poisson_ratio && poisson_ratio < 0.5) {
            return Err(ElasticityError::InvalidModuli(format!(
                "Poisson ratio must lie in (-1, 0.5), got {poisson_ratio}"
            )));
        }
        let lambda = 2.0 * shear_modulus * poisson_ratio / (1.0 - 2.0 * poisson_ratio);
        Self::cubic(lambda + 2.0 * shear_modulus, lambda, shear_modulus)
    }

    pub fn voigt(&self) -> &Matrix6<f64> {
        &self.voigt
    }

    /// Component `C_ijkl` of the full fourth-rank tensor.
    #[inline]
    pub fn component(&self, i: usize, j: usize, k: usize, l: usize) -> f64 {
        self.voigt[(VOIGT_INDEX[i][j], VOIGT_INDEX[k][l])]
    }

    /// Expresses the tensor in a rotated frame.
    ///
    /// `rotation` holds the new Cartesian axes as rows, written in the current
    /// frame, so that `C'_ijkl = R_ip R_jq R_kr R_ls C_pqrs`.
    pub fn rotated(&self, rotation: &Matrix3<f64>) -> Self {
        let mut voigt = Matrix6::zeros();
        for (big_i, &(i, j)) in VOIGT_PAIRS.iter().enumerate() {
            for (big_j, &(k, l)) in VOIGT_PAIRS.iter().enumerate().skip(big_i) {
                let mut sum = 0.0;
                for p in 0..3 {
                    for q in 0..3 {
                        let rpq = rotation[(i, p)] * rotation[(j, q)];
                        if rpq == 0.0 {
                            continue;
                        }
                        for r in 0..3 {
                            for s in 0..3 {
                                sum += rpq
                                    * rotation[(k, r)]
                                    * rotation[(l, s)]
                                    * self.component(p, q, r, s);
                            }
                        }
                    }
                }
                voigt[(big_i, big_j)] = sum;
                voigt[(big_j, big_i)] = sum;
            }
        }
        Self { voigt }
    }

    /// Whether the tensor is isotropic within a relative tolerance.
    ///
    /// Isotropy is frame-independent, so the check works in any orientation.
    pub fn is_isotropic(&self, tolerance: f64) -> bool {
        let c = &self.voigt;
        let scale = c.amax();
        let tol = tolerance * scale;
        let c11 = c[(0, 0)];
        let c12 = c[(0, 1)];
        let c44 = 0.5 * (c11 - c12);
        for row in 0..6 {
            for col in 0..6 {
                let expected = match (row < 3, col < 3) {
                    (true, true) if row == col => c11,
                    (true, true) => c12,
                    (false, false) if row == col => c44,
                    _ => 0.0,
                };
                if (c[(row, col)] - expected).abs() > tol {
                    return false;
                }
            }
        }
        true
    }

    /// Shear modulus and Poisson ratio of an isotropic tensor.
    ///
    /// The values are derived from `C11` and `C12` only; callers are expected
    /// to check [`Self::is_isotropic`] first.
    pub fn isotropic_moduli(&self) -> (f64, f64) {
        let c11 = self.voigt[(0, 0)];
        let c12 = self.voigt[(0, 1)];
        let mu = 0.5 * (c11 - c12);
        let nu = c12 / (2.0 * (c12 + mu));
        (mu, nu)
    }

    /// Applies Hooke's law to a (symmetric) strain tensor.
    pub fn stress_from_strain(&self, strain: &Matrix3<f64>) -> Matrix3<f64> {
        let mut eps = [0.0; 6];
        for (idx, &(i, j)) in VOIGT_PAIRS.iter().enumerate() {
            eps[idx] = if i == j {
                strain[(i, j)]
            } else {
                strain[(i, j)] + strain[(j, i)]
            };
        }
        let mut stress = Matrix3::zeros();
        for (idx, &(i, j)) in VOIGT_PAIRS.iter().enumerate() {
            let sigma: f64 = (0..6).map(|k| self.voigt[(idx, k)] * eps[k]).sum();
            stress[(i, j)] = sigma;
            stress[(j, i)] = sigma;
        }
        stress
    }

    pub(crate) fn cache_key(&self) -> [u64; 36] {
        let mut key = [0u64; 36];
        for (slot, value) in key.iter_mut().zip(self.voigt.iter()) {
            *slot = value.to_bits();
        }
        key
    }
}
