use super::error::ElasticityError;
use super::field::{BranchCut, SolverSettings};
use super::tensor::ElasticConstants;
use nalgebra::{Matrix3, Vector3};
use num_complex::Complex64;
use std::f64::consts::{PI, TAU};

type ComplexVector3 = Vector3<Complex64>;

/// Anisotropic solution of a straight dislocation along `x3`.
///
/// Holds the three Stroh roots with positive imaginary part and the matching
/// displacement (`a`) and traction (`b`) eigenvectors, normalized such that
/// `2 a_k·b_k = 1`. With that normalization the displacement field is
///
/// `u = (1/π) Im Σ_k a_k (b_k·B) ln(x1 + p_k x2)`
///
/// and jumps by exactly the Burgers vector `B` across the branch cut.
#[derive(Debug, Clone, PartialEq)]
pub struct StrohSolution {
    roots: [Complex64; 3],
    a: [ComplexVector3; 3],
    b: [ComplexVector3; 3],
}

impl StrohSolution {
    /// Solves the sextic eigenvalue problem for a tensor already expressed in
    /// the dislocation frame (`x1` glide direction, `x2` glide-plane normal,
    /// `x3` line direction).
    ///
    /// The eigenvalues of the 6×6 Stroh matrix are the roots of
    /// `det(Q + (R + Rᵀ)p + Tp²)`. They are found directly on that real
    /// sextic with simultaneous Aberth iteration, which also converges for
    /// the symmetric root sets of high-symmetry orientations.
    pub fn solve(
        constants: &ElasticConstants,
        settings: &SolverSettings,
    ) -> Result<Self, ElasticityError> {
        let (q, r, t) = stroh_blocks(constants);
        let coefficients = sextic_coefficients(&q, &r, &t);
        let scale = coefficients.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
        if coefficients[6] <= 1e-12 * scale {
            return Err(ElasticityError::SingularTensor);
        }

        let (all_roots, converged) = polynomial_roots(
            &coefficients,
            settings.root_tolerance,
            settings.max_root_iterations,
        );
        let not_converged = ElasticityError::SexticNotConverged {
            iterations: settings.max_root_iterations,
        };
        if all_roots.iter().any(|p| !p.re.is_finite() || !p.im.is_finite()) {
            return Err(not_converged);
        }

        let mut upper: Vec<Complex64> = all_roots
            .iter()
            .copied()
            .filter(|p| p.im > settings.root_separation)
            .collect();
        if upper.len() != 3 {
            return Err(if converged {
                ElasticityError::RootCount { found: upper.len() }
            } else {
                not_converged
            });
        }
        upper.sort_by(|p1, p2| {
            p1.re
                .partial_cmp(&p2.re)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(p1.im.partial_cmp(&p2.im).unwrap_or(std::cmp::Ordering::Equal))
        });

        // A multiple root only converges to within the cube root of the
        // rounding error, so degeneracy is decided before convergence.
        let separation = min_separation(&upper);
        if separation < settings.root_separation {
            return Err(ElasticityError::DegenerateRoots {
                separation,
                tolerance: settings.root_separation,
            });
        }
        if !converged {
            return Err(not_converged);
        }

        let roots = [upper[0], upper[1], upper[2]];
        let mut a = [ComplexVector3::zeros(); 3];
        let mut b = [ComplexVector3::zeros(); 3];
        for (k, &p) in roots.iter().enumerate() {
            let ak = null_vector(&characteristic_matrix(&q, &r, &t, p))
                .ok_or(ElasticityError::SingularEigenvector { root: k })?;
            let bk = (to_complex(&r.transpose()) + to_complex(&t) * p) * ak;
            let norm = ak.dot(&bk) * 2.0;
            if norm.norm() < 1e-14 {
                return Err(ElasticityError::SingularEigenvector { root: k });
            }
            let scale = norm.sqrt();
            a[k] = ak / scale;
            b[k] = bk / scale;
        }

        Ok(Self { roots, a, b })
    }

    pub fn roots(&self) -> &[Complex64; 3] {
        &self.roots
    }

    pub(crate) fn displacement(
        &self,
        x: f64,
        y: f64,
        burgers: &Vector3<f64>,
        cut: &BranchCut,
    ) -> Vector3<f64> {
        let mut u = Vector3::zeros();
        for k in 0..3 {
            let p = self.roots[k];
            let z = Complex64::new(x + p.re * y, p.im * y);
            let ln_z = Complex64::new(z.norm().ln(), cut.continuous_arg(z, p));
            let weight = self.projection(k, burgers) * ln_z;
            for i in 0..3 {
                u[i] += (self.a[k][i] * weight).im;
            }
        }
        u / PI
    }

    /// Displacement gradient `∂u_i/∂x_j`; the column along the line is zero.
    pub(crate) fn gradient(&self, x: f64, y: f64, burgers: &Vector3<f64>) -> Matrix3<f64> {
        let mut grad = Matrix3::zeros();
        for k in 0..3 {
            let p = self.roots[k];
            let z = Complex64::new(x + p.re * y, p.im * y);
            let inv_z = z.inv();
            let weight = self.projection(k, burgers);
            for i in 0..3 {
                let term = self.a[k][i] * weight * inv_z;
                grad[(i, 0)] += term.im;
                grad[(i, 1)] += (term * p).im;
            }
        }
        grad / PI
    }

    #[inline]
    fn projection(&self, k: usize, burgers: &Vector3<f64>) -> Complex64 {
        self.b[k][0] * burgers.x + self.b[k][1] * burgers.y + self.b[k][2] * burgers.z
    }
}

/// The `Q`, `R`, `T` blocks: `Q_ik = C_i1k1`, `R_ik = C_i1k2`, `T_ik = C_i2k2`.
fn stroh_blocks(c: &ElasticConstants) -> (Matrix3<f64>, Matrix3<f64>, Matrix3<f64>) {
    let q = Matrix3::from_fn(|i, k| c.component(i, 0, k, 0));
    let r = Matrix3::from_fn(|i, k| c.component(i, 0, k, 1));
    let t = Matrix3::from_fn(|i, k| c.component(i, 1, k, 1));
    (q, r, t)
}

fn to_complex(m: &Matrix3<f64>) -> Matrix3<Complex64> {
    m.map(|v| Complex64::new(v, 0.0))
}

fn characteristic_matrix(
    q: &Matrix3<f64>,
    r: &Matrix3<f64>,
    t: &Matrix3<f64>,
    p: Complex64,
) -> Matrix3<Complex64> {
    to_complex(q) + to_complex(&(r + r.transpose())) * p + to_complex(t) * (p * p)
}

/// Null vector of a rank-2 complex 3×3 matrix.
///
/// The bilinear cross product of two independent rows is orthogonal (in the
/// bilinear sense) to every row, so it spans the kernel. The best-conditioned
/// pair of rows is used.
fn null_vector(m: &Matrix3<Complex64>) -> Option<ComplexVector3> {
    let rows: [ComplexVector3; 3] = [
        m.row(0).transpose(),
        m.row(1).transpose(),
        m.row(2).transpose(),
    ];
    let scale = rows.iter().map(|r| r.norm()).fold(0.0, f64::max);
    if scale == 0.0 {
        return None;
    }
    let candidate = [(0, 1), (1, 2), (2, 0)]
        .iter()
        .map(|&(i, j)| rows[i].cross(&rows[j]))
        .max_by(|c1, c2| {
            c1.norm()
                .partial_cmp(&c2.norm())
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
    let norm = candidate.norm();
    if norm < 1e-12 * scale * scale {
        return None;
    }
    Some(candidate.unscale(norm))
}

/// Ascending coefficients of `det(Q + (R + Rᵀ)p + Tp²)`.
fn sextic_coefficients(q: &Matrix3<f64>, r: &Matrix3<f64>, t: &Matrix3<f64>) -> [f64; 7] {
    let s = r + r.transpose();
    let m = |i: usize, j: usize| [q[(i, j)], s[(i, j)], t[(i, j)]];
    let minor = |i1: usize, j1: usize, i2: usize, j2: usize| {
        poly_sub(
            &poly_mul(&m(i1, j1), &m(i2, j2)),
            &poly_mul(&m(i1, j2), &m(i2, j1)),
        )
    };
    let terms = [
        poly_mul(&m(0, 0), &minor(1, 1, 2, 2)),
        poly_mul(&m(0, 1), &minor(1, 0, 2, 2)),
        poly_mul(&m(0, 2), &minor(1, 0, 2, 1)),
    ];
    let mut det = [0.0; 7];
    for (sign, term) in [1.0, -1.0, 1.0].into_iter().zip(&terms) {
        for (d, c) in det.iter_mut().zip(term) {
            *d += sign * c;
        }
    }
    det
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut product = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            product[i + j] += x * y;
        }
    }
    product
}

fn poly_sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Value and derivative of the monic polynomial with lower coefficients `a`.
fn eval_monic(a: &[f64; 6], z: Complex64) -> (Complex64, Complex64) {
    let mut value = Complex64::new(1.0, 0.0);
    let mut derivative = Complex64::new(0.0, 0.0);
    for &c in a.iter().rev() {
        derivative = derivative * z + value;
        value = value * z + c;
    }
    (value, derivative)
}

/// All six roots of a real sextic by Aberth-Ehrlich iteration.
///
/// Returns the roots and whether every correction fell below `tolerance`
/// relative to the root it was applied to.
fn polynomial_roots(
    coefficients: &[f64; 7],
    tolerance: f64,
    max_iterations: usize,
) -> ([Complex64; 6], bool) {
    let lead = coefficients[6];
    let mut monic = [0.0; 6];
    for (m, c) in monic.iter_mut().zip(coefficients) {
        *m = c / lead;
    }

    // Start on the circle whose radius is the geometric mean of the roots,
    // rotated off the real axis.
    let radius = match monic[0].abs().powf(1.0 / 6.0) {
        r if r > 0.0 && r.is_finite() => r,
        _ => 1.0,
    };
    let mut roots: [Complex64; 6] =
        std::array::from_fn(|k| Complex64::from_polar(radius, TAU * k as f64 / 6.0 + 0.4));

    for _ in 0..max_iterations {
        let mut largest = 0.0_f64;
        for k in 0..6 {
            let (value, derivative) = eval_monic(&monic, roots[k]);
            if value.norm() == 0.0 {
                continue;
            }
            let newton = if derivative.norm() == 0.0 {
                value
            } else {
                value / derivative
            };
            let repulsion: Complex64 = (0..6)
                .filter(|&j| j != k && roots[j] != roots[k])
                .map(|j| (roots[k] - roots[j]).inv())
                .sum();
            let step = newton / (Complex64::new(1.0, 0.0) - newton * repulsion);
            roots[k] -= step;
            largest = largest.max(step.norm() / roots[k].norm().max(1.0));
        }
        if largest < tolerance {
            return (roots, true);
        }
    }
    (roots, false)
}

fn min_separation(roots: &[Complex64]) -> f64 {
    let mut min = f64::INFINITY;
    for i in 0..roots.len() {
        for j in (i + 1)..roots.len() {
            min = min.min((roots[i] - roots[j]).norm());
        }
    }
    min
}
