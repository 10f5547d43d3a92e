use super::field::BranchCut;
use nalgebra::{Matrix3, Vector3};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Closed-form Volterra solution for an isotropic solid.
///
/// Used when the sextic roots collapse onto `p = i`, where the Stroh
/// eigenvectors are not independent. Only the Poisson ratio enters the
/// displacement field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicSolution {
    poisson_ratio: f64,
}

impl IsotropicSolution {
    pub fn new(poisson_ratio: f64) -> Self {
        Self { poisson_ratio }
    }

    pub fn poisson_ratio(&self) -> f64 {
        self.poisson_ratio
    }

    pub(crate) fn displacement(
        &self,
        x: f64,
        y: f64,
        burgers: &Vector3<f64>,
        cut: &BranchCut,
    ) -> Vector3<f64> {
        let nu = self.poisson_ratio;
        let r2 = x * x + y * y;
        let theta = cut.continuous_arg(Complex64::new(x, y), Complex64::i());
        let ln_r2 = r2.ln();
        let log_coeff = (1.0 - 2.0 * nu) / (4.0 * (1.0 - nu));
        let quad_coeff = 1.0 / (4.0 * (1.0 - nu));
        let shear = x * y / (2.0 * (1.0 - nu) * r2);
        let aniso = (x * x - y * y) / r2;

        let (b1, b2, b3) = (burgers.x, burgers.y, burgers.z);
        let u1 = b1 * (theta + shear) + b2 * (log_coeff * ln_r2 - quad_coeff * aniso);
        let u2 = -b1 * (log_coeff * ln_r2 + quad_coeff * aniso) + b2 * (theta - shear);
        let u3 = b3 * theta;
        Vector3::new(u1, u2, u3) / (2.0 * PI)
    }

    pub(crate) fn gradient(&self, x: f64, y: f64, burgers: &Vector3<f64>) -> Matrix3<f64> {
        let nu = self.poisson_ratio;
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let c = (1.0 - 2.0 * nu) / (4.0 * (1.0 - nu));
        let d = 1.0 / (4.0 * (1.0 - nu));
        let e = 1.0 / (2.0 * (1.0 - nu));

        let dtheta = (-y / r2, x / r2);
        let dshear = (y * (y * y - x * x) / r4, x * (x * x - y * y) / r4);
        let dlog = (2.0 * x / r2, 2.0 * y / r2);
        let daniso = (4.0 * x * y * y / r4, -4.0 * x * x * y / r4);

        let (b1, b2, b3) = (burgers.x, burgers.y, burgers.z);
        let mut grad = Matrix3::zeros();
        grad[(0, 0)] = b1 * (dtheta.0 + e * dshear.0) + b2 * (c * dlog.0 - d * daniso.0);
        grad[(0, 1)] = b1 * (dtheta.1 + e * dshear.1) + b2 * (c * dlog.1 - d * daniso.1);
        grad[(1, 0)] = -b1 * (c * dlog.0 + d * daniso.0) + b2 * (dtheta.0 - e * dshear.0);
        grad[(1, 1)] = -b1 * (c * dlog.1 + d * daniso.1) + b2 * (dtheta.1 - e * dshear.1);
        grad[(2, 0)] = b3 * dtheta.0;
        grad[(2, 1)] = b3 * dtheta.1;
        grad / (2.0 * PI)
    }
}
