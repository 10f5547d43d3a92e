use super::error::ElasticityError;
use super::isotropic::IsotropicSolution;
use super::stroh::StrohSolution;
use super::tensor::ElasticConstants;
use crate::core::crystal::orientation::CrystalOrientation;
use nalgebra::{Matrix3, Vector2, Vector3};
use num_complex::Complex64;
use std::f64::consts::{PI, TAU};

/// Numerical controls for the elastic solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Relative tolerance under which a tensor is treated as isotropic.
    pub isotropy: f64,
    /// Minimum distance between distinct Stroh roots.
    pub root_separation: f64,
    /// Relative step size at which the sextic root iteration stops.
    pub root_tolerance: f64,
    /// Upper bound on root iterations before giving up.
    pub max_root_iterations: usize,
    /// Distance below which the singular core is regularized.
    pub core_regularization: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            isotropy: 1e-8,
            root_separation: 1e-4,
            root_tolerance: 1e-13,
            max_root_iterations: 500,
            core_regularization: 1e-8,
        }
    }
}

/// Direction of the branch cut, measured counterclockwise from `+x`.
///
/// The displacement is single-valued everywhere except across the ray from
/// the core along this direction, where it jumps by the Burgers vector. The
/// angular coordinate is continuous on `(angle - 2π, angle)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchCut {
    angle: f64,
}

impl Default for BranchCut {
    /// Cut along `-x`, lying in the glide plane on the side opposite to the
    /// glide direction.
    fn default() -> Self {
        Self { angle: PI }
    }
}

impl BranchCut {
    pub fn new(angle: f64) -> Self {
        Self { angle }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Continuous argument of `z = x + p y` with the discontinuity placed on
    /// the cut ray. For `p = i` this is the polar angle.
    pub(crate) fn continuous_arg(&self, z: Complex64, root: Complex64) -> f64 {
        let (sin, cos) = self.angle.sin_cos();
        let z_cut = Complex64::new(cos + root.re * sin, root.im * sin);
        let mut swept = (z / z_cut).arg();
        if swept <= 0.0 {
            swept += TAU;
        }
        z_cut.arg() + swept - TAU
    }

    /// Angle of `point` swept counterclockwise from the cut, in `[0, 2π)`.
    pub fn angle_from_cut(&self, point: &Vector2<f64>) -> f64 {
        (point.y.atan2(point.x) - self.angle).rem_euclid(TAU)
    }

    pub(crate) fn cache_key(&self) -> u64 {
        self.angle.to_bits()
    }
}

/// The Burgers-independent part of the elastic solution.
#[derive(Debug, Clone, PartialEq)]
pub enum ElasticKernel {
    Anisotropic(StrohSolution),
    Isotropic(IsotropicSolution),
}

impl ElasticKernel {
    /// Solves for a tensor already rotated into the dislocation frame.
    ///
    /// Isotropic tensors take the closed-form branch; everything else goes
    /// through the Stroh sextic.
    pub fn solve(
        frame_constants: &ElasticConstants,
        settings: &SolverSettings,
    ) -> Result<Self, ElasticityError> {
        if frame_constants.is_isotropic(settings.isotropy) {
            let (_, nu) = frame_constants.isotropic_moduli();
            return Ok(Self::Isotropic(IsotropicSolution::new(nu)));
        }
        StrohSolution::solve(frame_constants, settings).map(Self::Anisotropic)
    }

    fn displacement(&self, x: f64, y: f64, burgers: &Vector3<f64>, cut: &BranchCut) -> Vector3<f64> {
        match self {
            Self::Anisotropic(stroh) => stroh.displacement(x, y, burgers, cut),
            Self::Isotropic(iso) => iso.displacement(x, y, burgers, cut),
        }
    }

    fn gradient(&self, x: f64, y: f64, burgers: &Vector3<f64>) -> Matrix3<f64> {
        match self {
            Self::Anisotropic(stroh) => stroh.gradient(x, y, burgers),
            Self::Isotropic(iso) => iso.gradient(x, y, burgers),
        }
    }
}

/// Displacement field of an infinite straight dislocation along `z`.
///
/// Points are in-plane coordinates relative to the core. The Burgers vector
/// and all returned quantities live in the dislocation frame (`x` glide
/// direction, `y` glide-plane normal, `z` line direction).
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacementField {
    kernel: ElasticKernel,
    frame_constants: ElasticConstants,
    burgers: Vector3<f64>,
    cut: BranchCut,
    regularization: f64,
}

impl DisplacementField {
    /// Rotates `constants` from the crystal frame into the dislocation frame
    /// given by `orientation` and solves for the field of `burgers`.
    ///
    /// # Errors
    ///
    /// Propagates [`ElasticityError`] when the sextic problem is degenerate or
    /// fails to converge.
    pub fn solve(
        constants: &ElasticConstants,
        burgers: &Vector3<f64>,
        orientation: &CrystalOrientation,
        cut: BranchCut,
        settings: &SolverSettings,
    ) -> Result<Self, ElasticityError> {
        let frame_constants = constants.rotated(orientation.rotation());
        let kernel = ElasticKernel::solve(&frame_constants, settings)?;
        Ok(Self {
            kernel,
            frame_constants,
            burgers: *burgers,
            cut,
            regularization: settings.core_regularization,
        })
    }

    /// The same elastic solution carrying a different Burgers vector.
    pub fn with_burgers(&self, burgers: &Vector3<f64>) -> Self {
        Self {
            burgers: *burgers,
            ..self.clone()
        }
    }

    pub fn burgers(&self) -> &Vector3<f64> {
        &self.burgers
    }

    pub fn cut(&self) -> &BranchCut {
        &self.cut
    }

    pub fn kernel(&self) -> &ElasticKernel {
        &self.kernel
    }

    pub fn frame_constants(&self) -> &ElasticConstants {
        &self.frame_constants
    }

    pub fn displacement(&self, point: &Vector2<f64>) -> Vector3<f64> {
        let (x, y) = self.regularize(point);
        self.kernel.displacement(x, y, &self.burgers, &self.cut)
    }

    /// Displacement per unit Burgers vector: column `j` is the field of a
    /// dislocation with `b = e_j`.
    pub fn green_matrix(&self, point: &Vector2<f64>) -> Matrix3<f64> {
        let (x, y) = self.regularize(point);
        let mut green = Matrix3::zeros();
        for j in 0..3 {
            let column = self
                .kernel
                .displacement(x, y, &Vector3::ith(j, 1.0), &self.cut);
            green.set_column(j, &column);
        }
        green
    }

    /// Displacement gradient `∂u_i/∂x_j`.
    pub fn displacement_gradient(&self, point: &Vector2<f64>) -> Matrix3<f64> {
        let (x, y) = self.regularize(point);
        self.kernel.gradient(x, y, &self.burgers)
    }

    pub fn strain(&self, point: &Vector2<f64>) -> Matrix3<f64> {
        let grad = self.displacement_gradient(point);
        (grad + grad.transpose()) * 0.5
    }

    /// Cauchy stress in the units of the elastic constants.
    pub fn stress(&self, point: &Vector2<f64>) -> Matrix3<f64> {
        self.frame_constants.stress_from_strain(&self.strain(point))
    }

    fn regularize(&self, point: &Vector2<f64>) -> (f64, f64) {
        let r = point.norm();
        if r >= self.regularization {
            (point.x, point.y)
        } else if r == 0.0 {
            let (sin, cos) = (self.cut.angle + PI).sin_cos();
            (self.regularization * cos, self.regularization * sin)
        } else {
            let scale = self.regularization / r;
            (point.x * scale, point.y * scale)
        }
    }
}
