use crate::core::elasticity::field::DisplacementField;
use crate::core::utils::geometry::nearest_shift;
use crate::engine::error::DislocationError;
use argmin::core::{CostFunction, Executor, State};
use argmin::solver::neldermead::NelderMead;
use nalgebra::{DMatrix, DVector, Vector2, Vector3};
use tracing::debug;

/// Relative convergence threshold for the Burgers least-squares solve.
const SVD_EPSILON: f64 = 1e-12;

/// One atom entering the fit: its reference in-plane position and measured
/// displacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSample {
    pub position: Vector2<f64>,
    pub displacement: Vector3<f64>,
}

/// Fitted partial cores with the residual that remains.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreFit {
    pub cores: Vec<Vector2<f64>>,
    /// Weighted RMS displacement residual at `cores`.
    pub residual: f64,
    pub iterations: u64,
}

/// Partial Burgers vectors recovered by linear least squares at fixed cores.
#[derive(Debug, Clone, PartialEq)]
pub struct BurgersFit {
    pub partials: Vec<Vector3<f64>>,
    /// Rigid translation absorbed by the fit.
    pub translation: Vector3<f64>,
}

struct Evaluation {
    cost: f64,
    shifts: Vec<Vector3<f64>>,
    weights: Vec<f64>,
}

/// Weighted displacement misfit between the samples and a superposition of
/// `fields` centred on trial cores.
///
/// Each residual is reduced by the nearest entry of `jumps` before it counts,
/// so atoms that fall on the other side of a trial cut do not dominate. Atoms
/// close to a trial core are down-weighted by `r² / (r² + softening²)`.
pub struct CoreFitProblem<'a> {
    fields: &'a [DisplacementField],
    samples: &'a [FitSample],
    jumps: &'a [Vector3<f64>],
    softening: f64,
}

impl<'a> CoreFitProblem<'a> {
    pub fn new(
        fields: &'a [DisplacementField],
        samples: &'a [FitSample],
        jumps: &'a [Vector3<f64>],
        softening: f64,
    ) -> Self {
        Self {
            fields,
            samples,
            jumps,
            softening,
        }
    }

    fn unpack(param: &[f64]) -> Vec<Vector2<f64>> {
        param
            .chunks_exact(2)
            .map(|c| Vector2::new(c[0], c[1]))
            .collect()
    }

    fn pack(cores: &[Vector2<f64>]) -> Vec<f64> {
        cores.iter().flat_map(|c| [c.x, c.y]).collect()
    }

    fn model(&self, position: &Vector2<f64>, cores: &[Vector2<f64>]) -> Vector3<f64> {
        self.fields
            .iter()
            .zip(cores)
            .map(|(field, core)| field.displacement(&(position - core)))
            .sum()
    }

    fn weight(&self, position: &Vector2<f64>, cores: &[Vector2<f64>]) -> f64 {
        let r2 = cores
            .iter()
            .map(|c| (position - c).norm_squared())
            .fold(f64::INFINITY, f64::min);
        r2 / (r2 + self.softening * self.softening)
    }

    /// Weighted RMS residual with the cores held at `cores`.
    pub fn residual(&self, cores: &[Vector2<f64>]) -> f64 {
        self.evaluate(cores).cost.max(0.0).sqrt()
    }

    fn evaluate(&self, cores: &[Vector2<f64>]) -> Evaluation {
        let raw: Vec<Vector3<f64>> = self
            .samples
            .iter()
            .map(|s| s.displacement - self.model(&s.position, cores))
            .collect();
        let weights: Vec<f64> = self
            .samples
            .iter()
            .map(|s| self.weight(&s.position, cores))
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Evaluation {
                cost: f64::INFINITY,
                shifts: vec![Vector3::zeros(); raw.len()],
                weights,
            };
        }

        // The rigid translation is unknown, so it is estimated once from
        // residuals wrapped around zero and then the wrapping is redone.
        let mut translation = Vector3::zeros();
        let mut shifts = vec![Vector3::zeros(); raw.len()];
        let mut cost = 0.0;
        for _ in 0..2 {
            let mut mean = Vector3::zeros();
            cost = 0.0;
            for (i, r) in raw.iter().enumerate() {
                let centered = r - translation;
                let (shift, rest) = nearest_shift(&centered, self.jumps)
                    .map(|(s, rest)| (*s, rest))
                    .unwrap_or((Vector3::zeros(), centered));
                shifts[i] = shift;
                mean += (r - shift) * weights[i];
                cost += weights[i] * rest.norm_squared();
            }
            translation = mean / total;
        }
        Evaluation {
            cost: cost / total,
            shifts,
            weights,
        }
    }
}

impl CostFunction for CoreFitProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(self.evaluate(&Self::unpack(param)).cost)
    }
}

/// Refines `initial` core positions with a Nelder-Mead search.
///
/// `step` is the edge length of the starting simplex.
pub fn fit_cores(
    problem: CoreFitProblem<'_>,
    initial: &[Vector2<f64>],
    step: f64,
    max_iterations: u64,
    tolerance: f64,
) -> Result<CoreFit, DislocationError> {
    let start = CoreFitProblem::pack(initial);
    let mut simplex = vec![start.clone()];
    for i in 0..start.len() {
        let mut vertex = start.clone();
        vertex[i] += step;
        simplex.push(vertex);
    }

    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
        .with_sd_tolerance(tolerance)
        .map_err(|e| DislocationError::CoreFit(e.to_string()))?;
    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(max_iterations))
        .run()
        .map_err(|e| DislocationError::CoreFit(format!("Nelder-Mead error: {e}")))?;

    let best = match &res.state().best_param {
        Some(param) => param.clone(),
        None => {
            return Err(DislocationError::CoreFit(
                "Nelder-Mead produced no best parameter".to_owned(),
            ));
        }
    };
    let cost = res.state().get_best_cost();
    let iterations = res.state().get_iter();
    debug!(iterations, cost, "Core fit converged.");
    Ok(CoreFit {
        cores: CoreFitProblem::unpack(&best),
        residual: cost.max(0.0).sqrt(),
        iterations,
    })
}

/// Least-squares Burgers vectors of each partial with the cores held fixed.
///
/// The displacement is linear in the Burgers vectors, so each partial
/// contributes the three columns of its Green matrix and a rigid translation
/// contributes the identity.
pub fn fit_burgers(
    problem: &CoreFitProblem<'_>,
    cores: &[Vector2<f64>],
) -> Result<BurgersFit, DislocationError> {
    let evaluation = problem.evaluate(cores);
    let partials = problem.fields.len();
    let rows = 3 * problem.samples.len();
    let cols = 3 * partials + 3;
    if rows < cols {
        return Err(DislocationError::CoreFit(format!(
            "{} atoms cannot determine {} Burgers vectors",
            problem.samples.len(),
            partials
        )));
    }

    let mut a = DMatrix::zeros(rows, cols);
    let mut rhs = DVector::zeros(rows);
    for (i, sample) in problem.samples.iter().enumerate() {
        let w = evaluation.weights[i].sqrt();
        for (k, (field, core)) in problem.fields.iter().zip(cores).enumerate() {
            let green = field.green_matrix(&(sample.position - core)) * w;
            a.view_mut((3 * i, 3 * k), (3, 3)).copy_from(&green);
        }
        for c in 0..3 {
            a[(3 * i + c, 3 * partials + c)] = w;
        }
        let target = (sample.displacement - evaluation.shifts[i]) * w;
        rhs.rows_mut(3 * i, 3).copy_from(&target);
    }

    let solution = a
        .svd(true, true)
        .solve(&rhs, SVD_EPSILON)
        .map_err(|e| DislocationError::CoreFit(e.to_string()))?;
    Ok(BurgersFit {
        partials: (0..partials)
            .map(|k| Vector3::new(solution[3 * k], solution[3 * k + 1], solution[3 * k + 2]))
            .collect(),
        translation: Vector3::new(
            solution[3 * partials],
            solution[3 * partials + 1],
            solution[3 * partials + 2],
        ),
    })
}

/// Discontinuities a residual may carry: every sum `Σ n_k b_k` with
/// `n_k ∈ {-1, 0, 1}`, together with `extra`.
pub fn jump_candidates(partials: &[Vector3<f64>], extra: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    let mut jumps = vec![Vector3::zeros()];
    for b in partials {
        let mut next = Vec::with_capacity(jumps.len() * 3);
        for j in &jumps {
            next.push(*j);
            next.push(j + b);
            next.push(j - b);
        }
        jumps = next;
    }
    jumps.extend_from_slice(extra);
    jumps.dedup_by(|a, b| (*a - *b).norm() < 1e-9);
    jumps
}
