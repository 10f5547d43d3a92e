//! Recovery of core position and Burgers vector from atomic configurations.
//!
//! Per-atom displacements are taken between a relaxed configuration and the
//! undisplaced reference it was built from, matched by atom index and
//! wrapped with the minimum-image convention. From them the analyzer derives
//! a differential-displacement map, fits the core position(s) against the
//! continuum field, measures the Burgers vector of each partial by least
//! squares, and closes a Burgers circuit around the fitted core.

pub mod circuit;
pub mod differential;
pub mod fit;
pub mod neighbors;

use self::circuit::burgers_circuit;
use self::differential::{
    DifferentialDisplacement, differential_displacements, per_atom_maxima, threshold_centroid,
};
use self::fit::{CoreFitProblem, FitSample, fit_burgers, fit_cores, jump_candidates};
use self::neighbors::neighbor_pairs;
use super::config::{AnalysisConfig, CoreEstimator};
use super::error::DislocationError;
use super::progress::{Phase, ProgressReporter};
use crate::core::crystal::orientation::Axis;
use crate::core::crystal::structure::Crystal;
use crate::core::elasticity::field::DisplacementField;
use crate::core::models::configuration::AtomicConfiguration;
use crate::core::models::structure::DislocationStructure;
use crate::core::utils::geometry::in_plane;
use nalgebra::{Point3, Vector2, Vector3};
use tracing::{debug, info, instrument, warn};

/// Convergence threshold on the spread of simplex costs, in Å².
const FIT_COST_TOLERANCE: f64 = 1e-14;

#[derive(Debug, Clone, PartialEq)]
pub struct CoreMeasurement {
    /// Centroid of the fitted partial cores, at mid-height of the cell.
    pub core_position: Point3<f64>,
    /// Fitted in-plane position of each partial.
    pub partial_cores: Vec<Vector2<f64>>,
    /// Burgers vector enclosed by the circuit.
    pub burgers_vector: Vector3<f64>,
    pub expected_burgers: Vector3<f64>,
    /// Least-squares Burgers vector of each partial at the fitted cores.
    pub partial_burgers: Vec<Vector3<f64>>,
    /// Rigid translation separating the measured displacements from the model.
    pub translation: Vector3<f64>,
    /// Atom indices, in the order of the relaxed configuration.
    pub atom_indices: Vec<usize>,
    /// Signed largest differential displacement touching each atom.
    pub differential_displacements: Vec<f64>,
    /// Every bonded pair with its differential displacement.
    pub pairs: Vec<DifferentialDisplacement>,
    /// Indices of the atoms on the Burgers circuit, in traversal order.
    pub circuit_atoms: Vec<usize>,
    /// Weighted RMS misfit against the continuum model, in Å.
    pub fit_residual: f64,
    pub consistent: bool,
    pub tolerance: f64,
}

impl CoreMeasurement {
    /// Fails with [`DislocationError::BurgersVectorMismatch`] unless the
    /// circuit closed on the expected Burgers vector.
    pub fn ensure_consistent(&self) -> Result<(), DislocationError> {
        if self.consistent {
            Ok(())
        } else {
            Err(DislocationError::BurgersVectorMismatch {
                expected: self.expected_burgers,
                measured: self.burgers_vector,
                tolerance: self.tolerance,
            })
        }
    }
}

struct AlignedAtoms {
    indices: Vec<usize>,
    positions: Vec<Point3<f64>>,
    displacements: Vec<Vector3<f64>>,
}

/// Measures a dislocation against the structure it is expected to contain.
#[derive(Debug, Clone)]
pub struct Analyzer {
    crystal: Crystal,
    structure: DislocationStructure,
    fields: Vec<DisplacementField>,
    config: AnalysisConfig,
}

impl Analyzer {
    /// `fields` holds one displacement field per partial of `structure`, in
    /// the same order.
    pub fn new(
        crystal: Crystal,
        structure: DislocationStructure,
        fields: Vec<DisplacementField>,
        config: AnalysisConfig,
    ) -> Result<Self, DislocationError> {
        if fields.len() != structure.burgers.len() {
            return Err(DislocationError::InvalidInput(format!(
                "{} partials but {} displacement fields",
                structure.burgers.len(),
                fields.len()
            )));
        }
        Ok(Self {
            crystal,
            structure,
            fields,
            config,
        })
    }

    pub fn structure(&self) -> &DislocationStructure {
        &self.structure
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Compares `relaxed` against `reference`.
    ///
    /// A Burgers vector that disagrees with the expected one is reported
    /// through [`CoreMeasurement::consistent`], not as an error; call
    /// [`CoreMeasurement::ensure_consistent`] for the strict check.
    #[instrument(skip_all, name = "analyze_dislocation")]
    pub fn analyze(
        &self,
        reference: &AtomicConfiguration,
        relaxed: &AtomicConfiguration,
        reporter: &ProgressReporter,
    ) -> Result<CoreMeasurement, DislocationError> {
        let tolerances = &self.config.tolerances;
        let expected = self.structure.burgers.total();
        let magnitude = expected.norm();
        if magnitude <= tolerances.position {
            return Err(DislocationError::InvalidInput(
                "expected net Burgers vector is zero".into(),
            ));
        }
        let aligned = align(reference, relaxed)?;
        let d1 = self.crystal.nearest_neighbor_distance();
        let d2 = self.crystal.second_neighbor_distance();

        let (pairs, per_atom) = reporter.phase(Phase::Neighbors, || {
            let cutoff = self.config.neighbor_cutoff.unwrap_or(0.5 * (d1 + d2));
            let bonds = neighbor_pairs(&aligned.positions, reference, cutoff);
            let dds = differential_displacements(
                &bonds,
                &aligned.positions,
                &aligned.displacements,
                &expected,
            );
            let per_atom = per_atom_maxima(aligned.positions.len(), &dds);
            debug!(pairs = dds.len(), cutoff, "Differential displacements computed.");
            (dds, per_atom)
        });

        let threshold = self.config.dd_threshold * 0.5 * magnitude;
        let guess = threshold_centroid(&pairs, threshold).unwrap_or_else(|| {
            warn!(
                threshold,
                "No differential displacement above threshold; starting from the nominal core."
            );
            self.structure.core
        });

        let partials = self.structure.burgers.partials();
        let mean_offset = partials.iter().map(|p| p.offset).sum::<Vector2<f64>>() / partials.len() as f64;
        let initial: Vec<Vector2<f64>> = partials
            .iter()
            .map(|p| guess + p.offset - mean_offset)
            .collect();
        let spread = partials
            .iter()
            .map(|p| (p.offset - mean_offset).norm())
            .fold(0.0_f64, f64::max);

        let fit_radius = self.config.fit_radius.unwrap_or(spread + 4.0 * d2);
        let samples: Vec<FitSample> = aligned
            .positions
            .iter()
            .zip(&aligned.displacements)
            .map(|(p, u)| FitSample {
                position: in_plane(p),
                displacement: *u,
            })
            .filter(|s| (s.position - guess).norm() < fit_radius)
            .collect();
        if samples.is_empty() {
            return Err(DislocationError::CoreFit(format!(
                "no atoms within {fit_radius:.3} Å of the core estimate"
            )));
        }

        let rotation = self.structure.orientation.rotation();
        let cell_vectors = periodic_cell_vectors(relaxed);
        let mut extra = self.crystal.translations_within(1.01 * magnitude.max(d1), rotation);
        extra.extend_from_slice(&cell_vectors);
        let partial_burgers: Vec<Vector3<f64>> = partials.iter().map(|p| p.burgers).collect();
        let jumps = jump_candidates(&partial_burgers, &extra);

        let (cores, fit_residual) = reporter.phase(Phase::CoreFit, || {
            let problem = CoreFitProblem::new(&self.fields, &samples, &jumps, d1);
            match self.config.estimator {
                CoreEstimator::Centroid => {
                    let residual = problem.residual(&initial);
                    Ok((initial, residual))
                }
                CoreEstimator::LeastSquares => fit_cores(
                    problem,
                    &initial,
                    0.25 * d1,
                    self.config.max_fit_iterations,
                    FIT_COST_TOLERANCE,
                )
                .map(|fit| (fit.cores, fit.residual)),
            }
        })?;
        if let Some(stray) = cores.iter().find(|c| (*c - guess).norm() > fit_radius) {
            return Err(DislocationError::CoreFit(format!(
                "fitted core {stray:?} left the fitting region of radius {fit_radius:.3} Å"
            )));
        }
        let burgers_fit = fit_burgers(
            &CoreFitProblem::new(&self.fields, &samples, &jumps, d1),
            &cores,
        )?;

        let center = cores.iter().sum::<Vector2<f64>>() / cores.len() as f64;
        let circuit = reporter.phase(Phase::BurgersCircuit, || {
            let core_spread = cores
                .iter()
                .map(|c| (c - center).norm())
                .fold(0.0_f64, f64::max);
            let radius = self
                .config
                .circuit_radius
                .unwrap_or((3.0 * d2).max(core_spread + 2.0 * d2));
            let planar: Vec<Vector2<f64>> = aligned.positions.iter().map(in_plane).collect();
            let mut translations = self.crystal.translations_within(1.01 * magnitude.max(d2), rotation);
            translations.extend_from_slice(&cell_vectors);
            burgers_circuit(
                &planar,
                &aligned.displacements,
                &center,
                radius,
                d2,
                self.fields[0].cut(),
                &translations,
            )
        })?;

        let mismatch = (circuit.burgers - expected).norm();
        let consistent = mismatch <= tolerances.burgers_mismatch;
        let z_mid = relaxed.origin().z + 0.5 * relaxed.cell_vector(Axis::Z).z;
        info!(
            core_x = center.x,
            core_y = center.y,
            residual = fit_residual,
            mismatch,
            consistent,
            "Dislocation analyzed."
        );
        if !consistent {
            warn!(
                ?expected,
                measured = ?circuit.burgers,
                "Burgers circuit does not close on the expected vector."
            );
        }

        Ok(CoreMeasurement {
            core_position: Point3::new(center.x, center.y, z_mid),
            partial_cores: cores,
            burgers_vector: circuit.burgers,
            expected_burgers: expected,
            partial_burgers: burgers_fit.partials,
            translation: burgers_fit.translation,
            circuit_atoms: circuit.atoms.iter().map(|&slot| aligned.indices[slot]).collect(),
            atom_indices: aligned.indices,
            differential_displacements: per_atom,
            pairs,
            fit_residual,
            consistent,
            tolerance: tolerances.burgers_mismatch,
        })
    }
}

/// Matches every relaxed atom to its reference by index.
fn align(
    reference: &AtomicConfiguration,
    relaxed: &AtomicConfiguration,
) -> Result<AlignedAtoms, DislocationError> {
    if reference.len() != relaxed.len() {
        return Err(DislocationError::InvalidInput(format!(
            "reference has {} atoms, relaxed configuration has {}",
            reference.len(),
            relaxed.len()
        )));
    }
    let slots = reference.index_map()?;
    relaxed.index_map()?;
    let mut aligned = AlignedAtoms {
        indices: Vec::with_capacity(relaxed.len()),
        positions: Vec::with_capacity(relaxed.len()),
        displacements: Vec::with_capacity(relaxed.len()),
    };
    for atom in relaxed.atoms() {
        let slot = slots.get(&atom.index).ok_or_else(|| {
            DislocationError::InvalidInput(format!("atom {} has no reference position", atom.index))
        })?;
        let origin = reference.atoms()[*slot].position;
        aligned.indices.push(atom.index);
        aligned.positions.push(origin);
        aligned
            .displacements
            .push(relaxed.minimum_image(&(atom.position - origin)));
    }
    Ok(aligned)
}

fn periodic_cell_vectors(config: &AtomicConfiguration) -> Vec<Vector3<f64>> {
    Axis::ALL
        .iter()
        .filter(|&&axis| config.is_periodic(axis))
        .flat_map(|&axis| {
            let v = config.cell_vector(axis);
            [v, -v]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crystal::orientation::CrystalOrientation;
    use crate::core::crystal::structure::CrystalStructure;
    use crate::core::elasticity::field::{BranchCut, SolverSettings};
    use crate::core::elasticity::tensor::ElasticConstants;
    use crate::core::models::burgers::BurgersConfig;
    use crate::core::models::configuration::Boundary;
    use crate::engine::config::Dimensions;
    use crate::engine::constructor::{ConstructorOptions, DislocationConstructor, default_core};
    use crate::engine::lattice::LatticeBuilder;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const A: f64 = 3.0;

    struct Setup {
        analyzer: Analyzer,
        reference: AtomicConfiguration,
        configuration: AtomicConfiguration,
        core: Vector2<f64>,
        burgers: Vector3<f64>,
    }

    fn screw_setup(core_shift: Vector2<f64>) -> Setup {
        screw_setup_in(ElasticConstants::isotropic(50.0, 0.3).unwrap(), core_shift)
    }

    fn screw_setup_in(constants: ElasticConstants, core_shift: Vector2<f64>) -> Setup {
        let crystal = Crystal::new(CrystalStructure::Bcc, A).unwrap();
        let orientation = CrystalOrientation::new([1, 1, -2], [-1, 1, 0], [1, 1, 1]).unwrap();
        let lattice = LatticeBuilder::new(crystal.clone(), orientation.clone(), "Fe")
            .boundaries([Boundary::Open, Boundary::Open, Boundary::Periodic])
            .build(&Dimensions::repeats([4, 7, 1]))
            .unwrap();
        let core = default_core(&lattice) + core_shift;
        let burgers = Vector3::new(0.0, 0.0, A * 3f64.sqrt() / 2.0);
        let structure = DislocationStructure::new(
            "bcc-screw",
            orientation.clone(),
            BurgersConfig::compact(burgers),
            core,
        );
        let field = DisplacementField::solve(
            &constants,
            &burgers,
            &orientation,
            BranchCut::default(),
            &SolverSettings::default(),
        )
        .unwrap();
        let built = DislocationConstructor::new(
            structure.clone(),
            vec![field.clone()],
            ConstructorOptions::default(),
        )
        .unwrap()
        .construct(&lattice)
        .unwrap();
        Setup {
            analyzer: Analyzer::new(crystal, structure, vec![field], AnalysisConfig::default()).unwrap(),
            reference: built.reference,
            configuration: built.configuration,
            core,
            burgers,
        }
    }

    #[test]
    fn unrelaxed_screw_round_trips() {
        let setup = screw_setup(Vector2::new(0.3, 0.1));
        let measurement = setup
            .analyzer
            .analyze(&setup.reference, &setup.configuration, &ProgressReporter::new())
            .unwrap();
        assert!((measurement.burgers_vector - setup.burgers).norm() < 1e-6);
        assert!(measurement.consistent);
        assert!(measurement.ensure_consistent().is_ok());
        assert!(
            (measurement.partial_cores[0] - setup.core).norm() < 1e-3,
            "fitted {:?}, expected {:?}",
            measurement.partial_cores[0],
            setup.core
        );
        assert!((measurement.partial_burgers[0] - setup.burgers).norm() < 1e-4);
        assert_eq!(measurement.atom_indices.len(), setup.configuration.len());
        assert_eq!(
            measurement.differential_displacements.len(),
            setup.configuration.len()
        );
    }

    #[test]
    fn anisotropic_screw_round_trips_with_noise() {
        let iron = ElasticConstants::cubic(243.0, 145.0, 116.0).unwrap();
        let setup = screw_setup_in(iron, Vector2::new(-0.2, 0.15));
        let mut rng = StdRng::seed_from_u64(11);
        let mut noisy = setup.configuration.clone();
        for atom in noisy.atoms_mut() {
            atom.position += Vector3::new(
                rng.gen_range(-0.03..0.03),
                rng.gen_range(-0.03..0.03),
                rng.gen_range(-0.03..0.03),
            );
        }
        let exact = setup
            .analyzer
            .analyze(&setup.reference, &setup.configuration, &ProgressReporter::new())
            .unwrap();
        assert!((exact.partial_cores[0] - setup.core).norm() < 1e-3);
        let measurement = setup
            .analyzer
            .analyze(&setup.reference, &noisy, &ProgressReporter::new())
            .unwrap();
        assert!((measurement.burgers_vector - setup.burgers).norm() < 1e-6);
        assert!((measurement.partial_cores[0] - setup.core).norm() < 0.5);
    }

    #[test]
    fn centroid_estimator_lands_near_core() {
        let mut setup = screw_setup(Vector2::zeros());
        setup.analyzer.config.estimator = CoreEstimator::Centroid;
        let measurement = setup
            .analyzer
            .analyze(&setup.reference, &setup.configuration, &ProgressReporter::new())
            .unwrap();
        assert!((measurement.partial_cores[0] - setup.core).norm() < A);
        assert!((measurement.burgers_vector - setup.burgers).norm() < 1e-6);
    }

    #[test]
    fn noisy_positions_keep_burgers_vector() {
        let setup = screw_setup(Vector2::zeros());
        let mut rng = StdRng::seed_from_u64(7);
        let mut noisy = setup.configuration.clone();
        for atom in noisy.atoms_mut() {
            atom.position += Vector3::new(
                rng.gen_range(-0.05..0.05),
                rng.gen_range(-0.05..0.05),
                rng.gen_range(-0.05..0.05),
            );
        }
        let measurement = setup
            .analyzer
            .analyze(&setup.reference, &noisy, &ProgressReporter::new())
            .unwrap();
        assert!((measurement.burgers_vector - setup.burgers).norm() < 1e-6);
        assert!((measurement.partial_cores[0] - setup.core).norm() < 0.5);
    }

    #[test]
    fn perfect_crystal_is_flagged_inconsistent() {
        let mut setup = screw_setup(Vector2::zeros());
        setup.analyzer.config.estimator = CoreEstimator::Centroid;
        let measurement = setup
            .analyzer
            .analyze(&setup.reference, &setup.reference, &ProgressReporter::new())
            .unwrap();
        assert!(!measurement.consistent);
        assert!(measurement.burgers_vector.norm() < 1e-9);
        assert!(matches!(
            measurement.ensure_consistent(),
            Err(DislocationError::BurgersVectorMismatch { .. })
        ));
    }

    #[test]
    fn missing_atoms_are_rejected() {
        let setup = screw_setup(Vector2::zeros());
        let mut relaxed = setup.configuration.clone();
        relaxed.retain(|a| a.index != 0);
        assert!(matches!(
            setup
                .analyzer
                .analyze(&setup.reference, &relaxed, &ProgressReporter::new()),
            Err(DislocationError::InvalidInput(_))
        ));
    }

    #[test]
    fn atoms_wrapped_across_periodic_boundary_do_not_bias_displacements() {
        let setup = screw_setup(Vector2::zeros());
        let mut wrapped = setup.configuration.clone();
        let lz = wrapped.cell_vector(Axis::Z);
        for atom in wrapped.atoms_mut().iter_mut().step_by(3) {
            atom.position += lz;
        }
        let direct = setup
            .analyzer
            .analyze(&setup.reference, &setup.configuration, &ProgressReporter::new())
            .unwrap();
        let shifted = setup
            .analyzer
            .analyze(&setup.reference, &wrapped, &ProgressReporter::new())
            .unwrap();
        assert!((direct.burgers_vector - shifted.burgers_vector).norm() < 1e-9);
        for (a, b) in direct
            .differential_displacements
            .iter()
            .zip(&shifted.differential_displacements)
        {
            assert!((a - b).abs() < 1e-9);
        }
    }
}
