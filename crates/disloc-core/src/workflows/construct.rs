use crate::core::elasticity::field::DisplacementField;
use crate::core::models::structure::DislocationStructure;
use crate::engine::cache::FieldCache;
use crate::engine::config::ConstructionConfig;
use crate::engine::constructor::{
    ConstructedDislocation, ConstructorOptions, DislocationConstructor, StraightDislocation,
    default_core,
};
use crate::engine::error::DislocationError;
use crate::engine::lattice::LatticeBuilder;
use crate::engine::progress::{Phase, ProgressReporter};
use tracing::{info, instrument};

/// Angular tolerance used to name the dislocation character.
const CHARACTER_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructionResult {
    pub dislocation: ConstructedDislocation,
    /// Recipe for rebuilding the line, e.g. as the base of a kinked cell.
    pub straight: StraightDislocation,
    /// One solved field per partial, in partial order.
    pub fields: Vec<DisplacementField>,
}

/// Builds the lattice, solves one elastic field per partial and displaces the
/// lattice.
///
/// Fields come from `cache` when an identical problem was solved before.
#[instrument(skip_all, name = "construct_workflow")]
pub fn run(
    config: &ConstructionConfig,
    cache: &mut FieldCache,
    reporter: &ProgressReporter,
) -> Result<ConstructionResult, DislocationError> {
    let material = &config.material;
    let builder = LatticeBuilder::new(
        material.crystal.clone(),
        config.orientation.clone(),
        &material.species,
    )
    .boundaries(config.boundaries);

    let lattice = reporter.phase(Phase::Lattice, || builder.build(&config.dimensions))?;
    let core = config.core.unwrap_or_else(|| default_core(&lattice));
    let character = config.burgers.character(CHARACTER_TOLERANCE);
    let name = format!("{}-{}", material.species, format!("{character:?}").to_lowercase());
    let structure = DislocationStructure::new(
        &name,
        config.orientation.clone(),
        config.burgers.clone(),
        core,
    );

    let settings = config.tolerances.solver_settings();
    let fields = reporter.phase(Phase::ElasticSolution, || {
        structure
            .burgers
            .partials()
            .iter()
            .map(|partial| {
                cache.get_or_solve(
                    &material.elastic_constants,
                    &partial.burgers,
                    &config.orientation,
                    config.branch_cut,
                    &settings,
                )
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let options = ConstructorOptions {
        exclusion_radius: config.exclusion_radius,
        cluster: config.cluster,
        fixed_shell: config.fixed_shell,
        adjust_cell: config.adjust_cell,
        tolerances: config.tolerances,
    };
    let constructor = DislocationConstructor::new(structure, fields.clone(), options)?;
    let dislocation = reporter.phase(Phase::Displacement, || constructor.construct(&lattice))?;
    info!(
        name = %name,
        atoms = dislocation.configuration.len(),
        lattice_atoms = lattice.len(),
        "Construction workflow finished."
    );

    Ok(ConstructionResult {
        dislocation,
        straight: StraightDislocation {
            lattice: builder,
            dimensions: config.dimensions,
            constructor,
        },
        fields,
    })
}
