use super::construct::ConstructionResult;
use crate::core::models::configuration::AtomicConfiguration;
use crate::engine::analysis::{Analyzer, CoreMeasurement};
use crate::engine::config::AnalysisConfig;
use crate::engine::error::DislocationError;
use crate::engine::progress::ProgressReporter;
use tracing::instrument;

/// Measures `relaxed` against the reference of a construction run.
///
/// The same fields and structure that built the dislocation serve as the
/// model, so the analysis shares the construction's branch cut and
/// tolerances.
///
/// # Errors
///
/// Returns [`DislocationError::BurgersVectorMismatch`] if the Burgers circuit
/// does not close on the constructed Burgers vector.
#[instrument(skip_all, name = "measure_workflow")]
pub fn run(
    construction: &ConstructionResult,
    relaxed: &AtomicConfiguration,
    config: &AnalysisConfig,
    reporter: &ProgressReporter,
) -> Result<CoreMeasurement, DislocationError> {
    let analyzer = Analyzer::new(
        construction.straight.lattice.crystal().clone(),
        construction.dislocation.structure.clone(),
        construction.fields.clone(),
        config.clone(),
    )?;
    let measurement = analyzer.analyze(&construction.dislocation.reference, relaxed, reporter)?;
    measurement.ensure_consistent()?;
    Ok(measurement)
}
