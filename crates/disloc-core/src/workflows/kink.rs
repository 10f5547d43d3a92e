use super::construct::ConstructionResult;
use crate::core::models::configuration::ModelError;
use crate::core::models::kink::{KinkGeometry, KinkPairSpecification, TransitionProfile};
use crate::engine::constructor::ConstructedDislocation;
use crate::engine::error::DislocationError;
use crate::engine::kinks::build_kink_pair;
use crate::engine::progress::{Phase, ProgressReporter};
use nalgebra::Vector2;
use tracing::instrument;

/// Validated kink specification; rejected parameters surface as
/// [`DislocationError::InvalidKinkGeometry`].
pub fn specification(
    geometry: KinkGeometry,
    width: f64,
    offset: Vector2<f64>,
    segments: usize,
    profile: TransitionProfile,
) -> Result<KinkPairSpecification, DislocationError> {
    let spec = match geometry {
        KinkGeometry::Double { first, second } => {
            KinkPairSpecification::double(first, second, width, offset, segments)
        }
        KinkGeometry::Single { position } => {
            KinkPairSpecification::single(position, width, offset, segments)
        }
    };
    spec.map(|s| s.with_profile(profile)).map_err(|e| match e {
        ModelError::InvalidKink(reason) => DislocationError::InvalidKinkGeometry(reason),
        other => other.into(),
    })
}

/// Builds a kinked line on top of a straight construction.
#[instrument(skip_all, name = "kink_workflow")]
pub fn run(
    construction: &ConstructionResult,
    spec: &KinkPairSpecification,
    reporter: &ProgressReporter,
) -> Result<ConstructedDislocation, DislocationError> {
    reporter.phase(Phase::Kinks, || build_kink_pair(&construction.straight, spec))
}
