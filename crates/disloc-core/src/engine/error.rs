use thiserror::Error;

use super::config::ConfigError;
use crate::core::crystal::orientation::Axis;
use crate::core::crystal::structure::CrystalError;
use crate::core::elasticity::error::ElasticityError;
use crate::core::models::configuration::ModelError;
use nalgebra::Vector3;

#[derive(Debug, Error)]
pub enum DislocationError {
    #[error("Degenerate elastic problem: {source}")]
    DegenerateElasticity { source: ElasticityError },

    #[error("Elastic solution failed: {source}")]
    Elasticity { source: ElasticityError },

    #[error(
        "Periodic axis {axis:?} is incompatible with the net Burgers component {component:.6} Å along it"
    )]
    IncompatiblePeriodicity { axis: Axis, component: f64 },

    #[error("Invalid kink geometry: {0}")]
    InvalidKinkGeometry(String),

    #[error(
        "Measured Burgers vector {measured:?} differs from expected {expected:?} by more than {tolerance:e}"
    )]
    BurgersVectorMismatch {
        expected: Vector3<f64>,
        measured: Vector3<f64>,
        tolerance: f64,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Crystal error: {source}")]
    Crystal {
        #[from]
        source: CrystalError,
    },

    #[error("Configuration error: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Core fit failed: {0}")]
    CoreFit(String),
}

impl From<ElasticityError> for DislocationError {
    /// Root sets that do not split into three distinct pairs are degenerate;
    /// invalid tensors and solver failures are reported as they are.
    fn from(source: ElasticityError) -> Self {
        match source {
            ElasticityError::RootCount { .. }
            | ElasticityError::DegenerateRoots { .. }
            | ElasticityError::SingularEigenvector { .. } => Self::DegenerateElasticity { source },
            _ => Self::Elasticity { source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unseparated_roots_count_as_degenerate() {
        let degenerate: DislocationError = ElasticityError::DegenerateRoots {
            separation: 1e-9,
            tolerance: 1e-4,
        }
        .into();
        assert!(matches!(
            degenerate,
            DislocationError::DegenerateElasticity { .. }
        ));

        let stalled: DislocationError =
            ElasticityError::SexticNotConverged { iterations: 10 }.into();
        assert!(matches!(stalled, DislocationError::Elasticity { .. }));
        let invalid: DislocationError = ElasticityError::NotPositiveDefinite.into();
        assert!(matches!(invalid, DislocationError::Elasticity { .. }));
    }
}
