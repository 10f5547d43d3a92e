use super::construct::{self, ConstructionResult};
use crate::engine::cache::FieldCache;
use crate::engine::config::ConstructionConfig;
use crate::engine::error::DislocationError;
use crate::engine::progress::{Phase, Progress, ProgressReporter};
use tracing::{info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Constructs every configuration independently.
///
/// Each job owns its own [`FieldCache`], so jobs share no mutable state and
/// run in parallel when the `parallel` feature is enabled. Results keep the
/// order of `configs`; one failing job does not stop the others.
#[instrument(skip_all, name = "batch_workflow")]
pub fn run(
    configs: &[ConstructionConfig],
    reporter: &ProgressReporter,
) -> Vec<Result<ConstructionResult, DislocationError>> {
    reporter.phase(Phase::Batch, || {
        reporter.report(Progress::TaskStart {
            total_steps: configs.len() as u64,
        });

        let iterator = configs.iter();

        #[cfg(feature = "parallel")]
        let iterator = configs.par_iter();

        let results: Vec<_> = iterator
            .map(|config| {
                let result =
                    construct::run(config, &mut FieldCache::new(), &ProgressReporter::new());
                reporter.report(Progress::TaskIncrement);
                result
            })
            .collect();

        reporter.report(Progress::TaskFinish);
        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(jobs = results.len(), failed, "Batch construction finished.");
        results
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::burgers::BurgersConfig;
    use crate::core::models::configuration::Boundary;
    use crate::engine::config::Dimensions;
    use crate::workflows::construct::tests::bcc_screw_config;
    use nalgebra::Vector3;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn batch_matches_individual_runs_in_order() {
        let mut wide = bcc_screw_config();
        wide.dimensions = Dimensions::repeats([5, 7, 1]);
        let configs = vec![bcc_screw_config(), wide];

        let results = run(&configs, &ProgressReporter::new());
        assert_eq!(results.len(), 2);
        for (config, result) in configs.iter().zip(&results) {
            let single =
                construct::run(config, &mut FieldCache::new(), &ProgressReporter::new()).unwrap();
            assert_eq!(result.as_ref().unwrap(), &single);
        }
    }

    #[test]
    fn failing_job_does_not_abort_batch() {
        let mut periodic = bcc_screw_config();
        periodic.boundaries = [Boundary::Periodic; 3];
        periodic.burgers = BurgersConfig::compact(Vector3::new(1.0, 0.0, 0.0));
        let configs = vec![periodic, bcc_screw_config()];

        let increments = AtomicUsize::new(0);
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if matches!(event, Progress::TaskIncrement) {
                increments.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let results = run(&configs, &reporter);
        drop(reporter);

        assert!(matches!(
            results[0],
            Err(DislocationError::IncompatiblePeriodicity { .. })
        ));
        assert!(results[1].is_ok());
        assert_eq!(increments.into_inner(), 2);
    }
}
