/// Stages of a construction or analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ElasticSolution,
    Lattice,
    Displacement,
    Kinks,
    Neighbors,
    CoreFit,
    BurgersCircuit,
    Batch,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ElasticSolution => "Elastic solution",
            Self::Lattice => "Lattice",
            Self::Displacement => "Displacement",
            Self::Kinks => "Kink geometry",
            Self::Neighbors => "Neighbor search",
            Self::CoreFit => "Core fit",
            Self::BurgersCircuit => "Burgers circuit",
            Self::Batch => "Batch construction",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { phase: Phase },
    PhaseFinish { phase: Phase },

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    Message(String),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Runs `f` between a start and a finish event for `phase`. The finish
    /// event is reported even when `f` fails.
    pub fn phase<T>(&self, phase: Phase, f: impl FnOnce() -> T) -> T {
        self.report(Progress::PhaseStart { phase });
        let result = f();
        self.report(Progress::PhaseFinish { phase });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn phase_reports_start_and_finish() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { phase } | Progress::PhaseFinish { phase } = event {
                events.lock().unwrap().push(phase.name());
            }
        }));
        let value = reporter.phase(Phase::Lattice, || 42);
        assert_eq!(value, 42);
        drop(reporter);
        assert_eq!(events.into_inner().unwrap(), vec!["Lattice", "Lattice"]);
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::Message("ignored".into()));
        assert_eq!(reporter.phase(Phase::CoreFit, || "done"), "done");
    }
}
