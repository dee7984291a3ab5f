//! The per-sample stages, run on blocking worker threads.

use std::sync::Arc;
use std::time::Instant;

use crate::characteristics::CharacteristicsCalculator;
use crate::classifier::{ClassifierParams, ProbabilisticClassifier};
use crate::error::{Error, Result};
use crate::features::FeatureCache;
use crate::image::{ImageSource, SeedSource};
use crate::parameter_set::ParameterSet;
use crate::range::ParameterRange;
use crate::result::{DerivedOutput, SamplingResults, SingleResult};
use crate::solver::{DiffusionLabelSolver, InputChannel, LabelingResult, Normalizer};
use crate::storage::ResultStore;
use crate::volume::ProbabilityVolumeSet;

/// Everything a sample needs that does not change during a run.
pub(super) struct Context {
    pub(super) image: Arc<dyn ImageSource>,
    pub(super) seeds: Arc<dyn SeedSource>,
    pub(super) range: ParameterRange,
    pub(super) features: FeatureCache,
    pub(super) calculator: CharacteristicsCalculator,
    pub(super) solver_tolerance: f64,
    pub(super) store_probabilities: bool,
}

impl Context {
    /// Prior probabilities for `set`.
    pub(super) fn classify(&self, set: &ParameterSet) -> Result<ProbabilityVolumeSet> {
        ProbabilisticClassifier::new(ClassifierParams::from_parameter_set(set))
            .run(self.seeds.as_ref(), self.image.as_ref())
    }

    /// Labels and probabilities for `set` given its priors.
    pub(super) fn solve(
        &self,
        set: &ParameterSet,
        priors: ProbabilityVolumeSet,
    ) -> Result<LabelingResult> {
        let mut channels = Vec::with_capacity(set.channels.len());
        for (index, channel) in set.channels.iter().enumerate() {
            let distance = self
                .range
                .distance_function(index, channel.distance_index)
                .ok_or_else(|| {
                    Error::SolverFailed(format!(
                        "channel {index}: distance index {} is not declared",
                        channel.distance_index
                    ))
                })?;
            let features =
                self.features
                    .channel(self.image.as_ref(), index, channel.reduced_dim as usize)?;
            channels.push(InputChannel::new(
                features,
                distance,
                Normalizer::Gaussian { beta: set.beta },
                channel.weight,
            ));
        }

        DiffusionLabelSolver::new(
            self.image.dimensions(),
            self.image.spacing(),
            channels,
            priors,
            set.gamma,
            set.max_iterations as usize,
        )
        .with_tolerance(self.solver_tolerance)
        .run()
    }

    /// Package a solved sample; `seconds` covers classify and solve.
    pub(super) fn assemble(
        &self,
        set: ParameterSet,
        labeling: LabelingResult,
        seconds: f64,
    ) -> SingleResult {
        let probabilities = self.store_probabilities.then_some(labeling.probabilities);
        let mut result = SingleResult::new(set, labeling.labels, probabilities);
        result.set_derived(DerivedOutput::Duration, seconds);
        result
    }
}

/// What happened to a finished sample.
pub(super) enum Finished {
    /// Accepted into the results; carries the number of accepted results.
    Accepted(usize),
    /// Dropped with the reason.
    Dropped(String),
}

/// Characterise, write and accept one sample.
pub(super) fn finish(
    context: &Context,
    store: &dyn ResultStore,
    results: &parking_lot::Mutex<SamplingResults>,
    mut result: SingleResult,
) -> Finished {
    let id = result.id;
    let written = context
        .calculator
        .compute(&mut result)
        .and_then(|()| store.write_sample(&result, context.store_probabilities));
    if let Err(e) = written {
        return Finished::Dropped(format!("sample {id} dropped: {e}"));
    }

    let mut results = results.lock();
    if let Err(e) = results.add_result(result) {
        return Finished::Dropped(format!("sample {id} dropped: {e}"));
    }
    if let Some(accepted) = results.get(id) {
        if let Err(e) = store.append(&results, accepted) {
            trace_warn!(id, error = %e, "summary files not updated");
        }
    }
    Finished::Accepted(results.len())
}

/// Seconds since `start`.
pub(super) fn seconds_since(start: Instant) -> f64 {
    start.elapsed().as_secs_f64()
}
