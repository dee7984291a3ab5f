use std::sync::Arc;

use crate::characteristics::CharacteristicsCalculator;
use crate::config::SamplingConfig;
use crate::error::{Error, Result};
use crate::features::FeatureCache;
use crate::generator::{ParameterGenerator, RandomGenerator};
use crate::image::{ImageSource, SeedSource};
use crate::range::ParameterRange;
use crate::registry::Registry;
use crate::solver::DEFAULT_TOLERANCE;
use crate::storage::{FolderStore, MemoryStore, ResultStore};
use crate::volume::{Dimensions, LabelVolume};

use super::pipeline::Context;
use super::{AbortHandle, EnsembleSampler, NoProgress, ProgressSink, Shared};

/// A builder for [`EnsembleSampler`] instances with a fluent API.
///
/// Created via [`EnsembleSampler::builder()`].
///
/// # Defaults
///
/// - Generator: [`RandomGenerator`]
/// - Sample count: 10
/// - Concurrency: 1
/// - Store: [`MemoryStore`], probability volumes not kept
/// - Progress: [`NoProgress`]
/// - Solver tolerance: [`DEFAULT_TOLERANCE`]
pub struct EnsembleSamplerBuilder {
    image: Arc<dyn ImageSource>,
    seeds: Arc<dyn SeedSource>,
    range: ParameterRange,
    generator: Option<Arc<dyn ParameterGenerator>>,
    sample_count: usize,
    concurrency: usize,
    store: Option<Arc<dyn ResultStore>>,
    store_probabilities: bool,
    ground_truth: Option<Arc<LabelVolume>>,
    progress: Option<Arc<dyn ProgressSink>>,
    solver_tolerance: f64,
    abort: Option<AbortHandle>,
}

impl EnsembleSamplerBuilder {
    pub(super) fn new(
        image: Arc<dyn ImageSource>,
        seeds: Arc<dyn SeedSource>,
        range: ParameterRange,
    ) -> Self {
        Self {
            image,
            seeds,
            range,
            generator: None,
            sample_count: 10,
            concurrency: 1,
            store: None,
            store_probabilities: false,
            ground_truth: None,
            progress: None,
            solver_tolerance: DEFAULT_TOLERANCE,
            abort: None,
        }
    }

    /// Set the parameter generator.
    #[must_use]
    pub fn generator(mut self, generator: impl ParameterGenerator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Set a generator obtained from a [`Registry`].
    #[must_use]
    pub fn generator_arc(mut self, generator: Arc<dyn ParameterGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Number of parameter sets to request.
    #[must_use]
    pub fn sample_count(mut self, count: usize) -> Self {
        self.sample_count = count;
        self
    }

    /// Maximum number of classify-and-solve pipelines in flight; must be at least 1.
    #[must_use]
    pub fn concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit;
        self
    }

    /// Where results go.
    #[must_use]
    pub fn store(mut self, store: impl ResultStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Keep the per-label probability volumes and hand them to the store.
    #[must_use]
    pub fn store_probabilities(mut self, keep: bool) -> Self {
        self.store_probabilities = keep;
        self
    }

    /// Reference segmentation; enables the overlap characteristics.
    #[must_use]
    pub fn ground_truth(mut self, labels: LabelVolume) -> Self {
        self.ground_truth = Some(Arc::new(labels));
        self
    }

    /// Receiver of progress percentages and status messages.
    #[must_use]
    pub fn progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Arc::new(sink));
        self
    }

    /// Relative residual at which the solver's linear solve counts as converged.
    #[must_use]
    pub fn solver_tolerance(mut self, tolerance: f64) -> Self {
        self.solver_tolerance = tolerance;
        self
    }

    /// Use an existing abort handle instead of a fresh one.
    #[must_use]
    pub fn abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    /// Apply a [`SamplingConfig`], resolving its generator through `registry`.
    ///
    /// An `output_dir` selects a [`FolderStore`] with the configured file names.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownGenerator` if the generator name is not registered.
    pub fn config(mut self, config: &SamplingConfig, registry: &Registry) -> Result<Self> {
        self.generator = Some(registry.generator(&config.generator, config.seed)?);
        self.sample_count = config.sample_count;
        self.concurrency = config.concurrency;
        self.store_probabilities = config.store_probabilities;
        if let Some(dir) = &config.output_dir {
            self.store = Some(Arc::new(
                FolderStore::new(dir).files(config.files.clone()),
            ));
        }
        Ok(self)
    }

    /// Validate the options and build the sampler.
    ///
    /// # Errors
    ///
    /// Returns the range's validation error, `Error::InvalidConfig` for a zero
    /// concurrency or a non-positive tolerance, `Error::InsufficientChannels`
    /// if the image has fewer channels than the range declares, and
    /// `Error::ShapeMismatch` if the ground truth does not match the image.
    pub fn build(self) -> Result<EnsembleSampler> {
        self.range.validate()?;
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".into()));
        }
        if !(self.solver_tolerance.is_finite() && self.solver_tolerance > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "solver tolerance must be positive, got {}",
                self.solver_tolerance
            )));
        }
        if self.image.channel_count() < self.range.channel_count() {
            return Err(Error::InsufficientChannels {
                required: self.range.channel_count(),
                available: self.image.channel_count(),
            });
        }

        let mut calculator = CharacteristicsCalculator::new();
        if let Some(truth) = self.ground_truth {
            self.image
                .dimensions()
                .ensure_same(Dimensions::of(truth.as_ref()), "ground truth")?;
            calculator = calculator.with_ground_truth(truth);
        }

        let generator = self
            .generator
            .unwrap_or_else(|| Arc::new(RandomGenerator::new()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let progress = self.progress.unwrap_or_else(|| Arc::new(NoProgress));

        let context = Context {
            image: self.image,
            seeds: self.seeds,
            range: self.range.clone(),
            features: FeatureCache::new(),
            calculator,
            solver_tolerance: self.solver_tolerance,
            store_probabilities: self.store_probabilities,
        };

        Ok(EnsembleSampler {
            context: Arc::new(context),
            generator,
            range: self.range,
            sample_count: self.sample_count,
            concurrency: self.concurrency,
            store,
            progress,
            abort: self.abort.unwrap_or_default(),
            shared: Arc::new(Shared::new()),
        })
    }
}
