//! The ensemble sampler: generate parameter sets, run the pipeline for each,
//! characterise and persist the results.
//!
//! # Lifecycle
//!
//! | State | Entered when |
//! |-------|--------------|
//! | [`Idle`](SamplerState::Idle) | The sampler is built |
//! | [`Generating`](SamplerState::Generating) | [`run`](EnsembleSampler::run) starts |
//! | [`Running`](SamplerState::Running) | Parameter sets exist and the store is prepared |
//! | [`Completed`](SamplerState::Completed) | Every set was launched and all work drained |
//! | [`Aborted`](SamplerState::Aborted) | An [`AbortHandle`] stopped new launches |
//! | [`Failed`](SamplerState::Failed) | Generation failed or a solver reported a fatal error |
//!
//! Each sample runs classify, then solve, on blocking worker threads; at most
//! `concurrency` of these pipelines are in flight. Finished samples are
//! handed to a single finishing task that computes characteristics, writes the
//! sample, accepts it into the [`SamplingResults`] and appends the summaries,
//! so results are accepted in hand-over order. With a concurrency of 1 that
//! is parameter-set order.
//!
//! | Failure | Effect |
//! |---------|--------|
//! | Classifier error | The sample is skipped |
//! | Solver error | No further launches; in-flight work drains; state `Failed` |
//! | Characteristics or write error | The sample is dropped |

mod builder;
mod pipeline;
mod progress;
mod run;

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use core::time::Duration;
use std::sync::Arc;

use parking_lot::Mutex;

pub use builder::EnsembleSamplerBuilder;
pub use progress::{AbortHandle, NoProgress, ProgressSink};

use crate::generator::ParameterGenerator;
use crate::image::{ImageSource, SeedSource};
use crate::range::ParameterRange;
use crate::result::SamplingResults;
use crate::storage::ResultStore;
use crate::types::SamplerState;

use self::pipeline::Context;

/// Outcome of [`EnsembleSampler::run`].
#[derive(Clone, Debug)]
pub struct SamplingReport {
    /// Final state: completed, aborted or failed.
    pub state: SamplerState,
    /// The fatal error that stopped the run, if any.
    pub failure: Option<String>,
    /// Every accepted result.
    pub results: SamplingResults,
}

#[derive(Default)]
struct Timing {
    busy: Duration,
    finished: usize,
    launched: usize,
    total: usize,
}

/// State shared between the dispatch loop and the sample tasks.
struct Shared {
    state: Mutex<SamplerState>,
    started: AtomicBool,
    failure: Mutex<Option<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    timing: Mutex<Timing>,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(SamplerState::Idle),
            started: AtomicBool::new(false),
            failure: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            timing: Mutex::new(Timing::default()),
        }
    }

    fn set_state(&self, state: SamplerState) {
        *self.state.lock() = state;
        trace_debug!(?state, "sampler state");
    }

    /// Record the first fatal error; later ones are only logged.
    fn fail(&self, message: String) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(message);
        } else {
            trace_warn!(%message, "further fatal error while draining");
        }
    }

    fn has_failed(&self) -> bool {
        self.failure.lock().is_some()
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.timing.lock().launched += 1;
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn record_time(&self, spent: Duration) {
        let mut timing = self.timing.lock();
        timing.busy += spent;
        timing.finished += 1;
    }
}

/// Runs a batch of segmentation samples over one image.
///
/// Built with [`EnsembleSampler::builder`]; a sampler runs once.
///
/// # Examples
///
/// ```no_run
/// use seg_ensemble::prelude::*;
///
/// # async fn example(
/// #     image: VolumeImage,
/// #     seeds: Seeds,
/// #     range: ParameterRange,
/// # ) -> seg_ensemble::Result<()> {
/// let abort = AbortHandle::new();
/// let sampler = EnsembleSampler::builder(image, seeds, range)
///     .generator(LatinHypercubeGenerator::with_seed(3))
///     .sample_count(50)
///     .concurrency(2)
///     .abort_handle(abort.clone())
///     .build()?;
///
/// let report = sampler.run().await?;
/// if report.state == SamplerState::Failed {
///     eprintln!("stopped: {:?}", report.failure);
/// }
/// # Ok(())
/// # }
/// ```
pub struct EnsembleSampler {
    context: Arc<Context>,
    generator: Arc<dyn ParameterGenerator>,
    range: ParameterRange,
    sample_count: usize,
    concurrency: usize,
    store: Arc<dyn ResultStore>,
    progress: Arc<dyn ProgressSink>,
    abort: AbortHandle,
    shared: Arc<Shared>,
}

impl EnsembleSampler {
    /// Start configuring a sampler over `image` with `seeds` and `range`.
    pub fn builder(
        image: impl ImageSource + 'static,
        seeds: impl SeedSource + 'static,
        range: ParameterRange,
    ) -> EnsembleSamplerBuilder {
        EnsembleSamplerBuilder::new(Arc::new(image), Arc::new(seeds), range)
    }

    /// Like [`builder`](Self::builder) for inputs that are already shared.
    pub fn builder_shared(
        image: Arc<dyn ImageSource>,
        seeds: Arc<dyn SeedSource>,
        range: ParameterRange,
    ) -> EnsembleSamplerBuilder {
        EnsembleSamplerBuilder::new(image, seeds, range)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SamplerState {
        *self.shared.state.lock()
    }

    /// A handle that stops new launches.
    #[must_use]
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Request an abort; same as [`AbortHandle::abort`].
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Name of the generator in use.
    #[must_use]
    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Number of parameter sets requested.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Maximum number of classify-and-solve pipelines in flight.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Pipelines currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Largest number of pipelines that were in flight at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.shared.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Time spent in the classify, solve and finishing stages of all finished samples.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.shared.timing.lock().busy
    }

    /// Average time per finished sample times the samples not launched yet.
    ///
    /// `None` until a sample has finished.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn estimated_time_remaining(&self) -> Option<Duration> {
        let timing = self.shared.timing.lock();
        if timing.finished == 0 {
            return None;
        }
        let remaining = timing.total.saturating_sub(timing.launched);
        let per_sample = timing.busy / timing.finished as u32;
        Some(per_sample * remaining as u32)
    }
}
