use core::time::Duration;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use super::pipeline::{Context, Finished, finish, seconds_since};
use super::{EnsembleSampler, ProgressSink, SamplingReport, Shared};
use crate::error::{Error, Result};
use crate::parameter_set::ParameterSet;
use crate::result::{DerivedOutput, SamplingResults, SingleResult};
use crate::storage::ResultStore;
use crate::types::SamplerState;

/// How long the dispatch loop waits for a free slot before re-checking abort and failure.
const DISPATCH_POLL: Duration = Duration::from_millis(50);

fn announce(progress: &dyn ProgressSink, message: &str) {
    trace_info!("{message}");
    progress.status(message);
}

impl EnsembleSampler {
    /// Generate the parameter sets and run every sample.
    ///
    /// Returns a report in the `Completed`, `Aborted` or `Failed` state. A
    /// solver failure or a lost task ends the run in `Failed` with the reason
    /// in [`SamplingReport::failure`]; accepted results are kept.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyStarted` on a second call, `Error::NoParameterSets`
    /// or the generator's error if generation fails, and the store's error if
    /// it cannot prepare the run. The state is `Failed` in the latter cases.
    #[allow(clippy::too_many_lines)]
    pub async fn run(&self) -> Result<SamplingReport> {
        if self.shared.started.swap(true, core::sync::atomic::Ordering::SeqCst) {
            return Err(Error::AlreadyStarted);
        }

        trace_info!(
            generator = self.generator.name(),
            samples = self.sample_count,
            concurrency = self.concurrency,
            "sampling run started"
        );

        self.shared.set_state(SamplerState::Generating);
        announce(self.progress.as_ref(), "Generating parameter sets...");
        let sets = match self.generate().await {
            Ok(sets) if sets.is_empty() => {
                self.shared.set_state(SamplerState::Failed);
                announce(
                    self.progress.as_ref(),
                    "Parameter generator produced no parameter sets",
                );
                return Err(Error::NoParameterSets);
            }
            Ok(sets) => sets,
            Err(e) => {
                self.shared.set_state(SamplerState::Failed);
                announce(self.progress.as_ref(), &format!("Parameter generation failed: {e}"));
                return Err(e);
            }
        };
        trace_info!(count = sets.len(), "parameter sets generated");

        let results = Arc::new(Mutex::new(SamplingResults::new(
            self.range.clone(),
            self.generator.name(),
        )));
        let columns: Vec<DerivedOutput> = if self.context.calculator.has_ground_truth() {
            DerivedOutput::ALL.to_vec()
        } else {
            DerivedOutput::BASIC.to_vec()
        };
        let begun = self.store.begin(&results.lock(), &columns);
        if let Err(e) = begun {
            self.shared.set_state(SamplerState::Failed);
            announce(self.progress.as_ref(), &format!("Output could not be prepared: {e}"));
            return Err(e);
        }

        let total = sets.len();
        self.shared.timing.lock().total = total;
        self.shared.set_state(SamplerState::Running);

        let (tx, rx) = mpsc::unbounded_channel::<SingleResult>();
        let finisher = tokio::spawn(finish_loop(
            Arc::clone(&self.context),
            Arc::clone(&self.store),
            Arc::clone(&self.progress),
            Arc::clone(&self.shared),
            Arc::clone(&results),
            total,
            rx,
        ));

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<()> = JoinSet::new();

        'dispatch: for set in sets {
            let permit = loop {
                if self.abort.is_aborted() || self.shared.has_failed() {
                    break 'dispatch;
                }
                let slot = Arc::clone(&semaphore).acquire_owned();
                match tokio::time::timeout(DISPATCH_POLL, slot).await {
                    Ok(permit) => break permit.map_err(|e| Error::TaskError(e.to_string()))?,
                    Err(_) => {
                        // reap finished tasks so a panic surfaces early
                        while let Some(joined) = join_set.try_join_next() {
                            if let Err(e) = joined {
                                self.shared.fail(format!("sample task failed: {e}"));
                            }
                        }
                    }
                }
            };
            if self.abort.is_aborted() || self.shared.has_failed() {
                drop(permit);
                break;
            }

            announce(self.progress.as_ref(), &format!("Classifier run {}", set.id));
            self.shared.enter();
            join_set.spawn(sample_task(
                Arc::clone(&self.context),
                Arc::clone(&self.shared),
                Arc::clone(&self.progress),
                set,
                permit,
                tx.clone(),
            ));
        }

        while let Some(joined) = join_set.join_next().await {
            if let Err(e) = joined {
                self.shared.fail(format!("sample task failed: {e}"));
            }
        }
        drop(tx);
        if let Err(e) = finisher.await {
            self.shared.fail(format!("finishing task failed: {e}"));
        }

        let failure = self.shared.failure.lock().clone();
        let state = if failure.is_some() {
            SamplerState::Failed
        } else if self.abort.is_aborted() {
            SamplerState::Aborted
        } else {
            SamplerState::Completed
        };
        self.shared.set_state(state);
        match (&failure, state) {
            (Some(reason), _) => {
                announce(self.progress.as_ref(), &format!("Sampling failed: {reason}"));
            }
            (None, SamplerState::Aborted) => announce(self.progress.as_ref(), "Aborted by user!"),
            _ => announce(self.progress.as_ref(), "Sampling finished"),
        }

        let results = results.lock().clone();
        trace_info!(accepted = results.len(), ?state, "sampling run ended");
        Ok(SamplingReport {
            state,
            failure,
            results,
        })
    }

    async fn generate(&self) -> Result<Vec<ParameterSet>> {
        let generator = Arc::clone(&self.generator);
        let range = self.range.clone();
        let count = self.sample_count;
        tokio::task::spawn_blocking(move || generator.generate(&range, count))
            .await
            .map_err(|e| Error::TaskError(e.to_string()))?
    }
}

/// Classify and solve one parameter set, then hand the result to the finisher.
async fn sample_task(
    context: Arc<Context>,
    shared: Arc<Shared>,
    progress: Arc<dyn ProgressSink>,
    set: ParameterSet,
    permit: tokio::sync::OwnedSemaphorePermit,
    finished: mpsc::UnboundedSender<SingleResult>,
) {
    let id = set.id;
    trace_debug!(id, parameters = ?set, "sample launched");
    let start = Instant::now();

    let classify_context = Arc::clone(&context);
    let classified = tokio::task::spawn_blocking(move || {
        let priors = classify_context.classify(&set);
        (set, priors)
    })
    .await;
    let (set, priors) = match classified {
        Ok((set, Ok(priors))) => (set, priors),
        Ok((_, Err(e))) => {
            trace_warn!(id, error = %e, "classifier failed; sample skipped");
            progress.status(&format!("Classifier run {id} failed: {e}"));
            shared.leave();
            drop(permit);
            return;
        }
        Err(e) => {
            shared.fail(format!("classifier task for sample {id} failed: {e}"));
            shared.leave();
            drop(permit);
            return;
        }
    };

    let classify_seconds = seconds_since(start);
    announce(
        progress.as_ref(),
        &format!("Classifier finished in {classify_seconds:.3}sec; starting solver run {id}"),
    );

    let solve_context = Arc::clone(&context);
    let solved = tokio::task::spawn_blocking(move || {
        let labeling = solve_context.solve(&set, priors);
        (set, labeling)
    })
    .await;
    match solved {
        Ok((set, Ok(labeling))) => {
            trace_debug!(id, iterations = labeling.iterations, "solver finished");
            let result = context.assemble(set, labeling, seconds_since(start));
            // hand over before releasing the slot so a concurrency of 1 keeps order
            if finished.send(result).is_err() {
                shared.fail(format!("result of sample {id} could not be handed over"));
            }
        }
        Ok((_, Err(e))) => {
            trace_warn!(id, error = %e, "solver failed; stopping the run");
            shared.fail(format!("solver run {id}: {e}"));
        }
        Err(e) => shared.fail(format!("solver task for sample {id} failed: {e}")),
    }
    shared.leave();
    drop(permit);
}

/// Accept finished samples one at a time, in hand-over order.
async fn finish_loop(
    context: Arc<Context>,
    store: Arc<dyn ResultStore>,
    progress: Arc<dyn ProgressSink>,
    shared: Arc<Shared>,
    results: Arc<Mutex<SamplingResults>>,
    total: usize,
    mut finished: mpsc::UnboundedReceiver<SingleResult>,
) {
    while let Some(result) = finished.recv().await {
        let id = result.id;
        let pipeline_seconds = result.duration().unwrap_or(0.0);
        let start = Instant::now();
        let context = Arc::clone(&context);
        let store = Arc::clone(&store);
        let accepted = Arc::clone(&results);
        let outcome =
            tokio::task::spawn_blocking(move || finish(&context, store.as_ref(), &accepted, result))
                .await;

        shared.record_time(
            Duration::from_secs_f64(pipeline_seconds.max(0.0)) + start.elapsed(),
        );
        match outcome {
            Ok(Finished::Accepted(count)) => {
                #[allow(clippy::cast_precision_loss)]
                let percent = count as f64 * 100.0 / total as f64;
                trace_info!(id, percent, "result accepted");
                progress.progress(percent);
            }
            Ok(Finished::Dropped(reason)) => {
                trace_warn!(id, %reason, "result dropped");
                progress.status(&reason);
            }
            Err(e) => shared.fail(format!("finishing task for sample {id} failed: {e}")),
        }
    }
}
