use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives progress and status updates from a running sampler.
///
/// Called from worker threads; implementations should return quickly.
pub trait ProgressSink: Send + Sync {
    /// Share of parameter sets with an accepted result, in percent.
    fn progress(&self, percent: f64);

    /// A human-readable description of the current stage.
    fn status(&self, message: &str);
}

/// A sink that ignores every update (the default).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _percent: f64) {}

    fn status(&self, _message: &str) {}
}

/// Requests a running sampler to stop launching samples.
///
/// Clones share the same flag. Samples already in flight run to completion.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// A handle that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the abort.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether an abort was requested.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
