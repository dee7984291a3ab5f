//! Result persistence backends.
//!
//! The [`ResultStore`] trait defines how a sampling run persists its
//! results. The sampler calls [`begin`](ResultStore::begin) once before the
//! first sample, [`write_sample`](ResultStore::write_sample) for every sample
//! whose characteristics are known, and [`append`](ResultStore::append) after
//! the result was accepted into the run's [`SamplingResults`].
//!
//! # Available backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | [`MemoryStore`] | Keeps label volumes in memory (the default) |
//! | [`FolderStore`] | One `sample<ID>` folder of `.npy` volumes per sample plus three summary files |
//!
//! Appends to the summary files are serialised in-process and guarded by an
//! exclusive `fs2` file lock, so several processes may share an output folder.
//!
//! ```no_run
//! use seg_ensemble::storage::{FolderStore, SummaryFiles};
//!
//! let store = FolderStore::new("ensemble-out").files(SummaryFiles {
//!     range: "run.range".into(),
//!     ..SummaryFiles::default()
//! });
//! ```

mod folder;
mod memory;

use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use folder::{FolderStore, LABEL_FILE};
pub use memory::MemoryStore;

use crate::error::Result;
use crate::result::{DerivedOutput, SamplingResults, SingleResult};

/// Where the results of a sampling run go.
///
/// Implementations must be `Send + Sync`; the sampler calls them from
/// blocking worker threads.
pub trait ResultStore: Send + Sync {
    /// Prepare an empty run. `columns` are the derived outputs every row will carry.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the run cannot be prepared; the run then fails.
    fn begin(&self, results: &SamplingResults, columns: &[DerivedOutput]) -> Result<()>;

    /// Persist the volumes of one sample before it is accepted.
    ///
    /// # Errors
    ///
    /// Returns `Error::OutputExists` or a storage error; the sample is then dropped.
    fn write_sample(&self, result: &SingleResult, store_probabilities: bool) -> Result<()>;

    /// Record an accepted `result`; `results` already contains it.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the summaries cannot be updated.
    fn append(&self, results: &SamplingResults, result: &SingleResult) -> Result<()>;
}

/// File names of the three summary files of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SummaryFiles {
    /// Generator name and parameter range.
    pub range: String,
    /// Parameter-set descriptors.
    pub parameters: String,
    /// Derived characteristics table.
    pub characteristics: String,
}

impl Default for SummaryFiles {
    fn default() -> Self {
        Self {
            range: "sampling.range".to_owned(),
            parameters: "parameters.txt".to_owned(),
            characteristics: "characteristics.txt".to_owned(),
        }
    }
}

/// Write `contents` to a temp file next to `path`, then rename it over `path`.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
