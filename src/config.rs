use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::storage::SummaryFiles;

/// Declarative settings of a sampling run.
///
/// Applied to an [`EnsembleSamplerBuilder`](crate::EnsembleSamplerBuilder)
/// with [`config`](crate::EnsembleSamplerBuilder::config), which resolves the
/// generator name through a [`Registry`](crate::Registry).
///
/// ```
/// use seg_ensemble::SamplingConfig;
///
/// let config = SamplingConfig {
///     sample_count: 100,
///     generator: "Latin Hypercube".into(),
///     seed: Some(42),
///     ..SamplingConfig::default()
/// };
/// assert_eq!(config.concurrency, 1);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SamplingConfig {
    /// Number of parameter sets to request from the generator.
    pub sample_count: usize,
    /// Maximum number of classify-and-solve pipelines in flight.
    pub concurrency: usize,
    /// Registered generator name.
    pub generator: String,
    /// Generator seed; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Output folder; `None` keeps results in memory.
    pub output_dir: Option<PathBuf>,
    /// Names of the summary files inside `output_dir`.
    pub files: SummaryFiles,
    /// Whether to keep and write the per-label probability volumes.
    pub store_probabilities: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_count: 10,
            concurrency: 1,
            generator: "Random".to_owned(),
            seed: None,
            output_dir: None,
            files: SummaryFiles::default(),
            store_probabilities: false,
        }
    }
}

#[cfg(feature = "serde")]
impl SamplingConfig {
    /// Read a JSON configuration; missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| crate::Error::Storage(e.to_string()))
    }
}
