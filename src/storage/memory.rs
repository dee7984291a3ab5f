use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::ResultStore;
use crate::error::{Error, Result};
use crate::result::{DerivedOutput, SamplingResults, SingleResult};
use crate::volume::{LabelVolume, ProbabilityVolumeSet};

#[derive(Default)]
struct Inner {
    labels: BTreeMap<u64, LabelVolume>,
    probabilities: BTreeMap<u64, ProbabilityVolumeSet>,
    appended: Vec<u64>,
    columns: Vec<DerivedOutput>,
}

/// In-memory result store (the default).
///
/// Clones share the same contents, so a handle kept by the caller sees what
/// the sampler wrote.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Label volume written for sample `id`.
    #[must_use]
    pub fn labels(&self, id: u64) -> Option<LabelVolume> {
        self.inner.read().labels.get(&id).cloned()
    }

    /// Probability volumes written for sample `id`, if they were kept.
    #[must_use]
    pub fn probabilities(&self, id: u64) -> Option<ProbabilityVolumeSet> {
        self.inner.read().probabilities.get(&id).cloned()
    }

    /// IDs of the written samples, ascending.
    #[must_use]
    pub fn sample_ids(&self) -> Vec<u64> {
        self.inner.read().labels.keys().copied().collect()
    }

    /// IDs of the accepted results, in acceptance order.
    #[must_use]
    pub fn appended(&self) -> Vec<u64> {
        self.inner.read().appended.clone()
    }

    /// Columns announced when the run began.
    #[must_use]
    pub fn columns(&self) -> Vec<DerivedOutput> {
        self.inner.read().columns.clone()
    }
}

impl ResultStore for MemoryStore {
    fn begin(&self, _results: &SamplingResults, columns: &[DerivedOutput]) -> Result<()> {
        let mut inner = self.inner.write();
        inner.appended.clear();
        inner.columns = columns.to_vec();
        Ok(())
    }

    fn write_sample(&self, result: &SingleResult, store_probabilities: bool) -> Result<()> {
        let labels = result.labels.as_ref().ok_or(Error::MissingDetails(result.id))?;
        let mut inner = self.inner.write();
        if inner.labels.contains_key(&result.id) {
            return Err(Error::DuplicateResult(result.id));
        }
        inner.labels.insert(result.id, labels.clone());
        if store_probabilities {
            if let Some(probabilities) = &result.probabilities {
                inner.probabilities.insert(result.id, probabilities.clone());
            }
        }
        Ok(())
    }

    fn append(&self, _results: &SamplingResults, result: &SingleResult) -> Result<()> {
        self.inner.write().appended.push(result.id);
        Ok(())
    }
}
