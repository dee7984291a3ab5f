//! Derived characteristics of one segmentation result.

use std::collections::VecDeque;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::result::{DerivedOutput, SingleResult};
use crate::volume::{Dimensions, LabelVolume};

/// Overlap between a result's label map and the ground truth for one label.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelOverlap {
    /// The label.
    pub label: u32,
    /// `2|A∩B| / (|A| + |B|)`.
    pub dice: f64,
    /// `|A∩B| / |A∪B|`.
    pub jaccard: f64,
    /// `1 - ||A| - |B|| / (|A| + |B|)`.
    pub volume_similarity: f64,
}

#[allow(clippy::cast_precision_loss)]
fn overlap_metrics(intersection: usize, result: usize, truth: usize) -> (f64, f64, f64) {
    let total = result + truth;
    if total == 0 {
        return (1.0, 1.0, 1.0);
    }
    let union = total - intersection;
    let dice = 2.0 * intersection as f64 / total as f64;
    let jaccard = intersection as f64 / union as f64;
    let volume_similarity = 1.0 - result.abs_diff(truth) as f64 / total as f64;
    (dice, jaccard, volume_similarity)
}

/// Number of 6-connected components of voxels whose label is not `background`.
#[must_use]
pub fn count_objects(labels: &LabelVolume, background: u32) -> usize {
    let dims = Dimensions::of(labels);
    let n = dims.voxel_count();
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();
    let mut objects = 0;

    for start in 0..n {
        let label = labels[dims.coord(start).index()];
        if visited[start] || label == background {
            continue;
        }
        objects += 1;
        visited[start] = true;
        queue.push_back(start);
        while let Some(index) = queue.pop_front() {
            let c = dims.coord(index);
            let mut neighbours = [None; 6];
            if c.x > 0 {
                neighbours[0] = Some(index - 1);
            }
            if c.x + 1 < dims.width {
                neighbours[1] = Some(index + 1);
            }
            if c.y > 0 {
                neighbours[2] = Some(index - dims.width);
            }
            if c.y + 1 < dims.height {
                neighbours[3] = Some(index + dims.width);
            }
            if c.z > 0 {
                neighbours[4] = Some(index - dims.width * dims.height);
            }
            if c.z + 1 < dims.depth {
                neighbours[5] = Some(index + dims.width * dims.height);
            }
            for next in neighbours.into_iter().flatten() {
                if !visited[next] && labels[dims.coord(next).index()] == label {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }
    objects
}

/// Computes the derived outputs of a [`SingleResult`].
///
/// Always records the object count. With a ground truth it also records
/// per-label and overall Dice, Jaccard and volume similarity. The sample
/// duration is recorded by the pipeline and left untouched here.
#[derive(Clone, Debug, Default)]
pub struct CharacteristicsCalculator {
    ground_truth: Option<Arc<LabelVolume>>,
    background: u32,
}

impl CharacteristicsCalculator {
    /// A calculator without ground truth; label 0 is background.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also compute overlap metrics against `ground_truth`.
    #[must_use]
    pub fn with_ground_truth(mut self, ground_truth: Arc<LabelVolume>) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }

    /// Whether overlap metrics are computed.
    #[must_use]
    pub fn has_ground_truth(&self) -> bool {
        self.ground_truth.is_some()
    }

    /// Fill in the derived outputs of `result`. Running it twice gives the same values.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingDetails` if the label volume was already discarded
    /// and `Error::ShapeMismatch` if the ground truth has another extent.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(&self, result: &mut SingleResult) -> Result<()> {
        let labels = result
            .labels
            .as_ref()
            .ok_or(Error::MissingDetails(result.id))?;
        let objects = count_objects(labels, self.background);
        let overlaps = match &self.ground_truth {
            Some(truth) => {
                Dimensions::of(truth.as_ref()).ensure_same(Dimensions::of(labels), "label volume")?;
                Some(self.overlaps(labels, truth))
            }
            None => None,
        };

        result.set_derived(DerivedOutput::ObjectCount, objects as f64);
        if let Some((per_label, (dice, jaccard, volume_similarity))) = overlaps {
            result.set_derived(DerivedOutput::Dice, dice);
            result.set_derived(DerivedOutput::Jaccard, jaccard);
            result.set_derived(DerivedOutput::VolumeSimilarity, volume_similarity);
            result.label_overlaps = per_label;
        }
        Ok(())
    }

    /// Per-label overlaps for every foreground label present in either
    /// volume, plus the overall values over all foreground voxels.
    #[allow(clippy::cast_possible_truncation)]
    fn overlaps(
        &self,
        labels: &LabelVolume,
        truth: &LabelVolume,
    ) -> (Vec<LabelOverlap>, (f64, f64, f64)) {
        let max_label = labels.iter().chain(truth.iter()).copied().max().unwrap_or(0) as usize;
        let mut intersection = vec![0_usize; max_label + 1];
        let mut in_result = vec![0_usize; max_label + 1];
        let mut in_truth = vec![0_usize; max_label + 1];
        for (a, b) in labels.iter().zip(truth.iter()) {
            in_result[*a as usize] += 1;
            in_truth[*b as usize] += 1;
            if a == b {
                intersection[*a as usize] += 1;
            }
        }

        let mut per_label = Vec::new();
        let (mut all_i, mut all_r, mut all_t) = (0, 0, 0);
        for label in 0..=max_label {
            if label == self.background as usize || in_result[label] + in_truth[label] == 0 {
                continue;
            }
            let (dice, jaccard, volume_similarity) =
                overlap_metrics(intersection[label], in_result[label], in_truth[label]);
            per_label.push(LabelOverlap {
                label: label as u32,
                dice,
                jaccard,
                volume_similarity,
            });
            all_i += intersection[label];
            all_r += in_result[label];
            all_t += in_truth[label];
        }
        (per_label, overlap_metrics(all_i, all_r, all_t))
    }
}
