//! The classifier stage: seed voxels and image features to per-label priors.
//!
//! A one-against-one RBF C-SVC is trained on the feature vectors of the seed
//! voxels. Each class pair gets a Platt sigmoid on its decision values, and
//! the pairwise probabilities are coupled into one probability per label at
//! every voxel of the image.
//!
//! | Step | Detail |
//! |------|--------|
//! | Features | First `channels` components over all image channels, in channel order |
//! | Training | SMO on the seed voxels of each label pair |
//! | Calibration | Platt scaling fitted on the pair's training decision values |
//! | Coupling | Wu-Lin-Weng pairwise coupling; two labels are read off directly |

mod probability;
mod svm;

use crate::error::{Error, Result};
use crate::features::FeatureImage;
use crate::image::{ImageSource, SeedSource, validate_seeds};
use crate::parameter_set::ParameterSet;
use crate::volume::ProbabilityVolumeSet;

use self::probability::{Sigmoid, couple};
use self::svm::BinaryModel;

/// Tolerance on per-voxel probability sums before a warning is counted.
const SUM_TOLERANCE: f64 = 1.192_092_9e-7;

/// Classifier inputs taken from a parameter set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassifierParams {
    /// Regularisation constant `C`.
    pub c: f64,
    /// RBF kernel width.
    pub gamma: f64,
    /// Maximum number of feature components.
    pub channels: u32,
}

impl ClassifierParams {
    /// The SVM values of `set`.
    #[must_use]
    pub fn from_parameter_set(set: &ParameterSet) -> Self {
        Self {
            c: set.svm_c,
            gamma: set.svm_gamma,
            channels: set.svm_channels,
        }
    }

    fn validate(self) -> Result<()> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(Error::Classifier(format!(
                "regularisation constant C must be positive, got {}",
                self.c
            )));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(Error::Classifier(format!(
                "kernel gamma must be positive, got {}",
                self.gamma
            )));
        }
        Ok(())
    }
}

struct PairModel {
    first: usize,
    second: usize,
    model: BinaryModel,
    sigmoid: Sigmoid,
}

/// Probabilistic SVM over image features.
#[derive(Clone, Copy, Debug)]
pub struct ProbabilisticClassifier {
    params: ClassifierParams,
}

impl ProbabilisticClassifier {
    /// A classifier with the given parameters.
    #[must_use]
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    /// Parameters in use.
    #[must_use]
    pub fn params(&self) -> ClassifierParams {
        self.params
    }

    /// Train on `seeds` and evaluate label probabilities at every voxel of `image`.
    ///
    /// Probabilities slightly outside `[0, 1]` or sums slightly above one are
    /// logged, not rejected.
    ///
    /// # Errors
    ///
    /// Returns `Error::Classifier` for non-positive `C`/gamma or an image
    /// without components, and `Error::Seeds` for missing or out-of-bounds seeds.
    pub fn run(
        &self,
        seeds: &dyn SeedSource,
        image: &dyn ImageSource,
    ) -> Result<ProbabilityVolumeSet> {
        self.params.validate()?;
        let dims = image.dimensions();
        validate_seeds(seeds, dims)?;

        let total = image.total_components();
        if total == 0 {
            return Err(Error::Classifier("image has no feature components".to_owned()));
        }
        let feature_count = (self.params.channels as usize).clamp(1, total);
        let features = FeatureImage::from_components(image, feature_count);

        let labels = seeds.label_count();
        if labels == 1 {
            return ProbabilityVolumeSet::new(vec![dims.filled(1.0)]);
        }

        let training: Vec<Vec<&[f64]>> = (0..labels)
            .map(|label| {
                seeds
                    .seeds(label)
                    .iter()
                    .map(|coord| features.features(dims.linear_index(*coord)))
                    .collect()
            })
            .collect();

        let mut pairs = Vec::with_capacity(labels * (labels - 1) / 2);
        for first in 0..labels {
            for second in first + 1..labels {
                let model = BinaryModel::train(
                    &training[first],
                    &training[second],
                    self.params.c,
                    self.params.gamma,
                )?;
                let decisions: Vec<f64> = training[first]
                    .iter()
                    .chain(&training[second])
                    .map(|x| model.decision(x))
                    .collect();
                let positive: Vec<bool> = core::iter::repeat_n(true, training[first].len())
                    .chain(core::iter::repeat_n(false, training[second].len()))
                    .collect();
                let sigmoid = Sigmoid::fit(&decisions, &positive);
                trace_debug!(
                    first,
                    second,
                    support_vectors = model.support_count(),
                    "trained class pair"
                );
                pairs.push(PairModel {
                    first,
                    second,
                    model,
                    sigmoid,
                });
            }
        }

        let mut volumes: Vec<_> = (0..labels).map(|_| dims.filled(0.0)).collect();
        let mut pairwise = vec![vec![0.0; labels]; labels];
        let mut out_of_range = 0_usize;
        let mut bad_sum = 0_usize;
        for voxel in 0..dims.voxel_count() {
            let x = features.features(voxel);
            for pair in &pairs {
                let p = pair.sigmoid.predict(pair.model.decision(x));
                pairwise[pair.first][pair.second] = p;
                pairwise[pair.second][pair.first] = 1.0 - p;
            }
            let probabilities = couple(&pairwise);
            if probabilities.iter().any(|p| !(0.0..=1.0).contains(p)) {
                out_of_range += 1;
            }
            if probabilities.iter().sum::<f64>() - 1.0 > SUM_TOLERANCE {
                bad_sum += 1;
            }
            let index = dims.coord(voxel).index();
            for (volume, p) in volumes.iter_mut().zip(probabilities) {
                volume[index] = p;
            }
        }
        if out_of_range > 0 || bad_sum > 0 {
            trace_warn!(
                out_of_range,
                bad_sum,
                "classifier probabilities outside numerical tolerance"
            );
        }

        ProbabilityVolumeSet::new(volumes)
    }
}
