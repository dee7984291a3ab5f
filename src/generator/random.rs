//! Random parameter generator.

use parking_lot::Mutex;

use super::{ParameterGenerator, draw_weights};
use crate::error::Result;
use crate::parameter_set::{ChannelParameters, ParameterSet};
use crate::range::ParameterRange;
use crate::rng_util;

/// Draws every parameter independently.
///
/// Float parameters are uniform on linear scales and log-uniform on log
/// scales; integers are uniform over their inclusive range; distance
/// functions are chosen uniformly. Channel weights are drawn from their
/// ranges with the last channel taking the remainder, and the whole vector is
/// redrawn whenever that remainder falls outside the last channel's bounds.
///
/// # Examples
///
/// ```
/// use seg_ensemble::generator::RandomGenerator;
///
/// // Create with default RNG
/// let generator = RandomGenerator::new();
///
/// // Create with a fixed seed for reproducibility
/// let generator = RandomGenerator::with_seed(42);
/// ```
pub struct RandomGenerator {
    rng: Mutex<fastrand::Rng>,
}

impl RandomGenerator {
    /// Registry name.
    pub const NAME: &'static str = "Random";

    /// Creates a new random generator with a default random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Creates a new random generator with a fixed seed for reproducibility.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterGenerator for RandomGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn generate(&self, range: &ParameterRange, count: usize) -> Result<Vec<ParameterSet>> {
        range.validate()?;
        let mut rng = self.rng.lock();
        let mut sets = Vec::with_capacity(count);

        for id in 0..count as u64 {
            let weights = draw_weights(range, &mut rng, |rng, channel, _| {
                Some(rng_util::sample_f64(rng, &range.channels[channel].weight))
            })?;
            let channels = range
                .channels
                .iter()
                .zip(weights)
                .map(|(declared, weight)| ChannelParameters {
                    weight,
                    distance_index: rng.usize(0..declared.distance_functions.len()),
                    reduced_dim: rng_util::sample_u32(&mut rng, &declared.reduced_dim),
                })
                .collect();

            sets.push(ParameterSet {
                id,
                beta: rng_util::sample_f64(&mut rng, &range.beta),
                gamma: rng_util::sample_f64(&mut rng, &range.gamma),
                max_iterations: rng_util::sample_u32(&mut rng, &range.max_iterations),
                svm_c: rng_util::sample_f64(&mut rng, &range.svm_c),
                svm_gamma: rng_util::sample_f64(&mut rng, &range.svm_gamma),
                svm_channels: rng_util::sample_u32(&mut rng, &range.svm_channels),
                channels,
            });
        }

        trace_debug!(count = sets.len(), "random parameter sets generated");
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceFunction;
    use crate::range::{ChannelRange, ObservedBounds, ScalarRange};

    fn range() -> ParameterRange {
        ParameterRange {
            beta: ScalarRange::log(0.1, 10.0),
            gamma: ScalarRange::new(0.5, 0.5),
            max_iterations: ScalarRange::new(5, 9),
            svm_c: ScalarRange::log(1.0, 1000.0),
            svm_gamma: ScalarRange::new(0.01, 1.0),
            svm_channels: ScalarRange::log(1, 8),
            channels: vec![
                ChannelRange::new(
                    ScalarRange::new(0.1, 0.9),
                    ScalarRange::new(1, 3),
                    vec![DistanceFunction::L1, DistanceFunction::L2, DistanceFunction::Cosine],
                ),
                ChannelRange::new(
                    ScalarRange::new(0.4, 0.6),
                    ScalarRange::new(2, 2),
                    vec![DistanceFunction::Squared],
                ),
            ],
            observed: ObservedBounds::default(),
        }
    }

    #[test]
    fn same_seed_same_batch() {
        let a = RandomGenerator::with_seed(5).generate(&range(), 20).unwrap();
        let b = RandomGenerator::with_seed(5).generate(&range(), 20).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn respects_fixed_values_and_declared_choices() {
        let sets = RandomGenerator::with_seed(8).generate(&range(), 200).unwrap();
        for (i, set) in sets.iter().enumerate() {
            assert_eq!(set.id, i as u64);
            assert_eq!(set.gamma, 0.5);
            assert!((5..=9).contains(&set.max_iterations));
            assert!((1..=8).contains(&set.svm_channels));
            assert!(set.channels[0].distance_index < 3);
            assert_eq!(set.channels[1].distance_index, 0);
            assert_eq!(set.channels[1].reduced_dim, 2);
            assert!((0.4..=0.6).contains(&set.channels[1].weight));
            assert!((set.weight_sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_count_is_empty() {
        assert!(RandomGenerator::new().generate(&range(), 0).unwrap().is_empty());
    }
}
