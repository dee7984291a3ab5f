//! Latin hypercube parameter generator.

use parking_lot::Mutex;

use super::{ParameterGenerator, draw_weights};
use crate::error::Result;
use crate::parameter_set::{ChannelParameters, ParameterSet};
use crate::range::{ParameterRange, ScalarRange};
use crate::rng_util;
use crate::types::Scale;

/// Stratified sampling: every scalar axis is cut into `count` equal strata
/// (in log space for log scales), one value is drawn inside each stratum and
/// the strata are shuffled independently per axis before pairing.
///
/// Integer axes are stratified over `[min, max + 1)` and floored. Distance
/// functions are spread evenly over the batch. Channel weights keep the
/// stratification on the first channel only; the following channels are
/// drawn within what is left of the unit sum and the last channel takes the
/// remainder. Weight vectors are shuffled as a whole, so every vector still
/// sums to 1 after pairing.
pub struct LatinHypercubeGenerator {
    rng: Mutex<fastrand::Rng>,
}

impl LatinHypercubeGenerator {
    /// Registry name.
    pub const NAME: &'static str = "Latin Hypercube";

    /// Creates a new generator with a default random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Creates a new generator with a fixed seed for reproducibility.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl Default for LatinHypercubeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw one value inside stratum `i` of `count`.
#[allow(clippy::cast_precision_loss)]
fn stratum_value(
    rng: &mut fastrand::Rng,
    min: f64,
    max: f64,
    scale: Scale,
    i: usize,
    count: usize,
) -> f64 {
    let (lo, hi) = match scale {
        Scale::Linear => (min, max),
        Scale::Log => (min.ln(), max.ln()),
    };
    let width = (hi - lo) / count as f64;
    let from = lo + width * i as f64;
    let value = rng_util::f64_range(rng, from, from + width);
    match scale {
        Scale::Linear => value.clamp(min, max),
        Scale::Log => rng_util::strictly_inside(value.exp(), min, max),
    }
}

fn stratified_f64(rng: &mut fastrand::Rng, range: &ScalarRange<f64>, count: usize) -> Vec<f64> {
    let mut values: Vec<f64> = (0..count)
        .map(|i| stratum_value(rng, range.min, range.max, range.scale, i, count))
        .collect();
    rng.shuffle(&mut values);
    values
}

fn stratified_u32(rng: &mut fastrand::Rng, range: &ScalarRange<u32>, count: usize) -> Vec<u32> {
    let (min, upper) = (f64::from(range.min), f64::from(range.max) + 1.0);
    let mut values: Vec<u32> = (0..count)
        .map(|i| {
            let value = stratum_value(rng, min, upper, range.scale, i, count);
            rng_util::floor_u32(value, range.min, range.max)
        })
        .collect();
    rng.shuffle(&mut values);
    values
}

fn stratified_index(rng: &mut fastrand::Rng, choices: usize, count: usize) -> Vec<usize> {
    let mut values: Vec<usize> = (0..count).map(|i| i * choices / count).collect();
    rng.shuffle(&mut values);
    values
}

impl ParameterGenerator for LatinHypercubeGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn generate(&self, range: &ParameterRange, count: usize) -> Result<Vec<ParameterSet>> {
        range.validate()?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut rng = self.rng.lock();

        let beta = stratified_f64(&mut rng, &range.beta, count);
        let gamma = stratified_f64(&mut rng, &range.gamma, count);
        let max_iterations = stratified_u32(&mut rng, &range.max_iterations, count);
        let svm_c = stratified_f64(&mut rng, &range.svm_c, count);
        let svm_gamma = stratified_f64(&mut rng, &range.svm_gamma, count);
        let svm_channels = stratified_u32(&mut rng, &range.svm_channels, count);

        let distance_indices: Vec<Vec<usize>> = range
            .channels
            .iter()
            .map(|c| stratified_index(&mut rng, c.distance_functions.len(), count))
            .collect();
        let reduced_dims: Vec<Vec<u32>> = range
            .channels
            .iter()
            .map(|c| stratified_u32(&mut rng, &c.reduced_dim, count))
            .collect();

        let mut weights = Vec::with_capacity(count);
        for i in 0..count {
            let vector = draw_weights(range, &mut rng, |rng, channel, sum| {
                let bounds = &range.channels[channel].weight;
                if channel == 0 {
                    return Some(stratum_value(rng, bounds.min, bounds.max, bounds.scale, i, count));
                }
                let upper = bounds.max.min(1.0 - sum);
                (upper >= bounds.min)
                    .then(|| rng_util::scaled_f64(rng, bounds.min, upper, bounds.scale))
            })?;
            weights.push(vector);
        }
        rng.shuffle(&mut weights);

        let sets: Vec<ParameterSet> = weights
            .into_iter()
            .enumerate()
            .map(|(i, vector)| ParameterSet {
                id: i as u64,
                beta: beta[i],
                gamma: gamma[i],
                max_iterations: max_iterations[i],
                svm_c: svm_c[i],
                svm_gamma: svm_gamma[i],
                svm_channels: svm_channels[i],
                channels: vector
                    .into_iter()
                    .enumerate()
                    .map(|(c, weight)| ChannelParameters {
                        weight,
                        distance_index: distance_indices[c][i],
                        reduced_dim: reduced_dims[c][i],
                    })
                    .collect(),
            })
            .collect();

        trace_debug!(count = sets.len(), "latin hypercube parameter sets generated");
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceFunction;
    use crate::range::{ChannelRange, ObservedBounds};

    fn range() -> ParameterRange {
        ParameterRange {
            beta: ScalarRange::new(0.0, 10.0),
            gamma: ScalarRange::log(0.01, 100.0),
            max_iterations: ScalarRange::new(1, 10),
            svm_c: ScalarRange::new(1.0, 1.0),
            svm_gamma: ScalarRange::new(0.5, 1.5),
            svm_channels: ScalarRange::new(1, 1),
            channels: vec![
                ChannelRange::new(
                    ScalarRange::new(0.0, 1.0),
                    ScalarRange::new(1, 4),
                    vec![DistanceFunction::L1, DistanceFunction::L2],
                ),
                ChannelRange::new(
                    ScalarRange::new(0.0, 1.0),
                    ScalarRange::new(1, 1),
                    vec![DistanceFunction::L1],
                ),
            ],
            observed: ObservedBounds::default(),
        }
    }

    #[test]
    fn one_value_per_stratum() {
        let sets = LatinHypercubeGenerator::with_seed(1).generate(&range(), 10).unwrap();
        let mut strata: Vec<usize> = sets.iter().map(|s| s.beta.floor() as usize).collect();
        strata.sort_unstable();
        assert_eq!(strata, (0..10).collect::<Vec<_>>());

        let mut decades: Vec<i32> = sets
            .iter()
            .map(|s| (s.gamma.log10() * 2.5).floor() as i32)
            .collect();
        decades.sort_unstable();
        assert_eq!(decades, (-5..5).collect::<Vec<_>>());
    }

    #[test]
    fn integers_cover_every_value() {
        let sets = LatinHypercubeGenerator::with_seed(2).generate(&range(), 10).unwrap();
        let mut iterations: Vec<u32> = sets.iter().map(|s| s.max_iterations).collect();
        iterations.sort_unstable();
        assert_eq!(iterations, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn distance_functions_spread_evenly() {
        let sets = LatinHypercubeGenerator::with_seed(3).generate(&range(), 10).unwrap();
        let l2 = sets.iter().filter(|s| s.channels[0].distance_index == 1).count();
        assert_eq!(l2, 5);
    }

    #[test]
    fn weight_vectors_sum_to_one() {
        let sets = LatinHypercubeGenerator::with_seed(4).generate(&range(), 50).unwrap();
        for set in &sets {
            assert!((set.weight_sum() - 1.0).abs() < 1e-9);
        }
        let mut first: Vec<usize> = sets
            .iter()
            .map(|s| (s.channels[0].weight * 50.0).floor() as usize)
            .collect();
        first.sort_unstable();
        assert_eq!(first, (0..50).collect::<Vec<_>>());
    }
}
