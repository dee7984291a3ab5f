//! Parameter generators and the trait they share.
//!
//! A generator turns a [`ParameterRange`] into a batch of [`ParameterSet`]s.
//! Every generator guarantees:
//!
//! - each scalar lies within its declared bounds,
//! - channel weights sum to 1 (the last channel takes the remainder),
//! - every distance index refers to a function the channel declares,
//! - IDs run consecutively from 0 in output order.
//!
//! Generators keep their random state behind a [`Mutex`](parking_lot::Mutex)
//! so they can be shared between threads; `with_seed` constructors make the
//! output reproducible.

mod grid;
mod latin_hypercube;
mod random;

pub use grid::CartesianGridGenerator;
pub use latin_hypercube::LatinHypercubeGenerator;
pub use random::RandomGenerator;

use crate::error::{Error, Result};
use crate::parameter_set::ParameterSet;
use crate::range::ParameterRange;

/// Number of rejected channel-weight draws after which generation gives up.
pub const MAX_WEIGHT_ATTEMPTS: usize = 10_000;

/// Slack allowed when checking the remainder weight against its bounds.
const WEIGHT_SLACK: f64 = 1e-12;

/// A strategy for producing a batch of parameter sets from a range.
///
/// # Examples
///
/// ```
/// use seg_ensemble::generator::{ParameterGenerator, RandomGenerator};
/// use seg_ensemble::{ParameterRange, Registry};
///
/// let range = ParameterRange::parse(
///     "Beta\t0.1:10:log\nGamma\t0.01:1:log\nMaxIterations\t50:200\n\
///      SvmC\t0.1:100:log\nSvmGamma\t0.01:10:log\nSvmChannels\t1:1\n\
///      Weight\t1:1\nReducedDim\t1:1\nDist\tl1,l2\n",
///     &Registry::standard(),
/// )
/// .unwrap();
///
/// let sets = RandomGenerator::with_seed(1).generate(&range, 5).unwrap();
/// assert_eq!(sets.len(), 5);
/// assert!(sets.iter().all(|s| (s.weight_sum() - 1.0).abs() < 1e-9));
/// ```
pub trait ParameterGenerator: Send + Sync {
    /// Display name, as registered in a [`Registry`](crate::Registry).
    fn name(&self) -> &str;

    /// Produce up to `count` parameter sets.
    ///
    /// Random and Latin hypercube generators return exactly `count` sets; the
    /// Cartesian grid returns its full factorial, which may differ.
    ///
    /// # Errors
    ///
    /// Returns the range's validation error for an invalid range, and
    /// `Error::UnsatisfiableWeights` when no weight combination summing to 1
    /// fits the declared channel bounds.
    fn generate(&self, range: &ParameterRange, count: usize) -> Result<Vec<ParameterSet>>;
}

/// Check a remainder weight against the last channel's bounds, clamping away
/// rounding noise.
pub(crate) fn fit_remainder(range: &ParameterRange, remainder: f64) -> Option<f64> {
    let bounds = &range.channels.last()?.weight;
    if remainder >= bounds.min - WEIGHT_SLACK && remainder <= bounds.max + WEIGHT_SLACK {
        Some(remainder.clamp(bounds.min, bounds.max))
    } else {
        None
    }
}

/// Draw a weight vector summing to 1, retrying until the remainder fits.
///
/// `draw(rng, channel, sum_so_far)` yields the weight of every channel but
/// the last, or `None` to reject the attempt.
pub(crate) fn draw_weights<F>(
    range: &ParameterRange,
    rng: &mut fastrand::Rng,
    mut draw: F,
) -> Result<Vec<f64>>
where
    F: FnMut(&mut fastrand::Rng, usize, f64) -> Option<f64>,
{
    let n = range.channel_count();
    'attempt: for _ in 0..MAX_WEIGHT_ATTEMPTS {
        let mut weights = Vec::with_capacity(n);
        let mut sum = 0.0;
        for channel in 0..n.saturating_sub(1) {
            let Some(weight) = draw(rng, channel, sum) else {
                continue 'attempt;
            };
            sum += weight;
            weights.push(weight);
        }
        if let Some(last) = fit_remainder(range, 1.0 - sum) {
            weights.push(last);
            return Ok(weights);
        }
    }
    Err(Error::UnsatisfiableWeights {
        attempts: MAX_WEIGHT_ATTEMPTS,
    })
}
