//! Cartesian grid parameter generator.

use super::{ParameterGenerator, fit_remainder};
use crate::error::Result;
use crate::parameter_set::{ChannelParameters, ParameterSet};
use crate::range::{ParameterRange, ScalarRange};
use crate::rng_util;
use crate::types::Scale;

/// Full factorial design over evenly spaced axis values.
///
/// Every parameter with more than one admissible value is a free axis. For
/// `n` free axes and a requested `count`, each free axis gets
/// `max(2, round(count^(1/n)))` values, so the batch holds roughly `count`
/// sets. Linear axes include both endpoints. Log axes take the midpoints of
/// equal cells in log space, which keeps every value strictly inside the
/// bounds. Integer
/// and categorical axes drop duplicate values. Fixed axes contribute their
/// single value.
///
/// The last channel's weight is not an axis: it takes the remainder of the
/// unit sum, and grid points whose remainder falls outside the last channel's
/// bounds are skipped.
///
/// Points are enumerated like an odometer with the first axis changing
/// fastest. Axis order: beta, gamma, max iterations, SVM C, SVM gamma, SVM
/// channels, then per channel weight (all but the last), reduced dimension,
/// distance function.
#[derive(Clone, Copy, Debug, Default)]
pub struct CartesianGridGenerator;

impl CartesianGridGenerator {
    /// Registry name.
    pub const NAME: &'static str = "Cartesian Grid";

    /// Creates a new grid generator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Number of values per free axis for `count` requested sets.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn samples_per_parameter(count: usize, free_axes: usize) -> usize {
        if free_axes == 0 {
            return 1;
        }
        let per_axis = (count as f64).powf(1.0 / free_axes as f64).round() as usize;
        per_axis.max(2)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Beta,
    Gamma,
    MaxIterations,
    SvmC,
    SvmGamma,
    SvmChannels,
    Weight(usize),
    ReducedDim(usize),
    Distance(usize),
}

fn axes(range: &ParameterRange) -> Vec<Axis> {
    let mut axes = vec![
        Axis::Beta,
        Axis::Gamma,
        Axis::MaxIterations,
        Axis::SvmC,
        Axis::SvmGamma,
        Axis::SvmChannels,
    ];
    let n = range.channel_count();
    for c in 0..n {
        if c + 1 < n {
            axes.push(Axis::Weight(c));
        }
        axes.push(Axis::ReducedDim(c));
        axes.push(Axis::Distance(c));
    }
    axes
}

fn is_free(range: &ParameterRange, axis: Axis) -> bool {
    match axis {
        Axis::Beta => !range.beta.is_fixed(),
        Axis::Gamma => !range.gamma.is_fixed(),
        Axis::MaxIterations => !range.max_iterations.is_fixed(),
        Axis::SvmC => !range.svm_c.is_fixed(),
        Axis::SvmGamma => !range.svm_gamma.is_fixed(),
        Axis::SvmChannels => !range.svm_channels.is_fixed(),
        Axis::Weight(c) => !range.channels[c].weight.is_fixed(),
        Axis::ReducedDim(c) => !range.channels[c].reduced_dim.is_fixed(),
        Axis::Distance(c) => range.channels[c].distance_functions.len() > 1,
    }
}

/// Generates evenly spaced floats from low to high (linear scale).
#[allow(clippy::cast_precision_loss)]
fn linear_points(low: f64, high: f64, n_points: usize) -> Vec<f64> {
    if n_points <= 1 {
        return vec![low];
    }
    let span = high - low;
    let last = n_points - 1;
    (0..n_points)
        .map(|i| match i {
            0 => low,
            i if i == last => high,
            i => low + span * (i as f64 / last as f64),
        })
        .collect()
}

/// Generates the midpoints of `n_points` equal cells in log space.
#[allow(clippy::cast_precision_loss)]
fn log_points(low: f64, high: f64, n_points: usize) -> Vec<f64> {
    let (log_low, log_high) = (low.ln(), high.ln());
    let cells = n_points.max(1) as f64;
    (0..n_points.max(1))
        .map(|i| {
            let value = (log_low + (log_high - log_low) * ((i as f64 + 0.5) / cells)).exp();
            rng_util::strictly_inside(value, low, high)
        })
        .collect()
}

fn float_points(range: &ScalarRange<f64>, n_points: usize) -> Vec<f64> {
    match range.scale {
        Scale::Linear => linear_points(range.min, range.max, n_points)
            .into_iter()
            .map(|p| p.clamp(range.min, range.max))
            .collect(),
        Scale::Log => log_points(range.min, range.max, n_points),
    }
}

fn int_points(range: &ScalarRange<u32>, n_points: usize) -> Vec<f64> {
    let mut points: Vec<f64> = float_points(
        &ScalarRange::with_scale(f64::from(range.min), f64::from(range.max), range.scale),
        n_points,
    )
    .into_iter()
    .map(f64::round)
    .collect();
    points.dedup();
    points
}

#[allow(clippy::cast_precision_loss)]
fn index_points(choices: usize, n_points: usize) -> Vec<f64> {
    let mut points: Vec<f64> = linear_points(0.0, (choices - 1) as f64, n_points.min(choices))
        .into_iter()
        .map(f64::round)
        .collect();
    points.dedup();
    points
}

fn axis_values(range: &ParameterRange, axis: Axis, n_points: usize) -> Vec<f64> {
    let n = if is_free(range, axis) { n_points } else { 1 };
    match axis {
        Axis::Beta => float_points(&range.beta, n),
        Axis::Gamma => float_points(&range.gamma, n),
        Axis::MaxIterations => int_points(&range.max_iterations, n),
        Axis::SvmC => float_points(&range.svm_c, n),
        Axis::SvmGamma => float_points(&range.svm_gamma, n),
        Axis::SvmChannels => int_points(&range.svm_channels, n),
        Axis::Weight(c) => float_points(&range.channels[c].weight, n),
        Axis::ReducedDim(c) => int_points(&range.channels[c].reduced_dim, n),
        Axis::Distance(c) => index_points(range.channels[c].distance_functions.len(), n),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn build_set(
    range: &ParameterRange,
    axes: &[Axis],
    values: &[Vec<f64>],
    odometer: &[usize],
    id: u64,
) -> Option<ParameterSet> {
    let n = range.channel_count();
    let mut set = ParameterSet {
        id,
        beta: 0.0,
        gamma: 0.0,
        max_iterations: 0,
        svm_c: 0.0,
        svm_gamma: 0.0,
        svm_channels: 0,
        channels: vec![
            ChannelParameters {
                weight: 0.0,
                distance_index: 0,
                reduced_dim: 0,
            };
            n
        ],
    };
    for (a, axis) in axes.iter().enumerate() {
        let value = values[a][odometer[a]];
        match *axis {
            Axis::Beta => set.beta = value,
            Axis::Gamma => set.gamma = value,
            Axis::MaxIterations => set.max_iterations = value as u32,
            Axis::SvmC => set.svm_c = value,
            Axis::SvmGamma => set.svm_gamma = value,
            Axis::SvmChannels => set.svm_channels = value as u32,
            Axis::Weight(c) => set.channels[c].weight = value,
            Axis::ReducedDim(c) => set.channels[c].reduced_dim = value as u32,
            Axis::Distance(c) => set.channels[c].distance_index = value as usize,
        }
    }
    let others: f64 = set.channels[..n - 1].iter().map(|c| c.weight).sum();
    set.channels[n - 1].weight = fit_remainder(range, 1.0 - others)?;
    Some(set)
}

impl ParameterGenerator for CartesianGridGenerator {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn generate(&self, range: &ParameterRange, count: usize) -> Result<Vec<ParameterSet>> {
        range.validate()?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let axes = axes(range);
        let free = axes.iter().filter(|a| is_free(range, **a)).count();
        let per_axis = Self::samples_per_parameter(count, free);
        let values: Vec<Vec<f64>> = axes
            .iter()
            .map(|a| axis_values(range, *a, per_axis))
            .collect();

        let mut sets = Vec::new();
        let mut odometer = vec![0_usize; axes.len()];
        'enumerate: loop {
            if let Some(set) = build_set(range, &axes, &values, &odometer, sets.len() as u64) {
                sets.push(set);
            }
            for (a, digit) in odometer.iter_mut().enumerate() {
                *digit += 1;
                if *digit < values[a].len() {
                    continue 'enumerate;
                }
                *digit = 0;
            }
            break;
        }

        trace_debug!(
            free_axes = free,
            per_axis,
            count = sets.len(),
            skipped = values.iter().map(Vec::len).product::<usize>() - sets.len(),
            "cartesian grid generated"
        );
        Ok(sets)
    }
}
