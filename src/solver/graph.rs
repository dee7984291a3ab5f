//! Edge weights of the 6-neighbourhood voxel graph.

use crate::error::{Error, Result};
use crate::volume::Dimensions;

use super::InputChannel;

/// Undirected edges `(a, b, weight)` with `a < b`, combined over all channels.
///
/// Per channel, raw distances are divided by their maximum, turned into
/// affinities by the channel's normaliser and summed with the channel weight.
/// The sum is divided by the spacing along the edge's axis.
pub(crate) fn edge_weights(
    dims: Dimensions,
    spacing: [f64; 3],
    channels: &[InputChannel],
) -> Result<Vec<(usize, usize, f64)>> {
    let pairs = neighbour_pairs(dims);
    let mut weights = vec![0.0; pairs.len()];

    for (index, channel) in channels.iter().enumerate() {
        if channel.features.voxel_count() != dims.voxel_count() {
            return Err(Error::SolverFailed(format!(
                "channel {index} has {} voxels, the volume has {}",
                channel.features.voxel_count(),
                dims.voxel_count()
            )));
        }
        let distances: Vec<f64> = pairs
            .iter()
            .map(|&(a, b, _)| {
                channel
                    .distance
                    .distance(channel.features.features(a), channel.features.features(b))
            })
            .collect();
        let max = distances
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(0.0_f64, f64::max);
        for (w, d) in weights.iter_mut().zip(distances) {
            let scaled = if max > 0.0 && d.is_finite() { d / max } else { 0.0 };
            *w += channel.weight * channel.normalizer.affinity(scaled);
        }
    }

    Ok(pairs
        .into_iter()
        .zip(weights)
        .map(|((a, b, axis), w)| (a, b, w / spacing[axis]))
        .collect())
}

/// Linear indices of neighbouring voxels with the axis they differ along.
fn neighbour_pairs(dims: Dimensions) -> Vec<(usize, usize, usize)> {
    let mut pairs = Vec::with_capacity(3 * dims.voxel_count());
    let steps = [1, dims.width, dims.width * dims.height];
    for index in 0..dims.voxel_count() {
        let coord = dims.coord(index);
        let room = [
            coord.x + 1 < dims.width,
            coord.y + 1 < dims.height,
            coord.z + 1 < dims.depth,
        ];
        for axis in 0..3 {
            if room[axis] {
                pairs.push((index, index + steps[axis], axis));
            }
        }
    }
    pairs
}
