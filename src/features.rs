//! Per-voxel feature vectors and their dimensionality reduction.
//!
//! The classifier sees the concatenated components of the image channels; the
//! diffusion solver sees one feature image per channel, projected onto the
//! channel's leading principal components when the parameter set asks for
//! fewer dimensions than the channel has. Reduced images are shared between
//! samples through a [`FeatureCache`] that lives as long as one run.

use std::collections::HashMap;
use std::sync::Arc;

use nalgebra::{DMatrix, SymmetricEigen};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::image::ImageSource;

/// A dense `voxels × features` matrix, one row per voxel in linear-index order.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureImage {
    feature_count: usize,
    voxel_count: usize,
    values: Vec<f64>,
}

impl FeatureImage {
    /// Wrap row-major values.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShapeMismatch` if `values` is not `voxel_count × feature_count` long.
    pub fn new(voxel_count: usize, feature_count: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != voxel_count * feature_count {
            return Err(Error::ShapeMismatch(format!(
                "{} feature values for {voxel_count} voxels x {feature_count} features",
                values.len()
            )));
        }
        Ok(Self {
            feature_count,
            voxel_count,
            values,
        })
    }

    /// Every component of `channel`.
    #[must_use]
    pub fn from_channel(image: &dyn ImageSource, channel: usize) -> Self {
        let voxel_count = image.dimensions().voxel_count();
        let feature_count = image.component_count(channel);
        let mut values = Vec::with_capacity(voxel_count * feature_count);
        for voxel in 0..voxel_count {
            for component in 0..feature_count {
                values.push(image.value_at(channel, component, voxel));
            }
        }
        Self {
            feature_count,
            voxel_count,
            values,
        }
    }

    /// The first `max_features` components over all channels, channel by channel.
    #[must_use]
    pub fn from_components(image: &dyn ImageSource, max_features: usize) -> Self {
        let voxel_count = image.dimensions().voxel_count();
        let order: Vec<(usize, usize)> = (0..image.channel_count())
            .flat_map(|c| (0..image.component_count(c)).map(move |k| (c, k)))
            .take(max_features)
            .collect();
        let mut values = Vec::with_capacity(voxel_count * order.len());
        for voxel in 0..voxel_count {
            for &(channel, component) in &order {
                values.push(image.value_at(channel, component, voxel));
            }
        }
        Self {
            feature_count: order.len(),
            voxel_count,
            values,
        }
    }

    /// Features per voxel.
    #[must_use]
    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Number of voxels.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.voxel_count
    }

    /// Feature vector of `voxel`.
    #[must_use]
    pub fn features(&self, voxel: usize) -> &[f64] {
        let start = voxel * self.feature_count;
        &self.values[start..start + self.feature_count]
    }

    /// Project onto the `dims` leading principal components.
    ///
    /// Returns a copy when `dims` is not smaller than the current feature count.
    /// Component signs are fixed so that each axis's largest loading is positive.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` when `dims` is zero.
    #[allow(clippy::cast_precision_loss)]
    pub fn reduce(&self, dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::InvalidConfig(
                "reduced dimension must be at least 1".to_owned(),
            ));
        }
        let k = self.feature_count;
        if dims >= k || self.voxel_count == 0 {
            return Ok(self.clone());
        }

        let n = self.voxel_count;
        let mut mean = vec![0.0; k];
        for voxel in 0..n {
            for (m, v) in mean.iter_mut().zip(self.features(voxel)) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n as f64;
        }

        let mut covariance = DMatrix::<f64>::zeros(k, k);
        for voxel in 0..n {
            let centered: Vec<f64> = self
                .features(voxel)
                .iter()
                .zip(&mean)
                .map(|(v, m)| v - m)
                .collect();
            for i in 0..k {
                for j in i..k {
                    covariance[(i, j)] += centered[i] * centered[j];
                }
            }
        }
        let denominator = (n.max(2) - 1) as f64;
        for i in 0..k {
            for j in i..k {
                let c = covariance[(i, j)] / denominator;
                covariance[(i, j)] = c;
                covariance[(j, i)] = c;
            }
        }

        let eigen = SymmetricEigen::new(covariance);
        let mut order: Vec<usize> = (0..k).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

        let axes: Vec<Vec<f64>> = order[..dims]
            .iter()
            .map(|&col| {
                let axis: Vec<f64> = eigen.eigenvectors.column(col).iter().copied().collect();
                let dominant = axis
                    .iter()
                    .copied()
                    .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
                if dominant < 0.0 {
                    axis.into_iter().map(|v| -v).collect()
                } else {
                    axis
                }
            })
            .collect();

        let mut values = Vec::with_capacity(n * dims);
        for voxel in 0..n {
            let features = self.features(voxel);
            for axis in &axes {
                let projected: f64 = features
                    .iter()
                    .zip(&mean)
                    .zip(axis)
                    .map(|((v, m), a)| (v - m) * a)
                    .sum();
                values.push(projected);
            }
        }

        trace_debug!(from = k, to = dims, voxels = n, "principal component projection");
        Ok(Self {
            feature_count: dims,
            voxel_count: n,
            values,
        })
    }
}

/// Run-scoped cache of per-channel feature images keyed by `(channel, dims)`.
#[derive(Default)]
pub struct FeatureCache {
    entries: Mutex<HashMap<(usize, usize), Arc<FeatureImage>>>,
}

impl FeatureCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feature image of `channel` reduced to `dims` components (clamped to the
    /// channel's component count), computed once per key.
    ///
    /// # Errors
    ///
    /// Returns `Error::InsufficientChannels` if the image has no such channel,
    /// or the [`FeatureImage::reduce`] error.
    pub fn channel(
        &self,
        image: &dyn ImageSource,
        channel: usize,
        dims: usize,
    ) -> Result<Arc<FeatureImage>> {
        if channel >= image.channel_count() {
            return Err(Error::InsufficientChannels {
                required: channel + 1,
                available: image.channel_count(),
            });
        }
        let dims = dims.min(image.component_count(channel)).max(1);
        if let Some(hit) = self.entries.lock().get(&(channel, dims)) {
            return Ok(Arc::clone(hit));
        }

        let full = FeatureImage::from_channel(image, channel);
        let reduced = Arc::new(full.reduce(dims)?);
        let mut entries = self.entries.lock();
        Ok(Arc::clone(entries.entry((channel, dims)).or_insert(reduced)))
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing was cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
