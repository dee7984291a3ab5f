//! Inputs of a sampling run: the multi-channel image and the seed voxels.
//!
//! The sampler only talks to the [`ImageSource`] and [`SeedSource`] traits.
//! [`VolumeImage`] and [`Seeds`] are in-memory implementations backed by
//! [`ndarray`] volumes.

use ndarray::Array3;

use crate::error::{Error, Result};
use crate::volume::{Dimensions, VoxelCoord};

/// A multi-channel, multi-component 3D image.
///
/// Channels correspond to the channel blocks of a
/// [`ParameterRange`](crate::ParameterRange); each channel holds one or more
/// components (e.g. the bins of a spectrum) per voxel.
pub trait ImageSource: Send + Sync {
    /// Voxel extent, shared by every channel.
    fn dimensions(&self) -> Dimensions;

    /// Physical voxel spacing along x, y, z.
    fn spacing(&self) -> [f64; 3];

    /// Number of channels.
    fn channel_count(&self) -> usize;

    /// Number of components of `channel`.
    fn component_count(&self, channel: usize) -> usize;

    /// Value of `component` of `channel` at `coord`.
    fn value(&self, channel: usize, component: usize, coord: VoxelCoord) -> f64;

    /// Value by linear voxel index (x fastest).
    fn value_at(&self, channel: usize, component: usize, index: usize) -> f64 {
        self.value(channel, component, self.dimensions().coord(index))
    }

    /// Total number of components over all channels.
    fn total_components(&self) -> usize {
        (0..self.channel_count())
            .map(|c| self.component_count(c))
            .sum()
    }
}

/// Seed voxels grouped by label.
///
/// Labels are `0..label_count()`; every label is expected to have seeds.
pub trait SeedSource: Send + Sync {
    /// Number of labels.
    fn label_count(&self) -> usize;

    /// Seed voxels of `label`.
    fn seeds(&self, label: usize) -> &[VoxelCoord];
}

/// In-memory image made of per-component volumes.
#[derive(Clone, Debug)]
pub struct VolumeImage {
    dimensions: Dimensions,
    spacing: [f64; 3],
    channels: Vec<Vec<Array3<f64>>>,
}

impl VolumeImage {
    /// An image without channels; add them with [`add_channel`](Self::add_channel).
    #[must_use]
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            spacing: [1.0; 3],
            channels: Vec::new(),
        }
    }

    /// Single-channel, single-component image.
    #[must_use]
    pub fn from_scalar(volume: Array3<f64>) -> Self {
        let dimensions = Dimensions::of(&volume);
        Self {
            dimensions,
            spacing: [1.0; 3],
            channels: vec![vec![volume]],
        }
    }

    /// Set the voxel spacing.
    #[must_use]
    pub fn with_spacing(mut self, spacing: [f64; 3]) -> Self {
        self.spacing = spacing;
        self
    }

    /// Append a channel made of one volume per component.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShapeMismatch` if `components` is empty or a component's
    /// extent differs from the image's.
    pub fn add_channel(&mut self, components: Vec<Array3<f64>>) -> Result<usize> {
        if components.is_empty() {
            return Err(Error::ShapeMismatch("channel without components".to_owned()));
        }
        for component in &components {
            self.dimensions
                .ensure_same(Dimensions::of(component), "channel component")?;
        }
        self.channels.push(components);
        Ok(self.channels.len() - 1)
    }

    /// Builder-style [`add_channel`](Self::add_channel).
    ///
    /// # Errors
    ///
    /// See [`add_channel`](Self::add_channel).
    pub fn with_channel(mut self, components: Vec<Array3<f64>>) -> Result<Self> {
        self.add_channel(components)?;
        Ok(self)
    }
}

impl ImageSource for VolumeImage {
    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn component_count(&self, channel: usize) -> usize {
        self.channels.get(channel).map_or(0, Vec::len)
    }

    fn value(&self, channel: usize, component: usize, coord: VoxelCoord) -> f64 {
        self.channels[channel][component][coord.index()]
    }
}

/// In-memory seed voxels.
#[derive(Clone, Debug, Default)]
pub struct Seeds {
    labels: Vec<Vec<VoxelCoord>>,
}

impl Seeds {
    /// No seeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds for labels `0..labels.len()`.
    #[must_use]
    pub fn from_labels(labels: Vec<Vec<VoxelCoord>>) -> Self {
        Self { labels }
    }

    /// Add a seed for `label`, growing the label count as needed.
    pub fn add(&mut self, label: usize, coord: VoxelCoord) {
        if self.labels.len() <= label {
            self.labels.resize_with(label + 1, Vec::new);
        }
        self.labels[label].push(coord);
    }

    /// Builder-style [`add`](Self::add).
    #[must_use]
    pub fn with(mut self, label: usize, coord: VoxelCoord) -> Self {
        self.add(label, coord);
        self
    }

    /// Total number of seed voxels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.iter().map(Vec::len).sum()
    }

    /// Whether no seed was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SeedSource for Seeds {
    fn label_count(&self) -> usize {
        self.labels.len()
    }

    fn seeds(&self, label: usize) -> &[VoxelCoord] {
        self.labels.get(label).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Check that every label has at least one seed and every seed lies inside `dims`.
///
/// # Errors
///
/// Returns `Error::Seeds` describing the first problem found.
pub fn validate_seeds(seeds: &dyn SeedSource, dims: Dimensions) -> Result<()> {
    if seeds.label_count() == 0 {
        return Err(Error::Seeds("no labels".to_owned()));
    }
    for label in 0..seeds.label_count() {
        let voxels = seeds.seeds(label);
        if voxels.is_empty() {
            return Err(Error::Seeds(format!("label {label} has no seed voxels")));
        }
        if let Some(outside) = voxels.iter().find(|c| !dims.contains(**c)) {
            return Err(Error::Seeds(format!(
                "seed ({}, {}, {}) of label {label} lies outside the image",
                outside.x, outside.y, outside.z
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_channel_image() {
        let dims = Dimensions::new(2, 2, 1);
        let a = dims.volume_from_vec(vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let b = dims.filled(7.0);
        let image = VolumeImage::new(dims)
            .with_channel(vec![a.clone()])
            .unwrap()
            .with_channel(vec![a, b])
            .unwrap();
        assert_eq!(image.channel_count(), 2);
        assert_eq!(image.total_components(), 3);
        assert_eq!(image.value_at(1, 0, 3), 3.0);
        assert_eq!(image.value(1, 1, VoxelCoord::new(1, 1, 0)), 7.0);
        let wrong = Dimensions::new(1, 1, 1).filled(0.0);
        assert!(image.clone().with_channel(vec![wrong]).is_err());
    }

    #[test]
    fn seeds_validation() {
        let dims = Dimensions::new(2, 2, 2);
        let seeds = Seeds::new()
            .with(0, VoxelCoord::new(0, 0, 0))
            .with(2, VoxelCoord::new(1, 1, 1));
        assert_eq!(seeds.label_count(), 3);
        assert!(matches!(validate_seeds(&seeds, dims), Err(Error::Seeds(_))));

        let seeds = seeds.with(1, VoxelCoord::new(2, 0, 0));
        assert!(validate_seeds(&seeds, dims).is_err());

        let seeds = Seeds::from_labels(vec![
            vec![VoxelCoord::new(0, 0, 0)],
            vec![VoxelCoord::new(1, 1, 1)],
        ]);
        assert!(validate_seeds(&seeds, dims).is_ok());
        assert_eq!(seeds.len(), 2);
    }
}
