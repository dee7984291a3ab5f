//! Voxel geometry and the volumes a sample produces.
//!
//! Volumes are [`ndarray::Array3`] indexed `[[x, y, z]]`. Volumes created by
//! this crate use Fortran (column-major) layout, so the linear voxel index
//! `x + y·width + z·width·height` matches memory order.

use ndarray::{Array3, ShapeBuilder};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A final label map: one label per voxel.
pub type LabelVolume = Array3<u32>;

/// Extent of a 3D volume in voxels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Dimensions {
    /// Voxels along x.
    pub width: usize,
    /// Voxels along y.
    pub height: usize,
    /// Voxels along z.
    pub depth: usize,
}

/// Position of a voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VoxelCoord {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
    /// Slice.
    pub z: usize,
}

impl VoxelCoord {
    /// A coordinate.
    #[must_use]
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// The `[x, y, z]` index into an [`Array3`].
    #[must_use]
    pub fn index(self) -> [usize; 3] {
        [self.x, self.y, self.z]
    }
}

impl Dimensions {
    /// A volume extent.
    #[must_use]
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Extent of an existing array.
    #[must_use]
    pub fn of<T>(volume: &Array3<T>) -> Self {
        let (width, height, depth) = volume.dim();
        Self::new(width, height, depth)
    }

    /// Total number of voxels.
    #[must_use]
    pub fn voxel_count(self) -> usize {
        self.width * self.height * self.depth
    }

    /// The `(width, height, depth)` shape tuple.
    #[must_use]
    pub fn shape(self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    /// Whether `coord` lies inside the volume.
    #[must_use]
    pub fn contains(self, coord: VoxelCoord) -> bool {
        coord.x < self.width && coord.y < self.height && coord.z < self.depth
    }

    /// Linear index of `coord`, x fastest.
    #[must_use]
    pub fn linear_index(self, coord: VoxelCoord) -> usize {
        coord.x + self.width * (coord.y + self.height * coord.z)
    }

    /// Coordinate of a linear index.
    #[must_use]
    pub fn coord(self, index: usize) -> VoxelCoord {
        let plane = self.width * self.height;
        VoxelCoord {
            x: index % self.width,
            y: (index % plane) / self.width,
            z: index / plane,
        }
    }

    /// A Fortran-ordered volume of this extent with every voxel set to `value`.
    #[must_use]
    pub fn filled<T: Clone>(self, value: T) -> Array3<T> {
        Array3::from_elem(self.shape().f(), value)
    }

    /// Build a Fortran-ordered volume from values in linear-index order.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShapeMismatch` if `values` does not hold one value per voxel.
    pub fn volume_from_vec<T>(self, values: Vec<T>) -> Result<Array3<T>> {
        let len = values.len();
        Array3::from_shape_vec(self.shape().f(), values).map_err(|_| {
            Error::ShapeMismatch(format!(
                "{len} values for a {}x{}x{} volume",
                self.width, self.height, self.depth
            ))
        })
    }

    /// Fail unless `other` has the same extent.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShapeMismatch` describing both extents.
    pub fn ensure_same(self, other: Self, what: &str) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(Error::ShapeMismatch(format!(
                "{what} is {}x{}x{}, expected {}x{}x{}",
                other.width, other.height, other.depth, self.width, self.height, self.depth
            )))
        }
    }
}

/// One probability volume per label, all of the same extent.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbabilityVolumeSet {
    volumes: Vec<Array3<f64>>,
}

impl ProbabilityVolumeSet {
    /// Wrap per-label volumes.
    ///
    /// # Errors
    ///
    /// Returns `Error::ShapeMismatch` if the set is empty or the volumes differ in extent.
    pub fn new(volumes: Vec<Array3<f64>>) -> Result<Self> {
        let first = volumes
            .first()
            .ok_or_else(|| Error::ShapeMismatch("probability set holds no volumes".to_owned()))?;
        let dims = Dimensions::of(first);
        for volume in &volumes[1..] {
            dims.ensure_same(Dimensions::of(volume), "probability volume")?;
        }
        Ok(Self { volumes })
    }

    /// Every voxel gets probability `1 / label_count` per label.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn uniform(dims: Dimensions, label_count: usize) -> Self {
        let p = 1.0 / label_count.max(1) as f64;
        Self {
            volumes: (0..label_count.max(1))
                .map(|_| dims.filled(p))
                .collect(),
        }
    }

    /// Number of labels.
    #[must_use]
    pub fn label_count(&self) -> usize {
        self.volumes.len()
    }

    /// Common extent of the volumes.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        self.volumes
            .first()
            .map_or(Dimensions::new(0, 0, 0), Dimensions::of)
    }

    /// Probability volume of `label`.
    #[must_use]
    pub fn get(&self, label: usize) -> Option<&Array3<f64>> {
        self.volumes.get(label)
    }

    /// Probability of `label` at `coord`.
    #[must_use]
    pub fn probability(&self, label: usize, coord: VoxelCoord) -> f64 {
        self.volumes[label][coord.index()]
    }

    /// Iterate the per-label volumes.
    pub fn iter(&self) -> core::slice::Iter<'_, Array3<f64>> {
        self.volumes.iter()
    }

    /// Unwrap into the per-label volumes.
    #[must_use]
    pub fn into_inner(self) -> Vec<Array3<f64>> {
        self.volumes
    }
}

impl<'a> IntoIterator for &'a ProbabilityVolumeSet {
    type Item = &'a Array3<f64>;
    type IntoIter = core::slice::Iter<'a, Array3<f64>>;

    fn into_iter(self) -> Self::IntoIter {
        self.volumes.iter()
    }
}
