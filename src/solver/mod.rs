//! The diffusion stage: an extended random walker over the voxel graph.
//!
//! Neighbouring voxels (6-neighbourhood) are joined by edges whose weight
//! combines every input channel: the distance between the two feature
//! vectors, scaled to `[0, 1]` per channel, is turned into an affinity by the
//! channel's [`Normalizer`] and weighted by the channel weight. For each label
//! `l` the solver then finds the potentials `x_l` of
//!
//! ```text
//! (L + γ · Σₖ Λₖ) x_l = γ · λ_l
//! ```
//!
//! where `L` is the weighted graph Laplacian, `λ_l` the classifier's prior
//! for label `l` and `Λₖ` the diagonal matrix of prior `k`. The system is
//! solved with a Jacobi-preconditioned conjugate gradient; the label of a
//! voxel is the label with the largest potential.

mod graph;
mod linear;

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::distance::DistanceFunction;
use crate::error::{Error, Result};
use crate::features::FeatureImage;
use crate::volume::{Dimensions, LabelVolume, ProbabilityVolumeSet};

use self::linear::{CsrMatrix, conjugate_gradient};

/// Relative residual at which a solve counts as converged.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Monotone map from a scaled distance in `[0, 1]` to an edge affinity.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Normalizer {
    /// `exp(-beta · d)`.
    Gaussian {
        /// Edge sensitivity.
        beta: f64,
    },
    /// `1 / (1 + beta · d)`.
    Inverse {
        /// Edge sensitivity.
        beta: f64,
    },
}

impl Normalizer {
    /// Affinity of a scaled distance.
    #[must_use]
    pub fn affinity(self, distance: f64) -> f64 {
        match self {
            Self::Gaussian { beta } => (-beta * distance).exp(),
            Self::Inverse { beta } => 1.0 / (1.0 + beta * distance),
        }
    }
}

/// One image channel as the solver sees it.
#[derive(Clone, Debug)]
pub struct InputChannel {
    /// Per-voxel features, possibly reduced.
    pub features: Arc<FeatureImage>,
    /// Distance between neighbouring feature vectors.
    pub distance: DistanceFunction,
    /// Distance-to-affinity map.
    pub normalizer: Normalizer,
    /// Share of this channel in the combined edge weight.
    pub weight: f64,
}

impl InputChannel {
    /// A channel description.
    #[must_use]
    pub fn new(
        features: Arc<FeatureImage>,
        distance: DistanceFunction,
        normalizer: Normalizer,
        weight: f64,
    ) -> Self {
        Self {
            features,
            distance,
            normalizer,
            weight,
        }
    }
}

/// Output of a successful solve.
#[derive(Clone, Debug)]
pub struct LabelingResult {
    /// Arg-max label per voxel.
    pub labels: LabelVolume,
    /// Potentials per label, clamped to `[0, 1]`.
    pub probabilities: ProbabilityVolumeSet,
    /// Largest iteration count over the per-label solves.
    pub iterations: usize,
}

/// Extended random walker over a voxel volume.
#[derive(Clone, Debug)]
pub struct DiffusionLabelSolver {
    dims: Dimensions,
    spacing: [f64; 3],
    channels: Vec<InputChannel>,
    priors: ProbabilityVolumeSet,
    gamma: f64,
    max_iterations: usize,
    tolerance: f64,
}

impl DiffusionLabelSolver {
    /// A solver for one sample. Inputs are checked by [`run`](Self::run).
    #[must_use]
    pub fn new(
        dims: Dimensions,
        spacing: [f64; 3],
        channels: Vec<InputChannel>,
        priors: ProbabilityVolumeSet,
        gamma: f64,
        max_iterations: usize,
    ) -> Self {
        Self {
            dims,
            spacing,
            channels,
            priors,
            gamma,
            max_iterations,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Override the convergence tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn check(&self) -> Result<()> {
        if self.dims.voxel_count() == 0 {
            return Err(Error::SolverFailed("volume has no voxels".to_owned()));
        }
        if self.channels.is_empty() {
            return Err(Error::SolverFailed("no input channels".to_owned()));
        }
        if self.priors.dimensions() != self.dims {
            let p = self.priors.dimensions();
            return Err(Error::SolverFailed(format!(
                "priors are {}x{}x{}, volume is {}x{}x{}",
                p.width, p.height, p.depth, self.dims.width, self.dims.height, self.dims.depth
            )));
        }
        if self.spacing.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(Error::SolverFailed(format!(
                "voxel spacing {:?} is not positive",
                self.spacing
            )));
        }
        if !(self.gamma.is_finite() && self.gamma >= 0.0) {
            return Err(Error::SolverFailed(format!(
                "prior weight gamma {} is invalid",
                self.gamma
            )));
        }
        Ok(())
    }

    /// Solve for every label.
    ///
    /// # Errors
    ///
    /// Returns `Error::SolverFailed` on inconsistent inputs, on numerical
    /// breakdown, or when a label's system has not converged within the
    /// iteration cap.
    pub fn run(&self) -> Result<LabelingResult> {
        self.check()?;
        let n = self.dims.voxel_count();
        let label_count = self.priors.label_count();

        let priors: Vec<Vec<f64>> = self
            .priors
            .iter()
            .map(|volume| {
                (0..n)
                    .map(|i| {
                        let p = volume[self.dims.coord(i).index()];
                        if p.is_finite() { p.max(0.0) } else { 0.0 }
                    })
                    .collect()
            })
            .collect();
        let extra_diagonal: Vec<f64> = (0..n)
            .map(|i| self.gamma * priors.iter().map(|p| p[i]).sum::<f64>())
            .collect();

        let edges = graph::edge_weights(self.dims, self.spacing, &self.channels)?;
        let matrix = CsrMatrix::laplacian(n, &edges, &extra_diagonal);

        let mut potentials = Vec::with_capacity(label_count);
        let mut iterations = 0;
        for (label, prior) in priors.iter().enumerate() {
            let rhs: Vec<f64> = prior.iter().map(|p| self.gamma * p).collect();
            let (x, convergence) =
                conjugate_gradient(&matrix, &rhs, self.max_iterations, self.tolerance)?;
            trace_debug!(
                label,
                iterations = convergence.iterations,
                residual = convergence.relative_residual,
                "label potentials solved"
            );
            iterations = iterations.max(convergence.iterations);
            potentials.push(x);
        }

        let mut labels = self.dims.filled(0_u32);
        let mut volumes: Vec<_> = (0..label_count).map(|_| self.dims.filled(0.0)).collect();
        for i in 0..n {
            let index = self.dims.coord(i).index();
            let mut best = 0;
            let mut best_value = f64::NEG_INFINITY;
            for (label, x) in potentials.iter().enumerate() {
                let value = if x[i].is_nan() { 0.0 } else { x[i].clamp(0.0, 1.0) };
                volumes[label][index] = value;
                if value >= best_value {
                    best_value = value;
                    best = label;
                }
            }
            labels[index] =
                u32::try_from(best).map_err(|_| Error::Internal("label index overflow"))?;
        }

        Ok(LabelingResult {
            labels,
            probabilities: ProbabilityVolumeSet::new(volumes)?,
            iterations,
        })
    }
}
