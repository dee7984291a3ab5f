#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Ensemble sampling of a two-stage probabilistic 3D segmentation pipeline.
//!
//! Every sample runs a probabilistic SVM classifier trained on user seed
//! voxels to produce per-label prior probabilities, then an extended random
//! walker (a diffusion-style label solver over the voxel graph) to produce the
//! final probabilities and label map. The sampler draws many parameter sets
//! from a declared [`ParameterRange`], runs the pipeline for each one under a
//! concurrency bound, derives characteristics per result and persists
//! everything as it goes.
//!
//! # Getting Started
//!
//! ```no_run
//! use seg_ensemble::prelude::*;
//!
//! # async fn example(image: VolumeImage, seeds: Seeds) -> seg_ensemble::Result<()> {
//! let registry = Registry::standard();
//! let range = ParameterRange::parse(
//!     "Beta\t0.1:10:log\nGamma\t0.01:1:log\nMaxIterations\t50:200\n\
//!      SvmC\t0.1:100:log\nSvmGamma\t0.01:10:log\nSvmChannels\t1:1\n\
//!      Weight\t1:1\nReducedDim\t1:1\nDist\tl1,l2\n",
//!     &registry,
//! )?;
//!
//! let sampler = EnsembleSampler::builder(image, seeds, range)
//!     .generator(RandomGenerator::with_seed(7))
//!     .sample_count(20)
//!     .store(FolderStore::new("ensemble-out"))
//!     .build()?;
//!
//! let report = sampler.run().await?;
//! println!("{:?}: {} results", report.state, report.results.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`ParameterRange`] | Declared bounds of every input parameter, per-channel blocks, observed output bounds. |
//! | [`ParameterSet`] | One concrete assignment of all input parameters, with a numeric ID. |
//! | [`ParameterGenerator`](generator::ParameterGenerator) | Strategy producing a batch of parameter sets from a range. |
//! | [`ProbabilisticClassifier`](classifier::ProbabilisticClassifier) | RBF C-SVC with Platt scaling; seeds + image to per-label priors. |
//! | [`DiffusionLabelSolver`](solver::DiffusionLabelSolver) | Random-walker solve on the 6-neighbourhood graph; priors to labels. |
//! | [`CharacteristicsCalculator`] | Object count and overlap metrics for one result. |
//! | [`EnsembleSampler`] | Runs the whole batch: generate, dispatch, characterise, persist. |
//! | [`ResultStore`](storage::ResultStore) | Where sample folders and summary files go. |
//!
//! # Generators
//!
//! | Generator | Registry name | Strategy |
//! |-----------|---------------|----------|
//! | [`RandomGenerator`](generator::RandomGenerator) | `Random` | Independent uniform draws (log-uniform on log scales) |
//! | [`LatinHypercubeGenerator`](generator::LatinHypercubeGenerator) | `Latin Hypercube` | One draw per stratum, strata shuffled per axis |
//! | [`CartesianGridGenerator`](generator::CartesianGridGenerator) | `Cartesian Grid` | Full factorial over evenly spaced axis values |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key sampling points | on |
//! | `serde` | `Serialize`/`Deserialize` on public types, JSON snapshots, [`SamplingConfig`] files | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

mod characteristics;
pub mod classifier;
mod config;
pub mod distance;
pub mod ensemble;
mod error;
pub mod features;
pub mod generator;
pub mod image;
mod parameter_set;
mod range;
mod registry;
mod result;
mod rng_util;
pub mod solver;
pub mod storage;
mod types;
pub mod volume;

pub use characteristics::{CharacteristicsCalculator, LabelOverlap, count_objects};
pub use config::SamplingConfig;
pub use distance::DistanceFunction;
pub use ensemble::{
    AbortHandle, EnsembleSampler, EnsembleSamplerBuilder, NoProgress, ProgressSink,
    SamplingReport,
};
pub use error::{Error, Result};
pub use parameter_set::{ChannelParameters, ParameterSet};
pub use range::{ChannelRange, ObservedBounds, ParameterRange, ScalarRange};
pub use registry::{GeneratorFactory, Registry};
pub use result::{DerivedOutput, SamplingResults, SingleResult};
pub use types::{SamplerState, Scale};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use seg_ensemble::prelude::*;
/// ```
pub mod prelude {
    pub use crate::characteristics::{CharacteristicsCalculator, LabelOverlap};
    pub use crate::classifier::{ClassifierParams, ProbabilisticClassifier};
    pub use crate::config::SamplingConfig;
    pub use crate::distance::DistanceFunction;
    pub use crate::ensemble::{
        AbortHandle, EnsembleSampler, EnsembleSamplerBuilder, NoProgress, ProgressSink,
        SamplingReport,
    };
    pub use crate::error::{Error, Result};
    pub use crate::generator::{
        CartesianGridGenerator, LatinHypercubeGenerator, ParameterGenerator, RandomGenerator,
    };
    pub use crate::image::{ImageSource, SeedSource, Seeds, VolumeImage};
    pub use crate::parameter_set::{ChannelParameters, ParameterSet};
    pub use crate::range::{ChannelRange, ObservedBounds, ParameterRange, ScalarRange};
    pub use crate::registry::Registry;
    pub use crate::result::{DerivedOutput, SamplingResults, SingleResult};
    pub use crate::solver::{DiffusionLabelSolver, InputChannel, Normalizer};
    pub use crate::storage::{FolderStore, MemoryStore, ResultStore, SummaryFiles};
    pub use crate::types::{SamplerState, Scale};
    pub use crate::volume::{Dimensions, LabelVolume, ProbabilityVolumeSet, VoxelCoord};
}
