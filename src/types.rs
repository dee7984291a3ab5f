//! Core types shared across the crate.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How values of a scalar parameter are spread between its bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Scale {
    /// Values are spread evenly between the bounds.
    #[default]
    Linear,
    /// Values are spread evenly between the logarithms of the bounds.
    Log,
}

impl Scale {
    /// Suffix used in the parameter range text format.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Linear => "lin",
            Self::Log => "log",
        }
    }
}

/// Lifecycle of an [`EnsembleSampler`](crate::EnsembleSampler) run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SamplerState {
    /// Constructed, not yet started.
    Idle,
    /// Producing the batch of parameter sets.
    Generating,
    /// Dispatching and finishing samples.
    Running,
    /// Every parameter set was processed.
    Completed,
    /// Stopped early on user request; in-flight work was drained.
    Aborted,
    /// Stopped because of a fatal error.
    Failed,
}

impl SamplerState {
    /// Whether the sampler reached a terminal state.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }
}
