use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the lower bound of a range is greater than the upper bound.
    #[error("invalid bounds for '{name}': min ({min}) must be less than or equal to max ({max})")]
    InvalidBounds {
        /// The name of the offending parameter.
        name: String,
        /// The lower bound value.
        min: f64,
        /// The upper bound value.
        max: f64,
    },

    /// Returned when log scale is used with non-positive bounds.
    #[error("invalid log bounds for '{name}': min must be positive for log scale")]
    InvalidLogBounds {
        /// The name of the offending parameter.
        name: String,
    },

    /// Returned when a parameter range text cannot be parsed.
    #[error("parameter range format error at line {line}: {reason}")]
    RangeFormat {
        /// 1-based line number of the offending record (0 when at end of input).
        line: usize,
        /// What was wrong with the record.
        reason: String,
    },

    /// Returned when a parameter-set descriptor line cannot be parsed.
    #[error("invalid parameter set descriptor: {0}")]
    Descriptor(String),

    /// Returned when a distance-function short name is not registered.
    #[error("unknown distance function '{0}'")]
    UnknownDistanceFunction(String),

    /// Returned when a generator name is not registered.
    #[error("unknown parameter generator '{0}'")]
    UnknownGenerator(String),

    /// Returned when a range declares no input channel.
    #[error("parameter range declares no input channels")]
    NoChannels,

    /// Returned when a channel declares an empty distance-function set.
    #[error("channel {channel} declares no distance functions")]
    NoDistanceFunctions {
        /// Index of the channel.
        channel: usize,
    },

    /// Returned when the image provides fewer channels than the range declares.
    #[error("range declares {required} channels but the image provides {available}")]
    InsufficientChannels {
        /// Channels declared by the range.
        required: usize,
        /// Channels available in the image.
        available: usize,
    },

    /// Returned when no combination of channel weights summing to 1 can be found.
    #[error("channel weights cannot sum to 1 within the declared ranges ({attempts} attempts)")]
    UnsatisfiableWeights {
        /// Number of rejected draws.
        attempts: usize,
    },

    /// Returned when a generator produced no parameter sets.
    #[error("parameter generator produced no parameter sets")]
    NoParameterSets,

    /// Returned when seed voxels are missing or invalid.
    #[error("invalid seeds: {0}")]
    Seeds(String),

    /// Returned when volumes that must line up have different shapes.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Returned when the probabilistic classifier cannot run.
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Returned when the diffusion solver fails.
    #[error("diffusion solver failed: {0}")]
    SolverFailed(String),

    /// Returned when a result folder to be created already exists.
    #[error("output folder '{}' already exists", .0.display())]
    OutputExists(PathBuf),

    /// Returned when a result with the same ID was already recorded.
    #[error("a result with ID {0} was already recorded")]
    DuplicateResult(u64),

    /// Returned when a result's label or probability volumes were already discarded.
    #[error("result {0} carries no label volume")]
    MissingDetails(u64),

    /// Returned when a sampler is run more than once.
    #[error("sampler has already been started")]
    AlreadyStarted,

    /// Returned when a configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// Returned when an async task fails.
    #[error("async task error: {0}")]
    TaskError(String),

    /// Returned when a storage operation fails.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether the error stems from configuration rather than from running a sample.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidBounds { .. }
                | Self::InvalidLogBounds { .. }
                | Self::RangeFormat { .. }
                | Self::Descriptor(_)
                | Self::UnknownDistanceFunction(_)
                | Self::UnknownGenerator(_)
                | Self::NoChannels
                | Self::NoDistanceFunctions { .. }
                | Self::InsufficientChannels { .. }
                | Self::UnsatisfiableWeights { .. }
                | Self::NoParameterSets
                | Self::InvalidConfig(_)
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

pub type Result<T> = core::result::Result<T, Error>;
