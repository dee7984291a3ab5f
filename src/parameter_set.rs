use core::fmt::Write as _;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::range::ParameterRange;

/// Sampled values of one channel block.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelParameters {
    /// Weight of the channel in the solver's edge-weight combination.
    pub weight: f64,
    /// Index into the channel's declared distance functions.
    pub distance_index: usize,
    /// Number of principal components kept.
    pub reduced_dim: u32,
}

/// One concrete assignment of every input parameter.
///
/// IDs are assigned by the generator, consecutively from 0 within a batch.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParameterSet {
    /// Identifier, unique within a run.
    pub id: u64,
    /// Edge-weight sensitivity of the diffusion solver.
    pub beta: f64,
    /// Weight of the prior probabilities in the diffusion solver.
    pub gamma: f64,
    /// Iteration cap of the diffusion solver.
    pub max_iterations: u32,
    /// SVM regularisation constant.
    pub svm_c: f64,
    /// SVM RBF kernel width.
    pub svm_gamma: f64,
    /// Number of image components the SVM uses.
    pub svm_channels: u32,
    /// Per-channel values, in channel order.
    pub channels: Vec<ChannelParameters>,
}

const GLOBAL_FIELDS: usize = 7;
const CHANNEL_FIELDS: usize = 3;

impl ParameterSet {
    /// Sum of all channel weights.
    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.channels.iter().map(|c| c.weight).sum()
    }

    /// Render the single-line descriptor:
    /// `id beta gamma maxIterations svmC svmGamma svmChannels`, then
    /// `reducedDim weight distance` per channel.
    ///
    /// Floats use Rust's shortest round-trip formatting, so parsing the
    /// descriptor back yields bit-identical values.
    ///
    /// # Errors
    ///
    /// Returns `Error::Descriptor` if the set does not fit `range` (channel
    /// count or distance index).
    pub fn to_descriptor(&self, range: &ParameterRange) -> Result<String> {
        if self.channels.len() != range.channel_count() {
            return Err(Error::Descriptor(format!(
                "parameter set {} has {} channels, range declares {}",
                self.id,
                self.channels.len(),
                range.channel_count()
            )));
        }
        let mut line = format!(
            "{} {} {} {} {} {} {}",
            self.id,
            self.beta,
            self.gamma,
            self.max_iterations,
            self.svm_c,
            self.svm_gamma,
            self.svm_channels
        );
        for (i, channel) in self.channels.iter().enumerate() {
            let function = range
                .distance_function(i, channel.distance_index)
                .ok_or_else(|| {
                    Error::Descriptor(format!(
                        "channel {i}: distance index {} out of range",
                        channel.distance_index
                    ))
                })?;
            write!(line, " {} {} {}", channel.reduced_dim, channel.weight, function)
                .map_err(|e| Error::Descriptor(e.to_string()))?;
        }
        Ok(line)
    }

    /// Parse a descriptor produced by [`to_descriptor`](Self::to_descriptor).
    ///
    /// # Errors
    ///
    /// Returns `Error::Descriptor` for a wrong field count, malformed numbers or
    /// a distance function the channel does not declare.
    pub fn from_descriptor(line: &str, range: &ParameterRange) -> Result<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let expected = GLOBAL_FIELDS + CHANNEL_FIELDS * range.channel_count();
        if tokens.len() != expected {
            return Err(Error::Descriptor(format!(
                "expected {expected} fields, found {}",
                tokens.len()
            )));
        }

        let mut channels = Vec::with_capacity(range.channel_count());
        for (i, chunk) in tokens[GLOBAL_FIELDS..].chunks(CHANNEL_FIELDS).enumerate() {
            let declared = &range.channels[i].distance_functions;
            let distance_index = declared
                .iter()
                .position(|f| f.short_name() == chunk[2])
                .ok_or_else(|| {
                    Error::Descriptor(format!(
                        "channel {i} does not declare distance function '{}'",
                        chunk[2]
                    ))
                })?;
            channels.push(ChannelParameters {
                reduced_dim: field(chunk[0], "reduced dimension")?,
                weight: field(chunk[1], "weight")?,
                distance_index,
            });
        }

        Ok(Self {
            id: field(tokens[0], "id")?,
            beta: field(tokens[1], "beta")?,
            gamma: field(tokens[2], "gamma")?,
            max_iterations: field(tokens[3], "max iterations")?,
            svm_c: field(tokens[4], "svm c")?,
            svm_gamma: field(tokens[5], "svm gamma")?,
            svm_channels: field(tokens[6], "svm channels")?,
            channels,
        })
    }
}

fn field<T: FromStr>(token: &str, what: &str) -> Result<T> {
    token
        .parse()
        .map_err(|_| Error::Descriptor(format!("malformed {what} '{token}'")))
}
