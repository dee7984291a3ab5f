//! Declared bounds of every input parameter of the segmentation pipeline.
//!
//! A range has six global scalar parameters, one block per input channel and
//! the observed bounds of the two always-available outputs (object count and
//! duration). It reads and writes a line-oriented text format, one record per
//! line, name and value separated by whitespace (a tab when written):
//!
//! ```text
//! Beta            0.1:10:log
//! Gamma           0.01:1:log
//! MaxIterations   50:200:lin
//! SvmC            0.1:100:log
//! SvmGamma        0.01:10:log
//! SvmChannels     1:1:lin
//! ObjectCount     1:12          (optional)
//! Duration        0.25:3.5      (optional)
//! Weight          1:1:lin       (one block per channel)
//! ReducedDim      1:1
//! Dist            l1,l2
//! ```
//!
//! The scale suffix is optional and defaults to linear. Blank lines and lines
//! starting with `#` are ignored.

use core::fmt;
use core::str::FromStr;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::distance::DistanceFunction;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::types::Scale;

/// Inclusive bounds of one scalar parameter plus its scale.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScalarRange<T> {
    /// Lower bound (inclusive).
    pub min: T,
    /// Upper bound (inclusive).
    pub max: T,
    /// Linear or logarithmic spread.
    pub scale: Scale,
}

impl<T: Copy + PartialOrd + Into<f64>> ScalarRange<T> {
    /// A linear range.
    #[must_use]
    pub fn new(min: T, max: T) -> Self {
        Self::with_scale(min, max, Scale::Linear)
    }

    /// A logarithmic range.
    #[must_use]
    pub fn log(min: T, max: T) -> Self {
        Self::with_scale(min, max, Scale::Log)
    }

    /// A range with an explicit scale.
    #[must_use]
    pub fn with_scale(min: T, max: T, scale: Scale) -> Self {
        Self { min, max, scale }
    }

    /// A range holding exactly one value.
    #[must_use]
    pub fn fixed(value: T) -> Self {
        Self::new(value, value)
    }

    /// Whether `value` lies within the inclusive bounds.
    #[must_use]
    pub fn contains(&self, value: T) -> bool {
        self.min <= value && value <= self.max
    }

    /// Whether the range admits only a single value.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.min >= self.max
    }

    /// Check `min <= max`, finiteness and positivity on log scale.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBounds` or `Error::InvalidLogBounds`.
    pub fn validate(&self, name: &str) -> Result<()> {
        let (min, max): (f64, f64) = (self.min.into(), self.max.into());
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(Error::InvalidBounds {
                name: name.to_owned(),
                min,
                max,
            });
        }
        if self.scale == Scale::Log && min <= 0.0 {
            return Err(Error::InvalidLogBounds {
                name: name.to_owned(),
            });
        }
        Ok(())
    }
}

/// Per-channel block of a [`ParameterRange`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelRange {
    /// Bounds of the channel's weight in the solver's edge-weight combination.
    pub weight: ScalarRange<f64>,
    /// Bounds of the number of principal components kept.
    pub reduced_dim: ScalarRange<u32>,
    /// Distance functions a generator may choose from, in declaration order.
    pub distance_functions: Vec<DistanceFunction>,
}

impl ChannelRange {
    /// A channel block.
    #[must_use]
    pub fn new(
        weight: ScalarRange<f64>,
        reduced_dim: ScalarRange<u32>,
        distance_functions: Vec<DistanceFunction>,
    ) -> Self {
        Self {
            weight,
            reduced_dim,
            distance_functions,
        }
    }
}

/// Observed bounds of the derived outputs every sample produces.
///
/// Bounds only ever widen.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObservedBounds {
    /// Smallest and largest object count seen so far.
    pub object_count: Option<(u64, u64)>,
    /// Shortest and longest sample duration seen so far, in seconds.
    pub duration: Option<(f64, f64)>,
}

impl ObservedBounds {
    /// Widen the object-count bounds to include `count`.
    pub fn observe_object_count(&mut self, count: u64) {
        self.object_count = Some(match self.object_count {
            Some((lo, hi)) => (lo.min(count), hi.max(count)),
            None => (count, count),
        });
    }

    /// Widen the duration bounds to include `seconds`.
    pub fn observe_duration(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        self.duration = Some(match self.duration {
            Some((lo, hi)) => (lo.min(seconds), hi.max(seconds)),
            None => (seconds, seconds),
        });
    }
}

/// Bounds of every input parameter of one sampling run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParameterRange {
    /// Edge-weight sensitivity of the diffusion solver.
    pub beta: ScalarRange<f64>,
    /// Weight of the prior probabilities in the diffusion solver.
    pub gamma: ScalarRange<f64>,
    /// Iteration cap of the diffusion solver's linear solve.
    pub max_iterations: ScalarRange<u32>,
    /// SVM regularisation constant.
    pub svm_c: ScalarRange<f64>,
    /// SVM RBF kernel width.
    pub svm_gamma: ScalarRange<f64>,
    /// Number of image components the SVM uses as features.
    pub svm_channels: ScalarRange<u32>,
    /// Per-channel blocks, in image channel order.
    pub channels: Vec<ChannelRange>,
    /// Observed output bounds.
    pub observed: ObservedBounds,
}

const GLOBAL_NAMES: [&str; 6] = [
    "Beta",
    "Gamma",
    "MaxIterations",
    "SvmC",
    "SvmGamma",
    "SvmChannels",
];

impl ParameterRange {
    /// Number of declared input channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Resolve a channel's distance-function index.
    #[must_use]
    pub fn distance_function(&self, channel: usize, index: usize) -> Option<DistanceFunction> {
        self.channels
            .get(channel)?
            .distance_functions
            .get(index)
            .copied()
    }

    /// Check every bound and the channel blocks.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBounds` / `Error::InvalidLogBounds` for bad bounds,
    /// `Error::NoChannels` without channel blocks, `Error::NoDistanceFunctions`
    /// for a channel without distance functions.
    pub fn validate(&self) -> Result<()> {
        self.beta.validate("Beta")?;
        self.gamma.validate("Gamma")?;
        self.max_iterations.validate("MaxIterations")?;
        self.svm_c.validate("SvmC")?;
        self.svm_gamma.validate("SvmGamma")?;
        self.svm_channels.validate("SvmChannels")?;
        if self.svm_channels.min == 0 {
            return Err(Error::InvalidBounds {
                name: "SvmChannels".to_owned(),
                min: 0.0,
                max: f64::from(self.svm_channels.max),
            });
        }
        if self.channels.is_empty() {
            return Err(Error::NoChannels);
        }
        for (i, channel) in self.channels.iter().enumerate() {
            channel.weight.validate(&format!("Weight[{i}]"))?;
            channel.reduced_dim.validate(&format!("ReducedDim[{i}]"))?;
            if channel.reduced_dim.min == 0 {
                return Err(Error::InvalidBounds {
                    name: format!("ReducedDim[{i}]"),
                    min: 0.0,
                    max: f64::from(channel.reduced_dim.max),
                });
            }
            if channel.distance_functions.is_empty() {
                return Err(Error::NoDistanceFunctions { channel: i });
            }
        }
        Ok(())
    }

    /// Parse the text format, resolving distance functions through `registry`.
    ///
    /// # Errors
    ///
    /// Returns `Error::RangeFormat` (with the 1-based line number) for wrong or
    /// missing records, malformed bounds and unknown distance functions, and the
    /// [`validate`](Self::validate) errors for well-formed but invalid bounds.
    pub fn parse(text: &str, registry: &Registry) -> Result<Self> {
        let records = records(text);
        let end_line = text.lines().count() + 1;
        let mut it = records.iter();

        let beta = expect_next(&mut it, GLOBAL_NAMES[0], end_line)?.bounds()?;
        let gamma = expect_next(&mut it, GLOBAL_NAMES[1], end_line)?.bounds()?;
        let max_iterations = expect_next(&mut it, GLOBAL_NAMES[2], end_line)?.bounds()?;
        let svm_c = expect_next(&mut it, GLOBAL_NAMES[3], end_line)?.bounds()?;
        let svm_gamma = expect_next(&mut it, GLOBAL_NAMES[4], end_line)?.bounds()?;
        let svm_channels_record = expect_next(&mut it, GLOBAL_NAMES[5], end_line)?;
        let svm_channels: ScalarRange<u32> = svm_channels_record.bounds()?;
        if svm_channels.min == 0 {
            return Err(svm_channels_record.error("SvmChannels must be at least 1".to_owned()));
        }

        let mut range = Self {
            beta,
            gamma,
            max_iterations,
            svm_c,
            svm_gamma,
            svm_channels,
            channels: Vec::new(),
            observed: ObservedBounds::default(),
        };

        while let Some(record) = it.next() {
            match record.name {
                "ObjectCount" if range.channels.is_empty() => {
                    let bounds: ScalarRange<u64> = record.raw_bounds()?;
                    range.observed.object_count = Some((bounds.min, bounds.max));
                }
                "Duration" if range.channels.is_empty() => {
                    let bounds: ScalarRange<f64> = record.raw_bounds()?;
                    range.observed.duration = Some((bounds.min, bounds.max));
                }
                "Weight" => {
                    let weight = record.bounds()?;
                    let reduced_dim = expect_next(&mut it, "ReducedDim", end_line)?.bounds()?;
                    let distance_functions =
                        expect_next(&mut it, "Dist", end_line)?.distance_functions(registry)?;
                    range.channels.push(ChannelRange {
                        weight,
                        reduced_dim,
                        distance_functions,
                    });
                }
                other => return Err(record.error(format!("unexpected record '{other}'"))),
            }
        }

        range.validate()?;
        Ok(range)
    }

    /// Read and parse a range file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file cannot be read, otherwise the
    /// [`parse`](Self::parse) errors.
    pub fn from_file(path: impl AsRef<Path>, registry: &Registry) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, registry)
    }

    /// Render the text format.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Write the text format to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file cannot be written.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<()> {
        crate::storage::write_atomic(path.as_ref(), &self.to_text())
    }
}

impl fmt::Display for ParameterRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_scaled(f, "Beta", &self.beta)?;
        write_scaled(f, "Gamma", &self.gamma)?;
        write_scaled(f, "MaxIterations", &self.max_iterations)?;
        write_scaled(f, "SvmC", &self.svm_c)?;
        write_scaled(f, "SvmGamma", &self.svm_gamma)?;
        write_scaled(f, "SvmChannels", &self.svm_channels)?;
        if let Some((lo, hi)) = self.observed.object_count {
            writeln!(f, "ObjectCount\t{lo}:{hi}")?;
        }
        if let Some((lo, hi)) = self.observed.duration {
            writeln!(f, "Duration\t{lo}:{hi}")?;
        }
        for channel in &self.channels {
            write_scaled(f, "Weight", &channel.weight)?;
            writeln!(
                f,
                "ReducedDim\t{}:{}",
                channel.reduced_dim.min, channel.reduced_dim.max
            )?;
            let mut names = String::new();
            for (i, function) in channel.distance_functions.iter().enumerate() {
                if i > 0 {
                    names.push(',');
                }
                names.push_str(function.short_name());
            }
            writeln!(f, "Dist\t{names}")?;
        }
        Ok(())
    }
}

fn write_scaled<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    range: &ScalarRange<T>,
) -> fmt::Result {
    writeln!(f, "{name}\t{}:{}:{}", range.min, range.max, range.scale.suffix())
}

struct Record<'a> {
    line: usize,
    name: &'a str,
    value: &'a str,
}

impl Record<'_> {
    fn error(&self, reason: String) -> Error {
        Error::RangeFormat {
            line: self.line,
            reason,
        }
    }

    fn raw_bounds<T: FromStr + Copy>(&self) -> Result<ScalarRange<T>> {
        let mut parts = self.value.split(':').map(str::trim);
        let mut number = |what: &str| -> Result<T> {
            let token = parts
                .next()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| self.error(format!("missing {what} bound for '{}'", self.name)))?;
            token.parse().map_err(|_| {
                self.error(format!("malformed {what} bound '{token}' for '{}'", self.name))
            })
        };
        let min = number("lower")?;
        let max = number("upper")?;
        let scale = match parts.next() {
            None | Some("" | "lin") => Scale::Linear,
            Some("log") => Scale::Log,
            Some(other) => return Err(self.error(format!("unknown scale '{other}'"))),
        };
        if parts.next().is_some() {
            return Err(self.error(format!("too many fields for '{}'", self.name)));
        }
        Ok(ScalarRange { min, max, scale })
    }

    fn bounds<T: FromStr + Copy + PartialOrd + Into<f64>>(&self) -> Result<ScalarRange<T>> {
        self.raw_bounds()
    }

    fn distance_functions(&self, registry: &Registry) -> Result<Vec<DistanceFunction>> {
        let mut functions = Vec::new();
        for name in self.value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let function = registry
                .distance(name)
                .map_err(|_| self.error(format!("unknown distance function '{name}'")))?;
            functions.push(function);
        }
        if functions.is_empty() {
            return Err(self.error("no distance functions listed".to_owned()));
        }
        Ok(functions)
    }
}

fn records(text: &str) -> Vec<Record<'_>> {
    text.lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (name, value) = line
                .split_once(char::is_whitespace)
                .map_or((line, ""), |(n, v)| (n, v.trim()));
            Some(Record {
                line: i + 1,
                name,
                value,
            })
        })
        .collect()
}

fn expect_next<'r, 'a, I>(it: &mut I, name: &str, end_line: usize) -> Result<&'r Record<'a>>
where
    I: Iterator<Item = &'r Record<'a>>,
    'a: 'r,
{
    match it.next() {
        Some(record) if record.name == name => Ok(record),
        Some(record) => Err(record.error(format!("expected '{name}', found '{}'", record.name))),
        None => Err(Error::RangeFormat {
            line: end_line,
            reason: format!("missing '{name}' record"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Beta\t0.1:10:log\nGamma\t0.01:1:log\nMaxIterations\t50:200\n\
        SvmC\t0.1:100:log\nSvmGamma\t0.01:10:log\nSvmChannels\t1:1\n\
        Weight\t1:1\nReducedDim\t1:1\nDist\tl1,l2\n";

    #[test]
    fn parses_single_channel_range() {
        let range = ParameterRange::parse(SAMPLE, &Registry::standard()).unwrap();
        assert_eq!(range.beta, ScalarRange::log(0.1, 10.0));
        assert_eq!(range.max_iterations, ScalarRange::new(50, 200));
        assert_eq!(range.channel_count(), 1);
        assert_eq!(
            range.channels[0].distance_functions,
            [DistanceFunction::L1, DistanceFunction::L2]
        );
        assert_eq!(range.observed, ObservedBounds::default());
    }

    #[test]
    fn text_round_trips() {
        let registry = Registry::standard();
        let mut range = ParameterRange::parse(SAMPLE, &registry).unwrap();
        range.observed.observe_object_count(3);
        range.observed.observe_duration(0.125);
        let again = ParameterRange::parse(&range.to_text(), &registry).unwrap();
        assert_eq!(range, again);
    }

    #[test]
    fn reports_line_of_wrong_record() {
        let text = SAMPLE.replace("SvmC", "SvmCost");
        let err = ParameterRange::parse(&text, &Registry::standard()).unwrap_err();
        assert!(matches!(err, Error::RangeFormat { line: 4, .. }), "{err}");
    }

    #[test]
    fn unknown_distance_is_a_format_error() {
        let text = SAMPLE.replace("l1,l2", "l1,euclid");
        let err = ParameterRange::parse(&text, &Registry::standard()).unwrap_err();
        assert!(matches!(err, Error::RangeFormat { line: 9, .. }), "{err}");
    }

    #[test]
    fn inverted_bounds_fail_validation() {
        let text = SAMPLE.replace("0.1:10:log", "10:0.1");
        let err = ParameterRange::parse(&text, &Registry::standard()).unwrap_err();
        assert!(matches!(err, Error::InvalidBounds { .. }), "{err}");
    }

    #[test]
    fn log_scale_requires_positive_min() {
        let text = SAMPLE.replace("0.01:1:log", "0:1:log");
        let err = ParameterRange::parse(&text, &Registry::standard()).unwrap_err();
        assert!(matches!(err, Error::InvalidLogBounds { .. }), "{err}");
    }

    #[test]
    fn channels_are_required() {
        let text: String = SAMPLE.lines().take(6).map(|l| format!("{l}\n")).collect();
        let err = ParameterRange::parse(&text, &Registry::standard()).unwrap_err();
        assert!(matches!(err, Error::NoChannels), "{err}");
    }

    #[test]
    fn truncated_channel_block() {
        let text: String = SAMPLE.lines().take(8).map(|l| format!("{l}\n")).collect();
        let err = ParameterRange::parse(&text, &Registry::standard()).unwrap_err();
        assert!(matches!(err, Error::RangeFormat { line: 9, .. }), "{err}");
    }

    #[test]
    fn observed_bounds_only_widen() {
        let mut bounds = ObservedBounds::default();
        bounds.observe_object_count(5);
        bounds.observe_object_count(2);
        bounds.observe_object_count(4);
        assert_eq!(bounds.object_count, Some((2, 5)));
        bounds.observe_duration(1.0);
        bounds.observe_duration(f64::NAN);
        assert_eq!(bounds.duration, Some((1.0, 1.0)));
    }
}
