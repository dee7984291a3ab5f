//! Outcomes of samples and the run-level result collection.
//!
//! A [`SingleResult`] carries the label volume (and optionally the
//! probability volumes) only until it is persisted; afterwards the details are
//! discarded and only the scalar [`DerivedOutput`] values stay in memory.
//!
//! [`SamplingResults`] renders the three summary files of a run:
//!
//! | File (default name) | Content |
//! |---------------------|---------|
//! | `sampling.range` | `Sampler<TAB>name` followed by the parameter range text |
//! | `parameters.txt` | one parameter-set descriptor per line |
//! | `characteristics.txt` | tab-separated table: `id`, then one column per derived output |

use core::fmt;
use std::collections::BTreeMap;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::characteristics::LabelOverlap;
use crate::error::{Error, Result};
use crate::parameter_set::ParameterSet;
use crate::range::ParameterRange;
use crate::registry::Registry;
use crate::storage::SummaryFiles;
use crate::volume::{LabelVolume, ProbabilityVolumeSet};

/// A scalar output derived from one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DerivedOutput {
    /// Connected foreground objects in the label map.
    ObjectCount,
    /// Wall-clock seconds of the classify and solve stages.
    Duration,
    /// Overall Dice overlap with the ground truth.
    Dice,
    /// Overall Jaccard overlap with the ground truth.
    Jaccard,
    /// Overall volume similarity with the ground truth.
    VolumeSimilarity,
}

impl DerivedOutput {
    /// Every output, in column order.
    pub const ALL: [Self; 5] = [
        Self::ObjectCount,
        Self::Duration,
        Self::Dice,
        Self::Jaccard,
        Self::VolumeSimilarity,
    ];

    /// Outputs every sample produces.
    pub const BASIC: [Self; 2] = [Self::ObjectCount, Self::Duration];

    /// Column name in the characteristics file.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ObjectCount => "ObjectCount",
            Self::Duration => "Duration",
            Self::Dice => "Dice",
            Self::Jaccard => "Jaccard",
            Self::VolumeSimilarity => "VolumeSimilarity",
        }
    }

    /// Inverse of [`name`](Self::name).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.name() == name)
    }
}

impl fmt::Display for DerivedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The outcome of one parameter set.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SingleResult {
    /// ID of the originating parameter set.
    pub id: u64,
    /// The parameter set.
    pub parameters: ParameterSet,
    /// Derived scalar outputs.
    pub derived: BTreeMap<DerivedOutput, f64>,
    /// Per-label overlap with the ground truth, if one was given.
    pub label_overlaps: Vec<LabelOverlap>,
    /// Final label map, until the details are discarded.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub labels: Option<LabelVolume>,
    /// Final probabilities, if kept, until the details are discarded.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub probabilities: Option<ProbabilityVolumeSet>,
}

impl SingleResult {
    /// A fresh result for `parameters`.
    #[must_use]
    pub fn new(
        parameters: ParameterSet,
        labels: LabelVolume,
        probabilities: Option<ProbabilityVolumeSet>,
    ) -> Self {
        Self {
            id: parameters.id,
            parameters,
            derived: BTreeMap::new(),
            label_overlaps: Vec::new(),
            labels: Some(labels),
            probabilities,
        }
    }

    /// A result restored from summary files, without details.
    #[must_use]
    pub fn summary(parameters: ParameterSet) -> Self {
        Self {
            id: parameters.id,
            parameters,
            derived: BTreeMap::new(),
            label_overlaps: Vec::new(),
            labels: None,
            probabilities: None,
        }
    }

    /// Record a derived value.
    pub fn set_derived(&mut self, output: DerivedOutput, value: f64) {
        self.derived.insert(output, value);
    }

    /// A derived value, if recorded.
    #[must_use]
    pub fn derived(&self, output: DerivedOutput) -> Option<f64> {
        self.derived.get(&output).copied()
    }

    /// Connected foreground objects.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn object_count(&self) -> Option<u64> {
        self.derived(DerivedOutput::ObjectCount)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round() as u64)
    }

    /// Seconds spent in the classify and solve stages.
    #[must_use]
    pub fn duration(&self) -> Option<f64> {
        self.derived(DerivedOutput::Duration)
    }

    /// Whether the volumes are still held.
    #[must_use]
    pub fn has_details(&self) -> bool {
        self.labels.is_some() || self.probabilities.is_some()
    }

    /// Free the label and probability volumes; scalar outputs stay.
    pub fn discard_details(&mut self) {
        self.labels = None;
        self.probabilities = None;
    }
}

/// Every accepted result of one run, with the range and generator name.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SamplingResults {
    range: ParameterRange,
    generator_name: String,
    results: Vec<SingleResult>,
}

const SAMPLER_RECORD: &str = "Sampler";
const MISSING_VALUE: &str = "nan";

impl SamplingResults {
    /// An empty collection.
    #[must_use]
    pub fn new(range: ParameterRange, generator_name: impl Into<String>) -> Self {
        Self {
            range,
            generator_name: generator_name.into(),
            results: Vec::new(),
        }
    }

    /// The range, including the observed output bounds.
    #[must_use]
    pub fn range(&self) -> &ParameterRange {
        &self.range
    }

    /// Mutable access to the range.
    pub fn range_mut(&mut self) -> &mut ParameterRange {
        &mut self.range
    }

    /// Name of the generator that produced the parameter sets.
    #[must_use]
    pub fn generator_name(&self) -> &str {
        &self.generator_name
    }

    /// Results in the order they were accepted.
    #[must_use]
    pub fn results(&self) -> &[SingleResult] {
        &self.results
    }

    /// The result with `id`.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&SingleResult> {
        self.results.iter().find(|r| r.id == id)
    }

    /// Number of accepted results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no result was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// IDs in acceptance order.
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.results.iter().map(|r| r.id)
    }

    /// Accept a result: discard its details and widen the observed bounds.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicateResult` if a result with the same ID exists.
    pub fn add_result(&mut self, mut result: SingleResult) -> Result<()> {
        if self.get(result.id).is_some() {
            return Err(Error::DuplicateResult(result.id));
        }
        result.discard_details();
        if let Some(count) = result.object_count() {
            self.range.observed.observe_object_count(count);
        }
        if let Some(seconds) = result.duration() {
            self.range.observed.observe_duration(seconds);
        }
        self.results.push(result);
        Ok(())
    }

    /// Derived outputs present in any result, basic outputs always included.
    #[must_use]
    pub fn columns(&self) -> Vec<DerivedOutput> {
        DerivedOutput::ALL
            .into_iter()
            .filter(|o| {
                DerivedOutput::BASIC.contains(o)
                    || self.results.iter().any(|r| r.derived.contains_key(o))
            })
            .collect()
    }

    /// Content of the range summary file.
    #[must_use]
    pub fn range_text(&self) -> String {
        format!(
            "{SAMPLER_RECORD}\t{}\n{}",
            self.generator_name,
            self.range.to_text()
        )
    }

    /// Content of the parameters summary file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Descriptor` if a parameter set does not fit the range.
    pub fn parameters_text(&self) -> Result<String> {
        let mut text = String::new();
        for result in &self.results {
            text.push_str(&result.parameters.to_descriptor(&self.range)?);
            text.push('\n');
        }
        Ok(text)
    }

    /// Content of the characteristics summary file.
    #[must_use]
    pub fn characteristics_text(&self) -> String {
        let columns = self.columns();
        let mut text = characteristics_header(&columns);
        for result in &self.results {
            text.push_str(&characteristics_row(result, &columns));
        }
        text
    }

    /// Write the three summary files into `dir`, replacing existing ones.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` on I/O failures and `Error::Descriptor` if a
    /// parameter set does not fit the range.
    pub fn save(&self, dir: impl AsRef<Path>, files: &SummaryFiles) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        crate::storage::write_atomic(&dir.join(&files.range), &self.range_text())?;
        crate::storage::write_atomic(&dir.join(&files.parameters), &self.parameters_text()?)?;
        crate::storage::write_atomic(
            &dir.join(&files.characteristics),
            &self.characteristics_text(),
        )
    }

    /// Read the summary files of a run back.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if a file cannot be read, `Error::RangeFormat`
    /// for a malformed range file, `Error::Descriptor` for a malformed
    /// parameter line and `Error::DuplicateResult` for repeated IDs.
    pub fn load(dir: impl AsRef<Path>, files: &SummaryFiles, registry: &Registry) -> Result<Self> {
        let dir = dir.as_ref();
        let range_text = std::fs::read_to_string(dir.join(&files.range))?;
        let (generator_name, range) = parse_range_file(&range_text, registry)?;

        let mut results = Self::new(range, generator_name);
        let parameters = std::fs::read_to_string(dir.join(&files.parameters))?;
        for line in parameters.lines().filter(|l| !l.trim().is_empty()) {
            let set = ParameterSet::from_descriptor(line, &results.range)?;
            if results.get(set.id).is_some() {
                return Err(Error::DuplicateResult(set.id));
            }
            results.results.push(SingleResult::summary(set));
        }

        let characteristics_path = dir.join(&files.characteristics);
        if characteristics_path.exists() {
            let table = std::fs::read_to_string(characteristics_path)?;
            results.apply_characteristics(&table)?;
        }
        Ok(results)
    }

    fn apply_characteristics(&mut self, table: &str) -> Result<()> {
        let mut lines = table.lines().filter(|l| !l.trim().is_empty());
        let Some(header) = lines.next() else {
            return Ok(());
        };
        let columns: Vec<Option<DerivedOutput>> = header
            .split('\t')
            .skip(1)
            .map(DerivedOutput::from_name)
            .collect();
        for line in lines {
            let mut fields = line.split('\t');
            let id: u64 = fields
                .next()
                .and_then(|f| f.trim().parse().ok())
                .ok_or_else(|| Error::Storage(format!("malformed characteristics row '{line}'")))?;
            let Some(result) = self.results.iter_mut().find(|r| r.id == id) else {
                trace_warn!(id, "characteristics row without parameter set");
                continue;
            };
            for (column, field) in columns.iter().zip(fields) {
                let (Some(output), Ok(value)) = (column, field.trim().parse::<f64>()) else {
                    continue;
                };
                if !value.is_nan() {
                    result.set_derived(*output, value);
                }
            }
        }
        Ok(())
    }

    /// Save a JSON snapshot, written to a temp file and renamed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file cannot be written.
    #[cfg(feature = "serde")]
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| Error::Storage(e.to_string()))?;
        crate::storage::write_atomic(path.as_ref(), &json)
    }

    /// Load a JSON snapshot written by [`save_json`](Self::save_json).
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file cannot be read or parsed.
    #[cfg(feature = "serde")]
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::Storage(e.to_string()))
    }
}

/// Split a range summary file into the generator name and the range.
fn parse_range_file(text: &str, registry: &Registry) -> Result<(String, ParameterRange)> {
    let mut generator_name = None;
    let mut rest = String::with_capacity(text.len());
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if generator_name.is_none() && !trimmed.is_empty() && !trimmed.starts_with('#') {
            let Some(name) = trimmed.strip_prefix(SAMPLER_RECORD) else {
                return Err(Error::RangeFormat {
                    line: index + 1,
                    reason: format!("expected '{SAMPLER_RECORD}' record"),
                });
            };
            generator_name = Some(name.trim().to_owned());
            // keep line numbers of the range records
            rest.push_str("#\n");
            continue;
        }
        rest.push_str(line);
        rest.push('\n');
    }
    let generator_name = generator_name.ok_or(Error::RangeFormat {
        line: 1,
        reason: format!("missing '{SAMPLER_RECORD}' record"),
    })?;
    Ok((generator_name, ParameterRange::parse(&rest, registry)?))
}

/// Tab-separated header line of the characteristics table.
pub(crate) fn characteristics_header(columns: &[DerivedOutput]) -> String {
    let mut line = String::from("id");
    for column in columns {
        line.push('\t');
        line.push_str(column.name());
    }
    line.push('\n');
    line
}

/// One row of the characteristics table; missing values are written as `nan`.
pub(crate) fn characteristics_row(result: &SingleResult, columns: &[DerivedOutput]) -> String {
    let mut line = result.id.to_string();
    for column in columns {
        line.push('\t');
        match result.derived(*column) {
            Some(value) if !value.is_nan() => line.push_str(&value.to_string()),
            _ => line.push_str(MISSING_VALUE),
        }
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceFunction;
    use crate::parameter_set::ChannelParameters;
    use crate::range::{ChannelRange, ObservedBounds, ScalarRange};
    use crate::volume::Dimensions;

    fn range() -> ParameterRange {
        ParameterRange {
            beta: ScalarRange::log(0.1, 10.0),
            gamma: ScalarRange::log(0.01, 1.0),
            max_iterations: ScalarRange::new(50, 200),
            svm_c: ScalarRange::log(0.1, 100.0),
            svm_gamma: ScalarRange::log(0.01, 1.0),
            svm_channels: ScalarRange::new(1, 1),
            channels: vec![ChannelRange::new(
                ScalarRange::new(1.0, 1.0),
                ScalarRange::new(1, 1),
                vec![DistanceFunction::L1, DistanceFunction::L2],
            )],
            observed: ObservedBounds::default(),
        }
    }

    fn result(id: u64, objects: f64, seconds: f64) -> SingleResult {
        let set = ParameterSet {
            id,
            beta: 1.0,
            gamma: 0.1,
            max_iterations: 60,
            svm_c: 2.0,
            svm_gamma: 0.5,
            svm_channels: 1,
            channels: vec![ChannelParameters {
                weight: 1.0,
                distance_index: 1,
                reduced_dim: 1,
            }],
        };
        let mut result = SingleResult::new(set, Dimensions::new(1, 1, 1).filled(0), None);
        result.set_derived(DerivedOutput::ObjectCount, objects);
        result.set_derived(DerivedOutput::Duration, seconds);
        result
    }

    #[test]
    fn add_result_discards_details_and_widens_bounds() {
        let mut results = SamplingResults::new(range(), "Random");
        results.add_result(result(0, 2.0, 0.5)).unwrap();
        results.add_result(result(1, 5.0, 0.25)).unwrap();
        assert!(!results.results()[0].has_details());
        assert_eq!(results.range().observed.object_count, Some((2, 5)));
        assert_eq!(results.range().observed.duration, Some((0.25, 0.5)));
        assert!(matches!(
            results.add_result(result(1, 1.0, 1.0)),
            Err(Error::DuplicateResult(1))
        ));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn characteristics_table_layout() {
        let mut results = SamplingResults::new(range(), "Random");
        results.add_result(result(4, 3.0, 0.75)).unwrap();
        assert_eq!(
            results.characteristics_text(),
            "id\tObjectCount\tDuration\n4\t3\t0.75\n"
        );
    }

    #[test]
    fn range_file_keeps_generator_name() {
        let mut results = SamplingResults::new(range(), "Latin Hypercube");
        results.add_result(result(0, 1.0, 0.5)).unwrap();
        let (name, parsed) =
            parse_range_file(&results.range_text(), &Registry::standard()).unwrap();
        assert_eq!(name, "Latin Hypercube");
        assert_eq!(parsed.channels, results.range().channels);
        assert_eq!(parsed.observed, results.range().observed);
        assert!(parse_range_file("Beta\t1:2\n", &Registry::standard()).is_err());
    }

    #[test]
    fn output_names_round_trip() {
        for output in DerivedOutput::ALL {
            assert_eq!(DerivedOutput::from_name(output.name()), Some(output));
        }
        assert_eq!(DerivedOutput::from_name("Speed"), None);
    }
}
