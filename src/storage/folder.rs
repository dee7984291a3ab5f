//! On-disk result folders and summary files.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use ndarray_npy::write_npy;
use parking_lot::Mutex;

use super::{ResultStore, SummaryFiles, write_atomic};
use crate::error::{Error, Result};
use crate::result::{
    DerivedOutput, SamplingResults, SingleResult, characteristics_header, characteristics_row,
};

/// Name of the label volume inside a sample folder.
pub const LABEL_FILE: &str = "label.npy";

/// A store writing into one output directory:
///
/// ```text
/// <dir>/sampling.range
/// <dir>/parameters.txt
/// <dir>/characteristics.txt
/// <dir>/sample<ID>/label.npy
/// <dir>/sample<ID>/prob<L>.npy     (when probabilities are kept)
/// ```
///
/// A sample folder is written under a hidden temporary name and renamed when
/// complete. An existing `sample<ID>` folder is never overwritten.
pub struct FolderStore {
    dir: PathBuf,
    files: SummaryFiles,
    columns: Mutex<Vec<DerivedOutput>>,
    /// Serialise in-process appends so we only hold the file lock briefly.
    write_lock: Mutex<()>,
}

impl FolderStore {
    /// A store rooted at `dir`; the directory is created when the run begins.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            files: SummaryFiles::default(),
            columns: Mutex::new(DerivedOutput::BASIC.to_vec()),
            write_lock: Mutex::new(()),
        }
    }

    /// Use other summary file names.
    #[must_use]
    pub fn files(mut self, files: SummaryFiles) -> Self {
        self.files = files;
        self
    }

    /// The output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Summary file names in use.
    #[must_use]
    pub fn summary_files(&self) -> &SummaryFiles {
        &self.files
    }

    /// Folder of sample `id`.
    #[must_use]
    pub fn sample_dir(&self, id: u64) -> PathBuf {
        self.dir.join(format!("sample{id}"))
    }

    fn append_line(&self, name: &str, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(name))
            .map_err(|e| Error::Storage(e.to_string()))?;

        file.lock_exclusive()
            .map_err(|e| Error::Storage(e.to_string()))?;

        write!(file, "{line}").map_err(|e| Error::Storage(e.to_string()))?;
        file.flush().map_err(|e| Error::Storage(e.to_string()))?;

        file.unlock().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(())
    }

    fn write_volumes(
        &self,
        folder: &Path,
        result: &SingleResult,
        store_probabilities: bool,
    ) -> Result<()> {
        let labels = result.labels.as_ref().ok_or(Error::MissingDetails(result.id))?;
        write_npy(folder.join(LABEL_FILE), labels).map_err(|e| Error::Storage(e.to_string()))?;
        if store_probabilities {
            if let Some(probabilities) = &result.probabilities {
                for (label, volume) in probabilities.iter().enumerate() {
                    write_npy(folder.join(format!("prob{label}.npy")), volume)
                        .map_err(|e| Error::Storage(e.to_string()))?;
                }
            }
        }
        Ok(())
    }
}

impl ResultStore for FolderStore {
    fn begin(&self, results: &SamplingResults, columns: &[DerivedOutput]) -> Result<()> {
        let _guard = self.write_lock.lock();
        std::fs::create_dir_all(&self.dir)?;
        *self.columns.lock() = columns.to_vec();
        write_atomic(&self.dir.join(&self.files.range), &results.range_text())?;
        write_atomic(&self.dir.join(&self.files.parameters), "")?;
        write_atomic(
            &self.dir.join(&self.files.characteristics),
            &characteristics_header(columns),
        )
    }

    fn write_sample(&self, result: &SingleResult, store_probabilities: bool) -> Result<()> {
        let target = self.sample_dir(result.id);
        if target.exists() {
            return Err(Error::OutputExists(target));
        }
        let staging = self.dir.join(format!(".sample{}.tmp", result.id));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;

        if let Err(e) = self.write_volumes(&staging, result, store_probabilities) {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(e);
        }
        if target.exists() {
            let _ = std::fs::remove_dir_all(&staging);
            return Err(Error::OutputExists(target));
        }
        std::fs::rename(&staging, &target)?;
        Ok(())
    }

    fn append(&self, results: &SamplingResults, result: &SingleResult) -> Result<()> {
        let descriptor = result.parameters.to_descriptor(results.range())?;
        let row = characteristics_row(result, &self.columns.lock());

        let _guard = self.write_lock.lock();
        self.append_line(&self.files.parameters, &format!("{descriptor}\n"))?;
        self.append_line(&self.files.characteristics, &row)?;
        write_atomic(&self.dir.join(&self.files.range), &results.range_text())
    }
}
