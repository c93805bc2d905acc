//! Trial data persistence: one CSV row per trial, append mode, header
//! written only when the file is created.

use crate::error::{ExperimentError, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;
use visex_core::TrialRecord;

pub struct CsvLogger {
    path: PathBuf,
}

impl CsvLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one trial row, flushing before returning so an aborted
    /// session keeps everything recorded so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the row cannot be
    /// written.
    pub fn append(&self, record: &TrialRecord) -> Result<()> {
        let is_new = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| ExperimentError::FileSystem {
                path: self.path.clone(),
                operation: "open data file",
                source,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer
            .serialize(record)
            .map_err(|source| ExperimentError::DataWrite {
                path: self.path.clone(),
                source,
            })?;
        writer
            .flush()
            .map_err(|source| ExperimentError::FileSystem {
                path: self.path.clone(),
                operation: "flush data file",
                source,
            })?;

        debug!(block = record.block, trial = record.trial, "trial row written");
        Ok(())
    }
}
