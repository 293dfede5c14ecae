use regfin_import::RegistryError;
use regfin_storage::{ExportError, StorageError};
use thiserror::Error;

use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),
    #[error("Malformed file {name}: {reason}")]
    MalformedFile { name: String, reason: String },
    #[error("Reference registry unusable: {0}")]
    Registry(#[from] RegistryError),
    #[error("Repository unavailable: {0}")]
    RepositoryUnavailable(#[from] StorageError),
    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
    #[error("No data found in {candidates} candidate archives")]
    NoDataFound { candidates: usize },
}

impl PipelineError {
    pub fn malformed(name: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::MalformedFile {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Only an empty intake stops a run; everything else is skipped or
    /// reported.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::NoDataFound { .. })
    }
}
