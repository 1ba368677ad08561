//! Per-file results of upload and delete batches.

use crate::{Result, SecretMatchError};
use std::path::PathBuf;

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// A new secret was created
    Created,
    /// An existing secret's payload was replaced
    Updated,
    /// The secret was scheduled for deletion
    Deleted,
    /// The secret did not exist, nothing to delete
    AlreadyAbsent,
}

/// Outcome for a single file of a batch.
#[derive(Debug)]
pub struct FileOutcome {
    /// Local file as passed by the caller
    pub path: PathBuf,
    /// Remote key, when the file could be mapped to one
    pub remote_key: Option<String>,
    /// Action taken or the error that stopped it
    pub result: Result<FileAction>,
}

/// Results of an upload or delete batch, in caller order.
///
/// Failures of individual files do not stop the batch; authentication
/// failures and cancellation abort it and are returned as errors instead of
/// a report.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// One entry per input file
    pub outcomes: Vec<FileOutcome>,
}

impl SyncReport {
    /// Whether every file succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Files that failed, with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &SecretMatchError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.path, e)))
    }

    /// Number of files that ended with `action`.
    pub fn count(&self, action: FileAction) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(a) if a == action))
            .count()
    }

    /// Turns the first failure into an error, for fail-fast callers.
    pub fn into_result(mut self) -> Result<Self> {
        let Some(index) = self.outcomes.iter().position(|o| o.result.is_err()) else {
            return Ok(self);
        };
        match self.outcomes.swap_remove(index).result {
            Err(e) => Err(e),
            Ok(_) => Ok(self),
        }
    }
}
