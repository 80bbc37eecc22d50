use std::{io, path::PathBuf};

use thiserror::Error;

/// Failure kinds of the detection pipeline.
///
/// None of these are fatal to the polling loop. Each one maps to a fixed
/// reaction: no data this tick, stop tracking the PID, or skip one token.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// A required file or view could not be opened or read in time.
    #[error("source unavailable: {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The process record vanished or no longer has the expected layout.
    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },

    /// A single malformed token inside an otherwise valid list.
    #[error("skipped malformed token {token:?}")]
    ParseSkipped { token: String },

    #[error("remediation for pid {pid} failed: {reason}")]
    RemediationFailed { pid: u32, reason: String },
}

impl MonitorError {
    pub fn source_unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn is_process_not_found(&self) -> bool {
        matches!(self, Self::ProcessNotFound { .. })
    }
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
