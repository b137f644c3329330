//! Error types for the SMAT alignment backend.

use scorealign_core::BackendError;
use std::path::PathBuf;
use thiserror::Error;

/// Stage name reported when a stage exceeds its wall-clock limit.
pub const TIMEOUT_STAGE: &str = "timeout";

/// Result type for alignment operations.
pub type AlignResult<T> = Result<T, AlignError>;

/// Errors that can occur while aligning two MIDI files.
#[derive(Debug, Error)]
pub enum AlignError {
    /// A SMAT executable could not be located.
    #[error("SMAT tool '{tool}' not found. Put the SMAT binaries in PATH, or set SMAT_BIN_DIR")]
    ToolNotFound { tool: String },

    /// Failed to spawn a stage's process.
    #[error("failed to spawn stage {stage}: {source}")]
    SpawnFailed {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    /// A stage exited unsuccessfully or did not produce its output file.
    #[error("alignment stage {stage} failed: {detail}")]
    StageFailed { stage: String, detail: String },

    /// The alignment was cancelled while `stage` was running or pending.
    #[error("alignment cancelled during stage {stage}")]
    Cancelled { stage: String },

    /// An input MIDI file does not exist.
    #[error("input MIDI file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The final correspondence file could not be read.
    #[error("failed to read correspondence file {path}: {source}")]
    ReadCorrespFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error preparing the scratch directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AlignError {
    /// Creates a stage failure.
    pub fn stage_failed(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    /// Creates the failure reported when `stage` runs past `limit_secs`.
    pub fn timeout(stage: &str, limit_secs: u64) -> Self {
        Self::StageFailed {
            stage: TIMEOUT_STAGE.to_string(),
            detail: format!("{} exceeded {} seconds", stage, limit_secs),
        }
    }

    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            AlignError::ToolNotFound { tool } => Some(tool),
            AlignError::SpawnFailed { stage, .. }
            | AlignError::StageFailed { stage, .. }
            | AlignError::Cancelled { stage } => Some(stage),
            _ => None,
        }
    }

    /// Returns true if this is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AlignError::StageFailed { stage, .. } if stage == TIMEOUT_STAGE)
    }
}

impl BackendError for AlignError {
    fn code(&self) -> &'static str {
        match self {
            AlignError::ToolNotFound { .. } => "SMAT_001",
            AlignError::SpawnFailed { .. } => "SMAT_002",
            AlignError::StageFailed { .. } if self.is_timeout() => "SMAT_008",
            AlignError::StageFailed { .. } => "SMAT_003",
            AlignError::Cancelled { .. } => "SMAT_004",
            AlignError::InputNotFound { .. } => "SMAT_005",
            AlignError::ReadCorrespFailed { .. } => "SMAT_006",
            AlignError::Io(_) => "SMAT_007",
        }
    }

    fn category(&self) -> &'static str {
        "smat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AlignError::stage_failed("Fmt3xToHmm", "expected output canonical_hmm.txt was not produced");
        assert_eq!(
            err.to_string(),
            "alignment stage Fmt3xToHmm failed: expected output canonical_hmm.txt was not produced"
        );
        assert_eq!(err.stage(), Some("Fmt3xToHmm"));
        assert_eq!(err.code(), "SMAT_003");

        let err = AlignError::ToolNotFound {
            tool: "midi2pianoroll".to_string(),
        };
        assert!(err.to_string().contains("SMAT_BIN_DIR"));
    }

    #[test]
    fn test_timeout_is_a_stage_failure() {
        let err = AlignError::timeout("ScorePerfmMatcher", 300);
        assert!(err.is_timeout());
        assert_eq!(err.stage(), Some("timeout"));
        assert!(err.to_string().contains("ScorePerfmMatcher exceeded 300 seconds"));
        assert_eq!(err.code(), "SMAT_008");
        assert_eq!(err.category(), "smat");
    }
}
