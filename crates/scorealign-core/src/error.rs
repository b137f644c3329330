//! Error and diagnostic types for alignment data processing.

use serde::Serialize;
use thiserror::Error;

/// Diagnostic codes for recoverable input problems.
///
/// These never abort a run. They are collected while parsing the aligner's
/// correspondence table and the score note attributes so a caller can report
/// how much input was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCode {
    /// W001: Correspondence row has fewer than 10 columns
    ShortRow,
    /// W002: Correspondence row has a field that does not parse
    MalformedRow,
    /// W003: Score note attribute is missing `id`, `tstamp` or `midiPitch`
    MalformedAttribute,
    /// W004: Aligned note could not be reconciled within the threshold
    MatchFailure,
}

impl WarningCode {
    /// Returns the warning code string (e.g., "W001").
    pub fn code(&self) -> &'static str {
        match self {
            WarningCode::ShortRow => "W001",
            WarningCode::MalformedRow => "W002",
            WarningCode::MalformedAttribute => "W003",
            WarningCode::MatchFailure => "W004",
        }
    }
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A recoverable input problem with code, message, and optional location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputWarning {
    /// The warning code.
    pub code: WarningCode,
    /// Human-readable message.
    pub message: String,
    /// Where the problem was found (e.g., "line 14" or "attrs\[3\]").
    pub location: Option<String>,
}

impl InputWarning {
    /// Creates a new warning.
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: None,
        }
    }

    /// Creates a new warning with a location.
    pub fn at(code: WarningCode, message: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

impl std::fmt::Display for InputWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref location) = self.location {
            write!(f, "{}: {} (at {})", self.code, self.message, location)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Two reconciliation implementations disagreed.
    #[error(
        "reconciliation outputs diverge at record {index} (left has {left_len}, right has {right_len}): left={left} right={right}"
    )]
    VerificationMismatch {
        index: usize,
        left: String,
        right: String,
        left_len: usize,
        right_len: usize,
    },

    /// Every candidate expansion failed to align.
    #[error("all {} expansion(s) failed: {}", .failures.len(), format_failures(.failures))]
    AllExpansionsFailed { failures: Vec<ExpansionFailure> },

    /// No expansions were supplied to the selection policy.
    #[error("no candidate expansions supplied")]
    NoExpansions,

    /// A MAPS observation violates the xml_id/velocity cardinality rule.
    #[error("invalid observation: {0}")]
    InvalidObservation(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One expansion attempt that raised instead of producing observations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpansionFailure {
    /// The expansion identifier.
    pub expansion: String,
    /// Error code of the underlying failure, if it came from a backend.
    pub code: Option<&'static str>,
    /// Rendered error message.
    pub message: String,
}

fn format_failures(failures: &[ExpansionFailure]) -> String {
    failures
        .iter()
        .map(|f| match f.code {
            Some(code) => format!("{} [{}] {}", f.expansion, code, f.message),
            None => format!("{} {}", f.expansion, f.message),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Common trait for backend errors.
///
/// Implemented by the aligner and score renderer error types so that the
/// pipeline can report failures with a stable code regardless of which
/// external tool broke.
pub trait BackendError: std::error::Error {
    /// Stable error code, e.g. "SMAT_003".
    fn code(&self) -> &'static str;

    /// Human-readable message.
    fn message(&self) -> String {
        self.to_string()
    }

    /// Error category, e.g. "smat" or "verovio".
    fn category(&self) -> &'static str;
}

/// A type-erased backend failure carrying its code and category.
#[derive(Debug)]
pub struct PipelineError {
    /// The error code (e.g., "SMAT_001", "VEROVIO_002").
    pub code: &'static str,
    /// The human-readable error message.
    pub message: String,
    /// The error category (e.g., "smat", "verovio").
    pub category: &'static str,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PipelineError {
    /// Create a `PipelineError` from any `BackendError` implementor.
    pub fn from_backend<E: BackendError + Send + Sync + 'static>(err: E) -> Self {
        Self {
            code: err.code(),
            message: err.message(),
            category: err.category(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a `PipelineError` with explicit values.
    pub fn new(code: &'static str, message: impl Into<String>, category: &'static str) -> Self {
        Self {
            code,
            message: message.into(),
            category,
            source: None,
        }
    }

    /// Converts this failure into an [`ExpansionFailure`] record.
    pub fn into_expansion_failure(self, expansion: impl Into<String>) -> ExpansionFailure {
        ExpansionFailure {
            expansion: expansion.into(),
            code: Some(self.code),
            message: self.message,
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
