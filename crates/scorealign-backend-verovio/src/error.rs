//! Error types for the Verovio backend.

use scorealign_core::BackendError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for rendering and MEI inspection.
pub type RenderResult<T> = Result<T, RenderError>;

/// A problem reading MEI markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at byte {position}: {message}")]
pub struct MeiError {
    pub position: usize,
    pub message: String,
}

/// Errors that can occur while rendering or inspecting a score.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Verovio executable not found.
    #[error("Verovio executable not found. Ensure verovio is installed and in PATH, or set VEROVIO_PATH environment variable")]
    VerovioNotFound,

    /// Failed to spawn Verovio.
    #[error("failed to spawn verovio: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Verovio did not finish in time.
    #[error("verovio timed out after {timeout_secs} seconds rendering {resource}")]
    Timeout { resource: String, timeout_secs: u64 },

    /// The score could not be rendered.
    #[error("failed to render {resource}: {detail}")]
    RenderFailed { resource: String, detail: String },

    /// The rendered timemap is not valid JSON.
    #[error("invalid timemap for {resource}: {source}")]
    TimemapParse {
        resource: String,
        #[source]
        source: serde_json::Error,
    },

    /// The MEI document is not well-formed.
    #[error("invalid MEI in {resource} {source}")]
    MeiParse {
        resource: String,
        #[source]
        source: MeiError,
    },

    /// The requested expansion is not defined in the score.
    #[error("expansion '{expansion}' is not defined in {resource}")]
    UnknownExpansion { resource: String, expansion: String },

    /// The score file does not exist.
    #[error("score not found: {path}")]
    ScoreNotFound { path: PathBuf },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Creates a new render failed error.
    pub fn render_failed(resource: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::RenderFailed {
            resource: resource.into(),
            detail: detail.into(),
        }
    }

    /// Wraps an MEI parse problem with the resource it came from.
    pub fn mei_parse(resource: impl Into<String>, source: MeiError) -> Self {
        Self::MeiParse {
            resource: resource.into(),
            source,
        }
    }

    /// The score resource this error refers to, if any.
    pub fn resource(&self) -> Option<&str> {
        match self {
            RenderError::Timeout { resource, .. }
            | RenderError::RenderFailed { resource, .. }
            | RenderError::TimemapParse { resource, .. }
            | RenderError::MeiParse { resource, .. }
            | RenderError::UnknownExpansion { resource, .. } => Some(resource),
            _ => None,
        }
    }
}

impl BackendError for RenderError {
    fn code(&self) -> &'static str {
        match self {
            RenderError::VerovioNotFound => "VEROVIO_001",
            RenderError::SpawnFailed(_) => "VEROVIO_002",
            RenderError::Timeout { .. } => "VEROVIO_003",
            RenderError::RenderFailed { .. } => "VEROVIO_004",
            RenderError::TimemapParse { .. } => "VEROVIO_005",
            RenderError::MeiParse { .. } => "VEROVIO_006",
            RenderError::UnknownExpansion { .. } => "VEROVIO_007",
            RenderError::ScoreNotFound { .. } => "VEROVIO_008",
            RenderError::Io(_) => "VEROVIO_009",
        }
    }

    fn category(&self) -> &'static str {
        "verovio"
    }
}
