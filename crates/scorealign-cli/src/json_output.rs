//! JSON output types for machine-readable CLI output.
//!
//! Every command that accepts `--json` prints a single [`CommandOutput`]
//! document to stdout.

use serde::{Deserialize, Serialize};

use scorealign_backend_smat::AlignError;
use scorealign_backend_verovio::RenderError;
use scorealign_core::{BackendError, CoreError, InputWarning, PipelineError};
use scorealign_rdf::ExportError;

use crate::pipeline::InvalidExpansionName;

/// Error codes for CLI operations.
///
/// These codes are stable and can be used for programmatic error handling.
/// Backend failures pass their own codes through (`SMAT_003`, ...).
pub mod error_codes {
    /// File could not be read
    pub const FILE_READ: &str = "CLI_001";
    /// File could not be written
    pub const FILE_WRITE: &str = "CLI_002";
    /// JSON parse error
    pub const JSON_PARSE: &str = "CLI_003";
    /// No candidate expansion produced a result
    pub const NO_RESULT: &str = "CLI_004";
    /// Invalid argument combination
    pub const INVALID_ARGS: &str = "CLI_005";
    /// Pipeline failure not attributable to a backend
    pub const PIPELINE: &str = "CLI_006";
}

/// A structured error in JSON output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonError {
    /// Stable error code (e.g., "CLI_001", "SMAT_003")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Source file path (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl JsonError {
    /// Creates a new error with code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            file: None,
        }
    }

    /// Converts a backend error, keeping its code.
    pub fn from_backend(err: &dyn BackendError) -> Self {
        Self::new(err.code(), err.message())
    }

    /// Converts a command failure, picking the code from the first
    /// recognised cause in its chain. The message keeps the full context.
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let mut json = err
            .chain()
            .find_map(classify)
            .unwrap_or_else(|| Self::new(error_codes::PIPELINE, String::new()));
        json.message = format!("{:#}", err);
        json
    }

    /// Sets the file path for this error.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

fn classify(cause: &(dyn std::error::Error + 'static)) -> Option<JsonError> {
    if let Some(e) = cause.downcast_ref::<CoreError>() {
        return match e {
            CoreError::AllExpansionsFailed { .. } | CoreError::NoExpansions => {
                Some(JsonError::new(error_codes::NO_RESULT, ""))
            }
            CoreError::JsonParse(_) | CoreError::InvalidObservation(_) => {
                Some(JsonError::new(error_codes::JSON_PARSE, ""))
            }
            CoreError::Io(_) => Some(JsonError::new(error_codes::FILE_READ, "")),
            CoreError::VerificationMismatch { .. } => None,
        };
    }
    if cause.is::<InvalidExpansionName>() {
        return Some(JsonError::new(error_codes::INVALID_ARGS, ""));
    }
    if let Some(e) = cause.downcast_ref::<PipelineError>() {
        return Some(JsonError::new(e.code, ""));
    }
    if let Some(e) = cause.downcast_ref::<AlignError>() {
        return Some(JsonError::from_backend(e));
    }
    if let Some(e) = cause.downcast_ref::<RenderError>() {
        return Some(JsonError::from_backend(e));
    }
    if let Some(e) = cause.downcast_ref::<ExportError>() {
        return Some(JsonError::from_backend(e));
    }
    if cause.is::<serde_json::Error>() {
        return Some(JsonError::new(error_codes::JSON_PARSE, ""));
    }
    if cause.is::<std::io::Error>() {
        return Some(JsonError::new(error_codes::FILE_READ, ""));
    }
    None
}

/// A structured warning in JSON output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JsonWarning {
    /// Stable warning code (e.g., "W001")
    pub code: String,
    /// Human-readable warning message
    pub message: String,
    /// Where the warning applies (line, record index, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl JsonWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl From<&InputWarning> for JsonWarning {
    fn from(warning: &InputWarning) -> Self {
        Self {
            code: warning.code.code().to_string(),
            message: warning.message.clone(),
            location: warning.location.clone(),
        }
    }
}

/// Envelope printed by every `--json` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput<T> {
    /// Whether the command succeeded
    pub success: bool,
    /// Errors encountered
    pub errors: Vec<JsonError>,
    /// Non-fatal diagnostics
    pub warnings: Vec<JsonWarning>,
    /// Command result (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T: Serialize> CommandOutput<T> {
    /// Creates a successful output.
    pub fn success(result: T, warnings: Vec<JsonWarning>) -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings,
            result: Some(result),
        }
    }

    /// Creates a failed output.
    pub fn failure(errors: Vec<JsonError>) -> Self {
        Self {
            success: false,
            errors,
            warnings: Vec::new(),
            result: None,
        }
    }

    /// Prints the document to stdout.
    pub fn print(&self) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(self)?);
        Ok(())
    }
}

/// Result for a single file in batch mode (either success or error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem<T> {
    /// Input file path
    pub input: String,
    /// Whether processing succeeded
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonError>,
}

impl<T> BatchItem<T> {
    pub fn success(input: String, result: T) -> Self {
        Self {
            input,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(input: String, error: JsonError) -> Self {
        Self {
            input,
            success: false,
            result: None,
            error: Some(error),
        }
    }
}

/// Summary statistics for batch mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total number of files processed
    pub total: usize,
    /// Number of files that succeeded
    pub succeeded: usize,
    /// Number of files that failed
    pub failed: usize,
}

impl BatchSummary {
    pub fn of<T>(items: &[BatchItem<T>]) -> Self {
        let total = items.len();
        let succeeded = items.iter().filter(|i| i.success).count();
        Self {
            total,
            succeeded,
            failed: total - succeeded,
        }
    }
}
