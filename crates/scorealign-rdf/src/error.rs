//! Error types for linked-data export.

use scorealign_core::BackendError;
use thiserror::Error;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors that can occur while exporting RDF.
#[derive(Debug, Error)]
pub enum ExportError {
    /// A URI cannot be written as an IRI reference.
    #[error("invalid {role} URI '{uri}': {reason}")]
    InvalidUri {
        role: &'static str,
        uri: String,
        reason: &'static str,
    },

    /// JSON-LD serialization failed.
    #[error("JSON-LD serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError for ExportError {
    fn code(&self) -> &'static str {
        match self {
            ExportError::InvalidUri { .. } => "RDF_001",
            ExportError::Json(_) => "RDF_003",
        }
    }

    fn category(&self) -> &'static str {
        "rdf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ExportError::InvalidUri {
            role: "timeline",
            uri: "a b".to_string(),
            reason: "contains whitespace",
        };
        assert_eq!(err.code(), "RDF_001");
        assert_eq!(err.category(), "rdf");
        assert_eq!(
            err.to_string(),
            "invalid timeline URI 'a b': contains whitespace"
        );
    }
}
