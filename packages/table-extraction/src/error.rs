//! Typed errors for the table extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Two layers:
//! - [`ExtractionError`] is job-scoped. Any value of it ends the job.
//! - [`UpstreamError`] is unit-scoped. The invoker decides whether it
//!   degrades one unit or escalates to a job failure.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Errors that end an extraction job.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Document has no pages or could not be parsed
    #[error("invalid document: {reason}")]
    InvalidDocument { reason: String },

    /// Sample page limit was zero or negative
    #[error("invalid sample size {0}: must be a positive page count")]
    InvalidSampleSize(i64),

    /// No usable column names after trimming and de-duplication
    #[error("schema has no usable columns")]
    EmptySchema,

    /// Free-text instructions exceed the prompt budget
    #[error("instructions too long: {len} characters (limit {max})")]
    InstructionsTooLong { len: usize, max: usize },

    /// The vision backend rejected the job's configuration (auth, model)
    #[error("fatal upstream error on unit {unit}: {message}")]
    FatalUpstream { unit: usize, message: String },

    /// The job deadline passed before the artifact was built
    #[error("job exceeded its deadline of {0:?}")]
    JobTimeout(Duration),

    /// Zero rows extracted under a strict empty-result policy
    #[error("no rows were extracted from the document")]
    EmptyResult,

    /// The caller cancelled the job
    #[error("job cancelled")]
    Cancelled,

    /// Spreadsheet serialization or read-back failed
    #[error("spreadsheet error: {0}")]
    Artifact(String),

    /// Checkpoint storage failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ExtractionError {
    /// Stable machine-readable kind for the transport layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::InvalidDocument { .. } => ErrorKind::InvalidDocument,
            ExtractionError::InvalidSampleSize(_) => ErrorKind::InvalidSampleSize,
            ExtractionError::EmptySchema => ErrorKind::EmptySchema,
            ExtractionError::InstructionsTooLong { .. } => ErrorKind::InstructionsTooLong,
            ExtractionError::FatalUpstream { .. } => ErrorKind::FatalUpstreamError,
            ExtractionError::JobTimeout(_) => ErrorKind::JobTimeout,
            ExtractionError::EmptyResult => ErrorKind::EmptyResult,
            ExtractionError::Cancelled => ErrorKind::Cancelled,
            ExtractionError::Artifact(_) => ErrorKind::Artifact,
            ExtractionError::Storage(_) | ExtractionError::JsonParse(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error comes from validating caller input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidDocument
                | ErrorKind::InvalidSampleSize
                | ErrorKind::EmptySchema
                | ErrorKind::InstructionsTooLong
        )
    }

    pub(crate) fn invalid_document(reason: impl Into<String>) -> Self {
        ExtractionError::InvalidDocument {
            reason: reason.into(),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExtractionError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ExtractionError::Artifact(err.to_string())
    }
}

/// Classified job failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidDocument,
    InvalidSampleSize,
    EmptySchema,
    InstructionsTooLong,
    FatalUpstreamError,
    JobTimeout,
    EmptyResult,
    Cancelled,
    Artifact,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidDocument => "invalid_document",
            ErrorKind::InvalidSampleSize => "invalid_sample_size",
            ErrorKind::EmptySchema => "empty_schema",
            ErrorKind::InstructionsTooLong => "instructions_too_long",
            ErrorKind::FatalUpstreamError => "fatal_upstream_error",
            ErrorKind::JobTimeout => "job_timeout",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Artifact => "artifact",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit-scoped failures reported by a vision backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Rate limit, timeout or transient network fault; worth retrying
    #[error("transient upstream error: {0}")]
    Transient(String),

    /// Response could not be read as the expected structure
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Authentication or configuration failure; ends the job
    #[error("fatal upstream error: {0}")]
    Fatal(String),
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Result type alias for vision backend calls.
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(ExtractionError::EmptySchema.kind().as_str(), "empty_schema");
        assert_eq!(
            ExtractionError::JobTimeout(Duration::from_secs(1)).kind(),
            ErrorKind::JobTimeout
        );
        assert_eq!(
            ExtractionError::FatalUpstream {
                unit: 3,
                message: "401".into()
            }
            .kind()
            .to_string(),
            "fatal_upstream_error"
        );
    }

    #[test]
    fn test_validation_errors() {
        assert!(ExtractionError::InvalidSampleSize(0).is_validation());
        assert!(ExtractionError::invalid_document("empty").is_validation());
        assert!(!ExtractionError::Cancelled.is_validation());
        assert!(!ExtractionError::EmptyResult.is_validation());
    }
}
