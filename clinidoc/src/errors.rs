//! Error types for the clinidoc pipeline.
//!
//! Only pre-run validation failures and programming errors travel through
//! these types to callers. Stage failures are captured as task data and
//! never escape the run controller.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for clinidoc operations.
#[derive(Debug, Error)]
pub enum ClinidocError {
    /// A request was rejected before any task was created.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// An operation was invoked in a state that does not allow it.
    #[error("{0}")]
    InvalidState(#[from] InvalidStateError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ClinidocError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Raised when a run or batch request is invalid.
///
/// This is a fail-fast guard: it is returned before any task exists, so no
/// report is produced for the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stage kinds involved in the error.
    pub stages: Vec<String>,
    /// The input involved in the error, if any.
    pub input: Option<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            input: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the input involved.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// No generation kinds were requested.
    #[must_use]
    pub fn empty_request() -> Self {
        Self::new("At least one generation stage kind must be requested")
    }

    /// Requested kinds are not registered.
    #[must_use]
    pub fn unknown_kinds(unknown: Vec<String>, known: &[String]) -> Self {
        Self::new(format!(
            "Unknown stage kind(s): {}. Known kinds: {}",
            unknown.join(", "),
            known.join(", ")
        ))
        .with_stages(unknown)
    }

    /// The input could not be resolved to a readable source file.
    #[must_use]
    pub fn unreadable_input(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::new(format!(
            "Input '{}' is not a readable source file: {}",
            path.display(),
            reason
        ))
        .with_input(path.display().to_string())
    }
}

/// Raised when an operation is not allowed in the current state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid state: {message}")]
pub struct InvalidStateError {
    /// The error message.
    pub message: String,
}

impl InvalidStateError {
    /// Creates a new invalid state error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error returned by extraction and generation collaborators.
///
/// The `Display` output is the verbatim detail stored on a failed task.
#[derive(Debug, Error)]
pub enum StageError {
    /// The collaborator reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The stage did not finish within its timeout.
    #[error("stage '{stage}' timed out after {}s", .after.as_secs_f64())]
    Timeout {
        /// The stage that timed out.
        stage: String,
        /// The configured timeout.
        after: Duration,
    },

    /// Extracted fields did not pass schema validation.
    #[error("invalid extracted fields: {0}")]
    InvalidFields(String),

    /// The artifact returned by a generator does not exist.
    #[error("artifact '{}' was not written", .0.display())]
    MissingArtifact(PathBuf),

    /// The stage worker panicked.
    #[error("stage worker panicked: {0}")]
    Panicked(String),

    /// IO error inside the stage.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    /// Creates a failure with a verbatim message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns true if this is a timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Error raised when configuration is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config '{}': {source}", .path.display())]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration could not be parsed.
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A configuration value is out of range.
    #[error("Invalid config value for '{field}': {message}")]
    InvalidValue {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result type alias for clinidoc operations.
pub type Result<T> = std::result::Result<T, ClinidocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_failed_is_verbatim() {
        let err = StageError::failed("service timeout");
        assert_eq!(err.to_string(), "service timeout");
    }

    #[test]
    fn test_stage_error_timeout_message() {
        let err = StageError::Timeout {
            stage: "dvp".to_string(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "stage 'dvp' timed out after 1.5s");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_unknown_kinds_lists_offenders() {
        let err = PipelineValidationError::unknown_kinds(
            vec!["z".to_string()],
            &["crf".to_string(), "dvp".to_string()],
        );
        assert_eq!(err.stages, vec!["z".to_string()]);
        assert!(err.message.contains("z"));
        assert!(err.message.contains("crf, dvp"));
    }

    #[test]
    fn test_validation_converts_into_clinidoc_error() {
        let err: ClinidocError = PipelineValidationError::empty_request().into();
        assert!(matches!(err, ClinidocError::Validation(_)));
    }

    #[test]
    fn test_invalid_state_display() {
        let err = InvalidStateError::new("report already finalized");
        assert_eq!(err.to_string(), "Invalid state: report already finalized");
    }
}
