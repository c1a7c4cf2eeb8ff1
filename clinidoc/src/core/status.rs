//! Task status and stage kind types.

use crate::errors::PipelineValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the single extraction stage.
pub const EXTRACTION_STAGE: &str = "extraction";

/// The name of a generation stage (e.g. `crf`, `dvp`).
///
/// Names are lowercase ASCII letters, digits and underscores. The set of
/// kinds is open; which ones exist is decided by the stage registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationKind(String);

impl GenerationKind {
    /// Parses a kind name, normalising case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, contains characters outside
    /// `[a-z0-9_]`, or collides with the extraction stage name.
    pub fn new(name: impl AsRef<str>) -> Result<Self, PipelineValidationError> {
        let normalized = name.as_ref().trim().to_ascii_lowercase();
        let valid = !normalized.is_empty()
            && normalized
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid || normalized == EXTRACTION_STAGE {
            return Err(PipelineValidationError::new(format!(
                "Invalid generation kind name '{}'",
                name.as_ref()
            ))
            .with_stages(vec![name.as_ref().to_string()]));
        }
        Ok(Self(normalized))
    }

    /// Returns the kind name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The kind of work a stage performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum StageKind {
    /// Turns the source input into structured fields.
    Extraction,
    /// Produces one document artifact from the structured fields.
    Generation(GenerationKind),
}

impl StageKind {
    /// Returns true for the extraction stage.
    #[must_use]
    pub fn is_extraction(&self) -> bool {
        matches!(self, Self::Extraction)
    }

    /// Returns the generation kind, if this is a generation stage.
    #[must_use]
    pub fn generation_kind(&self) -> Option<&GenerationKind> {
        match self {
            Self::Extraction => None,
            Self::Generation(kind) => Some(kind),
        }
    }

    /// Returns the stage name as it appears in reports.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Extraction => EXTRACTION_STAGE,
            Self::Generation(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<StageKind> for String {
    fn from(kind: StageKind) -> Self {
        kind.name().to_string()
    }
}

impl TryFrom<String> for StageKind {
    type Error = PipelineValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == EXTRACTION_STAGE {
            Ok(Self::Extraction)
        } else {
            GenerationKind::new(value).map(Self::Generation)
        }
    }
}

/// The execution status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Scheduled but not started.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Finished and produced an artifact.
    Completed,
    /// Attempted and failed.
    Failed,
    /// Never attempted because its dependency did not complete.
    Skipped,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl TaskStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Marker used in narrative reports.
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Completed => "[OK]",
            Self::Failed => "[FAIL]",
            Self::Skipped => "[SKIP]",
            Self::Running => "[RUN]",
            Self::Pending => "[..]",
        }
    }
}
