//! The runtime record of one stage execution.

use super::{StageKind, TaskStatus};
use crate::errors::InvalidStateError;
use crate::utils::{now_utc, Timestamp};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One stage's execution state within a run.
///
/// Tasks move `pending -> running -> completed | failed`, or
/// `pending -> skipped`. Transitions go through the methods below; an illegal
/// transition returns [`InvalidStateError`] and leaves the task untouched.
/// A failed task stays failed; retrying means running the pipeline again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    /// Unique within a run.
    pub task_id: String,
    /// Which stage this task executes.
    pub kind: StageKind,
    /// Scheduling position, used to order reports.
    pub sequence: usize,
    status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ended_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skipped_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    skip_reason: Option<String>,
}

impl Task {
    /// Creates a pending task.
    #[must_use]
    pub fn new(kind: StageKind, sequence: usize) -> Self {
        let task_id = match &kind {
            StageKind::Extraction => "extract".to_string(),
            StageKind::Generation(k) => format!("generate_{k}"),
        };
        Self {
            task_id,
            kind,
            sequence,
            status: TaskStatus::Pending,
            started_at: None,
            ended_at: None,
            skipped_at: None,
            output_path: None,
            error: None,
            skip_reason: None,
        }
    }

    /// Marks the task as running.
    ///
    /// # Errors
    ///
    /// Fails unless the task is pending.
    pub fn start(&mut self) -> Result<(), InvalidStateError> {
        self.expect_status(TaskStatus::Pending, TaskStatus::Running)?;
        self.status = TaskStatus::Running;
        self.started_at = Some(now_utc());
        Ok(())
    }

    /// Records the produced artifact and completes the task.
    ///
    /// # Errors
    ///
    /// Fails unless the task is running.
    pub fn complete(&mut self, output_path: impl Into<PathBuf>) -> Result<(), InvalidStateError> {
        self.expect_status(TaskStatus::Running, TaskStatus::Completed)?;
        self.status = TaskStatus::Completed;
        self.output_path = Some(output_path.into());
        self.ended_at = Some(now_utc());
        Ok(())
    }

    /// Records the error detail verbatim and fails the task.
    ///
    /// # Errors
    ///
    /// Fails unless the task is running.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidStateError> {
        self.expect_status(TaskStatus::Running, TaskStatus::Failed)?;
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.ended_at = Some(now_utc());
        Ok(())
    }

    /// Skips a task that was never attempted.
    ///
    /// # Errors
    ///
    /// Fails unless the task is pending.
    pub fn skip(&mut self, reason: impl Into<String>) -> Result<(), InvalidStateError> {
        self.expect_status(TaskStatus::Pending, TaskStatus::Skipped)?;
        self.status = TaskStatus::Skipped;
        self.skip_reason = Some(reason.into());
        self.skipped_at = Some(now_utc());
        Ok(())
    }

    fn expect_status(&self, from: TaskStatus, to: TaskStatus) -> Result<(), InvalidStateError> {
        if self.status == from {
            Ok(())
        } else {
            Err(InvalidStateError::new(format!(
                "task '{}' cannot move from {} to {}",
                self.task_id, self.status, to
            )))
        }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns true once the task reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// When the task started running.
    #[must_use]
    pub fn started_at(&self) -> Option<&Timestamp> {
        self.started_at.as_ref()
    }

    /// When the task completed or failed.
    #[must_use]
    pub fn ended_at(&self) -> Option<&Timestamp> {
        self.ended_at.as_ref()
    }

    /// When the task was skipped.
    #[must_use]
    pub fn skipped_at(&self) -> Option<&Timestamp> {
        self.skipped_at.as_ref()
    }

    /// The artifact path of a completed task.
    #[must_use]
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// The verbatim error detail of a failed task.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Why a skipped task was not attempted.
    #[must_use]
    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// Duration between start and end in milliseconds, if both are set.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GenerationKind;

    fn crf_task() -> Task {
        Task::new(StageKind::Generation(GenerationKind::new("crf").unwrap()), 1)
    }

    #[test]
    fn test_new_task_is_pending() {
        let task = crf_task();
        assert_eq!(task.task_id, "generate_crf");
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.started_at().is_none());
        assert!(task.output_path().is_none());
        assert!(task.error().is_none());
    }

    #[test]
    fn test_complete_path() {
        let mut task = crf_task();
        task.start().unwrap();
        assert_eq!(task.status(), TaskStatus::Running);
        task.complete("/out/CRF_X.md").unwrap();

        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.output_path(), Some(Path::new("/out/CRF_X.md")));
        assert!(task.error().is_none());
        assert!(task.started_at().is_some());
        assert!(task.ended_at().is_some());
        assert!(task.duration_ms().unwrap() >= 0);
    }

    #[test]
    fn test_fail_keeps_error_verbatim() {
        let mut task = crf_task();
        task.start().unwrap();
        task.fail("service timeout").unwrap();

        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.error(), Some("service timeout"));
        assert!(task.output_path().is_none());
    }

    #[test]
    fn test_skip_sets_only_skip_timestamp() {
        let mut task = crf_task();
        task.skip("extraction did not complete").unwrap();

        assert_eq!(task.status(), TaskStatus::Skipped);
        assert!(task.skipped_at().is_some());
        assert!(task.started_at().is_none());
        assert!(task.ended_at().is_none());
        assert!(task.error().is_none());
        assert!(task.output_path().is_none());
    }

    #[test]
    fn test_skip_from_running_is_rejected() {
        let mut task = crf_task();
        task.start().unwrap();
        let before = task.clone();

        assert!(task.skip("late").is_err());
        assert_eq!(task, before);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut task = crf_task();
        task.start().unwrap();
        task.complete("/out/a").unwrap();

        assert!(task.fail("boom").is_err());
        assert!(task.start().is_err());
        assert!(task.complete("/out/b").is_err());
        assert_eq!(task.output_path(), Some(Path::new("/out/a")));
        assert!(task.error().is_none());
    }

    #[test]
    fn test_complete_requires_running() {
        let mut task = crf_task();
        let err = task.complete("/out/a").unwrap_err();
        assert!(err.message.contains("pending"));
    }

    #[test]
    fn test_extraction_task_id() {
        let task = Task::new(StageKind::Extraction, 0);
        assert_eq!(task.task_id, "extract");
    }

    #[test]
    fn test_failed_task_serializes_error_only() {
        let mut task = crf_task();
        task.start().unwrap();
        task.fail("service timeout").unwrap();

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["error"], "service timeout");
        assert!(value.get("output_path").is_none());
        assert!(value.get("skipped_at").is_none());
    }
}
