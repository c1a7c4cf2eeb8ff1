//! Incremental construction of a run report.

use super::RunReport;
use crate::core::{StructuredFields, Task};
use crate::errors::InvalidStateError;
use crate::report::TaskCounts;
use crate::utils::{now_utc, Timestamp};
use parking_lot::Mutex;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Default)]
struct BuilderState {
    tasks: Vec<Task>,
    fields: Option<StructuredFields>,
    finalized: bool,
}

/// Accumulates terminal tasks into a [`RunReport`].
///
/// `record` may be called from concurrently finishing stages in any order;
/// the finalized report orders tasks by their scheduling sequence.
#[derive(Debug)]
pub struct ReportBuilder {
    run_id: Uuid,
    input: String,
    output_dir: PathBuf,
    started_at: Timestamp,
    state: Mutex<BuilderState>,
}

impl ReportBuilder {
    /// Starts a report for a run with a fresh run id.
    #[must_use]
    pub fn new(input: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self::with_run_id(Uuid::new_v4(), input, output_dir)
    }

    /// Starts a report with a specific run id.
    #[must_use]
    pub fn with_run_id(run_id: Uuid, input: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_id,
            input: input.into(),
            output_dir: output_dir.into(),
            started_at: now_utc(),
            state: Mutex::new(BuilderState::default()),
        }
    }

    /// The run id this report belongs to.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Records a task's terminal state, replacing any earlier record with the
    /// same task id.
    ///
    /// # Errors
    ///
    /// Fails if the report is already finalized or the task is not terminal.
    pub fn record(&self, task: Task) -> Result<(), InvalidStateError> {
        let mut state = self.state.lock();
        if state.finalized {
            return Err(InvalidStateError::new(format!(
                "cannot record task '{}': report for run {} is already finalized",
                task.task_id, self.run_id
            )));
        }
        if !task.is_terminal() {
            return Err(InvalidStateError::new(format!(
                "cannot record task '{}' in non-terminal state {}",
                task.task_id,
                task.status()
            )));
        }

        match state.tasks.iter_mut().find(|t| t.task_id == task.task_id) {
            Some(existing) => *existing = task,
            None => state.tasks.push(task),
        }
        Ok(())
    }

    /// Stores the extracted field snapshot.
    ///
    /// # Errors
    ///
    /// Fails if the report is already finalized.
    pub fn set_fields(&self, fields: StructuredFields) -> Result<(), InvalidStateError> {
        let mut state = self.state.lock();
        if state.finalized {
            return Err(InvalidStateError::new(
                "cannot set fields: report is already finalized",
            ));
        }
        state.fields = Some(fields);
        Ok(())
    }

    /// Number of tasks recorded so far.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Closes the report.
    ///
    /// # Errors
    ///
    /// Fails if called a second time, or if the count invariant does not
    /// hold. A failed finalize leaves the builder untouched.
    pub fn finalize(&self) -> Result<RunReport, InvalidStateError> {
        let mut state = self.state.lock();
        if state.finalized {
            return Err(InvalidStateError::new(format!(
                "report for run {} is already finalized",
                self.run_id
            )));
        }

        let mut tasks = state.tasks.clone();
        tasks.sort_by_key(|t| t.sequence);

        let counts = TaskCounts::from_tasks(&tasks);
        if !counts.is_consistent() {
            return Err(InvalidStateError::new(format!(
                "task counts do not add up: total={} completed={} failed={} skipped={}",
                counts.total, counts.completed, counts.failed, counts.skipped
            )));
        }

        state.finalized = true;
        let ended_at = now_utc().max(self.started_at);
        Ok(RunReport::new(
            self.run_id,
            self.input.clone(),
            self.output_dir.clone(),
            self.started_at,
            ended_at,
            tasks,
            state.fields.clone(),
        ))
    }

    /// Returns true once [`finalize`](Self::finalize) succeeded.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.state.lock().finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GenerationKind, StageKind, TaskStatus};
    use std::sync::Arc;

    fn finished(kind: &str, seq: usize, ok: bool) -> Task {
        let mut task = Task::new(StageKind::Generation(GenerationKind::new(kind).unwrap()), seq);
        task.start().unwrap();
        if ok {
            task.complete(format!("/out/{kind}.md")).unwrap();
        } else {
            task.fail(format!("{kind} broke")).unwrap();
        }
        task
    }

    #[test]
    fn test_record_in_any_order_finalizes_in_sequence() {
        let builder = ReportBuilder::new("p.txt", "/out");
        builder.record(finished("dvp", 2, false)).unwrap();
        builder.record(finished("crf", 1, true)).unwrap();

        let report = builder.finalize().unwrap();
        let names: Vec<_> = report.tasks().iter().map(|t| t.kind.name().to_string()).collect();
        assert_eq!(names, vec!["crf", "dvp"]);
        assert_eq!(report.counts().total, 2);
    }

    #[test]
    fn test_record_replaces_same_task_id() {
        let builder = ReportBuilder::new("p.txt", "/out");
        builder.record(finished("crf", 1, false)).unwrap();
        builder.record(finished("crf", 1, true)).unwrap();

        assert_eq!(builder.recorded(), 1);
        let report = builder.finalize().unwrap();
        assert_eq!(report.tasks()[0].status(), TaskStatus::Completed);
    }

    #[test]
    fn test_record_rejects_non_terminal() {
        let builder = ReportBuilder::new("p.txt", "/out");
        let task = Task::new(StageKind::Extraction, 0);
        assert!(builder.record(task).is_err());
        assert_eq!(builder.recorded(), 0);
    }

    #[test]
    fn test_finalize_twice_is_invalid_state() {
        let builder = ReportBuilder::new("p.txt", "/out");
        builder.record(finished("crf", 1, true)).unwrap();
        let first = builder.finalize().unwrap();

        let err = builder.finalize().unwrap_err();
        assert!(err.message.contains("already finalized"));
        assert_eq!(first.counts().completed, 1);
        assert!(builder.is_finalized());
    }

    #[test]
    fn test_record_after_finalize_is_invalid_state() {
        let builder = ReportBuilder::new("p.txt", "/out");
        let _ = builder.finalize().unwrap();

        assert!(builder.record(finished("crf", 1, true)).is_err());
        assert!(builder.set_fields(StructuredFields::new()).is_err());
    }

    #[test]
    fn test_fields_snapshot() {
        let builder = ReportBuilder::new("p.txt", "/out");
        builder
            .set_fields(StructuredFields::new().with_protocol_number("P-9"))
            .unwrap();
        let report = builder.finalize().unwrap();
        assert_eq!(
            report.fields().and_then(|f| f.protocol_number.as_deref()),
            Some("P-9")
        );
        assert!(report.ended_at() >= report.started_at());
    }

    #[tokio::test]
    async fn test_concurrent_record() {
        let builder = Arc::new(ReportBuilder::new("p.txt", "/out"));
        let kinds = ["crf", "dvp", "user_guide", "dmp", "sap", "tlf"];

        let handles: Vec<_> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let builder = builder.clone();
                let task = finished(kind, i + 1, i % 2 == 0);
                tokio::spawn(async move { builder.record(task) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let report = builder.finalize().unwrap();
        let counts = report.counts();
        assert_eq!(counts.total, 6);
        assert_eq!(counts.completed, 3);
        assert_eq!(counts.failed, 3);
        let sequences: Vec<_> = report.tasks().iter().map(|t| t.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);
    }
}
