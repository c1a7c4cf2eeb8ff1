//! The finished record of one pipeline run.

use crate::core::{StageKind, StructuredFields, Task, TaskStatus};
use crate::utils::{format_elapsed, format_iso, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const RULE: &str = "================================================================================";
const THIN_RULE: &str = "--------------------------------------------------------------------------------";

/// Task counts derived from a task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    /// Number of tasks.
    pub total: usize,
    /// Tasks that completed.
    pub completed: usize,
    /// Tasks that failed.
    pub failed: usize,
    /// Tasks that were skipped.
    pub skipped: usize,
}

impl TaskCounts {
    /// Counts tasks by status.
    #[must_use]
    pub fn from_tasks(tasks: &[Task]) -> Self {
        tasks.iter().fold(Self::default(), |mut counts, task| {
            counts.total += 1;
            match task.status() {
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Skipped => counts.skipped += 1,
                TaskStatus::Pending | TaskStatus::Running => {}
            }
            counts
        })
    }

    /// Returns true when every task is accounted for by a terminal status.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total == self.completed + self.failed + self.skipped
    }

    /// Completed over total, 0 when there are no tasks.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

impl Add for TaskCounts {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            total: self.total + other.total,
            completed: self.completed + other.completed,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
        }
    }
}

impl AddAssign for TaskCounts {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// The report of one finished run.
///
/// Built by [`super::ReportBuilder::finalize`] and immutable afterwards.
/// Counts, artifacts and errors are derived from the task list on demand, so
/// they cannot drift from it.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    run_id: Uuid,
    input: String,
    output_dir: PathBuf,
    started_at: Timestamp,
    ended_at: Timestamp,
    tasks: Vec<Task>,
    fields: Option<StructuredFields>,
}

impl RunReport {
    pub(crate) fn new(
        run_id: Uuid,
        input: String,
        output_dir: PathBuf,
        started_at: Timestamp,
        ended_at: Timestamp,
        tasks: Vec<Task>,
        fields: Option<StructuredFields>,
    ) -> Self {
        Self {
            run_id,
            input,
            output_dir,
            started_at,
            ended_at,
            tasks,
            fields,
        }
    }

    /// Unique identifier of the run.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The input identifier (source path as given).
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The run's output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// When the run started.
    #[must_use]
    pub fn started_at(&self) -> &Timestamp {
        &self.started_at
    }

    /// When the run ended.
    #[must_use]
    pub fn ended_at(&self) -> &Timestamp {
        &self.ended_at
    }

    /// Tasks in scheduling order, extraction first.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up the task for a stage by name.
    #[must_use]
    pub fn task(&self, stage: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.kind.name() == stage)
    }

    /// The extracted fields, if extraction succeeded.
    #[must_use]
    pub fn fields(&self) -> Option<&StructuredFields> {
        self.fields.as_ref()
    }

    /// Derived task counts.
    #[must_use]
    pub fn counts(&self) -> TaskCounts {
        TaskCounts::from_tasks(&self.tasks)
    }

    /// Completed over total.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.counts().success_rate()
    }

    /// Paths of every completed task's artifact.
    #[must_use]
    pub fn artifacts(&self) -> Vec<&Path> {
        self.tasks.iter().filter_map(Task::output_path).collect()
    }

    /// Number of completed generation artifacts (extraction excluded).
    #[must_use]
    pub fn generated_artifact_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| !t.kind.is_extraction() && t.status() == TaskStatus::Completed)
            .count()
    }

    /// Error details of failed tasks, prefixed with the stage name.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter_map(|t| t.error().map(|e| format!("[{}] {}", t.kind, e)))
            .collect()
    }

    /// Returns true if every task completed.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.status() == TaskStatus::Completed)
    }

    /// Returns true if the extraction stage completed.
    #[must_use]
    pub fn extraction_completed(&self) -> bool {
        self.tasks
            .iter()
            .any(|t| t.kind == StageKind::Extraction && t.status() == TaskStatus::Completed)
    }

    /// Renders the report for machine consumption.
    #[must_use]
    pub fn to_structured(&self) -> serde_json::Value {
        let counts = self.counts();
        let tasks: Vec<serde_json::Value> = self.tasks.iter().map(task_record).collect();

        json!({
            "run_id": self.run_id.to_string(),
            "input": self.input,
            "output_directory": self.output_dir.display().to_string(),
            "started_at": format_iso(&self.started_at),
            "ended_at": format_iso(&self.ended_at),
            "duration_ms": (self.ended_at - self.started_at).num_milliseconds(),
            "counts": counts,
            "success_rate": counts.success_rate(),
            "tasks": tasks,
            "artifacts": self
                .artifacts()
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
            "errors": self.errors(),
            "extracted_fields": self.fields,
        })
    }

    /// Renders the report for a human reader.
    #[must_use]
    pub fn to_narrative(&self) -> String {
        let mut out = String::new();
        let counts = self.counts();

        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Clinical Document Automation Report");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out);

        section(&mut out, "Run");
        let _ = writeln!(out, "Run ID: {}", self.run_id);
        let _ = writeln!(out, "Input: {}", self.input);
        let _ = writeln!(out, "Output directory: {}", self.output_dir.display());
        let _ = writeln!(out, "Started: {}", format_iso(&self.started_at));
        let _ = writeln!(out, "Ended: {}", format_iso(&self.ended_at));
        let _ = writeln!(
            out,
            "Duration: {}",
            format_elapsed(&self.started_at, &self.ended_at)
        );
        let _ = writeln!(out);

        if let Some(fields) = &self.fields {
            section(&mut out, "Extracted fields");
            let rows = [
                ("Study title", fields.study_title.as_deref()),
                ("Protocol number", fields.protocol_number.as_deref()),
                ("Sponsor", fields.sponsor.as_deref()),
                ("Phase", fields.phase.as_deref()),
                ("Target population", fields.target_population.as_deref()),
                ("Sample size", fields.sample_size.as_deref()),
            ];
            for (label, value) in rows {
                let _ = writeln!(out, "{label}: {}", StructuredFields::display(value));
            }
            let _ = writeln!(out);
        }

        section(&mut out, "Summary");
        let _ = writeln!(out, "Total tasks: {}", counts.total);
        let _ = writeln!(out, "Completed: {}", counts.completed);
        let _ = writeln!(out, "Failed: {}", counts.failed);
        let _ = writeln!(out, "Skipped: {}", counts.skipped);
        let _ = writeln!(out, "Success rate: {:.1}%", counts.success_rate() * 100.0);
        let _ = writeln!(out);

        section(&mut out, "Tasks");
        for (i, task) in self.tasks.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} {} - {}",
                i + 1,
                task.status().marker(),
                task.kind.name().to_uppercase(),
                task.status().to_string().to_uppercase()
            );
            if let Some(path) = task.output_path() {
                let _ = writeln!(out, "   Output: {}", path.display());
            }
            if let Some(error) = task.error() {
                let _ = writeln!(out, "   Error: {error}");
            }
            if let Some(reason) = task.skip_reason() {
                let _ = writeln!(out, "   Skipped: {reason}");
            }
            if let Some(ts) = task.started_at() {
                let _ = writeln!(out, "   Started: {}", format_iso(ts));
            }
            if let Some(ts) = task.ended_at() {
                let _ = writeln!(out, "   Ended: {}", format_iso(ts));
            }
            if let Some(ts) = task.skipped_at() {
                let _ = writeln!(out, "   Skipped at: {}", format_iso(ts));
            }
            let _ = writeln!(out);
        }

        let artifacts = self.artifacts();
        if !artifacts.is_empty() {
            section(&mut out, "Artifacts");
            for (i, path) in artifacts.iter().enumerate() {
                let _ = writeln!(out, "{}. {}", i + 1, path.display());
            }
            let _ = writeln!(out);
        }

        let errors = self.errors();
        if !errors.is_empty() {
            section(&mut out, "Errors");
            for (i, error) in errors.iter().enumerate() {
                let _ = writeln!(out, "{}. {error}", i + 1);
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "End of report");
        let _ = writeln!(out, "{RULE}");
        out
    }
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "[{title}]");
    let _ = writeln!(out, "{THIN_RULE}");
}

fn task_record(task: &Task) -> serde_json::Value {
    json!({
        "task_id": task.task_id,
        "kind": task.kind.name(),
        "sequence": task.sequence,
        "status": task.status(),
        "started_at": task.started_at().map(format_iso),
        "ended_at": task.ended_at().map(format_iso),
        "skipped_at": task.skipped_at().map(format_iso),
        "duration_ms": task.duration_ms(),
        "output_path": task.output_path().map(|p| p.display().to_string()),
        "error": task.error(),
        "skip_reason": task.skip_reason(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GenerationKind;
    use crate::utils::now_utc;
    use pretty_assertions::assert_eq;

    fn generation_task(kind: &str, seq: usize) -> Task {
        Task::new(StageKind::Generation(GenerationKind::new(kind).unwrap()), seq)
    }

    fn sample_report() -> RunReport {
        let mut extract = Task::new(StageKind::Extraction, 0);
        extract.start().unwrap();
        extract.complete("/out/extracted_fields.json").unwrap();

        let mut crf = generation_task("crf", 1);
        crf.start().unwrap();
        crf.complete("/out/CRF_P-1.md").unwrap();

        let mut dvp = generation_task("dvp", 2);
        dvp.start().unwrap();
        dvp.fail("service timeout").unwrap();

        let started = now_utc();
        RunReport::new(
            Uuid::new_v4(),
            "protocol.txt".to_string(),
            PathBuf::from("/out"),
            started,
            started + chrono::Duration::milliseconds(1500),
            vec![extract, crf, dvp],
            Some(
                StructuredFields::new()
                    .with_protocol_number("P-1")
                    .with_study_title("Trial"),
            ),
        )
    }

    #[test]
    fn test_counts_are_derived() {
        let report = sample_report();
        let counts = report.counts();
        assert_eq!(
            counts,
            TaskCounts {
                total: 3,
                completed: 2,
                failed: 1,
                skipped: 0
            }
        );
        assert!(counts.is_consistent());
        assert!((report.success_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!(!report.all_completed());
        assert!(report.extraction_completed());
        assert_eq!(report.generated_artifact_count(), 1);
    }

    #[test]
    fn test_artifacts_and_errors() {
        let report = sample_report();
        assert_eq!(
            report.artifacts(),
            vec![
                Path::new("/out/extracted_fields.json"),
                Path::new("/out/CRF_P-1.md")
            ]
        );
        assert_eq!(report.errors(), vec!["[dvp] service timeout".to_string()]);
        assert_eq!(report.task("dvp").unwrap().error(), Some("service timeout"));
    }

    #[test]
    fn test_structured_rendering() {
        let report = sample_report();
        let value = report.to_structured();

        assert_eq!(value["counts"]["total"], 3);
        assert_eq!(value["counts"]["failed"], 1);
        assert_eq!(value["duration_ms"], 1500);
        assert_eq!(value["tasks"][2]["kind"], "dvp");
        assert_eq!(value["tasks"][2]["status"], "failed");
        assert_eq!(value["tasks"][2]["error"], "service timeout");
        assert!(value["tasks"][2]["output_path"].is_null());
        assert_eq!(value["extracted_fields"]["protocol_number"], "P-1");
        assert_eq!(value["errors"][0], "[dvp] service timeout");
    }

    #[test]
    fn test_narrative_rendering() {
        let report = sample_report();
        let text = report.to_narrative();

        assert!(text.contains("Input: protocol.txt"));
        assert!(text.contains("Started: "));
        assert!(text.contains("Ended: "));
        assert!(text.contains("Duration: 0:00:01.500"));
        assert!(text.contains("1. [OK] EXTRACTION - COMPLETED"));
        assert!(text.contains("3. [FAIL] DVP - FAILED"));
        assert!(text.contains("   Error: service timeout"));
        assert!(text.contains("Success rate: 66.7%"));
        assert!(text.contains("Protocol number: P-1"));
        assert!(text.contains("Sponsor: N/A"));
    }

    #[test]
    fn test_renderings_are_idempotent() {
        let report = sample_report();
        assert_eq!(report.to_structured(), report.to_structured());
        assert_eq!(report.to_narrative(), report.to_narrative());
    }

    #[test]
    fn test_task_counts_add() {
        let a = TaskCounts {
            total: 3,
            completed: 2,
            failed: 1,
            skipped: 0,
        };
        let mut b = TaskCounts {
            total: 3,
            completed: 1,
            failed: 0,
            skipped: 2,
        };
        b += a;
        assert_eq!(b.total, 6);
        assert_eq!(b.completed, 3);
        assert_eq!(b.skipped, 2);
        assert!(b.is_consistent());
        assert_eq!(TaskCounts::default().success_rate(), 0.0);
    }
}
