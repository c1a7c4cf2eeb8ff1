//! Test assertions for run reports.

use crate::core::TaskStatus;
use crate::pipeline::EXTRACTION_INCOMPLETE;
use crate::report::RunReport;

/// Asserts that the task for `stage` has the expected status.
pub fn assert_task_status(report: &RunReport, stage: &str, expected: TaskStatus) {
    let task = report
        .task(stage)
        .unwrap_or_else(|| panic!("Expected a task for stage '{stage}', but there is none"));
    assert_eq!(
        task.status(),
        expected,
        "Expected stage '{}' to be {:?}, got {:?} (error: {:?})",
        stage,
        expected,
        task.status(),
        task.error()
    );
}

/// Asserts that every task in the report completed.
pub fn assert_all_completed(report: &RunReport) {
    assert!(
        report.all_completed(),
        "Expected every task to complete, errors: {:?}",
        report.errors()
    );
}

/// Asserts the derived task counts.
pub fn assert_counts(report: &RunReport, completed: usize, failed: usize, skipped: usize) {
    let counts = report.counts();
    assert_eq!(
        (counts.completed, counts.failed, counts.skipped),
        (completed, failed, skipped),
        "Unexpected (completed, failed, skipped) counts"
    );
    assert!(counts.is_consistent(), "Counts do not add up: {counts:?}");
}

/// Asserts that extraction failed and every generation task was skipped.
pub fn assert_generation_skipped(report: &RunReport) {
    assert!(
        !report.extraction_completed(),
        "Expected extraction not to complete"
    );
    for task in report.tasks().iter().filter(|t| !t.kind.is_extraction()) {
        assert_eq!(task.status(), TaskStatus::Skipped, "Task {} not skipped", task.task_id);
        assert_eq!(task.skip_reason(), Some(EXTRACTION_INCOMPLETE));
        assert!(task.started_at().is_none(), "Skipped task {} has a start time", task.task_id);
    }
}

/// Asserts that the artifact recorded for `stage` exists on disk.
pub fn assert_artifact_exists(report: &RunReport, stage: &str) {
    let path = report
        .task(stage)
        .and_then(|t| t.output_path())
        .unwrap_or_else(|| panic!("Expected stage '{stage}' to record an artifact"));
    assert!(path.is_file(), "Artifact {} does not exist", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GenerationKind, StageKind, Task};
    use crate::report::ReportBuilder;

    fn report(extraction_ok: bool) -> RunReport {
        let builder = ReportBuilder::new("p.txt", "/out");
        let mut extract = Task::new(StageKind::Extraction, 0);
        extract.start().unwrap();
        let mut crf = Task::new(StageKind::Generation(GenerationKind::new("crf").unwrap()), 1);
        if extraction_ok {
            extract.complete("/out/extracted_fields.json").unwrap();
            crf.start().unwrap();
            crf.complete("/out/CRF.md").unwrap();
        } else {
            extract.fail("unreadable").unwrap();
            crf.skip(EXTRACTION_INCOMPLETE).unwrap();
        }
        builder.record(extract).unwrap();
        builder.record(crf).unwrap();
        builder.finalize().unwrap()
    }

    #[test]
    fn test_assert_task_status() {
        assert_task_status(&report(true), "crf", TaskStatus::Completed);
    }

    #[test]
    #[should_panic(expected = "Expected stage 'crf' to be")]
    fn test_assert_task_status_fails() {
        assert_task_status(&report(false), "crf", TaskStatus::Completed);
    }

    #[test]
    fn test_assert_counts() {
        assert_counts(&report(true), 2, 0, 0);
        assert_counts(&report(false), 0, 1, 1);
    }

    #[test]
    fn test_assert_generation_skipped() {
        assert_generation_skipped(&report(false));
        assert_all_completed(&report(true));
    }
}
