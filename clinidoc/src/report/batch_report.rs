//! Roll-up report of a batch of runs.

use super::{RunReport, TaskCounts};
use crate::errors::InvalidStateError;
use crate::utils::{format_elapsed, format_iso, now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use uuid::Uuid;

const RULE: &str = "================================================================================";
const THIN_RULE: &str = "--------------------------------------------------------------------------------";

/// An input that could not be resolved into a runnable job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedInput {
    /// The input as supplied.
    pub input: String,
    /// Why it could not start.
    pub reason: String,
}

/// What happened to one supplied input.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// The run controller ran and produced a report.
    Run(RunReport),
    /// The input could not be resolved; no run was attempted.
    FailedToStart(FailedInput),
    /// Cancellation stopped the batch before this input was scheduled.
    NotStarted,
}

#[derive(Debug, Clone, PartialEq)]
struct BatchEntry {
    index: usize,
    input: String,
    outcome: BatchOutcome,
}

/// Aggregate numbers for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    /// Inputs supplied to the batch.
    pub total_inputs: usize,
    /// Inputs that produced a run report.
    pub runs: usize,
    /// Inputs that failed to start.
    pub failed_to_start: usize,
    /// Inputs left unattempted after cancellation.
    pub not_started: usize,
    /// Attempted inputs with at least one completed generation artifact.
    pub inputs_with_artifacts: usize,
    /// Attempted inputs with no completed generation artifact.
    pub inputs_without_artifacts: usize,
    /// Task counts summed across runs.
    pub tasks: TaskCounts,
}

/// The result of a batch.
///
/// Every supplied input appears exactly once, as a run, a failed-to-start
/// entry, or a not-started entry. Only the batch controller builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    batch_id: Uuid,
    started_at: Timestamp,
    ended_at: Timestamp,
    supplied: Vec<String>,
    entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub(crate) fn start(supplied: Vec<String>) -> Self {
        let now = now_utc();
        Self {
            batch_id: Uuid::new_v4(),
            started_at: now,
            ended_at: now,
            supplied,
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, index: usize, outcome: BatchOutcome) {
        let input = self.supplied.get(index).cloned().unwrap_or_default();
        self.entries.push(BatchEntry {
            index,
            input,
            outcome,
        });
    }

    /// Seals the report after checking that every input is accounted for once.
    pub(crate) fn close(mut self) -> Result<Self, InvalidStateError> {
        let mut seen = vec![0usize; self.supplied.len()];
        for entry in &self.entries {
            match seen.get_mut(entry.index) {
                Some(count) => *count += 1,
                None => {
                    return Err(InvalidStateError::new(format!(
                        "batch entry for unknown input index {}",
                        entry.index
                    )))
                }
            }
        }
        if let Some((index, count)) = seen.iter().enumerate().find(|(_, c)| **c != 1) {
            return Err(InvalidStateError::new(format!(
                "input '{}' appears {} times in the batch report",
                self.supplied[index], count
            )));
        }

        self.entries.sort_by_key(|e| e.index);
        self.ended_at = now_utc().max(self.started_at);
        Ok(self)
    }

    /// Unique identifier of the batch.
    #[must_use]
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// When the batch started.
    #[must_use]
    pub fn started_at(&self) -> &Timestamp {
        &self.started_at
    }

    /// When the batch ended.
    #[must_use]
    pub fn ended_at(&self) -> &Timestamp {
        &self.ended_at
    }

    /// Inputs in the order they were supplied.
    #[must_use]
    pub fn inputs(&self) -> &[String] {
        &self.supplied
    }

    /// Outcome per input, in supply order.
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &BatchOutcome)> {
        self.entries.iter().map(|e| (e.input.as_str(), &e.outcome))
    }

    /// Inputs that produced a run report.
    #[must_use]
    pub fn runs(&self) -> Vec<(&str, &RunReport)> {
        self.outcomes()
            .filter_map(|(input, outcome)| match outcome {
                BatchOutcome::Run(report) => Some((input, report)),
                _ => None,
            })
            .collect()
    }

    /// Inputs that failed to start.
    #[must_use]
    pub fn failed_to_start(&self) -> Vec<&FailedInput> {
        self.outcomes()
            .filter_map(|(_, outcome)| match outcome {
                BatchOutcome::FailedToStart(failed) => Some(failed),
                _ => None,
            })
            .collect()
    }

    /// Inputs never attempted because the batch was cancelled.
    #[must_use]
    pub fn not_started(&self) -> Vec<&str> {
        self.outcomes()
            .filter_map(|(input, outcome)| {
                matches!(outcome, BatchOutcome::NotStarted).then_some(input)
            })
            .collect()
    }

    /// Aggregate counts.
    #[must_use]
    pub fn counts(&self) -> BatchCounts {
        let mut counts = BatchCounts {
            total_inputs: self.supplied.len(),
            ..BatchCounts::default()
        };
        for (_, outcome) in self.outcomes() {
            match outcome {
                BatchOutcome::Run(report) => {
                    counts.runs += 1;
                    counts.tasks += report.counts();
                    if report.generated_artifact_count() > 0 {
                        counts.inputs_with_artifacts += 1;
                    } else {
                        counts.inputs_without_artifacts += 1;
                    }
                }
                BatchOutcome::FailedToStart(_) => {
                    counts.failed_to_start += 1;
                    counts.inputs_without_artifacts += 1;
                }
                BatchOutcome::NotStarted => counts.not_started += 1,
            }
        }
        counts
    }

    /// Returns true if every input ran and every task in every run completed.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        self.outcomes().all(|(_, outcome)| match outcome {
            BatchOutcome::Run(report) => report.all_completed(),
            BatchOutcome::FailedToStart(_) | BatchOutcome::NotStarted => false,
        })
    }

    /// Renders the batch for machine consumption.
    #[must_use]
    pub fn to_structured(&self) -> serde_json::Value {
        let runs: Vec<serde_json::Value> = self
            .runs()
            .into_iter()
            .map(|(input, report)| {
                json!({
                    "input": input,
                    "report": report.to_structured(),
                })
            })
            .collect();

        json!({
            "batch_id": self.batch_id.to_string(),
            "started_at": format_iso(&self.started_at),
            "ended_at": format_iso(&self.ended_at),
            "counts": self.counts(),
            "inputs": self.supplied,
            "runs": runs,
            "failed_to_start": self.failed_to_start(),
            "not_started": self.not_started(),
        })
    }

    /// Renders the batch summary for a human reader.
    #[must_use]
    pub fn to_narrative(&self) -> String {
        let mut out = String::new();
        let counts = self.counts();

        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Batch Processing Summary");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out);
        let _ = writeln!(out, "Batch ID: {}", self.batch_id);
        let _ = writeln!(out, "Started: {}", format_iso(&self.started_at));
        let _ = writeln!(out, "Ended: {}", format_iso(&self.ended_at));
        let _ = writeln!(
            out,
            "Duration: {}",
            format_elapsed(&self.started_at, &self.ended_at)
        );
        let _ = writeln!(out, "Inputs: {}", counts.total_inputs);
        let _ = writeln!(out);

        for (i, (input, outcome)) in self.outcomes().enumerate() {
            let _ = writeln!(out, "{}. {input}", i + 1);
            let _ = writeln!(out, "{THIN_RULE}");
            match outcome {
                BatchOutcome::Run(report) => {
                    let run = report.counts();
                    let _ = writeln!(out, "   Output directory: {}", report.output_dir().display());
                    let _ = writeln!(out, "   Completed tasks: {}", run.completed);
                    let _ = writeln!(out, "   Failed tasks: {}", run.failed);
                    let _ = writeln!(out, "   Skipped tasks: {}", run.skipped);
                    let _ = writeln!(out, "   Artifacts: {}", report.artifacts().len());
                }
                BatchOutcome::FailedToStart(failed) => {
                    let _ = writeln!(out, "   Failed to start: {}", failed.reason);
                }
                BatchOutcome::NotStarted => {
                    let _ = writeln!(out, "   Not started (batch cancelled)");
                }
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Totals");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Runs: {}", counts.runs);
        let _ = writeln!(out, "Failed to start: {}", counts.failed_to_start);
        let _ = writeln!(out, "Not started: {}", counts.not_started);
        let _ = writeln!(out, "Inputs with artifacts: {}", counts.inputs_with_artifacts);
        let _ = writeln!(out, "Inputs without artifacts: {}", counts.inputs_without_artifacts);
        let _ = writeln!(out, "Completed tasks: {}", counts.tasks.completed);
        let _ = writeln!(out, "Failed tasks: {}", counts.tasks.failed);
        let _ = writeln!(out, "Skipped tasks: {}", counts.tasks.skipped);
        out
    }
}
