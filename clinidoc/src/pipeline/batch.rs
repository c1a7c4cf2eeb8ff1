//! The batch controller: many inputs, one run each.

use super::run::resolve_input;
use super::RunController;
use crate::cancellation::CancellationToken;
use crate::errors::{ClinidocError, PipelineValidationError};
use crate::events::{
    EventSink, BATCH_CANCELLED, BATCH_COMPLETED, BATCH_INPUT_FAILED_TO_START, BATCH_STARTED,
};
use crate::report::{persist_batch_report, BatchOutcome, BatchReport, FailedInput};
use crate::utils::{dir_timestamp, now_utc, sanitize_file_stem, Timestamp};
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Decides where each input of a batch writes its output.
///
/// Each input gets `<root>/<stem>_<YYYYmmdd_HHMMSS>`. When that directory
/// already exists, or was handed to an earlier input of the same batch, a
/// `-2`, `-3`, ... suffix is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRootPolicy {
    root: PathBuf,
}

impl OutputRootPolicy {
    /// Creates a policy rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The batch output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Picks a directory for `input` that is neither on disk nor in `taken`.
    #[must_use]
    pub fn unique_dir(&self, input: &Path, at: &Timestamp, taken: &HashSet<PathBuf>) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = format!("{}_{}", sanitize_file_stem(&stem, "input"), dir_timestamp(at));

        let mut candidate = self.root.join(&base);
        let mut suffix = 2;
        while candidate.exists() || taken.contains(&candidate) {
            candidate = self.root.join(format!("{base}-{suffix}"));
            suffix += 1;
        }
        candidate
    }
}

/// Runs a list of inputs one after another through a [`RunController`].
///
/// One input's failure never stops the next. Cancellation is checked
/// between inputs; a run already in progress finishes.
#[derive(Clone)]
pub struct BatchController {
    runner: RunController,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for BatchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchController")
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl BatchController {
    /// Creates a batch controller.
    #[must_use]
    pub fn new(runner: RunController, events: Arc<dyn EventSink>) -> Self {
        Self { runner, events }
    }

    /// Processes every input and returns the batch report.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty input list, an invalid kind request or
    /// an output root that cannot be created. All of these are detected
    /// before any input runs. Per-input problems are recorded in the report;
    /// a run that breaks a task or report invariant aborts the batch.
    pub async fn execute_all<S: AsRef<str>>(
        &self,
        inputs: &[PathBuf],
        requested: &[S],
        policy: &OutputRootPolicy,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, ClinidocError> {
        if inputs.is_empty() {
            return Err(PipelineValidationError::new("At least one input is required").into());
        }
        let kinds = self.runner.registry().resolve(requested)?;
        fs::create_dir_all(policy.root())?;

        let supplied: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
        let mut batch = BatchReport::start(supplied);
        let batch_id = batch.batch_id();
        let mut taken = HashSet::new();

        info!(
            batch_id = %batch_id,
            inputs = inputs.len(),
            root = %policy.root().display(),
            "Starting batch"
        );
        self.events
            .emit(
                BATCH_STARTED,
                Some(json!({
                    "batch_id": batch_id.to_string(),
                    "inputs": inputs.len(),
                    "output_root": policy.root().display().to_string(),
                })),
            )
            .await;

        for (index, input) in inputs.iter().enumerate() {
            if cancel.is_cancelled() {
                let remaining = inputs.len() - index;
                let reason = cancel.reason().unwrap_or_default();
                warn!(batch_id = %batch_id, remaining, reason = %reason, "Batch cancelled");
                for rest in index..inputs.len() {
                    batch.push(rest, BatchOutcome::NotStarted);
                }
                self.events
                    .emit(
                        BATCH_CANCELLED,
                        Some(json!({
                            "batch_id": batch_id.to_string(),
                            "reason": reason,
                            "not_started": remaining,
                        })),
                    )
                    .await;
                break;
            }

            info!(batch_id = %batch_id, "Processing input {}/{}: {}", index + 1, inputs.len(), input.display());

            if let Err(e) = resolve_input(input) {
                self.record_failed_to_start(&mut batch, index, input, e.message).await;
                continue;
            }

            let output_dir = policy.unique_dir(input, &now_utc(), &taken);
            taken.insert(output_dir.clone());

            match self.runner.execute_resolved(input, &output_dir, &kinds).await {
                Ok(report) => batch.push(index, BatchOutcome::Run(report)),
                Err(e) if failed_before_start(&e) => {
                    self.record_failed_to_start(&mut batch, index, input, e.to_string())
                        .await;
                }
                Err(e) => {
                    error!(
                        batch_id = %batch_id,
                        input = %input.display(),
                        error = %e,
                        "Run aborted after its tasks were created"
                    );
                    return Err(e);
                }
            }
        }

        let batch = batch.close()?;
        if let Err(e) = persist_batch_report(&batch, policy.root()) {
            warn!(batch_id = %batch_id, error = %e, "Failed to write batch summary");
        }

        let counts = batch.counts();
        info!(
            batch_id = %batch_id,
            runs = counts.runs,
            failed_to_start = counts.failed_to_start,
            not_started = counts.not_started,
            "Batch finished"
        );
        self.events
            .emit(
                BATCH_COMPLETED,
                Some(json!({
                    "batch_id": batch_id.to_string(),
                    "counts": counts,
                })),
            )
            .await;

        Ok(batch)
    }

    async fn record_failed_to_start(
        &self,
        batch: &mut BatchReport,
        index: usize,
        input: &Path,
        reason: String,
    ) {
        error!(input = %input.display(), reason = %reason, "Input failed to start");
        self.events
            .emit(
                BATCH_INPUT_FAILED_TO_START,
                Some(json!({
                    "batch_id": batch.batch_id().to_string(),
                    "input": input.display().to_string(),
                    "reason": reason,
                })),
            )
            .await;
        batch.push(
            index,
            BatchOutcome::FailedToStart(FailedInput {
                input: input.display().to_string(),
                reason,
            }),
        );
    }
}

/// Whether a run error was raised before any task of the run existed.
///
/// Only input resolution and output directory creation fail that early;
/// anything later is a broken task or report invariant.
fn failed_before_start(error: &ClinidocError) -> bool {
    matches!(error, ClinidocError::Validation(_) | ClinidocError::Io(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    #[test]
    fn test_unique_dir_uses_stem_and_timestamp() {
        let root = tempfile::tempdir().unwrap();
        let policy = OutputRootPolicy::new(root.path());
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        let dir = policy.unique_dir(Path::new("/data/protocol v2.pdf"), &at, &HashSet::new());
        assert_eq!(dir, root.path().join("protocol_v2_20250304_050607"));
    }

    #[test]
    fn test_unique_dir_suffixes_on_collision() {
        let root = tempfile::tempdir().unwrap();
        let policy = OutputRootPolicy::new(root.path());
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();

        fs::create_dir_all(root.path().join("p_20250304_050607")).unwrap();
        let mut taken = HashSet::new();
        taken.insert(root.path().join("p_20250304_050607-2"));

        let dir = policy.unique_dir(Path::new("a/p.txt"), &at, &taken);
        assert_eq!(dir, root.path().join("p_20250304_050607-3"));
    }

    #[test]
    fn test_only_pre_start_errors_count_as_failed_to_start() {
        use crate::errors::InvalidStateError;

        let unreadable: ClinidocError =
            PipelineValidationError::new("Input 'x.txt' is not readable").into();
        let no_dir: ClinidocError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        let broken: ClinidocError =
            InvalidStateError::new("report for run r is already finalized").into();

        assert!(failed_before_start(&unreadable));
        assert!(failed_before_start(&no_dir));
        assert!(!failed_before_start(&broken));
    }
}
