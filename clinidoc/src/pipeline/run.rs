//! The run controller: one input through extraction and generation.

use super::StageRegistry;
use crate::config::PipelineConfig;
use crate::core::{GenerationKind, StageKind, StructuredFields, Task, EXTRACTION_STAGE};
use crate::errors::{ClinidocError, PipelineValidationError, StageError};
use crate::events::{
    EventSink, RUN_COMPLETED, RUN_STARTED, STAGE_COMPLETED, STAGE_FAILED, STAGE_SKIPPED,
    STAGE_STARTED,
};
use crate::helpers::run_isolated;
use crate::report::{persist_run_report, ReportBuilder, RunReport};
use crate::stages::{Extractor, GenerationOptions};
use crate::utils::{publish_dir_contents, write_atomic};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// File the extraction stage persists its fields to.
pub const EXTRACTED_FIELDS_FILE: &str = "extracted_fields.json";

/// Directory under the output directory holding per-stage staging areas.
pub const STAGING_DIR: &str = ".staging";

/// Name of the span wrapping one run. Its `output_dir` field names the
/// directory the run writes into.
pub const RUN_SPAN: &str = "run";

/// Skip reason given to generation tasks when extraction did not complete.
pub const EXTRACTION_INCOMPLETE: &str = "extraction did not complete";

/// Checks that `path` names an existing, readable regular file.
///
/// # Errors
///
/// Returns a validation error naming the input otherwise.
pub fn resolve_input(path: &Path) -> Result<PathBuf, PipelineValidationError> {
    let metadata =
        fs::metadata(path).map_err(|e| PipelineValidationError::unreadable_input(path, e))?;
    if !metadata.is_file() {
        return Err(PipelineValidationError::unreadable_input(
            path,
            "not a regular file",
        ));
    }
    fs::File::open(path).map_err(|e| PipelineValidationError::unreadable_input(path, e))?;
    Ok(path.to_path_buf())
}

/// Drives a single input through the pipeline.
///
/// Extraction runs exactly once, first. Generation stages run only after
/// extraction completed and are independent of each other; a failing stage
/// never affects its siblings. Once tasks exist every outcome lands in the
/// report rather than in an `Err`.
#[derive(Clone)]
pub struct RunController {
    extractor: Arc<dyn Extractor>,
    registry: Arc<StageRegistry>,
    config: Arc<PipelineConfig>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("extractor", &self.extractor)
            .field("kinds", &self.registry.known_kinds())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RunController {
    /// Creates a run controller.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn Extractor>,
        registry: Arc<StageRegistry>,
        config: Arc<PipelineConfig>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            extractor,
            registry,
            config,
            events,
        }
    }

    /// The registry used to resolve requested kinds.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Runs `input` and writes artifacts and reports into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error only before any task exists: an empty or unknown
    /// kind request, an unreadable input, or an output directory that
    /// cannot be created.
    pub async fn execute<S: AsRef<str>>(
        &self,
        input: &Path,
        output_dir: &Path,
        requested: &[S],
    ) -> Result<RunReport, ClinidocError> {
        let kinds = self.registry.resolve(requested)?;
        self.execute_resolved(input, output_dir, &kinds).await
    }

    pub(crate) async fn execute_resolved(
        &self,
        input: &Path,
        output_dir: &Path,
        kinds: &[GenerationKind],
    ) -> Result<RunReport, ClinidocError> {
        let source = resolve_input(input)?;
        fs::create_dir_all(output_dir)?;

        let builder = ReportBuilder::new(input.display().to_string(), output_dir);
        let span = info_span!(
            RUN_SPAN,
            run_id = %builder.run_id(),
            output_dir = %output_dir.display()
        );
        self.run_in_dir(builder, &source, input, output_dir, kinds)
            .instrument(span)
            .await
    }

    async fn run_in_dir(
        &self,
        builder: ReportBuilder,
        source: &Path,
        input: &Path,
        output_dir: &Path,
        kinds: &[GenerationKind],
    ) -> Result<RunReport, ClinidocError> {
        let run_id = builder.run_id();
        let kind_names: Vec<&str> = kinds.iter().map(GenerationKind::as_str).collect();

        info!(
            run_id = %run_id,
            input = %input.display(),
            output_dir = %output_dir.display(),
            kinds = ?kind_names,
            "Starting run"
        );
        self.events
            .emit(
                RUN_STARTED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "input": input.display().to_string(),
                    "output_dir": output_dir.display().to_string(),
                    "kinds": kind_names,
                })),
            )
            .await;

        let fields = self
            .run_extraction(&builder, source, output_dir)
            .await?;

        let tasks: Vec<Task> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| Task::new(StageKind::Generation(kind.clone()), i + 1))
            .collect();

        match fields {
            None => {
                for mut task in tasks {
                    task.skip(EXTRACTION_INCOMPLETE)?;
                    debug!(run_id = %run_id, stage = %task.kind, "Skipping stage");
                    self.emit_stage(STAGE_SKIPPED, &builder, &task).await;
                    builder.record(task)?;
                }
            }
            Some(fields) => {
                let fields = Arc::new(fields);
                let staging_root = output_dir.join(STAGING_DIR).join(run_id.to_string());
                if self.config.concurrent_generation {
                    let mut pending: FuturesUnordered<_> = tasks
                        .into_iter()
                        .map(|task| {
                            self.run_generation(&builder, task, fields.clone(), &staging_root, output_dir)
                        })
                        .collect();
                    while let Some(result) = pending.next().await {
                        result?;
                    }
                } else {
                    for task in tasks {
                        self.run_generation(&builder, task, fields.clone(), &staging_root, output_dir)
                            .await?;
                    }
                }
                remove_if_empty(&staging_root);
                remove_if_empty(&output_dir.join(STAGING_DIR));
            }
        }

        let report = builder.finalize()?;
        if let Err(e) = persist_run_report(&report, &self.config.report) {
            warn!(run_id = %run_id, error = %e, "Failed to write run report");
        }

        let counts = report.counts();
        info!(
            run_id = %run_id,
            completed = counts.completed,
            failed = counts.failed,
            skipped = counts.skipped,
            "Run finished"
        );
        self.events
            .emit(
                RUN_COMPLETED,
                Some(json!({
                    "run_id": run_id.to_string(),
                    "counts": counts,
                    "success_rate": report.success_rate(),
                    "artifacts": report.artifacts().len(),
                })),
            )
            .await;

        Ok(report)
    }

    async fn run_extraction(
        &self,
        builder: &ReportBuilder,
        source: &Path,
        output_dir: &Path,
    ) -> Result<Option<StructuredFields>, ClinidocError> {
        let mut task = Task::new(StageKind::Extraction, 0);
        task.start()?;
        self.emit_stage(STAGE_STARTED, builder, &task).await;

        let extractor = self.extractor.clone();
        let path = source.to_path_buf();
        let options = self.config.extraction.clone();
        let outcome = run_isolated(EXTRACTION_STAGE, self.config.stage_timeout(), async move {
            extractor.extract(&path, &options).await
        })
        .await
        .and_then(|fields| {
            fields.validate()?;
            let artifact = output_dir.join(EXTRACTED_FIELDS_FILE);
            let bytes = serde_json::to_vec_pretty(&fields)
                .map_err(|e| StageError::failed(format!("failed to serialize fields: {e}")))?;
            write_atomic(&artifact, &bytes)?;
            Ok((fields, artifact))
        });

        let fields = match outcome {
            Ok((fields, artifact)) => {
                task.complete(artifact)?;
                builder.set_fields(fields.clone())?;
                info!(
                    run_id = %builder.run_id(),
                    protocol = %StructuredFields::display(fields.protocol_number.as_deref()),
                    "Extraction completed"
                );
                self.emit_stage(STAGE_COMPLETED, builder, &task).await;
                Some(fields)
            }
            Err(e) => {
                task.fail(e.to_string())?;
                error!(run_id = %builder.run_id(), error = %e, "Extraction failed");
                self.emit_stage(STAGE_FAILED, builder, &task).await;
                None
            }
        };

        builder.record(task)?;
        Ok(fields)
    }

    async fn run_generation(
        &self,
        builder: &ReportBuilder,
        mut task: Task,
        fields: Arc<StructuredFields>,
        staging_root: &Path,
        output_dir: &Path,
    ) -> Result<(), ClinidocError> {
        let Some(kind) = task.kind.generation_kind().cloned() else {
            return Err(ClinidocError::InvalidState(
                crate::errors::InvalidStateError::new(format!(
                    "task '{}' is not a generation task",
                    task.task_id
                )),
            ));
        };
        task.start()?;
        self.emit_stage(STAGE_STARTED, builder, &task).await;

        let staging = staging_root.join(kind.as_str());
        let outcome = match self.registry.generator(&kind) {
            None => Err(StageError::failed(format!(
                "no generator registered for '{kind}'"
            ))),
            Some(generator) => match fs::create_dir_all(&staging) {
                Err(e) => Err(StageError::Io(e)),
                Ok(()) => {
                    let options = GenerationOptions {
                        kind: kind.clone(),
                        target_dir: staging.clone(),
                        document_version: self.config.document_version.clone(),
                        settings: self.config.settings_for(&kind),
                    };
                    run_isolated(kind.as_str(), self.config.stage_timeout(), async move {
                        generator.generate(&fields, &options).await
                    })
                    .await
                    .and_then(|artifact| publish(&staging, output_dir, artifact))
                }
            },
        };

        match outcome {
            Ok(artifact) => {
                debug!(
                    run_id = %builder.run_id(),
                    stage = %kind,
                    artifact = %artifact.display(),
                    "Published artifact"
                );
                task.complete(artifact)?;
                self.emit_stage(STAGE_COMPLETED, builder, &task).await;
            }
            Err(e) => {
                task.fail(e.to_string())?;
                warn!(run_id = %builder.run_id(), stage = %kind, error = %e, "Generation failed");
                if self.config.keep_partial_output {
                    remove_if_empty(&staging);
                } else if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    if staging.exists() {
                        warn!(
                            stage = %kind,
                            staging = %staging.display(),
                            error = %cleanup,
                            "Failed to discard partial output"
                        );
                    }
                }
                self.emit_stage(STAGE_FAILED, builder, &task).await;
            }
        }

        builder.record(task)?;
        Ok(())
    }

    async fn emit_stage(&self, event: &str, builder: &ReportBuilder, task: &Task) {
        let mut data = json!({
            "run_id": builder.run_id().to_string(),
            "stage": task.kind.name(),
            "task_id": task.task_id,
            "status": task.status(),
        });
        if let Some(path) = task.output_path() {
            data["output_path"] = json!(path.display().to_string());
        }
        if let Some(error) = task.error() {
            data["error"] = json!(error);
        }
        if let Some(reason) = task.skip_reason() {
            data["reason"] = json!(reason);
        }
        if let Some(ms) = task.duration_ms() {
            data["duration_ms"] = json!(ms);
        }
        self.events.emit(event, Some(data)).await;
    }
}

/// Moves a stage's staged files into the output directory.
///
/// Returns where the reported artifact ended up. A path outside the staging
/// directory is returned unchanged.
fn publish(staging: &Path, output_dir: &Path, artifact: PathBuf) -> Result<PathBuf, StageError> {
    if !artifact.exists() {
        return Err(StageError::MissingArtifact(artifact));
    }
    publish_dir_contents(staging, output_dir)?;
    fs::remove_dir_all(staging)?;

    Ok(match artifact.strip_prefix(staging) {
        Ok(relative) => output_dir.join(relative),
        Err(_) => artifact,
    })
}

/// Removes `dir` if it exists and is empty.
fn remove_if_empty(dir: &Path) {
    match fs::read_dir(dir) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                debug!(dir = %dir.display(), "Keeping non-empty staging directory");
                return;
            }
        }
        Err(_) => return,
    }
    if let Err(e) = fs::remove_dir(dir) {
        warn!(dir = %dir.display(), error = %e, "Failed to remove staging directory");
    }
}
