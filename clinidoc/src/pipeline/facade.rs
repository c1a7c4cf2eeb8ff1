//! The public entry point bundling collaborators, registry and configuration.

use super::{BatchController, OutputRootPolicy, RunController, StageRegistry};
use crate::cancellation::CancellationToken;
use crate::collaborators::{standard_registry, TextFieldExtractor};
use crate::config::PipelineConfig;
use crate::errors::Result;
use crate::events::{EventSink, LoggingEventSink};
use crate::report::{BatchReport, RunReport};
use crate::stages::Extractor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Exit status for a fully successful run or batch.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status when any stage or input did not complete.
pub const EXIT_FAILURE: i32 = 1;

/// A configured pipeline.
///
/// # Example
///
/// ```no_run
/// use clinidoc::prelude::*;
///
/// # async fn example() -> clinidoc::errors::Result<()> {
/// let pipeline = Pipeline::standard(PipelineConfig::default())?;
/// let report = pipeline
///     .run_single("protocol.txt", "output_protocol", &["crf", "dvp"])
///     .await?;
/// let code = Pipeline::exit_code_for_run(&report);
/// # let _ = code;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    extractor: Arc<dyn Extractor>,
    registry: Arc<StageRegistry>,
    config: Arc<PipelineConfig>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("extractor", &self.extractor)
            .field("kinds", &self.registry.known_kinds())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline with default configuration and logging events.
    #[must_use]
    pub fn new(extractor: Arc<dyn Extractor>, registry: StageRegistry) -> Self {
        Self {
            extractor,
            registry: Arc::new(registry),
            config: Arc::new(PipelineConfig::default()),
            events: Arc::new(LoggingEventSink::default()),
        }
    }

    /// A pipeline using the bundled text extractor and outline generators.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn standard(config: PipelineConfig) -> Result<Self> {
        Self::new(Arc::new(TextFieldExtractor::new()), standard_registry()).with_config(config)
    }

    /// Replaces the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    pub fn with_config(mut self, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        self.config = Arc::new(config);
        Ok(self)
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Registered generation kinds.
    #[must_use]
    pub fn known_kinds(&self) -> Vec<String> {
        self.registry.known_kinds()
    }

    fn run_controller(&self) -> RunController {
        RunController::new(
            self.extractor.clone(),
            self.registry.clone(),
            self.config.clone(),
            self.events.clone(),
        )
    }

    /// Runs one input.
    ///
    /// # Errors
    ///
    /// Returns an error only when the request is rejected before any stage
    /// runs. Stage failures are reported in the [`RunReport`].
    pub async fn run_single<S: AsRef<str>>(
        &self,
        input: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        kinds: &[S],
    ) -> Result<RunReport> {
        self.run_controller()
            .execute(input.as_ref(), output_dir.as_ref(), kinds)
            .await
    }

    /// Runs a batch of inputs under `output_root`.
    ///
    /// # Errors
    ///
    /// See [`BatchController::execute_all`].
    pub async fn run_batch<S: AsRef<str>>(
        &self,
        inputs: &[PathBuf],
        output_root: impl AsRef<Path>,
        kinds: &[S],
    ) -> Result<BatchReport> {
        self.run_batch_with_cancel(inputs, output_root, kinds, &CancellationToken::new())
            .await
    }

    /// Runs a batch that stops scheduling inputs once `cancel` fires.
    ///
    /// # Errors
    ///
    /// See [`BatchController::execute_all`].
    pub async fn run_batch_with_cancel<S: AsRef<str>>(
        &self,
        inputs: &[PathBuf],
        output_root: impl AsRef<Path>,
        kinds: &[S],
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        let policy = OutputRootPolicy::new(output_root.as_ref());
        BatchController::new(self.run_controller(), self.events.clone())
            .execute_all(inputs, kinds, &policy, cancel)
            .await
    }

    /// 0 when every requested stage completed, 1 otherwise.
    #[must_use]
    pub fn exit_code_for_run(report: &RunReport) -> i32 {
        if report.all_completed() {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        }
    }

    /// 0 when every input ran and every stage of every run completed.
    #[must_use]
    pub fn exit_code_for_batch(report: &BatchReport) -> i32 {
        if report.all_completed() {
            EXIT_SUCCESS
        } else {
            EXIT_FAILURE
        }
    }
}
