//! Lifecycle events emitted by the controllers.
//!
//! Events complement `tracing` logs: they carry structured payloads that a
//! front-end can use to show progress without parsing log lines.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// A run began.
pub const RUN_STARTED: &str = "run.started";
/// A run finished and its report was finalized.
pub const RUN_COMPLETED: &str = "run.completed";
/// A stage began executing.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage produced its artifact.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// A stage was skipped.
pub const STAGE_SKIPPED: &str = "stage.skipped";
/// A batch began.
pub const BATCH_STARTED: &str = "batch.started";
/// A batch input could not be resolved.
pub const BATCH_INPUT_FAILED_TO_START: &str = "batch.input.failed_to_start";
/// A batch stopped scheduling inputs after cancellation.
pub const BATCH_CANCELLED: &str = "batch.cancelled";
/// A batch finished.
pub const BATCH_COMPLETED: &str = "batch.completed";
