//! # Clinidoc
//!
//! Pipeline orchestration for clinical-trial document generation.
//!
//! A run takes one protocol document, extracts structured study fields from it
//! exactly once, and then generates any subset of document artifacts from those
//! fields:
//!
//! - **Stage tracking**: every stage is a task with a strict status lifecycle
//! - **Failure isolation**: a failing, panicking or slow generator never affects its siblings
//! - **Run reports**: counts derived from the task list, rendered as JSON and text
//! - **Batch processing**: many inputs, one output directory each, cooperative cancellation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clinidoc::prelude::*;
//!
//! # async fn demo() -> clinidoc::errors::Result<()> {
//! let pipeline = Pipeline::standard(PipelineConfig::default())?;
//! let report = pipeline
//!     .run_single("protocol.txt", "out", &["crf", "dvp"])
//!     .await?;
//! println!("{}", report.to_narrative());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod collaborators;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod helpers;
pub mod pipeline;
pub mod report;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::collaborators::{
        standard_registry, DocumentOutline, OutlineGenerator, TextFieldExtractor,
    };
    pub use crate::config::{ExtractionOptions, PipelineConfig, ReportConfig};
    pub use crate::core::{GenerationKind, StageKind, StructuredFields, Task, TaskStatus};
    pub use crate::errors::{
        ClinidocError, ConfigError, InvalidStateError, PipelineValidationError, StageError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{Pipeline, StageRegistry, EXIT_FAILURE, EXIT_SUCCESS};
    pub use crate::report::{BatchReport, RunReport, TaskCounts};
    pub use crate::stages::{Extractor, GenerationOptions, Generator};
    pub use crate::utils::{iso_timestamp, Timestamp};
}
