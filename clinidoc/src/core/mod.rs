//! Core domain model types for clinidoc.
//!
//! This module contains the fundamental types used throughout the pipeline:
//! - Task status and stage kind types
//! - The task record and its state machine
//! - Structured fields produced by extraction

mod fields;
mod status;
mod task;

pub use fields::{StructuredFields, FIELDS_SCHEMA_VERSION};
pub(crate) use fields::{canonical_key, split_list};
pub use status::{GenerationKind, StageKind, TaskStatus, EXTRACTION_STAGE};
pub use task::Task;
