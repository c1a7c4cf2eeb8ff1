//! Pipeline orchestration.
//!
//! This module provides:
//! - The stage registry resolving requested generation kinds
//! - The run controller driving one input through its stages
//! - The batch controller processing many inputs in sequence
//! - The [`Pipeline`] facade used by front-ends

mod batch;
mod facade;
mod registry;
mod run;

pub use batch::{BatchController, OutputRootPolicy};
pub use facade::{Pipeline, EXIT_FAILURE, EXIT_SUCCESS};
pub use registry::StageRegistry;
pub use run::{
    resolve_input, RunController, EXTRACTED_FIELDS_FILE, EXTRACTION_INCOMPLETE, RUN_SPAN,
    STAGING_DIR,
};
