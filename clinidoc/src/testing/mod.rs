//! Testing utilities for clinidoc pipelines.
//!
//! This module provides:
//! - Mock extractors and generators
//! - Sample protocol fixtures
//! - Assertions over run reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_all_completed, assert_artifact_exists, assert_counts, assert_generation_skipped,
    assert_task_status,
};
pub use fixtures::{registry_with, sample_fields, write_input, SAMPLE_PROTOCOL};
pub use mocks::{
    ArtifactGenerator, FailingExtractor, FailingGenerator, GenerationCall, PanickingGenerator,
    SlowGenerator, StaticExtractor,
};
