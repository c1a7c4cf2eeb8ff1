//! Test fixtures for pipeline testing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::StructuredFields;
use crate::pipeline::StageRegistry;
use crate::stages::Generator;

/// A labelled-text protocol export covering every schema key.
pub const SAMPLE_PROTOCOL: &str = "\
Study Title: A Randomized, Double-Blind Phase II Study of Drug X
Protocol Number: ABC-2025-001
Sponsor: Acme Pharma
Phase: II
Study Design: Randomized, placebo-controlled
Target Population: Adults with type 2 diabetes
Sample Size: 120
Visit Schedule: Screening; Baseline; Week 4; Week 12
Primary Endpoints: Change in HbA1c at Week 12
Secondary Endpoints: Body weight; Fasting glucose
Inclusion Criteria: Age 18-75; HbA1c 7-10%
Exclusion Criteria: Type 1 diabetes; Pregnancy
CRF Domains: DM; VS; AE; CM; LB
";

/// Fields matching [`SAMPLE_PROTOCOL`]'s headline values.
#[must_use]
pub fn sample_fields() -> StructuredFields {
    let mut fields = StructuredFields::new()
        .with_study_title("A Randomized, Double-Blind Phase II Study of Drug X")
        .with_protocol_number("ABC-2025-001")
        .with_sponsor("Acme Pharma")
        .with_phase("II");
    fields.crf_domains = ["DM", "VS", "AE", "CM", "LB"]
        .iter()
        .map(ToString::to_string)
        .collect();
    fields
}

/// Writes an input file into `dir` and returns its path.
///
/// # Panics
///
/// Panics if the file cannot be written.
#[must_use]
#[allow(clippy::expect_used)]
pub fn write_input(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write test input");
    path
}

/// Builds a registry from `(kind, generator)` pairs.
///
/// # Panics
///
/// Panics if a kind name is invalid.
#[must_use]
#[allow(clippy::expect_used)]
pub fn registry_with(generators: Vec<(&str, Arc<dyn Generator>)>) -> StageRegistry {
    let mut registry = StageRegistry::new();
    for (kind, generator) in generators {
        registry
            .register(kind, generator)
            .expect("invalid test generation kind");
    }
    registry
}
