//! Bundled extraction and generation collaborators.
//!
//! These make the pipeline usable end to end without an external service:
//! a labelled-text extractor and a Markdown outline per standard document.

mod outline_generator;
mod text_extractor;

pub use outline_generator::{DocumentOutline, OutlineGenerator};
pub use text_extractor::{limit_pages, parse_labelled_text, TextFieldExtractor, PAGE_BREAK};

use crate::pipeline::StageRegistry;
use std::sync::Arc;
use tracing::error;

/// A registry with the `crf`, `dvp`, `user_guide` and `dmp` outline
/// generators.
#[must_use]
pub fn standard_registry() -> StageRegistry {
    let mut registry = StageRegistry::new();
    for outline in DocumentOutline::ALL {
        if let Err(e) = registry.register(outline.kind(), Arc::new(OutlineGenerator::new(outline))) {
            error!(kind = outline.kind(), error = %e, "Failed to register standard generator");
        }
    }
    registry
}
