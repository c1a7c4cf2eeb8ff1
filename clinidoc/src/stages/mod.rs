//! Collaborator traits for the extraction and generation stages.
//!
//! The orchestrator never reads documents or renders artifacts itself. It
//! calls an [`Extractor`] once per run and one [`Generator`] per requested
//! generation kind.

use crate::config::ExtractionOptions;
use crate::core::{GenerationKind, StructuredFields};
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Options handed to a generator for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// The kind being generated.
    pub kind: GenerationKind,
    /// Directory the artifact must be written into.
    pub target_dir: PathBuf,
    /// Version label for the generated document.
    pub document_version: String,
    /// Kind-specific settings from configuration (`null` when absent).
    pub settings: serde_json::Value,
}

impl GenerationOptions {
    /// Creates options with no kind-specific settings.
    #[must_use]
    pub fn new(kind: GenerationKind, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            target_dir: target_dir.into(),
            document_version: "1.0".to_string(),
            settings: serde_json::Value::Null,
        }
    }

    /// Reads a string setting.
    #[must_use]
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Turns a source input into structured fields.
///
/// From the orchestrator's point of view this must be a pure function of its
/// input and options.
#[async_trait]
pub trait Extractor: Send + Sync + Debug {
    /// Extracts structured fields from `source`.
    async fn extract(
        &self,
        source: &Path,
        options: &ExtractionOptions,
    ) -> Result<StructuredFields, StageError>;
}

/// Produces one document artifact from structured fields.
///
/// The artifact must be written inside `options.target_dir`; the returned
/// path is the file that was written.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync + Debug {
    /// Generates the artifact and returns its path.
    async fn generate(
        &self,
        fields: &StructuredFields,
        options: &GenerationOptions,
    ) -> Result<PathBuf, StageError>;
}

/// A generator backed by a plain function.
pub struct FnGenerator<F>
where
    F: Fn(&StructuredFields, &GenerationOptions) -> Result<PathBuf, StageError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnGenerator<F>
where
    F: Fn(&StructuredFields, &GenerationOptions) -> Result<PathBuf, StageError> + Send + Sync,
{
    /// Creates a new function-based generator.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnGenerator<F>
where
    F: Fn(&StructuredFields, &GenerationOptions) -> Result<PathBuf, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnGenerator")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F> Generator for FnGenerator<F>
where
    F: Fn(&StructuredFields, &GenerationOptions) -> Result<PathBuf, StageError> + Send + Sync,
{
    async fn generate(
        &self,
        fields: &StructuredFields,
        options: &GenerationOptions,
    ) -> Result<PathBuf, StageError> {
        (self.func)(fields, options)
    }
}

/// An extractor backed by a plain function.
pub struct FnExtractor<F>
where
    F: Fn(&Path, &ExtractionOptions) -> Result<StructuredFields, StageError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnExtractor<F>
where
    F: Fn(&Path, &ExtractionOptions) -> Result<StructuredFields, StageError> + Send + Sync,
{
    /// Creates a new function-based extractor.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnExtractor<F>
where
    F: Fn(&Path, &ExtractionOptions) -> Result<StructuredFields, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExtractor")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F> Extractor for FnExtractor<F>
where
    F: Fn(&Path, &ExtractionOptions) -> Result<StructuredFields, StageError> + Send + Sync,
{
    async fn extract(
        &self,
        source: &Path,
        options: &ExtractionOptions,
    ) -> Result<StructuredFields, StageError> {
        (self.func)(source, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_generator() {
        let generator = FnGenerator::new("crf", |fields, options| {
            Ok(options
                .target_dir
                .join(format!("CRF_{}.md", fields.artifact_stem())))
        });
        let fields = StructuredFields::new().with_protocol_number("P-1");
        let options = GenerationOptions::new(GenerationKind::new("crf").unwrap(), "/tmp/out");

        let path = generator.generate(&fields, &options).await.unwrap();
        assert_eq!(path, PathBuf::from("/tmp/out/CRF_P-1.md"));
        assert!(format!("{generator:?}").contains("crf"));
    }

    #[tokio::test]
    async fn test_fn_extractor() {
        let extractor = FnExtractor::new("static", |_source, options| {
            let mut fields = StructuredFields::new().with_study_title("T");
            if let Some(pages) = options.max_pages {
                fields.extra.insert("pages".to_string(), serde_json::json!(pages));
            }
            Ok(fields)
        });
        let options = ExtractionOptions::default().with_max_pages(3);

        let fields = extractor.extract(Path::new("x.txt"), &options).await.unwrap();
        assert_eq!(fields.extra.get("pages"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_generation_options_settings() {
        let mut options = GenerationOptions::new(GenerationKind::new("dvp").unwrap(), "/out");
        assert!(options.setting_str("title").is_none());
        options.settings = serde_json::json!({"title": "Data Validation Plan"});
        assert_eq!(options.setting_str("title"), Some("Data Validation Plan"));
    }
}
