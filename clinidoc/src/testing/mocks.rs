//! Mock collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::ExtractionOptions;
use crate::core::StructuredFields;
use crate::errors::StageError;
use crate::stages::{Extractor, GenerationOptions, Generator};

/// An extractor returning a fixed set of fields.
#[derive(Debug)]
pub struct StaticExtractor {
    fields: StructuredFields,
    calls: AtomicUsize,
}

impl StaticExtractor {
    /// Creates an extractor that always returns `fields`.
    #[must_use]
    pub fn new(fields: StructuredFields) -> Self {
        Self {
            fields,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the number of times the extractor was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for StaticExtractor {
    async fn extract(
        &self,
        _source: &Path,
        _options: &ExtractionOptions,
    ) -> Result<StructuredFields, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.fields.clone())
    }
}

/// An extractor that always fails.
#[derive(Debug)]
pub struct FailingExtractor {
    error: String,
}

impl FailingExtractor {
    /// Creates a failing extractor.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[async_trait]
impl Extractor for FailingExtractor {
    async fn extract(
        &self,
        _source: &Path,
        _options: &ExtractionOptions,
    ) -> Result<StructuredFields, StageError> {
        Err(StageError::failed(self.error.clone()))
    }
}

/// A recorded generator invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCall {
    /// Kind being generated.
    pub kind: String,
    /// Directory the generator was asked to write into.
    pub target_dir: PathBuf,
    /// Protocol number seen in the fields.
    pub protocol_number: Option<String>,
}

fn write_artifact(fields: &StructuredFields, options: &GenerationOptions) -> Result<PathBuf, StageError> {
    let path = options.target_dir.join(format!(
        "{}_{}.md",
        options.kind.as_str().to_ascii_uppercase(),
        fields.artifact_stem()
    ));
    std::fs::write(&path, format!("# {}\n", options.kind))?;
    Ok(path)
}

/// A generator that writes `<KIND>_<protocol>.md` and records each call.
#[derive(Debug, Default)]
pub struct ArtifactGenerator {
    calls: Mutex<Vec<GenerationCall>>,
}

impl ArtifactGenerator {
    /// Creates a new artifact generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Generator for ArtifactGenerator {
    async fn generate(
        &self,
        fields: &StructuredFields,
        options: &GenerationOptions,
    ) -> Result<PathBuf, StageError> {
        self.calls.lock().push(GenerationCall {
            kind: options.kind.as_str().to_string(),
            target_dir: options.target_dir.clone(),
            protocol_number: fields.protocol_number.clone(),
        });
        write_artifact(fields, options)
    }
}

/// A generator that always fails with a fixed message.
#[derive(Debug)]
pub struct FailingGenerator {
    error: String,
}

impl FailingGenerator {
    /// Creates a failing generator.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(
        &self,
        _fields: &StructuredFields,
        _options: &GenerationOptions,
    ) -> Result<PathBuf, StageError> {
        Err(StageError::failed(self.error.clone()))
    }
}

/// A generator that sleeps before writing its artifact.
#[derive(Debug)]
pub struct SlowGenerator {
    delay: Duration,
}

impl SlowGenerator {
    /// Creates a slow generator.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Creates a slow generator with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }
}

#[async_trait]
impl Generator for SlowGenerator {
    async fn generate(
        &self,
        fields: &StructuredFields,
        options: &GenerationOptions,
    ) -> Result<PathBuf, StageError> {
        tokio::time::sleep(self.delay).await;
        write_artifact(fields, options)
    }
}

/// A generator that panics.
#[derive(Debug)]
pub struct PanickingGenerator {
    message: String,
}

impl PanickingGenerator {
    /// Creates a panicking generator.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Generator for PanickingGenerator {
    async fn generate(
        &self,
        _fields: &StructuredFields,
        _options: &GenerationOptions,
    ) -> Result<PathBuf, StageError> {
        panic!("{}", self.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GenerationKind;

    fn options(dir: &Path, kind: &str) -> GenerationOptions {
        GenerationOptions::new(GenerationKind::new(kind).unwrap(), dir)
    }

    #[tokio::test]
    async fn test_static_extractor_counts_calls() {
        let extractor = StaticExtractor::new(StructuredFields::new().with_protocol_number("P-1"));
        let fields = extractor
            .extract(Path::new("p.txt"), &ExtractionOptions::default())
            .await
            .unwrap();
        assert_eq!(fields.protocol_number.as_deref(), Some("P-1"));
        assert_eq!(extractor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_artifact_generator_writes_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ArtifactGenerator::new();
        let fields = StructuredFields::new().with_protocol_number("P-1");

        let path = generator
            .generate(&fields, &options(dir.path(), "crf"))
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("CRF_P-1.md"));
        assert!(path.is_file());
        assert_eq!(generator.calls()[0].kind, "crf");
        assert_eq!(generator.calls()[0].protocol_number.as_deref(), Some("P-1"));
    }

    #[tokio::test]
    async fn test_failing_generator() {
        let dir = tempfile::tempdir().unwrap();
        let err = FailingGenerator::new("template missing")
            .generate(&StructuredFields::new(), &options(dir.path(), "dvp"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "template missing");
    }

    #[tokio::test]
    async fn test_slow_generator() {
        let dir = tempfile::tempdir().unwrap();
        let start = std::time::Instant::now();
        SlowGenerator::with_delay_ms(10)
            .generate(&StructuredFields::new(), &options(dir.path(), "dmp"))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }
}
