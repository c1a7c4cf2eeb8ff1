//! Pipeline configuration.
//!
//! Configuration is an explicit value handed to the controllers and passed
//! on to every collaborator call. Nothing here is read from global state.

use crate::core::GenerationKind;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Options for the extraction collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionOptions {
    /// Maximum number of pages (or units) to read from large inputs.
    #[serde(default)]
    pub max_pages: Option<usize>,
}

impl ExtractionOptions {
    /// Limits extraction to the first `pages` pages.
    #[must_use]
    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = Some(pages);
        self
    }
}

/// Names of the persisted report files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// File name of the structured (JSON) report.
    #[serde(default = "default_json_file_name")]
    pub json_file_name: String,
    /// File name of the narrative (text) report.
    #[serde(default = "default_text_file_name")]
    pub text_file_name: String,
}

fn default_json_file_name() -> String {
    "run_report.json".to_string()
}

fn default_text_file_name() -> String {
    "run_report.txt".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            json_file_name: default_json_file_name(),
            text_file_name: default_text_file_name(),
        }
    }
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-stage timeout in seconds. `None` disables the timeout.
    #[serde(default)]
    pub stage_timeout_seconds: Option<f64>,
    /// Options for the extraction stage.
    #[serde(default)]
    pub extraction: ExtractionOptions,
    /// Run generation stages concurrently.
    #[serde(default = "default_concurrent_generation")]
    pub concurrent_generation: bool,
    /// Keep the staging directory of a failed generation stage.
    #[serde(default = "default_keep_partial_output")]
    pub keep_partial_output: bool,
    /// Version label stamped on generated documents.
    #[serde(default = "default_document_version")]
    pub document_version: String,
    /// Per-kind generation settings, keyed by kind name.
    #[serde(default)]
    pub generation: HashMap<String, serde_json::Value>,
    /// Report file naming.
    #[serde(default)]
    pub report: ReportConfig,
}

fn default_concurrent_generation() -> bool {
    true
}

fn default_keep_partial_output() -> bool {
    true
}

fn default_document_version() -> String {
    "1.0".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stage_timeout_seconds: None,
            extraction: ExtractionOptions::default(),
            concurrent_generation: default_concurrent_generation(),
            keep_partial_output: default_keep_partial_output(),
            document_version: default_document_version(),
            generation: HashMap::new(),
            report: ReportConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses and validates a JSON configuration string.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secs) = self.stage_timeout_seconds {
            if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::InvalidValue {
                    field: "stage_timeout_seconds".to_string(),
                    message: format!("must be a positive number of seconds, got {secs}"),
                });
            }
        }
        if self.extraction.max_pages == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "extraction.max_pages".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        for key in self.generation.keys() {
            GenerationKind::new(key).map_err(|e| ConfigError::InvalidValue {
                field: format!("generation.{key}"),
                message: e.message,
            })?;
        }
        if self.report.json_file_name.trim().is_empty()
            || self.report.text_file_name.trim().is_empty()
            || self.report.json_file_name == self.report.text_file_name
        {
            return Err(ConfigError::InvalidValue {
                field: "report".to_string(),
                message: "report file names must be non-empty and distinct".to_string(),
            });
        }
        Ok(())
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout_seconds = Some(timeout.as_secs_f64());
        self
    }

    /// Sets the extraction page limit.
    #[must_use]
    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.extraction.max_pages = Some(pages);
        self
    }

    /// Runs generation stages one after another.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.concurrent_generation = false;
        self
    }

    /// Controls whether failed staging output is kept.
    #[must_use]
    pub fn with_keep_partial_output(mut self, keep: bool) -> Self {
        self.keep_partial_output = keep;
        self
    }

    /// Sets settings for one generation kind.
    #[must_use]
    pub fn with_generation_settings(mut self, kind: impl Into<String>, settings: serde_json::Value) -> Self {
        self.generation.insert(kind.into(), settings);
        self
    }

    /// Gets the stage timeout as a Duration.
    ///
    /// A value [`validate`](Self::validate) would reject yields `None`.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Settings for one generation kind, or `null`.
    #[must_use]
    pub fn settings_for(&self, kind: &GenerationKind) -> serde_json::Value {
        self.generation
            .get(kind.as_str())
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!(config.concurrent_generation);
        assert!(config.keep_partial_output);
        assert_eq!(config.document_version, "1.0");
        assert_eq!(config.report.json_file_name, "run_report.json");
        assert!(config.stage_timeout().is_none());
    }

    #[test]
    fn test_from_json_str_partial() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "stage_timeout_seconds": 2.5,
                "extraction": {"max_pages": 30},
                "generation": {"crf": {"title": "Case Report Form"}}
            }"#,
        )
        .unwrap();

        assert_eq!(config.stage_timeout(), Some(Duration::from_millis(2500)));
        assert_eq!(config.extraction.max_pages, Some(30));
        assert!(config.concurrent_generation);
        let crf = GenerationKind::new("crf").unwrap();
        assert_eq!(config.settings_for(&crf), json!({"title": "Case Report Form"}));
        let dvp = GenerationKind::new("dvp").unwrap();
        assert_eq!(config.settings_for(&dvp), serde_json::Value::Null);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(PipelineConfig::from_json_str(r#"{"stage_timeout_seconds": 0}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"stage_timeout_seconds": -3}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"extraction": {"max_pages": 0}}"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{"generation": {"User Guide": {}}}"#).is_err());
        assert!(PipelineConfig::from_json_str(
            r#"{"report": {"json_file_name": "r.txt", "text_file_name": "r.txt"}}"#
        )
        .is_err());
        assert!(matches!(
            PipelineConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file_missing() {
        let err = PipelineConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_rejects_timeout_too_large_for_duration() {
        let err = PipelineConfig::from_json_str(r#"{"stage_timeout_seconds": 1e300}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "stage_timeout_seconds"
        ));

        let mut config = PipelineConfig::new();
        config.stage_timeout_seconds = Some(1e300);
        assert!(config.validate().is_err());
        assert!(config.stage_timeout().is_none());
    }
}
