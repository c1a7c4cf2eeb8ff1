//! Structured fields produced by the extraction stage.
//!
//! Extraction collaborators often hand back loosely typed dictionaries. They
//! are converted into [`StructuredFields`] once, validated at the
//! extraction/generation boundary, and trusted by every generator after
//! that.

use crate::errors::StageError;
use crate::utils::sanitize_file_stem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current version of the structured field schema.
pub const FIELDS_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    FIELDS_SCHEMA_VERSION
}

/// Key study information extracted from a protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredFields {
    /// Schema version these fields were produced against.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Full study title.
    #[serde(default)]
    pub study_title: Option<String>,
    /// Protocol number / identifier.
    #[serde(default)]
    pub protocol_number: Option<String>,
    /// Sponsoring organisation.
    #[serde(default)]
    pub sponsor: Option<String>,
    /// Trial phase.
    #[serde(default)]
    pub phase: Option<String>,
    /// Study design summary.
    #[serde(default)]
    pub study_design: Option<String>,
    /// Target population / indication.
    #[serde(default)]
    pub target_population: Option<String>,
    /// Planned sample size.
    #[serde(default)]
    pub sample_size: Option<String>,
    /// Visit schedule entries.
    #[serde(default)]
    pub visit_schedule: Vec<String>,
    /// Primary endpoints.
    #[serde(default)]
    pub primary_endpoints: Vec<String>,
    /// Secondary endpoints.
    #[serde(default)]
    pub secondary_endpoints: Vec<String>,
    /// Inclusion criteria.
    #[serde(default)]
    pub inclusion_criteria: Vec<String>,
    /// Exclusion criteria.
    #[serde(default)]
    pub exclusion_criteria: Vec<String>,
    /// CRF domains the study needs.
    #[serde(default)]
    pub crf_domains: Vec<String>,
    /// Keys not covered by the schema, kept as-is.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

const SCALAR_KEYS: &[&str] = &[
    "study_title",
    "protocol_number",
    "sponsor",
    "phase",
    "study_design",
    "target_population",
    "sample_size",
];

const LIST_KEYS: &[&str] = &[
    "visit_schedule",
    "primary_endpoints",
    "secondary_endpoints",
    "inclusion_criteria",
    "exclusion_criteria",
    "crf_domains",
];

impl StructuredFields {
    /// Creates an empty field set at the current schema version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema_version: FIELDS_SCHEMA_VERSION,
            ..Default::default()
        }
    }

    /// Sets the study title.
    #[must_use]
    pub fn with_study_title(mut self, title: impl Into<String>) -> Self {
        self.study_title = Some(title.into());
        self
    }

    /// Sets the protocol number.
    #[must_use]
    pub fn with_protocol_number(mut self, number: impl Into<String>) -> Self {
        self.protocol_number = Some(number.into());
        self
    }

    /// Sets the sponsor.
    #[must_use]
    pub fn with_sponsor(mut self, sponsor: impl Into<String>) -> Self {
        self.sponsor = Some(sponsor.into());
        self
    }

    /// Sets the phase.
    #[must_use]
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(phase.into());
        self
    }

    /// Builds fields from a loosely typed dictionary.
    ///
    /// Scalar keys accept strings or numbers. List keys accept an array or a
    /// single `;`-separated string. Unknown keys land in `extra`. A missing
    /// `schema_version` means the current version.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::InvalidFields`] if the value is not an object or a
    /// known key has an unusable type.
    pub fn from_value(value: serde_json::Value) -> Result<Self, StageError> {
        let serde_json::Value::Object(map) = value else {
            return Err(StageError::InvalidFields(
                "expected a JSON object of fields".to_string(),
            ));
        };

        let mut fields = Self::new();
        for (key, value) in map {
            let key = key.trim().to_ascii_lowercase();
            if key == "schema_version" {
                fields.schema_version = value
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| {
                        StageError::InvalidFields("schema_version must be an integer".to_string())
                    })?;
            } else if SCALAR_KEYS.contains(&key.as_str()) {
                let text = scalar_text(&key, &value)?;
                fields.set_scalar(&key, text);
            } else if LIST_KEYS.contains(&key.as_str()) {
                let items = list_items(&key, &value)?;
                fields.set_list(&key, items);
            } else {
                fields.extra.insert(key, value);
            }
        }
        Ok(fields)
    }

    pub(crate) fn set_scalar(&mut self, key: &str, value: Option<String>) {
        let slot = match key {
            "study_title" => &mut self.study_title,
            "protocol_number" => &mut self.protocol_number,
            "sponsor" => &mut self.sponsor,
            "phase" => &mut self.phase,
            "study_design" => &mut self.study_design,
            "target_population" => &mut self.target_population,
            "sample_size" => &mut self.sample_size,
            _ => return,
        };
        *slot = value;
    }

    pub(crate) fn set_list(&mut self, key: &str, items: Vec<String>) {
        let slot = match key {
            "visit_schedule" => &mut self.visit_schedule,
            "primary_endpoints" => &mut self.primary_endpoints,
            "secondary_endpoints" => &mut self.secondary_endpoints,
            "inclusion_criteria" => &mut self.inclusion_criteria,
            "exclusion_criteria" => &mut self.exclusion_criteria,
            "crf_domains" => &mut self.crf_domains,
            _ => return,
        };
        *slot = items;
    }

    /// Current value of a scalar schema key.
    #[must_use]
    pub fn scalar(&self, key: &str) -> Option<&str> {
        match key {
            "study_title" => self.study_title.as_deref(),
            "protocol_number" => self.protocol_number.as_deref(),
            "sponsor" => self.sponsor.as_deref(),
            "phase" => self.phase.as_deref(),
            "study_design" => self.study_design.as_deref(),
            "target_population" => self.target_population.as_deref(),
            "sample_size" => self.sample_size.as_deref(),
            _ => None,
        }
    }

    /// Returns true if `key` is a schema key.
    #[must_use]
    pub fn is_known_key(key: &str) -> bool {
        SCALAR_KEYS.contains(&key) || LIST_KEYS.contains(&key)
    }

    /// Returns true if `key` is a list-valued schema key.
    #[must_use]
    pub fn is_list_key(key: &str) -> bool {
        LIST_KEYS.contains(&key)
    }

    /// Validates the fields against the schema.
    ///
    /// # Errors
    ///
    /// Fails on a schema version mismatch, or when neither a protocol number
    /// nor a study title is present.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.schema_version != FIELDS_SCHEMA_VERSION {
            return Err(StageError::InvalidFields(format!(
                "unsupported schema version {} (expected {})",
                self.schema_version, FIELDS_SCHEMA_VERSION
            )));
        }
        if is_blank(self.protocol_number.as_deref()) && is_blank(self.study_title.as_deref()) {
            return Err(StageError::InvalidFields(
                "neither protocol_number nor study_title was extracted".to_string(),
            ));
        }
        Ok(())
    }

    /// File-name-safe stem derived from the protocol number.
    #[must_use]
    pub fn artifact_stem(&self) -> String {
        sanitize_file_stem(self.protocol_number.as_deref().unwrap_or_default(), "UNKNOWN")
    }

    /// Returns a display value for a scalar, or `N/A`.
    #[must_use]
    pub fn display(value: Option<&str>) -> &str {
        match value {
            Some(v) if !v.trim().is_empty() => v,
            _ => "N/A",
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn scalar_text(key: &str, value: &serde_json::Value) -> Result<Option<String>, StageError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s.trim().to_string()).filter(|s| !s.is_empty())),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        _ => Err(StageError::InvalidFields(format!(
            "field '{key}' must be a string"
        ))),
    }
}

fn list_items(key: &str, value: &serde_json::Value) -> Result<Vec<String>, StageError> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::String(s) => Ok(split_list(s)),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => {
                    let s = s.trim();
                    (!s.is_empty()).then(|| Ok(s.to_string()))
                }
                serde_json::Value::Number(n) => Some(Ok(n.to_string())),
                _ => Some(Err(StageError::InvalidFields(format!(
                    "field '{key}' must contain strings"
                )))),
            })
            .collect(),
        _ => Err(StageError::InvalidFields(format!(
            "field '{key}' must be a list"
        ))),
    }
}

/// The schema key spelled `key`, if there is one.
pub(crate) fn canonical_key(key: &str) -> Option<&'static str> {
    SCALAR_KEYS.iter().chain(LIST_KEYS).find(|k| **k == key).copied()
}

/// Splits a `;`-separated list, dropping empty entries.
pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_value_loose_dictionary() {
        let fields = StructuredFields::from_value(json!({
            "study_title": "  A Phase II Study  ",
            "Protocol_Number": "ABC/123",
            "sample_size": 120,
            "crf_domains": "Demographics; Vital Signs;",
            "primary_endpoints": ["ORR", null, ""],
            "site_count": 14
        }))
        .unwrap();

        assert_eq!(fields.study_title.as_deref(), Some("A Phase II Study"));
        assert_eq!(fields.protocol_number.as_deref(), Some("ABC/123"));
        assert_eq!(fields.sample_size.as_deref(), Some("120"));
        assert_eq!(fields.crf_domains, vec!["Demographics", "Vital Signs"]);
        assert_eq!(fields.primary_endpoints, vec!["ORR"]);
        assert_eq!(fields.extra.get("site_count"), Some(&json!(14)));
        assert_eq!(fields.schema_version, FIELDS_SCHEMA_VERSION);
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        let err = StructuredFields::from_value(json!(["a"])).unwrap_err();
        assert!(matches!(err, StageError::InvalidFields(_)));
    }

    #[test]
    fn test_from_value_rejects_bad_types() {
        assert!(StructuredFields::from_value(json!({"sponsor": {"name": "x"}})).is_err());
        assert!(StructuredFields::from_value(json!({"crf_domains": 3})).is_err());
        assert!(StructuredFields::from_value(json!({"schema_version": "one"})).is_err());
    }

    #[test]
    fn test_validate() {
        assert!(StructuredFields::new().validate().is_err());
        assert!(StructuredFields::new().with_study_title("T").validate().is_ok());
        assert!(StructuredFields::new().with_protocol_number("P-1").validate().is_ok());

        let mut future = StructuredFields::new().with_protocol_number("P-1");
        future.schema_version = 2;
        let err = future.validate().unwrap_err();
        assert!(err.to_string().contains("schema version 2"));
    }

    #[test]
    fn test_artifact_stem() {
        assert_eq!(
            StructuredFields::new().with_protocol_number("ABC/123").artifact_stem(),
            "ABC_123"
        );
        assert_eq!(StructuredFields::new().artifact_stem(), "UNKNOWN");
    }

    #[test]
    fn test_serde_roundtrip_keeps_extra() {
        let mut fields = StructuredFields::new().with_protocol_number("P-1");
        fields.extra.insert("note".to_string(), json!("x"));
        let value = serde_json::to_value(&fields).unwrap();
        let back: StructuredFields = serde_json::from_value(value).unwrap();
        assert_eq!(back, fields);
    }
}
