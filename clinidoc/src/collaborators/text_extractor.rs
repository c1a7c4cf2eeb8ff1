//! Field extraction from plain-text protocol exports.

use crate::config::ExtractionOptions;
use crate::core::{canonical_key, split_list, StructuredFields};
use crate::errors::StageError;
use crate::stages::Extractor;
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// Page separator in text exports of PDF documents.
pub const PAGE_BREAK: char = '\x0c';

const LABEL_ALIASES: &[(&str, &str)] = &[
    ("title", "study_title"),
    ("study", "study_title"),
    ("protocol", "protocol_number"),
    ("protocol_no", "protocol_number"),
    ("protocol_id", "protocol_number"),
    ("protocol_code", "protocol_number"),
    ("design", "study_design"),
    ("population", "target_population"),
    ("indication", "target_population"),
    ("sample", "sample_size"),
    ("enrollment", "sample_size"),
    ("planned_enrollment", "sample_size"),
    ("visits", "visit_schedule"),
    ("schedule", "visit_schedule"),
    ("primary_endpoint", "primary_endpoints"),
    ("secondary_endpoint", "secondary_endpoints"),
    ("inclusion", "inclusion_criteria"),
    ("exclusion", "exclusion_criteria"),
    ("domains", "crf_domains"),
    ("crf_domain", "crf_domains"),
];

#[allow(clippy::expect_used)]
fn label_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 _/.()\-]{0,48}?)\s*:\s*(.+?)\s*$")
            .expect("valid label pattern")
    })
}

#[allow(clippy::expect_used)]
fn code_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*```(?:json)?\s*|\s*```\s*$").expect("valid fence pattern"))
}

/// Maps a free-form label (`Protocol No.`) to a schema key.
fn schema_key(label: &str) -> Option<&'static str> {
    let normalized = label
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    LABEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, key)| *key)
        .or_else(|| canonical_key(&normalized))
}

/// Parses `Key: value` lines into fields.
///
/// The first value seen for a scalar key wins; list keys accumulate.
/// Lines with unrecognised labels are ignored.
#[must_use]
pub fn parse_labelled_text(text: &str) -> StructuredFields {
    let mut fields = StructuredFields::new();
    let mut lists: Vec<(&'static str, Vec<String>)> = Vec::new();

    for line in text.lines() {
        let Some(caps) = label_line().captures(line) else {
            continue;
        };
        let (Some(label), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(key) = schema_key(label.as_str()) else {
            continue;
        };

        if StructuredFields::is_list_key(key) {
            let items = split_list(value.as_str());
            match lists.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => existing.extend(items),
                None => lists.push((key, items)),
            }
        } else if fields.scalar(key).is_none() {
            fields.set_scalar(key, Some(value.as_str().to_string()));
        }
    }

    for (key, items) in lists {
        fields.set_list(key, items);
    }
    fields
}

/// Keeps at most `max_pages` form-feed separated pages.
#[must_use]
pub fn limit_pages(text: &str, max_pages: Option<usize>) -> &str {
    match max_pages {
        None => text,
        Some(0) => "",
        Some(max) => match text.match_indices(PAGE_BREAK).nth(max - 1) {
            Some((cut, _)) => &text[..cut],
            None => text,
        },
    }
}

/// Extracts fields from a UTF-8 text export of a protocol.
///
/// A `.json` source is read as a loose field dictionary instead; a
/// surrounding Markdown code fence is tolerated.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFieldExtractor;

impl TextFieldExtractor {
    /// Creates the extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for TextFieldExtractor {
    async fn extract(
        &self,
        source: &Path,
        options: &ExtractionOptions,
    ) -> Result<StructuredFields, StageError> {
        let raw = tokio::fs::read_to_string(source).await?;

        let is_json = source
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            let body = code_fence().replace_all(&raw, "");
            let value: serde_json::Value = serde_json::from_str(&body)
                .map_err(|e| StageError::InvalidFields(format!("input is not valid JSON: {e}")))?;
            return StructuredFields::from_value(value);
        }

        let text = limit_pages(&raw, options.max_pages);
        debug!(
            source = %source.display(),
            chars = text.len(),
            max_pages = ?options.max_pages,
            "Parsing protocol text"
        );
        Ok(parse_labelled_text(text))
    }
}
