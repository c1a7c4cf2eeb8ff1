//! Markdown outline generators for the standard document kinds.

use crate::core::StructuredFields;
use crate::errors::StageError;
use crate::stages::{GenerationOptions, Generator};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;

/// The standard clinical documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentOutline {
    /// Case report form.
    Crf,
    /// Data validation plan.
    Dvp,
    /// EDC user guide for site staff.
    UserGuide,
    /// Data management plan.
    Dmp,
}

impl DocumentOutline {
    /// All standard documents, in registration order.
    pub const ALL: [Self; 4] = [Self::Crf, Self::Dvp, Self::UserGuide, Self::Dmp];

    /// The generation kind name.
    #[must_use]
    pub fn kind(self) -> &'static str {
        match self {
            Self::Crf => "crf",
            Self::Dvp => "dvp",
            Self::UserGuide => "user_guide",
            Self::Dmp => "dmp",
        }
    }

    /// File name prefix of the artifact.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Crf => "CRF",
            Self::Dvp => "DVP",
            Self::UserGuide => "UserGuide",
            Self::Dmp => "DMP",
        }
    }

    /// Title used when no `title` setting is configured.
    #[must_use]
    pub fn default_title(self) -> &'static str {
        match self {
            Self::Crf => "Case Report Form",
            Self::Dvp => "Data Validation Plan",
            Self::UserGuide => "EDC User Guide",
            Self::Dmp => "Data Management Plan",
        }
    }

    fn sections(self, fields: &StructuredFields) -> Vec<(&'static str, Vec<String>)> {
        let overview = || {
            vec![
                format!("Design: {}", StructuredFields::display(fields.study_design.as_deref())),
                format!(
                    "Population: {}",
                    StructuredFields::display(fields.target_population.as_deref())
                ),
                format!(
                    "Sample size: {}",
                    StructuredFields::display(fields.sample_size.as_deref())
                ),
            ]
        };

        match self {
            Self::Crf => vec![
                ("CRF Domains", fields.crf_domains.clone()),
                ("Visit Schedule", fields.visit_schedule.clone()),
                ("Inclusion Criteria", fields.inclusion_criteria.clone()),
                ("Exclusion Criteria", fields.exclusion_criteria.clone()),
            ],
            Self::Dvp => vec![
                ("Primary Endpoints", fields.primary_endpoints.clone()),
                ("Secondary Endpoints", fields.secondary_endpoints.clone()),
                (
                    "Edit Checks",
                    fields
                        .crf_domains
                        .iter()
                        .map(|d| format!("{d}: required fields, ranges and cross-form consistency"))
                        .collect(),
                ),
                (
                    "Visit Window Checks",
                    fields
                        .visit_schedule
                        .iter()
                        .map(|v| format!("{v}: visit date within protocol window"))
                        .collect(),
                ),
            ],
            Self::UserGuide => vec![
                ("Study Overview", overview()),
                ("Visit Schedule", fields.visit_schedule.clone()),
                ("Forms", fields.crf_domains.clone()),
            ],
            Self::Dmp => vec![
                ("Study Overview", overview()),
                ("Primary Endpoints", fields.primary_endpoints.clone()),
                ("Secondary Endpoints", fields.secondary_endpoints.clone()),
                ("Data Collection", fields.crf_domains.clone()),
            ],
        }
    }

    /// Renders the outline as Markdown.
    #[must_use]
    pub fn render(self, fields: &StructuredFields, title: &str, version: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {title}");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "- Study: {}",
            StructuredFields::display(fields.study_title.as_deref())
        );
        let _ = writeln!(
            out,
            "- Protocol: {}",
            StructuredFields::display(fields.protocol_number.as_deref())
        );
        let _ = writeln!(
            out,
            "- Sponsor: {}",
            StructuredFields::display(fields.sponsor.as_deref())
        );
        let _ = writeln!(out, "- Phase: {}", StructuredFields::display(fields.phase.as_deref()));
        let _ = writeln!(out, "- Document version: {version}");

        for (heading, items) in self.sections(fields) {
            let _ = writeln!(out);
            let _ = writeln!(out, "## {heading}");
            let _ = writeln!(out);
            if items.is_empty() {
                let _ = writeln!(out, "- N/A");
            }
            for item in items {
                let _ = writeln!(out, "- {item}");
            }
        }
        out
    }
}

/// Writes `<PREFIX>_<protocol>.md` for one [`DocumentOutline`].
///
/// Honours a `title` string setting from the kind's configuration.
#[derive(Debug, Clone, Copy)]
pub struct OutlineGenerator {
    outline: DocumentOutline,
}

impl OutlineGenerator {
    /// Creates a generator for `outline`.
    #[must_use]
    pub fn new(outline: DocumentOutline) -> Self {
        Self { outline }
    }

    /// The document this generator produces.
    #[must_use]
    pub fn outline(&self) -> DocumentOutline {
        self.outline
    }
}

#[async_trait]
impl Generator for OutlineGenerator {
    async fn generate(
        &self,
        fields: &StructuredFields,
        options: &GenerationOptions,
    ) -> Result<PathBuf, StageError> {
        let title = options
            .setting_str("title")
            .unwrap_or_else(|| self.outline.default_title());
        let body = self.outline.render(fields, title, &options.document_version);

        let path = options.target_dir.join(format!(
            "{}_{}.md",
            self.outline.prefix(),
            fields.artifact_stem()
        ));
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GenerationKind;
    use serde_json::json;

    fn fields() -> StructuredFields {
        let mut fields = StructuredFields::new()
            .with_study_title("A Phase II Study")
            .with_protocol_number("ABC/2025/01")
            .with_sponsor("Acme");
        fields.crf_domains = vec!["AE".to_string(), "VS".to_string()];
        fields
    }

    #[test]
    fn test_render_crf() {
        let text = DocumentOutline::Crf.render(&fields(), "Case Report Form", "1.0");
        assert!(text.starts_with("# Case Report Form\n"));
        assert!(text.contains("- Protocol: ABC/2025/01"));
        assert!(text.contains("- Phase: N/A"));
        assert!(text.contains("## CRF Domains\n\n- AE\n- VS\n"));
        assert!(text.contains("## Visit Schedule\n\n- N/A\n"));
    }

    #[test]
    fn test_render_dvp_derives_checks() {
        let text = DocumentOutline::Dvp.render(&fields(), "DVP", "2.0");
        assert!(text.contains("- AE: required fields"));
        assert!(text.contains("- Document version: 2.0"));
    }

    #[tokio::test]
    async fn test_generate_writes_prefixed_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut options =
            GenerationOptions::new(GenerationKind::new("user_guide").unwrap(), dir.path());
        options.settings = json!({"title": "Site Guide"});

        let path = OutlineGenerator::new(DocumentOutline::UserGuide)
            .generate(&fields(), &options)
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("UserGuide_ABC_2025_01.md"));
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("# Site Guide\n"));
    }

    #[test]
    fn test_kind_names_are_valid() {
        for outline in DocumentOutline::ALL {
            assert!(GenerationKind::new(outline.kind()).is_ok());
        }
    }
}
