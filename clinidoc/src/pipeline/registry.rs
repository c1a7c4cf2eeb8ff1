//! Registry of generation handlers.

use crate::core::{GenerationKind, StageKind};
use crate::errors::PipelineValidationError;
use crate::stages::Generator;
use std::collections::HashSet;
use std::sync::Arc;

/// Maps generation kinds to the generators that produce them.
///
/// Extraction is fixed and never registered. Every generation stage depends
/// on extraction and on nothing else, so adding a document type is a single
/// [`register`](Self::register) call.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    generators: Vec<(GenerationKind, Arc<dyn Generator>)>,
}

impl StageRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a generator, replacing any earlier one for the same kind.
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is not a valid generation kind name.
    pub fn register(
        &mut self,
        kind: impl AsRef<str>,
        generator: Arc<dyn Generator>,
    ) -> Result<&mut Self, PipelineValidationError> {
        let kind = GenerationKind::new(kind)?;
        match self.generators.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = generator,
            None => self.generators.push((kind, generator)),
        }
        Ok(self)
    }

    /// Builder-style [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// Returns an error if `kind` is not a valid generation kind name.
    pub fn with_generator(
        mut self,
        kind: impl AsRef<str>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, PipelineValidationError> {
        self.register(kind, generator)?;
        Ok(self)
    }

    /// Registered kind names, in registration order.
    #[must_use]
    pub fn known_kinds(&self) -> Vec<String> {
        self.generators
            .iter()
            .map(|(k, _)| k.as_str().to_string())
            .collect()
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.generators.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Returns true if `kind` is registered.
    #[must_use]
    pub fn contains(&self, kind: &GenerationKind) -> bool {
        self.generators.iter().any(|(k, _)| k == kind)
    }

    /// The generator registered for `kind`.
    #[must_use]
    pub fn generator(&self, kind: &GenerationKind) -> Option<Arc<dyn Generator>> {
        self.generators
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, g)| g.clone())
    }

    /// The stages `kind` must wait for. `None` if the kind is not registered.
    #[must_use]
    pub fn dependencies_of(&self, kind: &GenerationKind) -> Option<Vec<StageKind>> {
        self.contains(kind).then(|| vec![StageKind::Extraction])
    }

    /// Validates a request against the registry.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty request or when any requested kind is
    /// not registered. Nothing has run at that point.
    pub fn resolve<S: AsRef<str>>(
        &self,
        requested: &[S],
    ) -> Result<Vec<GenerationKind>, PipelineValidationError> {
        if requested.is_empty() {
            return Err(PipelineValidationError::empty_request());
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        let mut unknown = Vec::new();

        for raw in requested {
            let raw = raw.as_ref();
            match GenerationKind::new(raw) {
                Ok(kind) if self.contains(&kind) => {
                    if seen.insert(kind.clone()) {
                        resolved.push(kind);
                    }
                }
                _ => {
                    if !unknown.iter().any(|u| u == raw) {
                        unknown.push(raw.to_string());
                    }
                }
            }
        }

        if !unknown.is_empty() {
            return Err(PipelineValidationError::unknown_kinds(
                unknown,
                &self.known_kinds(),
            ));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::FnGenerator;

    fn generator(name: &str) -> Arc<dyn Generator> {
        Arc::new(FnGenerator::new(name, |_fields, options| {
            Ok(options.target_dir.join("out.md"))
        }))
    }

    fn registry() -> StageRegistry {
        StageRegistry::new()
            .with_generator("crf", generator("crf"))
            .unwrap()
            .with_generator("dvp", generator("dvp"))
            .unwrap()
    }

    #[test]
    fn test_resolve_dedupes_in_request_order() {
        let kinds = registry().resolve(&["dvp", "crf", "DVP"]).unwrap();
        let names: Vec<_> = kinds.iter().map(GenerationKind::as_str).collect();
        assert_eq!(names, vec!["dvp", "crf"]);
    }

    #[test]
    fn test_resolve_rejects_empty_request() {
        let empty: [&str; 0] = [];
        let err = registry().resolve(&empty).unwrap_err();
        assert!(err.message.contains("At least one"));
    }

    #[test]
    fn test_resolve_rejects_unknown_kinds() {
        let err = registry().resolve(&["crf", "xyz", "extraction"]).unwrap_err();
        assert_eq!(err.stages, vec!["xyz".to_string(), "extraction".to_string()]);
        assert!(err.message.contains("Known kinds: crf, dvp"));
    }

    #[test]
    fn test_register_replaces_existing_kind() {
        let mut registry = registry();
        registry.register("crf", generator("other")).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.known_kinds(), vec!["crf", "dvp"]);
    }

    #[test]
    fn test_register_rejects_invalid_name() {
        let mut registry = StageRegistry::new();
        assert!(registry.register("bad name", generator("x")).is_err());
        assert!(registry.register("extraction", generator("x")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dependencies_of() {
        let registry = registry();
        let crf = GenerationKind::new("crf").unwrap();
        assert_eq!(registry.dependencies_of(&crf), Some(vec![StageKind::Extraction]));

        let sap = GenerationKind::new("sap").unwrap();
        assert_eq!(registry.dependencies_of(&sap), None);
        assert!(registry.generator(&sap).is_none());
    }
}
