use lexiloc_domain::{MarkerIssue, SCHEMA_VERSION};
use lexiloc_markers::MarkerCheck;

use crate::context::{LocalizationContext, Slot};

impl LocalizationContext {
    /// Check every variant of every loaded document against the marker
    /// arity of its default-language source. Pending registrations are
    /// loaded first. Structural findings only; no value is modified.
    pub fn validate_markers(&mut self) -> Vec<MarkerIssue> {
        let mut tags: Vec<String> = self.slots.keys().cloned().collect();
        tags.sort();
        for tag in &tags {
            self.ensure_loaded(tag);
        }

        let mut issues = Vec::new();
        let mut loaded: Vec<&str> = self
            .slots
            .iter()
            .filter(|(_, s)| matches!(s, Slot::Loaded { .. }))
            .map(|(t, _)| t.as_str())
            .collect();
        loaded.sort_unstable();

        for tag in loaded {
            let Some(Slot::Loaded { doc, .. }) = self.slots.get(tag) else {
                continue;
            };
            for unit in doc.units.values() {
                let arity = match self.default_doc.get(&unit.id) {
                    Some(default_unit) => lexiloc_markers::marker_arity(&default_unit.source),
                    None => lexiloc_markers::marker_arity(&unit.source),
                };
                for variant in unit.variants.values() {
                    if variant.value.is_empty() {
                        continue;
                    }
                    match lexiloc_markers::check(&variant.value, arity) {
                        MarkerCheck::Valid => {}
                        MarkerCheck::Repaired(_) => issues.push(MarkerIssue {
                            schema_version: SCHEMA_VERSION,
                            id: unit.id.clone(),
                            lang: variant.lang.clone(),
                            expected_arity: arity,
                            value: variant.value.clone(),
                            repairable: true,
                        }),
                        MarkerCheck::Invalid => issues.push(MarkerIssue {
                            schema_version: SCHEMA_VERSION,
                            id: unit.id.clone(),
                            lang: variant.lang.clone(),
                            expected_arity: arity,
                            value: variant.value.clone(),
                            repairable: false,
                        }),
                    }
                }
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use crate::context::{ContextOptions, LocalizationContext};
    use lexiloc_domain::{Document, TransUnit};
    use lexiloc_parsers_xml::write_document;

    #[test]
    fn flags_unrepairable_and_repairable_variants() {
        let dir = tempfile::tempdir().unwrap();

        let mut en = Document::new("en", "en", "1.0");
        en.add_or_replace(TransUnit::new("Greet", "Hello {0}"));
        write_document(&dir.path().join("app.en.xml"), &en).unwrap();

        let mut es = Document::new("es", "en", "1.0");
        let mut bad = TransUnit::new("Greet", "Hello {0}");
        bad.set_variant("es", "Hola {2}", false);
        es.add_or_replace(bad);
        write_document(&dir.path().join("app.es.xml"), &es).unwrap();

        let mut ar = Document::new("ar", "en", "1.0");
        let mut fixable = TransUnit::new("Greet", "Hello {0}");
        // Bidi mark inside the marker braces: broken as-is, repairable.
        fixable.set_variant("ar", "{0\u{200F}}", false);
        ar.add_or_replace(fixable);
        write_document(&dir.path().join("app.ar.xml"), &ar).unwrap();

        let mut ctx = LocalizationContext::open(
            dir.path(),
            ContextOptions {
                app_id: "app".into(),
                default_lang: "en".into(),
                fallback: vec![],
                product_version: "1.0".into(),
            },
        )
        .unwrap();

        let issues = ctx.validate_markers();
        assert_eq!(issues.len(), 2);
        let ar_issue = issues.iter().find(|i| i.lang == "ar").unwrap();
        assert!(ar_issue.repairable);
        let es_issue = issues.iter().find(|i| i.lang == "es").unwrap();
        assert!(!es_issue.repairable);
        assert_eq!(es_issue.expected_arity, 1);
    }
}
