//! Reconcile a freshly harvested default-language document against the
//! previously shipped baseline.
//!
//! One deterministic pass. Nothing from the baseline is dropped silently:
//! units missing from the harvest are carried over with an explanatory note.
//!
//! Repeated merging is *not* idempotent — `merge(a, merge(a, b).0)` can keep
//! stacking `[OLD NOTE]` prefixes. Callers regenerate from a fresh harvest
//! and a single baseline; do not feed merge output back in as the baseline
//! expecting a fixed point.

use lexiloc_domain::{Document, MergeReport, TransUnit, SCHEMA_VERSION};

pub const OLD_NOTE_PREFIX: &str = "[OLD NOTE] ";
pub const OLD_TEXT_MARKER: &str = "OLD TEXT";

/// Append each baseline note not already present verbatim, prefixing it with
/// `[OLD NOTE] ` unless it already carries an old-note or old-text marker.
fn merge_notes(unit: &mut TransUnit, old: &TransUnit) {
    for note in &old.notes {
        if unit.has_note(note) {
            continue;
        }
        let carried = if note.contains("[OLD NOTE]") || note.contains(OLD_TEXT_MARKER) {
            note.clone()
        } else {
            format!("{OLD_NOTE_PREFIX}{note}")
        };
        if !unit.has_note(&carried) {
            unit.notes.push(carried);
        }
    }
}

/// Merge a fresh harvest (`new_doc`) against the old baseline (`old_doc`)
/// into one authoritative document plus a per-category report.
pub fn merge(new_doc: &Document, old_doc: &Document) -> (Document, MergeReport) {
    let mut merged = Document::new(
        new_doc.target_lang.clone(),
        new_doc.source_lang.clone(),
        new_doc.product_version.clone(),
    );
    merged.newline_token = new_doc.newline_token.clone();
    merged.ampersand_token = new_doc.ampersand_token.clone();

    let mut report = MergeReport {
        schema_version: SCHEMA_VERSION,
        ..MergeReport::default()
    };

    let harvest_saw_dynamic = new_doc.units.values().any(|u| u.dynamic);

    for unit in new_doc.units.values() {
        let mut out = unit.clone();
        match old_doc.get(&unit.id) {
            None => report.new.push(unit.id.clone()),
            Some(old) => {
                merge_notes(&mut out, old);
                // The harvest carries no translations; baseline variants are
                // preserved verbatim.
                for (lang, variant) in &old.variants {
                    out.variants
                        .entry(lang.clone())
                        .or_insert_with(|| variant.clone());
                }
                let changed = old.source != unit.source;
                if changed {
                    out.notes.push(format!(
                        "{OLD_TEXT_MARKER} (changed in {}): {}",
                        new_doc.product_version, old.source
                    ));
                    report.changed.push(unit.id.clone());
                }
                if old.dynamic && !unit.dynamic {
                    out.notes.push(
                        "previously marked dynamic; now found by static scan".to_string(),
                    );
                    if !changed {
                        report.wrong_dynamic_flag.push(unit.id.clone());
                    }
                }
            }
        }
        merged.units.insert(out.id.clone(), out);
    }

    for old in old_doc.units.values() {
        if new_doc.units.contains_key(&old.id) {
            continue;
        }
        let mut out = old.clone();
        if old.dynamic {
            report.missing_dynamic.push(old.id.clone());
            // Only meaningful when dynamic collection actually ran this
            // harvest; otherwise the absence says nothing.
            if harvest_saw_dynamic {
                out.notes
                    .push("dynamic string not seen in this harvest".to_string());
            }
        } else {
            report.missing.push(old.id.clone());
            out.notes.push(format!(
                "not found by static scan in {}",
                new_doc.product_version
            ));
        }
        merged.units.insert(out.id.clone(), out);
    }

    tracing::debug!(
        new = report.new.len(),
        changed = report.changed.len(),
        wrong_dynamic = report.wrong_dynamic_flag.len(),
        missing = report.missing.len(),
        missing_dynamic = report.missing_dynamic.len(),
        "merge complete"
    );

    merged.dirty = true;
    (merged, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn doc(version: &str) -> Document {
        Document::new("en", "en", version)
    }

    fn unit(id: &str, source: &str) -> TransUnit {
        TransUnit::new(id, source)
    }

    #[test]
    fn spec_scenario_changed_source_preserves_variant() {
        let mut new_doc = doc("1.5");
        new_doc.add_or_replace(unit("A.B.Title", "Hello {0}"));

        let mut old_doc = doc("1.4");
        let mut old = unit("A.B.Title", "Hi {0}");
        old.set_variant("es", "Hola {0}", true);
        old_doc.add_or_replace(old);

        let (merged, report) = merge(&new_doc, &old_doc);
        assert_eq!(report.changed, vec!["A.B.Title".to_string()]);
        assert!(report.new.is_empty());

        let u = merged.get("A.B.Title").unwrap();
        assert_eq!(u.source, "Hello {0}");
        assert_eq!(u.variant("es").unwrap().value, "Hola {0}");
        assert!(u
            .notes
            .iter()
            .any(|n| n.starts_with("OLD TEXT (changed in 1.5): Hi {0}")));
    }

    #[test]
    fn every_id_appears_exactly_once_and_categories_are_exclusive() {
        let mut new_doc = doc("2.0");
        new_doc.add_or_replace(unit("Kept", "same"));
        new_doc.add_or_replace(unit("Changed", "after"));
        new_doc.add_or_replace(unit("Added", "fresh"));
        let mut was_dynamic = unit("WasDynamic", "text");
        was_dynamic.dynamic = false;
        new_doc.add_or_replace(was_dynamic);
        let mut still_dynamic = unit("StillDynamic", "dyn");
        still_dynamic.dynamic = true;
        new_doc.add_or_replace(still_dynamic);

        let mut old_doc = doc("1.0");
        old_doc.add_or_replace(unit("Kept", "same"));
        old_doc.add_or_replace(unit("Changed", "before"));
        let mut old_dyn = unit("WasDynamic", "text");
        old_dyn.dynamic = true;
        old_doc.add_or_replace(old_dyn);
        old_doc.add_or_replace(unit("Gone", "static"));
        let mut gone_dyn = unit("GoneDynamic", "dyn2");
        gone_dyn.dynamic = true;
        old_doc.add_or_replace(gone_dyn);

        let (merged, report) = merge(&new_doc, &old_doc);

        let all: BTreeSet<&str> = new_doc
            .units
            .keys()
            .chain(old_doc.units.keys())
            .map(String::as_str)
            .collect();
        assert_eq!(merged.len(), all.len());
        for id in all {
            assert!(merged.get(id).is_some(), "missing {id}");
        }

        assert_eq!(report.new, vec!["Added", "StillDynamic"]);
        assert_eq!(report.changed, vec!["Changed"]);
        assert_eq!(report.wrong_dynamic_flag, vec!["WasDynamic"]);
        assert_eq!(report.missing, vec!["Gone"]);
        assert_eq!(report.missing_dynamic, vec!["GoneDynamic"]);

        // Mutually exclusive: total equals the number of categorized ids.
        let mut seen = BTreeSet::new();
        for id in report
            .new
            .iter()
            .chain(&report.changed)
            .chain(&report.wrong_dynamic_flag)
            .chain(&report.missing)
            .chain(&report.missing_dynamic)
        {
            assert!(seen.insert(id.clone()), "{id} counted twice");
        }
    }

    #[test]
    fn missing_dynamic_annotated_only_when_harvest_saw_dynamics() {
        let mut old_doc = doc("1.0");
        let mut gone = unit("Dyn", "d");
        gone.dynamic = true;
        old_doc.add_or_replace(gone);

        // Harvest without any dynamic unit: tallied, not annotated.
        let mut new_doc = doc("1.1");
        new_doc.add_or_replace(unit("Static", "s"));
        let (merged, report) = merge(&new_doc, &old_doc);
        assert_eq!(report.missing_dynamic, vec!["Dyn"]);
        assert!(merged.get("Dyn").unwrap().notes.is_empty());

        // Harvest with one dynamic unit: annotated.
        let mut dyn_unit = unit("Other", "o");
        dyn_unit.dynamic = true;
        new_doc.add_or_replace(dyn_unit);
        let (merged, _) = merge(&new_doc, &old_doc);
        assert!(merged.get("Dyn").unwrap().notes[0].contains("not seen"));
    }

    #[test]
    fn old_notes_carried_once_with_prefix() {
        let mut new_doc = doc("1.1");
        new_doc.add_or_replace(unit("A", "x"));

        let mut old_doc = doc("1.0");
        let mut old = unit("A", "x");
        old.notes.push("from the designer".into());
        old.notes.push("[OLD NOTE] ancient".into());
        old_doc.add_or_replace(old);

        let (merged, _) = merge(&new_doc, &old_doc);
        let notes = &merged.get("A").unwrap().notes;
        assert_eq!(
            notes,
            &vec![
                "[OLD NOTE] from the designer".to_string(),
                "[OLD NOTE] ancient".to_string(),
            ]
        );

        // Merging the result against the same baseline does not duplicate.
        let (again, _) = merge(&merged, &old_doc);
        assert_eq!(again.get("A").unwrap().notes.len(), 2);
    }
}
