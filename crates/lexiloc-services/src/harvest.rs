use lexiloc_core::HarvestRecord;
use lexiloc_domain::{Document, TransUnit, SHORTCUT_SUFFIX, TOOLTIP_SUFFIX};

use crate::context::LocalizationContext;

impl LocalizationContext {
    /// Register or refresh a unit in the default-language document. Ids
    /// first seen through this runtime path are created dynamic; existing
    /// units keep their harvested flag. Duplicate ids: last write wins.
    pub fn add_or_update(
        &mut self,
        id: &str,
        default_text: &str,
        tooltip: Option<&str>,
        shortcut: Option<&str>,
        comment: Option<&str>,
    ) {
        self.upsert_default(id, default_text, comment, None);
        if let Some(tip) = tooltip {
            self.upsert_default(&format!("{id}{TOOLTIP_SUFFIX}"), tip, None, None);
        }
        if let Some(keys) = shortcut {
            self.upsert_default(&format!("{id}{SHORTCUT_SUFFIX}"), keys, None, None);
        }
    }

    /// Seed or update the default-language document from a harvester run.
    pub fn seed_from_harvest(&mut self, records: impl IntoIterator<Item = HarvestRecord>) {
        for r in records {
            self.upsert_default(&r.id, &r.default_text, r.comment.as_deref(), Some(r.dynamic));
            if let Some(tip) = r.tooltip.as_deref() {
                self.upsert_default(
                    &format!("{}{TOOLTIP_SUFFIX}", r.id),
                    tip,
                    None,
                    Some(r.dynamic),
                );
            }
            if let Some(keys) = r.shortcut_keys.as_deref() {
                self.upsert_default(
                    &format!("{}{SHORTCUT_SUFFIX}", r.id),
                    keys,
                    None,
                    Some(r.dynamic),
                );
            }
        }
    }

    fn upsert_default(
        &mut self,
        id: &str,
        text: &str,
        comment: Option<&str>,
        dynamic: Option<bool>,
    ) {
        match self.default_doc.units.get_mut(id) {
            Some(unit) => {
                if unit.source != text {
                    unit.source = text.to_string();
                    self.default_doc.dirty = true;
                }
                if let Some(d) = dynamic {
                    if unit.dynamic != d {
                        unit.dynamic = d;
                        self.default_doc.dirty = true;
                    }
                }
                if let Some(c) = comment {
                    if !unit.has_note(c) {
                        unit.notes.push(c.to_string());
                        self.default_doc.dirty = true;
                    }
                }
            }
            None => {
                let mut unit = TransUnit::new(id, text);
                unit.dynamic = dynamic.unwrap_or(true);
                if let Some(c) = comment {
                    unit.notes.push(c.to_string());
                }
                self.default_doc.add_or_replace(unit);
            }
        }
    }
}

/// Build a standalone default-language document from a harvester run, e.g.
/// as the `new` side of a merge. Duplicate ids: last write wins.
pub fn document_from_harvest(
    records: impl IntoIterator<Item = HarvestRecord>,
    default_lang: &str,
    product_version: &str,
) -> Document {
    let mut doc = Document::new(default_lang, default_lang, product_version);
    for r in records {
        let mut unit = TransUnit::new(r.id.clone(), r.default_text);
        unit.dynamic = r.dynamic;
        if let Some(c) = r.comment {
            unit.notes.push(c);
        }
        doc.add_or_replace(unit);
        if let Some(tip) = r.tooltip {
            let mut u = TransUnit::new(format!("{}{TOOLTIP_SUFFIX}", r.id), tip);
            u.dynamic = r.dynamic;
            doc.add_or_replace(u);
        }
        if let Some(keys) = r.shortcut_keys {
            let mut u = TransUnit::new(format!("{}{SHORTCUT_SUFFIX}", r.id), keys);
            u.dynamic = r.dynamic;
            doc.add_or_replace(u);
        }
    }
    doc.dirty = false;
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextOptions;

    fn record(id: &str, text: &str, dynamic: bool) -> HarvestRecord {
        HarvestRecord {
            id: id.into(),
            default_text: text.into(),
            tooltip: None,
            shortcut_keys: None,
            comment: None,
            dynamic,
        }
    }

    #[test]
    fn document_from_harvest_last_write_wins() {
        let doc = document_from_harvest(
            vec![record("A", "first", false), record("A", "second", false)],
            "en",
            "1.0",
        );
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get("A").unwrap().source, "second");
    }

    #[test]
    fn harvest_expands_tooltip_and_shortcut_units() {
        let mut r = record("Open", "Open", false);
        r.tooltip = Some("Opens a file".into());
        r.shortcut_keys = Some("Ctrl+O".into());
        let doc = document_from_harvest(vec![r], "en", "1.0");
        assert_eq!(doc.get("Open.Tooltip").unwrap().source, "Opens a file");
        assert_eq!(doc.get("Open.ShortcutKeys").unwrap().source, "Ctrl+O");
    }

    #[test]
    fn runtime_registration_creates_dynamic_units() {
        let dir = tempfile::tempdir().unwrap();
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

        ctx.add_or_update("Status.Live", "Live", None, None, None);
        assert!(ctx.default_doc().get("Status.Live").unwrap().dynamic);

        // Statically harvested ids keep their flag on later registration.
        ctx.seed_from_harvest(vec![record("Menu.Open", "Open", false)]);
        ctx.add_or_update("Menu.Open", "Open", None, None, None);
        assert!(!ctx.default_doc().get("Menu.Open").unwrap().dynamic);
    }
}
