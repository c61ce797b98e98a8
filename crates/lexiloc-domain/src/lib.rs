use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Ids derived from a base unit id. Suffixed ids are exempt from orphan
/// detection because they follow their base unit.
pub const TOOLTIP_SUFFIX: &str = ".Tooltip";
pub const SHORTCUT_SUFFIX: &str = ".ShortcutKeys";

/// Default formatting-placeholder tokens: a literal two-character `\n`
/// stands for a newline, `&&` for an ampersand. Expanded only when the
/// caller asks for display formatting.
pub const DEFAULT_NEWLINE_TOKEN: &str = "\\n";
pub const DEFAULT_AMPERSAND_TOKEN: &str = "&&";

/// A language-specific translated value for a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Variant {
    pub lang: String,
    pub value: String,
    #[serde(default)]
    pub approved: bool,
}

/// One localizable string entry, keyed by id, with a default-language source
/// and per-language variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransUnit {
    pub id: String,
    /// Default-language source text.
    pub source: String,
    #[serde(default)]
    pub variants: BTreeMap<String, Variant>,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Discovered at runtime rather than by static code scanning.
    #[serde(default)]
    pub dynamic: bool,
    pub group: Option<String>,
    pub priority: Option<i32>,
    pub category: Option<String>,
}

impl TransUnit {
    pub fn new(id: impl Into<String>, source: impl Into<String>) -> Self {
        let id = id.into();
        let group = group_of(&id);
        TransUnit {
            id,
            source: source.into(),
            variants: BTreeMap::new(),
            notes: Vec::new(),
            dynamic: false,
            group,
            priority: None,
            category: None,
        }
    }

    /// True for tooltip/shortcut ids that derive from a base id.
    pub fn is_derived_id(id: &str) -> bool {
        id.ends_with(TOOLTIP_SUFFIX) || id.ends_with(SHORTCUT_SUFFIX)
    }

    pub fn variant(&self, lang: &str) -> Option<&Variant> {
        self.variants.get(lang)
    }

    pub fn set_variant(&mut self, lang: impl Into<String>, value: impl Into<String>, approved: bool) {
        let lang = lang.into();
        self.variants.insert(
            lang.clone(),
            Variant {
                lang,
                value: value.into(),
                approved,
            },
        );
    }

    pub fn has_note(&self, text: &str) -> bool {
        self.notes.iter().any(|n| n == text)
    }
}

/// Group path for an id like `A.B.Title` is `A.B`; single-segment ids have
/// no group.
pub fn group_of(id: &str) -> Option<String> {
    id.rsplit_once('.').map(|(g, _)| g.to_string())
}

/// An ordered set of translation units for one target language.
///
/// Units are keyed by id; the `(group, id)` ordinal ordering the persisted
/// form requires is materialized by [`Document::sorted_units`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Document {
    pub target_lang: String,
    pub source_lang: String,
    pub product_version: String,
    pub newline_token: String,
    pub ampersand_token: String,
    pub units: BTreeMap<String, TransUnit>,
    #[serde(skip)]
    pub dirty: bool,
}

impl Document {
    pub fn new(
        target_lang: impl Into<String>,
        source_lang: impl Into<String>,
        product_version: impl Into<String>,
    ) -> Self {
        Document {
            target_lang: target_lang.into(),
            source_lang: source_lang.into(),
            product_version: product_version.into(),
            newline_token: DEFAULT_NEWLINE_TOKEN.to_string(),
            ampersand_token: DEFAULT_AMPERSAND_TOKEN.to_string(),
            units: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TransUnit> {
        self.units.get(id)
    }

    /// Overwrite by id; any structural change marks the document dirty.
    /// Returns the replaced unit, if any (last write wins on duplicates).
    pub fn add_or_replace(&mut self, unit: TransUnit) -> Option<TransUnit> {
        self.dirty = true;
        self.units.insert(unit.id.clone(), unit)
    }

    pub fn remove(&mut self, id: &str) -> Option<TransUnit> {
        let removed = self.units.remove(id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Rename-repair heuristic used while loading a non-default document:
    /// given a unit whose id is absent here, look for a unit with identical
    /// source text whose id the loaded document has not claimed. Derived
    /// (tooltip/shortcut) ids never participate. First candidate in id
    /// order wins.
    pub fn find_orphan_match(&self, orphan: &TransUnit, loaded: &Document) -> Option<&TransUnit> {
        if TransUnit::is_derived_id(&orphan.id) {
            return None;
        }
        self.units.values().find(|candidate| {
            candidate.id != orphan.id
                && !TransUnit::is_derived_id(&candidate.id)
                && candidate.source == orphan.source
                && !loaded.units.contains_key(&candidate.id)
        })
    }

    /// Units ordered by `(group, id)`, ordinal comparison, `None` group
    /// sorting first. This is the persisted order.
    pub fn sorted_units(&self) -> Vec<&TransUnit> {
        let mut out: Vec<&TransUnit> = self.units.values().collect();
        out.sort_by(|a, b| {
            (a.group.as_deref(), a.id.as_str()).cmp(&(b.group.as_deref(), b.id.as_str()))
        });
        out
    }

    /// Expand the literal newline/ampersand placeholder tokens into real
    /// characters for display.
    pub fn format_for_display(&self, value: &str) -> String {
        value
            .replace(&self.newline_token, "\n")
            .replace(&self.ampersand_token, "&")
    }
}

/// Per-category outcome of a merge run. A reporting side channel, not part
/// of merge correctness; categories are mutually exclusive per id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MergeReport {
    pub schema_version: u32,
    pub new: Vec<String>,
    pub changed: Vec<String>,
    pub wrong_dynamic_flag: Vec<String>,
    pub missing: Vec<String>,
    pub missing_dynamic: Vec<String>,
}

impl MergeReport {
    pub fn total(&self) -> usize {
        self.new.len()
            + self.changed.len()
            + self.wrong_dynamic_flag.len()
            + self.missing.len()
            + self.missing_dynamic.len()
    }
}

/// Outcome of a `save_if_dirty` pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SaveReport {
    pub schema_version: u32,
    /// Paths written in this pass.
    pub saved: Vec<String>,
    /// Languages that were dirty but had no customized file and were not
    /// forced.
    pub skipped: Vec<String>,
}

/// One marker-arity problem found by validation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MarkerIssue {
    pub schema_version: u32,
    pub id: String,
    pub lang: String,
    pub expected_arity: usize,
    pub value: String,
    /// True when the deterministic repair pass produced a valid value.
    pub repairable: bool,
}

/// One discovered (language, file) registration, for scan output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanEntry {
    pub lang: String,
    pub path: String,
    pub units: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, source: &str) -> TransUnit {
        TransUnit::new(id, source)
    }

    #[test]
    fn group_derived_from_id() {
        assert_eq!(group_of("A.B.Title"), Some("A.B".to_string()));
        assert_eq!(group_of("Title"), None);
    }

    #[test]
    fn add_or_replace_overwrites_and_dirties() {
        let mut doc = Document::new("en", "en", "1.0");
        assert!(!doc.dirty);
        assert!(doc.add_or_replace(unit("A", "one")).is_none());
        let prev = doc.add_or_replace(unit("A", "two")).unwrap();
        assert_eq!(prev.source, "one");
        assert_eq!(doc.get("A").unwrap().source, "two");
        assert!(doc.dirty);
    }

    #[test]
    fn remove_only_dirties_on_hit() {
        let mut doc = Document::new("en", "en", "1.0");
        doc.add_or_replace(unit("A", "x"));
        doc.dirty = false;
        assert!(doc.remove("B").is_none());
        assert!(!doc.dirty);
        assert!(doc.remove("A").is_some());
        assert!(doc.dirty);
    }

    #[test]
    fn orphan_match_requires_unclaimed_exact_source() {
        let mut default = Document::new("en", "en", "1.0");
        default.add_or_replace(unit("Menu.Open", "Open"));
        default.add_or_replace(unit("Menu.Close", "Close"));

        let mut loaded = Document::new("es", "en", "1.0");
        loaded.add_or_replace(unit("Menu.Shut", "Close"));

        let orphan = unit("Menu.Shut", "Close");
        let m = default.find_orphan_match(&orphan, &loaded).unwrap();
        assert_eq!(m.id, "Menu.Close");

        // A claimed id is not a candidate.
        loaded.add_or_replace(unit("Menu.Close", "Close"));
        assert!(default.find_orphan_match(&orphan, &loaded).is_none());
    }

    #[test]
    fn derived_ids_exempt_from_orphan_matching() {
        let mut default = Document::new("en", "en", "1.0");
        default.add_or_replace(unit("Menu.Open.Tooltip", "Opens a file"));
        let loaded = Document::new("es", "en", "1.0");
        let orphan = unit("Menu.Start.Tooltip", "Opens a file");
        assert!(default.find_orphan_match(&orphan, &loaded).is_none());
    }

    #[test]
    fn sorted_units_orders_by_group_then_id_null_group_first() {
        let mut doc = Document::new("en", "en", "1.0");
        doc.add_or_replace(unit("B.Two", "2"));
        doc.add_or_replace(unit("A.One", "1"));
        let mut bare = unit("Zed", "z");
        bare.group = None;
        doc.add_or_replace(bare);

        let ids: Vec<&str> = doc.sorted_units().iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["Zed", "A.One", "B.Two"]);
    }

    #[test]
    fn display_formatting_expands_tokens() {
        let doc = Document::new("en", "en", "1.0");
        assert_eq!(doc.format_for_display("a\\nb && c"), "a\nb & c");
    }
}
