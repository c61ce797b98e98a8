use tracing::{debug, warn};

use lexiloc_domain::{SHORTCUT_SUFFIX, TOOLTIP_SUFFIX};
use lexiloc_markers::MarkerCheck;

use crate::context::LocalizationContext;

/// A looked-up value together with what is needed to validate and format it
/// without holding a borrow on the cache.
struct Candidate {
    value: String,
    /// The unit's own embedded source, used for arity when the id is not in
    /// the default document.
    source: String,
    newline_token: String,
    ampersand_token: String,
}

impl LocalizationContext {
    /// Resolve `id` for `lang`, walking the fallback chain until a usable
    /// value is found. Missing translations and malformed markers are
    /// recoverable: the walk continues and bottoms out at the default
    /// language. At most `|fallback chain| + 1` document lookups.
    pub fn resolve(&mut self, lang: &str, id: &str, format_for_display: bool) -> Option<String> {
        let mut order: Vec<String> = Vec::with_capacity(self.fallback.len() + 1);
        order.push(lang.to_string());
        order.extend(self.fallback.iter().cloned());

        let mut tried: Vec<String> = Vec::new();
        for tag in order {
            let norm = self.normalize(&tag);
            if tried.contains(&norm) {
                continue;
            }
            tried.push(norm.clone());

            let Some(cand) = self.lookup(&norm, id) else {
                continue;
            };
            if cand.value.is_empty() {
                continue;
            }

            if norm == self.default_lang {
                // The source is definitionally correct; no marker check.
                return Some(finish(&cand, &cand.value, format_for_display));
            }

            let arity = match self.default_doc.get(id) {
                Some(unit) => lexiloc_markers::marker_arity(&unit.source),
                None => lexiloc_markers::marker_arity(&cand.source),
            };
            match lexiloc_markers::check(&cand.value, arity) {
                MarkerCheck::Valid => {
                    return Some(finish(&cand, &cand.value, format_for_display));
                }
                MarkerCheck::Repaired(fixed) => {
                    warn!(%id, lang = %norm, "repaired malformed substitution markers");
                    return Some(finish(&cand, &fixed, format_for_display));
                }
                MarkerCheck::Invalid => {
                    debug!(%id, lang = %norm, "discarding value with unusable markers");
                    continue;
                }
            }
        }
        None
    }

    pub fn resolve_tooltip(&mut self, lang: &str, id: &str, format_for_display: bool) -> Option<String> {
        self.resolve(lang, &format!("{id}{TOOLTIP_SUFFIX}"), format_for_display)
    }

    pub fn resolve_shortcut(&mut self, lang: &str, id: &str, format_for_display: bool) -> Option<String> {
        self.resolve(lang, &format!("{id}{SHORTCUT_SUFFIX}"), format_for_display)
    }

    fn lookup(&mut self, tag: &str, id: &str) -> Option<Candidate> {
        if tag == self.default_lang {
            let unit = self.default_doc.get(id)?;
            return Some(Candidate {
                value: unit.source.clone(),
                source: unit.source.clone(),
                newline_token: self.default_doc.newline_token.clone(),
                ampersand_token: self.default_doc.ampersand_token.clone(),
            });
        }
        let doc = self.try_get(tag)?;
        let unit = doc.get(id)?;
        let variant = unit.variant(&doc.target_lang)?;
        Some(Candidate {
            value: variant.value.clone(),
            source: unit.source.clone(),
            newline_token: doc.newline_token.clone(),
            ampersand_token: doc.ampersand_token.clone(),
        })
    }
}

fn finish(cand: &Candidate, value: &str, format_for_display: bool) -> String {
    if format_for_display {
        value
            .replace(&cand.newline_token, "\n")
            .replace(&cand.ampersand_token, "&")
    } else {
        value.to_string()
    }
}
