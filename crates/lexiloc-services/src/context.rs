use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use lexiloc_core::LexilocError;
use lexiloc_domain::{group_of, Document, SaveReport, ScanEntry, SCHEMA_VERSION};
use lexiloc_parsers_xml::{read_document, scan_documents, write_document};

/// Construction parameters for a [`LocalizationContext`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub app_id: String,
    pub default_lang: String,
    /// Ordered fallback chain tried after the requested tag. The default
    /// language is appended when absent, so the chain always bottoms out.
    pub fallback: Vec<String>,
    pub product_version: String,
}

pub(crate) enum Slot {
    /// Known file, not yet parsed.
    Pending(PathBuf),
    Loaded {
        doc: Document,
        path: PathBuf,
    },
}

/// Owns the document table, the language alias map and the fallback chain.
/// Explicit construction and teardown; single logical thread.
pub struct LocalizationContext {
    pub(crate) app_id: String,
    pub(crate) default_lang: String,
    pub(crate) product_version: String,
    pub(crate) fallback: Vec<String>,
    pub(crate) default_doc: Document,
    default_path: PathBuf,
    /// Non-default languages, keyed by scan tag until loaded, then by the
    /// document's declared target tag.
    pub(crate) slots: HashMap<String, Slot>,
    /// Only ever grows. An identity mapping always beats an inferred one.
    pub(crate) aliases: HashMap<String, String>,
    /// Structural cache change (e.g. an orphan re-key) happened.
    pub(crate) cache_dirty: bool,
    saves_disabled: bool,
}

impl LocalizationContext {
    /// Scan `data_dir` for documents of `opts.app_id`, register every
    /// `(lang, file)` pair, and eagerly load the default-language document.
    ///
    /// A corrupt default document is deleted and regenerated from the next
    /// harvest (accepted data loss, logged); a missing one starts empty.
    pub fn open(data_dir: &Path, opts: ContextOptions) -> std::result::Result<Self, LexilocError> {
        let mut fallback = opts.fallback;
        if fallback.last().map(String::as_str) != Some(opts.default_lang.as_str()) {
            fallback.retain(|l| l != &opts.default_lang);
            fallback.push(opts.default_lang.clone());
        }

        let mut slots = HashMap::new();
        let mut default_path = None;
        for (lang, path) in scan_documents(data_dir, &opts.app_id)? {
            if lang == opts.default_lang {
                default_path = Some(path);
            } else {
                slots.insert(lang, Slot::Pending(path));
            }
        }
        let default_path = default_path
            .unwrap_or_else(|| data_dir.join(format!("{}.{}.xml", opts.app_id, opts.default_lang)));

        let default_doc = match read_document(&default_path) {
            Ok(mut doc) => {
                if doc.target_lang != opts.default_lang {
                    warn!(
                        declared = %doc.target_lang,
                        configured = %opts.default_lang,
                        "default document declares a different target tag, keeping configured"
                    );
                    doc.target_lang = opts.default_lang.clone();
                }
                doc
            }
            Err(LexilocError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %default_path.display(), "no default document, starting empty");
                Document::new(
                    opts.default_lang.clone(),
                    opts.default_lang.clone(),
                    opts.product_version.clone(),
                )
            }
            Err(LexilocError::Parse { path, message }) => {
                warn!(path = %path.display(), %message, "default document corrupt, deleting and regenerating from harvest");
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "could not delete corrupt document");
                }
                Document::new(
                    opts.default_lang.clone(),
                    opts.default_lang.clone(),
                    opts.product_version.clone(),
                )
            }
            Err(e) => return Err(e),
        };

        let mut aliases = HashMap::new();
        aliases.insert(opts.default_lang.clone(), opts.default_lang.clone());

        Ok(LocalizationContext {
            app_id: opts.app_id,
            default_lang: opts.default_lang,
            product_version: opts.product_version,
            fallback,
            default_doc,
            default_path,
            slots,
            aliases,
            cache_dirty: false,
            saves_disabled: false,
        })
    }

    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn product_version(&self) -> &str {
        &self.product_version
    }

    pub fn default_doc(&self) -> &Document {
        &self.default_doc
    }

    pub fn fallback_chain(&self) -> &[String] {
        &self.fallback
    }

    pub fn alias(&self, tag: &str) -> Option<&str> {
        self.aliases.get(tag).map(String::as_str)
    }

    /// Customization capability for this session; disabled after any
    /// persistence failure.
    pub fn saves_disabled(&self) -> bool {
        self.saves_disabled
    }

    /// Aggregate dirty flag: any loaded document is dirty, or a structural
    /// cache change occurred.
    pub fn is_dirty(&self) -> bool {
        self.cache_dirty
            || self.default_doc.dirty
            || self
                .slots
                .values()
                .any(|s| matches!(s, Slot::Loaded { doc, .. } if doc.dirty))
    }

    /// Normalize a requested tag through the alias map, falling back to
    /// stripping the region subtag. A derivation like `es-MX -> es` is
    /// recorded so later lookups skip it.
    pub(crate) fn normalize(&mut self, tag: &str) -> String {
        if let Some(mapped) = self.aliases.get(tag) {
            return mapped.clone();
        }
        if tag == self.default_lang || self.slots.contains_key(tag) {
            return tag.to_string();
        }
        if let Some((prefix, _)) = tag.split_once('-') {
            let target = if let Some(mapped) = self.aliases.get(prefix) {
                Some(mapped.clone())
            } else if prefix == self.default_lang || self.slots.contains_key(prefix) {
                Some(prefix.to_string())
            } else {
                None
            };
            if let Some(target) = target {
                self.aliases.insert(tag.to_string(), target.clone());
                return target;
            }
        }
        tag.to_string()
    }

    /// Look up a document by (normalized) tag, parsing on first access.
    pub fn try_get(&mut self, lang: &str) -> Option<&Document> {
        let tag = self.normalize(lang);
        if tag == self.default_lang {
            return Some(&self.default_doc);
        }
        self.ensure_loaded(&tag);
        let key = self.redirected(&tag);
        match self.slots.get(&key) {
            Some(Slot::Loaded { doc, .. }) => Some(doc),
            _ => None,
        }
    }

    /// After a load stored the document under its declared tag, the scan
    /// tag reaches it through the alias map.
    pub(crate) fn redirected(&self, tag: &str) -> String {
        if self.slots.contains_key(tag) {
            tag.to_string()
        } else {
            self.aliases.get(tag).cloned().unwrap_or_else(|| tag.to_string())
        }
    }

    /// Parse a pending registration. Malformed files are treated as absent
    /// and dropped from the table; the caller may delete and regenerate.
    pub(crate) fn ensure_loaded(&mut self, tag: &str) {
        let path = match self.slots.get(tag) {
            Some(Slot::Pending(p)) => p.clone(),
            _ => return,
        };
        self.slots.remove(tag);

        let mut doc = match read_document(&path) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "document unreadable, treating as absent");
                return;
            }
        };

        let declared = doc.target_lang.clone();
        self.update_aliases(tag, &declared);
        self.repair_orphans(&mut doc);
        debug!(tag, declared, path = %path.display(), units = doc.len(), "loaded document");
        self.slots.insert(declared, Slot::Loaded { doc, path });
    }

    /// Alias-map update on load. The derived (folder/file) tag `derived` may
    /// be more general than the document's declared target tag.
    fn update_aliases(&mut self, derived: &str, declared: &str) {
        // Identity for the declared tag is written unconditionally and wins.
        self.aliases
            .insert(declared.to_string(), declared.to_string());
        if derived == declared {
            return;
        }
        match self.aliases.get(derived) {
            // An inferred mapping that pointed at this same file's derived
            // tag gets corrected to the declared tag.
            Some(existing) if existing == derived => {
                self.aliases
                    .insert(derived.to_string(), declared.to_string());
            }
            None => {
                self.aliases
                    .insert(derived.to_string(), declared.to_string());
            }
            // Some other mapping already claims the general tag; leave it.
            Some(_) => {}
        }
    }

    /// Rename repair and defunct removal for a freshly loaded non-default
    /// document: units whose id is unknown to the default document are
    /// either re-keyed onto a same-content default unit or, when not
    /// dynamic, dropped.
    fn repair_orphans(&mut self, doc: &mut Document) {
        // One unit at a time, in id order, so an earlier re-key claims its
        // target id before a later orphan with the same source is matched.
        let ids: Vec<String> = doc.units.keys().cloned().collect();
        for id in ids {
            if self.default_doc.units.contains_key(&id) {
                continue;
            }
            let Some(unit) = doc.units.get(&id) else {
                continue;
            };
            let dynamic = unit.dynamic;
            let target = self
                .default_doc
                .find_orphan_match(unit, doc)
                .map(|t| t.id.clone());
            match target {
                Some(new_id) => {
                    if let Some(mut unit) = doc.units.remove(&id) {
                        info!(from = %id, to = %new_id, "re-keying renamed unit");
                        unit.id = new_id.clone();
                        unit.group = group_of(&new_id);
                        doc.units.insert(new_id, unit);
                        doc.dirty = true;
                        self.cache_dirty = true;
                    }
                }
                None if !dynamic => {
                    debug!(%id, "dropping defunct unit");
                    doc.units.remove(&id);
                    doc.dirty = true;
                }
                None => {}
            }
        }
    }

    /// Known registrations, default language first, then sorted by tag.
    pub fn entries(&self) -> Vec<ScanEntry> {
        let mut out = vec![ScanEntry {
            lang: self.default_lang.clone(),
            path: self.default_path.display().to_string(),
            units: Some(self.default_doc.len()),
        }];
        let mut rest: Vec<ScanEntry> = self
            .slots
            .iter()
            .map(|(lang, slot)| match slot {
                Slot::Pending(path) => ScanEntry {
                    lang: lang.clone(),
                    path: path.display().to_string(),
                    units: None,
                },
                Slot::Loaded { doc, path } => ScanEntry {
                    lang: lang.clone(),
                    path: path.display().to_string(),
                    units: Some(doc.len()),
                },
            })
            .collect();
        rest.sort_by(|a, b| a.lang.cmp(&b.lang));
        out.extend(rest);
        out
    }

    /// Selective write-back. No-op while the aggregate flag is clear.
    ///
    /// The default-language document is persisted unconditionally when
    /// dirty; any other language only when a customized file already exists
    /// or its tag is in `force_langs`. Every save is attempted even when
    /// some fail; failures come back aggregated. On full success all flags
    /// clear; on partial failure the flags of saved documents clear, the
    /// aggregate stays set, and customization is disabled for the session:
    /// later calls refuse with [`LexilocError::SavesDisabled`].
    pub fn save_if_dirty(
        &mut self,
        force_langs: &[String],
    ) -> std::result::Result<SaveReport, LexilocError> {
        if self.saves_disabled {
            warn!("save requested after an earlier persistence failure, refusing");
            return Err(LexilocError::SavesDisabled);
        }
        let mut report = SaveReport {
            schema_version: SCHEMA_VERSION,
            ..SaveReport::default()
        };
        if !self.is_dirty() {
            return Ok(report);
        }

        let mut failures: Vec<(PathBuf, String)> = Vec::new();

        if self.default_doc.dirty {
            match write_document(&self.default_path, &self.default_doc) {
                Ok(()) => {
                    self.default_doc.dirty = false;
                    report.saved.push(self.default_path.display().to_string());
                }
                Err(e) => failures.push((self.default_path.clone(), e.to_string())),
            }
        }

        let mut tags: Vec<String> = self.slots.keys().cloned().collect();
        tags.sort();
        for tag in tags {
            let Some(Slot::Loaded { doc, path }) = self.slots.get_mut(&tag) else {
                continue;
            };
            if !doc.dirty {
                continue;
            }
            let customized = path.exists();
            if !customized && !force_langs.iter().any(|l| l == &tag) {
                report.skipped.push(tag.clone());
                continue;
            }
            match write_document(path, doc) {
                Ok(()) => {
                    doc.dirty = false;
                    report.saved.push(path.display().to_string());
                }
                Err(e) => failures.push((path.clone(), e.to_string())),
            }
        }

        if failures.is_empty() {
            self.cache_dirty = false;
            Ok(report)
        } else {
            self.saves_disabled = true;
            Err(LexilocError::SaveFailed { failures })
        }
    }
}
