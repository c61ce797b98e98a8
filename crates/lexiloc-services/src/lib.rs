//! High-level orchestration layer over the lower-level crates.
//!
//! [`LocalizationContext`] owns the per-language document table, the alias
//! map and the fallback chain. All mutation happens on one logical thread;
//! there is no ambient global state.

use std::path::Path;

mod context;
mod harvest;
mod resolve;
mod validate;

pub use context::{ContextOptions, LocalizationContext};
pub use harvest::document_from_harvest;
pub use lexiloc_core::{HarvestRecord, LexilocError, Result};

use lexiloc_domain::{Document, MergeReport};

/// Merge a fresh harvest document against the baseline at `old_doc_path`.
/// A missing baseline is an empty document filled purely from the harvest;
/// a corrupt one is a real error for the caller to act on.
pub fn merge_with_baseline(
    new_doc: &Document,
    old_doc_path: &Path,
) -> std::result::Result<(Document, MergeReport), LexilocError> {
    let old = match lexiloc_parsers_xml::read_document(old_doc_path) {
        Ok(doc) => doc,
        Err(LexilocError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %old_doc_path.display(), "no baseline, merging against empty document");
            Document::new(
                new_doc.target_lang.clone(),
                new_doc.source_lang.clone(),
                new_doc.product_version.clone(),
            )
        }
        Err(e) => return Err(e),
    };
    Ok(lexiloc_merge::merge(new_doc, &old))
}
