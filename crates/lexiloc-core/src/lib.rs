use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = color_eyre::eyre::Result<T>;

/// One record yielded by the external harvester (static code scan or runtime
/// discovery). Internals of harvesting are opaque to this workspace; the
/// cache only consumes the sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestRecord {
    pub id: String,
    pub default_text: String,
    pub tooltip: Option<String>,
    pub shortcut_keys: Option<String>,
    pub comment: Option<String>,
    /// Discovered at runtime rather than by static scanning.
    pub dynamic: bool,
}

/// Recoverable error variants shared across crates. Corruption and missing
/// files are explicit branches, never catch-all control flow.
#[derive(Debug, Error)]
pub enum LexilocError {
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("no document registered for language '{0}'")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("failed to save {count} document(s): {summary}", count = .failures.len(), summary = save_summary(.failures))]
    SaveFailed { failures: Vec<(PathBuf, String)> },

    #[error("saving disabled for this session after an earlier persistence failure")]
    SavesDisabled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

fn save_summary(failures: &[(PathBuf, String)]) -> String {
    failures
        .iter()
        .map(|(p, e)| format!("{}: {e}", p.display()))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_failed_lists_every_file() {
        let err = LexilocError::SaveFailed {
            failures: vec![
                (PathBuf::from("a.xml"), "denied".into()),
                (PathBuf::from("b.xml"), "locked".into()),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 document(s)"));
        assert!(msg.contains("a.xml: denied"));
        assert!(msg.contains("b.xml: locked"));
    }
}
