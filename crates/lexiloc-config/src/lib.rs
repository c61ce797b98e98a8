use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LexilocConfig {
    pub app_id: Option<String>,
    pub default_lang: Option<String>,
    /// Ordered fallback chain tried after the requested tag.
    pub fallback: Option<Vec<String>>,
    pub data_dir: Option<String>,
    pub product_version: Option<String>,
    pub log_dir: Option<String>,
    pub list_limit: Option<usize>,
    pub merge: Option<MergeCfg>,
    pub save: Option<SaveCfg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeCfg {
    pub report: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveCfg {
    pub force_langs: Option<Vec<String>>,
    pub backup: Option<bool>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    Other(String),
}

/// Search order: CWD/lexiloc.toml, then $CONFIG_DIR/lexiloc/lexiloc.toml.
/// Earlier files win field-by-field; missing files are fine.
pub fn load_config() -> Result<LexilocConfig, ConfigError> {
    let mut merged = LexilocConfig::default();
    if let Ok(p) = std::env::current_dir() {
        merged = merge(merged, load_file(&p.join("lexiloc.toml")));
    }
    if let Some(base) = dirs::config_dir() {
        merged = merge(merged, load_file(&base.join("lexiloc").join("lexiloc.toml")));
    }
    Ok(merged)
}

fn load_file(path: &std::path::Path) -> LexilocConfig {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| toml::from_str(&s).ok())
        .unwrap_or_default()
}

fn merge(mut a: LexilocConfig, b: LexilocConfig) -> LexilocConfig {
    if a.app_id.is_none() {
        a.app_id = b.app_id;
    }
    if a.default_lang.is_none() {
        a.default_lang = b.default_lang;
    }
    if a.fallback.is_none() {
        a.fallback = b.fallback;
    }
    if a.data_dir.is_none() {
        a.data_dir = b.data_dir;
    }
    if a.product_version.is_none() {
        a.product_version = b.product_version;
    }
    if a.log_dir.is_none() {
        a.log_dir = b.log_dir;
    }
    if a.list_limit.is_none() {
        a.list_limit = b.list_limit;
    }
    a.merge = merge_opt(a.merge, b.merge, merge_merge);
    a.save = merge_opt(a.save, b.save, merge_save);
    a
}

fn merge_opt<T: Default>(a: Option<T>, b: Option<T>, f: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(f(a, b)),
        (None, Some(b)) => Some(b),
        (Some(a), None) => Some(a),
        (None, None) => None,
    }
}

fn merge_merge(mut a: MergeCfg, b: MergeCfg) -> MergeCfg {
    if a.report.is_none() {
        a.report = b.report;
    }
    a
}

fn merge_save(mut a: SaveCfg, b: SaveCfg) -> SaveCfg {
    if a.force_langs.is_none() {
        a.force_langs = b.force_langs;
    }
    if a.backup.is_none() {
        a.backup = b.backup;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_fields_win() {
        let a: LexilocConfig = toml::from_str(
            r#"
            app_id = "demo"
            default_lang = "en"
            [save]
            backup = true
            "#,
        )
        .unwrap();
        let b: LexilocConfig = toml::from_str(
            r#"
            app_id = "other"
            data_dir = "/srv/strings"
            [save]
            force_langs = ["es"]
            "#,
        )
        .unwrap();
        let m = merge(a, b);
        assert_eq!(m.app_id.as_deref(), Some("demo"));
        assert_eq!(m.default_lang.as_deref(), Some("en"));
        assert_eq!(m.data_dir.as_deref(), Some("/srv/strings"));
        let save = m.save.unwrap();
        assert_eq!(save.backup, Some(true));
        assert_eq!(save.force_langs.as_deref(), Some(&["es".to_string()][..]));
    }

    #[test]
    fn unparsable_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lexiloc.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let cfg = load_file(&path);
        assert!(cfg.app_id.is_none());
    }
}
