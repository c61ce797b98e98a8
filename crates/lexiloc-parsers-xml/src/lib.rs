//! Reading and writing the per-language `StringTable` XML document format,
//! plus the directory scan that discovers `(lang, file)` registrations.
//!
//! Two file layouts are supported: flat `{app_id}.{lang}.xml` and nested
//! `{lang}/{app_id}.xml`.

use std::io::Write;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use walkdir::WalkDir;

use lexiloc_core::LexilocError;
use lexiloc_domain::{group_of, Document, TransUnit};

type Result<T> = std::result::Result<T, LexilocError>;

fn parse_err(path: &Path, message: impl Into<String>) -> LexilocError {
    LexilocError::Parse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Parse a StringTable document. Malformed input yields
/// [`LexilocError::Parse`]; a missing file surfaces as `Io`.
pub fn read_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)?;
    read_document_str(&content, path)
}

enum Field {
    None,
    Source,
    Variant { lang: String, approved: bool },
    Note,
}

fn attr_value(e: &BytesStart<'_>, name: &[u8], path: &Path) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| parse_err(path, err.to_string()))?;
        if attr.key.as_ref() == name {
            let v = attr
                .unescape_value()
                .map_err(|err| parse_err(path, err.to_string()))?;
            return Ok(Some(v.into_owned()));
        }
    }
    Ok(None)
}

fn read_document_str(xml: &str, path: &Path) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut doc: Option<Document> = None;
    let mut unit: Option<TransUnit> = None;
    let mut field = Field::None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"StringTable" => {
                    let target = attr_value(&e, b"targetLang", path)?
                        .ok_or_else(|| parse_err(path, "StringTable missing targetLang"))?;
                    let source = attr_value(&e, b"sourceLang", path)?.unwrap_or_else(|| "en".into());
                    let version = attr_value(&e, b"productVersion", path)?.unwrap_or_default();
                    let mut d = Document::new(target, source, version);
                    if let Some(t) = attr_value(&e, b"newlineToken", path)? {
                        d.newline_token = t;
                    }
                    if let Some(t) = attr_value(&e, b"ampersandToken", path)? {
                        d.ampersand_token = t;
                    }
                    doc = Some(d);
                }
                b"Unit" => {
                    let id = attr_value(&e, b"id", path)?
                        .ok_or_else(|| parse_err(path, "Unit missing id"))?;
                    let mut u = TransUnit::new(id, "");
                    u.group = match attr_value(&e, b"group", path)? {
                        Some(g) => Some(g),
                        None => group_of(&u.id),
                    };
                    u.dynamic = attr_value(&e, b"dynamic", path)?.as_deref() == Some("true");
                    u.priority = attr_value(&e, b"priority", path)?.and_then(|p| p.parse().ok());
                    u.category = attr_value(&e, b"category", path)?;
                    unit = Some(u);
                }
                b"Source" => {
                    field = Field::Source;
                    text.clear();
                }
                b"Variant" => {
                    let lang = attr_value(&e, b"lang", path)?
                        .ok_or_else(|| parse_err(path, "Variant missing lang"))?;
                    let approved = attr_value(&e, b"approved", path)?.as_deref() == Some("true");
                    field = Field::Variant { lang, approved };
                    text.clear();
                }
                b"Note" => {
                    field = Field::Note;
                    text.clear();
                }
                other => {
                    let tag = String::from_utf8_lossy(other).into_owned();
                    return Err(parse_err(path, format!("unexpected element <{tag}>")));
                }
            },
            Ok(Event::Text(t)) => {
                let v = t.unescape().map_err(|err| parse_err(path, err.to_string()))?;
                text.push_str(&v);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"Source" => {
                    if let Some(u) = unit.as_mut() {
                        u.source = std::mem::take(&mut text);
                    }
                    field = Field::None;
                }
                b"Variant" => {
                    if let (Some(u), Field::Variant { lang, approved }) = (unit.as_mut(), &field) {
                        u.set_variant(lang.clone(), std::mem::take(&mut text), *approved);
                    }
                    field = Field::None;
                }
                b"Note" => {
                    if let Some(u) = unit.as_mut() {
                        u.notes.push(std::mem::take(&mut text));
                    }
                    field = Field::None;
                }
                b"Unit" => {
                    if let (Some(d), Some(u)) = (doc.as_mut(), unit.take()) {
                        // Duplicate ids: last write wins, not an error.
                        if d.units.insert(u.id.clone(), u).is_some() {
                            tracing::debug!(path = %path.display(), "duplicate unit id, keeping last");
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                // Self-closing <Source/> etc. contribute empty text.
                match e.name().as_ref() {
                    b"Source" => {
                        if let Some(u) = unit.as_mut() {
                            u.source = String::new();
                        }
                    }
                    b"Note" => {
                        if let Some(u) = unit.as_mut() {
                            u.notes.push(String::new());
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(parse_err(path, e.to_string())),
        }
        buf.clear();
    }

    let mut doc = doc.ok_or_else(|| parse_err(path, "no StringTable root element"))?;
    doc.dirty = false;
    Ok(doc)
}

/// Render a document to XML bytes in the persisted `(group, id)` order.
pub fn render_document_bytes(doc: &Document) -> Result<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    {
        let mut w = Writer::new_with_indent(&mut out, b' ', 2);
        w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(io_other)?;

        let mut root = BytesStart::new("StringTable");
        root.push_attribute(("targetLang", doc.target_lang.as_str()));
        root.push_attribute(("sourceLang", doc.source_lang.as_str()));
        root.push_attribute(("productVersion", doc.product_version.as_str()));
        if doc.newline_token != lexiloc_domain::DEFAULT_NEWLINE_TOKEN {
            root.push_attribute(("newlineToken", doc.newline_token.as_str()));
        }
        if doc.ampersand_token != lexiloc_domain::DEFAULT_AMPERSAND_TOKEN {
            root.push_attribute(("ampersandToken", doc.ampersand_token.as_str()));
        }
        w.write_event(Event::Start(root)).map_err(io_other)?;

        for unit in doc.sorted_units() {
            let mut tag = BytesStart::new("Unit");
            tag.push_attribute(("id", unit.id.as_str()));
            if let Some(g) = &unit.group {
                tag.push_attribute(("group", g.as_str()));
            }
            if unit.dynamic {
                tag.push_attribute(("dynamic", "true"));
            }
            if let Some(p) = unit.priority {
                tag.push_attribute(("priority", p.to_string().as_str()));
            }
            if let Some(c) = &unit.category {
                tag.push_attribute(("category", c.as_str()));
            }
            w.write_event(Event::Start(tag)).map_err(io_other)?;

            w.write_event(Event::Start(BytesStart::new("Source")))
                .map_err(io_other)?;
            w.write_event(Event::Text(BytesText::new(&unit.source)))
                .map_err(io_other)?;
            w.write_event(Event::End(BytesEnd::new("Source")))
                .map_err(io_other)?;

            for variant in unit.variants.values() {
                let mut vt = BytesStart::new("Variant");
                vt.push_attribute(("lang", variant.lang.as_str()));
                if variant.approved {
                    vt.push_attribute(("approved", "true"));
                }
                w.write_event(Event::Start(vt)).map_err(io_other)?;
                w.write_event(Event::Text(BytesText::new(&variant.value)))
                    .map_err(io_other)?;
                w.write_event(Event::End(BytesEnd::new("Variant")))
                    .map_err(io_other)?;
            }

            for note in &unit.notes {
                w.write_event(Event::Start(BytesStart::new("Note")))
                    .map_err(io_other)?;
                w.write_event(Event::Text(BytesText::new(note)))
                    .map_err(io_other)?;
                w.write_event(Event::End(BytesEnd::new("Note")))
                    .map_err(io_other)?;
            }

            w.write_event(Event::End(BytesEnd::new("Unit")))
                .map_err(io_other)?;
        }

        w.write_event(Event::End(BytesEnd::new("StringTable")))
            .map_err(io_other)?;
    }
    out.push(b'\n');
    Ok(out)
}

fn io_other(e: impl std::fmt::Display) -> LexilocError {
    LexilocError::Other(e.to_string())
}

/// Write a document atomically (temp file + rename in the target directory).
pub fn write_document(path: &Path, doc: &Document) -> Result<()> {
    let bytes = render_document_bytes(doc)?;
    write_atomic(path, &bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("xml.tmp");
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Discover `(lang, path)` registrations for `app_id` under `root`, in both
/// supported layouts. Deterministic: paths are visited in sorted order and
/// the first registration per language tag wins.
pub fn scan_documents(root: &Path, app_id: &str) -> Result<Vec<(String, PathBuf)>> {
    let flat_prefix = format!("{app_id}.");
    let nested_name = format!("{app_id}.xml");

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .map(|e| e.eq_ignore_ascii_case("xml"))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut out: Vec<(String, PathBuf)> = Vec::new();
    let mut seen: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for path in files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let lang = if name == nested_name {
            // {lang}/{app_id}.xml — the parent directory is the tag.
            path.parent()
                .filter(|parent| *parent != root)
                .and_then(|parent| parent.file_name())
                .and_then(|n| n.to_str())
                .map(str::to_string)
        } else {
            // {app_id}.{lang}.xml
            name.strip_prefix(&flat_prefix)
                .and_then(|rest| rest.strip_suffix(".xml"))
                .filter(|lang| !lang.is_empty() && !lang.contains('.'))
                .map(str::to_string)
        };
        if let Some(lang) = lang {
            if seen.insert(lang.clone()) {
                out.push((lang, path));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexiloc_domain::Variant;

    fn sample_doc() -> Document {
        let mut doc = Document::new("es", "en", "1.4");
        let mut u = TransUnit::new("A.B.Title", "Hello {0}");
        u.set_variant("es", "Hola {0}", true);
        u.notes.push("harvested from main menu".into());
        u.category = Some("menu".into());
        u.priority = Some(1);
        doc.add_or_replace(u);
        let mut dyn_u = TransUnit::new("A.B.Status", "Ready");
        dyn_u.dynamic = true;
        doc.add_or_replace(dyn_u);
        doc
    }

    #[test]
    fn roundtrips_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.es.xml");
        let doc = sample_doc();
        write_document(&path, &doc).unwrap();

        let loaded = read_document(&path).unwrap();
        assert_eq!(loaded.target_lang, "es");
        assert_eq!(loaded.source_lang, "en");
        assert_eq!(loaded.product_version, "1.4");
        assert!(!loaded.dirty);
        assert_eq!(loaded.len(), 2);

        let u = loaded.get("A.B.Title").unwrap();
        assert_eq!(u.source, "Hello {0}");
        assert_eq!(
            u.variant("es"),
            Some(&Variant {
                lang: "es".into(),
                value: "Hola {0}".into(),
                approved: true,
            })
        );
        assert_eq!(u.notes, vec!["harvested from main menu".to_string()]);
        assert_eq!(u.priority, Some(1));
        assert_eq!(u.category.as_deref(), Some("menu"));

        assert!(loaded.get("A.B.Status").unwrap().dynamic);
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.es.xml");
        std::fs::write(&path, "<StringTable targetLang=\"es\"><Unit").unwrap();
        match read_document(&path) {
            Err(LexilocError::Parse { .. }) => {}
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn missing_root_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.es.xml");
        std::fs::write(&path, "<?xml version=\"1.0\"?>").unwrap();
        assert!(matches!(
            read_document(&path),
            Err(LexilocError::Parse { .. })
        ));
    }

    #[test]
    fn duplicate_unit_id_last_wins() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<StringTable targetLang="en" sourceLang="en" productVersion="1">
  <Unit id="A"><Source>first</Source></Unit>
  <Unit id="A"><Source>second</Source></Unit>
</StringTable>"#;
        let doc = read_document_str(xml, Path::new("dup.xml")).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get("A").unwrap().source, "second");
    }

    #[test]
    fn scan_finds_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let doc_en = Document::new("en", "en", "1");
        let doc_es = Document::new("es", "en", "1");
        write_document(&dir.path().join("app.en.xml"), &doc_en).unwrap();
        write_document(&dir.path().join("es").join("app.xml"), &doc_es).unwrap();
        // Unrelated files are ignored.
        std::fs::write(dir.path().join("other.en.xml"), "x").unwrap();

        let found = scan_documents(dir.path(), "app").unwrap();
        let langs: Vec<&str> = found.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(langs, vec!["en", "es"]);
    }

    #[test]
    fn escaped_text_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.en.xml");
        let mut doc = Document::new("en", "en", "1");
        doc.add_or_replace(TransUnit::new("Amp", "Fish && Chips <tasty>"));
        write_document(&path, &doc).unwrap();
        let loaded = read_document(&path).unwrap();
        assert_eq!(loaded.get("Amp").unwrap().source, "Fish && Chips <tasty>");
    }
}
