//! OPC package I/O: parts, relationships and content types.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;

use crate::error::Error;
use crate::export::xml::escape_attr;

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PACKAGE_RELS_PART: &str = "_rels/.rels";
pub const DOCUMENT_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";
pub const NUMBERING_PART: &str = "word/numbering.xml";
pub const SETTINGS_PART: &str = "word/settings.xml";
pub const THEME_PART: &str = "word/theme/theme1.xml";
pub const COMMENTS_PART: &str = "word/comments.xml";
pub const COMMENTS_EXTENDED_PART: &str = "word/commentsExtended.xml";
pub const COMMENTS_IDS_PART: &str = "word/commentsIds.xml";
pub const COMMENTS_EXTENSIBLE_PART: &str = "word/commentsExtensible.xml";
pub const CORE_PROPERTIES_PART: &str = "docProps/core.xml";

const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CT_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
pub const REL_NUMBERING: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
pub const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub const REL_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const REL_COMMENTS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
pub const REL_COMMENTS_EXTENDED: &str =
    "http://schemas.microsoft.com/office/2011/relationships/commentsExtended";
pub const REL_COMMENTS_IDS: &str = "http://schemas.microsoft.com/office/2016/09/relationships/commentsIds";
pub const REL_COMMENTS_EXTENSIBLE: &str =
    "http://schemas.microsoft.com/office/2018/08/relationships/commentsExtensible";

pub const CT_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
pub const CT_NUMBERING: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml";
pub const CT_COMMENTS: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";
pub const CT_COMMENTS_EXTENDED: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.commentsExtended+xml";

/// An in-memory OPC package keyed by part name (no leading slash).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let mut zip = zip::ZipArchive::new(Cursor::new(data))?;
        let mut parts = BTreeMap::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            parts.insert(name, buf);
        }
        Ok(Self { parts })
    }

    pub fn open(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Serialize as a ZIP, `[Content_Types].xml` first.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        if let Some(ct) = self.parts.get(CONTENT_TYPES_PART) {
            writer.start_file(CONTENT_TYPES_PART, options)?;
            writer.write_all(ct)?;
        }
        for (name, data) in &self.parts {
            if name == CONTENT_TYPES_PART {
                continue;
            }
            writer.start_file(name.as_str(), options)?;
            writer.write_all(data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    /// A part decoded as UTF-8, without a byte-order mark.
    pub fn xml(&self, name: &str) -> Option<String> {
        let bytes: &[u8] = self.parts.get(name)?;
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match std::str::from_utf8(bytes) {
            Ok(s) => Some(s.to_string()),
            Err(e) => {
                log::warn!("Part {name} is not valid UTF-8: {e}");
                None
            }
        }
    }

    pub fn set_part(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.parts.insert(name.into(), data);
    }

    pub fn set_xml(&mut self, name: impl Into<String>, xml: impl Into<String>) {
        self.parts.insert(name.into(), xml.into().into_bytes());
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        self.parts.remove(name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn relationships(&self, part: &str) -> Vec<Relationship> {
        self.xml(&rels_path_for(part))
            .map(|xml| parse_relationships(&xml))
            .unwrap_or_default()
    }

    /// The main document part named by the package relationships, falling
    /// back to `word/document.xml`.
    pub fn main_document_part(&self) -> String {
        self.relationships("")
            .into_iter()
            .find(|r| r.rel_type == REL_OFFICE_DOCUMENT)
            .map(|r| resolve_target("", &r.target))
            .unwrap_or_else(|| DOCUMENT_PART.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `External` for hyperlinks and linked images.
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode.as_deref() == Some("External")
    }
}

pub fn parse_relationships(xml_content: &str) -> Vec<Relationship> {
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("Unparsable relationships part");
        return Vec::new();
    };
    xml.root_element()
        .children()
        .filter(|n| n.tag_name().name() == "Relationship")
        .filter_map(|n| {
            Some(Relationship {
                id: n.attribute("Id")?.to_string(),
                rel_type: n.attribute("Type").unwrap_or_default().to_string(),
                target: n.attribute("Target")?.to_string(),
                target_mode: n.attribute("TargetMode").map(str::to_string),
            })
        })
        .collect()
}

pub fn serialize_relationships(rels: &[Relationship]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
    );
    out.push_str(&format!("<Relationships xmlns=\"{REL_NS}\">"));
    for r in rels {
        out.push_str(&format!(
            "<Relationship Id=\"{}\" Type=\"{}\" Target=\"{}\"",
            escape_attr(&r.id),
            escape_attr(&r.rel_type),
            escape_attr(&r.target)
        ));
        if let Some(mode) = &r.target_mode {
            out.push_str(&format!(" TargetMode=\"{}\"", escape_attr(mode)));
        }
        out.push_str("/>");
    }
    out.push_str("</Relationships>");
    out
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`; `""` is the package itself.
pub fn rels_path_for(part_path: &str) -> String {
    let (dir, file) = match part_path.rsplit_once('/') {
        Some((d, f)) => (d, f),
        None => ("", part_path),
    };
    if dir.is_empty() {
        format!("_rels/{file}.rels")
    } else {
        format!("{dir}/_rels/{file}.rels")
    }
}

/// Resolve a relationship target relative to the part that owns it.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Inverse of [`resolve_target`] for parts under the source part's directory.
pub fn relative_target(source_part: &str, part: &str) -> String {
    match source_part.rsplit_once('/') {
        Some((dir, _)) => part
            .strip_prefix(dir)
            .and_then(|p| p.strip_prefix('/'))
            .map(str::to_string)
            .unwrap_or_else(|| format!("/{part}")),
        None => part.to_string(),
    }
}

/// `[Content_Types].xml`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContentTypes {
    pub defaults: Vec<(String, String)>,
    pub overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml_content: &str) -> Self {
        let mut ct = ContentTypes::default();
        let Ok(xml) = roxmltree::Document::parse(xml_content) else {
            log::warn!("Unparsable {CONTENT_TYPES_PART}");
            return ct;
        };
        for node in xml.root_element().children().filter(|n| n.is_element()) {
            let content_type = node.attribute("ContentType").unwrap_or_default().to_string();
            match node.tag_name().name() {
                "Default" => {
                    if let Some(ext) = node.attribute("Extension") {
                        ct.defaults.push((ext.to_ascii_lowercase(), content_type));
                    }
                }
                "Override" => {
                    if let Some(part) = node.attribute("PartName") {
                        ct.overrides
                            .push((part.trim_start_matches('/').to_string(), content_type));
                    }
                }
                _ => {}
            }
        }
        ct
    }

    /// Default document types for a blank package.
    pub fn minimal() -> Self {
        Self {
            defaults: vec![
                (
                    "rels".into(),
                    "application/vnd.openxmlformats-package.relationships+xml".into(),
                ),
                ("xml".into(), "application/xml".into()),
            ],
            overrides: vec![(DOCUMENT_PART.into(), CT_DOCUMENT.into())],
        }
    }

    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        let ext = extension.to_ascii_lowercase();
        if !self.defaults.iter().any(|(e, _)| *e == ext) {
            self.defaults.push((ext, content_type.to_string()));
        }
    }

    pub fn ensure_override(&mut self, part: &str, content_type: &str) {
        match self.overrides.iter_mut().find(|(p, _)| p == part) {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self.overrides.push((part.to_string(), content_type.to_string())),
        }
    }

    pub fn remove_override(&mut self, part: &str) {
        self.overrides.retain(|(p, _)| p != part);
    }

    pub fn serialize(&self) -> String {
        let mut out = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n",
        );
        out.push_str(&format!("<Types xmlns=\"{CT_NS}\">"));
        for (ext, ct) in &self.defaults {
            out.push_str(&format!(
                "<Default Extension=\"{}\" ContentType=\"{}\"/>",
                escape_attr(ext),
                escape_attr(ct)
            ));
        }
        for (part, ct) in &self.overrides {
            out.push_str(&format!(
                "<Override PartName=\"/{}\" ContentType=\"{}\"/>",
                escape_attr(part),
                escape_attr(ct)
            ));
        }
        out.push_str("</Types>");
        out
    }
}

/// Content type for a media extension.
pub fn media_content_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rels_paths() {
        assert_eq!(rels_path_for("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(rels_path_for(""), "_rels/.rels");
    }

    #[test]
    fn targets_resolve_relative_to_source() {
        assert_eq!(resolve_target("word/document.xml", "media/image1.png"), "word/media/image1.png");
        assert_eq!(resolve_target("word/document.xml", "../customXml/item1.xml"), "customXml/item1.xml");
        assert_eq!(resolve_target("", "word/document.xml"), "word/document.xml");
        assert_eq!(resolve_target("word/document.xml", "/word/styles.xml"), "word/styles.xml");
        assert_eq!(relative_target("word/document.xml", "word/media/a.png"), "media/a.png");
    }

    #[test]
    fn relationships_survive_serialization() {
        let rels = vec![
            Relationship {
                id: "rId1".into(),
                rel_type: REL_STYLES.into(),
                target: "styles.xml".into(),
                target_mode: None,
            },
            Relationship {
                id: "rId2".into(),
                rel_type: REL_HYPERLINK.into(),
                target: "https://example.com/?a=1&b=2".into(),
                target_mode: Some("External".into()),
            },
        ];
        let xml = serialize_relationships(&rels);
        assert!(xml.contains("a=1&amp;b=2"));
        assert_eq!(parse_relationships(&xml), rels);
    }

    #[test]
    fn package_zip_round_trip() {
        let mut pkg = Package::new();
        pkg.set_xml(CONTENT_TYPES_PART, ContentTypes::minimal().serialize());
        pkg.set_xml(DOCUMENT_PART, "<w:document/>".to_string());
        pkg.set_part("word/media/a.bin", vec![0, 1, 2]);
        let bytes = pkg.to_bytes().unwrap();
        let back = Package::from_bytes(&bytes).unwrap();
        assert_eq!(back, pkg);
        assert_eq!(back.main_document_part(), DOCUMENT_PART);
    }

    #[test]
    fn content_type_overrides() {
        let mut ct = ContentTypes::minimal();
        ct.ensure_override(COMMENTS_PART, CT_COMMENTS);
        ct.ensure_default("PNG", "image/png");
        let parsed = ContentTypes::parse(&ct.serialize());
        assert_eq!(parsed, ct);
        let mut ct = parsed;
        ct.remove_override(COMMENTS_PART);
        assert_eq!(ct.overrides.len(), 1);
    }
}
