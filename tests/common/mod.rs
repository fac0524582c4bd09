#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const W14_NS: &str = "http://schemas.microsoft.com/office/word/2010/wordml";
pub const W15_NS: &str = "http://schemas.microsoft.com/office/word/2012/wordml";
pub const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const CT_BASE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml";

const DOCUMENT_OPEN: &str = concat!(
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#,
    r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
    r#" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing""#,
    r#" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
    r#" xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture""#,
    r#" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml""#,
    r#" xmlns:w15="http://schemas.microsoft.com/office/word/2012/wordml""#,
    r#" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006""#,
    r#" mc:Ignorable="w14 w15">"#,
);

pub const COMMENTS_OPEN: &str = concat!(
    r#"<w:comments xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#,
    r#" xmlns:w14="http://schemas.microsoft.com/office/word/2010/wordml">"#,
);

pub const COMMENTS_EX_OPEN: &str =
    r#"<w15:commentsEx xmlns:w15="http://schemas.microsoft.com/office/word/2012/wordml">"#;

pub const WML_OPEN_STYLES: &str =
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#;

pub const WML_OPEN_NUMBERING: &str =
    r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// `document.xml` around `body` (which should include any `w:sectPr`).
pub fn document_xml(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n{DOCUMENT_OPEN}<w:body>{body}</w:body></w:document>"
    )
}

struct SidePart {
    name: String,
    data: Vec<u8>,
    rel: Option<(String, String)>,
    content_type: Option<String>,
}

/// Assembles a DOCX package in memory.
pub struct DocxBuilder {
    document: String,
    parts: Vec<SidePart>,
    document_rels: Vec<(String, String, String)>,
}

impl DocxBuilder {
    pub fn new(body: &str) -> Self {
        Self {
            document: document_xml(body),
            parts: Vec::new(),
            document_rels: Vec::new(),
        }
    }

    fn side_part(mut self, name: &str, kind: &str, xml: &str) -> Self {
        self.parts.push(SidePart {
            name: format!("word/{name}"),
            data: xml.as_bytes().to_vec(),
            rel: Some((format!("{REL_BASE}/{kind}"), name.to_string())),
            content_type: Some(format!("{CT_BASE}.{kind}+xml")),
        });
        self
    }

    pub fn styles(self, inner: &str) -> Self {
        let xml = format!("{WML_OPEN_STYLES}{inner}</w:styles>");
        self.side_part("styles.xml", "styles", &xml)
    }

    pub fn numbering(self, inner: &str) -> Self {
        let xml = format!("{WML_OPEN_NUMBERING}{inner}</w:numbering>");
        self.side_part("numbering.xml", "numbering", &xml)
    }

    pub fn comments(self, inner: &str) -> Self {
        self.comments_xml(&format!("{COMMENTS_OPEN}{inner}</w:comments>"))
    }

    /// A comments part with its own root element.
    pub fn comments_xml(self, xml: &str) -> Self {
        self.side_part("comments.xml", "comments", xml)
    }

    pub fn comments_extended(mut self, inner: &str) -> Self {
        self.parts.push(SidePart {
            name: String::from("word/commentsExtended.xml"),
            data: format!("{COMMENTS_EX_OPEN}{inner}</w15:commentsEx>").into_bytes(),
            rel: Some((
                String::from("http://schemas.microsoft.com/office/2011/relationships/commentsExtended"),
                String::from("commentsExtended.xml"),
            )),
            content_type: Some(format!("{CT_BASE}.commentsExtended+xml")),
        });
        self
    }

    /// A media part referenced from the document as `rel_id`.
    pub fn media(mut self, rel_id: &str, name: &str, data: Vec<u8>) -> Self {
        self.parts.push(SidePart {
            name: format!("word/media/{name}"),
            data,
            rel: None,
            content_type: None,
        });
        self.document_rels.push((
            rel_id.to_string(),
            format!("{REL_BASE}/image"),
            format!("media/{name}"),
        ));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut rels = String::from(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        let mut n = 1;
        for part in &self.parts {
            if let Some((rel_type, target)) = &part.rel {
                rels.push_str(&format!(
                    r#"<Relationship Id="rId{n}" Type="{rel_type}" Target="{target}"/>"#
                ));
                n += 1;
            }
        }
        for (id, rel_type, target) in &self.document_rels {
            rels.push_str(&format!(
                r#"<Relationship Id="{id}" Type="{rel_type}" Target="{target}"/>"#
            ));
        }
        rels.push_str("</Relationships>");

        let mut content_types = String::from(
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/>"#,
        );
        content_types.push_str(&format!(
            r#"<Override PartName="/word/document.xml" ContentType="{CT_BASE}.document.main+xml"/>"#
        ));
        for part in &self.parts {
            if let Some(ct) = &part.content_type {
                content_types.push_str(&format!(
                    r#"<Override PartName="/{}" ContentType="{ct}"/>"#,
                    part.name
                ));
            }
        }
        content_types.push_str("</Types>");

        let package_rels = format!(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_BASE}/officeDocument" Target="word/document.xml"/></Relationships>"#
        );

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        let mut add = |name: &str, data: &[u8]| {
            writer.start_file(name, options).unwrap();
            writer.write_all(data).unwrap();
        };
        add("[Content_Types].xml", content_types.as_bytes());
        add("_rels/.rels", package_rels.as_bytes());
        add("word/document.xml", self.document.as_bytes());
        add("word/_rels/document.xml.rels", rels.as_bytes());
        for part in &self.parts {
            add(&part.name, &part.data);
        }
        writer.finish().unwrap().into_inner()
    }
}

/// A part of a DOCX byte stream as text.
pub fn read_part(docx: &[u8], name: &str) -> Option<String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut file = zip.by_name(name).ok()?;
    let mut out = String::new();
    file.read_to_string(&mut out).unwrap();
    Some(out)
}

pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// A 1x1 PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::new(1, 1);
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

pub fn png_data_uri() -> String {
    use base64::Engine;
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png_bytes())
    )
}
