use serde::Serialize;

use crate::model::Document;
use crate::package::{CORE_PROPERTIES_PART, Package};

const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const DCTERMS_NS: &str = "http://purl.org/dc/terms/";
const CP_NS: &str = "http://schemas.openxmlformats.org/package/2006/metadata/core-properties";

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    pub paragraph_count: usize,
    pub word_count: usize,
    pub comment_count: usize,
}

fn core_field(xml: &roxmltree::Document, ns: &str, name: &str) -> Option<String> {
    xml.root_element()
        .children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(ns))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Core properties from `docProps/core.xml` plus counts over the tree.
pub fn get_metadata(package: &Package, doc: &Document) -> Metadata {
    let paragraphs = doc.paragraphs();
    let mut meta = Metadata {
        paragraph_count: paragraphs.len(),
        word_count: paragraphs
            .iter()
            .map(|p| p.text().split_whitespace().count())
            .sum(),
        comment_count: doc.comments.len(),
        ..Metadata::default()
    };

    let Some(xml_content) = package.xml(CORE_PROPERTIES_PART) else {
        return meta;
    };
    match roxmltree::Document::parse(&xml_content) {
        Ok(xml) => {
            meta.title = core_field(&xml, DC_NS, "title");
            meta.creator = core_field(&xml, DC_NS, "creator");
            meta.last_modified_by = core_field(&xml, CP_NS, "lastModifiedBy");
            meta.created = core_field(&xml, DCTERMS_NS, "created");
            meta.modified = core_field(&xml, DCTERMS_NS, "modified");
        }
        Err(e) => log::warn!("Unparsable {CORE_PROPERTIES_PART}: {e}"),
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_core_properties() {
        let mut package = Package::new();
        package.set_xml(
            CORE_PROPERTIES_PART,
            r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/">
  <dc:title>Quarterly report</dc:title><dc:creator>R. Ortiz</dc:creator>
  <cp:lastModifiedBy>K. Lee</cp:lastModifiedBy>
  <dcterms:created>2024-01-02T03:04:05Z</dcterms:created>
</cp:coreProperties>"#,
        );
        let mut doc = Document::default();
        doc.append_text_paragraph("two words");
        doc.append_text_paragraph("and three more");
        let meta = get_metadata(&package, &doc);
        assert_eq!(meta.title.as_deref(), Some("Quarterly report"));
        assert_eq!(meta.last_modified_by.as_deref(), Some("K. Lee"));
        assert_eq!(meta.modified, None);
        assert_eq!(meta.paragraph_count, 2);
        assert_eq!(meta.word_count, 5);
    }
}
