mod common;

use common::{DocxBuilder, count, read_part};
use docxide_roundtrip::{Converter, ExportOptions, InsertContent, Lifecycle};
use pretty_assertions::assert_eq;

const INTRO: &str = "<w:p><w:r><w:t>Intro</w:t></w:r></w:p>";
const DASH_NUMBERING: &str = r#"<w:abstractNum w:abstractNumId="0"><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="-"/></w:lvl></w:abstractNum><w:num w:numId="7"><w:abstractNumId w:val="0"/></w:num>"#;

fn loaded(docx: &[u8]) -> Converter {
    let mut converter = Converter::new();
    converter.load(docx).unwrap();
    converter
}

#[test]
fn markdown_lists_bring_default_numbering_along() {
    common::init_logging();
    let mut converter = loaded(&DocxBuilder::new(INTRO).build());
    let added = converter
        .insert_content(InsertContent::Markdown(String::from(
            "## Steps\n\n1. mix\n2. bake\n\n- serve **hot**\n",
        )))
        .unwrap();
    assert_eq!(added, 4);

    let out = converter.export_docx(&ExportOptions::default()).unwrap();
    let xml = read_part(&out, "word/document.xml").unwrap();
    assert_eq!(count(&xml, r#"<w:numId w:val="2"/>"#), 2);
    assert_eq!(count(&xml, r#"<w:numId w:val="1"/>"#), 1);
    assert!(xml.contains(r#"<w:pStyle w:val="Heading2"/>"#));
    assert!(read_part(&out, "word/numbering.xml").is_some());
    let rels = read_part(&out, "word/_rels/document.xml.rels").unwrap();
    assert!(rels.contains("numbering.xml"));

    let reloaded = loaded(&out);
    assert_eq!(
        reloaded.to_markdown().unwrap(),
        "Intro\n\n## Steps\n\n1. mix\n2. bake\n- serve **hot**\n"
    );
}

#[test]
fn markdown_lists_leave_existing_numbering_alone() {
    let docx = DocxBuilder::new(INTRO).numbering(DASH_NUMBERING).build();
    let mut converter = loaded(&docx);
    converter
        .insert_content(InsertContent::Markdown(String::from("3. third\n4. fourth\n")))
        .unwrap();

    let out = converter.export_docx(&ExportOptions::default()).unwrap();
    let xml = read_part(&out, "word/document.xml").unwrap();
    assert!(!xml.contains("<w:numId"));
    assert_eq!(read_part(&out, "word/numbering.xml"), read_part(&docx, "word/numbering.xml"));

    let texts: Vec<String> = loaded(&out)
        .document()
        .unwrap()
        .paragraphs()
        .iter()
        .map(|p| p.text())
        .collect();
    assert_eq!(texts, vec!["Intro", "3. third", "4. fourth"]);
}

#[test]
fn plain_text_starts_a_blank_document() {
    let mut converter = Converter::new();
    converter
        .insert_content(InsertContent::Text(String::from("first\nsecond")))
        .unwrap();
    assert_eq!(converter.lifecycle(), Lifecycle::Ready);
    assert_eq!(converter.to_markdown().unwrap(), "first\n\nsecond\n");

    let out = converter.export_docx(&ExportOptions::default()).unwrap();
    assert_eq!(loaded(&out).document().unwrap().plain_text(), "first\nsecond");

    converter.close();
    assert!(converter.export_docx(&ExportOptions::default()).is_err());
    converter.load(&out).unwrap();
    assert_eq!(converter.lifecycle(), Lifecycle::Ready);
    assert_eq!(converter.document().unwrap().plain_text(), "first\nsecond");
}
