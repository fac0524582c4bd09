mod common;

use common::{DocxBuilder, PIC_NS, WP_NS, count, png_bytes, png_data_uri, read_part};
use docxide_roundtrip::model::{
    Block, Document, FieldAnnotation, Image, Inline, Paragraph, Run, RunContent, Size, TransformData,
};
use docxide_roundtrip::{Converter, ExportOptions, Package};
use pretty_assertions::assert_eq;

fn image_paragraph(image: Image) -> Block {
    Block::Paragraph(Paragraph {
        content: vec![Inline::Run(Run {
            content: vec![RunContent::Image(image)],
            ..Run::default()
        })],
        ..Paragraph::default()
    })
}

fn embedded(id: Option<u32>) -> Image {
    Image {
        src: png_data_uri(),
        id,
        size: Size {
            width: 32.0,
            height: 32.0,
        },
        ..Image::default()
    }
}

fn export(doc: Document) -> Package {
    let mut converter = Converter::new();
    converter.set_document(doc).unwrap();
    converter.export(&ExportOptions::default()).unwrap()
}

/// `(wp:docPr id, pic:cNvPr id)` for every picture in `xml`.
fn picture_ids(xml: &str) -> Vec<(u32, u32)> {
    let parsed = roxmltree::Document::parse(xml).unwrap();
    let ids = |ns: &str, name: &str| -> Vec<u32> {
        parsed
            .descendants()
            .filter(|n| n.tag_name().namespace() == Some(ns) && n.tag_name().name() == name)
            .filter_map(|n| n.attribute("id")?.parse().ok())
            .collect()
    };
    ids(WP_NS, "docPr")
        .into_iter()
        .zip(ids(PIC_NS, "cNvPr"))
        .collect()
}

#[test]
fn embedded_images_get_positive_matching_ids() {
    let mut doc = Document::default();
    doc.body.push(image_paragraph(embedded(None)));
    doc.body.push(image_paragraph(embedded(Some(12345))));
    let package = export(doc);
    let xml = package.xml("word/document.xml").unwrap();

    let ids = picture_ids(&xml);
    assert_eq!(ids.len(), 2);
    for (doc_pr, c_nv_pr) in &ids {
        assert!(*doc_pr > 0);
        assert_eq!(doc_pr, c_nv_pr);
    }
    assert_ne!(ids[0].0, 12345);
    assert_eq!(ids[1].0, 12345);

    assert!(!xml.contains(" rot="));
    assert!(!xml.contains("flipH"));
    assert!(!xml.contains("flipV"));

    assert_eq!(package.part("word/media/embedded1.png"), Some(png_bytes().as_slice()));
    assert!(!package.contains("word/media/embedded2.png"));
    let content_types = package.xml("[Content_Types].xml").unwrap();
    assert!(content_types.contains("<Default Extension=\"png\" ContentType=\"image/png\"/>"));
    let rels = package.xml("word/_rels/document.xml.rels").unwrap();
    assert_eq!(rels.matches("Target=\"media/embedded1.png\"").count(), 1);
}

#[test]
fn rotation_and_flips_are_written_when_set() {
    let mut image = embedded(None);
    image.transform_data = TransformData {
        rotation: 90.0,
        horizontal_flip: true,
        ..TransformData::default()
    };
    let mut doc = Document::default();
    doc.body.push(image_paragraph(image));
    let xml = export(doc).xml("word/document.xml").unwrap();
    assert!(xml.contains("<a:xfrm rot=\"5400000\" flipH=\"1\">"));
    assert!(!xml.contains("flipV"));
}

#[test]
fn unreachable_image_becomes_text() {
    let mut doc = Document::default();
    doc.body.push(image_paragraph(Image {
        src: String::from("word/media/missing.png"),
        description: Some(String::from("Company logo")),
        ..Image::default()
    }));
    let xml = export(doc).xml("word/document.xml").unwrap();
    assert!(!xml.contains("<w:drawing>"));
    assert!(xml.contains("<w:r><w:t>Company logo</w:t></w:r>"));
}

fn signature(image_src: &str) -> Document {
    let mut doc = Document::default();
    doc.body.push(Block::Paragraph(Paragraph {
        content: vec![Inline::FieldAnnotation(FieldAnnotation {
            field_id: String::from("sig-1"),
            field_type: String::from("signature"),
            display_label: String::from("Sign here"),
            image_src: Some(image_src.to_string()),
            ..FieldAnnotation::default()
        })],
        ..Paragraph::default()
    }));
    doc
}

#[test]
fn empty_signature_image_falls_back_to_label() {
    let xml = export(signature("data:,")).xml("word/document.xml").unwrap();
    assert!(xml.contains("<w:sdtContent><w:r><w:t>Sign here</w:t></w:r></w:sdtContent>"));
    assert!(!xml.contains("<w:drawing>"));
    assert!(xml.contains("&quot;fieldId&quot;:&quot;sig-1&quot;"));
}

#[test]
fn signature_with_image_is_a_drawing() {
    let package = export(signature(&png_data_uri()));
    let xml = package.xml("word/document.xml").unwrap();
    assert!(xml.contains("<w:sdtContent><w:r><w:drawing><wp:inline"));
    assert!(!xml.contains("<w:t>Sign here</w:t>"));
    // Sized from the decoded image: 1x1 px.
    assert!(xml.contains("<wp:extent cx=\"9525\" cy=\"9525\"/>"));
    assert!(package.contains("word/media/embedded1.png"));
}

#[test]
fn imported_picture_keeps_relationship_and_id() {
    let drawing = r#"<w:p><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="952500" cy="952500"/><wp:effectExtent l="0" t="0" r="0" b="0"/><wp:docPr id="12345" name="Logo"/><wp:cNvGraphicFramePr/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="Logo"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="rId10"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="952500" cy="952500"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#;
    let input = DocxBuilder::new(drawing)
        .media("rId10", "image1.png", png_bytes())
        .build();

    let mut converter = Converter::new();
    let doc = converter.load(&input).unwrap();
    let Block::Paragraph(p) = &doc.body[0] else {
        panic!("expected a paragraph");
    };
    let Inline::Run(run) = &p.content[0] else {
        panic!("expected a run");
    };
    let RunContent::Image(image) = &run.content[0] else {
        panic!("expected an image");
    };
    assert_eq!(image.src, "word/media/image1.png");
    assert_eq!(image.id, Some(12345));
    assert_eq!(image.size.width, 100.0);
    assert!(doc.media.contains_key("word/media/image1.png"));

    let out = converter.export_docx(&ExportOptions::default()).unwrap();
    let xml = read_part(&out, "word/document.xml").unwrap();
    assert!(xml.contains("r:embed=\"rId10\""));
    assert_eq!(picture_ids(&xml), vec![(12345, 12345)]);
    let rels = read_part(&out, "word/_rels/document.xml.rels").unwrap();
    assert_eq!(rels.matches("media/image1.png").count(), 1);
    let package = Package::from_bytes(&out).unwrap();
    assert_eq!(package.part("word/media/image1.png"), Some(png_bytes().as_slice()));
    assert!(!package.contains("word/media/embedded1.png"));
}

#[test]
fn field_annotation_tag_survives_roundtrip() {
    let body = r#"<w:p><w:sdt><w:sdtPr><w:alias w:val="Name"/><w:tag w:val="{&quot;fieldId&quot;:&quot;f1&quot;,&quot;fieldType&quot;:&quot;text&quot;,&quot;displayLabel&quot;:&quot;Full name&quot;}"/><w:id w:val="77"/></w:sdtPr><w:sdtContent><w:r><w:t>Full name</w:t></w:r></w:sdtContent></w:sdt></w:p>"#;
    let mut converter = Converter::new();
    converter.load(&DocxBuilder::new(body).build()).unwrap();

    let doc = converter.document().unwrap();
    let Block::Paragraph(p) = &doc.body[0] else {
        panic!("expected a paragraph");
    };
    let Inline::FieldAnnotation(field) = &p.content[0] else {
        panic!("expected a field annotation");
    };
    assert_eq!(field.field_id, "f1");
    assert_eq!(field.display_label, "Full name");
    assert_eq!(field.sdt_id.as_deref(), Some("77"));

    let out = converter.export_docx(&ExportOptions::default()).unwrap();
    let reloaded = {
        let mut c = Converter::new();
        c.load(&out).unwrap();
        c
    };
    let Block::Paragraph(p) = &reloaded.document().unwrap().body[0] else {
        panic!("expected a paragraph");
    };
    assert_eq!(p.content[0], Inline::FieldAnnotation(field.clone()));
}

#[test]
fn cropped_picture_keeps_unmodelled_drawing_markup() {
    const DOC_PR_EXT: &str = r#"<a:extLst><a:ext uri="{FF2B5EF4-FFF2-40B4-BE49-F238E27FC236}"><a16:creationId xmlns:a16="http://schemas.microsoft.com/office/drawing/2014/main" id="{1D2E3F40-0000-0000-0000-000000000001}"/></a:ext></a:extLst>"#;
    const PIC_LOCKS: &str = r#"<pic:cNvPicPr><a:picLocks noChangeAspect="1" noChangeArrowheads="1"/></pic:cNvPicPr>"#;
    const LUMINANCE: &str = r#"<a:lum bright="20000" contrast="-10000"/>"#;
    const CROP: &str = r#"<a:srcRect l="10000" t="5000" r="10000" b="5000"/>"#;
    const OUTLINE: &str = r#"<a:ln w="12700"><a:solidFill><a:srgbClr val="000000"/></a:solidFill></a:ln>"#;
    let drawing = format!(
        r#"<w:p><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="952500" cy="952500"/><wp:effectExtent l="0" t="0" r="0" b="0"/><wp:docPr id="7" name="Cropped">{DOC_PR_EXT}</wp:docPr><wp:cNvGraphicFramePr/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="Cropped"/>{PIC_LOCKS}</pic:nvPicPr><pic:blipFill><a:blip r:embed="rId10">{LUMINANCE}</a:blip>{CROP}<a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="952500" cy="952500"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom>{OUTLINE}</pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
    );
    let input = DocxBuilder::new(&drawing)
        .media("rId10", "image1.png", png_bytes())
        .build();

    let mut converter = Converter::new();
    let doc = converter.load(&input).unwrap();
    let Block::Paragraph(p) = &doc.body[0] else {
        panic!("expected a paragraph");
    };
    let Inline::Run(run) = &p.content[0] else {
        panic!("expected a run");
    };
    let RunContent::Image(image) = &run.content[0] else {
        panic!("expected an image");
    };
    assert_eq!(image.extras.blip_fill[0].xml, CROP);
    assert_eq!(image.extras.blip_fill[0].name, "a:srcRect");

    let out = converter.export_docx(&ExportOptions::default()).unwrap();
    let xml = read_part(&out, "word/document.xml").unwrap();
    assert!(xml.contains(&format!("<wp:docPr id=\"7\" name=\"Cropped\">{DOC_PR_EXT}</wp:docPr>")));
    assert!(xml.contains(PIC_LOCKS));
    assert!(xml.contains(&format!(
        "<a:blip r:embed=\"rId10\">{LUMINANCE}</a:blip>{CROP}<a:stretch><a:fillRect/></a:stretch></pic:blipFill>"
    )));
    assert!(xml.contains(&format!("</a:xfrm><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom>{OUTLINE}</pic:spPr>")));
    assert_eq!(count(&xml, "<a:prstGeom"), 1);
    assert!(roxmltree::Document::parse(&xml).is_ok());

    let twice = read_part(
        &{
            let mut c = Converter::new();
            c.load(&out).unwrap();
            c.export_docx(&ExportOptions::default()).unwrap()
        },
        "word/document.xml",
    )
    .unwrap();
    assert_eq!(twice, xml);
}
