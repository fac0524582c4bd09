//! DOCX reading: `document.xml` and its side parts into a [`Document`].

pub mod comments;
mod drawing;
pub mod metadata;
pub mod numbering;
pub mod styles;

use std::collections::HashMap;

use roxmltree::Node;

use crate::comments::CommentSpan;
use crate::error::Error;
use crate::model::{
    Block, Document, FieldAnnotation, FormatChange, Hyperlink, Inline, ListRendering, NumberingRef,
    Paragraph, Passthrough, Run, RunContent, RunProperties, Size, StructuredContentBlock, StructuredContentInline,
    StructuredContentProperties, Table, TableCell, TableItem, TableRow, RowItem, TrackedChange,
    TrackedContent,
};
use crate::numbering::{ListCounters, NumberingCache, format_level_text, format_marker_text};
use crate::package::{Package, Relationship};
use crate::styles::StyleTable;
use crate::units;

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const WPD_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub(crate) const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
pub(crate) const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub(crate) const W14_NS: &str = "http://schemas.microsoft.com/office/word/2010/wordml";
pub(crate) const W15_NS: &str = "http://schemas.microsoft.com/office/word/2012/wordml";
pub(crate) const MC_NS: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";

pub(crate) fn wml<'a>(node: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

pub(crate) fn wml_attr<'a>(node: Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

/// A twips-valued `w:` attribute, accepting unit suffixes.
pub(crate) fn twips_attr(node: Node, attr: &str) -> Option<f64> {
    node.attribute((WML_NS, attr)).and_then(units::parse_twips)
}

fn is_wml(node: &Node) -> bool {
    node.tag_name().namespace() == Some(WML_NS)
}

/// The element's qualified name as written in the source.
fn qualified_name(src: &str, node: Node) -> String {
    src[node.range()]
        .trim_start_matches('<')
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Capture `node` verbatim from the source text.
pub(crate) fn passthrough(src: &str, node: Node) -> Passthrough {
    Passthrough {
        name: qualified_name(src, node),
        xml: src[node.range()].to_string(),
    }
}

fn relationships_by_id(package: &Package, part: &str) -> HashMap<String, Relationship> {
    package
        .relationships(part)
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect()
}

/// Walks one part (`document.xml` or `comments.xml`) into model nodes.
pub(crate) struct PartImporter<'a> {
    src: &'a str,
    part: String,
    rels: HashMap<String, Relationship>,
    styles: &'a StyleTable,
    numbering: &'a NumberingCache,
    counters: ListCounters,
    text_offset: usize,
    span_starts: HashMap<String, usize>,
    pub(crate) spans: HashMap<String, CommentSpan>,
    pub(crate) image_parts: Vec<String>,
}

impl<'a> PartImporter<'a> {
    pub(crate) fn new(
        package: &Package,
        part: &str,
        src: &'a str,
        styles: &'a StyleTable,
        numbering: &'a NumberingCache,
    ) -> Self {
        Self {
            src,
            part: part.to_string(),
            rels: relationships_by_id(package, part),
            styles,
            numbering,
            counters: ListCounters::default(),
            text_offset: 0,
            span_starts: HashMap::new(),
            spans: HashMap::new(),
            image_parts: Vec::new(),
        }
    }

    fn passthrough(&self, node: Node) -> Passthrough {
        passthrough(self.src, node)
    }

    pub(crate) fn blocks(&mut self, parent: Node) -> Vec<Block> {
        let mut blocks = Vec::new();
        for child in parent.children().filter(|n| n.is_element()) {
            let block = match child.tag_name().name() {
                "p" if is_wml(&child) => Block::Paragraph(self.paragraph(child)),
                "tbl" if is_wml(&child) => Block::Table(self.table(child)),
                "sdt" if is_wml(&child) => Block::StructuredContent(StructuredContentBlock {
                    properties: self.sdt_properties(child),
                    content: wml(child, "sdtContent")
                        .map(|c| self.blocks(c))
                        .unwrap_or_default(),
                }),
                _ => Block::PassthroughBlock(self.passthrough(child)),
            };
            blocks.push(block);
        }
        blocks
    }

    fn paragraph(&mut self, node: Node) -> Paragraph {
        let mut p = Paragraph {
            para_id: node.attribute((W14_NS, "paraId")).map(str::to_string),
            ..Paragraph::default()
        };
        let mut num_pr: Option<(Option<String>, Option<u8>)> = None;

        if let Some(ppr) = wml(node, "pPr") {
            for child in ppr.children().filter(|n| n.is_element()) {
                let name = if is_wml(&child) { child.tag_name().name() } else { "" };
                match name {
                    "pStyle" if child.attributes().len() == 1 => {
                        p.style_id = child.attribute((WML_NS, "val")).map(str::to_string);
                    }
                    "numPr" if child.children().filter(|n| n.is_element()).all(|n| {
                        matches!(n.tag_name().name(), "ilvl" | "numId")
                    }) =>
                    {
                        num_pr = styles::parse_num_pr(ppr);
                        if matches!(num_pr, Some((None, None))) {
                            p.extra_properties.push(self.passthrough(child));
                        }
                    }
                    "ind" => {
                        p.indent = Some(styles::parse_indent(child).twips_to_pixels());
                        if !child.attributes().all(|a| {
                            matches!(a.name(), "left" | "start" | "right" | "end" | "firstLine" | "hanging")
                        }) {
                            p.extra_properties.push(self.passthrough(child));
                        }
                    }
                    "jc" if child.attributes().len() == 1 => {
                        p.justification = child.attribute((WML_NS, "val")).map(str::to_string);
                    }
                    "tabs" => {
                        p.tabs = styles::parse_tab_stops(ppr)
                            .into_iter()
                            .map(|mut t| {
                                t.position = units::twips_to_pixels(t.position);
                                t
                            })
                            .collect();
                    }
                    "rPr" => {
                        p.mark_properties = Some(styles::parse_run_properties(child, self.src));
                    }
                    _ => p.extra_properties.push(self.passthrough(child)),
                }
            }
        }

        if let Some((num_id, ilvl)) = &num_pr
            && (num_id.is_some() || ilvl.is_some())
        {
            p.numbering = Some(NumberingRef {
                num_id: num_id.clone(),
                level: ilvl.unwrap_or(0),
            });
        }
        p.list_rendering = self.list_rendering(p.style_id.as_deref(), num_pr.as_ref());

        p.content = self.inlines(node);
        // Paragraph boundary.
        self.text_offset += 1;
        p
    }

    /// Marker for a numbered paragraph, from direct `w:numPr` or the style's.
    fn list_rendering(
        &mut self,
        style_id: Option<&str>,
        num_pr: Option<&(Option<String>, Option<u8>)>,
    ) -> Option<ListRendering> {
        let style_num = self
            .styles
            .effective_paragraph_style(style_id)
            .and_then(|id| self.styles.style_numbering(id));
        let num_id = num_pr
            .and_then(|(id, _)| id.clone())
            .or_else(|| style_num.as_ref().and_then(|n| n.num_id.clone()))?;
        if num_id == "0" {
            return None;
        }
        let ilvl = num_pr
            .and_then(|(_, l)| *l)
            .or_else(|| style_num.as_ref().map(|n| n.level))
            .unwrap_or(0);
        let level = self.numbering.level(&num_id, ilvl)?;
        let path = self.counters.advance(self.numbering, &num_id, ilvl)?;
        let marker_text = if level.num_fmt == "bullet" {
            format_marker_text(&level.num_fmt, &level.lvl_text, &path)
        } else {
            let formats = self.numbering.level_formats(&num_id);
            let formats: Vec<&str> = formats.iter().map(String::as_str).collect();
            format_level_text(&level.lvl_text, &path, &formats)
        };
        Some(ListRendering {
            marker_text,
            path,
            num_fmt: level.num_fmt,
            justification: level.justification,
            suffix: level.suffix,
        })
    }

    fn inlines(&mut self, parent: Node) -> Vec<Inline> {
        let mut out = Vec::new();
        for child in parent.children().filter(|n| n.is_element()) {
            if !is_wml(&child) {
                out.push(Inline::PassthroughInline(self.passthrough(child)));
                continue;
            }
            let inline = match child.tag_name().name() {
                "pPr" => continue,
                "r" => self.run(child),
                "hyperlink" => self.hyperlink(child),
                "ins" => Inline::TrackedInsert(TrackedContent {
                    change: tracked_change(child),
                    content: self.inlines(child),
                }),
                "del" => Inline::TrackedDelete(TrackedContent {
                    change: tracked_change(child),
                    content: self.inlines(child),
                }),
                "commentRangeStart" => match child.attribute((WML_NS, "id")) {
                    Some(id) => {
                        let comment_id = crate::comments::Comment::internal_id(id);
                        self.span_starts.insert(comment_id.clone(), self.text_offset);
                        Inline::CommentRangeStart { comment_id }
                    }
                    None => Inline::PassthroughInline(self.passthrough(child)),
                },
                "commentRangeEnd" => match child.attribute((WML_NS, "id")) {
                    Some(id) => {
                        let comment_id = crate::comments::Comment::internal_id(id);
                        let start = self
                            .span_starts
                            .get(&comment_id)
                            .copied()
                            .unwrap_or(self.text_offset);
                        self.spans.insert(
                            comment_id.clone(),
                            CommentSpan {
                                start,
                                end: self.text_offset,
                            },
                        );
                        Inline::CommentRangeEnd { comment_id }
                    }
                    None => Inline::PassthroughInline(self.passthrough(child)),
                },
                "sdt" => self.sdt_inline(child),
                _ => Inline::PassthroughInline(self.passthrough(child)),
            };
            out.push(inline);
        }
        out
    }

    fn hyperlink(&mut self, node: Node) -> Inline {
        let known = node
            .attributes()
            .all(|a| matches!(a.name(), "id" | "anchor" | "tooltip" | "history"));
        let target = match node.attribute((REL_NS, "id")) {
            Some(rid) => match self.rels.get(rid) {
                Some(rel) => Some(rel.target.clone()),
                None => {
                    log::warn!("Hyperlink relationship {rid} not found in {}", self.part);
                    None
                }
            },
            None => None,
        };
        if !known || (node.attribute((REL_NS, "id")).is_some() && target.is_none()) {
            return Inline::PassthroughInline(self.passthrough(node));
        }
        Inline::Hyperlink(Hyperlink {
            target,
            anchor: node.attribute((WML_NS, "anchor")).map(str::to_string),
            tooltip: node.attribute((WML_NS, "tooltip")).map(str::to_string),
            history: node.attribute((WML_NS, "history")).map(str::to_string),
            content: self.inlines(node),
        })
    }

    fn run(&mut self, node: Node) -> Inline {
        let mut run = Run::default();
        let mut reference: Option<String> = None;

        for child in node.children().filter(|n| n.is_element()) {
            if !is_wml(&child) {
                run.content.push(RunContent::Passthrough(self.passthrough(child)));
                continue;
            }
            match child.tag_name().name() {
                "rPr" => {
                    run.properties = styles::parse_run_properties(child, self.src);
                    if let Some(change) = wml(child, "rPrChange") {
                        run.format_change = Some(FormatChange {
                            change: tracked_change(change),
                            previous: wml(change, "rPr")
                                .map(|r| styles::parse_run_properties(r, self.src))
                                .unwrap_or_default(),
                        });
                        run.properties.extra.retain(|e| e.name != "w:rPrChange");
                    }
                }
                "t" | "delText" => {
                    let text = child.text().unwrap_or_default().to_string();
                    self.text_offset += text.chars().count();
                    run.content.push(RunContent::Text(text));
                }
                "tab" if child.attributes().len() == 0 => {
                    self.text_offset += 1;
                    run.content.push(RunContent::Tab);
                }
                "br" if child.attributes().all(|a| a.name() == "type") => {
                    run.content.push(RunContent::Break {
                        kind: child.attribute((WML_NS, "type")).map(str::to_string),
                    });
                }
                "fldChar"
                    if child.children().all(|c| !c.is_element())
                        && child.attributes().all(|a| a.name() == "fldCharType") =>
                {
                    match child.attribute((WML_NS, "fldCharType")) {
                        Some(kind) => run.content.push(RunContent::FieldChar(kind.to_string())),
                        None => run.content.push(RunContent::Passthrough(self.passthrough(child))),
                    }
                }
                "instrText" | "delInstrText" => {
                    run.content.push(RunContent::InstrText(
                        child.text().unwrap_or_default().to_string(),
                    ));
                }
                "drawing" => {
                    match drawing::parse_drawing(child, self.src, &self.part, &self.rels) {
                        Some(image) => {
                            self.image_parts.push(image.src.clone());
                            run.content.push(RunContent::Image(image));
                        }
                        None => run.content.push(RunContent::Passthrough(self.passthrough(child))),
                    }
                }
                "commentReference" => {
                    reference = child
                        .attribute((WML_NS, "id"))
                        .map(crate::comments::Comment::internal_id);
                    if reference.is_none() {
                        run.content.push(RunContent::Passthrough(self.passthrough(child)));
                    }
                }
                _ => run.content.push(RunContent::Passthrough(self.passthrough(child))),
            }
        }

        match reference {
            Some(comment_id) if run.content.is_empty() && run.format_change.is_none() => {
                Inline::CommentReference {
                    comment_id,
                    properties: (run.properties != RunProperties::default()).then_some(run.properties),
                }
            }
            // A reference sharing its run with other content is kept verbatim.
            Some(_) => Inline::PassthroughInline(self.passthrough(node)),
            None => Inline::Run(run),
        }
    }

    fn sdt_properties(&self, sdt: Node) -> StructuredContentProperties {
        let mut props = StructuredContentProperties::default();
        let Some(sdt_pr) = wml(sdt, "sdtPr") else {
            return props;
        };
        for child in sdt_pr.children().filter(|n| n.is_element()) {
            let simple = is_wml(&child) && child.attributes().len() == 1;
            match child.tag_name().name() {
                "id" if simple => props.id = child.attribute((WML_NS, "val")).map(str::to_string),
                "alias" if simple => props.alias = child.attribute((WML_NS, "val")).map(str::to_string),
                "tag" if simple => props.tag = child.attribute((WML_NS, "val")).map(str::to_string),
                _ => props.extra.push(self.passthrough(child)),
            }
        }
        props
    }

    fn sdt_inline(&mut self, node: Node) -> Inline {
        let properties = self.sdt_properties(node);
        let content = wml(node, "sdtContent")
            .map(|c| self.inlines(c))
            .unwrap_or_default();
        if let Some(field) = field_annotation(&properties, &content) {
            return Inline::FieldAnnotation(field);
        }
        Inline::StructuredContent(StructuredContentInline { properties, content })
    }

    fn table(&mut self, node: Node) -> Table {
        let mut table = Table::default();
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "tblPr" if is_wml(&child) => {
                    table.style_id = wml_attr(child, "tblStyle").map(str::to_string);
                    table.properties = Some(self.passthrough(child));
                }
                "tblGrid" if is_wml(&child) => {
                    table.grid = child
                        .children()
                        .filter(|n| n.tag_name().name() == "gridCol")
                        .map(|n| twips_attr(n, "w").map(units::twips_to_pixels).unwrap_or(0.0))
                        .collect();
                }
                "tr" if is_wml(&child) => table.rows.push(TableItem::Row(self.table_row(child))),
                _ => table.rows.push(TableItem::Passthrough(self.passthrough(child))),
            }
        }
        table
    }

    fn table_row(&mut self, node: Node) -> TableRow {
        let mut row = TableRow::default();
        for child in node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "tblPrEx" | "trPr" if is_wml(&child) => row.properties.push(self.passthrough(child)),
                "tc" if is_wml(&child) => row.cells.push(RowItem::Cell(self.table_cell(child))),
                _ => row.cells.push(RowItem::Passthrough(self.passthrough(child))),
            }
        }
        row
    }

    fn table_cell(&mut self, node: Node) -> TableCell {
        let mut cell = TableCell::default();
        if let Some(tc_pr) = wml(node, "tcPr") {
            for child in tc_pr.children().filter(|n| n.is_element()) {
                let name = if is_wml(&child) { child.tag_name().name() } else { "" };
                match name {
                    "tcW" if child.attribute((WML_NS, "type")) == Some("dxa") => {
                        cell.width = twips_attr(child, "w").map(units::twips_to_pixels);
                    }
                    "gridSpan" => {
                        cell.grid_span = child
                            .attribute((WML_NS, "val"))
                            .and_then(|v| v.parse().ok())
                            .unwrap_or(1);
                    }
                    "vMerge" => {
                        cell.v_merge = Some(
                            child
                                .attribute((WML_NS, "val"))
                                .unwrap_or("continue")
                                .to_string(),
                        );
                    }
                    _ => cell.extra_properties.push(self.passthrough(child)),
                }
            }
        }
        cell.content = self
            .blocks(node)
            .into_iter()
            .filter(|b| !matches!(b, Block::PassthroughBlock(p) if p.name == "w:tcPr"))
            .collect();
        cell
    }
}

fn tracked_change(node: Node) -> TrackedChange {
    TrackedChange {
        id: node.attribute((WML_NS, "id")).map(str::to_string),
        author: node.attribute((WML_NS, "author")).map(str::to_string),
        date: node.attribute((WML_NS, "date")).map(str::to_string),
    }
}

/// An inline content tag whose `w:tag` is a JSON object with a `fieldId`.
fn field_annotation(props: &StructuredContentProperties, content: &[Inline]) -> Option<FieldAnnotation> {
    let tag = props.tag.as_deref()?;
    if !tag.trim_start().starts_with('{') {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_str(tag) {
        Ok(v) => v,
        Err(e) => {
            log::debug!("Content tag is not field JSON: {e}");
            return None;
        }
    };
    let obj = value.as_object()?;
    let field_id = match obj.get("fieldId")? {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let get = |key: &str| obj.get(key).and_then(|v| v.as_str()).map(str::to_string);

    let mut run_properties = Default::default();
    let mut text = String::new();
    let mut image: Option<(String, Size)> = None;
    for inline in content {
        if let Inline::Run(run) = inline {
            if text.is_empty() && image.is_none() {
                run_properties = run.properties.clone();
            }
            for c in &run.content {
                match c {
                    RunContent::Text(t) => text.push_str(t),
                    RunContent::Image(img) => image = Some((img.src.clone(), img.size)),
                    _ => {}
                }
            }
        }
    }

    Some(FieldAnnotation {
        field_id,
        field_type: get("fieldType").unwrap_or_else(|| String::from("text")),
        display_label: get("displayLabel").unwrap_or(text),
        image_src: get("imageSrc").or_else(|| image.as_ref().map(|(src, _)| src.clone())),
        size: image.map(|(_, size)| size),
        sdt_id: props.id.clone(),
        alias: props.alias.clone(),
        run_properties,
    })
}

/// Collect `(prefix, uri)` declarations and `mc:Ignorable` of a part's root.
pub(crate) fn root_namespaces(root: Node) -> (Vec<(String, String)>, Option<String>) {
    let namespaces = root
        .namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .map(|ns| (ns.name().unwrap_or_default().to_string(), ns.uri().to_string()))
        .collect();
    let ignorable = root.attribute((MC_NS, "Ignorable")).map(str::to_string);
    (namespaces, ignorable)
}

/// Build the structured document from a package.
///
/// Fails only when the main part is missing or unparsable, or has no
/// `w:body`. Everything else degrades to defaults or passthrough nodes.
pub fn import_document(
    package: &Package,
    styles: &StyleTable,
    numbering: &NumberingCache,
) -> Result<Document, Error> {
    let part = package.main_document_part();
    let Some(xml_content) = package.xml(&part) else {
        return Err(Error::InvalidDocx(format!("missing main document part {part}")));
    };
    let xml = roxmltree::Document::parse(&xml_content)?;
    let root = xml.root_element();
    let Some(body) = wml(root, "body") else {
        return Err(Error::InvalidDocx(String::from("document has no w:body")));
    };

    let (namespaces, ignorable) = root_namespaces(root);
    let preamble: Vec<Passthrough> = root
        .children()
        .filter(|n| n.is_element() && !(is_wml(n) && n.tag_name().name() == "body"))
        .map(|n| passthrough(&xml_content, n))
        .collect();

    let mut importer = PartImporter::new(package, &part, &xml_content, styles, numbering);
    let mut body_blocks = importer.blocks(body);
    let section_properties = match body_blocks.last() {
        Some(Block::PassthroughBlock(p)) if p.name == "w:sectPr" => match body_blocks.pop() {
            Some(Block::PassthroughBlock(p)) => Some(p),
            _ => None,
        },
        _ => None,
    };

    let mut media = std::collections::BTreeMap::new();
    for name in &importer.image_parts {
        match package.part(name) {
            Some(data) => {
                media.insert(name.clone(), data.to_vec());
            }
            None => log::warn!("Image part {name} is missing from the package"),
        }
    }

    let comments_part = comments::import_comments(package, styles, numbering, &importer.spans);

    Ok(Document {
        body: body_blocks,
        section_properties,
        preamble,
        namespaces,
        ignorable,
        comments: comments_part.comments,
        comment_origin: comments_part.origin,
        comment_namespaces: comments_part.namespaces,
        comment_ignorable: comments_part.ignorable,
        media,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_keep_prefix() {
        let src = r#"<w:document xmlns:w="urn:w" xmlns:w14="urn:w14"><w14:foo a="1"/><w:bar>x</w:bar></w:document>"#;
        let doc = roxmltree::Document::parse(src).unwrap();
        let kids: Vec<Passthrough> = doc
            .root_element()
            .children()
            .map(|n| passthrough(src, n))
            .collect();
        assert_eq!(kids[0].name, "w14:foo");
        assert_eq!(kids[0].xml, r#"<w14:foo a="1"/>"#);
        assert_eq!(kids[1].name, "w:bar");
        assert_eq!(kids[1].xml, "<w:bar>x</w:bar>");
    }

    #[test]
    fn field_tag_json() {
        let props = StructuredContentProperties {
            id: Some("7".into()),
            tag: Some(r#"{"fieldId":"sig-1","fieldType":"signature","displayLabel":"Sign here"}"#.into()),
            ..StructuredContentProperties::default()
        };
        let field = field_annotation(&props, &[]).unwrap();
        assert_eq!(field.field_id, "sig-1");
        assert!(field.is_image_like());
        assert_eq!(field.sdt_id.as_deref(), Some("7"));

        let plain = StructuredContentProperties {
            tag: Some("customer-name".into()),
            ..StructuredContentProperties::default()
        };
        assert!(field_annotation(&plain, &[]).is_none());
    }
}
