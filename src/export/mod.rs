//! DOCX writing: the structured document back into package parts.
//!
//! Parts the exporter does not own (styles, settings, headers, theme, ...)
//! are copied from the base package unchanged. `document.xml`, its
//! relationships, the comment parts and `[Content_Types].xml` are rebuilt.

pub(crate) mod comments;
pub mod drawing;
pub mod numbering;
pub mod rels;
pub mod run;
pub mod xml;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Write as _;

use crate::comments::export_origin;
use crate::docx::{DML_NS, MC_NS, REL_NS, W14_NS, W15_NS, WML_NS, WPD_NS};
use crate::error::Error;
use crate::model::{
    Block, Document, FieldAnnotation, Hyperlink, Image, Indent, Inline, Paragraph, RowItem, Run,
    RunContent, Size, StructuredContentProperties, TabStop, Table, TableCell, TableItem, TrackedChange,
};
use crate::numbering::NumberingCache;
use crate::package::{
    COMMENTS_EXTENDED_PART, COMMENTS_PART, CONTENT_TYPES_PART, CT_COMMENTS, CT_COMMENTS_EXTENDED,
    CT_DOCUMENT, CT_NUMBERING, ContentTypes, NUMBERING_PART, PACKAGE_RELS_PART, Package,
    REL_COMMENTS, REL_COMMENTS_EXTENDED, REL_HYPERLINK, REL_IMAGE, REL_NUMBERING,
    REL_OFFICE_DOCUMENT, Relationship, media_content_type, relative_target, rels_path_for,
    serialize_relationships,
};
use crate::units::{format_number, pixels_to_twips};

use self::comments::{
    CommentPlan, comment_body, comment_open, remove_comment_parts, serialize_comments_extended,
};
use self::drawing::{XmlElement, decode_data_uri, image_size, translate_image};
use self::rels::RelationshipAllocator;
use self::run::{change_attributes, write_run_properties};
use self::xml::{PPR_ORDER, TCPR_ORDER, attr, ordered_children, text_element};

pub(crate) const XML_DECLARATION: &str =
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n";

const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

/// Prefixes the writer itself emits. Added to the root when the source
/// document did not declare them.
const DEFAULT_NAMESPACES: &[(&str, &str)] = &[
    ("w", WML_NS),
    ("r", REL_NS),
    ("wp", WPD_NS),
    ("a", DML_NS),
    ("pic", PIC_NS),
    ("w14", W14_NS),
    ("w15", W15_NS),
    ("mc", MC_NS),
];

/// Size used for an image field whose payload has no decodable dimensions.
const FALLBACK_IMAGE_SIZE: Size = Size {
    width: 100.0,
    height: 100.0,
};

/// How comments are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CommentsExportMode {
    /// Comment parts and range markers are regenerated from the comment list.
    #[default]
    External,
    /// Comment markers and parts are stripped.
    Clean,
}

#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    pub comments: CommentsExportMode,
}

/// `w:ind` from an indent in twips. An attribute is written when its value
/// is non-zero or was set explicitly; with none to write, nothing is.
pub(crate) fn write_indent(out: &mut String, indent: &Indent) -> Result<(), Error> {
    let mut attrs = String::new();
    for (name, value, explicit) in [
        ("w:left", indent.left, indent.explicit_left),
        ("w:right", indent.right, indent.explicit_right),
        ("w:firstLine", indent.first_line, indent.explicit_first_line),
        ("w:hanging", indent.hanging, indent.explicit_hanging),
    ] {
        if let Some(v) = value
            && (v != 0.0 || explicit)
        {
            write!(attrs, " {name}=\"{}\"", format_number(v))?;
        }
    }
    if !attrs.is_empty() {
        write!(out, "<w:ind{attrs}/>")?;
    }
    Ok(())
}

/// `w:tabs` from stops in twips.
pub(crate) fn write_tabs(out: &mut String, tabs: &[TabStop]) -> Result<(), Error> {
    if tabs.is_empty() {
        return Ok(());
    }
    out.push_str("<w:tabs>");
    for tab in tabs {
        write!(
            out,
            "<w:tab{} w:pos=\"{}\"",
            attr("w:val", &tab.alignment),
            format_number(tab.position)
        )?;
        if let Some(leader) = &tab.leader {
            out.push_str(&attr("w:leader", leader));
        }
        out.push_str("/>");
    }
    out.push_str("</w:tabs>");
    Ok(())
}

/// Hands out positive ids not already in use.
#[derive(Debug, Default)]
struct IdAllocator {
    used: HashSet<u32>,
    next: u32,
}

impl IdAllocator {
    fn reserve(&mut self, id: u32) {
        self.used.insert(id);
    }

    fn allocate(&mut self) -> u32 {
        loop {
            self.next += 1;
            if self.used.insert(self.next) {
                return self.next;
            }
        }
    }
}

/// Ids and flags gathered from the tree before writing.
#[derive(Debug, Default)]
struct Survey {
    image_ids: HashSet<u32>,
    change_ids: HashSet<u32>,
    referenced_comments: HashSet<String>,
    para_ids: HashSet<String>,
    uses_numbering: bool,
}

impl Survey {
    fn blocks(&mut self, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(p) => {
                    if let Some(id) = &p.para_id {
                        self.para_ids.insert(id.clone());
                    }
                    self.uses_numbering |= p.numbering.is_some();
                    self.inlines(&p.content);
                }
                Block::Table(t) => {
                    for item in &t.rows {
                        let TableItem::Row(row) = item else { continue };
                        for cell in &row.cells {
                            if let RowItem::Cell(cell) = cell {
                                self.blocks(&cell.content);
                            }
                        }
                    }
                }
                Block::StructuredContent(sdt) => self.blocks(&sdt.content),
                Block::PassthroughBlock(_) => {}
            }
        }
    }

    fn change(&mut self, change: &TrackedChange) {
        if let Some(id) = change.id.as_deref().and_then(|v| v.parse().ok()) {
            self.change_ids.insert(id);
        }
    }

    fn inlines(&mut self, inlines: &[Inline]) {
        for inline in inlines {
            match inline {
                Inline::Run(run) => {
                    if let Some(fc) = &run.format_change {
                        self.change(&fc.change);
                    }
                    for c in &run.content {
                        if let RunContent::Image(Image { id: Some(id), .. }) = c {
                            self.image_ids.insert(*id);
                        }
                    }
                }
                Inline::Hyperlink(h) => self.inlines(&h.content),
                Inline::TrackedInsert(t) | Inline::TrackedDelete(t) => {
                    self.change(&t.change);
                    self.inlines(&t.content);
                }
                Inline::StructuredContent(s) => self.inlines(&s.content),
                Inline::CommentReference { comment_id, .. } => {
                    self.referenced_comments.insert(comment_id.clone());
                }
                Inline::CommentRangeStart { .. }
                | Inline::CommentRangeEnd { .. }
                | Inline::FieldAnnotation(_)
                | Inline::PassthroughInline(_) => {}
            }
        }
    }
}

/// State shared by every part written in one export.
struct ExportContext<'a> {
    mode: CommentsExportMode,
    base: Option<&'a Package>,
    media: BTreeMap<String, Vec<u8>>,
    used_media: BTreeSet<String>,
    data_uri_parts: HashMap<String, String>,
    drawing_ids: IdAllocator,
    change_ids: IdAllocator,
    comment_plan: CommentPlan,
    referenced_comments: HashSet<String>,
    uses_numbering: bool,
}

impl<'a> ExportContext<'a> {
    fn new(doc: &Document, base: Option<&'a Package>, options: &ExportOptions) -> Self {
        let mut survey = Survey::default();
        survey.blocks(&doc.body);
        let uses_numbering = survey.uses_numbering;
        let body_para_ids = survey.para_ids.clone();
        for c in &doc.comments {
            survey.blocks(&c.text_json);
        }
        let mut drawing_ids = IdAllocator::default();
        survey.image_ids.iter().for_each(|id| drawing_ids.reserve(*id));
        let mut change_ids = IdAllocator::default();
        survey.change_ids.iter().for_each(|id| change_ids.reserve(*id));

        Self {
            mode: options.comments,
            base,
            media: doc.media.clone(),
            used_media: BTreeSet::new(),
            data_uri_parts: HashMap::new(),
            drawing_ids,
            change_ids,
            comment_plan: CommentPlan::new(&doc.comments, &body_para_ids),
            referenced_comments: survey.referenced_comments,
            uses_numbering,
        }
    }

    fn media_bytes(&self, part: &str) -> Option<&[u8]> {
        self.media
            .get(part)
            .map(Vec::as_slice)
            .or_else(|| self.base.and_then(|b| b.part(part)))
    }

    /// Package part holding the image at `src`: an existing media part, or a
    /// new one for a decodable `data:` URI.
    fn media_part(&mut self, src: &str) -> Option<String> {
        if src.starts_with("data:") {
            if let Some(part) = self.data_uri_parts.get(src) {
                return Some(part.clone());
            }
            let (data, format) = decode_data_uri(src)?;
            let ext = format.extensions_str().first().copied().unwrap_or("bin");
            let mut n = self.data_uri_parts.len() + 1;
            let part = loop {
                let candidate = format!("word/media/embedded{n}.{ext}");
                if self.media_bytes(&candidate).is_none() {
                    break candidate;
                }
                n += 1;
            };
            self.media.insert(part.clone(), data);
            self.data_uri_parts.insert(src.to_string(), part.clone());
            return Some(part);
        }
        if self.media_bytes(src).is_some() {
            return Some(src.to_string());
        }
        log::warn!("Image source {src} is not in the package; image dropped");
        None
    }

    fn change_id(&mut self, change: &TrackedChange) -> u32 {
        match change.id.as_deref().and_then(|v| v.parse().ok()) {
            Some(id) => id,
            None => self.change_ids.allocate(),
        }
    }

    fn live_comment_id(&self, comment_id: &str) -> Option<u32> {
        if self.mode == CommentsExportMode::Clean {
            return None;
        }
        self.comment_plan.ids.get(comment_id).copied()
    }
}

/// Writes the blocks of one part, collecting that part's relationships.
struct PartWriter<'c, 'a> {
    ctx: &'c mut ExportContext<'a>,
    part: String,
    rels: RelationshipAllocator,
    out: String,
}

impl<'c, 'a> PartWriter<'c, 'a> {
    fn new(ctx: &'c mut ExportContext<'a>, part: &str, existing: Vec<Relationship>) -> Self {
        Self {
            ctx,
            part: part.to_string(),
            rels: RelationshipAllocator::new(existing),
            out: String::new(),
        }
    }

    fn finish(self) -> (String, RelationshipAllocator) {
        (self.out, self.rels)
    }

    fn blocks(&mut self, blocks: &[Block]) -> Result<(), Error> {
        for block in blocks {
            match block {
                Block::Paragraph(p) => self.paragraph(p)?,
                Block::Table(t) => self.table(t)?,
                Block::StructuredContent(sdt) => {
                    self.out.push_str("<w:sdt>");
                    self.sdt_properties(&sdt.properties)?;
                    self.out.push_str("<w:sdtContent>");
                    self.blocks(&sdt.content)?;
                    self.out.push_str("</w:sdtContent></w:sdt>");
                }
                Block::PassthroughBlock(p) => self.out.push_str(&p.xml),
            }
        }
        Ok(())
    }

    fn paragraph(&mut self, p: &Paragraph) -> Result<(), Error> {
        self.out.push_str("<w:p");
        if let Some(id) = &p.para_id {
            self.out.push_str(&attr("w14:paraId", id));
        }
        self.out.push('>');

        let in_extra = |name: &str| p.extra_properties.iter().any(|e| e.name == name);
        let mut children: Vec<(String, String)> = Vec::new();
        if let Some(style) = &p.style_id
            && !in_extra("w:pStyle")
        {
            children.push(("w:pStyle".into(), format!("<w:pStyle{}/>", attr("w:val", style))));
        }
        if let Some(num) = &p.numbering
            && !in_extra("w:numPr")
        {
            let mut xml = format!("<w:numPr><w:ilvl w:val=\"{}\"/>", num.level);
            if let Some(num_id) = &num.num_id {
                write!(xml, "<w:numId{}/>", attr("w:val", num_id))?;
            }
            xml.push_str("</w:numPr>");
            children.push(("w:numPr".into(), xml));
        }
        if !p.tabs.is_empty() && !in_extra("w:tabs") {
            let twips: Vec<TabStop> = p
                .tabs
                .iter()
                .map(|t| TabStop {
                    position: pixels_to_twips(t.position),
                    ..t.clone()
                })
                .collect();
            let mut xml = String::new();
            write_tabs(&mut xml, &twips)?;
            children.push(("w:tabs".into(), xml));
        }
        if let Some(indent) = &p.indent
            && !in_extra("w:ind")
        {
            let mut xml = String::new();
            write_indent(&mut xml, &indent.pixels_to_twips())?;
            if !xml.is_empty() {
                children.push(("w:ind".into(), xml));
            }
        }
        if let Some(jc) = &p.justification
            && !in_extra("w:jc")
        {
            children.push(("w:jc".into(), format!("<w:jc{}/>", attr("w:val", jc))));
        }
        if let Some(mark) = &p.mark_properties
            && !in_extra("w:rPr")
        {
            let mut xml = String::new();
            write_run_properties(&mut xml, mark, None)?;
            if !xml.is_empty() {
                children.push(("w:rPr".into(), xml));
            }
        }
        children.extend(
            p.extra_properties
                .iter()
                .map(|e| (e.name.clone(), e.xml.clone())),
        );
        if !children.is_empty() {
            write!(self.out, "<w:pPr>{}</w:pPr>", ordered_children(PPR_ORDER, children))?;
        }

        self.inlines(&p.content, false)?;
        self.out.push_str("</w:p>");
        Ok(())
    }

    fn inlines(&mut self, inlines: &[Inline], in_deletion: bool) -> Result<(), Error> {
        for inline in inlines {
            match inline {
                Inline::Run(run) => self.run(run, in_deletion)?,
                Inline::Hyperlink(h) => self.hyperlink(h, in_deletion)?,
                Inline::TrackedInsert(t) => {
                    let id = self.ctx.change_id(&t.change);
                    write!(self.out, "<w:ins{}>", change_attributes(&t.change, id))?;
                    self.inlines(&t.content, in_deletion)?;
                    self.out.push_str("</w:ins>");
                }
                Inline::TrackedDelete(t) => {
                    let id = self.ctx.change_id(&t.change);
                    write!(self.out, "<w:del{}>", change_attributes(&t.change, id))?;
                    self.inlines(&t.content, true)?;
                    self.out.push_str("</w:del>");
                }
                Inline::CommentRangeStart { comment_id } => {
                    if let Some(id) = self.ctx.live_comment_id(comment_id) {
                        write!(self.out, "<w:commentRangeStart w:id=\"{id}\"/>")?;
                    }
                }
                Inline::CommentRangeEnd { comment_id } => {
                    if let Some(id) = self.ctx.live_comment_id(comment_id) {
                        write!(self.out, "<w:commentRangeEnd w:id=\"{id}\"/>")?;
                        if self.ctx.referenced_comments.insert(comment_id.clone()) {
                            write!(self.out, "<w:r><w:commentReference w:id=\"{id}\"/></w:r>")?;
                        }
                    }
                }
                Inline::CommentReference { comment_id, properties } => {
                    if let Some(id) = self.ctx.live_comment_id(comment_id) {
                        self.out.push_str("<w:r>");
                        if let Some(props) = properties {
                            write_run_properties(&mut self.out, props, None)?;
                        }
                        write!(self.out, "<w:commentReference w:id=\"{id}\"/></w:r>")?;
                    }
                }
                Inline::FieldAnnotation(field) => self.field_annotation(field)?,
                Inline::StructuredContent(sdt) => {
                    self.out.push_str("<w:sdt>");
                    self.sdt_properties(&sdt.properties)?;
                    self.out.push_str("<w:sdtContent>");
                    self.inlines(&sdt.content, in_deletion)?;
                    self.out.push_str("</w:sdtContent></w:sdt>");
                }
                Inline::PassthroughInline(p) => self.out.push_str(&p.xml),
            }
        }
        Ok(())
    }

    fn run(&mut self, run: &Run, in_deletion: bool) -> Result<(), Error> {
        self.out.push_str("<w:r>");
        let change = match &run.format_change {
            Some(fc) => Some((&fc.change, &fc.previous, self.ctx.change_id(&fc.change))),
            None => None,
        };
        write_run_properties(&mut self.out, &run.properties, change)?;
        let (text_tag, instr_tag) = if in_deletion {
            ("w:delText", "w:delInstrText")
        } else {
            ("w:t", "w:instrText")
        };
        for c in &run.content {
            match c {
                RunContent::Text(t) => self.out.push_str(&text_element(text_tag, t)),
                RunContent::Tab => self.out.push_str("<w:tab/>"),
                RunContent::Break { kind } => {
                    self.out.push_str("<w:br");
                    if let Some(kind) = kind {
                        self.out.push_str(&attr("w:type", kind));
                    }
                    self.out.push_str("/>");
                }
                RunContent::FieldChar(kind) => {
                    write!(self.out, "<w:fldChar{}/>", attr("w:fldCharType", kind))?;
                }
                RunContent::InstrText(t) => self.out.push_str(&text_element(instr_tag, t)),
                RunContent::Image(image) => {
                    let el = self.image(image, image.size)?;
                    if el.is_drawing() {
                        write!(self.out, "<w:drawing>{}</w:drawing>", el.xml)?;
                    } else {
                        self.out.push_str(&el.xml);
                    }
                }
                RunContent::Passthrough(p) => self.out.push_str(&p.xml),
            }
        }
        self.out.push_str("</w:r>");
        Ok(())
    }

    /// Drawing for a picture, or an empty text element when its media
    /// cannot be found.
    fn image(&mut self, image: &Image, size: Size) -> Result<XmlElement, Error> {
        let Some(part) = self.ctx.media_part(&image.src) else {
            return Ok(XmlElement {
                name: String::from("w:t"),
                xml: text_element("w:t", image.description.as_deref().unwrap_or_default()),
            });
        };
        self.ctx.used_media.insert(part.clone());
        let rel_id = self
            .rels
            .get_or_add(REL_IMAGE, &relative_target(&self.part, &part), false);
        let doc_pr_id = match image.id {
            Some(id) if id > 0 => id,
            _ => self.ctx.drawing_ids.allocate(),
        };
        let sized = Image {
            size,
            ..image.clone()
        };
        translate_image(&sized, &rel_id, doc_pr_id)
    }

    fn hyperlink(&mut self, h: &Hyperlink, in_deletion: bool) -> Result<(), Error> {
        self.out.push_str("<w:hyperlink");
        if let Some(target) = &h.target {
            let id = self.rels.get_or_add(REL_HYPERLINK, target, true);
            self.out.push_str(&attr("r:id", &id));
        }
        if let Some(anchor) = &h.anchor {
            self.out.push_str(&attr("w:anchor", anchor));
        }
        if let Some(tooltip) = &h.tooltip {
            self.out.push_str(&attr("w:tooltip", tooltip));
        }
        if let Some(history) = &h.history {
            self.out.push_str(&attr("w:history", history));
        }
        self.out.push('>');
        self.inlines(&h.content, in_deletion)?;
        self.out.push_str("</w:hyperlink>");
        Ok(())
    }

    fn sdt_properties(&mut self, props: &StructuredContentProperties) -> Result<(), Error> {
        self.out.push_str("<w:sdtPr>");
        if let Some(alias) = &props.alias {
            write!(self.out, "<w:alias{}/>", attr("w:val", alias))?;
        }
        if let Some(tag) = &props.tag {
            write!(self.out, "<w:tag{}/>", attr("w:val", tag))?;
        }
        if let Some(id) = &props.id {
            write!(self.out, "<w:id{}/>", attr("w:val", id))?;
        }
        for extra in &props.extra {
            self.out.push_str(&extra.xml);
        }
        self.out.push_str("</w:sdtPr>");
        Ok(())
    }

    /// The run inside a field annotation: a drawing for image-like fields
    /// with a usable image, otherwise a text run with the display label.
    fn field_element(&mut self, field: &FieldAnnotation) -> Result<XmlElement, Error> {
        let mut rpr = String::new();
        write_run_properties(&mut rpr, &field.run_properties, None)?;
        if field.is_image_like()
            && let Some(src) = &field.image_src
        {
            let image = Image {
                src: src.clone(),
                name: Some(field.display_label.clone()),
                ..Image::default()
            };
            let size = match field.size {
                Some(size) => size,
                None => self
                    .ctx
                    .media_part(src)
                    .and_then(|part| self.ctx.media_bytes(&part).and_then(image_size))
                    .unwrap_or(FALLBACK_IMAGE_SIZE),
            };
            let el = self.image(&image, size)?;
            if el.is_drawing() {
                return Ok(XmlElement {
                    name: String::from("w:r"),
                    xml: format!("<w:r>{rpr}<w:drawing>{}</w:drawing></w:r>", el.xml),
                });
            }
            log::warn!("Field {} has no usable image; writing its label", field.field_id);
        }
        Ok(XmlElement {
            name: String::from("w:r"),
            xml: format!("<w:r>{rpr}{}</w:r>", text_element("w:t", &field.display_label)),
        })
    }

    fn field_annotation(&mut self, field: &FieldAnnotation) -> Result<(), Error> {
        let tag = serde_json::json!({
            "fieldId": field.field_id,
            "fieldType": field.field_type,
            "displayLabel": field.display_label,
        });
        let props = StructuredContentProperties {
            id: field.sdt_id.clone(),
            alias: field.alias.clone(),
            tag: Some(tag.to_string()),
            extra: Vec::new(),
        };
        self.out.push_str("<w:sdt>");
        self.sdt_properties(&props)?;
        let el = self.field_element(field)?;
        write!(self.out, "<w:sdtContent>{}</w:sdtContent></w:sdt>", el.xml)?;
        Ok(())
    }

    fn table(&mut self, table: &Table) -> Result<(), Error> {
        self.out.push_str("<w:tbl>");
        match (&table.properties, &table.style_id) {
            (Some(p), _) => self.out.push_str(&p.xml),
            (None, Some(style)) => {
                write!(self.out, "<w:tblPr><w:tblStyle{}/></w:tblPr>", attr("w:val", style))?;
            }
            (None, None) => self.out.push_str("<w:tblPr/>"),
        }
        self.out.push_str("<w:tblGrid>");
        for w in &table.grid {
            write!(self.out, "<w:gridCol w:w=\"{}\"/>", format_number(pixels_to_twips(*w)))?;
        }
        self.out.push_str("</w:tblGrid>");
        for item in &table.rows {
            match item {
                TableItem::Row(row) => {
                    self.out.push_str("<w:tr>");
                    for p in &row.properties {
                        self.out.push_str(&p.xml);
                    }
                    for cell in &row.cells {
                        match cell {
                            RowItem::Cell(cell) => self.table_cell(cell)?,
                            RowItem::Passthrough(p) => self.out.push_str(&p.xml),
                        }
                    }
                    self.out.push_str("</w:tr>");
                }
                TableItem::Passthrough(p) => self.out.push_str(&p.xml),
            }
        }
        self.out.push_str("</w:tbl>");
        Ok(())
    }

    fn table_cell(&mut self, cell: &TableCell) -> Result<(), Error> {
        self.out.push_str("<w:tc>");
        let mut children: Vec<(String, String)> = Vec::new();
        if let Some(w) = cell.width {
            children.push((
                "w:tcW".into(),
                format!("<w:tcW w:w=\"{}\" w:type=\"dxa\"/>", format_number(pixels_to_twips(w))),
            ));
        }
        if cell.grid_span > 1 {
            children.push((
                "w:gridSpan".into(),
                format!("<w:gridSpan w:val=\"{}\"/>", cell.grid_span),
            ));
        }
        match cell.v_merge.as_deref() {
            Some("restart") => children.push(("w:vMerge".into(), "<w:vMerge w:val=\"restart\"/>".into())),
            Some(_) => children.push(("w:vMerge".into(), "<w:vMerge/>".into())),
            None => {}
        }
        children.extend(
            cell.extra_properties
                .iter()
                .map(|e| (e.name.clone(), e.xml.clone())),
        );
        if !children.is_empty() {
            write!(self.out, "<w:tcPr>{}</w:tcPr>", ordered_children(TCPR_ORDER, children))?;
        }
        self.blocks(&cell.content)?;
        // A cell must end with a paragraph.
        if !matches!(cell.content.last(), Some(Block::Paragraph(_))) {
            self.out.push_str("<w:p/>");
        }
        self.out.push_str("</w:tc>");
        Ok(())
    }

    fn comments(&mut self, doc: &Document) -> Result<(), Error> {
        self.root("w:comments", &doc.comment_namespaces, doc.comment_ignorable.as_deref());
        for c in &doc.comments {
            let (Some(id), Some(para_id)) = (
                self.ctx.comment_plan.ids.get(&c.comment_id).copied(),
                self.ctx.comment_plan.para_ids.get(&c.comment_id).cloned(),
            ) else {
                continue;
            };
            self.out.push_str(&comment_open(c, id));
            self.blocks(&comment_body(c, &para_id))?;
            self.out.push_str("</w:comment>");
        }
        self.out.push_str("</w:comments>");
        Ok(())
    }

    /// Root start tag: the source root's declarations first, then any
    /// prefix the writer needs that the source did not declare.
    fn root(&mut self, tag: &str, namespaces: &[(String, String)], ignorable: Option<&str>) {
        self.out.push_str(XML_DECLARATION);
        write_root(&mut self.out, tag, namespaces, ignorable);
    }

    fn document(&mut self, doc: &Document) -> Result<(), Error> {
        self.root("w:document", &doc.namespaces, doc.ignorable.as_deref());
        for p in &doc.preamble {
            self.out.push_str(&p.xml);
        }
        self.out.push_str("<w:body>");
        self.blocks(&doc.body)?;
        if let Some(sect) = &doc.section_properties {
            self.out.push_str(&sect.xml);
        }
        self.out.push_str("</w:body></w:document>");
        Ok(())
    }
}

fn write_root(out: &mut String, tag: &str, namespaces: &[(String, String)], ignorable: Option<&str>) {
    out.push('<');
    out.push_str(tag);
    let mut declared: HashSet<&str> = HashSet::new();
    for (prefix, uri) in namespaces {
        if prefix.is_empty() {
            out.push_str(&attr("xmlns", uri));
        } else {
            out.push_str(&attr(&format!("xmlns:{prefix}"), uri));
        }
        declared.insert(prefix.as_str());
    }
    for (prefix, uri) in DEFAULT_NAMESPACES {
        if !declared.contains(prefix) {
            out.push_str(&attr(&format!("xmlns:{prefix}"), uri));
        }
    }
    let ignorable = match ignorable {
        Some(i) => Some(i),
        None if namespaces.is_empty() => Some("w14 w15"),
        None => None,
    };
    if let Some(ignorable) = ignorable {
        out.push_str(&attr("mc:Ignorable", ignorable));
    }
    out.push('>');
}

fn blank_package() -> Package {
    let mut package = Package::new();
    package.set_xml(CONTENT_TYPES_PART, ContentTypes::minimal().serialize());
    package.set_xml(
        PACKAGE_RELS_PART,
        serialize_relationships(&[Relationship {
            id: String::from("rId1"),
            rel_type: REL_OFFICE_DOCUMENT.to_string(),
            target: String::from("word/document.xml"),
            target_mode: None,
        }]),
    );
    package
}

fn media_extension(part: &str) -> Option<&str> {
    part.rsplit_once('.').map(|(_, ext)| ext)
}

/// Write `doc` into a package. `base` is the package it was imported from;
/// without one a minimal package is produced. `numbering` is written as
/// `numbering.xml` when the document uses lists and the base has none.
pub fn export_document(
    doc: &Document,
    base: Option<&Package>,
    numbering: &NumberingCache,
    options: &ExportOptions,
) -> Result<Package, Error> {
    let mut package = base.cloned().unwrap_or_else(blank_package);
    let part = package.main_document_part();
    let mut content_types = package
        .xml(CONTENT_TYPES_PART)
        .map(|xml| ContentTypes::parse(&xml))
        .unwrap_or_else(ContentTypes::minimal);
    content_types.ensure_override(&part, CT_DOCUMENT);

    let mut ctx = ExportContext::new(doc, base, options);
    let mut writer = PartWriter::new(&mut ctx, &part, package.relationships(&part));
    writer.document(doc)?;
    let (document_xml, mut doc_rels) = writer.finish();

    let write_comments = options.comments == CommentsExportMode::External && !doc.comments.is_empty();
    remove_comment_parts(&mut package, &mut content_types, &mut doc_rels, write_comments);
    if write_comments {
        log::debug!(
            "Writing {} comments in {:?} format",
            doc.comments.len(),
            export_origin(&doc.comments)
        );
        let mut writer = PartWriter::new(&mut ctx, COMMENTS_PART, package.relationships(COMMENTS_PART));
        writer.comments(doc)?;
        let (comments_xml, comment_rels) = writer.finish();
        package.set_xml(COMMENTS_PART, comments_xml);
        if comment_rels.relationships().is_empty() {
            package.remove(&rels_path_for(COMMENTS_PART));
        } else {
            package.set_xml(
                rels_path_for(COMMENTS_PART),
                serialize_relationships(comment_rels.relationships()),
            );
        }
        package.set_xml(
            COMMENTS_EXTENDED_PART,
            serialize_comments_extended(&doc.comments, &ctx.comment_plan)?,
        );
        doc_rels.get_or_add(REL_COMMENTS, &relative_target(&part, COMMENTS_PART), false);
        doc_rels.get_or_add(
            REL_COMMENTS_EXTENDED,
            &relative_target(&part, COMMENTS_EXTENDED_PART),
            false,
        );
        content_types.ensure_override(COMMENTS_PART, CT_COMMENTS);
        content_types.ensure_override(COMMENTS_EXTENDED_PART, CT_COMMENTS_EXTENDED);
    }

    if ctx.uses_numbering && !package.contains(NUMBERING_PART) && !numbering.is_empty() {
        log::debug!("Writing {NUMBERING_PART} from the numbering cache");
        package.set_xml(NUMBERING_PART, numbering::serialize_numbering(numbering)?);
        doc_rels.get_or_add(REL_NUMBERING, &relative_target(&part, NUMBERING_PART), false);
        content_types.ensure_override(NUMBERING_PART, CT_NUMBERING);
    }

    for name in &ctx.used_media {
        if !package.contains(name)
            && let Some(data) = ctx.media.get(name)
        {
            package.set_part(name.clone(), data.clone());
        }
        if let Some(ext) = media_extension(name) {
            content_types.ensure_default(ext, media_content_type(ext));
        }
    }

    package.set_xml(part.clone(), document_xml);
    package.set_xml(rels_path_for(&part), serialize_relationships(doc_rels.relationships()));
    package.set_xml(CONTENT_TYPES_PART, content_types.serialize());
    Ok(package)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_zero_indent_is_written() {
        let indent = Indent {
            left: Some(0.0),
            hanging: Some(0.0),
            explicit_left: true,
            ..Indent::default()
        };
        let mut out = String::new();
        write_indent(&mut out, &indent).unwrap();
        assert_eq!(out, "<w:ind w:left=\"0\"/>");

        let mut out = String::new();
        write_indent(&mut out, &Indent::default()).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn ids_skip_reserved_values() {
        let mut ids = IdAllocator::default();
        ids.reserve(1);
        ids.reserve(2);
        assert_eq!(ids.allocate(), 3);
        assert_eq!(ids.allocate(), 4);
    }

    #[test]
    fn blank_export_is_a_minimal_package() {
        let mut doc = Document::default();
        doc.append_text_paragraph("Hello <world>");
        let package = export_document(&doc, None, &NumberingCache::default(), &ExportOptions::default()).unwrap();
        assert!(package.contains(CONTENT_TYPES_PART));
        assert!(package.contains(PACKAGE_RELS_PART));
        assert!(package.contains("word/_rels/document.xml.rels"));
        let xml = package.xml("word/document.xml").unwrap();
        assert!(xml.contains("<w:t>Hello &lt;world&gt;</w:t>"));
        assert!(roxmltree::Document::parse(&xml).is_ok());
        assert!(!package.contains(NUMBERING_PART));
    }
}
