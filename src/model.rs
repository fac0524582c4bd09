use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::comments::{Comment, CommentOrigin};

fn is_false(b: &bool) -> bool {
    !*b
}

/// A fragment of source XML the model does not interpret.
///
/// `xml` is the exact byte range of the element in the part it came from, so
/// exporting it reproduces the original markup unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passthrough {
    /// Qualified element name as written in the source (e.g. `w:bookmarkStart`).
    pub name: String,
    pub xml: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub body: Vec<Block>,
    /// Body-level `w:sectPr`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_properties: Option<Passthrough>,
    /// Children of `w:document` other than `w:body` (e.g. `w:background`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preamble: Vec<Passthrough>,
    /// Namespace declarations of the source `w:document` root, as (prefix, uri).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignorable: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub comment_origin: CommentOrigin,
    /// Namespace declarations of the source `w:comments` root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comment_namespaces: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_ignorable: Option<String>,
    /// Package media keyed by part name (`word/media/image1.png`).
    #[serde(skip)]
    pub media: BTreeMap<String, Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
    StructuredContent(StructuredContentBlock),
    PassthroughBlock(Passthrough),
}

/// Paragraph indentation. In the document tree the values are pixels; in
/// style and numbering definitions they are twips.
///
/// The `explicit_*` flags record that a value was set on purpose, which makes
/// an explicit zero distinct from "not set" on export.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_line: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hanging: Option<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub explicit_left: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub explicit_right: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub explicit_first_line: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub explicit_hanging: bool,
}

impl Indent {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none() && self.first_line.is_none() && self.hanging.is_none()
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Indent {
        Indent {
            left: self.left.map(&f),
            right: self.right.map(&f),
            first_line: self.first_line.map(&f),
            hanging: self.hanging.map(&f),
            ..self.clone()
        }
    }

    pub fn twips_to_pixels(&self) -> Indent {
        self.map(crate::units::twips_to_pixels)
    }

    pub fn pixels_to_twips(&self) -> Indent {
        self.map(crate::units::pixels_to_twips)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabStop {
    pub position: f64,
    /// `left`, `center`, `right`, `decimal`, `bar`, `num` or `clear`.
    pub alignment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader: Option<String>,
}

impl TabStop {
    pub fn is_clear(&self) -> bool {
        self.alignment == "clear"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberingRef {
    /// Absent when the paragraph only overrides the level of the list its
    /// style belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_id: Option<String>,
    pub level: u8,
}

/// Resolved list marker attached to a numbered paragraph at import time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRendering {
    pub marker_text: String,
    pub path: Vec<u32>,
    pub num_fmt: String,
    pub justification: String,
    pub suffix: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paragraph {
    /// `w14:paraId`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub para_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numbering: Option<NumberingRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<Indent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tabs: Vec<TabStop>,
    /// Paragraph-mark run properties (`w:pPr/w:rPr`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark_properties: Option<RunProperties>,
    /// Unmodelled `w:pPr` children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_properties: Vec<Passthrough>,
    pub content: Vec<Inline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_rendering: Option<ListRendering>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_inline_text(&self.content, &mut out);
        out
    }
}

fn collect_inline_text(content: &[Inline], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Run(run) => {
                for c in &run.content {
                    match c {
                        RunContent::Text(t) => out.push_str(t),
                        RunContent::Tab => out.push('\t'),
                        RunContent::Break { .. } => out.push('\n'),
                        _ => {}
                    }
                }
            }
            Inline::Hyperlink(h) => collect_inline_text(&h.content, out),
            Inline::TrackedInsert(t) => collect_inline_text(&t.content, out),
            Inline::StructuredContent(s) => collect_inline_text(&s.content, out),
            Inline::FieldAnnotation(f) => out.push_str(&f.display_label),
            Inline::TrackedDelete(_)
            | Inline::CommentRangeStart { .. }
            | Inline::CommentRangeEnd { .. }
            | Inline::CommentReference { .. }
            | Inline::PassthroughInline(_) => {}
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontFamily {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascii: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_ansi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub east_asia: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascii_theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_ansi_theme: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Underline {
    /// `w:u/@w:val`; bare presence of `w:u` is `single`.
    pub style: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Underline {
    pub fn is_visible(&self) -> bool {
        self.style != "none"
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Color {
    Auto,
    /// Negates an inherited style color; written as `auto`.
    Inherit,
    Rgb(String),
}

impl Color {
    pub fn parse(val: &str) -> Color {
        match val {
            "auto" => Color::Auto,
            "inherit" => Color::Inherit,
            hex => Color::Rgb(hex.to_ascii_uppercase()),
        }
    }

    pub fn xml_value(&self) -> &str {
        match self {
            Color::Auto | Color::Inherit => "auto",
            Color::Rgb(hex) => hex,
        }
    }
}

/// Partial run formatting. `None` means "not set at this layer".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fonts: Option<FontFamily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strike: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub underline: Option<Underline>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    /// Points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vert_align: Option<String>,
    /// Unmodelled `w:rPr` children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Passthrough>,
}

impl RunProperties {
    pub fn is_empty(&self) -> bool {
        *self == RunProperties::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedContent {
    pub change: TrackedChange,
    pub content: Vec<Inline>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatChange {
    pub change: TrackedChange,
    pub previous: RunProperties,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub properties: RunProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_change: Option<FormatChange>,
    pub content: Vec<RunContent>,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Run {
        Run {
            content: vec![RunContent::Text(text.into())],
            ..Run::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum RunContent {
    /// `w:t`, or `w:delText` inside a deletion.
    Text(String),
    Tab,
    Break { kind: Option<String> },
    /// `w:fldChar/@w:fldCharType`: `begin`, `separate` or `end`.
    FieldChar(String),
    InstrText(String),
    Image(Image),
    Passthrough(Passthrough),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
    Run(Run),
    Hyperlink(Hyperlink),
    TrackedInsert(TrackedContent),
    TrackedDelete(TrackedContent),
    #[serde(rename_all = "camelCase")]
    CommentRangeStart { comment_id: String },
    #[serde(rename_all = "camelCase")]
    CommentRangeEnd { comment_id: String },
    /// The `w:commentReference` run, with its own `w:rPr`.
    #[serde(rename_all = "camelCase")]
    CommentReference {
        comment_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<RunProperties>,
    },
    FieldAnnotation(FieldAnnotation),
    StructuredContent(StructuredContentInline),
    PassthroughInline(Passthrough),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hyperlink {
    /// External target URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Internal bookmark anchor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// `w:history`, as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
    pub content: Vec<Inline>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Per-side lengths in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sides {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Sides {
    pub fn is_zero(&self) -> bool {
        self.top == 0.0 && self.bottom == 0.0 && self.left == 0.0 && self.right == 0.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformData {
    /// Degrees clockwise.
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub vertical_flip: bool,
    #[serde(default)]
    pub horizontal_flip: bool,
    /// `wp:effectExtent`, pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_extension: Option<Sides>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnchorPosition {
    Offset { value: f64 },
    Align { value: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Wrap {
    None,
    #[serde(rename_all = "camelCase")]
    Square { wrap_text: Option<String> },
    TopAndBottom,
    /// `wp:wrapTight`/`wp:wrapThrough` with their polygons, kept verbatim.
    Raw(Passthrough),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorData {
    pub h_relative_from: String,
    pub v_relative_from: String,
    pub horizontal: AnchorPosition,
    pub vertical: AnchorPosition,
    pub wrap: Wrap,
    #[serde(default)]
    pub behind_doc: bool,
    #[serde(default)]
    pub allow_overlap: bool,
    #[serde(default)]
    pub layout_in_cell: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub relative_height: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Package part name (`word/media/image1.png`) or a `data:` URI.
    pub src: String,
    /// `wp:docPr/@id`; generated on export when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub size: Size,
    /// `distT`/`distB`/`distL`/`distR`, pixels.
    #[serde(default)]
    pub padding: Sides,
    #[serde(default)]
    pub transform_data: TransformData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorData>,
    #[serde(default, skip_serializing_if = "DrawingExtras::is_empty")]
    pub extras: DrawingExtras,
}

/// Picture markup the model does not interpret, kept verbatim and written
/// back at the same place. Empty slots get the default markup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingExtras {
    /// Children of `wp:docPr` (`a:hlinkClick`, `a:extLst`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub doc_properties: Vec<Passthrough>,
    /// `wp:cNvGraphicFramePr`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_properties: Option<Passthrough>,
    /// `pic:cNvPicPr`, with its picture locks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_properties: Option<Passthrough>,
    /// Children of `a:blip` (colour effects, `a:extLst`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blip: Vec<Passthrough>,
    /// Children of `pic:blipFill` after the blip: `a:srcRect` and the fill mode.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blip_fill: Vec<Passthrough>,
    /// Children of `pic:spPr` after `a:xfrm`: geometry, outline, effects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape: Vec<Passthrough>,
}

impl DrawingExtras {
    pub fn is_empty(&self) -> bool {
        *self == DrawingExtras::default()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContentProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Unmodelled `w:sdtPr` children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Passthrough>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContentBlock {
    pub properties: StructuredContentProperties,
    pub content: Vec<Block>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredContentInline {
    pub properties: StructuredContentProperties,
    pub content: Vec<Inline>,
}

/// Placeholder field (text, image, signature, ...) carried in an inline
/// structured-content tag whose `w:tag` is a JSON object with a `fieldId`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAnnotation {
    pub field_id: String,
    /// `text`, `image`, `signature`, `checkbox`, `html`, `link`.
    pub field_type: String,
    pub display_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub run_properties: RunProperties,
}

impl FieldAnnotation {
    pub fn is_image_like(&self) -> bool {
        matches!(self.field_type.as_str(), "image" | "signature")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    /// `w:tblPr`, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Passthrough>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
    /// Grid column widths, pixels.
    pub grid: Vec<f64>,
    pub rows: Vec<TableItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TableItem {
    Row(TableRow),
    Passthrough(Passthrough),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    /// `w:tblPrEx` and `w:trPr`, verbatim and in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Passthrough>,
    pub cells: Vec<RowItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RowItem {
    Cell(TableCell),
    Passthrough(Passthrough),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableCell {
    /// `w:tcW` in pixels when the width type is `dxa`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    pub grid_span: u32,
    /// `restart` or `continue`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v_merge: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_properties: Vec<Passthrough>,
    pub content: Vec<Block>,
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            width: None,
            grid_span: 1,
            v_merge: None,
            extra_properties: Vec::new(),
            content: Vec::new(),
        }
    }
}

impl Document {
    /// Paragraphs in document order, descending into tables and content tags.
    pub fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        collect_paragraphs(&self.body, &mut out);
        out
    }

    pub fn plain_text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.comment_id == comment_id)
    }

    pub fn comment_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.comment_id == comment_id)
    }

    /// Append a plain paragraph at the end of the body.
    pub fn append_text_paragraph(&mut self, text: &str) {
        self.body.push(Block::Paragraph(Paragraph {
            content: vec![Inline::Run(Run::text(text))],
            ..Paragraph::default()
        }));
    }
}

pub(crate) fn collect_paragraphs<'a>(blocks: &'a [Block], out: &mut Vec<&'a Paragraph>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.push(p),
            Block::Table(t) => {
                for item in &t.rows {
                    let TableItem::Row(row) = item else { continue };
                    for cell in &row.cells {
                        if let RowItem::Cell(cell) = cell {
                            collect_paragraphs(&cell.content, out);
                        }
                    }
                }
            }
            Block::StructuredContent(sdt) => collect_paragraphs(&sdt.content, out),
            Block::PassthroughBlock(_) => {}
        }
    }
}
