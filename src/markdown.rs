//! Markdown in and out of the document tree.
//!
//! Rendering is lossy: headings, lists, emphasis, links, tables and images
//! survive, everything else collapses to its text. Parsing accepts
//! CommonMark with GFM tables and strikethrough.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

use crate::model::{
    Block, Document, FontFamily, Hyperlink, Inline, NumberingRef, Paragraph, RowItem, Run, RunContent,
    RunProperties, Table, TableCell, TableItem, TableRow, collect_paragraphs,
};
use crate::numbering::{self, BASELINE_BULLET_NUM_ID, BASELINE_ORDERED_NUM_ID, ListCounters, MAX_LEVELS, NumberingCache};
use crate::styles::StyleTable;

const MONOSPACE_FONTS: [&str; 3] = ["Courier New", "Consolas", "Courier"];
const LIST_STYLE: &str = "ListParagraph";
const QUOTE_STYLE: &str = "Quote";
/// Grid column width of tables built from Markdown, pixels.
const TABLE_COLUMN_PX: f64 = 120.0;
const LIST_INDENT: &str = "    ";

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the body of `doc` as Markdown. List markers come from the
/// numbering definitions, with counters running across the document.
pub fn render_markdown(doc: &Document, styles: &StyleTable, numbering: &NumberingCache) -> String {
    let mut renderer = Renderer {
        styles,
        numbering,
        counters: ListCounters::default(),
        chunks: Vec::new(),
    };
    renderer.blocks(&doc.body);

    let mut out = String::new();
    let mut previous_item = false;
    for (i, (text, item)) in renderer.chunks.iter().enumerate() {
        if i > 0 {
            out.push_str(if previous_item && *item { "\n" } else { "\n\n" });
        }
        out.push_str(text);
        previous_item = *item;
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

struct Renderer<'a> {
    styles: &'a StyleTable,
    numbering: &'a NumberingCache,
    counters: ListCounters,
    /// Rendered blocks; the flag marks list items, which are joined tightly.
    chunks: Vec<(String, bool)>,
}

impl Renderer<'_> {
    fn blocks(&mut self, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(p) => self.paragraph(p),
                Block::Table(t) => {
                    if let Some(table) = render_table(t) {
                        self.chunks.push((table, false));
                    }
                }
                Block::StructuredContent(sdt) => self.blocks(&sdt.content),
                Block::PassthroughBlock(_) => {}
            }
        }
    }

    fn paragraph(&mut self, p: &Paragraph) {
        let text = render_inlines(&p.content);

        if let Some((num_id, ilvl)) = numbering::paragraph_numbering(self.styles, p) {
            let path = self
                .counters
                .advance(self.numbering, &num_id, ilvl)
                .or_else(|| p.list_rendering.as_ref().map(|r| r.path.clone()));
            if let Some(path) = path {
                let bullet = self
                    .numbering
                    .level(&num_id, ilvl)
                    .map(|l| l.num_fmt == "bullet")
                    .or_else(|| p.list_rendering.as_ref().map(|r| r.num_fmt == "bullet"))
                    .unwrap_or(true);
                let marker = match path.last() {
                    Some(n) if !bullet => format!("{n}."),
                    _ => String::from("-"),
                };
                let indent = LIST_INDENT.repeat(usize::from(ilvl));
                self.chunks.push((format!("{indent}{marker} {text}"), true));
                return;
            }
        }

        if text.trim().is_empty() {
            return;
        }
        if let Some(level) = heading_level(self.styles, p.style_id.as_deref()) {
            self.chunks.push((format!("{} {}", "#".repeat(level), text.trim()), false));
        } else if p.style_id.as_deref() == Some(QUOTE_STYLE) {
            self.chunks.push((format!("> {text}"), false));
        } else {
            self.chunks.push((escape_line_start(text), false));
        }
    }
}

/// `Heading1`..`Heading6` by style id, `heading 1`.. by style name, and
/// `Title` as a top-level heading.
fn heading_level(styles: &StyleTable, style_id: Option<&str>) -> Option<usize> {
    let id = style_id?;
    let name = styles.get(id).and_then(|s| s.name.as_deref());
    [Some(id), name].into_iter().flatten().find_map(|candidate| {
        let lower = candidate.to_ascii_lowercase();
        if lower == "title" {
            return Some(1);
        }
        let level: usize = lower.strip_prefix("heading")?.trim_start().parse().ok()?;
        (1..=6).contains(&level).then_some(level)
    })
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Emphasis {
    bold: bool,
    italic: bool,
    strike: bool,
}

impl Emphasis {
    fn of(props: &RunProperties) -> Self {
        Self {
            bold: props.bold == Some(true),
            italic: props.italic == Some(true),
            strike: props.strike == Some(true),
        }
    }

    fn marker(self) -> String {
        let mut marker = String::new();
        if self.bold {
            marker.push_str("**");
        }
        if self.italic {
            marker.push('*');
        }
        if self.strike {
            marker.push_str("~~");
        }
        marker
    }
}

fn render_inlines(content: &[Inline]) -> String {
    let mut segments = Vec::new();
    collect_segments(content, &mut segments);

    let mut merged: Vec<(Emphasis, String)> = Vec::new();
    for (emphasis, text) in segments {
        match merged.last_mut() {
            Some((last, buffer)) if *last == emphasis => buffer.push_str(&text),
            _ => merged.push((emphasis, text)),
        }
    }
    merged.iter().map(|(emphasis, text)| wrap(text, *emphasis)).collect()
}

fn collect_segments(content: &[Inline], out: &mut Vec<(Emphasis, String)>) {
    for inline in content {
        match inline {
            Inline::Run(run) => run_segments(run, out),
            Inline::Hyperlink(link) => {
                let text = render_inlines(&link.content);
                let destination = link
                    .target
                    .clone()
                    .or_else(|| link.anchor.as_ref().map(|a| format!("#{a}")));
                let markdown = match destination {
                    Some(url) => format!("[{text}]({url})"),
                    None => text,
                };
                out.push((Emphasis::default(), markdown));
            }
            Inline::TrackedInsert(tracked) => collect_segments(&tracked.content, out),
            Inline::StructuredContent(sdt) => collect_segments(&sdt.content, out),
            Inline::FieldAnnotation(field) => {
                out.push((Emphasis::of(&field.run_properties), escape(&field.display_label)));
            }
            Inline::TrackedDelete(_)
            | Inline::CommentRangeStart { .. }
            | Inline::CommentRangeEnd { .. }
            | Inline::CommentReference { .. }
            | Inline::PassthroughInline(_) => {}
        }
    }
}

fn run_segments(run: &Run, out: &mut Vec<(Emphasis, String)>) {
    let monospace = run
        .properties
        .fonts
        .as_ref()
        .and_then(|f| f.ascii.as_deref())
        .is_some_and(|font| MONOSPACE_FONTS.contains(&font));
    let emphasis = Emphasis::of(&run.properties);
    for content in &run.content {
        let text = match content {
            RunContent::Text(text) if monospace => format!("`{text}`"),
            RunContent::Text(text) => escape(text),
            RunContent::Tab => String::from("\t"),
            RunContent::Break { kind: None } => String::from("<br>"),
            RunContent::Image(image) => {
                let alt = image
                    .description
                    .as_deref()
                    .or(image.name.as_deref())
                    .unwrap_or_default();
                let src = if image.src.starts_with("data:") { "" } else { image.src.as_str() };
                format!("![{}]({src})", escape(alt))
            }
            RunContent::Break { .. }
            | RunContent::FieldChar(_)
            | RunContent::InstrText(_)
            | RunContent::Passthrough(_) => continue,
        };
        out.push((emphasis, text));
    }
}

/// Emphasis markers must hug the text, so edge whitespace moves outside.
fn wrap(text: &str, emphasis: Emphasis) -> String {
    let trimmed = text.trim();
    if emphasis == Emphasis::default() || trimmed.is_empty() {
        return text.to_string();
    }
    let lead = &text[..text.len() - text.trim_start().len()];
    let trail = &text[text.trim_end().len()..];
    let open = emphasis.marker();
    let close: String = open.chars().rev().collect();
    format!("{lead}{open}{trimmed}{close}{trail}")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']' | '~' | '|') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Keep a body paragraph from reading as a heading, quote or list item.
fn escape_line_start(text: String) -> String {
    let starts_block = text.starts_with(['#', '>', '-', '+'])
        || text
            .split_once(". ")
            .is_some_and(|(n, _)| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
    if starts_block { format!("\\{text}") } else { text }
}

fn render_table(table: &Table) -> Option<String> {
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .filter_map(|item| match item {
            TableItem::Row(row) => Some(row),
            TableItem::Passthrough(_) => None,
        })
        .map(|row| {
            row.cells
                .iter()
                .filter_map(|item| match item {
                    RowItem::Cell(cell) => Some(cell_text(cell)),
                    RowItem::Passthrough(_) => None,
                })
                .collect()
        })
        .collect();
    let columns = rows.iter().map(Vec::len).max().filter(|n| *n > 0)?;

    let line = |cells: &[String]| {
        let mut padded: Vec<&str> = cells.iter().map(String::as_str).collect();
        padded.resize(columns, "");
        format!("| {} |", padded.join(" | "))
    };
    let mut lines = vec![line(rows[0].as_slice()), format!("|{}", " --- |".repeat(columns))];
    lines.extend(rows[1..].iter().map(|row| line(row.as_slice())));
    Some(lines.join("\n"))
}

fn cell_text(cell: &TableCell) -> String {
    let mut paragraphs = Vec::new();
    collect_paragraphs(&cell.content, &mut paragraphs);
    paragraphs
        .iter()
        .map(|p| render_inlines(&p.content))
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join("<br>")
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// `numId`s that inserted list items refer to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListNumbering {
    pub bullet: String,
    pub ordered: String,
}

impl ListNumbering {
    pub fn baseline() -> Self {
        Self {
            bullet: BASELINE_BULLET_NUM_ID.to_string(),
            ordered: BASELINE_ORDERED_NUM_ID.to_string(),
        }
    }
}

/// Blocks for `markdown`. List items refer to `lists` when given; without
/// it they carry their marker as literal text.
pub fn parse_markdown(markdown: &str, lists: Option<&ListNumbering>) -> Vec<Block> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut reader = MarkdownReader {
        lists,
        ..MarkdownReader::default()
    };
    for event in Parser::new_ext(markdown, options) {
        reader.event(event);
    }
    reader.finish_paragraph();
    reader.blocks
}

struct ListFrame {
    ordered: bool,
    next: u64,
}

#[derive(Default)]
struct MarkdownReader<'l> {
    lists: Option<&'l ListNumbering>,
    blocks: Vec<Block>,
    paragraph: Option<Paragraph>,
    links: Vec<Hyperlink>,
    bold: u32,
    italic: u32,
    strike: u32,
    quote: u32,
    list_stack: Vec<ListFrame>,
    /// A list item was opened and its first paragraph not yet started.
    fresh_item: bool,
    code_block: bool,
    table: Option<Table>,
    row: Option<TableRow>,
    cell: Option<TableCell>,
}

impl MarkdownReader<'_> {
    fn event(&mut self, event: Event) {
        match event {
            Event::Start(Tag::Paragraph) => {
                if self.fresh_item {
                    self.fresh_item = false;
                } else {
                    self.start_paragraph(None);
                }
            }
            Event::End(TagEnd::Paragraph) => self.finish_paragraph(),
            Event::Start(Tag::Heading { level, .. }) => {
                self.start_paragraph(Some(format!("Heading{}", level as usize)));
            }
            Event::End(TagEnd::Heading(_)) => self.finish_paragraph(),
            Event::Start(Tag::BlockQuote { .. }) => {
                self.finish_paragraph();
                self.quote += 1;
            }
            Event::End(TagEnd::BlockQuote { .. }) => {
                self.finish_paragraph();
                self.quote = self.quote.saturating_sub(1);
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.finish_paragraph();
                self.code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                self.finish_paragraph();
                self.code_block = false;
            }
            Event::Start(Tag::List(first)) => {
                self.finish_paragraph();
                self.list_stack.push(ListFrame {
                    ordered: first.is_some(),
                    next: first.unwrap_or(1),
                });
            }
            Event::End(TagEnd::List(_)) => {
                self.finish_paragraph();
                self.list_stack.pop();
            }
            Event::Start(Tag::Item) => self.start_item(),
            Event::End(TagEnd::Item) => {
                self.finish_paragraph();
                self.fresh_item = false;
            }
            Event::Start(Tag::Emphasis) => self.italic += 1,
            Event::End(TagEnd::Emphasis) => self.italic = self.italic.saturating_sub(1),
            Event::Start(Tag::Strong) => self.bold += 1,
            Event::End(TagEnd::Strong) => self.bold = self.bold.saturating_sub(1),
            Event::Start(Tag::Strikethrough) => self.strike += 1,
            Event::End(TagEnd::Strikethrough) => self.strike = self.strike.saturating_sub(1),
            Event::Start(Tag::Link { dest_url, .. }) => {
                let url = dest_url.to_string();
                let link = match url.strip_prefix('#') {
                    Some(anchor) => Hyperlink {
                        anchor: Some(anchor.to_string()),
                        ..Hyperlink::default()
                    },
                    None => Hyperlink {
                        target: Some(url),
                        ..Hyperlink::default()
                    },
                };
                self.links.push(link);
            }
            Event::End(TagEnd::Link) => {
                if let Some(link) = self.links.pop() {
                    self.push_inline(Inline::Hyperlink(link));
                }
            }
            // The alt text arrives as text events.
            Event::Start(Tag::Image { .. }) | Event::End(TagEnd::Image) => {}
            Event::Start(Tag::Table(_)) => {
                self.finish_paragraph();
                self.table = Some(Table::default());
            }
            Event::End(TagEnd::Table) => self.finish_table(),
            Event::Start(Tag::TableHead | Tag::TableRow) => self.row = Some(TableRow::default()),
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => {
                if let (Some(table), Some(row)) = (self.table.as_mut(), self.row.take()) {
                    table.rows.push(TableItem::Row(row));
                }
            }
            Event::Start(Tag::TableCell) => self.cell = Some(TableCell::default()),
            Event::End(TagEnd::TableCell) => {
                self.finish_paragraph();
                if let Some(mut cell) = self.cell.take() {
                    if cell.content.is_empty() {
                        cell.content.push(Block::Paragraph(Paragraph::default()));
                    }
                    if let Some(row) = self.row.as_mut() {
                        row.cells.push(RowItem::Cell(cell));
                    }
                }
            }
            Event::Text(text) if self.code_block => self.code_text(&text),
            Event::Text(text) => self.push_text(&text, false),
            Event::Code(code) => self.push_text(&code, true),
            Event::SoftBreak => self.push_text(" ", false),
            Event::HardBreak => self.push_inline(Inline::Run(Run {
                content: vec![RunContent::Break { kind: None }],
                ..Run::default()
            })),
            Event::Html(html) | Event::InlineHtml(html) => {
                log::debug!("Ignoring HTML in Markdown: {}", html.trim());
            }
            _ => {}
        }
    }

    fn start_paragraph(&mut self, style_id: Option<String>) {
        self.finish_paragraph();
        let style_id = style_id
            .or_else(|| (self.quote > 0).then(|| QUOTE_STYLE.to_string()))
            .or_else(|| (!self.list_stack.is_empty() && self.cell.is_none()).then(|| LIST_STYLE.to_string()));
        self.paragraph = Some(Paragraph {
            style_id,
            ..Paragraph::default()
        });
    }

    fn start_item(&mut self) {
        self.finish_paragraph();
        let depth = self.list_stack.len().saturating_sub(1);
        let Some(frame) = self.list_stack.last_mut() else {
            return;
        };
        let (ordered, number) = (frame.ordered, frame.next);
        frame.next += 1;

        let mut p = Paragraph {
            style_id: Some(LIST_STYLE.to_string()),
            ..Paragraph::default()
        };
        match self.lists {
            Some(ids) => {
                let num_id = if ordered { &ids.ordered } else { &ids.bullet };
                p.numbering = Some(NumberingRef {
                    num_id: Some(num_id.clone()),
                    level: depth.min(usize::from(MAX_LEVELS - 1)) as u8,
                });
            }
            None => {
                let marker = if ordered { format!("{number}. ") } else { String::from("\u{2022} ") };
                let indent = "\t".repeat(depth);
                p.content.push(Inline::Run(Run::text(format!("{indent}{marker}"))));
            }
        }
        self.paragraph = Some(p);
        self.fresh_item = true;
    }

    fn finish_paragraph(&mut self) {
        let Some(mut p) = self.paragraph.take() else {
            return;
        };
        // Unclosed links still keep their text.
        for link in self.links.drain(..) {
            p.content.push(Inline::Hyperlink(link));
        }
        let block = Block::Paragraph(p);
        match self.cell.as_mut() {
            Some(cell) => cell.content.push(block),
            None => self.blocks.push(block),
        }
    }

    fn finish_table(&mut self) {
        self.finish_paragraph();
        let Some(mut table) = self.table.take() else {
            return;
        };
        let columns = table
            .rows
            .iter()
            .filter_map(|item| match item {
                TableItem::Row(row) => Some(row.cells.len()),
                TableItem::Passthrough(_) => None,
            })
            .max()
            .unwrap_or(0);
        table.grid = vec![TABLE_COLUMN_PX; columns];
        self.blocks.push(Block::Table(table));
    }

    fn push_inline(&mut self, inline: Inline) {
        if let Some(link) = self.links.last_mut() {
            link.content.push(inline);
            return;
        }
        if self.paragraph.is_none() {
            self.start_paragraph(None);
        }
        if let Some(p) = self.paragraph.as_mut() {
            p.content.push(inline);
        }
        self.fresh_item = false;
    }

    fn push_text(&mut self, text: &str, monospace: bool) {
        let properties = RunProperties {
            bold: (self.bold > 0).then_some(true),
            italic: (self.italic > 0).then_some(true),
            strike: (self.strike > 0).then_some(true),
            fonts: monospace.then(monospace_fonts),
            ..RunProperties::default()
        };
        self.push_inline(Inline::Run(Run {
            properties,
            ..Run::text(text)
        }));
    }

    /// One monospace paragraph per line of a code block.
    fn code_text(&mut self, text: &str) {
        let mut lines = text.split('\n').peekable();
        while let Some(line) = lines.next() {
            if !line.is_empty() {
                self.push_text(line, true);
            }
            if lines.peek().is_some() {
                if self.paragraph.is_none() {
                    self.start_paragraph(None);
                }
                self.finish_paragraph();
            }
        }
    }
}

fn monospace_fonts() -> FontFamily {
    FontFamily {
        ascii: Some(MONOSPACE_FONTS[0].to_string()),
        h_ansi: Some(MONOSPACE_FONTS[0].to_string()),
        ..FontFamily::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(block: &Block) -> &Paragraph {
        match block {
            Block::Paragraph(p) => p,
            other => panic!("expected a paragraph, got {other:?}"),
        }
    }

    #[test]
    fn headings_lists_and_emphasis() {
        let md = "# Title\n\nSome **bold** and *italic* text.\n\n- one\n- two\n  1. nested\n";
        let blocks = parse_markdown(md, Some(&ListNumbering::baseline()));
        assert_eq!(blocks.len(), 5);

        let heading = paragraph(&blocks[0]);
        assert_eq!(heading.style_id.as_deref(), Some("Heading1"));
        assert_eq!(heading.text(), "Title");

        let body = paragraph(&blocks[1]);
        assert_eq!(body.text(), "Some bold and italic text.");
        let bold = body.content.iter().find_map(|i| match i {
            Inline::Run(r) if r.properties.bold == Some(true) => Some(r.content.clone()),
            _ => None,
        });
        assert_eq!(bold, Some(vec![RunContent::Text(String::from("bold"))]));

        let levels: Vec<_> = blocks[2..]
            .iter()
            .map(|b| {
                let n = paragraph(b).numbering.clone().unwrap();
                (n.num_id.unwrap(), n.level)
            })
            .collect();
        assert_eq!(
            levels,
            vec![("1".to_string(), 0), ("1".to_string(), 0), ("2".to_string(), 1)]
        );
        assert_eq!(paragraph(&blocks[4]).text(), "nested");
    }

    #[test]
    fn lists_without_numbering_keep_literal_markers() {
        let blocks = parse_markdown("3. third\n4. fourth\n", None);
        let texts: Vec<_> = blocks.iter().map(|b| paragraph(b).text()).collect();
        assert_eq!(texts, vec!["3. third", "4. fourth"]);
        assert!(blocks.iter().all(|b| paragraph(b).numbering.is_none()));
    }

    #[test]
    fn links_code_and_tables() {
        let md = "See [docs](https://example.com) and `x = 1`.\n\n| A | B |\n|---|---|\n| 1 | 2 |\n\n```\nfn main() {}\n\nend\n```\n";
        let blocks = parse_markdown(md, None);

        let p = paragraph(&blocks[0]);
        let link = p.content.iter().find_map(|i| match i {
            Inline::Hyperlink(h) => Some(h),
            _ => None,
        });
        assert_eq!(link.and_then(|h| h.target.as_deref()), Some("https://example.com"));
        assert_eq!(p.text(), "See docs and x = 1.");

        let Block::Table(table) = &blocks[1] else {
            panic!("expected a table");
        };
        assert_eq!(table.grid, vec![TABLE_COLUMN_PX; 2]);
        assert_eq!(table.rows.len(), 2);

        let code: Vec<_> = blocks[2..].iter().map(|b| paragraph(b).text()).collect();
        assert_eq!(code, vec!["fn main() {}", "", "end"]);
    }

    #[test]
    fn renders_document_as_markdown() {
        let md = "## Plan\n\n1. first **step**\n2. second\n\n- bullet\n\n| A | B |\n|---|---|\n| 1 | 2 |\n";
        let doc = Document {
            body: parse_markdown(md, Some(&ListNumbering::baseline())),
            ..Document::default()
        };
        let out = render_markdown(&doc, &StyleTable::default(), &NumberingCache::baseline());
        assert_eq!(
            out,
            "## Plan\n\n1. first **step**\n2. second\n- bullet\n\n| A | B |\n| --- | --- |\n| 1 | 2 |\n"
        );
    }

    #[test]
    fn emphasis_markers_hug_text() {
        assert_eq!(
            wrap(" both ", Emphasis {
                bold: true,
                italic: true,
                strike: false
            }),
            " ***both*** "
        );
        assert_eq!(escape("a*b_[c]"), "a\\*b\\_\\[c\\]");
        assert_eq!(escape_line_start(String::from("# not a heading")), "\\# not a heading");
    }
}
