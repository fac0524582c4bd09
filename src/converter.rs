//! A converter instance: one loaded package with its styles, numbering
//! cache and document tree.

use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::cascade::{ResolvedRunProperties, combine, resolve_paragraph_properties};
use crate::docx;
use crate::error::Error;
use crate::export::{self, ExportOptions};
use crate::layout::{self, LayoutDefaults, LayoutInput, MarkerInput, MeasureText, ParagraphLayout};
use crate::markdown::{self, ListNumbering};
use crate::model::{Block, Document, Indent, Inline, Paragraph, Run, TabStop};
use crate::numbering::{self, ListCounters, NumberingCache, NumberingProperties};
use crate::package::{NUMBERING_PART, Package};
use crate::styles::{ParagraphProperties, StyleTable};
use crate::units;

/// Where a converter is in its life. `Idle` until a document is loaded or
/// built, `Closed` after [`Converter::close`] until the next load, and
/// `Destroyed` for good.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Idle,
    Ready,
    Closed,
    Destroyed,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifecycle::Idle => "idle",
            Lifecycle::Ready => "ready",
            Lifecycle::Closed => "closed",
            Lifecycle::Destroyed => "destroyed",
        })
    }
}

/// Content appended by [`Converter::insert_content`].
#[derive(Clone, Debug, PartialEq)]
pub enum InsertContent {
    /// One paragraph per line.
    Text(String),
    Markdown(String),
    Blocks(Vec<Block>),
}

#[derive(Debug, Default)]
pub struct Converter {
    package: Option<Package>,
    styles: StyleTable,
    document: Option<Document>,
    numbering: OnceCell<NumberingCache>,
    /// Resolved marker runs by `(numId, ilvl)`, for paragraphs without
    /// paragraph-mark formatting.
    marker_runs: RefCell<HashMap<(String, u8), ResolvedRunProperties>>,
    default_numbering: bool,
    state: Lifecycle,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fall back to the blank-document bullet and ordered lists when the
    /// loaded package has no numbering part.
    pub fn with_default_numbering(mut self) -> Self {
        self.default_numbering = true;
        self.numbering = OnceCell::new();
        self.marker_runs.get_mut().clear();
        self
    }

    pub fn load(&mut self, data: &[u8]) -> Result<&Document, Error> {
        self.load_package(Package::from_bytes(data)?)
    }

    pub fn open(&mut self, path: &Path) -> Result<&Document, Error> {
        self.load_package(Package::open(path)?)
    }

    /// Replace the loaded package. The numbering cache of the previous
    /// package is dropped before the new document is imported.
    pub fn load_package(&mut self, package: Package) -> Result<&Document, Error> {
        self.ensure_not_destroyed("load a document")?;
        self.reset();
        self.styles = docx::styles::load_style_table(&package);
        self.package = Some(package);

        let doc = match &self.package {
            Some(package) => docx::import_document(package, &self.styles, self.numbering_cache())?,
            None => return Err(Error::InvalidDocx(String::from("no package loaded"))),
        };
        log::debug!(
            "Loaded {} blocks, {} comments ({:?} origin)",
            doc.body.len(),
            doc.comments.len(),
            doc.comment_origin
        );
        self.state = Lifecycle::Ready;
        Ok(self.document.insert(doc))
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state
    }

    /// Drop the loaded document and package. The converter can load
    /// another document afterwards; everything else fails until then.
    pub fn close(&mut self) {
        if self.state == Lifecycle::Destroyed {
            return;
        }
        self.reset();
        self.state = Lifecycle::Closed;
    }

    /// Close for good: no operation succeeds afterwards.
    pub fn destroy(&mut self) {
        self.reset();
        self.state = Lifecycle::Destroyed;
    }

    fn reset(&mut self) {
        self.package = None;
        self.document = None;
        self.styles = StyleTable::default();
        self.numbering = OnceCell::new();
        self.marker_runs.get_mut().clear();
    }

    fn ensure_not_destroyed(&self, operation: &'static str) -> Result<(), Error> {
        match self.state {
            Lifecycle::Destroyed => Err(Error::Lifecycle {
                state: self.state,
                operation,
            }),
            _ => Ok(()),
        }
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), Error> {
        match self.state {
            Lifecycle::Closed | Lifecycle::Destroyed => Err(Error::Lifecycle {
                state: self.state,
                operation,
            }),
            Lifecycle::Idle | Lifecycle::Ready => Ok(()),
        }
    }

    /// Numbering definitions of this instance, built on first access: the
    /// package's numbering part, else the default lists when enabled, else
    /// nothing. Repeated calls return the same cache.
    pub fn numbering_cache(&self) -> &NumberingCache {
        self.numbering.get_or_init(|| {
            if let Some(cache) = self.package.as_ref().and_then(docx::numbering::load_numbering) {
                return cache;
            }
            if self.default_numbering {
                NumberingCache::baseline()
            } else {
                NumberingCache::default()
            }
        })
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn package(&self) -> Option<&Package> {
        self.package.as_ref()
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Option<&mut Document> {
        self.document.as_mut()
    }

    /// Install a document built in memory, e.g. a new blank one.
    pub fn set_document(&mut self, doc: Document) -> Result<(), Error> {
        self.ensure_not_destroyed("set a document")?;
        self.document = Some(doc);
        self.state = Lifecycle::Ready;
        Ok(())
    }

    /// Append content at the end of the body, starting a blank document
    /// when none is loaded. Returns the number of blocks added.
    ///
    /// Markdown lists refer to the blank-document lists when the package has
    /// no numbering part of its own; those lists are then exported with the
    /// document. Otherwise list items keep their marker as literal text.
    pub fn insert_content(&mut self, content: InsertContent) -> Result<usize, Error> {
        self.ensure_open("insert content")?;
        let blocks = match content {
            InsertContent::Text(text) => text
                .lines()
                .map(|line| {
                    Block::Paragraph(Paragraph {
                        content: vec![Inline::Run(Run::text(line))],
                        ..Paragraph::default()
                    })
                })
                .collect(),
            InsertContent::Markdown(md) => {
                let own_numbering = self.package.as_ref().is_some_and(|p| p.contains(NUMBERING_PART));
                let lists = (!own_numbering).then(ListNumbering::baseline);
                let blocks = markdown::parse_markdown(&md, lists.as_ref());
                if lists.is_some() && self.numbering_cache().is_empty() && uses_numbering(&blocks) {
                    log::debug!("Switching to the default lists for inserted Markdown");
                    self.numbering = OnceCell::from(NumberingCache::baseline());
                    self.marker_runs.get_mut().clear();
                }
                blocks
            }
            InsertContent::Blocks(blocks) => blocks,
        };
        let count = blocks.len();
        self.document.get_or_insert_with(Document::default).body.extend(blocks);
        self.state = Lifecycle::Ready;
        Ok(count)
    }

    /// The body as Markdown; empty when nothing is loaded.
    pub fn to_markdown(&self) -> Result<String, Error> {
        self.ensure_open("render Markdown")?;
        Ok(self
            .document
            .as_ref()
            .map(|doc| markdown::render_markdown(doc, &self.styles, self.numbering_cache()))
            .unwrap_or_default())
    }

    /// Export the current document tree over the loaded package. With
    /// nothing loaded this is a blank document.
    pub fn export(&self, options: &ExportOptions) -> Result<Package, Error> {
        self.ensure_open("export")?;
        let empty = Document::default();
        let doc = self.document.as_ref().unwrap_or(&empty);
        export::export_document(doc, self.package.as_ref(), self.numbering_cache(), options)
    }

    pub fn export_docx(&self, options: &ExportOptions) -> Result<Vec<u8>, Error> {
        self.export(options)?.to_bytes()
    }

    pub fn resolve_numbering_properties(
        &self,
        style_id: Option<&str>,
        num_id: &str,
        level: u8,
    ) -> NumberingProperties {
        numbering::resolve_numbering_properties(&self.styles, self.numbering_cache(), style_id, num_id, level)
    }

    /// Layout of one paragraph. The list path comes from the marker
    /// resolved at import; without one, every level is at its start value.
    pub fn layout_paragraph(&self, p: &Paragraph, measure: Option<&dyn MeasureText>) -> ParagraphLayout {
        let path = p.list_rendering.as_ref().map(|r| r.path.clone());
        self.layout_with_path(p, path, measure)
    }

    /// Layout of every paragraph in document order, with list counters
    /// running across the document.
    pub fn layout_document(&self, measure: Option<&dyn MeasureText>) -> Vec<ParagraphLayout> {
        let Some(doc) = &self.document else {
            return Vec::new();
        };
        let mut counters = ListCounters::default();
        doc.paragraphs()
            .into_iter()
            .map(|p| {
                let path = numbering::paragraph_numbering(&self.styles, p)
                    .and_then(|(num_id, ilvl)| counters.advance(self.numbering_cache(), &num_id, ilvl));
                self.layout_with_path(p, path, measure)
            })
            .collect()
    }

    fn layout_with_path(
        &self,
        p: &Paragraph,
        path: Option<Vec<u32>>,
        measure: Option<&dyn MeasureText>,
    ) -> ParagraphLayout {
        let defaults = LayoutDefaults::from_styles(&self.styles);
        let direct = ParagraphProperties {
            indent: p.indent.as_ref().map(Indent::pixels_to_twips),
            tabs: p.tabs.iter().map(tab_to_twips).collect(),
            ..ParagraphProperties::default()
        };
        let styled = resolve_paragraph_properties(&self.styles, p.style_id.as_deref(), &ParagraphProperties::default());

        let numbering = self.numbering_cache();
        let list = numbering::paragraph_numbering(&self.styles, p)
            .and_then(|(num_id, ilvl)| numbering.level(&num_id, ilvl).map(|level| (num_id, ilvl, level)));

        // A numbering level sits between the style and direct formatting.
        let mut layers: Vec<&ParagraphProperties> = vec![&styled];
        if let Some((_, _, level)) = &list {
            layers.push(&level.paragraph);
        }
        layers.push(&direct);
        let resolved: ParagraphProperties = combine(layers);

        let input = LayoutInput {
            indent: resolved
                .indent
                .as_ref()
                .map(Indent::twips_to_pixels)
                .unwrap_or_default(),
            tabs: resolved.tabs.iter().map(tab_to_pixels).collect(),
            tab_interval_px: None,
        };

        let Some((num_id, ilvl, level)) = list else {
            return layout::compute_layout(&input, &defaults, None, measure);
        };
        let path = path.unwrap_or_else(|| {
            (0..=ilvl)
                .map(|i| numbering.level(&num_id, i).map(|l| l.start).unwrap_or(1))
                .collect()
        });
        let formats = numbering.level_formats(&num_id);
        // Paragraph-mark formatting makes the marker run paragraph specific.
        let cache_key = p.mark_properties.is_none().then(|| (num_id, ilvl));
        let cached = cache_key
            .as_ref()
            .and_then(|key| self.marker_runs.borrow().get(key).cloned());
        let marker = MarkerInput {
            level: &level,
            path: &path,
            level_formats: &formats,
            mark_properties: p.mark_properties.as_ref(),
            cached_run: cached.as_ref(),
        };
        let layout = layout::compute_layout(&input, &defaults, Some(&marker), measure);
        if let (Some(key), None, Some(m)) = (cache_key, &cached, &layout.marker) {
            self.marker_runs.borrow_mut().insert(key, m.run.clone());
        }
        layout
    }

    /// Number of marker runs resolved and kept for reuse.
    pub fn marker_run_cache_len(&self) -> usize {
        self.marker_runs.borrow().len()
    }
}

fn uses_numbering(blocks: &[Block]) -> bool {
    let mut paragraphs = Vec::new();
    crate::model::collect_paragraphs(blocks, &mut paragraphs);
    paragraphs.iter().any(|p| p.numbering.is_some())
}

fn tab_to_twips(tab: &TabStop) -> TabStop {
    TabStop {
        position: units::pixels_to_twips(tab.position),
        ..tab.clone()
    }
}

fn tab_to_pixels(tab: &TabStop) -> TabStop {
    TabStop {
        position: units::twips_to_pixels(tab.position),
        ..tab.clone()
    }
}

/// The numbering cache of `converter`. Two calls on the same instance
/// return the same reference.
pub fn get_numbering_cache(converter: &Converter) -> &NumberingCache {
    converter.numbering_cache()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NumberingRef;

    #[test]
    fn empty_converter_has_empty_numbering() {
        let c = Converter::new();
        assert!(get_numbering_cache(&c).is_empty());
        let props = c.resolve_numbering_properties(None, "1", 0);
        assert_eq!(props, NumberingProperties::default());
    }

    #[test]
    fn default_numbering_is_cached_once() {
        let c = Converter::new().with_default_numbering();
        let first = get_numbering_cache(&c);
        let second = get_numbering_cache(&c);
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.level("2", 0).map(|l| l.num_fmt), Some(String::from("decimal")));
    }

    #[test]
    fn unnumbered_paragraph_layout() {
        let c = Converter::new();
        let p = Paragraph {
            indent: Some(Indent {
                left: Some(48.0),
                first_line: Some(-24.0),
                ..Indent::default()
            }),
            ..Paragraph::default()
        };
        let layout = c.layout_paragraph(&p, None);
        assert_eq!(layout.indent_left_px, 48.0);
        assert_eq!(layout.hanging_px, 24.0);
        assert!(layout.marker.is_none());
    }

    #[test]
    fn numbered_paragraph_uses_level_indent() {
        let c = Converter::new().with_default_numbering();
        let p = Paragraph {
            numbering: Some(NumberingRef {
                num_id: Some(String::from("2")),
                level: 0,
            }),
            ..Paragraph::default()
        };
        let layout = c.layout_paragraph(&p, None);
        assert_eq!(layout.indent_left_px, 48.0);
        assert_eq!(layout.hanging_px, 24.0);
        let marker = layout.marker.unwrap();
        assert_eq!(marker.text, "1.");
        assert_eq!(marker.x_px, 24.0);
    }

    #[test]
    fn marker_run_is_resolved_once_per_level() {
        let c = Converter::new().with_default_numbering();
        let p = Paragraph {
            numbering: Some(NumberingRef {
                num_id: Some(String::from("1")),
                level: 0,
            }),
            ..Paragraph::default()
        };
        let first = c.layout_paragraph(&p, None);
        assert_eq!(c.marker_run_cache_len(), 1);

        // A seeded entry is what the next layout picks up.
        let mut seeded = first.marker.clone().unwrap().run;
        seeded.font_family = String::from("Seeded");
        c.marker_runs
            .borrow_mut()
            .insert((String::from("1"), 0), seeded.clone());
        let second = c.layout_paragraph(&p, None);
        assert_eq!(second.marker.unwrap().run, seeded);
        assert_eq!(c.marker_run_cache_len(), 1);
    }

    #[test]
    fn mark_properties_bypass_the_marker_cache() {
        let c = Converter::new().with_default_numbering();
        let p = Paragraph {
            numbering: Some(NumberingRef {
                num_id: Some(String::from("2")),
                level: 0,
            }),
            mark_properties: Some(crate::model::RunProperties {
                bold: Some(true),
                ..Default::default()
            }),
            ..Paragraph::default()
        };
        let layout = c.layout_paragraph(&p, None);
        assert!(layout.marker.unwrap().run.bold);
        assert_eq!(c.marker_run_cache_len(), 0);
    }

    #[test]
    fn closed_converter_rejects_work_until_reloaded() {
        let mut c = Converter::new();
        assert_eq!(c.lifecycle(), Lifecycle::Idle);
        c.insert_content(InsertContent::Text(String::from("hello"))).unwrap();
        assert_eq!(c.lifecycle(), Lifecycle::Ready);

        c.close();
        assert_eq!(c.lifecycle(), Lifecycle::Closed);
        assert!(c.document().is_none());
        assert!(matches!(
            c.export(&ExportOptions::default()),
            Err(Error::Lifecycle {
                state: Lifecycle::Closed,
                ..
            })
        ));
        assert!(c.to_markdown().is_err());
        assert!(c.insert_content(InsertContent::Text(String::from("x"))).is_err());

        c.set_document(Document::default()).unwrap();
        assert_eq!(c.lifecycle(), Lifecycle::Ready);

        c.destroy();
        assert!(c.set_document(Document::default()).is_err());
        let err = c.load(&[]).unwrap_err();
        assert_eq!(err.to_string(), "cannot load a document: converter is destroyed");
        c.close();
        assert_eq!(c.lifecycle(), Lifecycle::Destroyed);
    }
}
