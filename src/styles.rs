use std::collections::{HashMap, HashSet};

use crate::model::{Indent, NumberingRef, RunProperties, TabStop};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StyleKind {
    Paragraph,
    Character,
    Table,
    Numbering,
}

/// Paragraph formatting as it appears in styles, document defaults and
/// numbering levels. Lengths are twips.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParagraphProperties {
    pub indent: Option<Indent>,
    pub numbering: Option<NumberingRef>,
    pub tabs: Vec<TabStop>,
    pub justification: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Style {
    pub id: String,
    pub name: Option<String>,
    pub kind: StyleKind,
    pub based_on: Option<String>,
    pub is_default: bool,
    pub paragraph: ParagraphProperties,
    pub run: RunProperties,
}

#[derive(Clone, Debug)]
pub struct ThemeFonts {
    pub major: String,
    pub minor: String,
}

impl Default for ThemeFonts {
    fn default() -> Self {
        Self {
            major: String::from("Aptos Display"),
            minor: String::from("Aptos"),
        }
    }
}

impl ThemeFonts {
    pub fn resolve(&self, theme_ref: &str) -> Option<&str> {
        match theme_ref {
            "majorHAnsi" | "majorAscii" | "majorBidi" | "majorEastAsia" => Some(&self.major),
            "minorHAnsi" | "minorAscii" | "minorBidi" | "minorEastAsia" => Some(&self.minor),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DocDefaults {
    pub run: RunProperties,
    pub paragraph: ParagraphProperties,
    /// `w:settings/w:defaultTabStop`, twips.
    pub default_tab_stop: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct StyleTable {
    pub defaults: DocDefaults,
    pub theme: ThemeFonts,
    pub styles: HashMap<String, Style>,
}

impl StyleTable {
    pub fn get(&self, id: &str) -> Option<&Style> {
        self.styles.get(id)
    }

    pub fn default_style(&self, kind: StyleKind) -> Option<&Style> {
        let mut defaults: Vec<&Style> = self
            .styles
            .values()
            .filter(|s| s.kind == kind && s.is_default)
            .collect();
        defaults.sort_by(|a, b| a.id.cmp(&b.id));
        defaults.into_iter().next()
    }

    /// The `basedOn` chain of `id`, root first. A missing parent ends the
    /// chain; a cycle is a data error and is cut at the first repeat.
    pub fn chain(&self, id: &str) -> Vec<&Style> {
        let mut chain = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = self.styles.get(id);
        while let Some(style) = current {
            if !seen.insert(style.id.as_str()) {
                log::warn!("Style cycle through '{}' in basedOn chain of '{id}'", style.id);
                break;
            }
            chain.push(style);
            current = match style.based_on.as_deref() {
                Some(parent) => {
                    let next = self.styles.get(parent);
                    if next.is_none() {
                        log::debug!("Style '{}' is based on unknown style '{parent}'", style.id);
                    }
                    next
                }
                None => None,
            };
        }
        chain.reverse();
        chain
    }

    /// Numbering reference contributed by a paragraph style or its ancestors.
    pub fn style_numbering(&self, id: &str) -> Option<NumberingRef> {
        self.chain(id)
            .iter()
            .rev()
            .find_map(|s| s.paragraph.numbering.clone())
    }

    /// Paragraph style used when a paragraph names none.
    pub fn effective_paragraph_style<'a>(&'a self, id: Option<&'a str>) -> Option<&'a str> {
        match id {
            Some(id) => Some(id),
            None => self
                .default_style(StyleKind::Paragraph)
                .map(|s| s.id.as_str()),
        }
    }
}
