//! Numbering definitions, list counters and marker text.

use std::collections::{BTreeMap, HashMap};

use crate::cascade::{combine, style_paragraph_properties};
use crate::model::{Indent, NumberingRef, Paragraph, RunProperties};
use crate::styles::{ParagraphProperties, StyleTable};

pub const MAX_LEVELS: u8 = 9;

/// `numId`s of the lists in [`NumberingCache::baseline`].
pub const BASELINE_BULLET_NUM_ID: &str = "1";
pub const BASELINE_ORDERED_NUM_ID: &str = "2";

#[derive(Clone, Debug, PartialEq)]
pub struct NumberingLevel {
    pub ilvl: u8,
    pub start: u32,
    pub num_fmt: String,
    pub lvl_text: String,
    /// `w:lvlJc`: `left`, `center`, `right`, `start`, `end`.
    pub justification: String,
    /// `w:suff`: `tab`, `space` or `nothing`.
    pub suffix: String,
    pub paragraph: ParagraphProperties,
    pub run: RunProperties,
}

impl NumberingLevel {
    pub fn new(ilvl: u8, num_fmt: &str, lvl_text: &str) -> Self {
        Self {
            ilvl,
            start: 1,
            num_fmt: num_fmt.to_string(),
            lvl_text: lvl_text.to_string(),
            justification: String::from("left"),
            suffix: String::from("tab"),
            paragraph: ParagraphProperties::default(),
            run: RunProperties::default(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AbstractNumbering {
    pub id: String,
    pub levels: BTreeMap<u8, NumberingLevel>,
    pub style_link: Option<String>,
    pub num_style_link: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LevelOverride {
    pub start_override: Option<u32>,
    pub level: Option<NumberingLevel>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberingDefinition {
    pub num_id: String,
    pub abstract_num_id: String,
    pub overrides: BTreeMap<u8, LevelOverride>,
}

/// Numbering definitions and abstracts of one converter instance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberingCache {
    pub num_to_definition: HashMap<String, NumberingDefinition>,
    pub abstract_to_definition: HashMap<String, AbstractNumbering>,
}

impl NumberingCache {
    pub fn is_empty(&self) -> bool {
        self.num_to_definition.is_empty() && self.abstract_to_definition.is_empty()
    }

    pub fn abstract_for(&self, num_id: &str) -> Option<&AbstractNumbering> {
        let def = self.num_to_definition.get(num_id)?;
        self.abstract_to_definition.get(&def.abstract_num_id)
    }

    /// Effective level definition: a `w:lvlOverride/w:lvl` replaces the
    /// abstract level, a `w:startOverride` only changes its start value.
    pub fn level(&self, num_id: &str, ilvl: u8) -> Option<NumberingLevel> {
        let def = self.num_to_definition.get(num_id)?;
        let over = def.overrides.get(&ilvl);
        let mut level = match over.and_then(|o| o.level.clone()) {
            Some(level) => level,
            None => self
                .abstract_to_definition
                .get(&def.abstract_num_id)?
                .levels
                .get(&ilvl)?
                .clone(),
        };
        if let Some(start) = over.and_then(|o| o.start_override) {
            level.start = start;
        }
        Some(level)
    }

    /// Formats of levels 0..9, used when a template refers to outer levels.
    pub fn level_formats(&self, num_id: &str) -> Vec<String> {
        (0..MAX_LEVELS)
            .map(|i| {
                self.level(num_id, i)
                    .map(|l| l.num_fmt)
                    .unwrap_or_else(|| String::from("decimal"))
            })
            .collect()
    }

    /// Default bullet (`numId` 1) and ordered (`numId` 2) lists shipped with
    /// a blank document.
    pub fn baseline() -> Self {
        const BULLETS: [&str; 3] = ["\u{2022}", "\u{25E6}", "\u{25AA}"];
        const ORDERED: [&str; 3] = ["decimal", "lowerLetter", "lowerRoman"];

        let mut bullet = AbstractNumbering {
            id: String::from("0"),
            ..AbstractNumbering::default()
        };
        let mut ordered = AbstractNumbering {
            id: String::from("1"),
            ..AbstractNumbering::default()
        };
        for ilvl in 0..MAX_LEVELS {
            let indent = Indent {
                left: Some(720.0 * (ilvl as f64 + 1.0)),
                hanging: Some(360.0),
                ..Indent::default()
            };
            let mut b = NumberingLevel::new(ilvl, "bullet", BULLETS[ilvl as usize % 3]);
            b.paragraph.indent = Some(indent.clone());
            bullet.levels.insert(ilvl, b);

            let template = format!("%{}.", ilvl + 1);
            let mut o = NumberingLevel::new(ilvl, ORDERED[ilvl as usize % 3], &template);
            o.paragraph.indent = Some(indent);
            if ilvl % 3 == 2 {
                o.justification = String::from("right");
            }
            ordered.levels.insert(ilvl, o);
        }

        let mut cache = NumberingCache::default();
        for (num_id, abs) in [(BASELINE_BULLET_NUM_ID, &bullet), (BASELINE_ORDERED_NUM_ID, &ordered)] {
            cache.num_to_definition.insert(
                num_id.to_string(),
                NumberingDefinition {
                    num_id: num_id.to_string(),
                    abstract_num_id: abs.id.clone(),
                    overrides: BTreeMap::new(),
                },
            );
        }
        cache.abstract_to_definition.insert(bullet.id.clone(), bullet);
        cache.abstract_to_definition.insert(ordered.id.clone(), ordered);
        cache
    }
}

/// Indentation and paragraph properties a list item receives from its
/// paragraph style and from its numbering level, kept apart so callers can
/// inspect either source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberingProperties {
    pub style_ppr: ParagraphProperties,
    pub num_def_ppr: ParagraphProperties,
}

/// Resolve the two property sources of a list item. With no numbering data
/// loaded at all the result is empty, which is not an error.
pub fn resolve_numbering_properties(
    styles: &StyleTable,
    numbering: &NumberingCache,
    style_id: Option<&str>,
    num_id: &str,
    level: u8,
) -> NumberingProperties {
    if numbering.is_empty() {
        return NumberingProperties::default();
    }
    let style_ppr = style_id
        .map(|id| style_paragraph_properties(styles, id))
        .unwrap_or_default();
    let num_def_ppr = numbering
        .level(num_id, level)
        .map(|l| l.paragraph)
        .unwrap_or_default();
    NumberingProperties {
        style_ppr,
        num_def_ppr,
    }
}

/// `(numId, ilvl)` of a paragraph: direct numbering, else the style's,
/// with a direct level override applied. `numId` 0 removes numbering.
pub fn paragraph_numbering(styles: &StyleTable, p: &Paragraph) -> Option<(String, u8)> {
    if let Some(NumberingRef {
        num_id: Some(num_id),
        level,
    }) = &p.numbering
    {
        return (num_id != "0").then(|| (num_id.clone(), *level));
    }
    let style = styles
        .effective_paragraph_style(p.style_id.as_deref())
        .and_then(|id| styles.style_numbering(id))?;
    let num_id = style.num_id.filter(|id| id != "0")?;
    let level = p.numbering.as_ref().map_or(style.level, |r| r.level);
    Some((num_id, level))
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VisibleIndent {
    pub left: f64,
    pub hanging: f64,
    pub right: f64,
}

/// Indentation actually rendered for a list item: style, then numbering
/// level, then any directly set paragraph indent.
pub fn get_visible_indent(
    style_ppr: &ParagraphProperties,
    num_def_ppr: &ParagraphProperties,
    override_indent: Option<&Indent>,
) -> VisibleIndent {
    let empty = Indent::default();
    let merged: Indent = combine([
        style_ppr.indent.as_ref().unwrap_or(&empty),
        num_def_ppr.indent.as_ref().unwrap_or(&empty),
        override_indent.unwrap_or(&empty),
    ]);
    let hanging = merged
        .hanging
        .or_else(|| merged.first_line.filter(|f| *f < 0.0).map(|f| -f))
        .unwrap_or(0.0);
    VisibleIndent {
        left: merged.left.unwrap_or(0.0),
        hanging: hanging.max(0.0),
        right: merged.right.unwrap_or(0.0),
    }
}

fn to_roman(mut n: u32) -> String {
    const TABLE: &[(u32, &str)] = &[
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut result = String::new();
    for &(value, numeral) in TABLE {
        while n >= value {
            result.push_str(numeral);
            n -= value;
        }
    }
    result
}

fn to_letters(value: u32, base: u8) -> String {
    if value == 0 {
        return String::new();
    }
    let mut n = value - 1;
    let mut result = String::new();
    loop {
        result.insert(0, (base + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

fn ordinal_suffix(value: u32) -> &'static str {
    match (value % 10, value % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Format one counter value in a numbering format.
pub fn format_number(value: u32, num_fmt: &str) -> String {
    match num_fmt {
        "decimal" => value.to_string(),
        "decimalZero" => format!("{value:02}"),
        "lowerLetter" => to_letters(value, b'a'),
        "upperLetter" => to_letters(value, b'A'),
        "lowerRoman" => to_roman(value),
        "upperRoman" => to_roman(value).to_uppercase(),
        "ordinal" => format!("{value}{}", ordinal_suffix(value)),
        "none" => String::new(),
        _ => value.to_string(),
    }
}

pub(crate) fn normalize_bullet_text(text: &str) -> String {
    text.chars()
        .map(|c| {
            let cp = c as u32;
            if (0xF000..=0xF0FF).contains(&cp) {
                symbol_pua_to_unicode(cp).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

fn symbol_pua_to_unicode(cp: u32) -> Option<char> {
    let sym = cp - 0xF000;
    let mapped = match sym {
        0xB7 => '\u{2022}',
        0xA7 => '\u{25A0}',
        0xA8 => '\u{25CB}',
        0xD8 => '\u{2666}',
        0x76 => '\u{221A}',
        _ => return char::from_u32(sym),
    };
    Some(mapped)
}

/// Render a level-text template (`%1.`, `%1.%2)`) for `path`, where `path[i]`
/// is the counter of level `i`. `formats[i]` is the format of level `i`;
/// missing entries fall back to `decimal`.
pub fn format_level_text(lvl_text: &str, path: &[u32], formats: &[&str]) -> String {
    let mut label = lvl_text.to_string();
    for lvl_idx in 0..MAX_LEVELS as usize {
        let placeholder = format!("%{}", lvl_idx + 1);
        if !label.contains(&placeholder) {
            continue;
        }
        let value = match path.get(lvl_idx) {
            Some(v) => format_number(*v, formats.get(lvl_idx).copied().unwrap_or("decimal")),
            None => String::new(),
        };
        label = label.replace(&placeholder, &value);
    }
    label
}

/// Marker text of a list item whose levels all share `num_fmt`.
///
/// `format_marker_text("upperRoman", "%1", &[4]) == "IV"`.
pub fn format_marker_text(num_fmt: &str, lvl_text: &str, path: &[u32]) -> String {
    if num_fmt == "bullet" {
        let text = normalize_bullet_text(lvl_text);
        return if text.is_empty() {
            String::from("\u{2022}")
        } else {
            text
        };
    }
    let formats = vec![num_fmt; path.len().max(1)];
    format_level_text(lvl_text, path, &formats)
}

/// Running list counters across a document, keyed by `numId`.
#[derive(Debug, Default)]
pub struct ListCounters {
    counters: HashMap<(String, u8), u32>,
    last_seen_level: HashMap<String, u8>,
}

impl ListCounters {
    /// Advance the counter for `(num_id, ilvl)` and return the full path
    /// (one counter per level up to and including `ilvl`).
    pub fn advance(&mut self, numbering: &NumberingCache, num_id: &str, ilvl: u8) -> Option<Vec<u32>> {
        let level = numbering.level(num_id, ilvl)?;

        // Returning to a shallower level restarts the deeper ones.
        if let Some(prev) = self.last_seen_level.get(num_id).copied()
            && ilvl <= prev
        {
            for deeper in (ilvl + 1)..=prev {
                self.counters.remove(&(num_id.to_string(), deeper));
            }
        }
        self.last_seen_level.insert(num_id.to_string(), ilvl);

        let current = *self
            .counters
            .entry((num_id.to_string(), ilvl))
            .and_modify(|c| *c += 1)
            .or_insert(level.start);

        let path = (0..=ilvl)
            .map(|i| {
                if i == ilvl {
                    current
                } else {
                    self.counters
                        .get(&(num_id.to_string(), i))
                        .copied()
                        .unwrap_or_else(|| numbering.level(num_id, i).map(|l| l.start).unwrap_or(1))
                }
            })
            .collect();
        Some(path)
    }
}
