//! Layered property resolution.
//!
//! Every formatting source (baseline, document defaults, each style in a
//! `basedOn` chain, numbering level, direct formatting) is a partial layer.
//! Layers fold left to right: scalar properties are replaced by the upper
//! layer when it sets them, object properties (fonts, indentation) merge one
//! level deep so an upper layer may set `hAnsi` without erasing `ascii`.

use serde::Serialize;

use crate::model::{Color, FontFamily, Indent, RunProperties, TabStop};
use crate::styles::{ParagraphProperties, StyleKind, StyleTable, ThemeFonts};

pub const BASELINE_FONT: &str = "Times New Roman";
pub const BASELINE_FONT_SIZE: f64 = 12.0;
pub const BASELINE_COLOR: &str = "000000";

pub trait Overlay {
    fn overlay(&mut self, upper: &Self);
}

/// Fold `layers` bottom to top into a single value.
pub fn combine<'a, T, I>(layers: I) -> T
where
    T: Overlay + Default + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut acc = T::default();
    for layer in layers {
        acc.overlay(layer);
    }
    acc
}

macro_rules! overlay_scalars {
    ($base:expr, $upper:expr, $($field:ident),+ $(,)?) => {
        $(
            if $upper.$field.is_some() {
                $base.$field = $upper.$field.clone();
            }
        )+
    };
}

fn overlay_object<T: Overlay + Clone>(base: &mut Option<T>, upper: &Option<T>) {
    match (base.as_mut(), upper) {
        (Some(b), Some(u)) => b.overlay(u),
        (None, Some(u)) => *base = Some(u.clone()),
        _ => {}
    }
}

impl Overlay for FontFamily {
    fn overlay(&mut self, upper: &Self) {
        overlay_scalars!(self, upper, ascii, h_ansi, east_asia, cs, ascii_theme, h_ansi_theme);
        // A concrete face on the upper layer beats an inherited theme reference.
        if upper.ascii.is_some() && upper.ascii_theme.is_none() {
            self.ascii_theme = None;
        }
        if upper.h_ansi.is_some() && upper.h_ansi_theme.is_none() {
            self.h_ansi_theme = None;
        }
    }
}

impl Overlay for RunProperties {
    fn overlay(&mut self, upper: &Self) {
        overlay_scalars!(
            self, upper, style_id, bold, italic, strike, underline, color, size, highlight,
            vert_align,
        );
        overlay_object(&mut self.fonts, &upper.fonts);
    }
}

impl Overlay for Indent {
    fn overlay(&mut self, upper: &Self) {
        if upper.left.is_some() {
            self.left = upper.left;
            self.explicit_left = upper.explicit_left;
        }
        if upper.right.is_some() {
            self.right = upper.right;
            self.explicit_right = upper.explicit_right;
        }
        if upper.first_line.is_some() {
            self.first_line = upper.first_line;
            self.explicit_first_line = upper.explicit_first_line;
        }
        if upper.hanging.is_some() {
            self.hanging = upper.hanging;
            self.explicit_hanging = upper.explicit_hanging;
        }
        // firstLine and hanging are one attribute pair in Word: setting one on
        // an upper layer clears the other from below.
        if upper.first_line.is_some() && upper.hanging.is_none() {
            self.hanging = None;
            self.explicit_hanging = false;
        }
        if upper.hanging.is_some() && upper.first_line.is_none() {
            self.first_line = None;
            self.explicit_first_line = false;
        }
    }
}

impl Overlay for ParagraphProperties {
    fn overlay(&mut self, upper: &Self) {
        overlay_object(&mut self.indent, &upper.indent);
        overlay_scalars!(self, upper, numbering, justification);
        self.tabs = merge_tabs(&self.tabs, &upper.tabs);
    }
}

/// Upper-layer tab stops are added to inherited ones; a `clear` stop removes
/// the inherited stop at the same position.
pub fn merge_tabs(base: &[TabStop], upper: &[TabStop]) -> Vec<TabStop> {
    let mut out: Vec<TabStop> = base
        .iter()
        .filter(|b| {
            !upper
                .iter()
                .any(|u| (u.position - b.position).abs() < 0.5)
        })
        .cloned()
        .collect();
    out.extend(upper.iter().filter(|u| !u.is_clear()).cloned());
    out.sort_by(|a, b| a.position.total_cmp(&b.position));
    out
}

/// Fully resolved run formatting.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRunProperties {
    pub font_family: String,
    /// Points.
    pub font_size: f64,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike: bool,
    /// Hex RGB or `auto`.
    pub color: String,
    pub highlight: Option<String>,
    pub vert_align: Option<String>,
}

pub fn baseline_run_properties() -> RunProperties {
    RunProperties {
        fonts: Some(FontFamily {
            ascii: Some(BASELINE_FONT.to_string()),
            h_ansi: Some(BASELINE_FONT.to_string()),
            east_asia: None,
            cs: None,
            ascii_theme: None,
            h_ansi_theme: None,
        }),
        size: Some(BASELINE_FONT_SIZE),
        color: Some(Color::Rgb(BASELINE_COLOR.to_string())),
        ..RunProperties::default()
    }
}

/// Collapse a merged layer stack into concrete values.
pub fn finalize_run_properties(props: &RunProperties, theme: &ThemeFonts) -> ResolvedRunProperties {
    let font_family = props
        .fonts
        .as_ref()
        .and_then(|f| {
            f.ascii_theme
                .as_deref()
                .and_then(|t| theme.resolve(t))
                .map(str::to_string)
                .or_else(|| f.ascii.clone())
                .or_else(|| f.h_ansi.clone())
                .or_else(|| f.east_asia.clone())
                .or_else(|| f.cs.clone())
        })
        .unwrap_or_else(|| BASELINE_FONT.to_string());
    ResolvedRunProperties {
        font_family,
        font_size: props.size.unwrap_or(BASELINE_FONT_SIZE),
        bold: props.bold.unwrap_or(false),
        italic: props.italic.unwrap_or(false),
        underline: props.underline.as_ref().is_some_and(|u| u.is_visible()),
        strike: props.strike.unwrap_or(false),
        color: props
            .color
            .as_ref()
            .map(|c| c.xml_value().to_string())
            .unwrap_or_else(|| BASELINE_COLOR.to_string()),
        highlight: props.highlight.clone(),
        vert_align: props.vert_align.clone(),
    }
}

/// Merge run-property layers for a run: baseline, document defaults, the
/// paragraph style chain, the character style chain, then direct formatting.
pub fn cascade_run_properties(
    styles: &StyleTable,
    paragraph_style: Option<&str>,
    direct: &RunProperties,
) -> RunProperties {
    let baseline = baseline_run_properties();
    let mut layers: Vec<&RunProperties> = vec![&baseline, &styles.defaults.run];
    if let Some(id) = styles.effective_paragraph_style(paragraph_style) {
        layers.extend(styles.chain(id).into_iter().map(|s| &s.run));
    }
    if let Some(id) = direct.style_id.as_deref() {
        layers.extend(
            styles
                .chain(id)
                .into_iter()
                .filter(|s| s.kind == StyleKind::Character)
                .map(|s| &s.run),
        );
    }
    layers.push(direct);
    combine(layers)
}

pub fn resolve_run_properties(
    styles: &StyleTable,
    paragraph_style: Option<&str>,
    direct: &RunProperties,
) -> ResolvedRunProperties {
    finalize_run_properties(&cascade_run_properties(styles, paragraph_style, direct), &styles.theme)
}

/// Paragraph properties of a style chain alone (no document defaults).
pub fn style_paragraph_properties(styles: &StyleTable, style_id: &str) -> ParagraphProperties {
    combine(styles.chain(style_id).into_iter().map(|s| &s.paragraph))
}

/// Document defaults, style chain, then direct paragraph properties (twips).
pub fn resolve_paragraph_properties(
    styles: &StyleTable,
    style_id: Option<&str>,
    direct: &ParagraphProperties,
) -> ParagraphProperties {
    let mut layers: Vec<&ParagraphProperties> = vec![&styles.defaults.paragraph];
    if let Some(id) = styles.effective_paragraph_style(style_id) {
        layers.extend(styles.chain(id).into_iter().map(|s| &s.paragraph));
    }
    layers.push(direct);
    combine(layers)
}
