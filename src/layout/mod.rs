//! Paragraph geometry: indentation, tab stops and list marker placement.
//!
//! All inputs and outputs are pixels. Style and numbering definitions are
//! converted from twips by the caller (see [`LayoutDefaults::from_styles`]).

pub mod measure;
pub mod tabs;

use serde::Serialize;

use crate::cascade::{ResolvedRunProperties, baseline_run_properties, combine, finalize_run_properties};
use crate::model::{Indent, RunProperties, TabStop};
use crate::numbering::{NumberingLevel, format_level_text, format_marker_text};
use crate::styles::{StyleTable, ThemeFonts};
use crate::units;

pub use measure::{FontMetrics, MeasureText, font_css};
pub use tabs::{DEFAULT_TAB_INTERVAL_TWIPS, DEFAULT_TAB_STOP_COUNT, ResolvedTabStop};

/// Space between the marker glyph and the text when the box is sized from
/// the glyph.
pub const MARKER_GAP_PX: f64 = 8.0;
/// Marker box width when there is neither a hanging indent nor a measured glyph.
pub const MARKER_FALLBACK_BOX_PX: f64 = 24.0;
/// Width of the `space` marker suffix when nothing can be measured.
const FALLBACK_SPACE_PX: f64 = 4.0;

/// Document-level inputs shared by every paragraph.
#[derive(Clone, Debug)]
pub struct LayoutDefaults {
    pub indent: Indent,
    pub tab_interval_px: f64,
    pub run: RunProperties,
    pub theme: ThemeFonts,
}

impl Default for LayoutDefaults {
    fn default() -> Self {
        Self {
            indent: Indent::default(),
            tab_interval_px: units::twips_to_pixels(DEFAULT_TAB_INTERVAL_TWIPS),
            run: RunProperties::default(),
            theme: ThemeFonts::default(),
        }
    }
}

impl LayoutDefaults {
    pub fn from_styles(styles: &StyleTable) -> Self {
        let interval = styles
            .defaults
            .default_tab_stop
            .filter(|v| *v > 0.0)
            .unwrap_or(DEFAULT_TAB_INTERVAL_TWIPS);
        Self {
            indent: styles
                .defaults
                .paragraph
                .indent
                .as_ref()
                .map(Indent::twips_to_pixels)
                .unwrap_or_default(),
            tab_interval_px: units::twips_to_pixels(interval),
            run: styles.defaults.run.clone(),
            theme: styles.theme.clone(),
        }
    }
}

/// Paragraph-level inputs, already merged over the paragraph's style.
#[derive(Clone, Debug, Default)]
pub struct LayoutInput {
    pub indent: Indent,
    pub tabs: Vec<TabStop>,
    pub tab_interval_px: Option<f64>,
}

/// List marker inputs for a numbered paragraph.
#[derive(Clone, Debug)]
pub struct MarkerInput<'a> {
    pub level: &'a NumberingLevel,
    pub path: &'a [u32],
    /// Formats of all levels, for templates that refer to outer levels.
    pub level_formats: &'a [String],
    /// Paragraph-mark run properties, applied over the level's run properties.
    pub mark_properties: Option<&'a RunProperties>,
    /// Previously resolved marker run; skips the cascade when present.
    pub cached_run: Option<&'a ResolvedRunProperties>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerLayout {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glyph_width_px: Option<f64>,
    pub box_width_px: f64,
    pub x_px: f64,
    pub justification: String,
    pub suffix: String,
    pub run: ResolvedRunProperties,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParagraphLayout {
    pub indent_left_px: f64,
    pub indent_right_px: f64,
    pub hanging_px: f64,
    pub first_line_px: f64,
    pub tabs_px: Vec<ResolvedTabStop>,
    pub text_start_px: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<MarkerLayout>,
}

/// Marker run: baseline, document defaults, numbering level, mark override.
pub fn resolve_marker_run(defaults: &LayoutDefaults, marker: &MarkerInput) -> ResolvedRunProperties {
    if let Some(cached) = marker.cached_run {
        return cached.clone();
    }
    let baseline = baseline_run_properties();
    let empty = RunProperties::default();
    let merged: RunProperties = combine([
        &baseline,
        &defaults.run,
        &marker.level.run,
        marker.mark_properties.unwrap_or(&empty),
    ]);
    finalize_run_properties(&merged, &defaults.theme)
}

fn marker_text(marker: &MarkerInput) -> String {
    let level = marker.level;
    if level.num_fmt == "bullet" || marker.level_formats.is_empty() {
        return format_marker_text(&level.num_fmt, &level.lvl_text, marker.path);
    }
    let formats: Vec<&str> = marker.level_formats.iter().map(String::as_str).collect();
    format_level_text(&level.lvl_text, marker.path, &formats)
}

/// Width of the box the marker occupies left of the text indent.
pub fn marker_box_width(hanging: f64, glyph_width: Option<f64>) -> f64 {
    match glyph_width {
        Some(w) => hanging.max(w + MARKER_GAP_PX),
        None if hanging > 0.0 => hanging,
        None => MARKER_FALLBACK_BOX_PX,
    }
}

pub fn compute_layout(
    input: &LayoutInput,
    defaults: &LayoutDefaults,
    marker: Option<&MarkerInput>,
    measure: Option<&dyn MeasureText>,
) -> ParagraphLayout {
    let indent: Indent = combine([&defaults.indent, &input.indent]);
    let left = indent.left.unwrap_or(0.0);
    let right = indent.right.unwrap_or(0.0);
    let hanging = indent
        .hanging
        .or_else(|| indent.first_line.filter(|f| *f < 0.0).map(|f| -f))
        .unwrap_or(0.0)
        .max(0.0);
    let first_line = if hanging > 0.0 {
        0.0
    } else {
        indent.first_line.unwrap_or(0.0).max(0.0)
    };

    let interval = input
        .tab_interval_px
        .filter(|v| *v > 0.0)
        .unwrap_or(defaults.tab_interval_px);
    let line_start = left + first_line - hanging;
    let mut tabs = tabs::compute_tab_stops(&input.tabs, line_start.max(0.0), interval);

    let Some(marker) = marker else {
        return ParagraphLayout {
            indent_left_px: left,
            indent_right_px: right,
            hanging_px: hanging,
            first_line_px: first_line,
            tabs_px: tabs,
            text_start_px: line_start,
            marker: None,
        };
    };

    let run = resolve_marker_run(defaults, marker);
    let text = marker_text(marker);
    let css = font_css(&run);
    let glyph_width = measure.map(|m| m.measure(&text, &css));
    let box_width = marker_box_width(hanging, glyph_width);
    let x = left - box_width;
    let marker_end = x + glyph_width.unwrap_or(0.0);

    let suffix = marker.level.suffix.clone();
    let text_start = match suffix.as_str() {
        "nothing" => marker_end,
        "space" => marker_end + measure.map(|m| m.measure(" ", &css)).unwrap_or(FALLBACK_SPACE_PX),
        _ => {
            tabs::insert_hanging_stop(&mut tabs, x, left);
            tabs::find_next_tab_stop(marker_end, &tabs, interval).position
        }
    };

    ParagraphLayout {
        indent_left_px: left,
        indent_right_px: right,
        hanging_px: hanging,
        first_line_px: first_line,
        tabs_px: tabs,
        text_start_px: text_start,
        marker: Some(MarkerLayout {
            text,
            glyph_width_px: glyph_width,
            box_width_px: box_width,
            x_px: x,
            justification: marker.level.justification.clone(),
            suffix,
            run,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px_indent(left: f64, hanging: Option<f64>, first_line: Option<f64>) -> Indent {
        Indent {
            left: Some(left),
            hanging,
            first_line,
            ..Indent::default()
        }
    }

    #[test]
    fn negative_first_line_is_hanging() {
        let input = LayoutInput {
            indent: px_indent(48.0, None, Some(-24.0)),
            ..LayoutInput::default()
        };
        let layout = compute_layout(&input, &LayoutDefaults::default(), None, None);
        assert_eq!(layout.hanging_px, 24.0);
        assert_eq!(layout.first_line_px, 0.0);
        assert_eq!(layout.text_start_px, 24.0);
        assert_eq!(layout.tabs_px.len(), DEFAULT_TAB_STOP_COUNT);
    }

    #[test]
    fn paragraph_indent_overrides_defaults() {
        let defaults = LayoutDefaults {
            indent: px_indent(10.0, None, None),
            ..LayoutDefaults::default()
        };
        let input = LayoutInput {
            indent: Indent {
                right: Some(5.0),
                ..Indent::default()
            },
            tab_interval_px: Some(96.0),
            ..LayoutInput::default()
        };
        let layout = compute_layout(&input, &defaults, None, None);
        assert_eq!(layout.indent_left_px, 10.0);
        assert_eq!(layout.indent_right_px, 5.0);
        assert_eq!(layout.tabs_px[0].position, 96.0);
    }

    #[test]
    fn marker_box_uses_hanging_or_glyph() {
        assert_eq!(marker_box_width(24.0, Some(10.0)), 24.0);
        assert_eq!(marker_box_width(24.0, Some(30.0)), 30.0 + MARKER_GAP_PX);
        assert_eq!(marker_box_width(24.0, None), 24.0);
        assert_eq!(marker_box_width(0.0, None), MARKER_FALLBACK_BOX_PX);
    }

    #[test]
    fn list_marker_sits_in_hanging_region() {
        let level = NumberingLevel::new(0, "decimal", "%1.");
        let formats = vec![String::from("decimal")];
        let marker = MarkerInput {
            level: &level,
            path: &[3],
            level_formats: &formats,
            mark_properties: None,
            cached_run: None,
        };
        let input = LayoutInput {
            indent: px_indent(48.0, Some(24.0), None),
            ..LayoutInput::default()
        };
        let measure = |text: &str, _: &str| text.chars().count() as f64 * 6.0;
        let layout = compute_layout(&input, &LayoutDefaults::default(), Some(&marker), Some(&measure as &dyn MeasureText));
        let m = layout.marker.unwrap();
        assert_eq!(m.text, "3.");
        assert_eq!(m.glyph_width_px, Some(12.0));
        assert_eq!(m.box_width_px, 24.0);
        assert_eq!(m.x_px, 24.0);
        assert_eq!(m.run.font_family, "Times New Roman");
        assert_eq!(layout.text_start_px, 48.0);
    }

    #[test]
    fn cached_marker_run_short_circuits() {
        let level = NumberingLevel::new(0, "bullet", "\u{F0B7}");
        let cached = ResolvedRunProperties {
            font_family: "Symbol".into(),
            font_size: 10.0,
            bold: false,
            italic: false,
            underline: false,
            strike: false,
            color: "auto".into(),
            highlight: None,
            vert_align: None,
        };
        let marker = MarkerInput {
            level: &level,
            path: &[1],
            level_formats: &[],
            mark_properties: None,
            cached_run: Some(&cached),
        };
        let run = resolve_marker_run(&LayoutDefaults::default(), &marker);
        assert_eq!(run, cached);
        let layout = compute_layout(&LayoutInput::default(), &LayoutDefaults::default(), Some(&marker), None);
        let m = layout.marker.unwrap();
        assert_eq!(m.text, "\u{2022}");
        assert_eq!(m.box_width_px, MARKER_FALLBACK_BOX_PX);
        assert_eq!(m.x_px, -MARKER_FALLBACK_BOX_PX);
    }
}
