use std::collections::HashMap;

use ttf_parser::Face;

use crate::cascade::ResolvedRunProperties;
use crate::units;

/// Rendered width of `text` in pixels for a CSS font shorthand such as
/// `bold 16px "Arial"`.
pub trait MeasureText {
    fn measure(&self, text: &str, font_css: &str) -> f64;
}

impl<F> MeasureText for F
where
    F: Fn(&str, &str) -> f64,
{
    fn measure(&self, text: &str, font_css: &str) -> f64 {
        self(text, font_css)
    }
}

/// CSS font shorthand for resolved run properties.
pub fn font_css(run: &ResolvedRunProperties) -> String {
    let mut css = String::new();
    if run.italic {
        css.push_str("italic ");
    }
    if run.bold {
        css.push_str("bold ");
    }
    let px = units::format_number(units::points_to_pixels(run.font_size));
    css.push_str(&format!("{px}px \"{}\"", run.font_family));
    css
}

/// Font size in pixels from a CSS shorthand; 16px when absent.
pub fn font_css_size_px(font_css: &str) -> f64 {
    font_css
        .split_whitespace()
        .find_map(|tok| tok.strip_suffix("px").and_then(|v| v.parse::<f64>().ok()))
        .unwrap_or(16.0)
}

/// Advance widths of one face at 1000 units per em.
pub struct FontMetrics {
    widths_1000: HashMap<char, f64>,
    default_width: f64,
}

impl FontMetrics {
    /// Read advance widths for Latin-1 and any `extra` characters from a
    /// TrueType/OpenType file.
    pub fn from_font_data(data: &[u8], face_index: u32, extra: &str) -> Option<Self> {
        let face = Face::parse(data, face_index).ok()?;
        let units = face.units_per_em() as f64;
        let mut widths_1000 = HashMap::new();
        for ch in (32u8..=255u8).map(char::from).chain(extra.chars()) {
            if let Some(adv) = face.glyph_index(ch).and_then(|gid| face.glyph_hor_advance(gid)) {
                widths_1000.insert(ch, adv as f64 / units * 1000.0);
            }
        }
        let default_width = widths_1000.get(&'n').copied().unwrap_or(556.0);
        Some(Self {
            widths_1000,
            default_width,
        })
    }

    /// Approximate Helvetica metrics, used when no font file is available.
    pub fn helvetica() -> Self {
        let widths_1000 = (32u8..=255u8)
            .map(|b| {
                let w = match b {
                    32 => 278.0,
                    33..=47 => 333.0,
                    48..=57 => 556.0,
                    58..=64 => 333.0,
                    73 | 74 => 278.0,
                    77 => 833.0,
                    65..=90 => 667.0,
                    91..=96 => 333.0,
                    102 | 105 | 106 | 108 | 116 => 278.0,
                    109 | 119 => 833.0,
                    97..=122 => 556.0,
                    _ => 556.0,
                };
                (char::from(b), w)
            })
            .collect();
        Self {
            widths_1000,
            default_width: 556.0,
        }
    }

    pub fn char_width_1000(&self, ch: char) -> f64 {
        if ch.is_control() {
            return 0.0;
        }
        self.widths_1000.get(&ch).copied().unwrap_or(self.default_width)
    }

    pub fn text_width(&self, text: &str, size_px: f64) -> f64 {
        text.chars()
            .map(|ch| self.char_width_1000(ch) * size_px / 1000.0)
            .sum()
    }
}

impl MeasureText for FontMetrics {
    fn measure(&self, text: &str, font_css: &str) -> f64 {
        self.text_width(text, font_css_size_px(font_css))
    }
}
