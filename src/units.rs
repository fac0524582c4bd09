//! Unit conversions shared by the importer, exporter and layout engine.
//!
//! OOXML stores lengths in a handful of integer units: twips (1/20 pt) for
//! paragraph geometry, half-points for font sizes, EMUs for DrawingML and
//! 1/60000 degree for rotation. The structured document uses CSS pixels at
//! 96 DPI.

pub const TWIPS_PER_INCH: f64 = 1440.0;
pub const PIXELS_PER_INCH: f64 = 96.0;
pub const POINTS_PER_INCH: f64 = 72.0;
pub const EMU_PER_INCH: f64 = 914_400.0;
pub const EMU_PER_PIXEL: f64 = EMU_PER_INCH / PIXELS_PER_INCH;
pub const ROT_PER_DEGREE: f64 = 60_000.0;

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

pub fn twips_to_pixels(twips: f64) -> f64 {
    round3(twips / TWIPS_PER_INCH * PIXELS_PER_INCH)
}

pub fn pixels_to_twips(px: f64) -> f64 {
    (px / PIXELS_PER_INCH * TWIPS_PER_INCH).round()
}

pub fn points_to_pixels(pt: f64) -> f64 {
    round3(pt / POINTS_PER_INCH * PIXELS_PER_INCH)
}

pub fn half_points_to_points(half_points: f64) -> f64 {
    half_points / 2.0
}

pub fn points_to_half_points(pt: f64) -> f64 {
    (pt * 2.0).round()
}

pub fn emu_to_pixels(emu: f64) -> f64 {
    round3(emu / EMU_PER_PIXEL)
}

pub fn pixels_to_emu(px: f64) -> i64 {
    (px * EMU_PER_PIXEL).round() as i64
}

/// Degrees to DrawingML rotation units (1/60000 degree).
pub fn degrees_to_rot(degrees: f64) -> i64 {
    (degrees * ROT_PER_DEGREE).round() as i64
}

pub fn rot_to_degrees(rot: f64) -> f64 {
    round3(rot / ROT_PER_DEGREE)
}

/// Parse an OOXML measure into twips.
///
/// Transitional documents write bare integers; strict documents may carry a
/// unit suffix (`pt`, `in`, `cm`, `mm`, `pc`, `pi`).
pub fn parse_twips(val: &str) -> Option<f64> {
    let val = val.trim();
    if let Ok(n) = val.parse::<f64>() {
        return Some(n);
    }
    let split = val.find(|c: char| c.is_ascii_alphabetic())?;
    let (num, unit) = val.split_at(split);
    let n = num.parse::<f64>().ok()?;
    let twips = match unit {
        "pt" => n * 20.0,
        "in" => n * TWIPS_PER_INCH,
        "cm" => n * TWIPS_PER_INCH / 2.54,
        "mm" => n * TWIPS_PER_INCH / 25.4,
        "pc" | "pi" => n * 240.0,
        _ => return None,
    };
    Some(twips.round())
}

/// Format a number for an XML attribute, dropping a zero fraction.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twips_and_pixels_are_inverse_on_whole_pixels() {
        assert_eq!(twips_to_pixels(720.0), 48.0);
        assert_eq!(twips_to_pixels(1440.0), 96.0);
        assert_eq!(pixels_to_twips(48.0), 720.0);
        assert_eq!(pixels_to_twips(twips_to_pixels(360.0)), 360.0);
    }

    #[test]
    fn half_points() {
        assert_eq!(half_points_to_points(24.0), 12.0);
        assert_eq!(points_to_half_points(10.5), 21.0);
    }

    #[test]
    fn emu_and_rotation() {
        assert_eq!(pixels_to_emu(1.0), 9525);
        assert_eq!(emu_to_pixels(952_500.0), 100.0);
        assert_eq!(degrees_to_rot(90.0), 5_400_000);
        assert_eq!(rot_to_degrees(5_400_000.0), 90.0);
    }

    #[test]
    fn parse_twips_with_units() {
        assert_eq!(parse_twips("720"), Some(720.0));
        assert_eq!(parse_twips("-360"), Some(-360.0));
        assert_eq!(parse_twips("36pt"), Some(720.0));
        assert_eq!(parse_twips("0.5in"), Some(720.0));
        assert_eq!(parse_twips("abc"), None);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(720.0), "720");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(10.5), "10.5");
    }
}
