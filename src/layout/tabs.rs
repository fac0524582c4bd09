use serde::Serialize;

use crate::model::TabStop;

/// Word's default tab interval, twips (0.5in).
pub const DEFAULT_TAB_INTERVAL_TWIPS: f64 = 720.0;
/// Default stops generated past the last explicit stop.
pub const DEFAULT_TAB_STOP_COUNT: usize = 12;

/// A tab stop in the paragraph's output coordinate space.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTabStop {
    pub position: f64,
    pub alignment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader: Option<String>,
    /// Generated from the default interval rather than declared.
    pub is_default: bool,
}

/// Effective stops for a paragraph: explicit non-clear stops in position
/// order, followed by up to [`DEFAULT_TAB_STOP_COUNT`] evenly spaced default
/// stops past `max(start, last explicit stop)`.
///
/// Default stops sit on multiples of `interval`, as Word places them
/// relative to the text margin rather than to the last stop.
pub fn compute_tab_stops(explicit: &[TabStop], start: f64, interval: f64) -> Vec<ResolvedTabStop> {
    let mut stops: Vec<ResolvedTabStop> = explicit
        .iter()
        .filter(|t| !t.is_clear())
        .map(|t| ResolvedTabStop {
            position: t.position,
            alignment: t.alignment.clone(),
            leader: t.leader.clone(),
            is_default: false,
        })
        .collect();
    stops.sort_by(|a, b| a.position.total_cmp(&b.position));

    if interval <= 0.0 {
        return stops;
    }
    let last = stops.last().map(|s| s.position).unwrap_or(0.0).max(start);
    let mut next = ((last / interval).floor() + 1.0) * interval;
    for _ in 0..DEFAULT_TAB_STOP_COUNT {
        stops.push(ResolvedTabStop {
            position: round3(next),
            alignment: String::from("left"),
            leader: None,
            is_default: true,
        });
        next += interval;
    }
    stops
}

/// List items treat the left indent as an implicit stop: the tab after the
/// marker lands on the text start when the hanging region is not crossed by
/// an explicit stop. Default stops inside the hanging region are dropped.
pub fn insert_hanging_stop(stops: &mut Vec<ResolvedTabStop>, marker_x: f64, indent_left: f64) {
    let crossed = stops
        .iter()
        .any(|s| !s.is_default && s.position > marker_x + 0.5 && s.position < indent_left - 0.5);
    if crossed || stops.iter().any(|s| (s.position - indent_left).abs() < 0.5) {
        return;
    }
    stops.retain(|s| !(s.is_default && s.position > marker_x + 0.5 && s.position < indent_left));
    let at = stops
        .iter()
        .position(|s| s.position > indent_left)
        .unwrap_or(stops.len());
    stops.insert(
        at,
        ResolvedTabStop {
            position: indent_left,
            alignment: String::from("num"),
            leader: None,
            is_default: false,
        },
    );
}

/// First stop strictly right of `x`. Beyond the resolved list the next
/// multiple of `interval` is used.
pub fn find_next_tab_stop(x: f64, stops: &[ResolvedTabStop], interval: f64) -> ResolvedTabStop {
    if let Some(stop) = stops.iter().find(|s| s.position > x + 0.5) {
        return stop.clone();
    }
    let interval = if interval > 0.0 { interval } else { 48.0 };
    ResolvedTabStop {
        position: ((x / interval).floor() + 1.0) * interval,
        alignment: String::from("left"),
        leader: None,
        is_default: true,
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
