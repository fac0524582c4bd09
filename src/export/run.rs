use std::fmt::Write as _;

use crate::error::Error;
use crate::model::{Passthrough, RunProperties, TrackedChange};
use crate::units::{format_number, points_to_half_points};

use super::xml::{RPR_ORDER, attr, ordered_children};

fn toggle(name: &str, on: bool) -> String {
    if on {
        format!("<{name}/>")
    } else {
        format!("<{name} w:val=\"0\"/>")
    }
}

fn val_element(name: &str, value: &str) -> String {
    format!("<{name}{}/>", attr("w:val", value))
}

/// `w:id`, `w:author` and `w:date` of a revision element.
pub fn change_attributes(change: &TrackedChange, id: u32) -> String {
    let mut out = format!(" w:id=\"{id}\"");
    out.push_str(&attr(
        "w:author",
        change.author.as_deref().filter(|a| !a.is_empty()).unwrap_or("Unknown"),
    ));
    if let Some(date) = &change.date {
        out.push_str(&attr("w:date", date));
    }
    out
}

/// Modelled `w:rPr` children as `(name, xml)` pairs. An element also present
/// in `extra` is skipped there: the verbatim copy carries attributes the
/// model does not.
fn modelled_children(props: &RunProperties) -> Vec<(String, String)> {
    let mut children: Vec<(String, String)> = Vec::new();
    let mut push = |name: &str, xml: String| children.push((name.to_string(), xml));

    if let Some(style) = &props.style_id {
        push("w:rStyle", val_element("w:rStyle", style));
    }
    if let Some(fonts) = &props.fonts {
        let mut xml = String::from("<w:rFonts");
        for (a, v) in [
            ("w:ascii", &fonts.ascii),
            ("w:hAnsi", &fonts.h_ansi),
            ("w:eastAsia", &fonts.east_asia),
            ("w:cs", &fonts.cs),
            ("w:asciiTheme", &fonts.ascii_theme),
            ("w:hAnsiTheme", &fonts.h_ansi_theme),
        ] {
            if let Some(v) = v {
                xml.push_str(&attr(a, v));
            }
        }
        xml.push_str("/>");
        push("w:rFonts", xml);
    }
    if let Some(b) = props.bold {
        push("w:b", toggle("w:b", b));
    }
    if let Some(i) = props.italic {
        push("w:i", toggle("w:i", i));
    }
    if let Some(s) = props.strike {
        push("w:strike", toggle("w:strike", s));
    }
    if let Some(color) = &props.color {
        push("w:color", val_element("w:color", color.xml_value()));
    }
    if let Some(size) = props.size {
        push(
            "w:sz",
            val_element("w:sz", &format_number(points_to_half_points(size))),
        );
    }
    if let Some(highlight) = &props.highlight {
        push("w:highlight", val_element("w:highlight", highlight));
    }
    if let Some(u) = &props.underline {
        let mut xml = format!("<w:u{}", attr("w:val", &u.style));
        if let Some(c) = &u.color {
            xml.push_str(&attr("w:color", c));
        }
        xml.push_str("/>");
        push("w:u", xml);
    }
    if let Some(va) = &props.vert_align {
        push("w:vertAlign", val_element("w:vertAlign", va));
    }
    children
}

fn property_children(props: &RunProperties) -> Vec<(String, String)> {
    let in_extra = |name: &str| props.extra.iter().any(|e| e.name == name);
    let mut children: Vec<(String, String)> = modelled_children(props)
        .into_iter()
        .filter(|(name, _)| !in_extra(name))
        .collect();
    children.extend(
        props
            .extra
            .iter()
            .map(|Passthrough { name, xml }| (name.clone(), xml.clone())),
    );
    children
}

/// `w:rPr` for `props`, with an optional `w:rPrChange` recording the
/// previous formatting. Empty properties with no change produce nothing.
pub fn write_run_properties(
    out: &mut String,
    props: &RunProperties,
    change: Option<(&TrackedChange, &RunProperties, u32)>,
) -> Result<(), Error> {
    let mut children = property_children(props);
    if let Some((change, previous, id)) = change {
        let inner = ordered_children(RPR_ORDER, property_children(previous));
        children.push((
            String::from("w:rPrChange"),
            format!(
                "<w:rPrChange{}><w:rPr>{inner}</w:rPr></w:rPrChange>",
                change_attributes(change, id)
            ),
        ));
    }
    if children.is_empty() {
        return Ok(());
    }
    write!(out, "<w:rPr>{}</w:rPr>", ordered_children(RPR_ORDER, children))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Color, Underline};

    fn rpr(props: &RunProperties) -> String {
        let mut out = String::new();
        write_run_properties(&mut out, props, None).unwrap();
        out
    }

    #[test]
    fn explicit_false_toggles_are_written() {
        let props = RunProperties {
            bold: Some(false),
            italic: Some(true),
            underline: Some(Underline {
                style: "none".into(),
                color: None,
            }),
            ..RunProperties::default()
        };
        assert_eq!(
            rpr(&props),
            "<w:rPr><w:b w:val=\"0\"/><w:i/><w:u w:val=\"none\"/></w:rPr>"
        );
    }

    #[test]
    fn empty_properties_write_nothing() {
        assert_eq!(rpr(&RunProperties::default()), "");
    }

    #[test]
    fn verbatim_copy_replaces_modelled_element() {
        let props = RunProperties {
            color: Some(Color::Rgb("FF0000".into())),
            size: Some(10.5),
            extra: vec![Passthrough {
                name: "w:color".into(),
                xml: "<w:color w:val=\"FF0000\" w:themeColor=\"accent1\"/>".into(),
            }],
            ..RunProperties::default()
        };
        assert_eq!(
            rpr(&props),
            "<w:rPr><w:color w:val=\"FF0000\" w:themeColor=\"accent1\"/><w:sz w:val=\"21\"/></w:rPr>"
        );
    }

    #[test]
    fn format_change_carries_author_and_id() {
        let props = RunProperties {
            bold: Some(true),
            ..RunProperties::default()
        };
        let change = TrackedChange::default();
        let mut out = String::new();
        write_run_properties(&mut out, &props, Some((&change, &RunProperties::default(), 4))).unwrap();
        assert_eq!(
            out,
            "<w:rPr><w:b/><w:rPrChange w:id=\"4\" w:author=\"Unknown\"><w:rPr></w:rPr></w:rPrChange></w:rPr>"
        );
    }
}
