use std::collections::HashMap;

use roxmltree::Node;

use crate::model::{Color, FontFamily, Indent, NumberingRef, RunProperties, TabStop, Underline};
use crate::package::{Package, SETTINGS_PART, STYLES_PART};
use crate::styles::{DocDefaults, ParagraphProperties, Style, StyleKind, StyleTable, ThemeFonts};

use super::{DML_NS, WML_NS, passthrough, twips_attr, wml, wml_attr};

fn dml<'a>(node: Node<'a, 'a>, name: &str) -> Option<Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(DML_NS))
}

fn latin_typeface<'a>(node: Node<'a, 'a>) -> Option<&'a str> {
    dml(node, "latin")
        .and_then(|n| n.attribute("typeface"))
        .filter(|s| !s.is_empty())
}

/// True when every attribute of `node` is a `w:` attribute listed in `known`.
/// Elements carrying anything else are also kept verbatim so nothing is lost.
fn attrs_within(node: Node, known: &[&str]) -> bool {
    node.attributes()
        .all(|a| a.namespace() == Some(WML_NS) && known.contains(&a.name()))
}

/// A toggle property is on unless its `w:val` is a false-like value.
fn toggle_value(node: Node) -> bool {
    node.attribute((WML_NS, "val"))
        .is_none_or(|v| !matches!(v, "0" | "false" | "off"))
}

fn val(node: Node) -> Option<String> {
    node.attribute((WML_NS, "val")).map(str::to_string)
}

/// Parse a `w:rPr`. Elements outside the model, and modelled elements with
/// attributes the model does not carry, are kept in `extra`.
pub(crate) fn parse_run_properties(rpr: Node, src: &str) -> RunProperties {
    let mut props = RunProperties::default();
    for child in rpr.children().filter(|n| n.is_element()) {
        let name = if child.tag_name().namespace() == Some(WML_NS) {
            child.tag_name().name()
        } else {
            ""
        };
        let complete = match name {
            "rStyle" => {
                props.style_id = val(child);
                attrs_within(child, &["val"])
            }
            "rFonts" => {
                let a = |n: &str| child.attribute((WML_NS, n)).map(str::to_string);
                props.fonts = Some(FontFamily {
                    ascii: a("ascii"),
                    h_ansi: a("hAnsi"),
                    east_asia: a("eastAsia"),
                    cs: a("cs"),
                    ascii_theme: a("asciiTheme"),
                    h_ansi_theme: a("hAnsiTheme"),
                });
                attrs_within(child, &["ascii", "hAnsi", "eastAsia", "cs", "asciiTheme", "hAnsiTheme"])
            }
            "b" => {
                props.bold = Some(toggle_value(child));
                attrs_within(child, &["val"])
            }
            "i" => {
                props.italic = Some(toggle_value(child));
                attrs_within(child, &["val"])
            }
            "strike" => {
                props.strike = Some(toggle_value(child));
                attrs_within(child, &["val"])
            }
            "u" => {
                props.underline = Some(Underline {
                    style: child
                        .attribute((WML_NS, "val"))
                        .unwrap_or("single")
                        .to_string(),
                    color: child.attribute((WML_NS, "color")).map(str::to_string),
                });
                attrs_within(child, &["val", "color"])
            }
            "color" => {
                props.color = child.attribute((WML_NS, "val")).map(Color::parse);
                attrs_within(child, &["val"])
            }
            "sz" => {
                props.size = child
                    .attribute((WML_NS, "val"))
                    .and_then(|v| v.parse::<f64>().ok())
                    .map(crate::units::half_points_to_points);
                attrs_within(child, &["val"])
            }
            "highlight" => {
                props.highlight = val(child);
                attrs_within(child, &["val"])
            }
            "vertAlign" => {
                props.vert_align = val(child);
                attrs_within(child, &["val"])
            }
            _ => false,
        };
        if !complete {
            props.extra.push(passthrough(src, child));
        }
    }
    props
}

/// `w:ind`, twips. `start`/`end` are accepted as `left`/`right`.
pub(crate) fn parse_indent(ind: Node) -> Indent {
    let left = twips_attr(ind, "left").or_else(|| twips_attr(ind, "start"));
    let right = twips_attr(ind, "right").or_else(|| twips_attr(ind, "end"));
    let first_line = twips_attr(ind, "firstLine");
    let hanging = twips_attr(ind, "hanging");
    Indent {
        left,
        right,
        first_line,
        hanging,
        explicit_left: left.is_some(),
        explicit_right: right.is_some(),
        explicit_first_line: first_line.is_some(),
        explicit_hanging: hanging.is_some(),
    }
}

/// `w:tabs` of a `w:pPr`, twips, clear stops included.
pub(crate) fn parse_tab_stops(ppr: Node) -> Vec<TabStop> {
    let Some(tabs) = wml(ppr, "tabs") else {
        return vec![];
    };
    let mut stops: Vec<TabStop> = tabs
        .children()
        .filter(|n| n.tag_name().name() == "tab" && n.tag_name().namespace() == Some(WML_NS))
        .filter_map(|n| {
            Some(TabStop {
                position: twips_attr(n, "pos")?,
                alignment: n.attribute((WML_NS, "val")).unwrap_or("left").to_string(),
                leader: n
                    .attribute((WML_NS, "leader"))
                    .filter(|l| *l != "none")
                    .map(str::to_string),
            })
        })
        .collect();
    stops.sort_by(|a, b| a.position.total_cmp(&b.position));
    stops
}

/// `w:numPr` as (`numId`, `ilvl`); either may be absent.
pub(crate) fn parse_num_pr(ppr: Node) -> Option<(Option<String>, Option<u8>)> {
    let num_pr = wml(ppr, "numPr")?;
    let num_id = wml_attr(num_pr, "numId").map(str::to_string);
    let ilvl = wml_attr(num_pr, "ilvl").and_then(|v| v.parse::<u8>().ok());
    Some((num_id, ilvl))
}

/// Paragraph properties of a style, document default or numbering level.
pub(crate) fn parse_paragraph_properties(ppr: Node) -> ParagraphProperties {
    ParagraphProperties {
        indent: wml(ppr, "ind").map(parse_indent),
        numbering: parse_num_pr(ppr).and_then(|(num_id, ilvl)| {
            Some(NumberingRef {
                num_id: Some(num_id?),
                level: ilvl.unwrap_or(0),
            })
        }),
        tabs: parse_tab_stops(ppr),
        justification: wml_attr(ppr, "jc").map(str::to_string),
    }
}

pub fn parse_theme(xml_content: &str) -> ThemeFonts {
    let mut theme = ThemeFonts::default();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("Unparsable theme part; using default theme fonts");
        return theme;
    };
    for node in xml.descendants() {
        if node.tag_name().namespace() != Some(DML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "majorFont" => {
                if let Some(tf) = latin_typeface(node) {
                    theme.major = tf.to_string();
                }
            }
            "minorFont" => {
                if let Some(tf) = latin_typeface(node) {
                    theme.minor = tf.to_string();
                }
            }
            _ => {}
        }
    }
    theme
}

pub fn parse_styles(xml_content: &str, theme: ThemeFonts) -> StyleTable {
    let mut table = StyleTable {
        theme,
        ..StyleTable::default()
    };
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("Unparsable {STYLES_PART}; styles ignored");
        return table;
    };
    let root = xml.root_element();

    if let Some(doc_defaults) = wml(root, "docDefaults") {
        if let Some(rpr) = wml(doc_defaults, "rPrDefault").and_then(|n| wml(n, "rPr")) {
            table.defaults.run = parse_run_properties(rpr, xml_content);
        }
        if let Some(ppr) = wml(doc_defaults, "pPrDefault").and_then(|n| wml(n, "pPr")) {
            table.defaults.paragraph = parse_paragraph_properties(ppr);
        }
    }

    let mut styles: HashMap<String, Style> = HashMap::new();
    for node in root.children() {
        if node.tag_name().name() != "style" || node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        let Some(id) = node.attribute((WML_NS, "styleId")) else {
            continue;
        };
        let kind = match node.attribute((WML_NS, "type")) {
            Some("character") => StyleKind::Character,
            Some("table") => StyleKind::Table,
            Some("numbering") => StyleKind::Numbering,
            _ => StyleKind::Paragraph,
        };
        let style = Style {
            id: id.to_string(),
            name: wml_attr(node, "name").map(str::to_string),
            kind,
            based_on: wml_attr(node, "basedOn").map(str::to_string),
            is_default: node
                .attribute((WML_NS, "default"))
                .is_some_and(|v| v == "1" || v == "true"),
            paragraph: wml(node, "pPr")
                .map(parse_paragraph_properties)
                .unwrap_or_default(),
            run: wml(node, "rPr")
                .map(|rpr| parse_run_properties(rpr, xml_content))
                .unwrap_or_default(),
        };
        styles.insert(style.id.clone(), style);
    }
    table.styles = styles;
    table
}

/// `w:settings/w:defaultTabStop`, twips.
pub fn parse_default_tab_stop(xml_content: &str) -> Option<f64> {
    let xml = roxmltree::Document::parse(xml_content).ok()?;
    wml(xml.root_element(), "defaultTabStop").and_then(|n| twips_attr(n, "val"))
}

/// Theme, styles and settings of a package. Missing parts give defaults.
pub fn load_style_table(package: &Package) -> StyleTable {
    let theme = package
        .part_names()
        .find(|n| n.starts_with("word/theme/") && n.ends_with(".xml"))
        .and_then(|name| package.xml(name))
        .map(|xml| parse_theme(&xml))
        .unwrap_or_default();
    let mut table = match package.xml(STYLES_PART) {
        Some(xml) => parse_styles(&xml, theme),
        None => StyleTable {
            theme,
            defaults: DocDefaults::default(),
            styles: HashMap::new(),
        },
    };
    table.defaults.default_tab_stop = package
        .xml(SETTINGS_PART)
        .and_then(|xml| parse_default_tab_stop(&xml));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:docDefaults>
    <w:rPrDefault><w:rPr><w:rFonts w:asciiTheme="minorHAnsi" w:hAnsiTheme="minorHAnsi"/><w:sz w:val="22"/></w:rPr></w:rPrDefault>
    <w:pPrDefault><w:pPr><w:spacing w:after="160"/></w:pPr></w:pPrDefault>
  </w:docDefaults>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
  <w:style w:type="paragraph" w:styleId="ListParagraph">
    <w:name w:val="List Paragraph"/><w:basedOn w:val="Normal"/>
    <w:pPr><w:ind w:left="720"/><w:contextualSpacing/></w:pPr>
  </w:style>
  <w:style w:type="character" w:styleId="Strong"><w:rPr><w:b/><w:bCs/></w:rPr></w:style>
</w:styles>"#;

    #[test]
    fn styles_and_defaults() {
        let table = parse_styles(STYLES, ThemeFonts::default());
        assert_eq!(table.defaults.run.size, Some(11.0));
        let list = table.get("ListParagraph").unwrap();
        assert_eq!(list.based_on.as_deref(), Some("Normal"));
        assert_eq!(list.paragraph.indent.as_ref().unwrap().left, Some(720.0));
        assert_eq!(table.default_style(StyleKind::Paragraph).unwrap().id, "Normal");
        let strong = table.get("Strong").unwrap();
        assert_eq!(strong.kind, StyleKind::Character);
        assert_eq!(strong.run.bold, Some(true));
        assert_eq!(strong.run.extra.len(), 1);
        assert_eq!(strong.run.extra[0].name, "w:bCs");
    }

    #[test]
    fn theme_fonts_resolve_defaults() {
        let table = parse_styles(
            STYLES,
            ThemeFonts {
                major: "Calibri Light".into(),
                minor: "Calibri".into(),
            },
        );
        let resolved = crate::cascade::resolve_run_properties(&table, None, &RunProperties::default());
        assert_eq!(resolved.font_family, "Calibri");
        assert_eq!(resolved.font_size, 11.0);
    }

    #[test]
    fn off_values_are_explicit_false() {
        let xml = r#"<w:rPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:b w:val="0"/><w:i w:val="off"/><w:u/><w:color w:val="inherit"/></w:rPr>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let props = parse_run_properties(doc.root_element(), xml);
        assert_eq!(props.bold, Some(false));
        assert_eq!(props.italic, Some(false));
        assert_eq!(props.underline.unwrap().style, "single");
        assert_eq!(props.color, Some(Color::Inherit));
        assert!(props.extra.is_empty());
    }

    #[test]
    fn unmodelled_attributes_keep_element_verbatim() {
        let xml = r#"<w:rPr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:color w:val="FF0000" w:themeColor="accent1"/></w:rPr>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let props = parse_run_properties(doc.root_element(), xml);
        assert_eq!(props.color, Some(Color::Rgb("FF0000".into())));
        assert_eq!(props.extra[0].xml, r#"<w:color w:val="FF0000" w:themeColor="accent1"/>"#);
    }
}
