use std::collections::BTreeMap;

use roxmltree::Node;

use crate::numbering::{AbstractNumbering, LevelOverride, NumberingCache, NumberingDefinition, NumberingLevel};
use crate::package::{NUMBERING_PART, Package};

use super::styles::{parse_paragraph_properties, parse_run_properties};
use super::{WML_NS, wml, wml_attr};

fn is_w(node: &Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

fn parse_level(lvl: Node, src: &str) -> Option<NumberingLevel> {
    let ilvl = lvl
        .attribute((WML_NS, "ilvl"))
        .and_then(|v| v.parse::<u8>().ok())?;
    let num_fmt = wml_attr(lvl, "numFmt").unwrap_or("decimal");
    let lvl_text = wml_attr(lvl, "lvlText").unwrap_or("");
    let mut level = NumberingLevel::new(ilvl, num_fmt, lvl_text);
    level.start = wml_attr(lvl, "start")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(1);
    if let Some(jc) = wml_attr(lvl, "lvlJc") {
        level.justification = jc.to_string();
    }
    if let Some(suff) = wml_attr(lvl, "suff") {
        level.suffix = suff.to_string();
    }
    if let Some(ppr) = wml(lvl, "pPr") {
        level.paragraph = parse_paragraph_properties(ppr);
    }
    if let Some(rpr) = wml(lvl, "rPr") {
        level.run = parse_run_properties(rpr, src);
    }
    Some(level)
}

/// Parse `numbering.xml` into abstract definitions and `numId` instances.
pub fn parse_numbering(xml_content: &str) -> NumberingCache {
    let mut cache = NumberingCache::default();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("Unparsable {NUMBERING_PART}; numbering ignored");
        return cache;
    };

    for node in xml.root_element().children() {
        if node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "abstractNum" => {
                let Some(abs_id) = node.attribute((WML_NS, "abstractNumId")) else {
                    continue;
                };
                let levels: BTreeMap<u8, NumberingLevel> = node
                    .children()
                    .filter(|n| is_w(n, "lvl"))
                    .filter_map(|lvl| parse_level(lvl, xml_content))
                    .map(|l| (l.ilvl, l))
                    .collect();
                cache.abstract_to_definition.insert(
                    abs_id.to_string(),
                    AbstractNumbering {
                        id: abs_id.to_string(),
                        levels,
                        style_link: wml_attr(node, "styleLink").map(str::to_string),
                        num_style_link: wml_attr(node, "numStyleLink").map(str::to_string),
                    },
                );
            }
            "num" => {
                let Some(num_id) = node.attribute((WML_NS, "numId")) else {
                    continue;
                };
                let Some(abs_id) = wml_attr(node, "abstractNumId") else {
                    continue;
                };
                let mut overrides = BTreeMap::new();
                for ov in node.children().filter(|n| is_w(n, "lvlOverride")) {
                    let Some(ilvl) = ov
                        .attribute((WML_NS, "ilvl"))
                        .and_then(|v| v.parse::<u8>().ok())
                    else {
                        continue;
                    };
                    overrides.insert(
                        ilvl,
                        LevelOverride {
                            start_override: wml_attr(ov, "startOverride").and_then(|v| v.parse().ok()),
                            level: wml(ov, "lvl").and_then(|l| parse_level(l, xml_content)),
                        },
                    );
                }
                cache.num_to_definition.insert(
                    num_id.to_string(),
                    NumberingDefinition {
                        num_id: num_id.to_string(),
                        abstract_num_id: abs_id.to_string(),
                        overrides,
                    },
                );
            }
            _ => {}
        }
    }

    resolve_num_style_links(&mut cache);
    cache
}

/// An abstract with `w:numStyleLink` and no levels of its own borrows the
/// levels of the abstract that declares the matching `w:styleLink`.
fn resolve_num_style_links(cache: &mut NumberingCache) {
    let linked: Vec<(String, String)> = cache
        .abstract_to_definition
        .values()
        .filter(|a| a.levels.is_empty())
        .filter_map(|a| Some((a.id.clone(), a.num_style_link.clone()?)))
        .collect();
    for (abs_id, style) in linked {
        let source = cache
            .abstract_to_definition
            .values()
            .find(|a| a.style_link.as_deref() == Some(style.as_str()) && !a.levels.is_empty())
            .map(|a| a.levels.clone());
        match source {
            Some(levels) => {
                if let Some(a) = cache.abstract_to_definition.get_mut(&abs_id) {
                    a.levels = levels;
                }
            }
            None => log::debug!("numStyleLink '{style}' of abstractNum {abs_id} has no target"),
        }
    }
}

/// Numbering definitions of a package, if it has a numbering part.
pub fn load_numbering(package: &Package) -> Option<NumberingCache> {
    package.xml(NUMBERING_PART).map(|xml| parse_numbering(&xml))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMBERING: &str = r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:abstractNum w:abstractNumId="10">
    <w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="upperRoman"/><w:lvlText w:val="%1."/><w:lvlJc w:val="right"/>
      <w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl>
    <w:lvl w:ilvl="1"><w:start w:val="1"/><w:numFmt w:val="lowerLetter"/><w:lvlText w:val="%1.%2)"/>
      <w:pPr><w:ind w:left="1440" w:hanging="360"/></w:pPr><w:rPr><w:b/></w:rPr></w:lvl>
  </w:abstractNum>
  <w:num w:numId="3"><w:abstractNumId w:val="10"/></w:num>
  <w:num w:numId="4"><w:abstractNumId w:val="10"/><w:lvlOverride w:ilvl="0"><w:startOverride w:val="5"/></w:lvlOverride></w:num>
</w:numbering>"#;

    #[test]
    fn levels_and_overrides() {
        let cache = parse_numbering(NUMBERING);
        let level = cache.level("3", 1).unwrap();
        assert_eq!(level.num_fmt, "lowerLetter");
        assert_eq!(level.paragraph.indent.as_ref().unwrap().left, Some(1440.0));
        assert_eq!(level.run.bold, Some(true));
        assert_eq!(cache.level("3", 0).unwrap().justification, "right");
        assert_eq!(cache.level("4", 0).unwrap().start, 5);
        assert!(cache.level("3", 5).is_none());
        assert!(cache.level("99", 0).is_none());
        assert_eq!(cache.level_formats("3")[0], "upperRoman");
    }
}
