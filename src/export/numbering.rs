use std::fmt::Write as _;

use crate::error::Error;
use crate::numbering::{NumberingCache, NumberingLevel};

use super::run::write_run_properties;
use super::xml::attr;
use super::{XML_DECLARATION, write_indent, write_tabs};

fn sort_key(id: &str) -> (u64, &str) {
    (id.parse().unwrap_or(u64::MAX), id)
}

fn write_level(out: &mut String, level: &NumberingLevel) -> Result<(), Error> {
    write!(out, "<w:lvl w:ilvl=\"{}\">", level.ilvl)?;
    write!(out, "<w:start w:val=\"{}\"/>", level.start)?;
    write!(out, "<w:numFmt{}/>", attr("w:val", &level.num_fmt))?;
    if level.suffix != "tab" {
        write!(out, "<w:suff{}/>", attr("w:val", &level.suffix))?;
    }
    write!(out, "<w:lvlText{}/>", attr("w:val", &level.lvl_text))?;
    write!(out, "<w:lvlJc{}/>", attr("w:val", &level.justification))?;

    let p = &level.paragraph;
    let indent = p.indent.clone().unwrap_or_default();
    if !p.tabs.is_empty() || !indent.is_empty() {
        out.push_str("<w:pPr>");
        write_tabs(out, &p.tabs)?;
        write_indent(out, &indent)?;
        out.push_str("</w:pPr>");
    }
    write_run_properties(out, &level.run, None)?;
    out.push_str("</w:lvl>");
    Ok(())
}

/// `numbering.xml` for every abstract and instance in the cache. Values in
/// the cache are twips and are written unchanged.
pub fn serialize_numbering(cache: &NumberingCache) -> Result<String, Error> {
    let mut out = String::from(XML_DECLARATION);
    out.push_str(
        "<w:numbering xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">",
    );

    let mut abstracts: Vec<_> = cache.abstract_to_definition.values().collect();
    abstracts.sort_by(|a, b| sort_key(&a.id).cmp(&sort_key(&b.id)));
    for abs in abstracts {
        write!(out, "<w:abstractNum{}>", attr("w:abstractNumId", &abs.id))?;
        out.push_str("<w:multiLevelType w:val=\"hybridMultilevel\"/>");
        if let Some(link) = &abs.style_link {
            write!(out, "<w:styleLink{}/>", attr("w:val", link))?;
        }
        if let Some(link) = &abs.num_style_link {
            write!(out, "<w:numStyleLink{}/>", attr("w:val", link))?;
        }
        for level in abs.levels.values() {
            write_level(&mut out, level)?;
        }
        out.push_str("</w:abstractNum>");
    }

    let mut nums: Vec<_> = cache.num_to_definition.values().collect();
    nums.sort_by(|a, b| sort_key(&a.num_id).cmp(&sort_key(&b.num_id)));
    for num in nums {
        write!(out, "<w:num{}>", attr("w:numId", &num.num_id))?;
        write!(out, "<w:abstractNumId{}/>", attr("w:val", &num.abstract_num_id))?;
        for (ilvl, over) in &num.overrides {
            write!(out, "<w:lvlOverride w:ilvl=\"{ilvl}\">")?;
            if let Some(start) = over.start_override {
                write!(out, "<w:startOverride w:val=\"{start}\"/>")?;
            }
            if let Some(level) = &over.level {
                write_level(&mut out, level)?;
            }
            out.push_str("</w:lvlOverride>");
        }
        out.push_str("</w:num>");
    }
    out.push_str("</w:numbering>");
    Ok(out)
}
