//! Comment parts regenerated from the live comment list.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::comments::Comment;
use crate::error::Error;
use crate::model::{Block, Paragraph, collect_paragraphs};
use crate::package::{
    COMMENTS_EXTENDED_PART, COMMENTS_EXTENSIBLE_PART, COMMENTS_IDS_PART, COMMENTS_PART, ContentTypes,
    Package, REL_COMMENTS, REL_COMMENTS_EXTENDED, REL_COMMENTS_EXTENSIBLE, REL_COMMENTS_IDS,
};

use super::XML_DECLARATION;
use super::rels::RelationshipAllocator;
use super::xml::attr;

/// Output `w:id` and `w15:paraId` of every live comment.
#[derive(Debug, Default)]
pub(crate) struct CommentPlan {
    pub ids: HashMap<String, u32>,
    pub para_ids: HashMap<String, String>,
}

impl CommentPlan {
    /// A numeric imported id is kept when no earlier comment claimed it;
    /// everything else gets the lowest free id. Para ids follow the same
    /// rule: a comment keeps its own id unless `reserved` (paragraph ids of
    /// the document body) or an earlier comment holds it, and generated ids
    /// also avoid every paragraph id inside comment bodies.
    pub fn new(comments: &[Comment], reserved: &HashSet<String>) -> Self {
        let mut plan = CommentPlan::default();

        let mut used: HashSet<u32> = HashSet::new();
        for c in comments {
            if let Some(id) = c.imported_id.as_deref().and_then(|v| v.parse::<u32>().ok())
                && used.insert(id)
            {
                plan.ids.insert(c.comment_id.clone(), id);
            }
        }
        let mut next = 0u32;
        for c in comments {
            if plan.ids.contains_key(&c.comment_id) {
                continue;
            }
            while used.contains(&next) {
                next += 1;
            }
            used.insert(next);
            plan.ids.insert(c.comment_id.clone(), next);
        }

        let mut taken: HashSet<String> = reserved.clone();
        for c in comments {
            if let Some(p) = &c.para_id
                && taken.insert(p.clone())
            {
                plan.para_ids.insert(c.comment_id.clone(), p.clone());
            }
        }
        let mut body_paragraphs = Vec::new();
        for c in comments {
            collect_paragraphs(&c.text_json, &mut body_paragraphs);
        }
        taken.extend(body_paragraphs.iter().filter_map(|p| p.para_id.clone()));

        let mut idx = 0u32;
        for c in comments {
            if plan.para_ids.contains_key(&c.comment_id) {
                continue;
            }
            let para_id = loop {
                let candidate = format!("{:08X}", 0x1000_0000 + idx);
                idx += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            taken.insert(para_id.clone());
            plan.para_ids.insert(c.comment_id.clone(), para_id);
        }
        plan
    }
}

/// The comment's body with its last top-level paragraph carrying `para_id`.
pub(crate) fn comment_body(comment: &Comment, para_id: &str) -> Vec<Block> {
    let mut blocks = comment.text_json.clone();
    let last = blocks.iter_mut().rev().find_map(|b| match b {
        Block::Paragraph(p) => Some(p),
        _ => None,
    });
    match last {
        Some(p) => p.para_id = Some(para_id.to_string()),
        None => blocks.push(Block::Paragraph(Paragraph {
            para_id: Some(para_id.to_string()),
            ..Paragraph::default()
        })),
    }
    blocks
}

/// `<w:comment ...>` opening tag.
pub(crate) fn comment_open(comment: &Comment, id: u32) -> String {
    let mut out = format!("<w:comment w:id=\"{id}\"");
    out.push_str(&attr(
        "w:author",
        comment.creator_name.as_deref().unwrap_or("Unknown"),
    ));
    if let Some(date) = &comment.created_time {
        out.push_str(&attr("w:date", date));
    }
    if let Some(initials) = &comment.initials {
        out.push_str(&attr("w:initials", initials));
    }
    out.push('>');
    out
}

pub(crate) fn serialize_comments_extended(comments: &[Comment], plan: &CommentPlan) -> Result<String, Error> {
    let mut out = String::from(XML_DECLARATION);
    out.push_str("<w15:commentsEx xmlns:w15=\"http://schemas.microsoft.com/office/word/2012/wordml\" xmlns:mc=\"http://schemas.openxmlformats.org/markup-compatibility/2006\" mc:Ignorable=\"w15\">");
    for c in comments {
        let Some(para_id) = plan.para_ids.get(&c.comment_id) else {
            continue;
        };
        write!(out, "<w15:commentEx{}", attr("w15:paraId", para_id))?;
        if let Some(parent) = c
            .parent_comment_id
            .as_ref()
            .and_then(|p| plan.para_ids.get(p))
        {
            out.push_str(&attr("w15:paraIdParent", parent));
        }
        write!(out, " w15:done=\"{}\"/>", if c.is_done { "1" } else { "0" })?;
    }
    out.push_str("</w15:commentsEx>");
    Ok(out)
}

/// Drop every comment part with its relationship and content-type override.
/// `keep_main` leaves `comments.xml` and `commentsExtended.xml` for the
/// caller to overwrite.
pub(crate) fn remove_comment_parts(
    package: &mut Package,
    content_types: &mut ContentTypes,
    rels: &mut RelationshipAllocator,
    keep_main: bool,
) {
    let mut stale = vec![
        (COMMENTS_IDS_PART, REL_COMMENTS_IDS),
        (COMMENTS_EXTENSIBLE_PART, REL_COMMENTS_EXTENSIBLE),
    ];
    if !keep_main {
        stale.push((COMMENTS_PART, REL_COMMENTS));
        stale.push((COMMENTS_EXTENDED_PART, REL_COMMENTS_EXTENDED));
    }
    for (part, rel_type) in stale {
        if package.remove(part).is_some() {
            log::debug!("Removed {part}");
        }
        package.remove(&crate::package::rels_path_for(part));
        content_types.remove_override(part);
        rels.remove_type(rel_type);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, imported: Option<&str>, para: Option<&str>) -> Comment {
        Comment {
            comment_id: id.into(),
            imported_id: imported.map(str::to_string),
            para_id: para.map(str::to_string),
            ..Comment::default()
        }
    }

    #[test]
    fn imported_ids_survive_and_new_ones_fill_gaps() {
        let comments = vec![
            comment("a", Some("0"), Some("1A2B3C4D")),
            comment("b", None, None),
            comment("c", Some("0"), None),
            comment("d", Some("5"), None),
        ];
        let plan = CommentPlan::new(&comments, &HashSet::new());
        assert_eq!(plan.ids["a"], 0);
        assert_eq!(plan.ids["b"], 1);
        assert_eq!(plan.ids["c"], 2);
        assert_eq!(plan.ids["d"], 5);
        assert_eq!(plan.para_ids["a"], "1A2B3C4D");
        assert_eq!(plan.para_ids["b"], "10000000");
        assert_eq!(plan.para_ids["c"], "10000001");
    }

    #[test]
    fn generated_para_ids_skip_reserved() {
        let reserved = HashSet::from(["10000000".to_string()]);
        let plan = CommentPlan::new(&[comment("a", None, None)], &reserved);
        assert_eq!(plan.para_ids["a"], "10000001");
    }

    #[test]
    fn own_para_id_is_kept_when_only_the_comment_body_holds_it() {
        let mut kept = comment("a", Some("0"), Some("1A2B3C4D"));
        kept.text_json = vec![Block::Paragraph(Paragraph {
            para_id: Some("1A2B3C4D".into()),
            ..Paragraph::default()
        })];
        let mut clashing = comment("b", Some("1"), Some("5E6F7A8B"));
        clashing.text_json = vec![Block::Paragraph(Paragraph {
            para_id: Some("5E6F7A8B".into()),
            ..Paragraph::default()
        })];
        let mut fresh = comment("c", None, None);
        fresh.text_json = vec![Block::Paragraph(Paragraph {
            para_id: Some("10000000".into()),
            ..Paragraph::default()
        })];
        let reserved = HashSet::from(["5E6F7A8B".to_string(), "0BADF00D".to_string()]);

        let plan = CommentPlan::new(&[kept, clashing, fresh], &reserved);
        assert_eq!(plan.para_ids["a"], "1A2B3C4D");
        assert_eq!(plan.para_ids["b"], "10000001");
        assert_eq!(plan.para_ids["c"], "10000002");
    }

    #[test]
    fn done_flag_and_parent() {
        let mut reply = comment("b", Some("1"), Some("00000002"));
        reply.parent_comment_id = Some("a".into());
        let mut root = comment("a", Some("0"), Some("00000001"));
        root.is_done = true;
        let comments = vec![root, reply];
        let plan = CommentPlan::new(&comments, &HashSet::new());
        let xml = serialize_comments_extended(&comments, &plan).unwrap();
        assert!(xml.contains("<w15:commentEx w15:paraId=\"00000001\" w15:done=\"1\"/>"));
        assert!(xml.contains(
            "<w15:commentEx w15:paraId=\"00000002\" w15:paraIdParent=\"00000001\" w15:done=\"0\"/>"
        ));
    }
}
