use std::collections::HashMap;

use crate::comments::{
    Comment, CommentOrigin, CommentSpan, OriginEvidence, classify_comment, detect_document_origin,
    thread_by_range,
};
use crate::converter::Converter;
use crate::model::{Block, collect_paragraphs};
use crate::numbering::NumberingCache;
use crate::package::{COMMENTS_EXTENDED_PART, COMMENTS_PART, Package};
use crate::styles::StyleTable;

use super::{PartImporter, W15_NS, WML_NS, root_namespaces, wml};

/// Everything the comments part contributes to a document.
#[derive(Debug, Default)]
pub(crate) struct CommentsPart {
    pub comments: Vec<Comment>,
    pub origin: CommentOrigin,
    pub namespaces: Vec<(String, String)>,
    pub ignorable: Option<String>,
}

/// One `w15:commentEx` entry.
#[derive(Debug, Clone)]
struct CommentEx {
    para_id_parent: Option<String>,
    done: bool,
}

fn parse_comments_extended(xml_content: &str) -> HashMap<String, CommentEx> {
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        log::warn!("Unparsable {COMMENTS_EXTENDED_PART}; threading from ranges instead");
        return HashMap::new();
    };
    xml.root_element()
        .children()
        .filter(|n| n.tag_name().name() == "commentEx" && n.tag_name().namespace() == Some(W15_NS))
        .filter_map(|n| {
            let para_id = n.attribute((W15_NS, "paraId"))?;
            Some((
                para_id.to_string(),
                CommentEx {
                    para_id_parent: n.attribute((W15_NS, "paraIdParent")).map(str::to_string),
                    done: n
                        .attribute((W15_NS, "done"))
                        .is_some_and(|v| v == "1" || v == "true"),
                },
            ))
        })
        .collect()
}

/// `w14:paraId` of the last paragraph in a comment body.
fn last_para_id(blocks: &[Block]) -> Option<String> {
    let mut paragraphs = Vec::new();
    collect_paragraphs(blocks, &mut paragraphs);
    paragraphs.last().and_then(|p| p.para_id.clone())
}

/// Comments of a package, threaded, with the document-level origin.
///
/// `spans` are the text-offset ranges of the `commentRangeStart`/`End`
/// markers found in the main document, keyed by internal comment id.
pub(crate) fn import_comments(
    package: &Package,
    styles: &StyleTable,
    numbering: &NumberingCache,
    spans: &HashMap<String, CommentSpan>,
) -> CommentsPart {
    let Some(xml_content) = package.xml(COMMENTS_PART) else {
        return CommentsPart::default();
    };
    let xml = match roxmltree::Document::parse(&xml_content) {
        Ok(xml) => xml,
        Err(e) => {
            log::warn!("Unparsable {COMMENTS_PART}: {e}");
            return CommentsPart::default();
        }
    };
    let (namespaces, ignorable) = root_namespaces(xml.root_element());

    let mut importer = PartImporter::new(package, COMMENTS_PART, &xml_content, styles, numbering);
    let mut comments: Vec<Comment> = Vec::new();
    for node in xml
        .root_element()
        .children()
        .filter(|n| n.tag_name().name() == "comment" && n.tag_name().namespace() == Some(WML_NS))
    {
        let Some(id) = node.attribute((WML_NS, "id")) else {
            log::warn!("Comment without w:id skipped");
            continue;
        };
        let text_json = importer.blocks(node);
        comments.push(Comment {
            comment_id: Comment::internal_id(id),
            imported_id: Some(id.to_string()),
            para_id: last_para_id(&text_json),
            creator_name: node.attribute((WML_NS, "author")).map(str::to_string),
            initials: node.attribute((WML_NS, "initials")).map(str::to_string),
            created_time: node.attribute((WML_NS, "date")).map(str::to_string),
            text_json,
            ..Comment::default()
        });
    }

    let extended = package
        .xml(COMMENTS_EXTENDED_PART)
        .map(|x| parse_comments_extended(&x))
        .unwrap_or_default();
    let evidence = OriginEvidence {
        has_comments: !comments.is_empty(),
        has_valid_comments_extended: comments
            .iter()
            .any(|c| c.para_id.as_ref().is_some_and(|p| extended.contains_key(p))),
    };
    let origin = detect_document_origin(&evidence);
    log::debug!("Comment origin: {origin:?} ({} comments)", comments.len());

    let by_para: HashMap<String, String> = comments
        .iter()
        .filter_map(|c| Some((c.para_id.clone()?, c.comment_id.clone())))
        .collect();
    for c in comments.iter_mut() {
        let entry = c.para_id.as_ref().and_then(|p| extended.get(p));
        let (comment_origin, method) = classify_comment(origin, entry.is_some());
        c.origin = comment_origin;
        c.threading_method = method;
        if let Some(entry) = entry {
            c.is_done = entry.done;
            c.parent_comment_id = entry
                .para_id_parent
                .as_ref()
                .and_then(|p| by_para.get(p))
                .cloned();
        }
    }
    thread_by_range(&mut comments, spans);

    CommentsPart {
        comments,
        origin,
        namespaces,
        ignorable,
    }
}

/// Comments of a package without building the rest of the document tree.
///
/// With a converter, its styles and numbering cache are used; otherwise they
/// are read from the package.
pub fn import_comment_data(package: &Package, converter: Option<&Converter>) -> Vec<Comment> {
    let owned;
    let (styles, numbering) = match converter {
        Some(c) => (c.styles(), c.numbering_cache()),
        None => {
            owned = (
                super::styles::load_style_table(package),
                super::numbering::load_numbering(package).unwrap_or_default(),
            );
            (&owned.0, &owned.1)
        }
    };

    let part = package.main_document_part();
    let mut spans = HashMap::new();
    if let Some(xml_content) = package.xml(&part)
        && let Ok(xml) = roxmltree::Document::parse(&xml_content)
        && let Some(body) = wml(xml.root_element(), "body")
    {
        let mut importer = PartImporter::new(package, &part, &xml_content, styles, numbering);
        importer.blocks(body);
        spans = importer.spans;
    }
    import_comments(package, styles, numbering, &spans).comments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_entries() {
        let xml = r#"<w15:commentsEx xmlns:w15="http://schemas.microsoft.com/office/word/2012/wordml">
  <w15:commentEx w15:paraId="0A1B2C3D" w15:done="1"/>
  <w15:commentEx w15:paraId="0A1B2C3E" w15:paraIdParent="0A1B2C3D" w15:done="0"/>
</w15:commentsEx>"#;
        let map = parse_comments_extended(xml);
        assert!(map["0A1B2C3D"].done);
        assert!(!map["0A1B2C3E"].done);
        assert_eq!(map["0A1B2C3E"].para_id_parent.as_deref(), Some("0A1B2C3D"));
    }
}
