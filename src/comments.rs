//! Comment model, origin detection and thread reconstruction.
//!
//! A document's comments come either from Word, which threads replies through
//! `commentsExtended.xml` (`w15:paraIdParent`) and stores the resolved flag
//! there, or from Google Docs, which writes no `commentsExtended.xml` and
//! expresses a reply by giving it the same `commentRangeStart`/`commentRangeEnd`
//! span as the comment it answers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::Block;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommentOrigin {
    Word,
    GoogleDocs,
    #[default]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThreadingMethod {
    #[default]
    CommentsExtended,
    RangeBased,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub comment_id: String,
    /// `w:id` from `comments.xml`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_id: Option<String>,
    /// `w14:paraId` of the last body paragraph, the key into `commentsExtended.xml`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub para_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initials: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_time: Option<String>,
    #[serde(default)]
    pub origin: CommentOrigin,
    #[serde(default)]
    pub threading_method: ThreadingMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<String>,
    pub text_json: Vec<Block>,
}

impl Comment {
    /// Internal id derived from an imported `w:id`, shared by the comment and
    /// the range markers that point at it.
    pub fn internal_id(imported_id: &str) -> String {
        format!("comment-{imported_id}")
    }

    pub fn text(&self) -> String {
        let mut paragraphs = Vec::new();
        crate::model::collect_paragraphs(&self.text_json, &mut paragraphs);
        paragraphs
            .iter()
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn resolve(&mut self, time: Option<String>) {
        self.is_done = true;
        self.resolved_time = time;
    }

    pub fn reopen(&mut self) {
        self.is_done = false;
        self.resolved_time = None;
    }
}

/// Replies to `comment_id`, in list order.
pub fn replies<'a>(comments: &'a [Comment], comment_id: &str) -> Vec<&'a Comment> {
    comments
        .iter()
        .filter(|c| c.parent_comment_id.as_deref() == Some(comment_id))
        .collect()
}

/// Remove a comment. Replies lose their parent link instead of being dropped.
pub fn delete_comment(comments: &mut Vec<Comment>, comment_id: &str) -> Option<Comment> {
    let idx = comments.iter().position(|c| c.comment_id == comment_id)?;
    let removed = comments.remove(idx);
    for c in comments.iter_mut() {
        if c.parent_comment_id.as_deref() == Some(comment_id) {
            c.parent_comment_id = removed.parent_comment_id.clone();
        }
    }
    Some(removed)
}

/// Structural evidence collected from a package, before per-comment decisions.
#[derive(Debug, Default)]
pub struct OriginEvidence {
    pub has_comments: bool,
    /// `commentsExtended.xml` exists and at least one entry matches a comment paragraph.
    pub has_valid_comments_extended: bool,
}

/// Document-level origin, decided once per import.
pub fn detect_document_origin(evidence: &OriginEvidence) -> CommentOrigin {
    if !evidence.has_comments {
        return CommentOrigin::Unknown;
    }
    if evidence.has_valid_comments_extended {
        CommentOrigin::Word
    } else {
        CommentOrigin::GoogleDocs
    }
}

/// Per-comment origin and threading method. Only diverges from the document
/// signal when the comment's own evidence conflicts with it: a Word document
/// whose comment has no `commentsExtended` entry is recorded as `Unknown`.
pub fn classify_comment(
    document_origin: CommentOrigin,
    has_extended_entry: bool,
) -> (CommentOrigin, ThreadingMethod) {
    match (document_origin, has_extended_entry) {
        (CommentOrigin::Word, true) => (CommentOrigin::Word, ThreadingMethod::CommentsExtended),
        (CommentOrigin::Word, false) => (CommentOrigin::Unknown, ThreadingMethod::RangeBased),
        (CommentOrigin::GoogleDocs, _) => (CommentOrigin::GoogleDocs, ThreadingMethod::RangeBased),
        (CommentOrigin::Unknown, true) => (CommentOrigin::Word, ThreadingMethod::CommentsExtended),
        (CommentOrigin::Unknown, false) => (CommentOrigin::Unknown, ThreadingMethod::RangeBased),
    }
}

/// Text-offset span of a comment's range markers in `document.xml`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommentSpan {
    pub start: usize,
    pub end: usize,
}

/// Link range-based comments into threads: a comment whose span equals the
/// span of an earlier root comment becomes its reply. Comments that already
/// have a parent, or that thread through `commentsExtended`, are left alone.
pub fn thread_by_range(comments: &mut [Comment], spans: &HashMap<String, CommentSpan>) {
    let mut roots: HashMap<CommentSpan, String> = HashMap::new();
    for c in comments.iter_mut() {
        if c.threading_method != ThreadingMethod::RangeBased {
            continue;
        }
        let Some(span) = spans.get(&c.comment_id).copied() else {
            continue;
        };
        if c.parent_comment_id.is_some() {
            continue;
        }
        match roots.get(&span) {
            Some(root) => c.parent_comment_id = Some(root.clone()),
            None => {
                roots.insert(span, c.comment_id.clone());
            }
        }
    }
}

/// The single package format used on export. Word's layout is the superset,
/// so mixed or unknown origins are written the Word way.
pub fn export_origin(comments: &[Comment]) -> CommentOrigin {
    if comments.iter().any(|c| c.origin != CommentOrigin::Word) {
        log::debug!("Non-Word comment origins present; exporting in Word format");
    }
    CommentOrigin::Word
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, method: ThreadingMethod) -> Comment {
        Comment {
            comment_id: id.to_string(),
            threading_method: method,
            ..Comment::default()
        }
    }

    #[test]
    fn origin_from_evidence() {
        let none = OriginEvidence::default();
        assert_eq!(detect_document_origin(&none), CommentOrigin::Unknown);
        let google = OriginEvidence {
            has_comments: true,
            has_valid_comments_extended: false,
        };
        assert_eq!(detect_document_origin(&google), CommentOrigin::GoogleDocs);
        let word = OriginEvidence {
            has_comments: true,
            has_valid_comments_extended: true,
        };
        assert_eq!(detect_document_origin(&word), CommentOrigin::Word);
    }

    #[test]
    fn conflicting_comment_evidence_is_unknown() {
        assert_eq!(
            classify_comment(CommentOrigin::Word, false),
            (CommentOrigin::Unknown, ThreadingMethod::RangeBased)
        );
    }

    #[test]
    fn equal_spans_thread_as_replies() {
        let mut comments = vec![
            comment("a", ThreadingMethod::RangeBased),
            comment("b", ThreadingMethod::RangeBased),
            comment("c", ThreadingMethod::RangeBased),
        ];
        let spans = HashMap::from([
            ("a".to_string(), CommentSpan { start: 0, end: 5 }),
            ("b".to_string(), CommentSpan { start: 0, end: 5 }),
            ("c".to_string(), CommentSpan { start: 6, end: 9 }),
        ]);
        thread_by_range(&mut comments, &spans);
        assert_eq!(comments[1].parent_comment_id.as_deref(), Some("a"));
        assert_eq!(comments[2].parent_comment_id, None);
        assert_eq!(replies(&comments, "a").len(), 1);
    }

    #[test]
    fn deleting_a_parent_reparents_replies() {
        let mut comments = vec![
            comment("a", ThreadingMethod::CommentsExtended),
            Comment {
                parent_comment_id: Some("a".into()),
                ..comment("b", ThreadingMethod::CommentsExtended)
            },
        ];
        let removed = delete_comment(&mut comments, "a");
        assert!(removed.is_some());
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].parent_comment_id, None);
    }

    #[test]
    fn mixed_origins_export_as_word() {
        let mut a = comment("a", ThreadingMethod::CommentsExtended);
        a.origin = CommentOrigin::Word;
        let mut b = comment("b", ThreadingMethod::RangeBased);
        b.origin = CommentOrigin::GoogleDocs;
        assert_eq!(export_origin(&[a, b]), CommentOrigin::Word);
    }
}
