use crate::package::Relationship;

/// Relationships of one part being written. Ids already present are kept;
/// a request matching an existing type and target reuses its id.
#[derive(Debug, Default)]
pub struct RelationshipAllocator {
    rels: Vec<Relationship>,
    next: u32,
}

fn numeric_suffix(id: &str) -> Option<u32> {
    id.strip_prefix("rId").and_then(|n| n.parse().ok())
}

impl RelationshipAllocator {
    pub fn new(existing: Vec<Relationship>) -> Self {
        let next = existing
            .iter()
            .filter_map(|r| numeric_suffix(&r.id))
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            rels: existing,
            next,
        }
    }

    pub fn get_or_add(&mut self, rel_type: &str, target: &str, external: bool) -> String {
        let mode = external.then(|| String::from("External"));
        if let Some(r) = self
            .rels
            .iter()
            .find(|r| r.rel_type == rel_type && r.target == target && r.target_mode == mode)
        {
            return r.id.clone();
        }
        let id = loop {
            let candidate = format!("rId{}", self.next);
            self.next += 1;
            if !self.rels.iter().any(|r| r.id == candidate) {
                break candidate;
            }
        };
        self.rels.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: mode,
        });
        id
    }

    pub fn remove_type(&mut self, rel_type: &str) {
        self.rels.retain(|r| r.rel_type != rel_type);
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.rels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{REL_HYPERLINK, REL_IMAGE, REL_STYLES};

    #[test]
    fn reuses_matching_and_allocates_above_max() {
        let mut alloc = RelationshipAllocator::new(vec![
            Relationship {
                id: "rId1".into(),
                rel_type: REL_STYLES.into(),
                target: "styles.xml".into(),
                target_mode: None,
            },
            Relationship {
                id: "rId7".into(),
                rel_type: REL_IMAGE.into(),
                target: "media/image1.png".into(),
                target_mode: None,
            },
        ]);
        assert_eq!(alloc.get_or_add(REL_IMAGE, "media/image1.png", false), "rId7");
        assert_eq!(alloc.get_or_add(REL_HYPERLINK, "https://example.com", true), "rId8");
        assert_eq!(alloc.get_or_add(REL_HYPERLINK, "https://example.com", true), "rId8");
        assert_eq!(alloc.relationships().len(), 3);
        alloc.remove_type(REL_HYPERLINK);
        assert_eq!(alloc.relationships().len(), 2);
    }
}
