//! Append-only tag storage addressed by [`TagId`] handles.
//!
//! Containers hold their children as handle lists and every tag records the handle of
//! its owning container (`None` at top level), so length changes can be walked upward
//! without owning back-pointers. Removing a tag from a document only detaches it from
//! its owner's sequence; the slot stays allocated until the arena is dropped.

use crate::tag::{Tag, TagKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct TagId(u32);

impl TagId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct TagArena {
    tags: Vec<Tag>,
    parents: Vec<Option<TagId>>,
}

impl TagArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: Tag, parent: Option<TagId>) -> TagId {
        let id = TagId(self.tags.len() as u32);
        self.tags.push(tag);
        self.parents.push(parent);
        id
    }

    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.tags.get(id.index())
    }

    pub fn get_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        self.tags.get_mut(id.index())
    }

    pub fn parent(&self, id: TagId) -> Option<TagId> {
        self.parents.get(id.index()).copied().flatten()
    }

    pub fn set_parent(&mut self, id: TagId, parent: Option<TagId>) {
        if let Some(p) = self.parents.get_mut(id.index()) {
            *p = parent;
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Children of a container, empty for every other tag.
    pub fn children(&self, id: TagId) -> &[TagId] {
        match self.get(id).map(|t| &t.kind) {
            Some(TagKind::Sprite(s)) => &s.children,
            _ => &[],
        }
    }

    /// Deep-copy `id` (and, for containers, its whole subtree) out of `other`.
    pub fn graft(&mut self, other: &TagArena, id: TagId, parent: Option<TagId>) -> TagId {
        let mut copy = other[id].clone();
        let children = match &mut copy.kind {
            TagKind::Sprite(s) => std::mem::take(&mut s.children),
            _ => Vec::new(),
        };
        let new_id = self.push(copy, parent);
        if !children.is_empty() {
            let grafted: Vec<TagId> = children.iter().map(|&c| self.graft(other, c, Some(new_id))).collect();
            if let TagKind::Sprite(s) = &mut self[new_id].kind {
                s.children = grafted;
            }
        }
        new_id
    }
}

impl std::ops::Index<TagId> for TagArena {
    type Output = Tag;
    fn index(&self, id: TagId) -> &Tag {
        &self.tags[id.index()]
    }
}

impl std::ops::IndexMut<TagId> for TagArena {
    fn index_mut(&mut self, id: TagId) -> &mut Tag {
        &mut self.tags[id.index()]
    }
}
