//! Character table: character id → top-level definition, with deduplication lookup.
//!
//! Two definitions are equivalent when their content hashes match and neither is a
//! container. Containers are never equivalent, even when byte-identical: comparing them
//! would mean resolving and comparing every subtree they place. Duplicate containers
//! cost file size, never correctness.

use crate::arena::{TagArena, TagId};
use crate::error::MovieError;
use crate::tag::ContentHash;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableEntry {
    pub tag: TagId,
    pub hash: ContentHash,
    pub container: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CharacterTable {
    entries: BTreeMap<u16, TableEntry>,
}

impl CharacterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every definition in a top-level sequence. A repeated id keeps the last one.
    pub fn build(arena: &TagArena, top_level: &[TagId]) -> Self {
        let mut table = CharacterTable::new();
        for &id in top_level {
            let tag = &arena[id];
            if let (Some(cid), Some(hash)) = (tag.character_id(), tag.content_hash()) {
                if table.contains(cid) {
                    log::warn!("character id {} defined twice; keeping the later definition", cid);
                }
                table.register(cid, TableEntry { tag: id, hash, container: tag.is_container() });
            }
        }
        table
    }

    pub fn register(&mut self, id: u16, entry: TableEntry) {
        self.entries.insert(id, entry);
    }

    pub fn unregister(&mut self, id: u16) -> Option<TableEntry> {
        self.entries.remove(&id)
    }

    pub fn rehash(&mut self, id: u16, hash: ContentHash) {
        if let Some(e) = self.entries.get_mut(&id) {
            e.hash = hash;
        }
    }

    pub fn get(&self, id: u16) -> Option<&TableEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &TableEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn max_id(&self) -> Option<u16> {
        self.entries.keys().next_back().copied()
    }

    /// `max(existing) + 1`. An empty table has no maximum to extend.
    pub fn allocate_id(&self) -> Result<u16, MovieError> {
        self.max_id()
            .ok_or(MovieError::TableExhausted)?
            .checked_add(1)
            .ok_or(MovieError::TableExhausted)
    }

    /// Lowest id whose definition is equivalent to a candidate with `hash`.
    pub fn find_equivalent(&self, hash: &ContentHash, container: bool) -> Option<u16> {
        if container {
            return None;
        }
        self.entries.iter().find(|(_, e)| !e.container && e.hash == *hash).map(|(id, _)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::{code, Tag, TagKind};

    fn entry(arena: &mut TagArena, bytes: &[u8], container: bool) -> TableEntry {
        let tag = arena.push(Tag::new(code::SHOW_FRAME, vec![], TagKind::Plain), None);
        TableEntry { tag, hash: ContentHash::of(bytes), container }
    }

    #[test]
    fn allocate_after_max() {
        let mut arena = TagArena::new();
        let mut t = CharacterTable::new();
        assert!(matches!(t.allocate_id(), Err(MovieError::TableExhausted)));
        t.register(3, entry(&mut arena, b"a", false));
        t.register(9, entry(&mut arena, b"b", false));
        assert_eq!(t.allocate_id().unwrap(), 10);
        t.register(u16::MAX, entry(&mut arena, b"c", false));
        assert!(matches!(t.allocate_id(), Err(MovieError::TableExhausted)));
    }

    #[test]
    fn containers_never_match() {
        let mut arena = TagArena::new();
        let mut t = CharacterTable::new();
        t.register(1, entry(&mut arena, b"same", true));
        t.register(2, entry(&mut arena, b"same", false));
        let h = ContentHash::of(b"same");
        assert_eq!(t.find_equivalent(&h, false), Some(2));
        assert_eq!(t.find_equivalent(&h, true), None);
        assert_eq!(t.find_equivalent(&ContentHash::of(b"other"), false), None);
    }
}
