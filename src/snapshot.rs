//! Structural snapshot of a document (serde + bincode).
//!
//! The envelope holds the typed fields of every tag, containers nesting their children,
//! so restoring rebuilds the graph directly without running the bit-level decoder. The
//! character table is rebuilt from the restored definitions.

use crate::arena::{TagArena, TagId};
use crate::codec::EncodedRecord;
use crate::document::{Document, Header};
use crate::error::MovieError;
use crate::tag::{ContentHash, Sprite, Tag, TagKind};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: &str = "MCV1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub rect: EncodedRecord,
    pub compressed: bool,
    pub file_version: u8,
    pub file_length: u32,
    pub frame_rate: u16,
    pub frame_count: u16,
    pub tags: Vec<TagSnapshot>,
    pub trailing: Vec<u8>,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSnapshot {
    pub code: u16,
    pub length: u32,
    pub long_header: bool,
    pub payload: Vec<u8>,
    pub body: SnapshotBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SnapshotBody {
    Leaf(TagKind),
    Sprite {
        character_id: u16,
        frame_count: u16,
        hash: ContentHash,
        trailing: Vec<u8>,
        children: Vec<TagSnapshot>,
    },
}

fn capture(doc: &Document, id: TagId) -> TagSnapshot {
    let tag = doc.tag(id);
    let body = match &tag.kind {
        TagKind::Sprite(s) => SnapshotBody::Sprite {
            character_id: s.character_id,
            frame_count: s.frame_count,
            hash: s.hash,
            trailing: s.trailing.clone(),
            children: s.children.iter().map(|&c| capture(doc, c)).collect(),
        },
        other => SnapshotBody::Leaf(other.clone()),
    };
    TagSnapshot {
        code: tag.code,
        length: tag.length(),
        long_header: tag.long_header(),
        payload: tag.payload().to_vec(),
        body,
    }
}

fn restore(arena: &mut TagArena, snap: TagSnapshot, parent: Option<TagId>) -> Result<TagId, MovieError> {
    match snap.body {
        SnapshotBody::Leaf(TagKind::Sprite(_)) => {
            Err(MovieError::Snapshot(format!("tag {} stores a sprite as a leaf", snap.code)))
        }
        SnapshotBody::Leaf(kind) => {
            Ok(arena.push(Tag::from_wire(snap.code, snap.length, snap.long_header, snap.payload, kind), parent))
        }
        SnapshotBody::Sprite { character_id, frame_count, hash, trailing, children } => {
            let sprite = Sprite { character_id, frame_count, hash, children: Vec::new(), trailing };
            let kind = TagKind::Sprite(sprite);
            let id = arena.push(Tag::from_wire(snap.code, snap.length, snap.long_header, snap.payload, kind), parent);
            let mut restored = Vec::with_capacity(children.len());
            for c in children {
                restored.push(restore(arena, c, Some(id))?);
            }
            if let Some(s) = arena[id].sprite_mut() {
                s.children = restored;
            }
            Ok(id)
        }
    }
}

impl Snapshot {
    pub fn restore(self) -> Result<Document, MovieError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(MovieError::Snapshot(format!("unknown snapshot version {:?}", self.version)));
        }
        let header = Header {
            compressed: self.compressed,
            version: self.file_version,
            file_length: self.file_length,
            rect: self.rect,
            frame_rate: self.frame_rate,
            frame_count: self.frame_count,
        };
        let mut arena = TagArena::new();
        let mut tags = Vec::with_capacity(self.tags.len());
        for t in self.tags {
            tags.push(restore(&mut arena, t, None)?);
        }
        let mut doc = Document::from_parts(header, arena, tags, self.trailing);
        doc.params = self.params;
        log::debug!("restored snapshot: {} tags, {} characters", doc.tags().len(), doc.table().len());
        Ok(doc)
    }
}

impl Document {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            rect: self.header.rect.clone(),
            compressed: self.header.compressed,
            file_version: self.header.version,
            file_length: self.header.file_length,
            frame_rate: self.header.frame_rate,
            frame_count: self.header.frame_count,
            tags: self.tags().iter().map(|&t| capture(self, t)).collect(),
            trailing: self.trailing().to_vec(),
            params: self.params.clone(),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, MovieError> {
        Ok(bincode::serialize(&self.snapshot())?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Document, MovieError> {
        let snap: Snapshot = bincode::deserialize(bytes)?;
        snap.restore()
    }
}
