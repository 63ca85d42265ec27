//! Document: file header, top-level tag sequence and the derived character table.
//!
//! Loading is fail-fast: any error while decoding discards the whole document. Lengths
//! are never recomputed implicitly; mutating operations call [`Document::relength_upward`]
//! on the tag they changed, which walks the owner chain and finishes with the file
//! length in the header.

use crate::arena::{TagArena, TagId};
use crate::bits::BitCursor;
use crate::codec::EncodedRecord;
use crate::error::MovieError;
use crate::geometry::{twip2pixel, Rect};
use crate::parser::parse_stream;
use crate::schema::RecordKind;
use crate::table::{CharacterTable, TableEntry};
use crate::tag::{ContentHash, Tag, TagKind, SPRITE_PREFIX};
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

pub const SIGNATURE_UNCOMPRESSED: &[u8; 3] = b"FWS";
pub const SIGNATURE_COMPRESSED: &[u8; 3] = b"CWS";
/// The only version emitted and, by default, accepted.
pub const SUPPORTED_VERSION: u8 = 4;
/// Signature, version and file length.
pub const FILE_PREFIX_LEN: usize = 8;
/// Upper bound on the buffer reserved from an untrusted length header.
const MAX_PREALLOC: usize = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    /// Reject any other version when set.
    pub require_version: Option<u8>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions { require_version: Some(SUPPORTED_VERSION) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// `CWS`: everything after the first 8 bytes is a zlib stream.
    pub compressed: bool,
    pub version: u8,
    /// Uncompressed length of the whole file, prefix included.
    pub file_length: u32,
    pub rect: EncodedRecord,
    /// 8.8 fixed point as stored: fraction byte, then integer byte.
    pub frame_rate: u16,
    pub frame_count: u16,
}

impl Header {
    pub fn signature(&self) -> &'static [u8; 3] {
        if self.compressed {
            SIGNATURE_COMPRESSED
        } else {
            SIGNATURE_UNCOMPRESSED
        }
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate as f64 / 256.0
    }

    /// Length of the prefix, rect, frame rate and frame count.
    pub fn encoded_len(&self) -> usize {
        FILE_PREFIX_LEN + self.rect.len() + 4
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub header: Header,
    arena: TagArena,
    tags: Vec<TagId>,
    trailing: Vec<u8>,
    table: CharacterTable,
    pub(crate) params: Vec<(String, String)>,
}

impl Document {
    pub fn parse(bytes: &[u8]) -> Result<Document, MovieError> {
        Document::parse_with(bytes, &LoadOptions::default())
    }

    pub fn parse_with(bytes: &[u8], options: &LoadOptions) -> Result<Document, MovieError> {
        if bytes.len() < FILE_PREFIX_LEN {
            return Err(MovieError::Format(format!("{} bytes is shorter than a file header", bytes.len())));
        }
        let compressed = match &bytes[..3] {
            s if s == SIGNATURE_UNCOMPRESSED => false,
            s if s == SIGNATURE_COMPRESSED => true,
            s => return Err(MovieError::Format(format!("bad signature {:?}", String::from_utf8_lossy(s)))),
        };
        let version = bytes[3];
        if let Some(v) = options.require_version {
            if version != v {
                return Err(MovieError::Format(format!("unsupported version {} (expected {})", version, v)));
            }
        }
        let mut prefix = BitCursor::new(&bytes[4..FILE_PREFIX_LEN]);
        let file_length = prefix.read_u32()?;

        let inflated;
        let body: &[u8] = if compressed {
            let mut out = Vec::with_capacity((file_length as usize).min(MAX_PREALLOC));
            ZlibDecoder::new(&bytes[FILE_PREFIX_LEN..])
                .read_to_end(&mut out)
                .map_err(|e| MovieError::Format(format!("zlib: {}", e)))?;
            inflated = out;
            &inflated
        } else {
            &bytes[FILE_PREFIX_LEN..]
        };

        let mut cur = BitCursor::new(body);
        let rect = EncodedRecord::decode(RecordKind::Rect, &mut cur)?;
        let frame_rate = cur.read_u16()?;
        let frame_count = cur.read_u16()?;
        let header = Header { compressed, version, file_length, rect, frame_rate, frame_count };

        let mut arena = TagArena::new();
        let (tags, trailing) = parse_stream(&mut arena, &body[cur.position()..], None)?;
        let table = CharacterTable::build(&arena, &tags);
        log::info!(
            "loaded {} v{}: {} bytes, {} top-level tags, {} characters",
            String::from_utf8_lossy(header.signature()),
            version,
            file_length,
            tags.len(),
            table.len()
        );
        Ok(Document { header, arena, tags, trailing, table, params: Vec::new() })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Document, MovieError> {
        Document::parse(&std::fs::read(path)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), MovieError> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Deep copy of the live tags; the source is untouched.
    ///
    /// Removal only detaches tags, so the source arena keeps them until it is dropped. The
    /// copy is compacted: [`TagId`]s and clip handles taken from the source do not apply
    /// to it.
    pub fn copy(&self) -> Document {
        let mut arena = TagArena::new();
        let tags: Vec<TagId> = self.tags.iter().map(|&t| arena.graft(&self.arena, t, None)).collect();
        let moved: HashMap<TagId, TagId> = self.tags.iter().copied().zip(tags.iter().copied()).collect();
        let mut table = CharacterTable::new();
        for (cid, entry) in self.table.iter() {
            if let Some(&tag) = moved.get(&entry.tag) {
                table.register(cid, TableEntry { tag, ..*entry });
            }
        }
        Document {
            header: self.header.clone(),
            arena,
            tags,
            trailing: self.trailing.clone(),
            table,
            params: self.params.clone(),
        }
    }

    pub fn arena(&self) -> &TagArena {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut TagArena {
        &mut self.arena
    }

    pub fn table(&self) -> &CharacterTable {
        &self.table
    }

    pub(crate) fn table_mut(&mut self) -> &mut CharacterTable {
        &mut self.table
    }

    /// Top-level tag sequence.
    pub fn tags(&self) -> &[TagId] {
        &self.tags
    }

    pub fn tag(&self, id: TagId) -> &Tag {
        &self.arena[id]
    }

    /// Tag defining character `id`.
    pub fn definition(&self, id: u16) -> Result<&Tag, MovieError> {
        self.table.get(id).map(|e| &self.arena[e.tag]).ok_or(MovieError::CharacterNotFound(id))
    }

    pub(crate) fn from_parts(header: Header, arena: TagArena, tags: Vec<TagId>, trailing: Vec<u8>) -> Document {
        let table = CharacterTable::build(&arena, &tags);
        Document { header, arena, tags, trailing, table, params: Vec::new() }
    }

    pub(crate) fn trailing(&self) -> &[u8] {
        &self.trailing
    }

    pub fn rect(&self) -> Result<Rect, MovieError> {
        Rect::from_record(&self.header.rect.record)
    }

    /// Stage width in pixels (`x_max` / 20).
    pub fn width(&self) -> Result<f64, MovieError> {
        Ok(twip2pixel(self.rect()?.x_max))
    }

    pub fn height(&self) -> Result<f64, MovieError> {
        Ok(twip2pixel(self.rect()?.y_max))
    }

    pub fn replace_rect(&mut self, rect: Rect) -> Result<(), MovieError> {
        self.header.rect = EncodedRecord::from_record(rect.to_record())?;
        self.refresh_file_length();
        Ok(())
    }

    /// Every tag in document order: pre-order, top level first, children inside their
    /// container.
    pub fn walk(&self) -> Vec<TagId> {
        fn visit(arena: &TagArena, ids: &[TagId], out: &mut Vec<TagId>) {
            for &id in ids {
                out.push(id);
                visit(arena, arena.children(id), out);
            }
        }
        let mut out = Vec::with_capacity(self.arena.len());
        visit(&self.arena, &self.tags, &mut out);
        out
    }

    /// Every PlaceObject2 in document order.
    pub fn placements(&self) -> Vec<TagId> {
        self.walk().into_iter().filter(|&id| self.arena[id].placement().is_some()).collect()
    }

    /// Targets of the placements directly inside `container`.
    pub fn placed_ids(&self, container: TagId) -> Vec<u16> {
        self.arena
            .children(container)
            .iter()
            .filter_map(|&c| self.arena[c].placement().and_then(|p| p.target_character_id))
            .collect()
    }

    pub fn top_level_index(&self, id: TagId) -> Option<usize> {
        self.tags.iter().position(|&t| t == id)
    }

    pub(crate) fn insert_top_level(&mut self, index: usize, id: TagId) {
        self.arena.set_parent(id, None);
        self.tags.insert(index, id);
    }

    /// Detach `id` from its owner's sequence. Returns the former owner.
    pub(crate) fn detach(&mut self, id: TagId) -> Option<TagId> {
        match self.arena.parent(id) {
            Some(owner) => {
                if let Some(s) = self.arena[owner].sprite_mut() {
                    s.children.retain(|&c| c != id);
                }
                Some(owner)
            }
            None => {
                self.tags.retain(|&t| t != id);
                None
            }
        }
    }

    pub fn write_tag<W: Write>(&self, id: TagId, w: &mut W) -> Result<(), MovieError> {
        let tag = &self.arena[id];
        tag.write_header(w)?;
        w.write_all(tag.payload())?;
        if let Some(s) = tag.sprite() {
            for &c in &s.children {
                self.write_tag(c, w)?;
            }
            w.write_all(&s.trailing)?;
        }
        Ok(())
    }

    /// The tag's bytes, header included.
    pub fn serialize_tag(&self, id: TagId) -> Result<Vec<u8>, MovieError> {
        let mut out = Vec::with_capacity(self.arena[id].total_len());
        self.write_tag(id, &mut out)?;
        Ok(out)
    }

    /// Recompute a container's length and content hash from its children. Other tags
    /// already keep their length in step with the payload.
    pub fn relength(&mut self, id: TagId) -> Result<(), MovieError> {
        let Some(sprite) = self.arena[id].sprite() else {
            return Ok(());
        };
        let mut nested = Vec::new();
        for &c in &sprite.children {
            self.write_tag(c, &mut nested)?;
        }
        nested.extend_from_slice(&sprite.trailing);
        let character_id = sprite.character_id;

        let tag = &mut self.arena[id];
        let mut tail = tag.payload().get(2..SPRITE_PREFIX).unwrap_or(&[]).to_vec();
        tail.extend_from_slice(&nested);
        let hash = ContentHash::of(&tail);
        tag.set_length((SPRITE_PREFIX + nested.len()) as u32);
        if let Some(s) = tag.sprite_mut() {
            s.hash = hash;
        }
        if self.table.get(character_id).map(|e| e.tag) == Some(id) {
            self.table.rehash(character_id, hash);
        }
        Ok(())
    }

    /// Relength `id` and every container above it, then the file length.
    pub fn relength_upward(&mut self, id: TagId) -> Result<(), MovieError> {
        let mut cur = Some(id);
        while let Some(t) = cur {
            self.relength(t)?;
            cur = self.arena.parent(t);
        }
        self.refresh_file_length();
        Ok(())
    }

    pub fn computed_file_length(&self) -> usize {
        let tags: usize = self.tags.iter().map(|&t| self.arena[t].total_len()).sum();
        let params = crate::params::tag_len(&self.params, self.header.version);
        self.header.encoded_len() + params + tags + self.trailing.len()
    }

    pub fn refresh_file_length(&mut self) {
        self.header.file_length = self.computed_file_length() as u32;
    }

    /// Everything after the 8-byte prefix, uncompressed.
    fn body(&self) -> Result<Vec<u8>, MovieError> {
        let mut out = Vec::with_capacity(self.computed_file_length());
        out.write_all(&self.header.rect.bytes)?;
        out.write_u16::<LittleEndian>(self.header.frame_rate)?;
        out.write_u16::<LittleEndian>(self.header.frame_count)?;
        if !self.params.is_empty() {
            let tag = crate::params::build_tag(&self.params, self.header.version)?;
            tag.write_header(&mut out)?;
            out.write_all(tag.payload())?;
        }
        for &t in &self.tags {
            self.write_tag(t, &mut out)?;
        }
        out.write_all(&self.trailing)?;
        Ok(out)
    }

    /// Emit the file, recompressing the body for `CWS`.
    /// Fails with `CharacterNotFound` for the first placement whose target is not
    /// defined. Mutations may leave such placements behind for a while; a saved file
    /// must not contain any.
    pub fn validate_references(&self) -> Result<(), MovieError> {
        for p in self.placements() {
            if let Some(id) = self.arena[p].placement().and_then(|pl| pl.target_character_id) {
                if !self.table.contains(id) {
                    return Err(MovieError::CharacterNotFound(id));
                }
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MovieError> {
        self.validate_references()?;
        let body = self.body()?;
        let mut out = Vec::with_capacity(FILE_PREFIX_LEN + body.len());
        out.write_all(self.header.signature())?;
        out.write_u8(self.header.version)?;
        out.write_u32::<LittleEndian>(self.header.file_length)?;
        if self.header.compressed {
            let mut z = ZlibEncoder::new(out, Compression::default());
            z.write_all(&body)?;
            out = z.finish()?;
        } else {
            out.extend_from_slice(&body);
        }
        Ok(out)
    }

    /// Swap definition `old_id` for a copy of `new_shape`, keeping the old id and
    /// position.
    pub fn replace_shape(&mut self, old_id: u16, new_shape: &Tag) -> Result<TagId, MovieError> {
        let old = self.table.get(old_id).ok_or(MovieError::CharacterNotFound(old_id))?.tag;
        if !matches!(new_shape.kind, TagKind::Definition(_)) {
            return Err(MovieError::Format(format!("tag {} cannot replace a shape", new_shape.code)));
        }
        let index = self
            .top_level_index(old)
            .ok_or_else(|| MovieError::Format(format!("character {} is not at top level", old_id)))?;
        let mut copy = new_shape.clone();
        copy.set_character_id(old_id)?;
        let hash = copy.content_hash().unwrap_or_else(|| ContentHash::of(&[]));
        let new_id = self.arena.push(copy, None);
        self.tags[index] = new_id;
        self.table.register(old_id, TableEntry { tag: new_id, hash, container: false });
        self.refresh_file_length();
        log::info!("replaced shape {}", old_id);
        Ok(new_id)
    }
}
