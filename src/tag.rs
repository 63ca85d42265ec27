//! Tag model: the record header, the typed variants and the PlaceObject2 layout.
//!
//! A tag owns its payload bytes. For containers (DefineSprite) the payload holds only
//! the fixed 4-byte prefix (id, frame count); the nested stream lives in the arena as
//! child handles and `length` covers both.

use crate::bits::BitCursor;
use crate::codec::EncodedRecord;
use crate::error::MovieError;
use crate::image::ImageHeader;
use crate::schema::RecordKind;
use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;
use std::io::Write;

use crate::arena::TagId;

/// Tag codes handled by name.
pub mod code {
    pub const END: u16 = 0;
    pub const SHOW_FRAME: u16 = 1;
    pub const DEFINE_SHAPE: u16 = 2;
    pub const DEFINE_BITS: u16 = 6;
    pub const JPEG_TABLES: u16 = 8;
    pub const SET_BACKGROUND_COLOR: u16 = 9;
    pub const DEFINE_TEXT: u16 = 11;
    pub const DO_ACTION: u16 = 12;
    pub const DEFINE_SOUND: u16 = 14;
    pub const DEFINE_BITS_LOSSLESS: u16 = 20;
    pub const DEFINE_BITS_JPEG2: u16 = 21;
    pub const DEFINE_SHAPE2: u16 = 22;
    pub const PLACE_OBJECT2: u16 = 26;
    pub const REMOVE_OBJECT2: u16 = 28;
    pub const DEFINE_SHAPE3: u16 = 32;
    pub const DEFINE_BUTTON2: u16 = 34;
    pub const DEFINE_BITS_JPEG3: u16 = 35;
    pub const DEFINE_BITS_LOSSLESS2: u16 = 36;
    pub const DEFINE_EDIT_TEXT: u16 = 37;
    pub const DEFINE_SPRITE: u16 = 39;
    pub const FRAME_LABEL: u16 = 43;
    pub const SOUND_STREAM_HEAD2: u16 = 45;
    pub const DEFINE_MORPH_SHAPE: u16 = 46;
    pub const DEFINE_FONT2: u16 = 48;
    pub const DEFINE_FONT_NAME: u16 = 88;
}

/// Short-form length escape.
pub const LONG_LENGTH: u32 = 0x3f;

/// Bytes of a sprite payload in front of its nested stream: id and frame count.
pub const SPRITE_PREFIX: usize = 4;

/// SHA-256 over a definition's payload after the id field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        ContentHash(Sha256::digest(bytes).into())
    }

    /// Hash of a definition payload (the id bytes are skipped).
    pub fn of_definition(payload: &[u8]) -> Self {
        Self::of(payload.get(2..).unwrap_or(&[]))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", &hex::encode(self.0)[..12])
    }
}

/// Leaf definition: anything with a character id that is not a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub character_id: u16,
    pub hash: ContentHash,
    pub image: Option<ImageHeader>,
}

/// DefineSprite. `trailing` keeps any bytes found after the nested End tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub character_id: u16,
    pub frame_count: u16,
    pub hash: ContentHash,
    pub children: Vec<TagId>,
    pub trailing: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagKind {
    /// Unknown code: raw bytes only.
    Opaque,
    /// Known code without typed fields.
    Plain,
    SetBackgroundColor { rgb: [u8; 3] },
    FrameLabel { name: String },
    RemoveObject2 { depth: u16 },
    /// References a font; it does not define a character of its own.
    DefineFontName { font_id: u16 },
    Definition(Definition),
    Sprite(Sprite),
    PlaceObject2(PlaceObject2),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub code: u16,
    length: u32,
    long_header: bool,
    payload: Vec<u8>,
    pub kind: TagKind,
}

impl Tag {
    /// A freshly built tag; the header form follows the length.
    pub fn new(code: u16, payload: Vec<u8>, kind: TagKind) -> Self {
        let length = payload.len() as u32;
        Tag { code, length, long_header: length >= LONG_LENGTH, payload, kind }
    }

    /// A tag as read from the wire, keeping its header form.
    pub(crate) fn from_wire(code: u16, length: u32, long_header: bool, payload: Vec<u8>, kind: TagKind) -> Self {
        Tag { code, length, long_header, payload, kind }
    }

    /// Always emit the 6-byte header, whatever the length.
    pub fn into_long_header(mut self) -> Self {
        self.long_header = true;
        self
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn long_header(&self) -> bool {
        self.long_header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// 2 for the short form, 6 once the length needs (or was stored with) the escape.
    pub fn header_len(&self) -> usize {
        if self.long_header || self.length >= LONG_LENGTH {
            6
        } else {
            2
        }
    }

    pub fn total_len(&self) -> usize {
        self.header_len() + self.length as usize
    }

    pub(crate) fn set_length(&mut self, length: u32) {
        if !self.long_header && length >= LONG_LENGTH {
            log::warn!("tag {} grew to {} bytes, promoting to long header", self.code, length);
            self.long_header = true;
        }
        self.length = length;
    }

    /// Replace the payload of a non-container tag; length and content hash follow.
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        let hash = ContentHash::of_definition(&payload);
        if let TagKind::Definition(d) = &mut self.kind {
            d.hash = hash;
        }
        let length = payload.len() as u32;
        self.payload = payload;
        self.set_length(length);
    }

    pub fn write_header<W: Write>(&self, w: &mut W) -> Result<(), MovieError> {
        if self.header_len() == 2 {
            w.write_u16::<LittleEndian>((self.code << 6) | self.length as u16)?;
        } else {
            w.write_u16::<LittleEndian>((self.code << 6) | LONG_LENGTH as u16)?;
            w.write_u32::<LittleEndian>(self.length)?;
        }
        Ok(())
    }

    pub fn is_end(&self) -> bool {
        self.code == code::END
    }

    pub fn is_definition(&self) -> bool {
        matches!(self.kind, TagKind::Definition(_) | TagKind::Sprite(_))
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, TagKind::Sprite(_))
    }

    pub fn character_id(&self) -> Option<u16> {
        match &self.kind {
            TagKind::Definition(d) => Some(d.character_id),
            TagKind::Sprite(s) => Some(s.character_id),
            _ => None,
        }
    }

    pub fn content_hash(&self) -> Option<ContentHash> {
        match &self.kind {
            TagKind::Definition(d) => Some(d.hash),
            TagKind::Sprite(s) => Some(s.hash),
            _ => None,
        }
    }

    pub fn sprite(&self) -> Option<&Sprite> {
        match &self.kind {
            TagKind::Sprite(s) => Some(s),
            _ => None,
        }
    }

    pub fn sprite_mut(&mut self) -> Option<&mut Sprite> {
        match &mut self.kind {
            TagKind::Sprite(s) => Some(s),
            _ => None,
        }
    }

    pub fn placement(&self) -> Option<&PlaceObject2> {
        match &self.kind {
            TagKind::PlaceObject2(p) => Some(p),
            _ => None,
        }
    }

    /// Rewrite the id in the payload's first two bytes. The content hash excludes the id
    /// and is unaffected.
    pub fn set_character_id(&mut self, id: u16) -> Result<(), MovieError> {
        match &mut self.kind {
            TagKind::Definition(d) => d.character_id = id,
            TagKind::Sprite(s) => s.character_id = id,
            _ => return Err(MovieError::Format(format!("tag {} has no character id", self.code))),
        }
        if self.payload.len() < 2 {
            return Err(MovieError::Underrun { needed: 16, available: self.payload.len() * 8 });
        }
        self.payload[..2].copy_from_slice(&id.to_le_bytes());
        Ok(())
    }

    /// Apply `f` to the placement fields and re-encode the payload.
    pub fn edit_placement<F: FnOnce(&mut PlaceObject2)>(&mut self, f: F) -> Result<(), MovieError> {
        let payload = match &mut self.kind {
            TagKind::PlaceObject2(p) => {
                f(p);
                p.encode()?
            }
            _ => return Err(MovieError::Format(format!("tag {} is not a placement", self.code))),
        };
        self.set_payload(payload);
        Ok(())
    }
}

/// PlaceObject2 flag bits, MSB first on the wire.
pub mod place_flags {
    pub const HAS_CLIP_ACTIONS: u8 = 0x80;
    pub const HAS_CLIP_DEPTH: u8 = 0x40;
    pub const HAS_NAME: u8 = 0x20;
    pub const HAS_RATIO: u8 = 0x10;
    pub const HAS_COLOR_TRANSFORM: u8 = 0x08;
    pub const HAS_MATRIX: u8 = 0x04;
    pub const HAS_CHARACTER: u8 = 0x02;
    pub const MOVE: u8 = 0x01;
}

/// Typed PlaceObject2 fields; each `Option` mirrors a presence flag.
///
/// The bits not tied to an `Option` (clip actions, move) are kept as read. Matrix and
/// color transform keep their wire bytes, so an untouched placement re-encodes verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceObject2 {
    flags: u8,
    pub depth: u16,
    pub target_character_id: Option<u16>,
    pub matrix: Option<EncodedRecord>,
    pub color_transform: Option<EncodedRecord>,
    pub ratio: Option<u16>,
    name: Option<Vec<u8>>,
    pub clip_depth: Option<u16>,
    /// Everything after the last decoded field.
    pub clip_actions: Vec<u8>,
}

impl PlaceObject2 {
    pub fn new(depth: u16, target_character_id: Option<u16>) -> Self {
        PlaceObject2 {
            flags: 0,
            depth,
            target_character_id,
            matrix: None,
            color_transform: None,
            ratio: None,
            name: None,
            clip_depth: None,
            clip_actions: Vec::new(),
        }
    }

    pub fn parse(payload: &[u8]) -> Result<Self, MovieError> {
        use place_flags::*;
        let mut c = BitCursor::new(payload);
        let flags = c.read_u8()?;
        let depth = c.read_u16()?;
        let mut p = PlaceObject2::new(depth, None);
        p.flags = flags;
        if flags & HAS_CHARACTER != 0 {
            p.target_character_id = Some(c.read_u16()?);
        }
        if flags & HAS_MATRIX != 0 {
            p.matrix = Some(EncodedRecord::decode(RecordKind::Matrix, &mut c)?);
        }
        if flags & HAS_COLOR_TRANSFORM != 0 {
            p.color_transform = Some(EncodedRecord::decode(RecordKind::ColorTransformWithAlpha, &mut c)?);
        }
        if flags & HAS_RATIO != 0 {
            p.ratio = Some(c.read_u16()?);
        }
        if flags & HAS_NAME != 0 {
            p.name = Some(c.read_cstring_bytes()?.to_vec());
        }
        if flags & HAS_CLIP_DEPTH != 0 {
            p.clip_depth = Some(c.read_u16()?);
        }
        p.clip_actions = payload.get(c.position()..).unwrap_or(&[]).to_vec();
        Ok(p)
    }

    /// Flag byte derived from field presence.
    pub fn flags(&self) -> u8 {
        use place_flags::*;
        let mut f = self.flags & (HAS_CLIP_ACTIONS | MOVE);
        let bits = [
            (self.clip_depth.is_some(), HAS_CLIP_DEPTH),
            (self.name.is_some(), HAS_NAME),
            (self.ratio.is_some(), HAS_RATIO),
            (self.color_transform.is_some(), HAS_COLOR_TRANSFORM),
            (self.matrix.is_some(), HAS_MATRIX),
            (self.target_character_id.is_some(), HAS_CHARACTER),
        ];
        for (present, bit) in bits {
            if present {
                f |= bit;
            }
        }
        f
    }

    pub fn encode(&self) -> Result<Vec<u8>, MovieError> {
        let mut out = Vec::with_capacity(16);
        out.write_u8(self.flags())?;
        out.write_u16::<LittleEndian>(self.depth)?;
        if let Some(id) = self.target_character_id {
            out.write_u16::<LittleEndian>(id)?;
        }
        if let Some(m) = &self.matrix {
            out.extend_from_slice(&m.bytes);
        }
        if let Some(cx) = &self.color_transform {
            out.extend_from_slice(&cx.bytes);
        }
        if let Some(r) = self.ratio {
            out.write_u16::<LittleEndian>(r)?;
        }
        if let Some(n) = &self.name {
            out.extend_from_slice(n);
            out.write_u8(0)?;
        }
        if let Some(d) = self.clip_depth {
            out.write_u16::<LittleEndian>(d)?;
        }
        out.extend_from_slice(&self.clip_actions);
        Ok(out)
    }

    pub fn name(&self) -> Option<Cow<'_, str>> {
        self.name.as_deref().map(String::from_utf8_lossy)
    }

    pub fn name_bytes(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name.as_bytes())
    }

    /// Renames an already named placement; unnamed placements stay unnamed.
    pub fn set_name(&mut self, name: &str) {
        if let Some(n) = &mut self.name {
            *n = name.as_bytes().to_vec();
        }
    }

    /// Adds or replaces the instance name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.as_bytes().to_vec());
        self
    }

    pub fn set_matrix(&mut self, matrix: EncodedRecord) {
        self.matrix = Some(matrix);
    }

    /// Sets the target, inserting the field when the placement had none.
    pub fn set_target_character_id(&mut self, id: u16) {
        self.target_character_id = Some(id);
    }
}
