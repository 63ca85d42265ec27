//! Tag-stream parser and the code → constructor dispatch table.
//!
//! Each record starts with a little-endian `u16`: the high 10 bits are the code, the low
//! 6 bits the length, where 63 means a `u32` length follows. Code 0 (End) closes the
//! stream. Unknown codes become [`TagKind::Opaque`] and never fail.

use crate::arena::{TagArena, TagId};
use crate::bits::BitCursor;
use crate::error::MovieError;
use crate::image::ImageHeader;
use crate::tag::{code, ContentHash, Definition, PlaceObject2, Sprite, Tag, TagKind, LONG_LENGTH, SPRITE_PREFIX};

/// Sprites nested deeper than this are rejected.
pub const MAX_NESTING: usize = 64;

/// Builds the typed part of a tag from its payload. The tag's own slot is already
/// reserved in the arena so containers can parent their children to it.
type Construct = fn(&mut Ctx<'_>, TagId, &[u8]) -> Result<TagKind, MovieError>;

struct Ctx<'a> {
    arena: &'a mut TagArena,
    nesting: usize,
}

static TAG_TABLE: &[(u16, &str, Construct)] = &[
    (code::END, "End", plain),
    (code::SHOW_FRAME, "ShowFrame", plain),
    (code::DEFINE_SHAPE, "DefineShape", definition),
    (code::DEFINE_BITS, "DefineBits", definition),
    (code::JPEG_TABLES, "JPEGTables", plain),
    (code::SET_BACKGROUND_COLOR, "SetBackgroundColor", background),
    (code::DEFINE_TEXT, "DefineText", definition),
    (code::DO_ACTION, "DoAction", plain),
    (code::DEFINE_SOUND, "DefineSound", definition),
    (code::DEFINE_BITS_LOSSLESS, "DefineBitsLossless", definition),
    (code::DEFINE_BITS_JPEG2, "DefineBitsJPEG2", definition),
    (code::DEFINE_SHAPE2, "DefineShape2", definition),
    (code::PLACE_OBJECT2, "PlaceObject2", place_object2),
    (code::REMOVE_OBJECT2, "RemoveObject2", remove_object2),
    (code::DEFINE_SHAPE3, "DefineShape3", definition),
    (code::DEFINE_BUTTON2, "DefineButton2", definition),
    (code::DEFINE_BITS_JPEG3, "DefineBitsJPEG3", definition),
    (code::DEFINE_BITS_LOSSLESS2, "DefineBitsLossless2", definition),
    (code::DEFINE_EDIT_TEXT, "DefineEditText", definition),
    (code::DEFINE_SPRITE, "DefineSprite", sprite),
    (code::FRAME_LABEL, "FrameLabel", frame_label),
    (code::SOUND_STREAM_HEAD2, "SoundStreamHead2", plain),
    (code::DEFINE_MORPH_SHAPE, "DefineMorphShape", definition),
    (code::DEFINE_FONT2, "DefineFont2", definition),
    (code::DEFINE_FONT_NAME, "DefineFontName", font_name),
];

fn lookup(c: u16) -> Option<&'static (u16, &'static str, Construct)> {
    TAG_TABLE.iter().find(|(k, _, _)| *k == c)
}

/// Display name of a tag code; `"Unknown"` outside the table.
pub fn tag_name(c: u16) -> &'static str {
    lookup(c).map(|(_, n, _)| *n).unwrap_or("Unknown")
}

fn plain(_: &mut Ctx<'_>, _: TagId, _: &[u8]) -> Result<TagKind, MovieError> {
    Ok(TagKind::Plain)
}

fn background(_: &mut Ctx<'_>, _: TagId, payload: &[u8]) -> Result<TagKind, MovieError> {
    let b = BitCursor::new(payload).read_bytes(3)?;
    Ok(TagKind::SetBackgroundColor { rgb: [b[0], b[1], b[2]] })
}

fn frame_label(_: &mut Ctx<'_>, _: TagId, payload: &[u8]) -> Result<TagKind, MovieError> {
    Ok(TagKind::FrameLabel { name: BitCursor::new(payload).read_cstring()? })
}

fn remove_object2(_: &mut Ctx<'_>, _: TagId, payload: &[u8]) -> Result<TagKind, MovieError> {
    Ok(TagKind::RemoveObject2 { depth: BitCursor::new(payload).read_u16()? })
}

fn font_name(_: &mut Ctx<'_>, _: TagId, payload: &[u8]) -> Result<TagKind, MovieError> {
    Ok(TagKind::DefineFontName { font_id: BitCursor::new(payload).read_u16()? })
}

fn place_object2(_: &mut Ctx<'_>, _: TagId, payload: &[u8]) -> Result<TagKind, MovieError> {
    Ok(TagKind::PlaceObject2(PlaceObject2::parse(payload)?))
}

fn definition(ctx: &mut Ctx<'_>, id: TagId, payload: &[u8]) -> Result<TagKind, MovieError> {
    let character_id = BitCursor::new(payload).read_u16()?;
    let c = ctx.arena[id].code;
    Ok(TagKind::Definition(Definition {
        character_id,
        hash: ContentHash::of_definition(payload),
        image: ImageHeader::parse(c, payload)?,
    }))
}

fn sprite(ctx: &mut Ctx<'_>, id: TagId, payload: &[u8]) -> Result<TagKind, MovieError> {
    let mut c = BitCursor::new(payload);
    let character_id = c.read_u16()?;
    let frame_count = c.read_u16()?;
    if ctx.nesting >= MAX_NESTING {
        return Err(MovieError::Format(format!("sprite {} nested deeper than {}", character_id, MAX_NESTING)));
    }
    ctx.nesting += 1;
    let parsed = parse_children(ctx, &payload[SPRITE_PREFIX..], Some(id));
    ctx.nesting -= 1;
    let (children, trailing) = parsed?;
    log::debug!("sprite {}: {} frames, {} tags", character_id, frame_count, children.len());
    Ok(TagKind::Sprite(Sprite {
        character_id,
        frame_count,
        hash: ContentHash::of_definition(payload),
        children,
        trailing,
    }))
}

/// Parse one tag stream into `arena`, parenting every tag to `parent`.
///
/// Returns the tag handles (End included when present) and any bytes after the End tag.
pub fn parse_stream(
    arena: &mut TagArena,
    data: &[u8],
    parent: Option<TagId>,
) -> Result<(Vec<TagId>, Vec<u8>), MovieError> {
    let mut ctx = Ctx { arena, nesting: 0 };
    parse_children(&mut ctx, data, parent)
}

fn parse_children(ctx: &mut Ctx<'_>, data: &[u8], parent: Option<TagId>) -> Result<(Vec<TagId>, Vec<u8>), MovieError> {
    let mut cur = BitCursor::new(data);
    let mut ids = Vec::new();
    loop {
        if cur.remaining() == 0 {
            log::warn!("tag stream ended without an End tag after {} tags", ids.len());
            return Ok((ids, Vec::new()));
        }
        let word = cur.read_u16()?;
        let c = word >> 6;
        let short = (word & LONG_LENGTH as u16) as u32;
        let long_header = short == LONG_LENGTH;
        let length = if long_header { cur.read_u32()? } else { short };
        let payload = cur.read_bytes(length as usize)?;

        let id = ctx.arena.push(Tag::from_wire(c, length, long_header, Vec::new(), TagKind::Opaque), parent);
        let kind = match lookup(c) {
            Some((_, _, construct)) => construct(ctx, id, payload)?,
            None => {
                log::debug!("opaque tag {} ({} bytes)", c, length);
                TagKind::Opaque
            }
        };
        let kept = if matches!(kind, TagKind::Sprite(_)) { SPRITE_PREFIX } else { payload.len() };
        ctx.arena[id] = Tag::from_wire(c, length, long_header, payload[..kept].to_vec(), kind);
        ids.push(id);
        if c == code::END {
            let rest = data.get(cur.position()..).unwrap_or(&[]).to_vec();
            return Ok((ids, rest));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short(c: u16, payload: &[u8]) -> Vec<u8> {
        let mut v = ((c << 6) | payload.len() as u16).to_le_bytes().to_vec();
        v.extend_from_slice(payload);
        v
    }

    #[test]
    fn unknown_codes_are_opaque() {
        let mut data = short(777, &[1, 2, 3]);
        data.extend(short(code::END, &[]));
        let mut arena = TagArena::new();
        let (ids, rest) = parse_stream(&mut arena, &data, None).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(arena[ids[0]].kind, TagKind::Opaque);
        assert_eq!(arena[ids[0]].payload(), &[1, 2, 3]);
        assert!(rest.is_empty());
    }

    #[test]
    fn sprite_children_point_at_sprite() {
        let mut inner = short(code::SHOW_FRAME, &[]);
        inner.extend(short(code::END, &[]));
        let mut payload = vec![4, 0, 1, 0];
        payload.extend(&inner);
        let mut data = short(code::DEFINE_SPRITE, &payload);
        data.extend(short(code::END, &[]));

        let mut arena = TagArena::new();
        let (ids, _) = parse_stream(&mut arena, &data, None).unwrap();
        let s = arena[ids[0]].sprite().unwrap();
        assert_eq!(s.character_id, 4);
        assert_eq!(s.children.len(), 2);
        assert_eq!(arena.parent(s.children[0]), Some(ids[0]));
        assert_eq!(arena[ids[0]].payload().len(), SPRITE_PREFIX);
        assert_eq!(arena[ids[0]].length() as usize, payload.len());
    }

    #[test]
    fn long_header_is_remembered() {
        let mut data = ((code::DO_ACTION << 6) | 0x3f).to_le_bytes().to_vec();
        data.extend(2u32.to_le_bytes());
        data.extend([0, 0]);
        let mut arena = TagArena::new();
        let (ids, _) = parse_stream(&mut arena, &data, None).unwrap();
        assert!(arena[ids[0]].long_header());
        assert_eq!(arena[ids[0]].header_len(), 6);
    }

    #[test]
    fn truncated_payload_underruns() {
        let data = ((code::SHOW_FRAME << 6) | 5).to_le_bytes().to_vec();
        let mut arena = TagArena::new();
        assert!(matches!(parse_stream(&mut arena, &data, None), Err(MovieError::Underrun { .. })));
    }

    #[test]
    fn names() {
        assert_eq!(tag_name(39), "DefineSprite");
        assert_eq!(tag_name(1000), "Unknown");
    }
}
