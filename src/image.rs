//! Image-definition payload layout and blob substitution.
//!
//! Pixel decoding is left to an external codec. This module only knows the fixed prefix
//! in front of the compressed blob:
//!
//! | code | tag | prefix after the id |
//! |------|-----|---------------------|
//! | 6    | DefineBits          | none |
//! | 21   | DefineBitsJPEG2     | none |
//! | 35   | DefineBitsJPEG3     | alpha data offset `u32` |
//! | 20   | DefineBitsLossless  | format `u8`, width `u16`, height `u16`, [color table size `u8` when format is 3] |
//! | 36   | DefineBitsLossless2 | as 20 |

use crate::bits::BitCursor;
use crate::document::Document;
use crate::error::MovieError;
use crate::tag::{code, ContentHash, TagKind};
use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

/// Lossless format carrying a color table.
pub const FORMAT_COLORMAPPED: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHeader {
    pub format: Option<u8>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub color_table_size: Option<u8>,
    pub alpha_offset: Option<u32>,
    /// Payload offset where the opaque blob starts.
    pub data_offset: usize,
}

pub fn is_image_code(c: u16) -> bool {
    matches!(
        c,
        code::DEFINE_BITS
            | code::DEFINE_BITS_JPEG2
            | code::DEFINE_BITS_JPEG3
            | code::DEFINE_BITS_LOSSLESS
            | code::DEFINE_BITS_LOSSLESS2
    )
}

fn is_lossless(c: u16) -> bool {
    c == code::DEFINE_BITS_LOSSLESS || c == code::DEFINE_BITS_LOSSLESS2
}

impl ImageHeader {
    /// `None` for codes that are not image definitions.
    pub fn parse(c: u16, payload: &[u8]) -> Result<Option<ImageHeader>, MovieError> {
        if !is_image_code(c) {
            return Ok(None);
        }
        let mut cur = BitCursor::new(payload);
        cur.read_u16()?;
        let mut h = ImageHeader {
            format: None,
            width: None,
            height: None,
            color_table_size: None,
            alpha_offset: None,
            data_offset: 2,
        };
        if c == code::DEFINE_BITS_JPEG3 {
            h.alpha_offset = Some(cur.read_u32()?);
        } else if is_lossless(c) {
            let format = cur.read_u8()?;
            h.format = Some(format);
            h.width = Some(cur.read_u16()?);
            h.height = Some(cur.read_u16()?);
            if format == FORMAT_COLORMAPPED {
                h.color_table_size = Some(cur.read_u8()?);
            }
        }
        h.data_offset = cur.position();
        Ok(Some(h))
    }

    pub fn data<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        payload.get(self.data_offset..).unwrap_or(&[])
    }
}

/// New content for an image definition, produced by the external codec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageReplacement {
    pub format: Option<u8>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub color_table_size: Option<u8>,
    pub data: Vec<u8>,
    /// DefineBitsJPEG3 only: alpha plane appended after `data`.
    pub alpha: Option<Vec<u8>>,
}

impl ImageReplacement {
    pub fn jpeg(data: Vec<u8>) -> Self {
        ImageReplacement { data, ..Default::default() }
    }

    pub fn lossless(format: u8, width: u16, height: u16, data: Vec<u8>) -> Self {
        ImageReplacement { format: Some(format), width: Some(width), height: Some(height), data, ..Default::default() }
    }

    /// Rebuild a full payload for tag `c` under `id`. Missing lossless dimensions fall
    /// back to `old`.
    fn payload(&self, c: u16, id: u16, old: &ImageHeader) -> Result<Vec<u8>, MovieError> {
        let mut out = Vec::with_capacity(self.data.len() + 8);
        out.write_u16::<LittleEndian>(id)?;
        if c == code::DEFINE_BITS_JPEG3 {
            let offset = u32::try_from(self.data.len())
                .map_err(|_| MovieError::Format("image data exceeds 4 GiB".to_string()))?;
            out.write_u32::<LittleEndian>(offset)?;
            out.extend_from_slice(&self.data);
            if let Some(alpha) = &self.alpha {
                out.extend_from_slice(alpha);
            }
            return Ok(out);
        }
        if is_lossless(c) {
            let format = self.format.or(old.format).unwrap_or(FORMAT_COLORMAPPED);
            out.write_u8(format)?;
            out.write_u16::<LittleEndian>(self.width.or(old.width).unwrap_or(0))?;
            out.write_u16::<LittleEndian>(self.height.or(old.height).unwrap_or(0))?;
            if format == FORMAT_COLORMAPPED {
                let size = self
                    .color_table_size
                    .or(old.color_table_size)
                    .ok_or_else(|| MovieError::Format("colormapped image without color table size".to_string()))?;
                out.write_u8(size)?;
            }
        }
        out.extend_from_slice(&self.data);
        Ok(out)
    }
}

impl Document {
    /// The header of image definition `id`, with its payload.
    pub fn image(&self, id: u16) -> Result<(&ImageHeader, &[u8]), MovieError> {
        let tag_id = self.table().get(id).map(|e| e.tag).ok_or(MovieError::CharacterNotFound(id))?;
        let tag = &self.arena()[tag_id];
        match &tag.kind {
            TagKind::Definition(d) => match &d.image {
                Some(h) => Ok((h, tag.payload())),
                None => Err(MovieError::Format(format!("character {} is not an image", id))),
            },
            _ => Err(MovieError::Format(format!("character {} is not an image", id))),
        }
    }

    /// Substitute the blob (and lossless dimensions) of image `id`, keeping its id and
    /// position. Length, content hash and file length follow.
    pub fn replace_image(&mut self, id: u16, replacement: &ImageReplacement) -> Result<(), MovieError> {
        let tag_id = self.table().get(id).map(|e| e.tag).ok_or(MovieError::CharacterNotFound(id))?;
        let (c, old) = {
            let (h, _) = self.image(id)?;
            (self.arena()[tag_id].code, h.clone())
        };
        let payload = replacement.payload(c, id, &old)?;
        let header = ImageHeader::parse(c, &payload)?;
        let tag = &mut self.arena_mut()[tag_id];
        tag.set_payload(payload);
        if let TagKind::Definition(d) = &mut tag.kind {
            d.image = header;
        }
        let hash = tag.content_hash().unwrap_or_else(|| ContentHash::of(&[]));
        self.table_mut().rehash(id, hash);
        log::info!("replaced image {} (code {})", id, c);
        self.relength_upward(tag_id)
    }
}
