//! Key/value parameters injected as a DoAction tag at the head of the tag stream.
//!
//! Each pair becomes `Push key; Push value; SetVariable`, and the action list ends with a
//! zero byte. The tag always uses the long header form.
//!
//! Players before version 6 read strings in the Japanese Windows code page (cp932), so
//! those movies get Shift_JIS bytes and characters it cannot represent are dropped.
//! Version 6 and later get UTF-8.

use crate::document::Document;
use crate::error::MovieError;
use crate::tag::{code, Tag, TagKind};
use byteorder::{LittleEndian, WriteBytesExt};
use encoding_rs::SHIFT_JIS;
use std::borrow::Cow;

pub const ACTION_PUSH: u8 = 0x96;
pub const ACTION_SET_VARIABLE: u8 = 0x1d;
pub const ACTION_END: u8 = 0x00;
/// Push value type for a null-terminated string.
pub const PUSH_STRING: u8 = 0x00;

/// Action bytes added per pair on top of the key and value: two push headers (3 bytes
/// each), two type bytes, two terminators, one SetVariable.
const PAIR_OVERHEAD: usize = 11;

/// First version whose players read action strings as UTF-8.
pub const UTF8_VERSION: u8 = 6;

/// String bytes as a movie of `version` expects them.
pub fn encode_string(s: &str, version: u8) -> Cow<'_, [u8]> {
    if version >= UTF8_VERSION {
        return Cow::Borrowed(s.as_bytes());
    }
    let (bytes, _, unmappable) = SHIFT_JIS.encode(s);
    if !unmappable {
        return bytes;
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut buf = [0u8; 4];
    for c in s.chars() {
        let (b, _, unmappable) = SHIFT_JIS.encode(c.encode_utf8(&mut buf));
        if unmappable {
            log::debug!("dropping {:?}: no Shift_JIS mapping", c);
        } else {
            out.extend_from_slice(&b);
        }
    }
    Cow::Owned(out)
}

fn push_string(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), MovieError> {
    let len = u16::try_from(bytes.len() + 2)
        .map_err(|_| MovieError::Format(format!("parameter of {} bytes is too long", bytes.len())))?;
    out.write_u8(ACTION_PUSH)?;
    out.write_u16::<LittleEndian>(len)?;
    out.write_u8(PUSH_STRING)?;
    out.extend_from_slice(bytes);
    out.write_u8(0)?;
    Ok(())
}

pub fn build_tag(params: &[(String, String)], version: u8) -> Result<Tag, MovieError> {
    let mut payload = Vec::with_capacity(tag_len(params, version));
    for (k, v) in params {
        push_string(&mut payload, &encode_string(k, version))?;
        push_string(&mut payload, &encode_string(v, version))?;
        payload.write_u8(ACTION_SET_VARIABLE)?;
    }
    payload.write_u8(ACTION_END)?;
    Ok(Tag::new(code::DO_ACTION, payload, TagKind::Plain).into_long_header())
}

/// Emitted size of the parameter tag, header included; 0 when there is nothing to inject.
pub fn tag_len(params: &[(String, String)], version: u8) -> usize {
    if params.is_empty() {
        return 0;
    }
    let pairs: usize = params
        .iter()
        .map(|(k, v)| encode_string(k, version).len() + encode_string(v, version).len() + PAIR_OVERHEAD)
        .sum();
    6 + pairs + 1
}

impl Document {
    /// Parameters to inject at emit time, replacing any earlier set.
    pub fn inject_params<K: AsRef<str>, V: AsRef<str>>(&mut self, params: &[(K, V)]) {
        self.params = params.iter().map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string())).collect();
        self.refresh_file_length();
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}
