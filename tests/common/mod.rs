//! Synthetic movie builder shared by the integration tests. No binary fixtures: every
//! movie is assembled from raw tag bytes so the expected layout is visible in the test.

#![allow(dead_code)]

use movieclip::codec::EncodedRecord;
use movieclip::tag::code;
use movieclip::{Document, Matrix, PlaceObject2, Rect};

/// Raw tag: short header below 63 bytes, long header otherwise.
pub fn tag(c: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 6);
    if payload.len() < 63 {
        out.extend(((c << 6) | payload.len() as u16).to_le_bytes());
    } else {
        out.extend(((c << 6) | 0x3f).to_le_bytes());
        out.extend((payload.len() as u32).to_le_bytes());
    }
    out.extend_from_slice(payload);
    out
}

/// Raw tag always using the 6-byte header.
pub fn long_tag(c: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = ((c << 6) | 0x3f).to_le_bytes().to_vec();
    out.extend((payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

pub fn end() -> Vec<u8> {
    tag(code::END, &[])
}

pub fn show_frame() -> Vec<u8> {
    tag(code::SHOW_FRAME, &[])
}

/// DefineShape with an arbitrary body after the id.
pub fn shape(id: u16, body: &[u8]) -> Vec<u8> {
    let mut p = id.to_le_bytes().to_vec();
    p.extend_from_slice(body);
    tag(code::DEFINE_SHAPE, &p)
}

pub fn place(depth: u16, id: u16, name: Option<&str>) -> Vec<u8> {
    let mut p = PlaceObject2::new(depth, Some(id));
    if let Some(n) = name {
        p = p.with_name(n);
    }
    tag(code::PLACE_OBJECT2, &p.encode().expect("encode placement"))
}

pub fn place_with_matrix(depth: u16, id: u16, name: &str, translate: (i64, i64)) -> Vec<u8> {
    let mut p = PlaceObject2::new(depth, Some(id)).with_name(name);
    p.set_matrix(EncodedRecord::from_record(Matrix::generate(None, None, translate)).expect("matrix"));
    tag(code::PLACE_OBJECT2, &p.encode().expect("encode placement"))
}

/// DefineSprite holding `children` followed by an End tag.
pub fn sprite(id: u16, frames: u16, children: &[Vec<u8>]) -> Vec<u8> {
    let mut p = id.to_le_bytes().to_vec();
    p.extend(frames.to_le_bytes());
    for c in children {
        p.extend_from_slice(c);
    }
    p.extend(end());
    tag(code::DEFINE_SPRITE, &p)
}

pub fn stage() -> Rect {
    Rect::new(0, 11000, 0, 8000)
}

/// A complete uncompressed version-4 movie: header, `tags`, End.
pub fn movie(tags: &[Vec<u8>]) -> Vec<u8> {
    let rect = stage().to_record().encode().expect("rect");
    let mut body = rect;
    body.extend([0x00, 0x18]); // 24 fps
    body.extend(1u16.to_le_bytes());
    for t in tags {
        body.extend_from_slice(t);
    }
    body.extend(end());

    let mut out = b"FWS".to_vec();
    out.push(4);
    out.extend(((body.len() + 8) as u32).to_le_bytes());
    out.extend(body);
    out
}

/// Rock shape 1, white fish body 3, sprite 4 placing it. `slotA` and `slotB` both place 4.
pub fn tank() -> Vec<u8> {
    movie(&[
        shape(1, &[0xaa; 10]),
        shape(3, &[0x11; 12]),
        sprite(4, 1, &[place(1, 3, None), show_frame()]),
        place(1, 1, None),
        place_with_matrix(2, 4, "slotA", (200, 400)),
        place(3, 4, Some("slotB")),
        show_frame(),
    ])
}

/// Red fish: body 1, a rock identical to the tank's (2), fin sprite 3 placing the body,
/// and sprite 7 placing all three.
pub fn fish() -> Vec<u8> {
    movie(&[
        shape(1, &[0x22; 12]),
        shape(2, &[0xaa; 10]),
        sprite(3, 1, &[place(1, 1, None), show_frame()]),
        sprite(7, 2, &[place(1, 1, None), place(2, 2, None), place(3, 3, Some("fin")), show_frame(), show_frame()]),
        place(1, 7, Some("red_fish")),
        show_frame(),
    ])
}

pub fn load(bytes: &[u8]) -> Document {
    Document::parse(bytes).expect("parse")
}

/// File length header equals the emitted size, and every sprite's length equals the
/// size of what it contains.
pub fn assert_lengths(doc: &Document) {
    let bytes = doc.to_bytes().expect("emit");
    assert_eq!(doc.header.file_length as usize, bytes.len(), "file length header");
    for id in doc.walk() {
        let t = doc.tag(id);
        if t.is_container() {
            let total = doc.serialize_tag(id).expect("serialize").len();
            assert_eq!(t.length() as usize, total - t.header_len(), "sprite {:?}", t.character_id());
        }
    }
}

/// Top-level definitions carry pairwise distinct ids, all registered.
pub fn assert_unique_ids(doc: &Document) {
    let mut ids: Vec<u16> = doc.tags().iter().filter_map(|&t| doc.tag(t).character_id()).collect();
    let n = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), n, "duplicate character ids");
    assert_eq!(doc.table().len(), n);
    let next = doc.table().allocate_id().expect("allocate");
    assert!(!doc.table().contains(next));
}
