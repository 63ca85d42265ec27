//! Integration tests: load, round-trip emission, header handling, compression, snapshots,
//! parameter injection, image substitution and listings.

mod common;

use common::*;
use movieclip::tag::code;
use movieclip::{dump, Document, ImageReplacement, LoadOptions, MovieError, Rect, TagKind};
use std::io::Write;

/// Tags exercising every decoding path: unknown code, long header on a short payload,
/// placement with matrix + color transform + ratio + name + clip depth, frame label,
/// background color, font name, image definitions.
fn kitchen_sink() -> Vec<u8> {
    // flags: clip depth, name, ratio, cxform, matrix, character
    let mut po = vec![0b0111_1110, 0x02, 0x00, 0x09, 0x00];
    po.push(0x00); // MATRIX: no scale, no rotate, 0-bit translate
    po.push(0x00); // CXFORMWITHALPHA: no terms, nbits 0
    po.extend(7u16.to_le_bytes());
    po.extend(b"hero\0");
    po.extend(5u16.to_le_bytes());

    let mut lossless = 11u16.to_le_bytes().to_vec();
    lossless.extend([3, 2, 0, 2, 0, 1, 0x78, 0x9c, 0x00]);

    movie(&[
        tag(code::SET_BACKGROUND_COLOR, &[0xff, 0x80, 0x00]),
        tag(777, &[1, 2, 3, 4]),
        long_tag(code::DO_ACTION, &[0x00]),
        shape(9, &[0x5a; 70]),
        tag(code::DEFINE_BITS_LOSSLESS, &lossless),
        tag(code::DEFINE_FONT2, &[10, 0, 0, 0]),
        tag(code::DEFINE_FONT_NAME, &[10, 0, b'A', 0, 0]),
        sprite(12, 1, &[tag(code::FRAME_LABEL, b"intro\0"), tag(code::PLACE_OBJECT2, &po), show_frame()]),
        place(1, 12, Some("stage_clip")),
        show_frame(),
    ])
}

#[test]
fn test_round_trip_is_byte_identical() {
    for bytes in [tank(), fish(), kitchen_sink()] {
        let doc = load(&bytes);
        assert_eq!(doc.to_bytes().expect("emit"), bytes);
    }
}

#[test]
fn test_typed_fields() {
    let doc = load(&kitchen_sink());
    let kinds: Vec<&TagKind> = doc.tags().iter().map(|&t| &doc.tag(t).kind).collect();
    assert_eq!(kinds[0], &TagKind::SetBackgroundColor { rgb: [0xff, 0x80, 0x00] });
    assert_eq!(kinds[1], &TagKind::Opaque);
    assert!(doc.tag(doc.tags()[2]).long_header());
    assert_eq!(kinds[6], &TagKind::DefineFontName { font_id: 10 });

    let clip = doc.locate("stage_clip").expect("locate");
    let children = doc.arena().children(clip.sprite);
    assert_eq!(doc.tag(children[0]).kind, TagKind::FrameLabel { name: "intro".into() });
    let p = doc.tag(children[1]).placement().expect("placement");
    assert_eq!(p.target_character_id, Some(9));
    assert_eq!(p.ratio, Some(7));
    assert_eq!(p.clip_depth, Some(5));
    assert!(p.matrix.is_some() && p.color_transform.is_some());
    assert_eq!(p.name().as_deref(), Some("hero"));
}

#[test]
fn test_font_name_is_not_a_character() {
    let doc = load(&kitchen_sink());
    let ids: Vec<u16> = doc.table().ids().collect();
    assert_eq!(ids, vec![9, 10, 11, 12]);
    assert!(!doc.tag(doc.table().get(10).expect("font").tag).is_container());
}

#[test]
fn test_header_fields() {
    let doc = load(&tank());
    assert_eq!(doc.header.version, 4);
    assert!(!doc.header.compressed);
    assert_eq!(doc.header.frame_rate(), 24.0);
    assert_eq!(doc.width().expect("width"), 550.0);
    assert_eq!(doc.height().expect("height"), 400.0);
}

#[test]
fn test_bad_signature_and_version() {
    let mut bytes = tank();
    bytes[0] = b'X';
    assert!(matches!(Document::parse(&bytes), Err(MovieError::Format(_))));

    let mut bytes = tank();
    bytes[3] = 9;
    assert!(matches!(Document::parse(&bytes), Err(MovieError::Format(_))));
    let relaxed = LoadOptions { require_version: None };
    assert!(Document::parse_with(&bytes, &relaxed).is_ok());

    assert!(matches!(Document::parse(b"FWS"), Err(MovieError::Format(_))));
}

#[test]
fn test_truncated_file_fails_whole_parse() {
    let bytes = tank();
    let cut = &bytes[..bytes.len() - 20];
    assert!(matches!(Document::parse(cut), Err(MovieError::Underrun { .. })));
}

#[test]
fn test_unterminated_label_fails() {
    let bytes = movie(&[tag(code::FRAME_LABEL, b"no-nul")]);
    assert!(matches!(Document::parse(&bytes), Err(MovieError::UnterminatedString { .. })));
}

#[test]
fn test_trailing_bytes_survive() {
    let mut bytes = tank();
    bytes.extend([0xde, 0xad]);
    let len = bytes.len() as u32;
    bytes[4..8].copy_from_slice(&len.to_le_bytes());
    let doc = load(&bytes);
    assert_eq!(doc.to_bytes().expect("emit"), bytes);
}

#[test]
fn test_compressed_save_and_load() {
    let mut doc = load(&tank());
    doc.header.compressed = true;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tank_cws.swf");
    doc.save(&path).expect("save");

    let raw = std::fs::read(&path).expect("read");
    assert_eq!(&raw[..3], b"CWS");
    let back = Document::open(&path).expect("open");
    assert!(back.header.compressed);
    assert_eq!(back.header.file_length, doc.header.file_length);
    let mut plain = back.copy();
    plain.header.compressed = false;
    assert_eq!(plain.to_bytes().expect("emit"), tank());
}

#[test]
fn test_corrupt_zlib_is_a_format_error() {
    let mut f = tempfile::NamedTempFile::new().expect("tempfile");
    f.write_all(b"CWS\x04\x20\x00\x00\x00not zlib at all").expect("write");
    assert!(matches!(Document::open(f.path()), Err(MovieError::Format(_))));
}

#[test]
fn test_snapshot_restores_graph() {
    let doc = load(&kitchen_sink());
    let bytes = doc.serialize().expect("serialize");
    let back = Document::deserialize(&bytes).expect("deserialize");
    assert_eq!(back.to_bytes().expect("emit"), doc.to_bytes().expect("emit"));
    assert_eq!(back.table().ids().collect::<Vec<_>>(), doc.table().ids().collect::<Vec<_>>());
    assert_eq!(back.clip_names(), doc.clip_names());
}

#[test]
fn test_snapshot_version_is_checked() {
    let doc = load(&tank());
    let mut snap = doc.snapshot();
    snap.version = "MCV0".into();
    assert!(matches!(snap.restore(), Err(MovieError::Snapshot(_))));
    assert!(matches!(Document::deserialize(&[1, 2, 3]), Err(MovieError::Snapshot(_))));
}

#[test]
fn test_inject_params() {
    let mut doc = load(&tank());
    doc.inject_params(&[("a", "hoge"), ("lang", "ja")]);
    let bytes = doc.to_bytes().expect("emit");
    assert_eq!(doc.header.file_length as usize, bytes.len());

    let back = load(&bytes);
    let first = back.tag(back.tags()[0]);
    assert_eq!(first.code, code::DO_ACTION);
    assert!(first.long_header());
    assert_eq!(first.length() as usize, (1 + 4 + 11) + (4 + 2 + 11) + 1);
    assert_eq!(back.tags().len(), load(&tank()).tags().len() + 1);
}

#[test]
fn test_inject_params_uses_movie_encoding() {
    let mut doc = load(&tank());
    doc.inject_params(&[("b", "ふが")]);
    let bytes = doc.to_bytes().expect("emit");
    assert_eq!(doc.header.file_length as usize, bytes.len());

    let back = load(&bytes);
    let action = back.tag(back.tags()[0]);
    assert_eq!(&action.payload()[6..14], &[0x96, 6, 0, 0, 0x82, 0xd3, 0x82, 0xaa]);

    doc.header.version = 6;
    doc.refresh_file_length();
    let utf8 = doc.to_bytes().expect("emit");
    assert_eq!(utf8.len(), bytes.len() + 2);
    assert_eq!(doc.header.file_length as usize, utf8.len());
}

#[test]
fn test_replace_rect() {
    let mut doc = load(&tank());
    doc.replace_rect(Rect::new(0, 4800, 0, 6400)).expect("rect");
    assert_eq!(doc.width().expect("width"), 240.0);
    assert_lengths(&doc);
    let back = load(&doc.to_bytes().expect("emit"));
    assert_eq!(back.height().expect("height"), 320.0);
}

#[test]
fn test_replace_image() {
    let mut doc = load(&kitchen_sink());
    let (h, _) = doc.image(11).expect("image");
    assert_eq!((h.width, h.height), (Some(2), Some(2)));
    let before = doc.table().get(11).expect("entry").hash;

    let blob = vec![0x78, 0x9c, 1, 2, 3, 4, 5, 6, 7, 8];
    doc.replace_image(11, &ImageReplacement::lossless(5, 40, 30, blob.clone())).expect("replace");
    let (h, payload) = doc.image(11).expect("image");
    assert_eq!(h.format, Some(5));
    assert_eq!((h.width, h.height), (Some(40), Some(30)));
    assert_eq!(h.data(payload), &blob[..]);
    assert_ne!(doc.table().get(11).expect("entry").hash, before);
    assert_lengths(&doc);

    assert!(matches!(doc.replace_image(9, &ImageReplacement::jpeg(vec![])), Err(MovieError::Format(_))));
    assert!(doc.replace_image(99, &ImageReplacement::jpeg(vec![])).unwrap_err().is_not_found());
}

#[test]
fn test_replace_shape_keeps_id() {
    let mut tank = load(&tank());
    let fish = load(&fish());
    let red_body = fish.definition(1).expect("shape");
    let tag = tank.replace_shape(3, red_body).expect("replace");
    assert_eq!(tank.tag(tag).character_id(), Some(3));
    assert_eq!(tank.tag(tag).payload()[2..], [0x22; 12]);
    assert_eq!(tank.table().get(3).expect("entry").hash, fish.table().get(1).expect("entry").hash);
    assert_lengths(&tank);
}

#[test]
fn test_dump_listings() {
    let doc = load(&fish());
    let tree = dump::tag_tree(&doc);
    assert!(tree.contains("DefineSprite (39)"));
    assert!(tree.contains("  PlaceObject2 (26)"));
    assert!(tree.contains("name=\"red_fish\""));
    let used: Vec<u16> = dump::used_tags(&doc).into_iter().map(|(c, _)| c).collect();
    assert_eq!(used, vec![0, 1, 2, 26, 39]);

    let sink = dump::tag_tree(&load(&kitchen_sink()));
    assert!(sink.contains("(777) len=4 [01020304]"));
    assert!(sink.contains("#ff8000"));
}
