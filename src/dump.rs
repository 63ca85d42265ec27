//! Human-readable listings of a document: the tag tree and the set of codes in use.

use crate::arena::TagId;
use crate::document::Document;
use crate::parser::tag_name;
use crate::tag::TagKind;
use std::collections::BTreeSet;

/// Bytes shown before a payload preview is cut.
const PREVIEW: usize = 8;

/// One-line summary of a tag (no indentation).
pub fn tag_line(doc: &Document, id: TagId) -> String {
    let tag = doc.tag(id);
    let head = format!("{} ({}) len={}", tag_name(tag.code), tag.code, tag.length());
    match &tag.kind {
        TagKind::Definition(d) => format!("{} id={} hash={}", head, d.character_id, &d.hash.to_string()[..12]),
        TagKind::Sprite(s) => format!("{} id={} frames={} tags={}", head, s.character_id, s.frame_count, s.children.len()),
        TagKind::PlaceObject2(p) => {
            let mut line = format!("{} depth={}", head, p.depth);
            if let Some(t) = p.target_character_id {
                line.push_str(&format!(" target={}", t));
            }
            if let Some(n) = p.name() {
                line.push_str(&format!(" name={:?}", n));
            }
            line
        }
        TagKind::FrameLabel { name } => format!("{} {:?}", head, name),
        TagKind::RemoveObject2 { depth } => format!("{} depth={}", head, depth),
        TagKind::SetBackgroundColor { rgb } => format!("{} #{}", head, hex::encode(rgb)),
        TagKind::DefineFontName { font_id } => format!("{} font={}", head, font_id),
        TagKind::Opaque => {
            let p = tag.payload();
            let more = if p.len() > PREVIEW { " .." } else { "" };
            format!("{} [{}{}]", head, hex::encode(&p[..p.len().min(PREVIEW)]), more)
        }
        TagKind::Plain => head,
    }
}

/// Every tag, containers indented by nesting level.
pub fn tag_tree(doc: &Document) -> String {
    fn visit(doc: &Document, ids: &[TagId], indent: usize, lines: &mut Vec<String>) {
        for &id in ids {
            lines.push(format!("{}{}", "  ".repeat(indent), tag_line(doc, id)));
            visit(doc, doc.arena().children(id), indent + 1, lines);
        }
    }
    let mut lines = Vec::new();
    visit(doc, doc.tags(), 0, &mut lines);
    lines.join("\n")
}

/// `(code, name)` of every tag in the document, nested ones included, sorted by code.
pub fn used_tags(doc: &Document) -> Vec<(u16, &'static str)> {
    let codes: BTreeSet<u16> = doc.walk().into_iter().map(|id| doc.tag(id).code).collect();
    codes.into_iter().map(|c| (c, tag_name(c))).collect()
}
