//! Movie-clip composition: locate, replace, delete and vanish.
//!
//! A [`MovieClip`] is a pair of handles into one document: the sprite and, when known,
//! the placement instantiating it. It owns nothing and is only meaningful for the
//! document that produced it.
//!
//! Every operation validates first and mutates second. `replace` resolves the target,
//! collects everything the replacement reaches and plans all ids before touching the
//! destination; copies are grafted into the arena (unreachable until spliced), so a
//! failure leaves the document as it was.

use crate::arena::TagId;
use crate::codec::EncodedRecord;
use crate::document::Document;
use crate::error::MovieError;
use crate::geometry::{pixel2twip, twip2pixel, Matrix};
use crate::table::TableEntry;
use crate::tag::ContentHash;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MovieClip {
    pub sprite: TagId,
    pub placement: Option<TagId>,
}

impl MovieClip {
    pub fn character_id(&self, doc: &Document) -> Option<u16> {
        doc.tag(self.sprite).character_id()
    }

    pub fn name(&self, doc: &Document) -> Option<String> {
        let p = self.placement?;
        doc.tag(p).placement()?.name().map(|n| n.into_owned())
    }

    fn matrix(&self, doc: &Document) -> Result<Matrix, MovieError> {
        let p = doc.resolve_placement(self)?;
        match doc.tag(p).placement().and_then(|p| p.matrix.as_ref()) {
            Some(m) => Matrix::from_record(&m.record),
            None => Ok(Matrix::default()),
        }
    }

    fn set_matrix(&self, doc: &mut Document, m: &Matrix) -> Result<(), MovieError> {
        let p = doc.resolve_placement(self)?;
        let encoded = EncodedRecord::from_record(m.to_record())?;
        doc.arena_mut()[p].edit_placement(|pl| pl.set_matrix(encoded))?;
        doc.relength_upward(p)
    }

    /// Translation in pixels.
    pub fn translate(&self, doc: &Document) -> Result<(f64, f64), MovieError> {
        let (x, y) = self.matrix(doc)?.translate;
        Ok((twip2pixel(x), twip2pixel(y)))
    }

    pub fn set_translate(&self, doc: &mut Document, x: f64, y: f64) -> Result<(), MovieError> {
        let mut m = self.matrix(doc)?;
        m.translate = (pixel2twip(x), pixel2twip(y));
        self.set_matrix(doc, &m)
    }

    pub fn scale(&self, doc: &Document) -> Result<Option<(f64, f64)>, MovieError> {
        Ok(self.matrix(doc)?.scale)
    }

    pub fn set_scale(&self, doc: &mut Document, x: f64, y: f64) -> Result<(), MovieError> {
        let mut m = self.matrix(doc)?;
        m.scale = Some((x, y));
        self.set_matrix(doc, &m)
    }

    pub fn rotate(&self, doc: &Document) -> Result<Option<(f64, f64)>, MovieError> {
        Ok(self.matrix(doc)?.rotate)
    }

    pub fn set_rotate(&self, doc: &mut Document, skew0: f64, skew1: f64) -> Result<(), MovieError> {
        let mut m = self.matrix(doc)?;
        m.rotate = Some((skew0, skew1));
        self.set_matrix(doc, &m)
    }

    pub fn depth(&self, doc: &Document) -> Result<u16, MovieError> {
        let p = doc.resolve_placement(self)?;
        doc.tag(p).placement().map(|p| p.depth).ok_or_else(|| not_a_placement(p))
    }

    pub fn set_depth(&self, doc: &mut Document, depth: u16) -> Result<(), MovieError> {
        let p = doc.resolve_placement(self)?;
        doc.arena_mut()[p].edit_placement(|pl| pl.depth = depth)?;
        doc.relength_upward(p)
    }

    /// Renames the placement; unnamed placements stay unnamed.
    pub fn set_name(&self, doc: &mut Document, name: &str) -> Result<(), MovieError> {
        let p = doc.resolve_placement(self)?;
        doc.arena_mut()[p].edit_placement(|pl| pl.set_name(name))?;
        doc.relength_upward(p)
    }
}

fn not_a_placement(id: TagId) -> MovieError {
    MovieError::Format(format!("tag #{} is not a placement", id.index()))
}

impl Document {
    /// `None` when `target` is defined but is not a sprite.
    fn clip_for(&self, placement: TagId, target: u16) -> Result<Option<MovieClip>, MovieError> {
        let entry = self.table().get(target).ok_or(MovieError::CharacterNotFound(target))?;
        Ok(entry.container.then_some(MovieClip { sprite: entry.tag, placement: Some(placement) }))
    }

    /// First of `candidates` named `name` that places a sprite. Placements of other
    /// characters are passed over; an unresolved target is the error only when nothing
    /// later matches.
    fn first_clip(&self, candidates: &[TagId], name: &str) -> Result<Option<MovieClip>, MovieError> {
        let mut unresolved = None;
        for &p in candidates {
            let Some(pl) = self.tag(p).placement() else { continue };
            let Some(target) = pl.target_character_id.filter(|_| pl.has_name(name)) else { continue };
            match self.clip_for(p, target) {
                Ok(Some(clip)) => return Ok(Some(clip)),
                Ok(None) => log::debug!("{}: character {} is not a movie clip", name, target),
                Err(e) => {
                    unresolved.get_or_insert(e);
                }
            }
        }
        unresolved.map_or(Ok(None), Err)
    }

    /// First sprite placement named `name` in document order (pre-order, top level first).
    pub fn locate(&self, name: &str) -> Result<MovieClip, MovieError> {
        self.first_clip(&self.placements(), name)?
            .ok_or_else(|| MovieError::ClipNotFound(name.to_string()))
    }

    /// The sprite placement named `child` directly inside the clip named `parent`.
    pub fn locate_in_parent(&self, parent: &str, child: &str) -> Result<MovieClip, MovieError> {
        let outer = self.locate(parent)?;
        self.first_clip(self.arena().children(outer.sprite), child)?
            .ok_or_else(|| MovieError::ClipNotFound(format!("{}/{}", parent, child)))
    }

    /// Names of every named placement, in document order.
    pub fn clip_names(&self) -> Vec<String> {
        self.placements()
            .into_iter()
            .filter_map(|p| self.tag(p).placement().and_then(|pl| pl.name()).map(|n| n.into_owned()))
            .collect()
    }

    /// Every top-level sprite as a clip without placement, by ascending id.
    pub fn movie_clips(&self) -> Vec<MovieClip> {
        self.table()
            .iter()
            .filter(|(_, e)| e.container)
            .map(|(_, e)| MovieClip { sprite: e.tag, placement: None })
            .collect()
    }

    /// First placement targeting character `id`.
    pub fn find_placement(&self, id: u16) -> Option<TagId> {
        self.placements()
            .into_iter()
            .find(|&p| self.tag(p).placement().and_then(|pl| pl.target_character_id) == Some(id))
    }

    /// The clip's placement, looked up by the sprite's id when the clip carries none.
    pub fn resolve_placement(&self, clip: &MovieClip) -> Result<TagId, MovieError> {
        if let Some(p) = clip.placement {
            return Ok(p);
        }
        let id = self.sprite_id(clip.sprite)?;
        self.find_placement(id).ok_or_else(|| MovieError::ClipNotFound(format!("ID: {}", id)))
    }

    fn sprite_id(&self, sprite: TagId) -> Result<u16, MovieError> {
        self.arena()
            .get(sprite)
            .and_then(|t| t.sprite())
            .map(|s| s.character_id)
            .ok_or_else(|| MovieError::Format(format!("tag #{} is not a movie clip", sprite.index())))
    }

    /// Definitions reachable from `root` through placements, grouped by nesting level
    /// (index 0 holds what `root` places directly). Each id appears once, at the first
    /// level it is met. Dangling references fail.
    fn collect_levels(&self, root: TagId) -> Result<Vec<Vec<u16>>, MovieError> {
        let mut seen: HashSet<u16> = self.tag(root).character_id().into_iter().collect();
        let mut levels = Vec::new();
        let mut frontier = vec![root];
        while !frontier.is_empty() {
            let mut level = Vec::new();
            let mut next = Vec::new();
            for c in frontier {
                for id in self.placed_ids(c) {
                    if !seen.insert(id) {
                        continue;
                    }
                    let e = self.table().get(id).ok_or(MovieError::CharacterNotFound(id))?;
                    if e.container {
                        next.push(e.tag);
                    }
                    level.push(id);
                }
            }
            if level.is_empty() {
                break;
            }
            levels.push(level);
            frontier = next;
        }
        Ok(levels)
    }

    /// Ids reachable from `root` (excluded) through placements. Dangling references are
    /// skipped.
    fn reachable_ids(&self, root: TagId) -> HashSet<u16> {
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(c) = stack.pop() {
            for id in self.placed_ids(c) {
                if !seen.insert(id) {
                    continue;
                }
                match self.table().get(id) {
                    Some(e) if e.container => stack.push(e.tag),
                    Some(_) => {}
                    None => log::warn!("placement references missing character {}", id),
                }
            }
        }
        seen
    }

    fn retarget_children(&mut self, container: TagId, mapping: &HashMap<u16, u16>) -> Result<(), MovieError> {
        let children = self.arena().children(container).to_vec();
        for c in children {
            let Some(old) = self.tag(c).placement().and_then(|p| p.target_character_id) else { continue };
            let new = *mapping.get(&old).ok_or(MovieError::CharacterNotFound(old))?;
            self.arena_mut()[c].edit_placement(|p| p.set_target_character_id(new))?;
        }
        Ok(())
    }

    fn register_tag(&mut self, id: u16, tag: TagId) {
        let t = self.tag(tag);
        let entry = TableEntry {
            tag,
            hash: t.content_hash().unwrap_or_else(|| ContentHash::of(&[])),
            container: t.is_container(),
        };
        self.table_mut().register(id, entry);
    }

    /// Put a copy of `replacement` (a clip of `src`) where `target` is, returning the
    /// new clip. The target placement keeps its name, depth and matrix and now points at
    /// the copy, which sits immediately before the old sprite.
    ///
    /// Definitions the copy needs are deduplicated against this document by content
    /// hash; the rest are imported under fresh ids, dependencies first, ahead of the copy.
    /// The old sprite stays in place (see [`replace_with_vanish`](Self::replace_with_vanish)).
    pub fn replace(&mut self, target: &MovieClip, src: &Document, replacement: &MovieClip) -> Result<MovieClip, MovieError> {
        // Validate.
        let old_id = self.sprite_id(target.sprite)?;
        let placement = self.resolve_placement(target)?;
        let index = self
            .top_level_index(target.sprite)
            .ok_or_else(|| MovieError::Format(format!("movie clip {} is not at top level", old_id)))?;
        let src_root_id = src.sprite_id(replacement.sprite)?;
        let levels = src.collect_levels(replacement.sprite)?;

        // Plan ids: the copy first, then every import in level order.
        let new_root_id = self.table().allocate_id()?;
        let mut next = new_root_id;
        let mut mapping: HashMap<u16, u16> = HashMap::from([(src_root_id, new_root_id)]);
        let mut pending: HashMap<ContentHash, u16> = HashMap::new();
        let mut imports: Vec<u16> = Vec::new();
        for &id in levels.iter().flatten() {
            let e = src.table().get(id).ok_or(MovieError::CharacterNotFound(id))?;
            let reused = self
                .table()
                .find_equivalent(&e.hash, e.container)
                .or_else(|| if e.container { None } else { pending.get(&e.hash).copied() });
            let dest = match reused {
                Some(d) => d,
                None => {
                    next = next.checked_add(1).ok_or(MovieError::TableExhausted)?;
                    imports.push(id);
                    if !e.container {
                        pending.insert(e.hash, next);
                    }
                    next
                }
            };
            mapping.insert(id, dest);
        }
        log::debug!("replace plan for {}: {:?}", old_id, mapping);

        // Copy into the arena, still detached from the document.
        let new_root = self.arena_mut().graft(src.arena(), replacement.sprite, None);
        self.arena_mut()[new_root].set_character_id(new_root_id)?;
        let mut grafted: HashMap<u16, TagId> = HashMap::new();
        for &id in &imports {
            let src_tag = src.table().get(id).ok_or(MovieError::CharacterNotFound(id))?.tag;
            let t = self.arena_mut().graft(src.arena(), src_tag, None);
            self.arena_mut()[t].set_character_id(mapping[&id])?;
            grafted.insert(id, t);
        }

        // Rewrite placements, deepest level first, then the copy itself.
        for level in levels.iter().rev() {
            for id in level {
                if let Some(&t) = grafted.get(id) {
                    if self.tag(t).is_container() {
                        self.retarget_children(t, &mapping)?;
                        self.relength(t)?;
                    }
                }
            }
        }
        self.retarget_children(new_root, &mapping)?;
        self.relength(new_root)?;

        // Splice: imports (dependencies first), then the copy, just before the old sprite.
        let order = src.dependency_order(replacement.sprite, &imports);
        let mut at = index;
        for id in &order {
            let t = grafted[id];
            self.insert_top_level(at, t);
            self.register_tag(mapping[id], t);
            at += 1;
        }
        self.insert_top_level(at, new_root);
        self.register_tag(new_root_id, new_root);

        self.arena_mut()[placement].edit_placement(|p| p.set_target_character_id(new_root_id))?;
        self.relength_upward(placement)?;
        log::info!(
            "replaced clip {} with {} ({} imported, {} reused)",
            old_id,
            new_root_id,
            imports.len(),
            mapping.len() - 1 - imports.len()
        );
        Ok(MovieClip { sprite: new_root, placement: Some(placement) })
    }

    /// Imports ordered so every definition precedes the containers placing it.
    fn dependency_order(&self, root: TagId, imports: &[u16]) -> Vec<u16> {
        fn visit(doc: &Document, c: TagId, wanted: &HashSet<u16>, done: &mut HashSet<u16>, out: &mut Vec<u16>) {
            for id in doc.placed_ids(c) {
                if !wanted.contains(&id) || !done.insert(id) {
                    continue;
                }
                if let Some(e) = doc.table().get(id) {
                    if e.container {
                        visit(doc, e.tag, wanted, done, out);
                    }
                }
                out.push(id);
            }
        }
        let wanted: HashSet<u16> = imports.iter().copied().collect();
        let mut done = HashSet::new();
        let mut out = Vec::with_capacity(imports.len());
        visit(self, root, &wanted, &mut done, &mut out);
        out.extend(imports.iter().filter(|id| !done.contains(id)));
        out
    }

    /// [`replace`](Self::replace), then remove the old sprite and whatever only it used.
    /// Definitions still placed by a surviving placement are kept.
    pub fn replace_with_vanish(&mut self, target: &MovieClip, src: &Document, replacement: &MovieClip) -> Result<MovieClip, MovieError> {
        let old = target.sprite;
        let old_id = self.sprite_id(old)?;
        let clip = self.replace(target, src, replacement)?;

        let mut remove: HashSet<u16> = self.reachable_ids(old);
        remove.insert(old_id);
        loop {
            let referenced = self.surviving_references(&remove);
            let retained: Vec<u16> = remove.iter().copied().filter(|id| referenced.contains(id)).collect();
            if retained.is_empty() {
                break;
            }
            for id in retained {
                remove.remove(&id);
            }
        }
        self.remove_definitions(&remove);
        Ok(clip)
    }

    /// Targets of placements at top level or inside containers not in `removed`.
    fn surviving_references(&self, removed: &HashSet<u16>) -> HashSet<u16> {
        let mut out = HashSet::new();
        for &t in self.tags() {
            let tag = self.tag(t);
            if let Some(id) = tag.placement().and_then(|p| p.target_character_id) {
                out.insert(id);
            }
            if let Some(s) = tag.sprite() {
                if !removed.contains(&s.character_id) {
                    out.extend(self.placed_ids(t));
                }
            }
        }
        out
    }

    fn remove_definitions(&mut self, ids: &HashSet<u16>) {
        let mut sorted: Vec<u16> = ids.iter().copied().collect();
        sorted.sort_unstable();
        for id in &sorted {
            if let Some(e) = self.table_mut().unregister(*id) {
                self.detach(e.tag);
            }
        }
        self.refresh_file_length();
        log::info!("vanished characters {:?}", sorted);
    }

    /// Remove the placement instantiating `clip`; its definitions stay.
    pub fn delete(&mut self, clip: &MovieClip) -> Result<(), MovieError> {
        let p = self.resolve_placement(clip)?;
        match self.detach(p) {
            Some(owner) => self.relength_upward(owner)?,
            None => self.refresh_file_length(),
        }
        log::info!("deleted placement of clip {:?}", clip.character_id(self));
        Ok(())
    }

    /// Remove the clip's sprite and every definition reachable from it, shared or not.
    /// Placements pointing at them are left alone.
    pub fn vanish(&mut self, clip: &MovieClip) -> Result<(), MovieError> {
        let id = self.sprite_id(clip.sprite)?;
        let mut remove = self.reachable_ids(clip.sprite);
        remove.insert(id);
        self.remove_definitions(&remove);
        Ok(())
    }
}
