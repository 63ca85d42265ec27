//! Nesting-depth audit of movie clips.
//!
//! `depth(c) = 1 + max(depth(d))` over the containers `d` placed directly in `c`, and 1
//! for a container placing none. Depths are memoized per character id; a placement
//! cycle contributes nothing past the point it closes.

use crate::document::Document;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthReport {
    pub character_id: u16,
    pub depth: usize,
    /// Name of the first named placement referencing the clip.
    pub name: Option<String>,
}

impl DepthReport {
    pub fn label(&self) -> String {
        match &self.name {
            Some(n) => format!("ID: {} - \"{}\"", self.character_id, n),
            None => format!("ID: {}", self.character_id),
        }
    }
}

impl fmt::Display for DepthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = format!("Error: MovieClip : {}", self.label());
        write!(f, "{:<50} depth {}", prefix, self.depth)
    }
}

pub struct DepthChecker<'a> {
    doc: &'a Document,
    memo: HashMap<u16, usize>,
    visiting: HashSet<u16>,
}

impl<'a> DepthChecker<'a> {
    pub fn new(doc: &'a Document) -> Self {
        DepthChecker { doc, memo: HashMap::new(), visiting: HashSet::new() }
    }

    /// Depth of container `id`; 0 for ids that are not containers.
    pub fn depth_of(&mut self, id: u16) -> usize {
        if let Some(&d) = self.memo.get(&id) {
            return d;
        }
        let doc = self.doc;
        let Some(tag) = doc.table().get(id).filter(|e| e.container).map(|e| e.tag) else {
            return 0;
        };
        if !self.visiting.insert(id) {
            log::warn!("placement cycle through movie clip {}", id);
            return 0;
        }
        let deepest = doc.placed_ids(tag).into_iter().map(|c| self.depth_of(c)).max().unwrap_or(0);
        self.visiting.remove(&id);
        let d = deepest + 1;
        self.memo.insert(id, d);
        d
    }

    /// Every top-level container at or above `threshold`, by ascending id.
    pub fn over(&mut self, threshold: usize) -> Vec<DepthReport> {
        let ids: Vec<u16> = self.doc.table().iter().filter(|(_, e)| e.container).map(|(id, _)| id).collect();
        let mut names: HashMap<u16, String> = HashMap::new();
        for p in self.doc.placements() {
            if let Some(pl) = self.doc.tag(p).placement() {
                if let (Some(t), Some(n)) = (pl.target_character_id, pl.name()) {
                    if !n.is_empty() {
                        names.entry(t).or_insert_with(|| n.into_owned());
                    }
                }
            }
        }
        ids.into_iter()
            .filter_map(|id| {
                let depth = self.depth_of(id);
                (depth >= threshold).then(|| DepthReport { character_id: id, depth, name: names.get(&id).cloned() })
            })
            .collect()
    }
}

/// Containers of `doc` whose depth is at least `threshold`.
pub fn check_depth(doc: &Document, threshold: usize) -> Vec<DepthReport> {
    DepthChecker::new(doc).over(threshold)
}
