//! Search-state key (`Vertex`) and parent-pointer table (`Links`),
//! transient for the lifetime of one A* run.

use crate::core::types::{Edge, Junction};
use rustc_hash::FxHashMap;

fn quantize(j: Junction) -> (i64, i64) {
    ((j.merc_x * 1000.0).round() as i64, (j.merc_y * 1000.0).round() as i64)
}

#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub junction: Junction,
    pub stage_start: Junction,
    pub stage_start_distance: f64,
    pub stage: usize,
    pub bearing_checked: bool,
}

impl Vertex {
    pub fn initial(source: Junction) -> Self {
        Self {
            junction: source,
            stage_start: source,
            stage_start_distance: 0.0,
            stage: 0,
            bearing_checked: false,
        }
    }

    fn key(&self) -> (i64, i64, i64, i64, usize, bool) {
        let (jx, jy) = quantize(self.junction);
        let (sx, sy) = quantize(self.stage_start);
        (jx, jy, sx, sy, self.stage, self.bearing_checked)
    }
}

impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for Vertex {}

impl std::hash::Hash for Vertex {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// `Vertex -> (parent Vertex, edge taken)`, one per A* run.
#[derive(Default)]
pub struct Links {
    parents: FxHashMap<Vertex, (Vertex, Edge)>,
}

impl Links {
    pub fn new() -> Self {
        Self {
            parents: FxHashMap::default(),
        }
    }

    pub fn set(&mut self, v: Vertex, parent: Vertex, edge: Edge) {
        self.parents.insert(v, (parent, edge));
    }

    pub fn parent_of(&self, v: &Vertex) -> Option<&(Vertex, Edge)> {
        self.parents.get(v)
    }

    /// Walks backward from `terminal` to the source, reversing into
    /// forward order, filtering out fake edges.
    pub fn reconstruct_path(&self, terminal: Vertex) -> Vec<Edge> {
        let mut edges = Vec::new();
        let mut current = terminal;
        while let Some((parent, edge)) = self.parent_of(&current) {
            edges.push(*edge);
            current = *parent;
        }
        edges.reverse();
        edges.into_iter().filter(|e| !e.is_fake).collect()
    }
}
