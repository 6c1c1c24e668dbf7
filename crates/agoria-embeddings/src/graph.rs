//! Hierarchical Navigable Small World graph.
//!
//! A layered proximity graph (Malkov & Yashunin) used to answer approximate
//! k-nearest-neighbor queries over agent capability vectors in roughly
//! logarithmic time instead of scanning every known card. Layer 0 holds
//! every node; each higher layer holds an exponentially shrinking subset,
//! picked per-node by a biased coin flip at insertion time.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use rand::Rng;

use crate::metric::{DistanceMetric, Vector};

pub type NodeId = u64;

/// Hard cap on how many layers a single insertion can climb, regardless of
/// what the level distribution samples. Keeps pathological RNG draws from
/// producing an unbounded number of near-empty top layers.
const MAX_LEVEL: usize = 16;

#[derive(Clone, Debug)]
pub struct GraphNode {
    pub id: NodeId,
    pub vector: Vector,
    pub payload: Vec<u8>,
    pub neighbors: Vec<Vec<NodeId>>,
    pub deleted: bool,
}

impl GraphNode {
    fn new(id: NodeId, vector: Vector, payload: Vec<u8>, num_layers: usize) -> Self {
        Self {
            id,
            vector,
            payload,
            neighbors: vec![Vec::new(); num_layers],
            deleted: false,
        }
    }
}

/// Min-heap-by-distance wrapper (nearest candidate pops first).
#[derive(PartialEq)]
struct Near(f32, NodeId);
impl Eq for Near {}
impl Ord for Near {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for Near {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Max-heap-by-distance wrapper (farthest candidate pops first), used to
/// evict the worst member of a bounded result set.
#[derive(PartialEq)]
struct Far(f32, NodeId);
impl Eq for Far {}
impl Ord for Far {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for Far {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone)]
pub struct HnswGraph<M: DistanceMetric> {
    metric: M,
    nodes: BTreeMap<NodeId, GraphNode>,
    entry_point: Option<NodeId>,
    m: usize,
    m_max: usize,
    m_max0: usize,
    ef_construction: usize,
    level_mult: f64,
    next_id: NodeId,
    max_layer: usize,
}

impl<M: DistanceMetric> HnswGraph<M> {
    pub fn new(metric: M, m: usize, ef_construction: usize) -> Self {
        let m = m.max(2);
        Self {
            metric,
            nodes: BTreeMap::new(),
            entry_point: None,
            m,
            m_max: m,
            m_max0: m * 2,
            ef_construction: ef_construction.max(1),
            level_mult: 1.0 / (m as f64).ln(),
            next_id: 1,
            max_layer: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.values().filter(|n| !n.deleted).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn random_level(&self) -> usize {
        let mut rng = rand::thread_rng();
        let r: f64 = rng.gen_range(f64::EPSILON..1.0);
        ((-r.ln() * self.level_mult).floor() as usize).min(MAX_LEVEL)
    }

    fn dist(&self, a: &Vector, b: &Vector) -> f32 {
        self.metric.distance(a, b)
    }

    fn vector_of(&self, id: NodeId) -> &Vector {
        &self.nodes[&id].vector
    }

    /// Greedily walk from `entry` toward `query` at layer `layer`, returning
    /// the single closest node found (used on upper layers, where ef == 1).
    fn greedy_descend(&self, query: &Vector, entry: NodeId, layer: usize) -> NodeId {
        let mut curr = entry;
        let mut curr_dist = self.dist(query, self.vector_of(curr));
        loop {
            let mut moved = false;
            if let Some(node) = self.nodes.get(&curr) {
                if let Some(neighbors) = node.neighbors.get(layer) {
                    for &cand in neighbors {
                        let d = self.dist(query, self.vector_of(cand));
                        if d < curr_dist {
                            curr_dist = d;
                            curr = cand;
                            moved = true;
                        }
                    }
                }
            }
            if !moved {
                return curr;
            }
        }
    }

    /// Best-first search at `layer` starting from `entry_points`, maintaining
    /// a candidate frontier and a bounded (size `ef`) result set. Returns the
    /// result set sorted nearest-first.
    fn search_layer(
        &self,
        query: &Vector,
        entry_points: &[NodeId],
        ef: usize,
        layer: usize,
    ) -> Vec<(f32, NodeId)> {
        let mut visited: BTreeSet<NodeId> = entry_points.iter().copied().collect();
        let mut candidates: BinaryHeap<Near> = BinaryHeap::new();
        let mut found: BinaryHeap<Far> = BinaryHeap::new();

        for &ep in entry_points {
            let d = self.dist(query, self.vector_of(ep));
            candidates.push(Near(d, ep));
            found.push(Far(d, ep));
        }

        while let Some(Near(dist_c, c)) = candidates.pop() {
            let worst = found.peek().map(|Far(d, _)| *d).unwrap_or(f32::INFINITY);
            if dist_c > worst && found.len() >= ef {
                break;
            }
            if let Some(node) = self.nodes.get(&c) {
                if let Some(neighbors) = node.neighbors.get(layer) {
                    for &neighbor in neighbors {
                        if visited.insert(neighbor) {
                            let d = self.dist(query, self.vector_of(neighbor));
                            let worst = found.peek().map(|Far(d, _)| *d).unwrap_or(f32::INFINITY);
                            if found.len() < ef || d < worst {
                                candidates.push(Near(d, neighbor));
                                found.push(Far(d, neighbor));
                                if found.len() > ef {
                                    found.pop();
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut out: Vec<(f32, NodeId)> =
            found.into_sorted_vec().into_iter().map(|Far(d, id)| (d, id)).collect();
        out.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        out
    }

    /// Keep the closest `limit` candidates (simple heuristic selection —
    /// no diversification pass).
    fn select_neighbors(candidates: Vec<(f32, NodeId)>, limit: usize) -> Vec<NodeId> {
        candidates.into_iter().take(limit).map(|(_, id)| id).collect()
    }

    fn prune(&mut self, id: NodeId, layer: usize, cap: usize) {
        let query = self.nodes[&id].vector.clone();
        let node = self.nodes.get_mut(&id).unwrap();
        if node.neighbors[layer].len() <= cap {
            return;
        }
        let mut scored: Vec<(f32, NodeId)> = node.neighbors[layer]
            .iter()
            .map(|&n| (0.0, n))
            .collect();
        drop(node);
        for (d, n) in scored.iter_mut() {
            *d = self.dist(&query, self.vector_of(*n));
        }
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        let kept: Vec<NodeId> = scored.into_iter().take(cap).map(|(_, n)| n).collect();
        self.nodes.get_mut(&id).unwrap().neighbors[layer] = kept;
    }

    pub fn insert(&mut self, vector: Vector, payload: Vec<u8>) -> NodeId {
        let level = self.random_level();
        let id = self.next_id;
        self.next_id += 1;
        let mut node = GraphNode::new(id, vector.clone(), payload, level + 1);

        let Some(mut entry) = self.entry_point else {
            self.nodes.insert(id, node);
            self.entry_point = Some(id);
            self.max_layer = level;
            return id;
        };

        for l in ((level + 1)..=self.max_layer).rev() {
            entry = self.greedy_descend(&vector, entry, l);
        }

        let top = level.min(self.max_layer);
        let mut entries = vec![entry];
        for l in (0..=top).rev() {
            let cap = if l == 0 { self.m_max0 } else { self.m_max };
            let target_m = if l == 0 { self.m_max0 } else { self.m };
            let candidates = self.search_layer(&vector, &entries, self.ef_construction.max(target_m), l);
            let chosen = Self::select_neighbors(candidates.clone(), target_m);

            node.neighbors[l] = chosen.clone();
            for &neighbor in &chosen {
                if let Some(n) = self.nodes.get_mut(&neighbor) {
                    if l < n.neighbors.len() {
                        n.neighbors[l].push(id);
                    }
                }
            }
            for &neighbor in &chosen {
                self.prune(neighbor, l, cap);
            }

            entries = candidates.into_iter().map(|(_, nid)| nid).collect();
            if entries.is_empty() {
                entries = vec![entry];
            }
        }

        self.nodes.insert(id, node);

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(id);
        }

        id
    }

    /// Tombstone a node: it stops appearing in query results but its edges
    /// stay in place so the rest of the graph remains connected.
    pub fn delete(&mut self, id: NodeId) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.deleted = true;
                true
            }
            None => false,
        }
    }

    pub fn query(&self, vector: &Vector, k: usize) -> Vec<(NodeId, Vec<u8>, f32)> {
        let Some(entry) = self.entry_point else {
            return Vec::new();
        };
        if k == 0 {
            return Vec::new();
        }

        let mut curr = entry;
        for l in (1..=self.max_layer).rev() {
            curr = self.greedy_descend(vector, curr, l);
        }

        let ef = k.max(self.ef_construction);
        let candidates = self.search_layer(vector, &[curr], ef, 0);

        candidates
            .into_iter()
            .filter(|(_, id)| !self.nodes[id].deleted)
            .take(k)
            .map(|(d, id)| {
                let node = &self.nodes[&id];
                (id, node.payload.clone(), d)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Euclidean;

    fn v(xs: &[f32]) -> Vector {
        Vector(xs.to_vec())
    }

    #[test]
    fn insert_and_query_finds_nearest() {
        let mut g = HnswGraph::new(Euclidean, 8, 32);
        let a = g.insert(v(&[0.0, 0.0]), b"a".to_vec());
        let b = g.insert(v(&[10.0, 10.0]), b"b".to_vec());
        let _c = g.insert(v(&[0.1, 0.1]), b"c".to_vec());

        let results = g.query(&v(&[0.0, 0.0]), 2);
        assert_eq!(results.len(), 2);
        let ids: Vec<NodeId> = results.iter().map(|(id, _, _)| *id).collect();
        assert!(ids.contains(&a));
        assert!(!ids.contains(&b) || results.len() == 3);
    }

    #[test]
    fn deleted_node_excluded_from_results() {
        let mut g = HnswGraph::new(Euclidean, 8, 32);
        let a = g.insert(v(&[0.0, 0.0]), b"a".to_vec());
        let _b = g.insert(v(&[5.0, 5.0]), b"b".to_vec());

        assert!(g.delete(a));
        let results = g.query(&v(&[0.0, 0.0]), 5);
        assert!(results.iter().all(|(id, _, _)| *id != a));
    }

    #[test]
    fn empty_graph_returns_no_results() {
        let g: HnswGraph<Euclidean> = HnswGraph::new(Euclidean, 8, 32);
        assert!(g.query(&v(&[0.0, 0.0]), 3).is_empty());
    }

    #[test]
    fn len_excludes_tombstones() {
        let mut g = HnswGraph::new(Euclidean, 8, 32);
        let a = g.insert(v(&[0.0, 0.0]), b"a".to_vec());
        g.insert(v(&[1.0, 1.0]), b"b".to_vec());
        assert_eq!(g.len(), 2);
        g.delete(a);
        assert_eq!(g.len(), 1);
    }
}
