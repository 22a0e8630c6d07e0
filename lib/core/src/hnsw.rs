use crate::item::ItemId;
use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// HNSW build and search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Links per node on upper layers; layer 0 allows twice as many
    pub max_connections: usize,
    pub max_layers: usize,
    pub ef_construction: usize,
    /// Beam width at query time; raised to the requested result count if lower
    pub ef_search: usize,
    /// Seed for level assignment, so identical inserts build identical graphs
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            max_layers: 6,
            ef_construction: 200,
            ef_search: 64,
            seed: 0x5eed,
        }
    }
}

/// Bitset of visited node indices, one per search
struct VisitedSet {
    bits: Vec<u64>,
}

impl VisitedSet {
    #[inline]
    fn new(capacity: usize) -> Self {
        Self {
            bits: vec![0; (capacity + 63) / 64],
        }
    }

    /// Returns true if `idx` was not yet visited
    #[inline]
    fn insert(&mut self, idx: usize) -> bool {
        let word = idx / 64;
        let mask = 1u64 << (idx % 64);
        if word >= self.bits.len() {
            self.bits.resize(word + 1, 0);
        }
        let fresh = self.bits[word] & mask == 0;
        self.bits[word] |= mask;
        fresh
    }
}

/// Closest-first heap entry
#[derive(Clone, Copy)]
struct Candidate {
    idx: usize,
    dist: f32,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Furthest-first heap entry
#[derive(Clone, Copy)]
struct Furthest {
    idx: usize,
    dist: f32,
}

impl PartialEq for Furthest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Furthest {}

impl Ord for Furthest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.idx.cmp(&other.idx))
    }
}

impl PartialOrd for Furthest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

type Links = SmallVec<[usize; 16]>;

#[derive(Debug, Clone)]
struct HnswNode {
    id: ItemId,
    layers: Vec<Links>,
}

/// HNSW approximate nearest neighbour index over unit vectors.
///
/// Distance is `1 - dot`, so results map straight back to cosine scores.
/// Vectors live in one contiguous buffer for cache locality.
pub struct HnswIndex {
    config: HnswConfig,
    nodes: Vec<HnswNode>,
    vectors: Vec<f32>,
    dim: usize,
    id_to_index: AHashMap<ItemId, usize>,
    entry_point: Option<usize>,
    top_layer: usize,
    rng: StdRng,
}

impl HnswIndex {
    pub fn new(dim: usize, config: HnswConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            nodes: Vec::new(),
            vectors: Vec::new(),
            dim,
            id_to_index: AHashMap::new(),
            entry_point: None,
            top_layer: 0,
            rng,
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.id_to_index.contains_key(id)
    }

    #[inline(always)]
    fn vector(&self, idx: usize) -> &[f32] {
        let start = idx * self.dim;
        &self.vectors[start..start + self.dim]
    }

    #[inline(always)]
    fn distance(&self, query: &[f32], idx: usize) -> f32 {
        1.0 - crate::simd::dot_product_simd(query, self.vector(idx))
    }

    #[inline]
    fn layer_capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.max_connections * 2
        } else {
            self.config.max_connections
        }
    }

    /// Geometric level assignment, p = 1/2 per extra layer
    fn select_layer(&mut self) -> usize {
        let mut layer = 0;
        while layer + 1 < self.config.max_layers && self.rng.random::<f32>() < 0.5 {
            layer += 1;
        }
        layer
    }

    /// Beam search on one layer; returns up to `ef` nodes closest first
    fn search_layer(&self, query: &[f32], entry_points: &[usize], ef: usize, layer: usize) -> Vec<(usize, f32)> {
        let mut visited = VisitedSet::new(self.nodes.len());
        let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
        let mut results: BinaryHeap<Furthest> = BinaryHeap::with_capacity(ef + 1);

        for &ep in entry_points {
            if visited.insert(ep) {
                let dist = self.distance(query, ep);
                candidates.push(Candidate { idx: ep, dist });
                results.push(Furthest { idx: ep, dist });
            }
        }
        while results.len() > ef {
            results.pop();
        }

        while let Some(current) = candidates.pop() {
            let worst = results.peek().map(|f| f.dist).unwrap_or(f32::INFINITY);
            if results.len() >= ef && current.dist > worst {
                break;
            }

            let Some(links) = self.nodes[current.idx].layers.get(layer) else {
                continue;
            };
            for &neighbor in links {
                if !visited.insert(neighbor) {
                    continue;
                }
                let dist = self.distance(query, neighbor);
                let worst = results.peek().map(|f| f.dist).unwrap_or(f32::INFINITY);
                if results.len() < ef || dist < worst {
                    candidates.push(Candidate { idx: neighbor, dist });
                    results.push(Furthest { idx: neighbor, dist });
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        let mut found: Vec<(usize, f32)> = results.into_iter().map(|f| (f.idx, f.dist)).collect();
        found.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        found
    }

    /// Greedy descent from the top layer down to (not including) `target`
    fn descend(&self, query: &[f32], target: usize) -> usize {
        let mut ep = match self.entry_point {
            Some(ep) => ep,
            None => return 0,
        };
        let mut layer = self.top_layer;
        while layer > target {
            if let Some(&(closest, _)) = self.search_layer(query, &[ep], 1, layer).first() {
                ep = closest;
            }
            layer -= 1;
        }
        ep
    }

    /// Insert a vector. Re-inserting an existing id overwrites its vector in
    /// place and keeps its links.
    pub fn insert(&mut self, id: ItemId, vector: &[f32]) {
        debug_assert_eq!(vector.len(), self.dim);
        if let Some(&idx) = self.id_to_index.get(&id) {
            let start = idx * self.dim;
            self.vectors[start..start + self.dim].copy_from_slice(vector);
            return;
        }

        let level = self.select_layer();
        let idx = self.nodes.len();
        self.vectors.extend_from_slice(vector);
        self.nodes.push(HnswNode {
            id: id.clone(),
            layers: vec![Links::new(); level + 1],
        });
        self.id_to_index.insert(id, idx);

        if self.entry_point.is_none() {
            self.entry_point = Some(idx);
            self.top_layer = level;
            return;
        }

        let mut entry = vec![self.descend(vector, level)];
        for layer in (0..=level.min(self.top_layer)).rev() {
            let found = self.search_layer(vector, &entry, self.config.ef_construction, layer);
            let neighbors: Links = found
                .iter()
                .filter(|(n, _)| *n != idx)
                .take(self.config.max_connections)
                .map(|(n, _)| *n)
                .collect();

            for &neighbor in &neighbors {
                self.link(neighbor, idx, layer);
            }
            self.nodes[idx].layers[layer] = neighbors;
            entry = found.into_iter().map(|(n, _)| n).collect();
        }

        if level > self.top_layer {
            self.top_layer = level;
            self.entry_point = Some(idx);
        }
    }

    /// Add a back link, pruning the neighbour's list to its closest links
    fn link(&mut self, from: usize, to: usize, layer: usize) {
        let capacity = self.layer_capacity(layer);
        if layer >= self.nodes[from].layers.len() {
            return;
        }
        self.nodes[from].layers[layer].push(to);
        if self.nodes[from].layers[layer].len() <= capacity {
            return;
        }

        let base = self.vector(from).to_vec();
        let mut links: Vec<(usize, f32)> = self.nodes[from].layers[layer]
            .iter()
            .map(|&n| (n, self.distance(&base, n)))
            .collect();
        links.sort_unstable_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        links.truncate(capacity);
        self.nodes[from].layers[layer] = links.into_iter().map(|(n, _)| n).collect();
    }

    /// Up to `ef` candidates (at least `k`) as `(id, score)` with score = dot
    /// product, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(ItemId, f32)> {
        if self.nodes.is_empty() || query.len() != self.dim || k == 0 {
            return Vec::new();
        }
        let ef = self.config.ef_search.max(k);
        let ep = self.descend(query, 0);
        self.search_layer(query, &[ep], ef, 0)
            .into_iter()
            .map(|(idx, dist)| (self.nodes[idx].id.clone(), 1.0 - dist))
            .collect()
    }
}
