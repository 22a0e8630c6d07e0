use crate::hnsw::{HnswConfig, HnswIndex};
use crate::item::ItemId;
use crate::vector::Vector;
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

type RecordMap = HashMap<ItemId, StoredVector, ahash::RandomState>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    /// Brute-force scan over every record
    #[default]
    Exact,
    /// HNSW approximate index, used once the store holds `exact_below` records
    Hnsw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub index: IndexKind,
    /// Stores smaller than this are always scanned exactly
    pub exact_below: usize,
    pub hnsw: HnswConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index: IndexKind::Exact,
            exact_below: 1_000,
            hnsw: HnswConfig::default(),
        }
    }
}

/// One live vector per item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVector {
    pub item_id: ItemId,
    pub vector: Vector,
    /// Version of the model that produced the vector
    pub model_version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StoredVector {
    pub fn new(item_id: ItemId, vector: Vector, model_version: u64) -> Self {
        Self {
            item_id,
            vector,
            model_version,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: ItemId,
    /// Dot product of two unit vectors, in `[-1, 1]`
    pub score: f32,
}

/// In-memory vector store keyed by item identity.
///
/// Scores are dot products, so callers are expected to store unit vectors
/// (or the zero vector). Records whose dimension differs from a query are
/// skipped by that query.
pub struct VectorStore {
    config: StoreConfig,
    records: Arc<RwLock<RecordMap>>,
    /// Lazily built; `None` means rebuild on the next approximate query
    hnsw: Arc<RwLock<Option<HnswIndex>>>,
}

impl VectorStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            records: Arc::new(RwLock::new(RecordMap::default())),
            hnsw: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn count(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Insert or replace the vector for an item. The previous record, if any,
    /// is discarded entirely unless it came from a newer model, in which case
    /// the write is dropped and `false` is returned.
    pub fn put(&self, record: StoredVector) -> bool {
        let mut records = self.records.write();

        if let Some(existing) = records.get(&record.item_id) {
            if existing.model_version > record.model_version {
                debug!(
                    item = %record.item_id,
                    stored = existing.model_version,
                    incoming = record.model_version,
                    "ignoring vector from an older model"
                );
                return false;
            }
        }

        if self.config.index == IndexKind::Hnsw {
            let mut hnsw = self.hnsw.write();
            let keep = match hnsw.as_mut() {
                Some(index)
                    if index.dim() == record.vector.dim() && !index.contains(&record.item_id) =>
                {
                    index.insert(record.item_id.clone(), record.vector.as_slice());
                    true
                }
                _ => false,
            };
            if !keep && hnsw.is_some() {
                debug!(item = %record.item_id, "invalidating HNSW index");
                *hnsw = None;
            }
        }

        records.insert(record.item_id.clone(), record);
        true
    }

    /// Bulk load, e.g. when restoring from disk
    pub fn extend<I: IntoIterator<Item = StoredVector>>(&self, iter: I) {
        let mut records = self.records.write();
        for record in iter {
            records.insert(record.item_id.clone(), record);
        }
        *self.hnsw.write() = None;
    }

    pub fn get(&self, id: &ItemId) -> Option<StoredVector> {
        self.records.read().get(id).cloned()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.records.read().contains_key(id)
    }

    /// Snapshot of all records
    pub fn iter(&self) -> Vec<StoredVector> {
        self.records.read().values().cloned().collect()
    }

    /// Number of records produced by a model version other than `version`
    pub fn count_stale(&self, version: u64) -> usize {
        self.records
            .read()
            .values()
            .filter(|r| r.model_version != version)
            .count()
    }

    /// Up to `limit` items most similar to `query`, best first, skipping
    /// `exclude`. Equal scores are ordered by ascending item id.
    pub fn query(&self, query: &Vector, exclude: &HashSet<ItemId>, limit: usize) -> Vec<ScoredItem> {
        if limit == 0 {
            return Vec::new();
        }
        let records = self.records.read();

        let use_hnsw = self.config.index == IndexKind::Hnsw && records.len() >= self.config.exact_below;
        let mut scored: Vec<ScoredItem> = if use_hnsw {
            self.approximate(&records, query, exclude, limit)
        } else {
            exact_scan(&records, query, exclude)
        };

        rank(&mut scored);
        scored.truncate(limit);
        scored
    }

    /// Reference ranking by full scan, regardless of the configured index
    pub fn query_exact(&self, query: &Vector, exclude: &HashSet<ItemId>, limit: usize) -> Vec<ScoredItem> {
        let records = self.records.read();
        let mut scored = exact_scan(&records, query, exclude);
        rank(&mut scored);
        scored.truncate(limit);
        scored
    }

    fn approximate(
        &self,
        records: &RecordMap,
        query: &Vector,
        exclude: &HashSet<ItemId>,
        limit: usize,
    ) -> Vec<ScoredItem> {
        let needs_build = match self.hnsw.read().as_ref() {
            Some(index) => index.dim() != query.dim(),
            None => true,
        };
        if needs_build {
            let mut hnsw = self.hnsw.write();
            let stale = hnsw.as_ref().map(|i| i.dim() != query.dim()).unwrap_or(true);
            if stale {
                *hnsw = Some(build_index(records, query.dim(), &self.config.hnsw));
            }
        }

        let hnsw = self.hnsw.read();
        let Some(index) = hnsw.as_ref() else {
            return Vec::new();
        };
        index
            .search(query.as_slice(), limit + exclude.len())
            .into_iter()
            .filter(|(id, _)| !exclude.contains(id))
            .map(|(item_id, score)| ScoredItem { item_id, score })
            .collect()
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

fn exact_scan(records: &RecordMap, query: &Vector, exclude: &HashSet<ItemId>) -> Vec<ScoredItem> {
    records
        .par_iter()
        .filter(|(id, record)| record.vector.dim() == query.dim() && !exclude.contains(*id))
        .map(|(id, record)| ScoredItem {
            item_id: id.clone(),
            score: record.vector.dot(query),
        })
        .collect()
}

/// Descending score, ascending id among equal scores
fn rank(scored: &mut [ScoredItem]) {
    scored.sort_unstable_by(|a, b| {
        OrderedFloat(b.score)
            .cmp(&OrderedFloat(a.score))
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
}

fn build_index(records: &RecordMap, dim: usize, config: &HnswConfig) -> HnswIndex {
    // Insertion order fixed by id so rebuilds are reproducible
    let mut matching: Vec<&StoredVector> = records.values().filter(|r| r.vector.dim() == dim).collect();
    matching.sort_unstable_by(|a, b| a.item_id.cmp(&b.item_id));

    let mut index = HnswIndex::new(dim, config.clone());
    for record in matching {
        index.insert(record.item_id.clone(), record.vector.as_slice());
    }
    debug!(nodes = index.len(), dim, "built HNSW index");
    index
}
