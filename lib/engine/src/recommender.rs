//! Multi-item recommendation: vectorize the selection on demand, aggregate,
//! rank the store.

use crate::engine::Engine;
use crate::source::ItemSource;
use serde::Serialize;
use std::collections::HashSet;
use tastevec_core::{Error, ItemId, Result, ScoredItem, Signal, Vector};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    /// Cosine similarity in [-1, 1]
    pub raw_score: f32,
    pub similarity_percent: u8,
}

impl From<ScoredItem> for Recommendation {
    fn from(scored: ScoredItem) -> Self {
        Self {
            similarity_percent: similarity_percent(scored.score),
            raw_score: scored.score,
            item_id: scored.item_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Selected items that had no stored vector before this request
    pub newly_vectorized: usize,
    pub items_without_signal: Vec<ItemId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Recommendations {
    pub recommendations: Vec<Recommendation>,
    pub diagnostics: Diagnostics,
}

/// Map a cosine score onto 0..=100. Scores outside [-1, 1] from float drift
/// are clamped first.
pub fn similarity_percent(score: f32) -> u8 {
    let clamped = f64::from(score.clamp(-1.0, 1.0));
    ((clamped + 1.0) * 50.0).round() as u8
}

impl Engine {
    /// Rank stored items by similarity to the combined taste of `item_ids`.
    ///
    /// Selected items without a vector are vectorized from `source` first.
    /// The selection itself never appears in the result.
    pub fn recommend<S: ItemSource + ?Sized>(
        &self,
        item_ids: &[ItemId],
        limit: usize,
        source: &S,
    ) -> Result<Recommendations> {
        if item_ids.is_empty() {
            return Err(Error::Validation("at least one item id is required".to_string()));
        }
        if limit == 0 {
            return Err(Error::Validation("limit must be positive".to_string()));
        }
        let model = self.registry.active()?;

        let mut seen = HashSet::with_capacity(item_ids.len());
        let selection: Vec<&ItemId> = item_ids.iter().filter(|id| seen.insert(*id)).collect();

        let mut diagnostics = Diagnostics::default();
        let mut vectors = Vec::with_capacity(selection.len());
        for id in &selection {
            let ensured = self.ensure_with(id, source, &model)?;
            if ensured.was_newly_created {
                diagnostics.newly_vectorized += 1;
            }
            match ensured.signal {
                Signal::Present => vectors.push(ensured.vector),
                Signal::NoSignal => diagnostics.items_without_signal.push(ensured.item_id),
            }
        }

        if vectors.is_empty() {
            return Err(Error::InsufficientSignal(selection.len()));
        }

        let refs: Vec<&Vector> = vectors.iter().collect();
        let query = self.aggregator.aggregate(&refs);
        if query.is_zero() {
            return Err(Error::InsufficientSignal(selection.len()));
        }

        let recommendations: Vec<Recommendation> = self
            .store
            .query(&query, &seen.into_iter().cloned().collect(), limit)
            .into_iter()
            .map(Recommendation::from)
            .collect();

        info!(
            selected = selection.len(),
            newly_vectorized = diagnostics.newly_vectorized,
            without_signal = diagnostics.items_without_signal.len(),
            returned = recommendations.len(),
            "recommendation served"
        );
        Ok(Recommendations {
            recommendations,
            diagnostics,
        })
    }

    /// Nearest neighbours of one already-vectorized item
    pub fn similar_items(&self, item_id: &ItemId, limit: usize) -> Result<Vec<Recommendation>> {
        if limit == 0 {
            return Err(Error::Validation("limit must be positive".to_string()));
        }
        let model = self.registry.active()?;
        let record = self
            .store
            .get(item_id)
            .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;

        if record.vector.dim() != model.dimension() {
            return Err(Error::InvalidDimension {
                expected: model.dimension(),
                actual: record.vector.dim(),
            });
        }
        if record.vector.is_zero() {
            return Err(Error::InsufficientSignal(1));
        }

        let exclude = HashSet::from([item_id.clone()]);
        let results = self.store.query(&record.vector, &exclude, limit);
        debug!(item = %item_id, returned = results.len(), "similar items");
        Ok(results.into_iter().map(Recommendation::from).collect())
    }
}
