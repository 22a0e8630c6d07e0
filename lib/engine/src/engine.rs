use crate::aggregate::Aggregator;
use crate::config::EngineConfig;
use crate::registry::ModelRegistry;
use crate::source::ItemSource;
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tastevec_core::{
    encode_item, Error, Item, ItemId, Result, Signal, StoredVector, TextComposer, Vector,
    VectorModel, VectorStore,
};
use tastevec_storage::StorageManager;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Fitted,
}

/// Outcome of [`Engine::fit_model`]
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    pub status: FitStatus,
    pub model_version: u64,
    pub vocabulary_size: usize,
    pub documents: usize,
    /// Corpus items re-vectorized against the new model
    pub vectorized: usize,
    pub without_signal: usize,
    /// Items whose vector could not be persisted
    pub failed: usize,
}

/// Outcome of [`Engine::ensure_vector`]
#[derive(Debug, Clone, Serialize)]
pub struct EnsuredVector {
    pub item_id: ItemId,
    pub vector: Vector,
    pub signal: Signal,
    pub was_newly_created: bool,
}

/// Outcome of [`Engine::ensure_vectors`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnsureReport {
    pub total: usize,
    pub already_exists: usize,
    pub newly_created: usize,
    pub failed: usize,
    pub failed_ids: Vec<ItemId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_items: usize,
    pub vectorized_items: usize,
    /// Vectors produced by a model other than the active one
    pub stale_vectors: usize,
    pub ready_for_recommendation: bool,
    pub coverage_percent: f64,
    pub model_version: Option<u64>,
}

/// Vectorization and recommendation over one shared model and vector store.
///
/// Without a data directory everything lives in memory. With one, the model
/// record and every vector are written through to disk and restored on open.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) registry: ModelRegistry,
    pub(crate) store: VectorStore,
    pub(crate) aggregator: Box<dyn Aggregator>,
    storage: Option<Arc<StorageManager>>,
    /// Serializes refits; readers never take it
    fit_lock: Mutex<()>,
}

impl Engine {
    pub fn in_memory(config: EngineConfig) -> Self {
        let aggregator = config.aggregation.aggregator();
        Self {
            registry: ModelRegistry::new(),
            store: VectorStore::new(config.store.clone()),
            aggregator,
            storage: None,
            fit_lock: Mutex::new(()),
            config,
        }
    }

    /// Open (or create) a persistent engine rooted at `data_dir`
    pub fn open<P: AsRef<Path>>(data_dir: P, config: EngineConfig) -> Result<Self> {
        let storage = StorageManager::new(data_dir).map_err(|e| Error::Storage(e.to_string()))?;

        let registry = match storage
            .load_model()
            .map_err(|e| Error::Persistence(e.to_string()))?
        {
            Some(model) => {
                info!(
                    version = model.version(),
                    vocabulary = model.vocabulary_size(),
                    fitted_at = %model.fitted_at(),
                    "restored model"
                );
                ModelRegistry::with_model(model)
            }
            None => ModelRegistry::new(),
        };

        let store = VectorStore::new(config.store.clone());
        let records = storage
            .load_vectors()
            .map_err(|e| Error::Storage(e.to_string()))?;
        info!(vectors = records.len(), "restored vectors");
        store.extend(records);

        let aggregator = config.aggregation.aggregator();
        Ok(Self {
            registry,
            store,
            aggregator,
            storage: Some(Arc::new(storage)),
            fit_lock: Mutex::new(()),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Fit a new model on every item the source knows, make it active, and
    /// re-vectorize those items.
    ///
    /// On any fitting or model-persistence error the previous model stays
    /// active and no vector is touched.
    pub fn fit_model<S: ItemSource + ?Sized>(&self, source: &S) -> Result<FitReport> {
        let _guard = self.fit_lock.lock();

        let items = source.items();
        let composer = TextComposer::new(self.config.model.composer.clone());
        let corpus: Vec<_> = items.par_iter().map(|item| composer.compose(item)).collect();

        let model = VectorModel::fit(&corpus, &self.config.model)?
            .with_version(self.registry.next_version());

        if let Some(storage) = &self.storage {
            storage
                .save_model(&model)
                .map_err(|e| Error::Persistence(e.to_string()))?;
        }
        let model = self.registry.install(model);

        let outcomes: Vec<Result<Signal>> = items
            .par_iter()
            .map(|item| self.vectorize(item, &model).map(|(_, signal)| signal))
            .collect();

        let mut report = FitReport {
            status: FitStatus::Fitted,
            model_version: model.version(),
            vocabulary_size: model.vocabulary_size(),
            documents: items.len(),
            vectorized: 0,
            without_signal: 0,
            failed: 0,
        };
        for outcome in outcomes {
            match outcome {
                Ok(signal) => {
                    report.vectorized += 1;
                    if !signal.is_present() {
                        report.without_signal += 1;
                    }
                }
                Err(e) => {
                    warn!("failed to store vector during refit: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            version = report.model_version,
            vocabulary = report.vocabulary_size,
            vectorized = report.vectorized,
            without_signal = report.without_signal,
            failed = report.failed,
            "fit complete"
        );
        Ok(report)
    }

    /// Return the item's stored vector, creating it from the source if absent
    pub fn ensure_vector<S: ItemSource + ?Sized>(&self, item_id: &ItemId, source: &S) -> Result<EnsuredVector> {
        let model = self.registry.active()?;
        self.ensure_with(item_id, source, &model)
    }

    /// [`Engine::ensure_vector`] over many ids. Per-item failures are counted,
    /// not raised; an unfitted model still fails the whole call.
    pub fn ensure_vectors<S: ItemSource + ?Sized>(&self, item_ids: &[ItemId], source: &S) -> Result<EnsureReport> {
        let model = self.registry.active()?;
        let mut report = EnsureReport {
            total: item_ids.len(),
            ..Default::default()
        };

        for id in item_ids {
            match self.ensure_with(id, source, &model) {
                Ok(ensured) if ensured.was_newly_created => report.newly_created += 1,
                Ok(_) => report.already_exists += 1,
                Err(e) => {
                    warn!(item = %id, "could not ensure vector: {}", e);
                    report.failed += 1;
                    report.failed_ids.push(id.clone());
                }
            }
        }
        Ok(report)
    }

    /// Ensure against a model snapshot held for the whole request
    pub(crate) fn ensure_with<S: ItemSource + ?Sized>(
        &self,
        item_id: &ItemId,
        source: &S,
        model: &VectorModel,
    ) -> Result<EnsuredVector> {
        if let Some(record) = self.store.get(item_id) {
            if record.vector.dim() == model.dimension() {
                let signal = if record.vector.is_zero() {
                    Signal::NoSignal
                } else {
                    Signal::Present
                };
                return Ok(EnsuredVector {
                    item_id: record.item_id,
                    vector: record.vector,
                    signal,
                    was_newly_created: false,
                });
            }
            warn!(
                item = %item_id,
                stored = record.vector.dim(),
                expected = model.dimension(),
                "stored vector has wrong dimension, regenerating"
            );
        }

        let item = source
            .item(item_id)
            .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;
        let (vector, signal) = self.vectorize(&item, model)?;
        debug!(item = %item_id, ?signal, "vectorized on demand");

        Ok(EnsuredVector {
            item_id: item.id,
            vector,
            signal,
            was_newly_created: true,
        })
    }

    /// Encode an item, store it, and write it through to disk.
    ///
    /// A request still holding an older model snapshot can finish after a
    /// refit has already re-vectorized the same item; both the disk and the
    /// in-memory store then keep the newer record and this write is dropped.
    fn vectorize(&self, item: &Item, model: &VectorModel) -> Result<(Vector, Signal)> {
        let encoding = encode_item(item, model);
        let record = StoredVector::new(item.id.clone(), encoding.vector.clone(), model.version());

        let persisted = match &self.storage {
            Some(storage) => storage
                .save_vector(&record)
                .map_err(|e| Error::Storage(e.to_string()))?,
            None => true,
        };
        if !persisted || !self.store.put(record) {
            debug!(
                item = %item.id,
                version = model.version(),
                "superseded by a newer model, vector not stored"
            );
        }
        Ok((encoding.vector, encoding.signal))
    }

    /// Coverage of the vector store against a catalog of `total_items`
    pub fn stats(&self, total_items: usize) -> Stats {
        let vectorized_items = self.store.count();
        let model_version = self.registry.active().ok().map(|m| m.version());
        let stale_vectors = model_version
            .map(|v| self.store.count_stale(v))
            .unwrap_or(vectorized_items);
        let coverage_percent = if total_items > 0 {
            (vectorized_items as f64 / total_items as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Stats {
            total_items,
            vectorized_items,
            stale_vectors,
            ready_for_recommendation: model_version.is_some() && vectorized_items > 0,
            coverage_percent,
            model_version,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Catalog;
    use std::sync::Barrier;
    use tastevec_core::ModelConfig;

    fn catalog() -> Catalog {
        [
            Item::new(1, "Alien")
                .with_overview("A crew aboard a space ship meets a deadly alien")
                .with_categories(["Horror", "Science Fiction"])
                .with_keywords(["space", "alien"]),
            Item::new(2, "Aliens")
                .with_overview("Marines return to the alien planet")
                .with_categories(["Action", "Science Fiction"])
                .with_keywords(["alien", "marines"]),
            Item::new(3, "Before Sunrise")
                .with_overview("Two strangers spend a night walking through Vienna")
                .with_categories(["Romance"])
                .with_keywords(["train", "conversation"]),
            Item::new(4, "Untitled"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_unfitted_engine_rejects_ensure() {
        let engine = Engine::in_memory(EngineConfig::default());
        assert!(matches!(
            engine.ensure_vector(&ItemId::Integer(1), &catalog()),
            Err(Error::ModelNotFitted)
        ));
    }

    #[test]
    fn test_fit_vectorizes_corpus() {
        let engine = Engine::in_memory(EngineConfig::default());
        let report = engine.fit_model(&catalog()).unwrap();
        assert_eq!(report.status, FitStatus::Fitted);
        assert_eq!(report.model_version, 1);
        assert_eq!(report.documents, 4);
        assert_eq!(report.vectorized, 4);
        assert_eq!(report.without_signal, 1);
        assert_eq!(engine.store().count(), 4);

        for record in engine.store().iter() {
            assert!(record.vector.is_unit() || record.vector.is_zero());
            assert_eq!(record.vector.dim(), engine.config().model.dimension);
        }
    }

    #[test]
    fn test_failed_refit_keeps_previous_model() {
        let engine = Engine::in_memory(EngineConfig::default());
        engine.fit_model(&catalog()).unwrap();

        let empty = vec![Item::new(9, "Blank")];
        assert!(matches!(engine.fit_model(&empty), Err(Error::EmptyCorpus(_))));
        assert_eq!(engine.registry().version(), 1);
        assert_eq!(engine.store().count(), 4);
    }

    #[test]
    fn test_ensure_vector_creates_once() {
        let engine = Engine::in_memory(EngineConfig::default());
        let corpus: Vec<Item> = catalog().items().into_iter().take(3).collect();
        engine.fit_model(&corpus).unwrap();

        let extra = vec![Item::new(10, "Alien 3").with_overview("alien prison planet")];
        let first = engine.ensure_vector(&ItemId::Integer(10), &extra).unwrap();
        assert!(first.was_newly_created);
        assert_eq!(first.signal, Signal::Present);

        let second = engine.ensure_vector(&ItemId::Integer(10), &extra).unwrap();
        assert!(!second.was_newly_created);
        assert_eq!(first.vector, second.vector);

        assert!(matches!(
            engine.ensure_vector(&ItemId::Integer(99), &extra),
            Err(Error::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_ensure_vectors_report() {
        let engine = Engine::in_memory(EngineConfig::default());
        let corpus: Vec<Item> = catalog().items().into_iter().take(2).collect();
        engine.fit_model(&corpus).unwrap();

        let ids = [ItemId::Integer(1), ItemId::Integer(3), ItemId::Integer(42)];
        let report = engine.ensure_vectors(&ids, &catalog()).unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.already_exists, 1);
        assert_eq!(report.newly_created, 1);
        assert_eq!(report.failed_ids, vec![ItemId::Integer(42)]);
    }

    #[test]
    fn test_dimension_change_regenerates_on_demand() {
        let engine = Engine::in_memory(EngineConfig::default());
        let small = ModelConfig {
            dimension: 8,
            ..Default::default()
        };
        let composer = TextComposer::default();
        let docs: Vec<_> = catalog().items().iter().map(|i| composer.compose(i)).collect();
        let old = VectorModel::fit(&docs, &small).unwrap().with_version(1);
        engine.registry().install(old);
        engine.ensure_vector(&ItemId::Integer(1), &catalog()).unwrap();
        assert_eq!(engine.store().get(&ItemId::Integer(1)).unwrap().vector.dim(), 8);

        let current = VectorModel::fit(&docs, &ModelConfig::default()).unwrap().with_version(2);
        engine.registry().install(current);
        let ensured = engine.ensure_vector(&ItemId::Integer(1), &catalog()).unwrap();
        assert!(ensured.was_newly_created);
        assert_eq!(ensured.vector.dim(), 512);
    }

    #[test]
    fn test_stats() {
        let engine = Engine::in_memory(EngineConfig::default());
        let stats = engine.stats(3);
        assert!(!stats.ready_for_recommendation);
        assert_eq!(stats.model_version, None);

        let corpus: Vec<Item> = catalog().items().into_iter().take(3).collect();
        engine.fit_model(&corpus).unwrap();
        let stats = engine.stats(4);
        assert!(stats.ready_for_recommendation);
        assert_eq!(stats.vectorized_items, 3);
        assert_eq!(stats.stale_vectors, 0);
        assert_eq!(stats.coverage_percent, 75.0);
    }

    #[test]
    fn test_persistent_engine_restores_state() {
        let temp_dir = tempfile::tempdir().unwrap();
        {
            let engine = Engine::open(temp_dir.path(), EngineConfig::default()).unwrap();
            engine.fit_model(&catalog()).unwrap();
        }

        let engine = Engine::open(temp_dir.path(), EngineConfig::default()).unwrap();
        assert!(engine.registry().is_fitted());
        assert_eq!(engine.registry().version(), 1);
        assert_eq!(engine.store().count(), 4);

        let ensured = engine.ensure_vector(&ItemId::Integer(2), &Catalog::new()).unwrap();
        assert!(!ensured.was_newly_created);
    }

    /// Parks the first item lookup until the test releases it
    struct GatedSource {
        inner: Catalog,
        reached: Barrier,
        release: Barrier,
    }

    impl ItemSource for GatedSource {
        fn item(&self, id: &ItemId) -> Option<Item> {
            self.reached.wait();
            self.release.wait();
            self.inner.item(id)
        }

        fn items(&self) -> Vec<Item> {
            self.inner.items()
        }
    }

    fn sequel() -> Item {
        Item::new(5, "Alien 3")
            .with_overview("A prison planet and one more alien")
            .with_categories(["Science Fiction"])
    }

    #[test]
    fn test_late_write_from_older_model_is_dropped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut full = catalog();
        full.insert(sequel());
        let seed: Vec<Item> = catalog().items().into_iter().take(2).collect();

        {
            let engine = Engine::open(temp_dir.path(), EngineConfig::default()).unwrap();
            engine.fit_model(&seed).unwrap();

            let gated = GatedSource {
                inner: full.clone(),
                reached: Barrier::new(2),
                release: Barrier::new(2),
            };

            std::thread::scope(|s| {
                let request = s.spawn(|| engine.recommend(&[ItemId::Integer(5)], 3, &gated));

                // The request now holds model 1 and waits inside the lookup
                gated.reached.wait();
                let report = engine.fit_model(&full).unwrap();
                assert_eq!(report.model_version, 2);
                assert_eq!(report.vectorized, 5);
                gated.release.wait();

                let result = request.join().unwrap().unwrap();
                assert_eq!(result.diagnostics.newly_vectorized, 1);
            });

            let record = engine.store().get(&ItemId::Integer(5)).unwrap();
            assert_eq!(record.model_version, 2);
            assert_eq!(engine.stats(5).stale_vectors, 0);
        }

        let engine = Engine::open(temp_dir.path(), EngineConfig::default()).unwrap();
        let record = engine.store().get(&ItemId::Integer(5)).unwrap();
        assert_eq!(record.model_version, 2);
        assert_eq!(engine.stats(5).stale_vectors, 0);
    }

    #[test]
    fn test_readers_continue_during_refit() {
        let engine = Engine::in_memory(EngineConfig::default());
        let catalog = catalog();
        engine.fit_model(&catalog).unwrap();

        std::thread::scope(|s| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        for _ in 0..25 {
                            let result = engine.recommend(&[ItemId::Integer(1)], 3, &catalog).unwrap();
                            assert_eq!(result.recommendations[0].item_id, ItemId::Integer(2));
                        }
                    })
                })
                .collect();

            for _ in 0..5 {
                engine.fit_model(&catalog).unwrap();
            }
            for reader in readers {
                reader.join().unwrap();
            }
        });

        assert_eq!(engine.registry().version(), 6);
        assert_eq!(engine.stats(4).stale_vectors, 0);
    }

    #[test]
    fn test_concurrent_ensure_of_same_item() {
        let engine = Engine::in_memory(EngineConfig::default());
        let seed: Vec<Item> = catalog().items().into_iter().take(2).collect();
        engine.fit_model(&seed).unwrap();
        let extra = vec![sequel()];

        let vectors: Vec<Vector> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| engine.ensure_vector(&ItemId::Integer(5), &extra).unwrap().vector))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(vectors.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(engine.store().count(), 3);
        let record = engine.store().get(&ItemId::Integer(5)).unwrap();
        assert_eq!(record.vector, vectors[0]);
        assert_eq!(record.model_version, 1);
    }
}
