//! # tastevec
//!
//! Content-based recommendations over an item catalog. Items are turned into
//! TF-IDF vectors, a handful of selected items are combined into a preference
//! vector, and the rest of the catalog is ranked by cosine similarity to it.
//!
//! ## As a Library
//!
//! ```rust,no_run
//! use tastevec::prelude::*;
//!
//! let catalog: Catalog = [
//!     Item::new(1u64, "Alien").with_categories(["Horror", "Science Fiction"]),
//!     Item::new(2u64, "Aliens").with_categories(["Action", "Science Fiction"]),
//!     Item::new(3u64, "Before Sunrise").with_categories(["Romance"]),
//! ]
//! .into_iter()
//! .collect();
//!
//! let engine = Engine::open("./data", EngineConfig::default())?;
//! engine.fit_model(&catalog)?;
//!
//! let result = engine.recommend(&[ItemId::Integer(1)], 10, &catalog)?;
//! for r in result.recommendations {
//!     println!("{} {}%", r.item_id, r.similarity_percent);
//! }
//! # Ok::<(), tastevec::Error>(())
//! ```
//!
//! ## Crate Structure
//!
//! - `tastevec-core` - text composition, TF-IDF model, vectors, vector store, HNSW
//! - `tastevec-storage` - model file and LMDB vector persistence
//! - `tastevec-engine` - model registry, aggregation, recommendation

pub use tastevec_core::{
    encode_item, Document, Error, Item, ItemId, ModelConfig, Result, ScoredItem, Signal,
    StoreConfig, TextComposer, Vector, VectorModel, VectorStore,
};

pub use tastevec_storage::StorageManager;

pub use tastevec_engine::{
    similarity_percent, AggregationPolicy, Catalog, Engine, EngineConfig, EnsureReport,
    FitReport, ItemSource, Recommendation, Recommendations, Stats,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Catalog, Engine, EngineConfig, Error, Item, ItemId, ItemSource, ModelConfig,
        Recommendation, Recommendations, Result, Vector,
    };
}

/// SIMD-optimized vector operations
pub mod simd {
    pub use tastevec_core::simd::{dot_product_simd, norm_simd};
}
