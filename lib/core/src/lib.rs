//! # tastevec Core
//!
//! Core library for tastevec: everything needed to turn catalog items into
//! comparable TF-IDF vectors and rank them.
//!
//! - [`TextComposer`] - deterministic item -> token document pipeline
//! - [`VectorModel`] - fitted vocabulary and IDF weights, immutable once built
//! - [`transform`] - document -> fixed-dimension unit vector
//! - [`VectorStore`] - one vector per item, exact or HNSW similarity queries
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashSet;
//! use tastevec_core::{transform, ModelConfig, StoredVector, TextComposer, VectorModel, VectorStore};
//!
//! let composer = TextComposer::default();
//! let corpus: Vec<_> = ["a b c", "a a b", "c c c"]
//!     .iter()
//!     .map(|t| composer.document(t))
//!     .collect();
//! let model = VectorModel::fit(&corpus, &ModelConfig::default()).unwrap();
//!
//! let store = VectorStore::default();
//! for (id, doc) in corpus.iter().enumerate() {
//!     let encoding = transform(doc, &model);
//!     store.put(StoredVector::new((id as u64).into(), encoding.vector, model.version()));
//! }
//!
//! let query = transform(&composer.document("a b"), &model).vector;
//! let results = store.query(&query, &HashSet::new(), 2);
//! assert_eq!(results.len(), 2);
//! ```

pub mod error;
pub mod item;
pub mod text;
pub mod model;
pub mod vectorizer;
pub mod vector;
pub mod hnsw;
pub mod store;

/// SIMD-optimized vector operations
///
/// Provides hardware-accelerated dot products:
/// - AVX2/FMA on x86_64
/// - SSE on x86
/// - NEON on ARM64/Apple Silicon
pub mod simd;

pub use error::{Error, Result};
pub use item::{Item, ItemId};
pub use text::{ComposerConfig, Document, FieldWeights, TextComposer};
pub use model::{ModelConfig, VectorModel, DEFAULT_DIMENSION};
pub use vectorizer::{encode_item, transform, Encoding, Signal};
pub use vector::Vector;
pub use hnsw::{HnswConfig, HnswIndex};
pub use store::{IndexKind, ScoredItem, StoreConfig, StoredVector, VectorStore};
