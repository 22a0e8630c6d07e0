//! # tastevec engine
//!
//! Model lifecycle, on-demand vectorization and recommendation on top of
//! `tastevec-core` and `tastevec-storage`.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod recommender;
pub mod registry;
pub mod source;

pub use aggregate::{AggregationPolicy, Aggregator, MaxPool, Mean};
pub use config::EngineConfig;
pub use engine::{EnsureReport, EnsuredVector, Engine, FitReport, FitStatus, Stats};
pub use recommender::{similarity_percent, Diagnostics, Recommendation, Recommendations};
pub use registry::{ModelRegistry, ModelState};
pub use source::{Catalog, ItemSource};
