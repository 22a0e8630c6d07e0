//! Fitting of the shared term-weighting model.

use crate::text::{ComposerConfig, Document, TextComposer};
use crate::{Error, Result};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Default vector dimension D
pub const DEFAULT_DIMENSION: usize = 512;

/// Parameters fixed at fit time and carried by the fitted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Length of every feature vector. Terms beyond this many are dropped,
    /// lowest weight first.
    pub dimension: usize,
    /// Inclusive n-gram range, `(1, 1)` for unigrams only
    pub ngram_range: (usize, usize),
    /// Minimum number of documents a term must occur in
    pub min_df: usize,
    /// Maximum fraction of documents a term may occur in
    pub max_df: f64,
    /// Use `1 + ln(tf)` instead of raw term counts
    pub sublinear_tf: bool,
    pub composer: ComposerConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_DIMENSION,
            ngram_range: (1, 1),
            min_df: 1,
            max_df: 1.0,
            sublinear_tf: false,
            composer: ComposerConfig::default(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidConfig("dimension must be positive".to_string()));
        }
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(Error::InvalidConfig(format!(
                "invalid n-gram range ({}, {})",
                min_n, max_n
            )));
        }
        if self.min_df == 0 {
            return Err(Error::InvalidConfig("min_df must be at least 1".to_string()));
        }
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "max_df must be in (0, 1], got {}",
                self.max_df
            )));
        }
        Ok(())
    }
}

/// A fitted, immutable vocabulary and IDF weight table.
///
/// `vocabulary[i]` owns dimension `i`; vocabulary terms are kept in lexical
/// order so refitting an identical corpus reproduces the same layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ModelRecord", into = "ModelRecord")]
pub struct VectorModel {
    version: u64,
    fitted_at: DateTime<Utc>,
    config: ModelConfig,
    vocabulary: Vec<String>,
    weights: Vec<f32>,
    index: AHashMap<String, usize>,
}

/// On-disk shape of a model; the lookup index is rebuilt on load
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModelRecord {
    version: u64,
    fitted_at: DateTime<Utc>,
    config: ModelConfig,
    vocabulary: Vec<String>,
    weights: Vec<f32>,
}

impl From<ModelRecord> for VectorModel {
    fn from(record: ModelRecord) -> Self {
        VectorModel::from_parts(
            record.version,
            record.fitted_at,
            record.config,
            record.vocabulary,
            record.weights,
        )
    }
}

impl From<VectorModel> for ModelRecord {
    fn from(model: VectorModel) -> Self {
        ModelRecord {
            version: model.version,
            fitted_at: model.fitted_at,
            config: model.config,
            vocabulary: model.vocabulary,
            weights: model.weights,
        }
    }
}

impl VectorModel {
    /// Fit a model on a corpus snapshot.
    ///
    /// Fails with [`Error::EmptyCorpus`] when no document has tokens, or when
    /// document-frequency pruning leaves no term.
    pub fn fit(corpus: &[Document], config: &ModelConfig) -> Result<Self> {
        config.validate()?;

        let non_empty = corpus.iter().filter(|d| !d.is_empty()).count();
        if non_empty == 0 {
            return Err(Error::EmptyCorpus(format!(
                "none of the {} documents contains any token",
                corpus.len()
            )));
        }

        let n_docs = corpus.len();
        let unique_terms: Vec<Vec<String>> = corpus
            .par_iter()
            .map(|doc| {
                let mut terms = doc.terms(config.ngram_range);
                terms.sort_unstable();
                terms.dedup();
                terms
            })
            .collect();

        let mut doc_freq: AHashMap<String, usize> = AHashMap::new();
        for terms in unique_terms {
            for term in terms {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }
        let distinct = doc_freq.len();

        // Slack absorbs decimal fractions that are not exact in binary, so a
        // term in exactly 70% of documents survives max_df = 0.7
        let max_doc_count = config.max_df * n_docs as f64 + 1e-9;
        let mut candidates: Vec<(String, f32)> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= config.min_df && *df as f64 <= max_doc_count)
            .map(|(term, df)| (term, smoothed_idf(n_docs, df)))
            .collect();

        if candidates.is_empty() {
            return Err(Error::EmptyCorpus(format!(
                "all {} distinct terms were pruned by min_df={} max_df={}",
                distinct, config.min_df, config.max_df
            )));
        }

        // Highest weight first, lexical order among equals
        candidates.sort_unstable_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        if candidates.len() > config.dimension {
            debug!(
                dropped = candidates.len() - config.dimension,
                dimension = config.dimension,
                "capping vocabulary"
            );
            candidates.truncate(config.dimension);
        }
        candidates.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        let (vocabulary, weights): (Vec<String>, Vec<f32>) = candidates.into_iter().unzip();

        info!(
            documents = n_docs,
            non_empty,
            distinct_terms = distinct,
            vocabulary = vocabulary.len(),
            dimension = config.dimension,
            "fitted vector model"
        );

        Ok(Self::from_parts(0, Utc::now(), config.clone(), vocabulary, weights))
    }

    fn from_parts(
        version: u64,
        fitted_at: DateTime<Utc>,
        config: ModelConfig,
        vocabulary: Vec<String>,
        weights: Vec<f32>,
    ) -> Self {
        let index = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();
        Self {
            version,
            fitted_at,
            config,
            vocabulary,
            weights,
            index,
        }
    }

    /// Stamp the model with the version it is installed under
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    pub fn fitted_at(&self) -> DateTime<Utc> {
        self.fitted_at
    }

    #[inline]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Length of every vector this model produces
    #[inline]
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    #[inline]
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    #[inline]
    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    #[inline]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Dimension and global weight of a term, if it is in the vocabulary
    #[inline]
    pub fn lookup(&self, term: &str) -> Option<(usize, f32)> {
        self.index.get(term).map(|&i| (i, self.weights[i]))
    }

    /// The text pipeline this model was fitted with
    #[inline]
    pub fn composer(&self) -> TextComposer {
        TextComposer::new(self.config.composer.clone())
    }
}

/// `ln((1 + n) / (1 + df)) + 1`; rarer terms get larger weights and a term
/// present in every document still keeps weight 1.
#[inline]
fn smoothed_idf(n_docs: usize, df: usize) -> f32 {
    (((1 + n_docs) as f64 / (1 + df) as f64).ln() + 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(texts: &[&str]) -> Vec<Document> {
        let composer = TextComposer::default();
        texts.iter().map(|t| composer.document(t)).collect()
    }

    #[test]
    fn test_fit_small_corpus() {
        let docs = corpus(&["a b c", "a a b", "c c c"]);
        let model = VectorModel::fit(&docs, &ModelConfig::default()).unwrap();
        assert_eq!(model.vocabulary(), &["a", "b", "c"]);
        assert_eq!(model.weights().len(), 3);
        assert_eq!(model.dimension(), DEFAULT_DIMENSION);
    }

    #[test]
    fn test_rarer_terms_weigh_more() {
        let docs = corpus(&["common rare", "common", "common"]);
        let model = VectorModel::fit(&docs, &ModelConfig::default()).unwrap();
        let (_, common) = model.lookup("common").unwrap();
        let (_, rare) = model.lookup("rare").unwrap();
        assert!(rare > common);
        assert!((common - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        assert!(matches!(
            VectorModel::fit(&[], &ModelConfig::default()),
            Err(Error::EmptyCorpus(_))
        ));
        let docs = corpus(&["", "  ", "!!"]);
        assert!(matches!(
            VectorModel::fit(&docs, &ModelConfig::default()),
            Err(Error::EmptyCorpus(_))
        ));
    }

    #[test]
    fn test_dimension_cap_keeps_highest_weights() {
        // "x" and "y" occur once, "shared" everywhere
        let docs = corpus(&["shared x", "shared y", "shared"]);
        let config = ModelConfig {
            dimension: 2,
            ..Default::default()
        };
        let model = VectorModel::fit(&docs, &config).unwrap();
        assert_eq!(model.vocabulary(), &["x", "y"]);
    }

    #[test]
    fn test_dimension_cap_breaks_ties_lexically() {
        let docs = corpus(&["delta alpha charlie bravo"]);
        let config = ModelConfig {
            dimension: 2,
            ..Default::default()
        };
        let model = VectorModel::fit(&docs, &config).unwrap();
        assert_eq!(model.vocabulary(), &["alpha", "bravo"]);
    }

    #[test]
    fn test_refit_is_bit_identical() {
        let docs = corpus(&[
            "space crew alien ship",
            "romance paris summer",
            "alien invasion earth",
            "summer camp horror",
        ]);
        let config = ModelConfig {
            dimension: 5,
            ..Default::default()
        };
        let first = VectorModel::fit(&docs, &config).unwrap();
        let second = VectorModel::fit(&docs, &config).unwrap();
        assert_eq!(first.vocabulary(), second.vocabulary());
        let bits = |m: &VectorModel| m.weights().iter().map(|w| w.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn test_min_df_and_max_df_pruning() {
        let docs = corpus(&["everywhere twice once", "everywhere twice", "everywhere"]);
        let config = ModelConfig {
            min_df: 2,
            max_df: 0.9,
            ..Default::default()
        };
        let model = VectorModel::fit(&docs, &config).unwrap();
        assert_eq!(model.vocabulary(), &["twice"]);

        let config = ModelConfig {
            min_df: 4,
            ..Default::default()
        };
        assert!(matches!(
            VectorModel::fit(&docs, &config),
            Err(Error::EmptyCorpus(_))
        ));
    }

    #[test]
    fn test_max_df_keeps_terms_at_the_boundary() {
        let mut texts = vec!["hot x"; 7];
        texts.extend(["cold y", "cold z", "cold"]);
        let docs = corpus(&texts);

        for (max_df, hot_kept) in [(0.7, true), (0.69, false)] {
            let config = ModelConfig {
                max_df,
                ..Default::default()
            };
            let model = VectorModel::fit(&docs, &config).unwrap();
            assert_eq!(model.lookup("hot").is_some(), hot_kept, "max_df = {}", max_df);
            assert!(model.lookup("cold").is_some());
        }

        let docs = corpus(&vec!["common"; 57].into_iter().chain(vec!["rare"; 43]).collect::<Vec<_>>());
        let config = ModelConfig {
            max_df: 0.57,
            ..Default::default()
        };
        let model = VectorModel::fit(&docs, &config).unwrap();
        assert!(model.lookup("common").is_some());
    }

    #[test]
    fn test_bigrams_enter_vocabulary() {
        let docs = corpus(&["space opera", "space western"]);
        let config = ModelConfig {
            ngram_range: (1, 2),
            ..Default::default()
        };
        let model = VectorModel::fit(&docs, &config).unwrap();
        assert!(model.lookup("space opera").is_some());
        assert!(model.lookup("opera").is_some());
    }

    #[test]
    fn test_invalid_config() {
        let docs = corpus(&["a"]);
        for config in [
            ModelConfig { dimension: 0, ..Default::default() },
            ModelConfig { ngram_range: (2, 1), ..Default::default() },
            ModelConfig { min_df: 0, ..Default::default() },
            ModelConfig { max_df: 0.0, ..Default::default() },
        ] {
            assert!(matches!(
                VectorModel::fit(&docs, &config),
                Err(Error::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_record_round_trip_rebuilds_index() {
        let docs = corpus(&["alpha beta", "beta gamma"]);
        let model = VectorModel::fit(&docs, &ModelConfig::default())
            .unwrap()
            .with_version(3);
        let json = serde_json::to_string(&model).unwrap();
        let restored: VectorModel = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.version(), 3);
        assert_eq!(restored.vocabulary(), model.vocabulary());
        assert_eq!(restored.lookup("gamma"), model.lookup("gamma"));
    }
}
