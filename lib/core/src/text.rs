//! Text composition: the single pipeline that turns an [`Item`] into the
//! token sequence that is fitted and vectorized.
//!
//! The same [`ComposerConfig`] must be used at fit time and at encode time.
//! Fitted models carry the config they were built with, and callers compose
//! documents through [`crate::VectorModel::composer`] to keep the two in step.

use crate::item::Item;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "being", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had",
    "has", "have", "he", "her", "his", "how", "i", "if", "in", "into", "is", "it", "its", "may",
    "more", "most", "no", "not", "of", "on", "one", "only", "or", "other", "our", "out", "over",
    "she", "so", "some", "such", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "to", "up", "was", "we", "were", "what", "when", "which",
    "while", "who", "will", "with", "would", "you", "your",
];

/// How many times each field's tokens are repeated in the document.
/// A weight of zero drops the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub categories: u32,
    pub overview: u32,
    pub keywords: u32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            categories: 5,
            overview: 3,
            keywords: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    pub weights: FieldWeights,
    pub remove_stop_words: bool,
    /// Tokens shorter than this many characters are dropped
    pub min_token_chars: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            remove_stop_words: false,
            min_token_chars: 1,
        }
    }
}

/// Normalized token sequence derived from one item. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    tokens: Vec<String>,
}

impl Document {
    #[inline]
    #[must_use]
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    #[inline]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// All n-grams for `min_n..=max_n`, in document order. Multi-token grams
    /// are joined with a single space.
    pub fn terms(&self, (min_n, max_n): (usize, usize)) -> Vec<String> {
        let min_n = min_n.max(1);
        let mut terms = Vec::new();
        for n in min_n..=max_n.max(min_n) {
            if n == 1 {
                terms.extend(self.tokens.iter().cloned());
            } else {
                terms.extend(self.tokens.windows(n).map(|w| w.join(" ")));
            }
        }
        terms
    }
}

/// Pure function from [`Item`] to [`Document`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextComposer {
    config: ComposerConfig,
}

impl TextComposer {
    #[inline]
    #[must_use]
    pub fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    #[inline]
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Case-fold and segment text on Unicode word boundaries (UAX #29), which
    /// handles scripts without whitespace separators better than a split on
    /// spaces.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .map(str::to_lowercase)
            .filter(|t| t.chars().count() >= self.config.min_token_chars)
            .filter(|t| !(self.config.remove_stop_words && is_stop_word(t)))
            .collect()
    }

    /// Document for a bare piece of text, with no field weighting
    pub fn document(&self, text: &str) -> Document {
        Document::from_tokens(self.tokenize(text))
    }

    /// Categories, then overview, then keywords, each repeated by its weight
    pub fn compose(&self, item: &Item) -> Document {
        let weights = self.config.weights;
        let mut tokens = Vec::new();

        let categories: Vec<String> = item
            .categories
            .iter()
            .flat_map(|c| self.tokenize(c))
            .collect();
        repeat_into(&mut tokens, &categories, weights.categories);

        let overview = self.tokenize(&item.overview);
        repeat_into(&mut tokens, &overview, weights.overview);

        let keywords: Vec<String> = item
            .keywords
            .iter()
            .flat_map(|k| self.tokenize(k))
            .collect();
        repeat_into(&mut tokens, &keywords, weights.keywords);

        Document::from_tokens(tokens)
    }
}

fn repeat_into(out: &mut Vec<String>, tokens: &[String], times: u32) {
    if tokens.is_empty() {
        return;
    }
    for _ in 0..times {
        out.extend_from_slice(tokens);
    }
}

#[inline]
fn is_stop_word(token: &str) -> bool {
    ENGLISH_STOP_WORDS.binary_search(&token).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_case_folds_and_strips_punctuation() {
        let composer = TextComposer::default();
        assert_eq!(
            composer.tokenize("Space, the FINAL frontier!"),
            vec!["space", "the", "final", "frontier"]
        );
    }

    #[test]
    fn test_tokenize_keeps_non_latin_scripts() {
        let composer = TextComposer::default();
        let tokens = composer.tokenize("우주 전쟁 Épopée");
        assert_eq!(tokens, vec!["우주", "전쟁", "épopée"]);
    }

    #[test]
    fn test_stop_words_are_optional() {
        let composer = TextComposer::new(ComposerConfig {
            remove_stop_words: true,
            ..Default::default()
        });
        assert_eq!(composer.tokenize("the crew of a ship"), vec!["crew", "ship"]);
        assert_eq!(TextComposer::default().tokenize("a b").len(), 2);
    }

    #[test]
    fn test_stop_word_list_is_sorted() {
        let mut sorted = ENGLISH_STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, ENGLISH_STOP_WORDS);
    }

    #[test]
    fn test_compose_applies_field_weights() {
        let composer = TextComposer::new(ComposerConfig {
            weights: FieldWeights {
                categories: 2,
                overview: 1,
                keywords: 0,
            },
            ..Default::default()
        });
        let item = Item::new(1, "Alien")
            .with_overview("Crew")
            .with_categories(["Horror"])
            .with_keywords(["ignored"]);
        let doc = composer.compose(&item);
        assert_eq!(doc.tokens(), &["horror", "horror", "crew"]);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let composer = TextComposer::default();
        let item = Item::new(1, "Alien")
            .with_overview("In space no one can hear you scream")
            .with_keywords(["xenomorph", "space ship"])
            .with_categories(["Horror", "Science Fiction"]);
        assert_eq!(composer.compose(&item), composer.compose(&item.clone()));
    }

    #[test]
    fn test_empty_item_yields_empty_document() {
        let doc = TextComposer::default().compose(&Item::new(1, "Untitled"));
        assert!(doc.is_empty());
    }

    #[test]
    fn test_bigram_terms() {
        let doc = TextComposer::default().document("space opera saga");
        assert_eq!(
            doc.terms((1, 2)),
            vec!["space", "opera", "saga", "space opera", "opera saga"]
        );
    }
}
