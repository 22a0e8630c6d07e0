//! Turning documents into fixed-dimension unit vectors against a fitted model.

use crate::item::Item;
use crate::model::VectorModel;
use crate::text::Document;
use crate::vector::Vector;
use serde::{Deserialize, Serialize};

/// Whether a document contributed any vocabulary term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Present,
    /// The vector is exactly zero; the document shares no term with the model
    NoSignal,
}

impl Signal {
    #[inline]
    pub fn is_present(self) -> bool {
        matches!(self, Signal::Present)
    }
}

/// Output of [`transform`]: a unit vector, or the zero vector flagged
/// [`Signal::NoSignal`]
#[derive(Debug, Clone, PartialEq)]
pub struct Encoding {
    pub vector: Vector,
    pub signal: Signal,
}

/// Vectorize a document against a fitted model.
///
/// Out-of-vocabulary terms are ignored. The model is only read, so this is
/// safe to call from any number of threads at once.
pub fn transform(document: &Document, model: &VectorModel) -> Encoding {
    let config = model.config();
    let mut counts = vec![0u32; model.dimension()];
    let mut hit = false;

    for term in document.terms(config.ngram_range) {
        if let Some((idx, _)) = model.lookup(&term) {
            counts[idx] += 1;
            hit = true;
        }
    }

    if !hit {
        return Encoding {
            vector: Vector::zeros(model.dimension()),
            signal: Signal::NoSignal,
        };
    }

    let weights = model.weights();
    let data: Vec<f32> = counts
        .iter()
        .enumerate()
        .map(|(idx, &tf)| {
            if tf == 0 {
                return 0.0;
            }
            let tf = if config.sublinear_tf {
                1.0 + (tf as f32).ln()
            } else {
                tf as f32
            };
            tf * weights[idx]
        })
        .collect();

    let mut vector = Vector::new(data);
    vector.normalize();
    Encoding {
        vector,
        signal: Signal::Present,
    }
}

/// Compose an item with the model's own text pipeline, then [`transform`] it
pub fn encode_item(item: &Item, model: &VectorModel) -> Encoding {
    let document = model.composer().compose(item);
    transform(&document, model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use crate::text::TextComposer;

    fn fit(texts: &[&str], config: ModelConfig) -> VectorModel {
        let composer = TextComposer::new(config.composer.clone());
        let docs: Vec<Document> = texts.iter().map(|t| composer.document(t)).collect();
        VectorModel::fit(&docs, &config).unwrap()
    }

    #[test]
    fn test_transform_yields_unit_vector() {
        let model = fit(&["a b c", "a a b", "c c c"], ModelConfig::default());
        let encoding = transform(&TextComposer::default().document("a b c"), &model);
        assert_eq!(encoding.signal, Signal::Present);
        assert_eq!(encoding.vector.dim(), model.dimension());
        assert!(encoding.vector.is_unit());
    }

    #[test]
    fn test_unknown_terms_give_no_signal() {
        let model = fit(&["alpha beta"], ModelConfig::default());
        let encoding = transform(&TextComposer::default().document("gamma delta"), &model);
        assert_eq!(encoding.signal, Signal::NoSignal);
        assert!(encoding.vector.is_zero());
        assert_eq!(model.vocabulary_size(), 2);
    }

    #[test]
    fn test_term_frequency_scales_dimension() {
        let model = fit(&["alpha beta"], ModelConfig::default());
        let encoding = transform(&TextComposer::default().document("alpha alpha beta"), &model);
        let (a, _) = model.lookup("alpha").unwrap();
        let (b, _) = model.lookup("beta").unwrap();
        let v = encoding.vector.as_slice();
        assert!((v[a] - 2.0 * v[b]).abs() < 1e-6);
    }

    #[test]
    fn test_sublinear_tf_dampens_repetition() {
        let config = ModelConfig {
            sublinear_tf: true,
            ..Default::default()
        };
        let model = fit(&["alpha beta"], config);
        let encoding = transform(&TextComposer::default().document("alpha alpha beta"), &model);
        let (a, _) = model.lookup("alpha").unwrap();
        let (b, _) = model.lookup("beta").unwrap();
        let v = encoding.vector.as_slice();
        let expected = 1.0 + 2f32.ln();
        assert!((v[a] / v[b] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_encode_item_uses_model_composer() {
        let model = fit(&["horror crew", "romance paris"], ModelConfig::default());
        let item = Item::new(1, "Alien").with_categories(["Horror"]);
        let encoding = encode_item(&item, &model);
        assert!(encoding.signal.is_present());
        let (h, _) = model.lookup("horror").unwrap();
        assert!((encoding.vector.as_slice()[h] - 1.0).abs() < 1e-6);
    }
}
