//! Aggregation of several item vectors into one preference vector.

use serde::{Deserialize, Serialize};
use tastevec_core::Vector;

/// Combines the non-zero vectors of the selected items into one query vector.
/// Implementations must return a unit vector, or the zero vector when the
/// combination cancels out.
pub trait Aggregator: Send + Sync {
    fn aggregate(&self, vectors: &[&Vector]) -> Vector;
}

/// Arithmetic mean, then re-normalized
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl Aggregator for Mean {
    fn aggregate(&self, vectors: &[&Vector]) -> Vector {
        let Some((first, rest)) = vectors.split_first() else {
            return Vector::new(Vec::new());
        };
        let sum = rest.iter().fold((*first).clone(), |acc, v| &acc + *v);
        let mut mean = &sum * (1.0 / vectors.len() as f32);
        mean.normalize();
        mean
    }
}

/// Element-wise maximum, then re-normalized
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxPool;

impl Aggregator for MaxPool {
    fn aggregate(&self, vectors: &[&Vector]) -> Vector {
        let Some((first, rest)) = vectors.split_first() else {
            return Vector::new(Vec::new());
        };
        let mut pooled = (*first).clone();
        for v in rest {
            for (p, x) in pooled.as_mut_slice().iter_mut().zip(v.as_slice()) {
                *p = p.max(*x);
            }
        }
        pooled.normalize();
        pooled
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    #[default]
    Mean,
    MaxPool,
}

impl AggregationPolicy {
    pub fn aggregator(self) -> Box<dyn Aggregator> {
        match self {
            AggregationPolicy::Mean => Box::new(Mean),
            AggregationPolicy::MaxPool => Box::new(MaxPool),
        }
    }
}
