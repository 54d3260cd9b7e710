//! Embedding vectors and the content items that carry them.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A fixed-length vector produced by an external embedding model.
///
/// `model` identifies the provider and version. Vectors are only comparable
/// when both the model tag and the length match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingVector {
    pub model: String,
    pub values: Vec<f32>,
}

impl EmbeddingVector {
    pub fn new(model: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            model: model.into(),
            values,
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Fails fast when `other` cannot be compared against `self`.
    pub fn ensure_comparable(&self, other: &EmbeddingVector) -> Result<()> {
        if self.model != other.model {
            return Err(Error::ModelMismatch {
                expected: self.model.clone(),
                actual: other.model.clone(),
            });
        }
        if self.dimension() != other.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                actual: other.dimension(),
            });
        }
        Ok(())
    }

    /// False when any component is NaN or infinite. JSON numbers past the
    /// `f32` range deserialize to infinity.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|v| f64::from(*v) * f64::from(*v))
            .sum::<f64>()
            .sqrt()
    }
}

/// Content item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Photo,
    Project,
}

/// A portfolio item as seen by the recommendation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingVector>,
}

/// A ranked recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedItem {
    pub id: String,
    pub title: String,
    pub kind: ContentKind,
    pub score: f64,
}
