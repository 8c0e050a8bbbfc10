//! Embedding value type and the provider interface.
//!
//! The provider is an external collaborator: whatever computes raw vectors
//! from text (a local model, a remote API) implements `EmbeddingProvider`.

use serde::{Deserialize, Serialize};

use crate::error::EmbeddingError;

/// Dense vector embedding of one text.
///
/// Values are stored as produced. Nothing in ragstore normalizes them
/// implicitly; callers that want cosine semantics from the L2 index call
/// [`Embedding::normalized`] on both indexed and query vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Get the embedding dimension
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Unit-length copy. Zero vectors are returned unchanged.
    pub fn normalized(&self) -> Self {
        let norm: f32 = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Self::new(self.values.iter().map(|x| x / norm).collect())
        } else {
            self.clone()
        }
    }

    /// Cosine similarity in [-1, 1]. Returns 0.0 for mismatched dimensions
    /// or zero vectors.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        let dot: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum();
        let norm_a: f32 = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = other.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }

    /// Squared Euclidean distance, the metric every index uses.
    pub fn squared_l2(&self, other: &Embedding) -> Result<f32, EmbeddingError> {
        if self.values.len() != other.values.len() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.values.len(),
                actual: other.values.len(),
            });
        }
        Ok(self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// External embedding capability.
///
/// Must return exactly one vector per input text, all of equal length.
/// Implementations must be thread-safe (Send + Sync).
pub trait EmbeddingProvider: Send + Sync {
    /// Short name for logs (e.g. "all-MiniLM-L6-v2").
    fn name(&self) -> &str;

    /// Embed a batch of texts in one call.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_does_not_normalize() {
        let emb = Embedding::new(vec![3.0, 4.0]);
        assert_eq!(emb.values, vec![3.0, 4.0]);
    }

    #[test]
    fn test_normalized() {
        let emb = Embedding::new(vec![3.0, 4.0]).normalized();
        // 3-4-5 triangle: normalized should be [0.6, 0.8]
        assert!((emb.values[0] - 0.6).abs() < 0.001);
        assert!((emb.values[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_normalized_zero_vector() {
        let emb = Embedding::new(vec![0.0, 0.0]).normalized();
        assert_eq!(emb.values, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![2.0, 0.0]);
        let c = Embedding::new(vec![0.0, 1.0]);
        assert!((a.cosine_similarity(&b) - 1.0).abs() < 0.001);
        assert!(a.cosine_similarity(&c).abs() < 0.001);
    }

    #[test]
    fn test_squared_l2() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.squared_l2(&b).unwrap() - 25.0).abs() < 0.001);

        let short = Embedding::new(vec![1.0]);
        assert!(matches!(
            a.squared_l2(&short),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let json = serde_json::to_string(&Embedding::new(vec![0.5, 1.0])).unwrap();
        assert_eq!(json, "[0.5,1.0]");
    }
}
