//! Embedding trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements,
//! plus the distance function used by the similarity index.
//!
//! Concrete providers (fastembed, OpenAI, Ollama) live in the `mdseek`
//! application crate.

use anyhow::Result;
use async_trait::async_trait;

/// Dimension of the default embedding model (`all-MiniLM-L6-v2`).
pub const DEFAULT_DIMS: usize = 384;

/// Text → fixed-length vector capability.
///
/// Implementations must be deterministic for identical input so cached
/// pages and snippets stay meaningful.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Euclidean (L2) distance between two vectors of equal length.
///
/// Returns `f32::INFINITY` when the lengths differ so a malformed vector
/// always sorts last.
///
/// # Formula
///
/// ```text
/// d(a, b) = √ Σ (aᵢ − bᵢ)²
/// ```
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
