//! Exact nearest-neighbor index over an embedded corpus.
//!
//! [`SimilarityIndex`] stores every vector in one flat buffer and answers
//! "top-K by Euclidean distance" with a brute-force scan. It is immutable
//! once built; a new corpus means a new index, installed through
//! [`IndexHandle::install`] so that readers always see one whole generation.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::embedding::euclidean_distance;
use crate::models::{Document, EmbeddedDocument};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("vector for {path} has dimension {actual}, index expects {expected}")]
    DimensionMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("query vector has dimension {actual}, index expects {expected}")]
    QueryDimensionMismatch { expected: usize, actual: usize },

    #[error("index dimension must be > 0")]
    ZeroDimension,
}

/// One result of [`SimilarityIndex::nearest_k`].
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub document: &'a Document,
    pub distance: f32,
}

/// Flat L2 index: `n × dims` floats in insertion order.
#[derive(Debug)]
pub struct SimilarityIndex {
    dims: usize,
    documents: Vec<Document>,
    vectors: Vec<f32>,
}

impl SimilarityIndex {
    /// Build an index from embedded documents, preserving their order.
    ///
    /// # Errors
    ///
    /// Fails if `dims` is zero or any vector has a different length.
    pub fn build(dims: usize, embedded: Vec<EmbeddedDocument>) -> Result<Self, IndexError> {
        if dims == 0 {
            return Err(IndexError::ZeroDimension);
        }

        let mut documents = Vec::with_capacity(embedded.len());
        let mut vectors = Vec::with_capacity(embedded.len() * dims);

        for e in embedded {
            if e.vector.len() != dims {
                return Err(IndexError::DimensionMismatch {
                    path: e.document.relative_path,
                    expected: dims,
                    actual: e.vector.len(),
                });
            }
            vectors.extend_from_slice(&e.vector);
            documents.push(e.document);
        }

        Ok(Self {
            dims,
            documents,
            vectors,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Return the `k` closest documents, ascending by distance.
    ///
    /// Ties keep insertion order. A `k` larger than the corpus returns every
    /// document.
    ///
    /// # Errors
    ///
    /// Fails if `query` does not have the index dimension.
    pub fn nearest_k(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor<'_>>, IndexError> {
        if query.len() != self.dims {
            return Err(IndexError::QueryDimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dims)
            .enumerate()
            .map(|(i, v)| (i, euclidean_distance(query, v)))
            .collect();

        // stable sort: equal distances stay in insertion order
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, distance)| Neighbor {
                document: &self.documents[i],
                distance,
            })
            .collect())
    }
}

/// One immutable ingest snapshot.
#[derive(Debug)]
pub struct IndexGeneration {
    pub id: u64,
    pub built_at: DateTime<Utc>,
    pub index: SimilarityIndex,
}

/// Holder for the active index generation.
///
/// Readers clone the inner `Arc` and keep using that generation for the
/// whole query even if a new one is installed meanwhile.
#[derive(Debug, Default)]
pub struct IndexHandle {
    current: RwLock<Option<Arc<IndexGeneration>>>,
    next_id: AtomicU64,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active generation, or `None` before the first successful ingest.
    pub fn current(&self) -> Option<Arc<IndexGeneration>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Atomically replace the active generation with `index`.
    pub fn install(&self, index: SimilarityIndex) -> Arc<IndexGeneration> {
        let generation = Arc::new(IndexGeneration {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            built_at: Utc::now(),
            index,
        });
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(generation.clone());
        tracing::info!(
            generation = generation.id,
            documents = generation.index.len(),
            "installed index generation"
        );
        generation
    }
}
