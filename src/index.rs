//! Exact nearest-neighbour index over document embeddings.
//!
//! The index is a flat copy of the embedding set, scanned in full for every
//! query. Corpora are tens to hundreds of documents, so the scan is cheap
//! and the ranking is exact.
//!
//! Ranking is by ascending Euclidean distance; equal distances keep the
//! lower ordinal first.

use std::cmp::Ordering;

use crate::error::{RagError, Result};
use crate::models::Neighbor;

/// Immutable index built from a complete embedding set.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: Vec<Vec<f32>>,
    dims: usize,
}

impl VectorIndex {
    /// Build an index whose ordinals are the positions in `vectors`.
    ///
    /// Fails with [`RagError::EmptyCorpus`] on an empty set and with
    /// [`RagError::DimensionMismatch`] if the vectors disagree on length.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dims = vectors.first().map(Vec::len).ok_or(RagError::EmptyCorpus)?;
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(RagError::DimensionMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }
        Ok(Self { vectors, dims })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Up to `k` nearest neighbours of `query` with their distances.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        // Rank on squared distance; the square root is monotonic.
        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, v)| Neighbor {
                ordinal,
                distance: squared_l2(query, v),
            })
            .collect();
        hits.sort_by(rank_order);
        hits.truncate(k);
        for hit in hits.iter_mut() {
            hit.distance = hit.distance.sqrt();
        }
        Ok(hits)
    }

    /// Ordinals of the `k` nearest documents, closest first.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<usize>> {
        Ok(self
            .search(query, k)?
            .into_iter()
            .map(|n| n.ordinal)
            .collect())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Compare by distance, then ordinal.
pub fn rank_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.ordinal.cmp(&b.ordinal))
}
