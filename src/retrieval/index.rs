//! Exact nearest-neighbour index over a fixed embedding matrix.
//!
//! Distances are squared Euclidean (L2), sorted ascending, with ties broken
//! by the lower build-time position. The scan is exhaustive.

use std::cmp::Ordering;

use ndarray::{Array2, ArrayView1};

use super::document::{Document, ScoredDocument};
use super::error::IndexError;

#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: Array2<f32>,
    documents: Vec<Document>,
}

impl VectorIndex {
    /// Builds the index from an `N × D` matrix and its `N` documents.
    ///
    /// Row `i` of `vectors` belongs to `documents[i]`; each document's
    /// `position` is rewritten to match.
    pub fn build(vectors: Array2<f32>, mut documents: Vec<Document>) -> Result<Self, IndexError> {
        if vectors.nrows() != documents.len() {
            return Err(IndexError::DimensionMismatch {
                subject: "metadata rows",
                expected: vectors.nrows(),
                actual: documents.len(),
            });
        }
        for (position, document) in documents.iter_mut().enumerate() {
            document.position = position;
        }
        Ok(Self { vectors, documents })
    }

    /// An index with no rows but a fixed width.
    pub fn empty(dimension: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dimension)),
            documents: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn embedding(&self, position: usize) -> Option<ArrayView1<'_, f32>> {
        (position < self.len()).then(|| self.vectors.row(position))
    }

    /// Returns the `min(k, N)` nearest documents, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidK);
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension() {
            return Err(IndexError::DimensionMismatch {
                subject: "query vector",
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let mut ranked: Vec<(usize, f32)> = self
            .vectors
            .rows()
            .into_iter()
            .enumerate()
            .map(|(position, row)| (position, squared_l2(row, query)))
            .collect();

        let k = k.min(ranked.len());
        if k < ranked.len() {
            ranked.select_nth_unstable_by(k - 1, compare_hits);
            ranked.truncate(k);
        }
        ranked.sort_unstable_by(compare_hits);

        Ok(ranked
            .into_iter()
            .map(|(position, distance)| ScoredDocument {
                document: self.documents[position].clone(),
                distance,
            })
            .collect())
    }
}

/// Total order over hits: distance, then position.
fn compare_hits(left: &(usize, f32), right: &(usize, f32)) -> Ordering {
    left.1
        .total_cmp(&right.1)
        .then_with(|| left.0.cmp(&right.0))
}

/// Non-finite distances (NaN components, overflow) rank as infinitely far.
fn squared_l2(row: ArrayView1<'_, f32>, query: &[f32]) -> f32 {
    let distance: f32 = row
        .iter()
        .zip(query)
        .map(|(a, b)| {
            let diff = a - b;
            diff * diff
        })
        .sum();
    if distance.is_finite() {
        distance
    } else {
        f32::INFINITY
    }
}
