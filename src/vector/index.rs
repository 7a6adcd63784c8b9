//! In-memory vector index for one document.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::StoreError;
use super::persistence::IndexManifest;
use super::similarity::cosine_similarity;
use crate::documents::Chunk;

/// A retrieved chunk with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Cosine similarity (-1.0 - 1.0).
    pub score: f32,
}

/// Chunks and their embeddings, row-aligned.
///
/// Vectors are stored flat: row `i` is `vectors[i * dimension..(i + 1) * dimension]`.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    chunks: Vec<Chunk>,
    vectors: Vec<f32>,
}

impl VectorIndex {
    /// Assemble an index, checking that vectors and chunks line up.
    pub(crate) fn from_parts(
        manifest: IndexManifest,
        chunks: Vec<Chunk>,
        vectors: Vec<f32>,
    ) -> Result<Self, StoreError> {
        let expected = chunks.len() * manifest.dimension;
        if chunks.len() != manifest.chunk_count || vectors.len() != expected {
            return Err(StoreError::Corrupted {
                reason: format!(
                    "manifest declares {} chunks of dimension {}, found {} chunks and {} values",
                    manifest.chunk_count,
                    manifest.dimension,
                    chunks.len(),
                    vectors.len()
                ),
            });
        }

        Ok(Self {
            manifest,
            chunks,
            vectors,
        })
    }

    /// Manifest describing the indexed document.
    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    /// Vector dimension (0 for an empty index).
    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// All indexed chunks in document order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Embedding of the chunk at `position`.
    pub fn embedding(&self, position: usize) -> Option<&[f32]> {
        let dim = self.manifest.dimension;
        self.vectors.get(position * dim..(position + 1) * dim)
    }

    /// Return the `k` chunks most similar to `query`, best first.
    ///
    /// Ties keep document order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension() {
            return Err(StoreError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension())
            .map(|row| cosine_similarity(query, row))
            .enumerate()
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchHit {
                chunk: self.chunks[position].clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::DocumentInfo;

    fn index(rows: &[[f32; 2]]) -> VectorIndex {
        let chunks: Vec<Chunk> = (0..rows.len())
            .map(|i| Chunk::new(format!("chunk {i}"), i as u32, i as u32, (0, 7)))
            .collect();
        let manifest = IndexManifest::new(
            1,
            DocumentInfo {
                file_name: "test.pdf".to_string(),
                content_hash: "abc".to_string(),
                page_count: rows.len(),
            },
            "test-model".to_string(),
            2,
            rows.len(),
        );
        VectorIndex::from_parts(manifest, chunks, rows.iter().flatten().copied().collect())
            .unwrap()
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let idx = index(&[[1.0, 0.0], [0.0, 1.0], [0.7, 0.7]]);
        let hits = idx.search(&[0.0, 1.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "chunk 1");
        assert_eq!(hits[1].chunk.text, "chunk 2");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let idx = index(&[[1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(idx.search(&[1.0, 1.0], 10).unwrap().len(), 2);
        assert!(idx.search(&[1.0, 1.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_dimension() {
        let idx = index(&[[1.0, 0.0]]);
        let err = idx.search(&[1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_embedding_row_lookup() {
        let idx = index(&[[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(idx.embedding(1), Some(&[3.0, 4.0][..]));
        assert_eq!(idx.embedding(2), None);
    }

    #[test]
    fn test_from_parts_rejects_misaligned_vectors() {
        let manifest = IndexManifest::new(
            1,
            DocumentInfo {
                file_name: "x.pdf".to_string(),
                content_hash: "h".to_string(),
                page_count: 1,
            },
            "m".to_string(),
            3,
            1,
        );
        let chunk = Chunk::new("a".to_string(), 0, 0, (0, 1));
        let err = VectorIndex::from_parts(manifest, vec![chunk], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted { .. }));
    }
}
