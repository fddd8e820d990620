//! Vector store for chunk embeddings. Supports add, similarity search, and saving to
//! or loading from a JSON file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunks::Chunk;

/// A chunk with its embedding, stored for similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    /// Assigned on insertion from a per-store counter.
    pub id: u64,
    pub chunk: Chunk,
    /// Normalized embedding vector (unit length for cosine similarity via dot product).
    embedding: Vec<f32>,
}

/// A retrieval result.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub id: u64,
    pub chunk: Chunk,
    /// Cosine similarity to the query, in `[-1, 1]`.
    pub score: f32,
}

/// Holds chunks and their embeddings; supports similarity search.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct VectorStore {
    items: Vec<IndexedChunk>,
    next_id: u64,
}

impl VectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk with its embedding. Embedding is normalized before storage.
    /// Returns the id assigned to the chunk.
    pub fn add(&mut self, chunk: Chunk, embedding: Vec<f32>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(IndexedChunk {
            id,
            chunk,
            embedding: normalize(&embedding),
        });
        id
    }

    /// Add multiple chunks with embeddings in one batch.
    pub fn add_batch(&mut self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<(), StoreError> {
        if chunks.len() != embeddings.len() {
            return Err(StoreError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            self.add(chunk, embedding);
        }
        Ok(())
    }

    /// Search for chunks most similar to the query embedding. Returns up to k results,
    /// best first. The query must have the same dimension as the stored embeddings.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<Hit>, StoreError> {
        let Some(dimension) = self.dimension() else {
            return Ok(Vec::new());
        };
        if query_embedding.len() != dimension {
            return Err(StoreError::DimensionMismatch {
                expected: dimension,
                got: query_embedding.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let q_norm = normalize(query_embedding);
        let mut scored: Vec<(&IndexedChunk, f32)> = self
            .items
            .iter()
            .map(|ic| (ic, dot(&q_norm, &ic.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(ic, score)| Hit {
                id: ic.id,
                chunk: ic.chunk.clone(),
                score,
            })
            .collect())
    }

    /// Dimension of the stored embeddings, if any are stored.
    pub fn dimension(&self) -> Option<usize> {
        self.items.first().map(|ic| ic.embedding.len())
    }

    pub fn items(&self) -> &[IndexedChunk] {
        &self.items
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Write the store to `path` as JSON.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec(self).map_err(|e| StoreError::Encode(path.to_path_buf(), e))?;
        std::fs::write(path, json).map_err(|e| StoreError::Io(path.to_path_buf(), e))
    }

    /// Read a store written by [VectorStore::save].
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read(path).map_err(|e| StoreError::Io(path.to_path_buf(), e))?;
        serde_json::from_slice(&raw).map_err(|e| StoreError::Decode(path.to_path_buf(), e))
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{chunks} chunk(s) but {embeddings} embedding(s)")]
    LengthMismatch { chunks: usize, embeddings: usize },
    #[error("query has dimension {got} but the index has dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("io error for {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("failed to encode {0}: {1}")]
    Encode(PathBuf, serde_json::Error),
    #[error("failed to decode {0}: {1}")]
    Decode(PathBuf, serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            source: PathBuf::from("doc.txt"),
            index: 0,
        }
    }

    fn abc_store() -> VectorStore {
        let mut store = VectorStore::new();
        store
            .add_batch(
                vec![chunk("A"), chunk("B"), chunk("C")],
                vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]],
            )
            .unwrap();
        store
    }

    #[test]
    fn nearest_chunk_wins() {
        let store = abc_store();
        let hits = store.search(&[0.1, 0.9, 0.2], 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.text, "B");
    }

    #[test]
    fn results_are_ordered_and_capped() {
        let store = abc_store();
        let hits = store.search(&[0.6, 0.3, 0.1], 2).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
        assert!(hits[0].score >= hits[1].score);
        assert_eq!(store.search(&[1.0, 0.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn ids_are_sequential() {
        let mut store = VectorStore::new();
        assert_eq!(store.add(chunk("x"), vec![1.0]), 0);
        assert_eq!(store.add(chunk("y"), vec![1.0]), 1);
        assert_eq!(store.items()[1].id, 1);
    }

    #[test]
    fn mismatched_batch_is_rejected() {
        let mut store = VectorStore::new();
        let err = store.add_batch(vec![chunk("x")], Vec::new()).unwrap_err();
        assert!(matches!(err, StoreError::LengthMismatch { chunks: 1, embeddings: 0 }));
        assert!(store.is_empty());
    }

    #[test]
    fn empty_store_or_query_returns_nothing() {
        assert!(VectorStore::new().search(&[1.0], 3).unwrap().is_empty());
        assert!(abc_store().search(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn query_of_other_dimension_is_rejected() {
        let store = abc_store();
        let err = store.search(&[1.0, 0.0], 2).unwrap_err();
        assert!(matches!(err, StoreError::DimensionMismatch { expected: 3, got: 2 }));
        assert!(matches!(
            store.search(&[], 2),
            Err(StoreError::DimensionMismatch { expected: 3, got: 0 })
        ));
    }

    #[test]
    fn save_and_load_preserve_search() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = abc_store();
        store.save(&path).unwrap();

        let loaded = VectorStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.dimension(), Some(3));
        assert_eq!(loaded.search(&[0.0, 0.0, 5.0], 1).unwrap()[0].chunk.text, "C");
    }
}
