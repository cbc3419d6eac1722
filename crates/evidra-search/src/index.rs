//! In-memory HNSW index over claim embeddings
//!
//! The index lives in memory and is rebuilt from the store on startup.
//! HNSW returns cosine distance; callers get similarity (1 - distance).

use evidra_domain::ClaimId;
use hnsw_rs::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

const DEFAULT_M: usize = 16;
const DEFAULT_EF_CONSTRUCTION: usize = 200;
const DEFAULT_MAX_ELEMENTS: usize = 1_000_000;

/// Errors that can occur during vector index operations
#[derive(Error, Debug)]
pub enum VectorIndexError {
    /// Embedding length does not match the index dimension
    #[error("invalid embedding dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was created with
        expected: usize,
        /// Dimension of the offered vector
        actual: usize,
    },
}

/// Nearest-neighbor index mapping embeddings back to claim ids
pub struct VectorIndex {
    dimension: usize,
    hnsw: Arc<Mutex<Hnsw<'static, f32, DistCosine>>>,
    id_map: Arc<Mutex<HashMap<usize, ClaimId>>>,
    next_id: Arc<Mutex<usize>>,
}

fn new_hnsw() -> Hnsw<'static, f32, DistCosine> {
    let nb_layer = 16.min((DEFAULT_MAX_ELEMENTS as f32).ln().trunc() as usize);
    Hnsw::<'static, f32, DistCosine>::new(
        DEFAULT_M,
        DEFAULT_MAX_ELEMENTS,
        nb_layer,
        DEFAULT_EF_CONSTRUCTION,
        DistCosine {},
    )
}

impl VectorIndex {
    /// Create an empty index for vectors of the given dimension
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            hnsw: Arc::new(Mutex::new(new_hnsw())),
            id_map: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(0)),
        }
    }

    /// Dimension the index was created with
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Add a claim embedding to the index
    pub fn add(&self, claim_id: ClaimId, embedding: &[f32]) -> Result<(), VectorIndexError> {
        if embedding.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let mut next_id = self.next_id.lock().unwrap();
        let internal_id = *next_id;
        *next_id += 1;
        drop(next_id);

        let mut id_map = self.id_map.lock().unwrap();
        id_map.insert(internal_id, claim_id);
        drop(id_map);

        let embedding_vec = embedding.to_vec();
        let hnsw = self.hnsw.lock().unwrap();
        hnsw.insert((&embedding_vec, internal_id));

        Ok(())
    }

    /// Search for the k nearest neighbors of `query`
    ///
    /// Returns (claim id, cosine similarity) pairs, most similar first.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<(ClaimId, f32)>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let hnsw = self.hnsw.lock().unwrap();
        let id_map = self.id_map.lock().unwrap();

        let results = hnsw.search(query, k, ef_search);
        let mapped: Vec<(ClaimId, f32)> = results
            .into_iter()
            .filter_map(|neighbour| {
                id_map
                    .get(&neighbour.d_id)
                    .map(|&claim_id| (claim_id, 1.0 - neighbour.distance))
            })
            .collect();

        Ok(mapped)
    }

    /// Number of vectors in the index
    pub fn len(&self) -> usize {
        self.id_map.lock().unwrap().len()
    }

    /// True when no vectors have been added
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all vectors, leaving an empty index of the same dimension
    pub fn clear(&self) {
        let mut hnsw = self.hnsw.lock().unwrap();
        *hnsw = new_hnsw();
        drop(hnsw);

        self.id_map.lock().unwrap().clear();
        *self.next_id.lock().unwrap() = 0;
    }
}
