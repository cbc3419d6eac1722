//! Hybrid retrieval over the claim knowledge base
//!
//! Retrieval combines nearest-neighbor search over claim embeddings
//! with trigram text matching over claim text. The two scores are
//! blended with a fixed weighting that favors the semantic side.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod index;
pub mod text;

pub use engine::{RetrievalEngine, SearchHit, SearchMode, SearchOptions};
pub use index::{VectorIndex, VectorIndexError};
pub use text::trigram_similarity;
