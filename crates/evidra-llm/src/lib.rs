//! Evidra Language Model Layer
//!
//! Pluggable model provider implementations.
//!
//! # Architecture
//!
//! This crate provides implementations of the `LanguageModel` trait from
//! `evidra-domain`. Providers are synchronous; agents call them from
//! blocking threads.
//!
//! # Providers
//!
//! - `MockModel`: Deterministic mock for testing
//! - `OpenAiModel`: OpenAI-compatible HTTP API integration
//!
//! # Examples
//!
//! ```
//! use evidra_llm::MockModel;
//! use evidra_domain::traits::LanguageModel;
//!
//! let model = MockModel::new(1536);
//! let embedding = model.embed("progressive overload").unwrap();
//! assert_eq!(embedding.len(), 1536);
//! ```

#![warn(missing_docs)]

pub mod openai;
pub mod parser;
pub mod prompt;

use evidra_domain::traits::{
    ClaimDraft, ContradictionVerdict, ExtractionInput, LanguageModel,
};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub use openai::OpenAiModel;

/// Errors that can occur during model operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from the model
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Circuit breaker is refusing calls after repeated failures
    #[error("Circuit open, refusing model calls")]
    CircuitOpen,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("Model error: {0}")]
    Other(String),
}

/// Deterministic mock model for testing
///
/// Embeddings are generated by hashing the input text, so they are:
///
/// - **Deterministic**: Same text always produces the same vector
/// - **Normalized**: Unit length, ready for cosine similarity
/// - **Diverse**: Different texts produce different vectors
///
/// Extraction results and contradiction verdicts are scripted per input,
/// with an empty default.
#[derive(Debug, Clone)]
pub struct MockModel {
    dimension: usize,
    drafts: Arc<Mutex<HashMap<String, Vec<ClaimDraft>>>>,
    verdicts: Arc<Mutex<HashMap<(String, String), ContradictionVerdict>>>,
    failing_texts: Arc<Mutex<Vec<String>>>,
    embed_calls: Arc<Mutex<usize>>,
}

impl MockModel {
    /// Create a new mock model producing vectors of the given dimension
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            drafts: Arc::new(Mutex::new(HashMap::new())),
            verdicts: Arc::new(Mutex::new(HashMap::new())),
            failing_texts: Arc::new(Mutex::new(Vec::new())),
            embed_calls: Arc::new(Mutex::new(0)),
        }
    }

    /// Script the drafts returned for a publication title
    pub fn add_drafts(&self, title: impl Into<String>, drafts: Vec<ClaimDraft>) {
        self.drafts.lock().unwrap().insert(title.into(), drafts);
    }

    /// Script the verdict for a claim text pair (order-insensitive)
    pub fn add_verdict(
        &self,
        a: impl Into<String>,
        b: impl Into<String>,
        verdict: ContradictionVerdict,
    ) {
        let key = Self::pair_key(&a.into(), &b.into());
        self.verdicts.lock().unwrap().insert(key, verdict);
    }

    /// Make every operation fail when the input contains the marker
    pub fn fail_on(&self, marker: impl Into<String>) {
        self.failing_texts.lock().unwrap().push(marker.into());
    }

    /// Number of embed calls so far
    pub fn embed_calls(&self) -> usize {
        *self.embed_calls.lock().unwrap()
    }

    fn pair_key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    fn should_fail(&self, text: &str) -> bool {
        self.failing_texts
            .lock()
            .unwrap()
            .iter()
            .any(|marker| text.contains(marker))
    }

    /// Hash text with a seed to get a deterministic f32 value
    fn hash_with_seed(text: &str, seed: u64) -> f32 {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        seed.hash(&mut hasher);
        let hash_value = hasher.finish();

        // Convert hash to float in range [-1, 1]
        let normalized = (hash_value as f64 / u64::MAX as f64) * 2.0 - 1.0;
        normalized as f32
    }
}

impl LanguageModel for MockModel {
    type Error = LlmError;

    fn embed(&self, text: &str) -> Result<Vec<f32>, Self::Error> {
        *self.embed_calls.lock().unwrap() += 1;

        if text.is_empty() {
            return Err(LlmError::InvalidResponse(
                "Empty text cannot be embedded".to_string(),
            ));
        }
        if self.should_fail(text) {
            return Err(LlmError::Other("Mock embedding failure".to_string()));
        }

        let mut embedding = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            embedding.push(Self::hash_with_seed(text, i as u64));
        }

        // Normalize to unit length for cosine similarity
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        Ok(embedding)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn extract_claims(&self, input: &ExtractionInput) -> Result<Vec<ClaimDraft>, Self::Error> {
        if self.should_fail(&input.title) {
            return Err(LlmError::Other("Mock extraction failure".to_string()));
        }
        Ok(self
            .drafts
            .lock()
            .unwrap()
            .get(&input.title)
            .cloned()
            .unwrap_or_default())
    }

    fn assess_contradiction(
        &self,
        a: &str,
        b: &str,
    ) -> Result<ContradictionVerdict, Self::Error> {
        if self.should_fail(a) || self.should_fail(b) {
            return Err(LlmError::Other("Mock verdict failure".to_string()));
        }
        let key = Self::pair_key(a, b);
        Ok(self
            .verdicts
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or(ContradictionVerdict {
                contradicts: false,
                strength: 0.0,
                rationale: String::new(),
            }))
    }
}

/// Calculate cosine similarity between two embedding vectors
///
/// Returns a value in [-1, 1], where 1.0 means identical direction and
/// 0.0 means orthogonal.
///
/// # Panics
///
/// Panics if vectors have different lengths
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "Vectors must have same length");

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidra_domain::{Category, EvidenceLevel};

    fn draft(text: &str) -> ClaimDraft {
        ClaimDraft {
            text: text.to_string(),
            summary: text.to_string(),
            category: Category::General,
            evidence_level: EvidenceLevel::Observational,
            confidence: 0.7,
            sample_size: None,
            study_design: None,
            key_findings: vec![],
            limitations: vec![],
        }
    }

    #[test]
    fn test_mock_embedding_deterministic() {
        let model = MockModel::new(1536);

        let embedding1 = model.embed("progressive overload drives hypertrophy").unwrap();
        let embedding2 = model.embed("progressive overload drives hypertrophy").unwrap();

        assert_eq!(embedding1, embedding2, "Same text should produce same embedding");
        assert_eq!(embedding1.len(), 1536);
    }

    #[test]
    fn test_mock_embedding_normalized() {
        let model = MockModel::new(1536);
        let embedding = model.embed("test text").unwrap();

        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.0001, "Embedding should be normalized");
    }

    #[test]
    fn test_mock_embedding_different_texts() {
        let model = MockModel::new(1536);

        let embedding1 = model.embed("hello world").unwrap();
        let embedding2 = model.embed("goodbye world").unwrap();

        assert_ne!(embedding1, embedding2);
        let similarity = cosine_similarity(&embedding1, &embedding2);
        assert!(similarity.abs() < 0.9, "Different texts should have moderate similarity");
    }

    #[test]
    fn test_mock_embedding_empty_text() {
        let model = MockModel::new(1536);
        assert!(model.embed("").is_err());
    }

    #[test]
    fn test_mock_embed_call_count() {
        let model = MockModel::new(8);
        assert_eq!(model.embed_calls(), 0);
        model.embed("a").unwrap();
        model.embed("b").unwrap();
        assert_eq!(model.embed_calls(), 2);
    }

    #[test]
    fn test_mock_scripted_drafts() {
        let model = MockModel::new(8);
        model.add_drafts("Known Title", vec![draft("claim one"), draft("claim two")]);

        let known = model
            .extract_claims(&ExtractionInput {
                title: "Known Title".to_string(),
                authors: vec![],
                abstract_text: "text".to_string(),
                journal: None,
            })
            .unwrap();
        assert_eq!(known.len(), 2);

        let unknown = model
            .extract_claims(&ExtractionInput {
                title: "Unknown".to_string(),
                authors: vec![],
                abstract_text: "text".to_string(),
                journal: None,
            })
            .unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn test_mock_verdict_order_insensitive() {
        let model = MockModel::new(8);
        model.add_verdict(
            "claim a",
            "claim b",
            ContradictionVerdict {
                contradicts: true,
                strength: 0.9,
                rationale: "opposite".to_string(),
            },
        );

        let forward = model.assess_contradiction("claim a", "claim b").unwrap();
        let reverse = model.assess_contradiction("claim b", "claim a").unwrap();
        assert!(forward.contradicts);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_mock_failure_marker() {
        let model = MockModel::new(8);
        model.fail_on("poison");

        assert!(model.embed("poison pill").is_err());
        assert!(model.embed("healthy text").is_ok());
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let vec = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&vec, &vec) - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let vec1 = vec![1.0, 0.0, 0.0];
        let vec2 = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&vec1, &vec2).abs() < 0.0001);
    }

    #[test]
    fn test_mock_clone_shares_state() {
        let model1 = MockModel::new(8);
        let model2 = model1.clone();

        model1.embed("shared").unwrap();
        assert_eq!(model2.embed_calls(), 1);
    }
}
