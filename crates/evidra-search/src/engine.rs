//! Retrieval engine
//!
//! The default hybrid mode blends cosine similarity from the vector
//! index with trigram text similarity; the semantic side dominates at
//! 0.7 weight, and text fills in when embeddings alone under-rank a
//! lexically obvious match. Semantic-only and text-only modes are
//! available for callers that want one signal.

use crate::index::{VectorIndex, VectorIndexError};
use crate::text::trigram_similarity;
use evidra_domain::{Category, Claim, ClaimId, EvidenceLevel};
use std::collections::HashMap;
use tracing::debug;

/// Weight given to cosine similarity in the blended score
pub const SEMANTIC_WEIGHT: f64 = 0.7;
/// Weight given to trigram similarity in the blended score
pub const TEXT_WEIGHT: f64 = 0.3;

const DEFAULT_EF_SEARCH: usize = 64;
/// Over-fetch factor so post-filtering still fills the result limit
const CANDIDATE_MULTIPLIER: usize = 4;

/// How query and claim similarity is scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Weighted blend of semantic and text similarity
    #[default]
    Hybrid,
    /// Cosine similarity alone, gated by `min_similarity`
    Semantic,
    /// Trigram text similarity alone
    Text,
}

/// Filters and limits for a retrieval query
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Scoring mode
    pub mode: SearchMode,
    /// Restrict results to one category
    pub category: Option<Category>,
    /// Drop claims below this evidence level
    pub min_evidence: Option<EvidenceLevel>,
    /// Semantic-mode cutoff; hits below it are dropped
    pub min_similarity: f64,
    /// Maximum number of hits to return
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            category: None,
            min_evidence: None,
            min_similarity: 0.7,
            limit: 10,
        }
    }
}

/// One retrieval result with its score breakdown
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched claim
    pub claim: Claim,
    /// Blended score in [0, 1]
    pub score: f64,
    /// Cosine similarity component
    pub semantic_score: f64,
    /// Trigram similarity component
    pub text_score: f64,
}

/// Retrieval engine over a snapshot of servable, embedded claims
pub struct RetrievalEngine {
    index: VectorIndex,
    claims: HashMap<ClaimId, Claim>,
}

impl RetrievalEngine {
    /// Build an engine from a claim snapshot
    ///
    /// Only active claims with a completed embedding of the expected
    /// dimension are indexed; everything else is skipped.
    pub fn build(dimension: usize, claims: Vec<Claim>) -> Result<Self, VectorIndexError> {
        let index = VectorIndex::new(dimension);
        let mut map = HashMap::new();

        for claim in claims {
            if !claim.is_servable() {
                continue;
            }
            let Some(embedding) = claim.embedding.as_deref() else {
                continue;
            };
            if embedding.len() != dimension {
                debug!(claim_id = %claim.id, len = embedding.len(), "skipping claim with mismatched embedding");
                continue;
            }
            index.add(claim.id, embedding)?;
            map.insert(claim.id, claim);
        }

        debug!(indexed = map.len(), "retrieval engine built");
        Ok(Self { index, claims: map })
    }

    /// Number of claims available for retrieval
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// True when no claims are indexed
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// Run a query in the mode named by `options`
    ///
    /// `query_embedding` must match the engine dimension; text mode
    /// ignores it. Results are ordered by score; ties break on
    /// evidence level, then confidence.
    pub fn search(
        &self,
        query_text: &str,
        query_embedding: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, VectorIndexError> {
        if self.claims.is_empty() || options.limit == 0 {
            return Ok(Vec::new());
        }
        if options.mode == SearchMode::Text {
            return Ok(self.search_text(query_text, options));
        }

        let k = (options.limit * CANDIDATE_MULTIPLIER).min(self.claims.len().max(1));
        let candidates = self.index.search(query_embedding, k, DEFAULT_EF_SEARCH)?;

        let hits: Vec<SearchHit> = candidates
            .into_iter()
            .filter_map(|(claim_id, similarity)| {
                let claim = self.claims.get(&claim_id)?;
                if !Self::passes_filters(claim, options) {
                    return None;
                }
                let semantic_score = f64::from(similarity).clamp(0.0, 1.0);
                if options.mode == SearchMode::Semantic && semantic_score < options.min_similarity {
                    return None;
                }
                let text_score = trigram_similarity(query_text, &claim.text);
                let score = match options.mode {
                    SearchMode::Semantic => semantic_score,
                    _ => SEMANTIC_WEIGHT * semantic_score + TEXT_WEIGHT * text_score,
                };
                Some(SearchHit {
                    claim: claim.clone(),
                    score,
                    semantic_score,
                    text_score,
                })
            })
            .collect();

        Ok(Self::rank(hits, options.limit))
    }

    /// Run a text-only query
    ///
    /// Needs no query embedding. Claims with zero trigram overlap are
    /// dropped rather than ranked at the bottom.
    pub fn search_text(&self, query_text: &str, options: &SearchOptions) -> Vec<SearchHit> {
        if options.limit == 0 {
            return Vec::new();
        }
        let hits: Vec<SearchHit> = self
            .claims
            .values()
            .filter(|claim| Self::passes_filters(claim, options))
            .filter_map(|claim| {
                let text_score = trigram_similarity(query_text, &claim.text);
                if text_score == 0.0 {
                    return None;
                }
                Some(SearchHit {
                    claim: claim.clone(),
                    score: text_score,
                    semantic_score: 0.0,
                    text_score,
                })
            })
            .collect();
        Self::rank(hits, options.limit)
    }

    fn passes_filters(claim: &Claim, options: &SearchOptions) -> bool {
        if let Some(category) = options.category {
            if claim.category != category {
                return false;
            }
        }
        if let Some(min) = options.min_evidence {
            if claim.evidence_level < min {
                return false;
            }
        }
        true
    }

    fn rank(mut hits: Vec<SearchHit>, limit: usize) -> Vec<SearchHit> {
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.claim.evidence_level.cmp(&a.claim.evidence_level))
                .then_with(|| {
                    b.claim
                        .confidence
                        .partial_cmp(&a.claim.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });
        hits.truncate(limit);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidra_domain::{ClaimStatus, EmbeddingStatus};

    fn active_claim(text: &str, category: Category, level: EvidenceLevel, embedding: Vec<f32>) -> Claim {
        let mut claim = Claim::draft(
            text.to_string(),
            "summary".to_string(),
            category,
            level,
            0.8,
            "Test Journal Article".to_string(),
            100,
        );
        claim.status = ClaimStatus::Active;
        claim.embedding = Some(embedding);
        claim.embedding_status = EmbeddingStatus::Completed;
        claim
    }

    #[test]
    fn test_build_skips_unembedded_and_inactive() {
        let embedded = active_claim(
            "creatine improves strength",
            Category::StrengthTraining,
            EvidenceLevel::MetaAnalysis,
            vec![1.0, 0.0, 0.0],
        );
        let mut draft = active_claim(
            "unembedded claim",
            Category::General,
            EvidenceLevel::Observational,
            vec![0.0, 1.0, 0.0],
        );
        draft.embedding = None;
        draft.embedding_status = EmbeddingStatus::Pending;
        let mut deprecated = active_claim(
            "deprecated claim",
            Category::General,
            EvidenceLevel::Observational,
            vec![0.0, 0.0, 1.0],
        );
        deprecated.status = ClaimStatus::Deprecated;

        let engine = RetrievalEngine::build(3, vec![embedded, draft, deprecated]).unwrap();
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_semantic_ranking_dominates() {
        let close = active_claim(
            "unrelated words entirely",
            Category::General,
            EvidenceLevel::Observational,
            vec![1.0, 0.0, 0.0],
        );
        let far = active_claim(
            "also unrelated words entirely",
            Category::General,
            EvidenceLevel::Observational,
            vec![0.0, 1.0, 0.0],
        );
        let close_id = close.id;

        let engine = RetrievalEngine::build(3, vec![close, far]).unwrap();
        let hits = engine
            .search("query", &[1.0, 0.0, 0.0], &SearchOptions::default())
            .unwrap();

        assert_eq!(hits[0].claim.id, close_id);
        assert!(hits[0].semantic_score > 0.99);
    }

    #[test]
    fn test_small_semantic_edge_beats_equal_text() {
        // 0.72 cosine similarity must outrank 0.70 when text scores match
        let angle_a = 0.72_f32;
        let angle_b = 0.70_f32;
        let orth_a = (1.0 - angle_a * angle_a).sqrt();
        let orth_b = (1.0 - angle_b * angle_b).sqrt();

        let better = active_claim(
            "identical text",
            Category::General,
            EvidenceLevel::Observational,
            vec![angle_a, orth_a, 0.0],
        );
        let worse = active_claim(
            "identical text",
            Category::General,
            EvidenceLevel::Observational,
            vec![angle_b, 0.0, orth_b],
        );
        let better_id = better.id;

        let engine = RetrievalEngine::build(3, vec![better, worse]).unwrap();
        let hits = engine
            .search("something else", &[1.0, 0.0, 0.0], &SearchOptions::default())
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].claim.id, better_id);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_text_overlap_breaks_semantic_tie() {
        let matching = active_claim(
            "creatine monohydrate improves strength",
            Category::General,
            EvidenceLevel::Observational,
            vec![1.0, 0.0, 0.0],
        );
        let other = active_claim(
            "zebra migration patterns in winter",
            Category::General,
            EvidenceLevel::Observational,
            vec![1.0, 0.0, 0.0],
        );
        let matching_id = matching.id;

        let engine = RetrievalEngine::build(3, vec![matching, other]).unwrap();
        let hits = engine
            .search(
                "creatine monohydrate improves strength",
                &[1.0, 0.0, 0.0],
                &SearchOptions::default(),
            )
            .unwrap();

        assert_eq!(hits[0].claim.id, matching_id);
        assert!(hits[0].text_score > hits[1].text_score);
    }

    #[test]
    fn test_strong_text_overlap_overcomes_semantic_lead() {
        // Perfect cosine with no text overlap blends to 0.70; cosine
        // 0.6 with identical text blends to 0.72 and must win
        let query = "beetroot juice boosts endurance";
        let semantic_only = active_claim(
            "zinc magnesium calm sleep myth",
            Category::General,
            EvidenceLevel::Observational,
            vec![1.0, 0.0, 0.0],
        );
        let text_match = active_claim(
            query,
            Category::General,
            EvidenceLevel::Observational,
            vec![0.6, 0.8, 0.0],
        );
        let text_match_id = text_match.id;

        let engine = RetrievalEngine::build(3, vec![semantic_only, text_match]).unwrap();
        let hits = engine
            .search(query, &[1.0, 0.0, 0.0], &SearchOptions::default())
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].claim.id, text_match_id);
        assert!((hits[0].score - 0.72).abs() < 0.01);
        assert!((hits[1].score - 0.70).abs() < 0.01);
        assert_eq!(hits[1].text_score, 0.0);
    }

    #[test]
    fn test_semantic_mode_gates_below_threshold() {
        let close = active_claim(
            "first claim",
            Category::General,
            EvidenceLevel::Observational,
            vec![1.0, 0.0, 0.0],
        );
        let distant = active_claim(
            "second claim",
            Category::General,
            EvidenceLevel::Observational,
            vec![0.5, 0.866, 0.0],
        );
        let close_id = close.id;

        let engine = RetrievalEngine::build(3, vec![close, distant]).unwrap();
        let options = SearchOptions {
            mode: SearchMode::Semantic,
            ..SearchOptions::default()
        };
        let hits = engine.search("query", &[1.0, 0.0, 0.0], &options).unwrap();

        // Cosine 0.5 falls below the 0.7 default cutoff
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].claim.id, close_id);
        assert_eq!(hits[0].score, hits[0].semantic_score);

        let options = SearchOptions {
            mode: SearchMode::Semantic,
            min_similarity: 0.4,
            ..SearchOptions::default()
        };
        let hits = engine.search("query", &[1.0, 0.0, 0.0], &options).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_text_mode_ignores_embeddings() {
        let lexical = active_claim(
            "creatine monohydrate improves strength",
            Category::General,
            EvidenceLevel::Observational,
            vec![0.0, 1.0, 0.0],
        );
        let unrelated = active_claim(
            "zinc magnesium calm sleep myth",
            Category::General,
            EvidenceLevel::Observational,
            vec![1.0, 0.0, 0.0],
        );
        let lexical_id = lexical.id;

        let engine = RetrievalEngine::build(3, vec![lexical, unrelated]).unwrap();
        let options = SearchOptions {
            mode: SearchMode::Text,
            ..SearchOptions::default()
        };
        let hits = engine.search_text("creatine monohydrate improves strength", &options);

        // Zero-overlap claims are dropped, not ranked last
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].claim.id, lexical_id);
        assert_eq!(hits[0].score, hits[0].text_score);
        assert_eq!(hits[0].semantic_score, 0.0);

        // The same options through `search` take the same path
        let via_search = engine
            .search("creatine monohydrate improves strength", &[1.0, 0.0, 0.0], &options)
            .unwrap();
        assert_eq!(via_search.len(), 1);
        assert_eq!(via_search[0].claim.id, lexical_id);
    }

    #[test]
    fn test_category_and_evidence_filters() {
        let nutrition = active_claim(
            "protein claim",
            Category::Nutrition,
            EvidenceLevel::MetaAnalysis,
            vec![1.0, 0.0, 0.0],
        );
        let recovery = active_claim(
            "sleep claim",
            Category::Recovery,
            EvidenceLevel::CaseReport,
            vec![0.9, 0.1, 0.0],
        );

        let engine = RetrievalEngine::build(3, vec![nutrition, recovery]).unwrap();

        let options = SearchOptions {
            category: Some(Category::Nutrition),
            ..SearchOptions::default()
        };
        let hits = engine.search("q", &[1.0, 0.0, 0.0], &options).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].claim.category, Category::Nutrition);

        let options = SearchOptions {
            min_evidence: Some(EvidenceLevel::RandomizedTrial),
            ..SearchOptions::default()
        };
        let hits = engine.search("q", &[1.0, 0.0, 0.0], &options).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].claim.evidence_level, EvidenceLevel::MetaAnalysis);
    }

    #[test]
    fn test_limit_and_empty_engine() {
        let engine = RetrievalEngine::build(3, Vec::new()).unwrap();
        assert!(engine.is_empty());
        let hits = engine
            .search("q", &[1.0, 0.0, 0.0], &SearchOptions::default())
            .unwrap();
        assert!(hits.is_empty());

        let claims: Vec<Claim> = (0..5)
            .map(|i| {
                active_claim(
                    "a claim",
                    Category::General,
                    EvidenceLevel::Observational,
                    vec![1.0, i as f32 * 0.01, 0.0],
                )
            })
            .collect();
        let engine = RetrievalEngine::build(3, claims).unwrap();
        let options = SearchOptions {
            limit: 2,
            ..SearchOptions::default()
        };
        let hits = engine.search("q", &[1.0, 0.0, 0.0], &options).unwrap();
        assert_eq!(hits.len(), 2);
    }
}
