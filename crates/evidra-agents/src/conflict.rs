//! Conflict agent: finds contradicting pairs among active claims
//!
//! Candidate pairs are active, embedded claims in the same category
//! whose cosine similarity crosses the candidate threshold. Only
//! candidates reach the model; the number of assessments per cycle is
//! bounded by the batch size. Confirmed conflicts are recorded as a
//! relationship and both claims are marked conflicting.

use crate::agent::{lock_store, unix_now, Agent, AgentError, RunSummary};
use crate::config::ConflictConfig;
use evidra_domain::traits::{ClaimFilter, ClaimStore, LanguageModel};
use evidra_domain::{
    Claim, ClaimStatus, KnowledgeRelationship, RelationshipType, ValidationAction,
    ValidationLogEntry,
};
use evidra_llm::cosine_similarity;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Scans active claims for semantic contradictions
pub struct ConflictAgent<S, M> {
    store: Arc<Mutex<S>>,
    model: Arc<M>,
    config: ConflictConfig,
}

impl<S, M> ConflictAgent<S, M>
where
    S: ClaimStore,
    S::Error: Display,
    M: LanguageModel,
    M::Error: Display,
{
    /// Create an agent over the shared store and model
    pub fn new(store: Arc<Mutex<S>>, model: Arc<M>, config: ConflictConfig) -> Self {
        Self {
            store,
            model,
            config,
        }
    }

    /// Candidate pairs above the similarity threshold, most similar first
    fn candidate_pairs(&self, claims: &[Claim]) -> Result<Vec<(Claim, Claim, f64)>, AgentError> {
        let mut pairs = Vec::new();
        let store = lock_store(&self.store);

        for (i, a) in claims.iter().enumerate() {
            for b in &claims[i + 1..] {
                if a.category != b.category {
                    continue;
                }
                let (Some(ea), Some(eb)) = (a.embedding.as_deref(), b.embedding.as_deref()) else {
                    continue;
                };
                if ea.len() != eb.len() {
                    continue;
                }
                let similarity = f64::from(cosine_similarity(ea, eb));
                if similarity < self.config.candidate_threshold {
                    continue;
                }
                // Pairs already assessed stay settled
                let known = store
                    .has_relationship(a.id, b.id, RelationshipType::Contradicts)
                    .map_err(|e| AgentError::Store(e.to_string()))?
                    || store
                        .has_relationship(a.id, b.id, RelationshipType::Duplicates)
                        .map_err(|e| AgentError::Store(e.to_string()))?;
                if !known {
                    pairs.push((a.clone(), b.clone(), similarity));
                }
            }
        }

        pairs.sort_by(|x, y| y.2.partial_cmp(&x.2).unwrap_or(std::cmp::Ordering::Equal));
        Ok(pairs)
    }

    fn record_conflict(
        &self,
        a: &Claim,
        b: &Claim,
        strength: f64,
        rationale: &str,
    ) -> Result<(), AgentError> {
        let now = unix_now();
        let mut store = lock_store(&self.store);
        store
            .upsert_relationship(KnowledgeRelationship::new(
                a.id,
                b.id,
                RelationshipType::Contradicts,
                strength,
                now,
            ))
            .map_err(|e| AgentError::Store(e.to_string()))?;
        for claim in [a, b] {
            store
                .set_conflicting(claim.id, true, now)
                .map_err(|e| AgentError::Store(e.to_string()))?;
            store
                .record_validation(ValidationLogEntry::automatic(
                    claim.id,
                    ValidationAction::ConflictFlagged,
                    Some(strength),
                    vec![rationale.to_string()],
                    now,
                ))
                .map_err(|e| AgentError::Store(e.to_string()))?;
        }
        Ok(())
    }
}

impl<S, M> Agent for ConflictAgent<S, M>
where
    S: ClaimStore,
    S::Error: Display,
    M: LanguageModel,
    M::Error: Display,
{
    fn name(&self) -> &'static str {
        "conflict"
    }

    fn process(&mut self) -> Result<RunSummary, AgentError> {
        let mut summary = RunSummary::default();

        let claims = self
            .store
            .lock()
            .unwrap()
            .query_claims(&ClaimFilter {
                status: Some(ClaimStatus::Active),
                embedded_only: true,
                ..Default::default()
            })
            .map_err(|e| AgentError::Store(e.to_string()))?;

        let mut pairs = self.candidate_pairs(&claims)?;
        pairs.truncate(self.config.batch_size);

        for (a, b, similarity) in pairs {
            summary.processed += 1;
            // Model call runs without holding the store lock
            let verdict = match self.model.assess_contradiction(&a.text, &b.text) {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!(a = %a.id, b = %b.id, error = %e, "conflict assessment failed");
                    summary.failed += 1;
                    continue;
                }
            };

            if verdict.contradicts && verdict.strength >= self.config.min_strength {
                debug!(
                    a = %a.id,
                    b = %b.id,
                    similarity,
                    strength = verdict.strength,
                    "conflict confirmed"
                );
                self.record_conflict(&a, &b, verdict.strength, &verdict.rationale)?;
                summary.succeeded += 1;
            } else {
                summary.skipped += 1;
            }
        }

        if summary.processed > 0 {
            info!(
                assessed = summary.processed,
                conflicts = summary.succeeded,
                "conflict scan complete"
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidra_domain::traits::ContradictionVerdict;
    use evidra_domain::{Category, EmbeddingStatus, EvidenceLevel};
    use evidra_llm::MockModel;
    use evidra_store::SqliteStore;

    fn shared_store() -> Arc<Mutex<SqliteStore>> {
        Arc::new(Mutex::new(SqliteStore::new(":memory:").unwrap()))
    }

    fn embedded_claim(text: &str, category: Category, embedding: Vec<f32>) -> Claim {
        let mut claim = Claim::draft(
            text.to_string(),
            "summary".to_string(),
            category,
            EvidenceLevel::RandomizedTrial,
            0.8,
            "Source".to_string(),
            unix_now(),
        );
        claim.status = ClaimStatus::Active;
        claim.embedding = Some(embedding);
        claim.embedding_status = EmbeddingStatus::Completed;
        claim
    }

    fn insert(store: &Arc<Mutex<SqliteStore>>, claim: Claim) -> evidra_domain::ClaimId {
        store.lock().unwrap().insert_claim(claim).unwrap()
    }

    #[test]
    fn test_confirmed_conflict_recorded_on_both_claims() {
        let store = shared_store();
        let a_text = "stretching before exercise reduces injury risk";
        let b_text = "stretching before exercise does not reduce injury risk";
        let a = insert(
            &store,
            embedded_claim(a_text, Category::Recovery, vec![1.0, 0.0, 0.05]),
        );
        let b = insert(
            &store,
            embedded_claim(b_text, Category::Recovery, vec![1.0, 0.0, 0.0]),
        );

        let model = Arc::new(MockModel::new(3));
        model.add_verdict(
            a_text,
            b_text,
            ContradictionVerdict {
                contradicts: true,
                strength: 0.9,
                rationale: "direct negation".to_string(),
            },
        );

        let mut agent = ConflictAgent::new(store.clone(), model, ConflictConfig::default());
        let summary = agent.process().unwrap();
        assert_eq!(summary.succeeded, 1);

        let store = store.lock().unwrap();
        assert!(store
            .has_relationship(a, b, RelationshipType::Contradicts)
            .unwrap());
        for id in [a, b] {
            let claim = store.get_claim(id).unwrap().unwrap();
            assert!(claim.conflicting);
            let log = store.validation_log(id).unwrap();
            assert_eq!(log[0].action, ValidationAction::ConflictFlagged);
        }
    }

    #[test]
    fn test_dissimilar_pairs_never_reach_model() {
        let store = shared_store();
        insert(
            &store,
            embedded_claim("claim about protein", Category::Nutrition, vec![1.0, 0.0, 0.0]),
        );
        insert(
            &store,
            embedded_claim("claim about sleep", Category::Nutrition, vec![0.0, 1.0, 0.0]),
        );

        let model = Arc::new(MockModel::new(3));
        let mut agent = ConflictAgent::new(store.clone(), model, ConflictConfig::default());
        let summary = agent.process().unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[test]
    fn test_cross_category_pairs_ignored() {
        let store = shared_store();
        insert(
            &store,
            embedded_claim("one claim", Category::Nutrition, vec![1.0, 0.0, 0.0]),
        );
        insert(
            &store,
            embedded_claim("other claim", Category::Recovery, vec![1.0, 0.0, 0.0]),
        );

        let model = Arc::new(MockModel::new(3));
        let mut agent = ConflictAgent::new(store.clone(), model, ConflictConfig::default());
        let summary = agent.process().unwrap();
        assert_eq!(summary.processed, 0);
    }

    #[test]
    fn test_known_pairs_not_reassessed() {
        let store = shared_store();
        let a_text = "first similar claim text";
        let b_text = "second similar claim text";
        let a = insert(
            &store,
            embedded_claim(a_text, Category::Cardio, vec![1.0, 0.0, 0.0]),
        );
        let b = insert(
            &store,
            embedded_claim(b_text, Category::Cardio, vec![1.0, 0.01, 0.0]),
        );

        let model = Arc::new(MockModel::new(3));
        model.add_verdict(
            a_text,
            b_text,
            ContradictionVerdict {
                contradicts: true,
                strength: 0.8,
                rationale: "test".to_string(),
            },
        );

        let mut agent = ConflictAgent::new(store.clone(), model, ConflictConfig::default());
        assert_eq!(agent.process().unwrap().succeeded, 1);

        // Second scan finds nothing new
        let summary = agent.process().unwrap();
        assert_eq!(summary.processed, 0);

        let log = store.lock().unwrap().validation_log(a).unwrap();
        assert_eq!(log.len(), 1);
        let _ = b;
    }

    #[test]
    fn test_non_contradicting_verdict_skipped() {
        let store = shared_store();
        let a_text = "caffeine improves endurance";
        let b_text = "caffeine improves endurance performance";
        insert(
            &store,
            embedded_claim(a_text, Category::Cardio, vec![1.0, 0.0, 0.0]),
        );
        insert(
            &store,
            embedded_claim(b_text, Category::Cardio, vec![1.0, 0.02, 0.0]),
        );

        let model = Arc::new(MockModel::new(3));
        // Unscripted pairs return a non-contradicting default
        let mut agent = ConflictAgent::new(store.clone(), model, ConflictConfig::default());
        let summary = agent.process().unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 0);
    }
}
