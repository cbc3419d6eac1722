//! Validation agent: deduplicates, scores, and activates draft claims
//!
//! Each draft is checked against the active knowledge base. Near
//! duplicates are deprecated immediately. Surviving drafts get a
//! quality score; high scorers activate automatically, low scorers are
//! rejected, the middle band is flagged for human review. A draft
//! contradicted by a stronger-evidence active claim is always flagged.

use crate::agent::{lock_store, unix_now, Agent, AgentError, RunSummary};
use crate::config::ValidationConfig;
use evidra_domain::traits::{ClaimStore, LanguageModel};
use evidra_domain::{
    Claim, ClaimStatus, KnowledgeRelationship, RelationshipType, ValidationAction,
    ValidationLogEntry,
};
use evidra_llm::cosine_similarity;
use evidra_search::trigram_similarity;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const MIN_CLAIM_TEXT_LEN: usize = 30;

/// Validates draft claims against the active knowledge base
pub struct ValidationAgent<S, M> {
    store: Arc<Mutex<S>>,
    model: Arc<M>,
    config: ValidationConfig,
}

/// Outcome of scoring one draft
struct Assessment {
    score: f64,
    reasons: Vec<String>,
    flagged_by_stronger: bool,
}

impl<S, M> ValidationAgent<S, M>
where
    S: ClaimStore,
    S::Error: Display,
    M: LanguageModel,
    M::Error: Display,
{
    /// Create an agent over the shared store and model
    pub fn new(store: Arc<Mutex<S>>, model: Arc<M>, config: ValidationConfig) -> Self {
        Self {
            store,
            model,
            config,
        }
    }

    /// Best similarity between a draft and one active claim
    ///
    /// Uses cosine similarity when the active claim has an embedding of
    /// matching dimension, falling back to trigram text similarity.
    fn similarity(draft_embedding: Option<&[f32]>, draft: &Claim, active: &Claim) -> f64 {
        let semantic = match (draft_embedding, active.embedding.as_deref()) {
            (Some(a), Some(b)) if a.len() == b.len() => Some(f64::from(cosine_similarity(a, b))),
            _ => None,
        };
        let textual = trigram_similarity(&draft.text, &active.text);
        semantic.map_or(textual, |s| s.max(textual))
    }

    /// Quality score in [0, 1] with the reasons behind each deduction
    fn quality_score(draft: &Claim) -> (f64, Vec<String>) {
        let mut score: f64 = 1.0;
        let mut reasons = Vec::new();

        if let Some(design) = draft.study_design {
            if draft.evidence_level > design.maximum_evidence_level()
                || draft.evidence_level < design.minimum_evidence_level()
            {
                score -= 0.3;
                reasons.push(format!(
                    "evidence level {:?} inconsistent with study design {:?}",
                    draft.evidence_level, design
                ));
            }
        }
        if draft.sample_size.is_none() {
            score -= 0.1;
            reasons.push("no sample size reported".to_string());
        }
        if draft.text.trim().len() < MIN_CLAIM_TEXT_LEN {
            score -= 0.2;
            reasons.push("claim text too short".to_string());
        }
        if draft.confidence < 0.3 {
            score -= 0.2;
            reasons.push("low extraction confidence".to_string());
        }

        (score.clamp(0.0, 1.0), reasons)
    }

    /// Find the most similar active claim, if any crosses the threshold
    fn find_duplicate(
        &self,
        draft: &Claim,
        draft_embedding: Option<&[f32]>,
        actives: &[Claim],
    ) -> Option<(Claim, f64)> {
        let mut best: Option<(Claim, f64)> = None;
        for active in actives {
            let similarity = Self::similarity(draft_embedding, draft, active);
            if similarity >= self.config.duplicate_threshold
                && best.as_ref().map_or(true, |(_, s)| similarity > *s)
            {
                best = Some((active.clone(), similarity));
            }
        }
        best
    }

    /// Check for contradictions with active claims in the same category
    fn assess(&self, draft: &Claim, actives: &[Claim]) -> Result<Assessment, AgentError> {
        let (score, mut reasons) = Self::quality_score(draft);
        let mut flagged_by_stronger = false;

        if !self.config.check_contradictions {
            return Ok(Assessment {
                score,
                reasons,
                flagged_by_stronger,
            });
        }

        // Most textually related candidates first, bounded per draft
        let mut candidates: Vec<&Claim> = actives
            .iter()
            .filter(|c| c.category == draft.category)
            .collect();
        candidates.sort_by(|a, b| {
            trigram_similarity(&draft.text, &b.text)
                .partial_cmp(&trigram_similarity(&draft.text, &a.text))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(self.config.contradiction_candidates);

        for candidate in candidates {
            let verdict = match self.model.assess_contradiction(&draft.text, &candidate.text) {
                Ok(verdict) => verdict,
                Err(e) => {
                    warn!(error = %e, "contradiction assessment failed");
                    continue;
                }
            };
            if !verdict.contradicts || verdict.strength < self.config.contradiction_min_strength {
                continue;
            }

            let now = unix_now();
            let mut store = lock_store(&self.store);
            store
                .upsert_relationship(KnowledgeRelationship::new(
                    draft.id,
                    candidate.id,
                    RelationshipType::Contradicts,
                    verdict.strength,
                    now,
                ))
                .map_err(|e| AgentError::Store(e.to_string()))?;
            store
                .set_conflicting(candidate.id, true, now)
                .map_err(|e| AgentError::Store(e.to_string()))?;

            if candidate.evidence_level > draft.evidence_level {
                flagged_by_stronger = true;
                reasons.push(format!(
                    "contradicts higher-evidence claim {}: {}",
                    candidate.id, verdict.rationale
                ));
            } else {
                reasons.push(format!(
                    "contradicts claim {}: {}",
                    candidate.id, verdict.rationale
                ));
            }
        }

        Ok(Assessment {
            score,
            reasons,
            flagged_by_stronger,
        })
    }

    fn validate_draft(&mut self, draft: &Claim, actives: &[Claim]) -> Result<bool, AgentError> {
        let now = unix_now();

        let draft_embedding = match self.model.embed(&draft.text) {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "draft embedding failed, using text similarity only");
                None
            }
        };

        if let Some((duplicate, similarity)) =
            self.find_duplicate(draft, draft_embedding.as_deref(), actives)
        {
            debug!(draft = %draft.id, duplicate = %duplicate.id, similarity, "duplicate draft");
            let mut store = lock_store(&self.store);
            store
                .set_claim_status(draft.id, ClaimStatus::Deprecated, None, Some("auto"), now)
                .map_err(|e| AgentError::Store(e.to_string()))?;
            store
                .upsert_relationship(KnowledgeRelationship::new(
                    draft.id,
                    duplicate.id,
                    RelationshipType::Duplicates,
                    similarity,
                    now,
                ))
                .map_err(|e| AgentError::Store(e.to_string()))?;
            store
                .record_validation(ValidationLogEntry::automatic(
                    draft.id,
                    ValidationAction::Deprecated,
                    None,
                    vec![format!(
                        "duplicate of {} (similarity {:.2})",
                        duplicate.id, similarity
                    )],
                    now,
                ))
                .map_err(|e| AgentError::Store(e.to_string()))?;
            return Ok(false);
        }

        let assessment = self.assess(draft, actives)?;

        let (status, action) = if assessment.flagged_by_stronger {
            (ClaimStatus::Flagged, ValidationAction::Flagged)
        } else if assessment.score < self.config.reject_score {
            (ClaimStatus::Rejected, ValidationAction::Rejected)
        } else if assessment.score >= self.config.auto_approve_score {
            (ClaimStatus::Active, ValidationAction::AutoApproved)
        } else {
            (ClaimStatus::Flagged, ValidationAction::Flagged)
        };

        let now = unix_now();
        let mut store = lock_store(&self.store);
        store
            .set_claim_status(draft.id, status, Some(assessment.score), Some("auto"), now)
            .map_err(|e| AgentError::Store(e.to_string()))?;
        if assessment.flagged_by_stronger {
            // The contradiction goes both ways; mark the draft too
            store
                .set_conflicting(draft.id, true, now)
                .map_err(|e| AgentError::Store(e.to_string()))?;
        }
        store
            .record_validation(ValidationLogEntry::automatic(
                draft.id,
                action,
                Some(assessment.score),
                assessment.reasons,
                now,
            ))
            .map_err(|e| AgentError::Store(e.to_string()))?;

        debug!(draft = %draft.id, ?status, score = assessment.score, "draft validated");
        Ok(true)
    }
}

impl<S, M> Agent for ValidationAgent<S, M>
where
    S: ClaimStore,
    S::Error: Display,
    M: LanguageModel,
    M::Error: Display,
{
    fn name(&self) -> &'static str {
        "validation"
    }

    fn process(&mut self) -> Result<RunSummary, AgentError> {
        let mut summary = RunSummary::default();

        let (drafts, actives) = {
            let store = lock_store(&self.store);
            let drafts = store
                .query_claims(&evidra_domain::traits::ClaimFilter {
                    status: Some(ClaimStatus::Draft),
                    limit: Some(self.config.batch_size),
                    ..Default::default()
                })
                .map_err(|e| AgentError::Store(e.to_string()))?;
            let actives = store
                .query_claims(&evidra_domain::traits::ClaimFilter {
                    status: Some(ClaimStatus::Active),
                    ..Default::default()
                })
                .map_err(|e| AgentError::Store(e.to_string()))?;
            (drafts, actives)
        };

        for draft in &drafts {
            summary.processed += 1;
            match self.validate_draft(draft, &actives) {
                Ok(true) => summary.succeeded += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    warn!(draft = %draft.id, error = %e, "validation failed");
                    summary.failed += 1;
                }
            }
        }

        if summary.processed > 0 {
            info!(
                processed = summary.processed,
                decided = summary.succeeded,
                duplicates = summary.skipped,
                failed = summary.failed,
                "validation cycle complete"
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidra_domain::traits::{ClaimFilter, ContradictionVerdict};
    use evidra_domain::{Category, EmbeddingStatus, EvidenceLevel, StudyDesign};
    use evidra_llm::MockModel;
    use evidra_store::SqliteStore;

    fn shared_store() -> Arc<Mutex<SqliteStore>> {
        Arc::new(Mutex::new(SqliteStore::new(":memory:").unwrap()))
    }

    fn draft_claim(text: &str) -> Claim {
        let mut claim = Claim::draft(
            text.to_string(),
            "summary".to_string(),
            Category::Nutrition,
            EvidenceLevel::RandomizedTrial,
            0.8,
            "Source study".to_string(),
            unix_now(),
        );
        claim.sample_size = Some(100);
        claim.study_design = Some(StudyDesign::RandomizedControlledTrial);
        claim
    }

    fn insert(store: &Arc<Mutex<SqliteStore>>, claim: Claim) -> evidra_domain::ClaimId {
        store.lock().unwrap().insert_claim(claim).unwrap()
    }

    fn get(store: &Arc<Mutex<SqliteStore>>, id: evidra_domain::ClaimId) -> Claim {
        store.lock().unwrap().get_claim(id).unwrap().unwrap()
    }

    #[test]
    fn test_good_draft_auto_approves() {
        let store = shared_store();
        let id = insert(
            &store,
            draft_claim("creatine supplementation increases maximal strength in trained adults"),
        );

        let model = Arc::new(MockModel::new(8));
        let mut agent = ValidationAgent::new(store.clone(), model, ValidationConfig::default());
        let summary = agent.process().unwrap();
        assert_eq!(summary.succeeded, 1);

        let claim = get(&store, id);
        assert_eq!(claim.status, ClaimStatus::Active);
        assert_eq!(claim.validation_score, Some(1.0));

        let log = store.lock().unwrap().validation_log(id).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, ValidationAction::AutoApproved);
        assert_eq!(log[0].actor, "auto");
    }

    #[test]
    fn test_near_duplicate_text_deprecated() {
        let store = shared_store();

        let mut active = draft_claim("creatine supplementation increases maximal strength in adults");
        active.status = ClaimStatus::Active;
        let active_id = insert(&store, active);

        let draft_id = insert(
            &store,
            draft_claim("creatine supplementation increases maximal strength in adults"),
        );

        let model = Arc::new(MockModel::new(8));
        let mut agent = ValidationAgent::new(store.clone(), model, ValidationConfig::default());
        let summary = agent.process().unwrap();
        assert_eq!(summary.skipped, 1);

        let claim = get(&store, draft_id);
        assert_eq!(claim.status, ClaimStatus::Deprecated);

        let store = store.lock().unwrap();
        assert!(store
            .has_relationship(draft_id, active_id, RelationshipType::Duplicates)
            .unwrap());
        let log = store.validation_log(draft_id).unwrap();
        assert_eq!(log[0].action, ValidationAction::Deprecated);
    }

    #[test]
    fn test_weak_draft_flagged_for_review() {
        let store = shared_store();
        // Short text, no sample size, design/level mismatch
        let mut weak = draft_claim("too short a claim");
        weak.sample_size = None;
        weak.study_design = Some(StudyDesign::CaseReport);
        let id = insert(&store, weak);

        let model = Arc::new(MockModel::new(8));
        let mut agent = ValidationAgent::new(store.clone(), model, ValidationConfig::default());
        agent.process().unwrap();

        let claim = get(&store, id);
        // 1.0 - 0.3 (design) - 0.1 (sample) - 0.2 (short) = 0.4
        assert_eq!(claim.status, ClaimStatus::Flagged);
        assert!((claim.validation_score.unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_contradiction_with_stronger_evidence_flags_draft() {
        let store = shared_store();

        let mut active = draft_claim("high protein intake improves recovery outcomes in athletes");
        active.status = ClaimStatus::Active;
        active.evidence_level = EvidenceLevel::MetaAnalysis;
        active.study_design = Some(StudyDesign::MetaAnalysis);
        let active_id = insert(&store, active);

        let draft = draft_claim("high protein intake does not improve recovery outcomes at all");
        let draft_id = insert(&store, draft.clone());

        let model = Arc::new(MockModel::new(8));
        model.add_verdict(
            draft.text.clone(),
            "high protein intake improves recovery outcomes in athletes",
            ContradictionVerdict {
                contradicts: true,
                strength: 0.85,
                rationale: "direct negation".to_string(),
            },
        );

        let mut agent = ValidationAgent::new(store.clone(), model, ValidationConfig::default());
        agent.process().unwrap();

        let claim = get(&store, draft_id);
        assert_eq!(claim.status, ClaimStatus::Flagged);
        assert!(claim.conflicting);

        let store = store.lock().unwrap();
        assert!(store
            .has_relationship(draft_id, active_id, RelationshipType::Contradicts)
            .unwrap());
        let active = store.get_claim(active_id).unwrap().unwrap();
        assert!(active.conflicting);
    }

    #[test]
    fn test_second_run_leaves_decided_claims_alone() {
        let store = shared_store();
        let id = insert(
            &store,
            draft_claim("creatine supplementation increases maximal strength in trained adults"),
        );

        let model = Arc::new(MockModel::new(8));
        let mut agent = ValidationAgent::new(store.clone(), model, ValidationConfig::default());
        let first = agent.process().unwrap();
        assert_eq!(first.succeeded, 1);

        // The claim is active now, so a second cycle sees no drafts
        let second = agent.process().unwrap();
        assert_eq!(second.processed, 0);

        let claim = get(&store, id);
        assert_eq!(claim.status, ClaimStatus::Active);
        let log = store.lock().unwrap().validation_log(id).unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_process_survives_poisoned_store_lock() {
        let store = shared_store();
        insert(
            &store,
            draft_claim("creatine supplementation increases maximal strength in trained adults"),
        );

        // Poison the store mutex the way a panicking sibling would
        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.lock().unwrap();
            panic!("simulated sibling panic");
        })
        .join();

        let model = Arc::new(MockModel::new(8));
        let mut agent = ValidationAgent::new(store.clone(), model, ValidationConfig::default());
        let summary = agent.process().unwrap();
        assert_eq!(summary.succeeded, 1);
    }

    #[test]
    fn test_semantic_duplicate_via_embeddings() {
        let store = shared_store();
        let model = Arc::new(MockModel::new(8));

        // Same text hashes to the same mock embedding
        let text = "caffeine ingestion improves sprint performance in trained cyclists";
        let embedding = model.embed(text).unwrap();

        let mut active = draft_claim("an entirely different surface wording of the caffeine claim");
        active.text = "completely different wording about caffeine and sprinting".to_string();
        active.status = ClaimStatus::Active;
        active.embedding = Some(embedding);
        active.embedding_status = EmbeddingStatus::Completed;
        let _active_id = insert(&store, active);

        let draft_id = insert(&store, draft_claim(text));

        let mut agent = ValidationAgent::new(store.clone(), model, ValidationConfig::default());
        agent.process().unwrap();

        let claim = get(&store, draft_id);
        assert_eq!(claim.status, ClaimStatus::Deprecated);
    }

    #[test]
    fn test_batch_limit_respected() {
        let store = shared_store();
        for i in 0..5 {
            insert(
                &store,
                draft_claim(&format!("claim number {i} about something specific and long enough")),
            );
        }

        let model = Arc::new(MockModel::new(8));
        let config = ValidationConfig {
            batch_size: 2,
            ..Default::default()
        };
        let mut agent = ValidationAgent::new(store.clone(), model, config);
        let summary = agent.process().unwrap();
        assert_eq!(summary.processed, 2);

        let remaining = store
            .lock()
            .unwrap()
            .query_claims(&ClaimFilter {
                status: Some(ClaimStatus::Draft),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(remaining.len(), 3);
    }
}
