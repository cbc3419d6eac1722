//! Knowledge agent: embeds claims and recomputes evidence hierarchies
//!
//! Each cycle first returns orphaned Processing rows to Pending, then
//! claims a batch, embeds each claim's text, and stores the result.
//! Categories touched by a completed embedding get their evidence
//! hierarchy recomputed at the end of the cycle.

use crate::agent::{lock_store, unix_now, Agent, AgentError, RunSummary};
use crate::config::KnowledgeConfig;
use evidra_domain::traits::{ClaimFilter, ClaimStore, LanguageModel};
use evidra_domain::{Category, EvidenceHierarchy};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Runs the async embedding pipeline and hierarchy aggregation
pub struct KnowledgeAgent<S, M> {
    store: Arc<Mutex<S>>,
    model: Arc<M>,
    config: KnowledgeConfig,
}

impl<S, M> KnowledgeAgent<S, M>
where
    S: ClaimStore,
    S::Error: Display,
    M: LanguageModel,
    M::Error: Display,
{
    /// Create an agent over the shared store and model
    pub fn new(store: Arc<Mutex<S>>, model: Arc<M>, config: KnowledgeConfig) -> Self {
        Self {
            store,
            model,
            config,
        }
    }

    fn recompute_hierarchy(&self, category: Category) -> Result<(), AgentError> {
        let now = unix_now();
        let mut store = lock_store(&self.store);
        let claims = store
            .query_claims(&ClaimFilter {
                category: Some(category),
                ..Default::default()
            })
            .map_err(|e| AgentError::Store(e.to_string()))?;
        let hierarchy = EvidenceHierarchy::from_claims(category, &claims, now);
        debug!(
            category = category.as_str(),
            claims = hierarchy.claim_count,
            consensus = ?hierarchy.consensus,
            "hierarchy recomputed"
        );
        store
            .store_hierarchy(&hierarchy)
            .map_err(|e| AgentError::Store(e.to_string()))
    }
}

impl<S, M> Agent for KnowledgeAgent<S, M>
where
    S: ClaimStore,
    S::Error: Display,
    M: LanguageModel,
    M::Error: Display,
{
    fn name(&self) -> &'static str {
        "knowledge"
    }

    fn process(&mut self) -> Result<RunSummary, AgentError> {
        let mut summary = RunSummary::default();
        let now = unix_now();

        let batch = {
            let mut store = lock_store(&self.store);

            let stale_before = now.saturating_sub(self.config.stale_after_secs);
            let recovered = store
                .reset_stale_embeddings(stale_before, now)
                .map_err(|e| AgentError::Store(e.to_string()))?;
            if recovered > 0 {
                warn!(recovered, "orphaned embedding rows returned to pending");
            }

            store
                .claim_pending_embeddings(self.config.batch_size, now)
                .map_err(|e| AgentError::Store(e.to_string()))?
        };

        let mut touched: HashSet<Category> = HashSet::new();

        for claim in &batch {
            summary.processed += 1;
            // Model call runs without holding the store lock
            match self.model.embed(&claim.text) {
                Ok(embedding) => {
                    lock_store(&self.store)
                        .complete_embedding(claim.id, &embedding, unix_now())
                        .map_err(|e| AgentError::Store(e.to_string()))?;
                    touched.insert(claim.category);
                    summary.succeeded += 1;
                }
                Err(e) => {
                    warn!(claim = %claim.id, error = %e, "embedding failed");
                    lock_store(&self.store)
                        .fail_embedding(claim.id, &e.to_string(), unix_now())
                        .map_err(|se| AgentError::Store(se.to_string()))?;
                    summary.failed += 1;
                }
            }
        }

        for category in touched {
            self.recompute_hierarchy(category)?;
        }

        if summary.processed > 0 {
            info!(
                embedded = summary.succeeded,
                failed = summary.failed,
                "knowledge cycle complete"
            );
        }
        Ok(summary)
    }
}
