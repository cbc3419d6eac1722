//! Extraction agent: turns queued abstracts into draft claims
//!
//! Items without an abstract are rejected up front. Transient model
//! failures mark the item failed but retriable; once the attempt
//! budget is spent the item is rejected for good.

use crate::agent::{lock_store, unix_now, Agent, AgentError, RunSummary};
use crate::config::ExtractionConfig;
use evidra_domain::traits::{ClaimDraft, ClaimStore, ExtractionInput, LanguageModel};
use evidra_domain::{Claim, QueueStatus, ResearchQueueItem};
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Converts research queue items into draft claims via the model
pub struct ExtractionAgent<S, M> {
    store: Arc<Mutex<S>>,
    model: Arc<M>,
    config: ExtractionConfig,
}

impl<S, M> ExtractionAgent<S, M>
where
    S: ClaimStore,
    S::Error: Display,
    M: LanguageModel,
    M::Error: Display,
{
    /// Create an agent over the shared store and model
    pub fn new(store: Arc<Mutex<S>>, model: Arc<M>, config: ExtractionConfig) -> Self {
        Self {
            store,
            model,
            config,
        }
    }

    fn claim_from_draft(&self, draft: ClaimDraft, item: &ResearchQueueItem, now: u64) -> Claim {
        let mut claim = Claim::draft(
            draft.text,
            draft.summary,
            draft.category,
            draft.evidence_level,
            draft.confidence * self.config.confidence_damping,
            item.title.clone(),
            now,
        );
        claim.sample_size = draft.sample_size;
        claim.study_design = draft.study_design;
        claim.source_doi = item.doi.clone();
        claim.source_journal = item.journal.clone();
        claim.source_url = item.url.clone();
        claim
    }

    fn handle_item(&mut self, item: &ResearchQueueItem) -> Result<ItemOutcome, AgentError> {
        let now = unix_now();
        // Attempts increment on this transition
        lock_store(&self.store)
            .update_queue_item(item.id, QueueStatus::Processing, None, now)
            .map_err(|e| AgentError::Store(e.to_string()))?;

        let abstract_text = match item.abstract_text.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => {
                lock_store(&self.store)
                    .update_queue_item(
                        item.id,
                        QueueStatus::Rejected,
                        Some("no abstract available"),
                        unix_now(),
                    )
                    .map_err(|e| AgentError::Store(e.to_string()))?;
                return Ok(ItemOutcome::Rejected);
            }
        };

        let input = ExtractionInput {
            title: item.title.clone(),
            authors: item.authors.clone(),
            abstract_text,
            journal: item.journal.clone(),
        };

        // Model call runs without holding the store lock
        match self.model.extract_claims(&input) {
            Ok(drafts) => {
                let count = drafts.len();
                let mut store = lock_store(&self.store);
                let mut inserted = 0;
                for draft in drafts {
                    let claim = self.claim_from_draft(draft, item, unix_now());
                    match store.insert_claim(claim) {
                        Ok(_) => inserted += 1,
                        Err(e) => error!(error = %e, "claim insert failed"),
                    }
                }
                store
                    .update_queue_item(item.id, QueueStatus::Completed, None, unix_now())
                    .map_err(|e| AgentError::Store(e.to_string()))?;
                debug!(item = %item.id, drafts = count, inserted, "item extracted");
                Ok(ItemOutcome::Completed)
            }
            Err(e) => {
                let attempts = item.attempts + 1;
                let exhausted = attempts >= self.config.max_attempts;
                let status = if exhausted {
                    QueueStatus::Rejected
                } else {
                    // Retriable on a later cycle
                    QueueStatus::Failed
                };
                warn!(
                    item = %item.id,
                    attempts,
                    exhausted,
                    error = %e,
                    "extraction attempt failed"
                );
                lock_store(&self.store)
                    .update_queue_item(item.id, status, Some(&e.to_string()), unix_now())
                    .map_err(|se| AgentError::Store(se.to_string()))?;
                Ok(ItemOutcome::Failed)
            }
        }
    }
}

enum ItemOutcome {
    Completed,
    Rejected,
    Failed,
}

impl<S, M> Agent for ExtractionAgent<S, M>
where
    S: ClaimStore,
    S::Error: Display,
    M: LanguageModel,
    M::Error: Display,
{
    fn name(&self) -> &'static str {
        "extraction"
    }

    fn process(&mut self) -> Result<RunSummary, AgentError> {
        let mut summary = RunSummary::default();

        let items = lock_store(&self.store)
            .pending_queue_items(self.config.batch_size)
            .map_err(|e| AgentError::Store(e.to_string()))?;

        for item in &items {
            summary.processed += 1;
            match self.handle_item(item)? {
                ItemOutcome::Completed => summary.succeeded += 1,
                ItemOutcome::Rejected => summary.skipped += 1,
                ItemOutcome::Failed => summary.failed += 1,
            }
        }

        if summary.processed > 0 {
            info!(
                processed = summary.processed,
                extracted = summary.succeeded,
                rejected = summary.skipped,
                failed = summary.failed,
                "extraction cycle complete"
            );
        }
        Ok(summary)
    }
}
