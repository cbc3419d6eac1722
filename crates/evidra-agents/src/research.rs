//! Research agent: polls literature sources into the research queue
//!
//! Each cycle asks every configured source for recent publications and
//! enqueues what it has not seen before. A failing source is logged and
//! skipped; the remaining sources still run.

use crate::agent::{lock_store, unix_now, Agent, AgentError, RunSummary};
use crate::config::ResearchConfig;
use evidra_domain::traits::ClaimStore;
use evidra_sources::{CandidateRecord, LiteratureSource};
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// Fills the research queue from upstream literature sources
pub struct ResearchAgent<S> {
    store: Arc<Mutex<S>>,
    sources: Vec<Box<dyn LiteratureSource + Send>>,
    config: ResearchConfig,
}

impl<S> ResearchAgent<S>
where
    S: ClaimStore,
    S::Error: Display,
{
    /// Create an agent over the given sources
    pub fn new(
        store: Arc<Mutex<S>>,
        sources: Vec<Box<dyn LiteratureSource + Send>>,
        config: ResearchConfig,
    ) -> Self {
        Self {
            store,
            sources,
            config,
        }
    }

    /// True when a candidate is worth queueing at all
    ///
    /// Extraction needs an abstract, and publications past the age
    /// bound are not queued.
    fn accepts(&self, record: &CandidateRecord, now: u64) -> bool {
        let has_abstract = record
            .abstract_text
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty());
        if !has_abstract {
            return false;
        }
        match record.published_at {
            Some(published) => {
                now.saturating_sub(published) <= u64::from(self.config.max_age_days) * 86_400
            }
            None => true,
        }
    }

    /// Queue priority for a candidate, 1 (highest) to 10
    ///
    /// Starts at the default of 5 and moves up for markers of strong
    /// evidence: review-type titles, randomized designs, a priority
    /// journal, or a very recent publication date.
    fn priority_for(&self, record: &CandidateRecord, now: u64) -> u8 {
        let mut priority: i32 = 5;
        let haystack = format!(
            "{} {}",
            record.title.to_lowercase(),
            record
                .abstract_text
                .as_deref()
                .unwrap_or("")
                .to_lowercase()
        );

        if haystack.contains("meta-analysis") || haystack.contains("systematic review") {
            priority -= 2;
        } else if haystack.contains("randomized") || haystack.contains("randomised") {
            priority -= 1;
        }

        if let Some(journal) = &record.journal {
            let journal = journal.to_lowercase();
            if self
                .config
                .priority_journals
                .iter()
                .any(|j| journal.contains(&j.to_lowercase()))
            {
                priority -= 1;
            }
        }

        // Published within the last 30 days
        if let Some(published) = record.published_at {
            if now.saturating_sub(published) < 30 * 86_400 {
                priority -= 1;
            }
        }

        priority.clamp(1, 10) as u8
    }
}

impl<S> Agent for ResearchAgent<S>
where
    S: ClaimStore,
    S::Error: Display,
{
    fn name(&self) -> &'static str {
        "research"
    }

    fn process(&mut self) -> Result<RunSummary, AgentError> {
        let mut summary = RunSummary::default();
        let now = unix_now();
        let days_back = self.config.days_back;
        let batch_size = self.config.batch_size;

        for idx in 0..self.sources.len() {
            let source = &mut self.sources[idx];
            let source_name = source.name().to_string();
            let records = match source.fetch_recent(days_back, batch_size) {
                Ok(records) => records,
                Err(e) => {
                    error!(source = %source_name, error = %e, "source fetch failed");
                    summary.failed += 1;
                    continue;
                }
            };

            debug!(
                source = %source_name,
                count = records.len(),
                "source fetch complete"
            );

            for record in records {
                summary.processed += 1;
                if !self.accepts(&record, now) {
                    debug!(title = %record.title, "candidate filtered out");
                    summary.skipped += 1;
                    continue;
                }
                let priority = self.priority_for(&record, now);
                let mut item = record.into_queue_item(now);
                item.priority = priority;

                let mut store = lock_store(&self.store);
                match store.enqueue_item(item) {
                    Ok(true) => summary.succeeded += 1,
                    Ok(false) => summary.skipped += 1,
                    Err(e) => {
                        error!(error = %e, "enqueue failed");
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            enqueued = summary.succeeded,
            duplicates = summary.skipped,
            failed = summary.failed,
            "research cycle complete"
        );
        Ok(summary)
    }
}
