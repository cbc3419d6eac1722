//! Pipeline scheduler
//!
//! Owns the five agents and drives each on its own interval from a
//! tokio runtime. Agent cycles are synchronous and run on blocking
//! threads so a slow model call never stalls the runtime.

use crate::agent::{lock_store, unix_now, Agent, AgentError, RunSummary};
use crate::config::PipelineConfig;
use crate::conflict::ConflictAgent;
use crate::extraction::ExtractionAgent;
use crate::knowledge::KnowledgeAgent;
use crate::research::ResearchAgent;
use crate::validation::ValidationAgent;
use evidra_domain::traits::{AgentRunRecord, ClaimStore, LanguageModel};
use evidra_sources::LiteratureSource;
use std::collections::HashMap;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Last observed run of one agent
#[derive(Debug, Clone, Default)]
pub struct AgentStatus {
    /// Unix time of the last completed cycle
    pub last_run: Option<u64>,
    /// Counters from the last cycle, when it succeeded
    pub last_summary: Option<RunSummary>,
    /// Error message from the last cycle, when it failed
    pub last_error: Option<String>,
    /// Unix time the next cycle is due
    pub next_run: Option<u64>,
}

/// Shared per-agent status, updated after every cycle
pub type StatusBoard = Arc<Mutex<HashMap<&'static str, AgentStatus>>>;

fn record_run<S>(
    board: &StatusBoard,
    store: &Arc<Mutex<S>>,
    name: &'static str,
    outcome: &Result<RunSummary, AgentError>,
    period: Option<Duration>,
) where
    S: ClaimStore,
    S::Error: Display,
{
    let now = unix_now();
    {
        let mut board = lock_store(board);
        let status = board.entry(name).or_default();
        status.last_run = Some(now);
        status.next_run = period.map(|p| now + p.as_secs());
        match outcome {
            Ok(summary) => {
                status.last_summary = Some(*summary);
                status.last_error = None;
            }
            Err(e) => status.last_error = Some(e.to_string()),
        }
    }

    let summary = outcome.as_ref().copied().unwrap_or_default();
    let record = AgentRunRecord {
        agent: name.to_string(),
        last_run: now,
        processed: summary.processed,
        succeeded: summary.succeeded,
        failed: summary.failed,
        skipped: summary.skipped,
        last_error: outcome.as_ref().err().map(|e| e.to_string()),
    };
    if let Err(e) = lock_store(store).record_agent_run(&record) {
        warn!(agent = name, error = %e, "failed to persist agent run");
    }
}

/// Drives the pipeline agents on their configured intervals
pub struct Scheduler<S, M> {
    research: ResearchAgent<S>,
    extraction: ExtractionAgent<S, M>,
    validation: ValidationAgent<S, M>,
    knowledge: KnowledgeAgent<S, M>,
    conflict: ConflictAgent<S, M>,
    store: Arc<Mutex<S>>,
    config: PipelineConfig,
    status: StatusBoard,
}

impl<S, M> Scheduler<S, M>
where
    S: ClaimStore + Send + 'static,
    S::Error: Display,
    M: LanguageModel + Send + Sync + 'static,
    M::Error: Display,
{
    /// Assemble the pipeline over a shared store, model, and sources
    pub fn new(
        store: Arc<Mutex<S>>,
        model: Arc<M>,
        sources: Vec<Box<dyn LiteratureSource + Send>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            research: ResearchAgent::new(store.clone(), sources, config.research.clone()),
            extraction: ExtractionAgent::new(store.clone(), model.clone(), config.extraction.clone()),
            validation: ValidationAgent::new(store.clone(), model.clone(), config.validation.clone()),
            knowledge: KnowledgeAgent::new(store.clone(), model.clone(), config.knowledge.clone()),
            conflict: ConflictAgent::new(store.clone(), model, config.conflict.clone()),
            store,
            config,
            status: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Handle to the shared per-agent status, valid across `run`
    pub fn status_board(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Snapshot of each agent's last run, in pipeline order
    pub fn status(&self) -> Vec<(&'static str, AgentStatus)> {
        let board = lock_store(&self.status);
        ["research", "extraction", "validation", "knowledge", "conflict"]
            .iter()
            .map(|name| (*name, board.get(name).cloned().unwrap_or_default()))
            .collect()
    }

    /// Run agents exactly once, in pipeline order
    ///
    /// `only` restricts the pass to one named agent; `None` runs all
    /// five, which moves material a full step through the pipeline.
    pub async fn run_once(
        &mut self,
        only: Option<&str>,
    ) -> Result<Vec<(&'static str, RunSummary)>, AgentError> {
        let agents: [&mut dyn Agent; 5] = [
            &mut self.research,
            &mut self.extraction,
            &mut self.validation,
            &mut self.knowledge,
            &mut self.conflict,
        ];
        if let Some(name) = only {
            if !agents.iter().any(|a| a.name() == name) {
                return Err(AgentError::UnknownAgent(name.to_string()));
            }
        }

        let mut results = Vec::with_capacity(5);
        for agent in agents {
            let name = agent.name();
            if only.is_some_and(|o| o != name) {
                continue;
            }
            let outcome = agent.process();
            record_run(&self.status, &self.store, name, &outcome, None);
            results.push((name, outcome?));
        }
        Ok(results)
    }

    /// Run the pipeline until a shutdown signal (Ctrl+C) arrives
    ///
    /// On shutdown, in-flight cycles are drained within the configured
    /// timeout; anything still running after that is aborted.
    pub async fn run(self) -> Result<(), AgentError> {
        info!(
            research_interval = self.config.research.interval_secs,
            extraction_interval = self.config.extraction.interval_secs,
            validation_interval = self.config.validation.interval_secs,
            knowledge_interval = self.config.knowledge.interval_secs,
            conflict_interval = self.config.conflict.interval_secs,
            "pipeline started"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let board = self.status;
        let store = self.store;
        let handles = vec![
            spawn_agent(
                self.research,
                self.config.research.interval(),
                board.clone(),
                store.clone(),
                shutdown_rx.clone(),
            ),
            spawn_agent(
                self.extraction,
                self.config.extraction.interval(),
                board.clone(),
                store.clone(),
                shutdown_rx.clone(),
            ),
            spawn_agent(
                self.validation,
                self.config.validation.interval(),
                board.clone(),
                store.clone(),
                shutdown_rx.clone(),
            ),
            spawn_agent(
                self.knowledge,
                self.config.knowledge.interval(),
                board.clone(),
                store.clone(),
                shutdown_rx.clone(),
            ),
            spawn_agent(
                self.conflict,
                self.config.conflict.interval(),
                board,
                store,
                shutdown_rx,
            ),
        ];

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received, draining in-flight cycles");
        let _ = shutdown_tx.send(true);

        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout();
        for handle in handles {
            let abort = handle.abort_handle();
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                abort.abort();
            }
        }
        Ok(())
    }
}

/// Loop one agent on its interval, running cycles on blocking threads
///
/// A shutdown signal observed between ticks stops the loop; a signal
/// during a cycle lets the cycle finish first. A panicking cycle is
/// caught, recorded as a failed run, and the loop keeps ticking.
fn spawn_agent<A, S>(
    mut agent: A,
    period: Duration,
    board: StatusBoard,
    store: Arc<Mutex<S>>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    A: Agent + Send + 'static,
    S: ClaimStore + Send + 'static,
    S::Error: Display,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    info!(agent = agent.name(), "agent stopped");
                    break;
                }
            }
            let name = agent.name();
            // Move the agent into the blocking task and back out. The
            // catch_unwind keeps the agent alive through a panicking
            // cycle; lock recovery makes the borrowed state usable on
            // the next tick.
            let result = tokio::task::spawn_blocking(move || {
                let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| agent.process()))
                    .unwrap_or_else(|payload| Err(AgentError::Panicked(panic_message(&payload))));
                (agent, outcome)
            })
            .await;

            match result {
                Ok((returned, outcome)) => {
                    agent = returned;
                    record_run(&board, &store, name, &outcome, Some(period));
                    match outcome {
                        Ok(summary) => {
                            if summary.processed > 0 || summary.failed > 0 {
                                info!(
                                    agent = name,
                                    processed = summary.processed,
                                    succeeded = summary.succeeded,
                                    failed = summary.failed,
                                    skipped = summary.skipped,
                                    "cycle complete"
                                );
                            }
                        }
                        Err(e) => error!(agent = name, error = %e, "cycle failed"),
                    }
                }
                // Only reachable when the runtime tears the blocking
                // task down; the agent value is gone with it
                Err(e) => {
                    error!(agent = name, error = %e, "cycle task lost");
                    record_run(
                        &board,
                        &store,
                        name,
                        &Err(AgentError::Panicked(e.to_string())),
                        Some(period),
                    );
                    break;
                }
            }
        }
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
