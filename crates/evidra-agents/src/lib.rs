//! Pipeline agents
//!
//! Five agents move publications from upstream sources into a curated
//! knowledge base:
//!
//! 1. research: polls literature sources and fills the research queue
//! 2. extraction: turns queued abstracts into draft claims
//! 3. validation: deduplicates, scores, and activates drafts
//! 4. knowledge: embeds claims and recomputes evidence hierarchies
//! 5. conflict: finds contradicting claim pairs among active claims
//!
//! Each agent exposes a synchronous `process` cycle; the scheduler
//! drives cycles on independent intervals from a tokio runtime.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod config;
pub mod conflict;
pub mod extraction;
pub mod knowledge;
pub mod research;
pub mod scheduler;
pub mod validation;

pub use agent::{lock_store, unix_now, Agent, AgentError, RunSummary};
pub use config::{
    ConflictConfig, ExtractionConfig, KnowledgeConfig, PipelineConfig, ResearchConfig,
    ValidationConfig,
};
pub use conflict::ConflictAgent;
pub use extraction::ExtractionAgent;
pub use knowledge::KnowledgeAgent;
pub use research::ResearchAgent;
pub use scheduler::{AgentStatus, Scheduler, StatusBoard};
pub use validation::ValidationAgent;
