//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use crate::{
    Category, Claim, ClaimId, ClaimStatus, ClaimVersion, EvidenceHierarchy, EvidenceLevel,
    KnowledgeRelationship, QueueId, QueueStatus, RelationshipType, ResearchQueueItem, StudyDesign,
    ValidationLogEntry,
};

/// Query criteria for retrieving claims
#[derive(Debug, Clone, Default)]
pub struct ClaimFilter {
    /// Filter by category
    pub category: Option<Category>,

    /// Filter by minimum evidence level
    pub min_evidence: Option<EvidenceLevel>,

    /// Filter by lifecycle status
    pub status: Option<ClaimStatus>,

    /// Only claims with a completed embedding
    pub embedded_only: bool,

    /// Maximum results to return
    pub limit: Option<usize>,
}

/// Partial content update for a claim
///
/// Applying a non-empty update snapshots the outgoing state and bumps
/// the claim's version.
#[derive(Debug, Clone, Default)]
pub struct ClaimContentUpdate {
    /// Replacement claim text
    pub text: Option<String>,

    /// Replacement summary
    pub summary: Option<String>,

    /// Replacement confidence
    pub confidence: Option<f64>,
}

impl ClaimContentUpdate {
    /// True when the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.summary.is_none() && self.confidence.is_none()
    }
}

/// Per-status counts for the research queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    /// Items waiting for extraction
    pub pending: usize,
    /// Items claimed by a run
    pub processing: usize,
    /// Items fully extracted
    pub completed: usize,
    /// Items that failed and may retry
    pub failed: usize,
    /// Items permanently rejected
    pub rejected: usize,
}

impl QueueCounts {
    /// Total items across all statuses
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed + self.rejected
    }
}

/// Per-status counts for the embedding pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbeddingCounts {
    /// Claims waiting for an embedding
    pub pending: usize,
    /// Claims claimed by a worker
    pub processing: usize,
    /// Claims with a stored embedding
    pub completed: usize,
    /// Claims whose embedding failed
    pub failed: usize,
}

/// Persisted outcome of an agent's most recent cycle
///
/// One row per agent, overwritten on every run, so operational status
/// survives a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRunRecord {
    /// Agent name
    pub agent: String,
    /// Unix time the cycle finished
    pub last_run: u64,
    /// Items the cycle looked at
    pub processed: usize,
    /// Items that completed their transition
    pub succeeded: usize,
    /// Items that errored
    pub failed: usize,
    /// Items intentionally left alone
    pub skipped: usize,
    /// Error message when the cycle failed outright
    pub last_error: Option<String>,
}

/// Trait for storing and retrieving the knowledge base
///
/// Implemented by the infrastructure layer (evidra-store). The store is
/// the single authority for lifecycle transitions: callers name the
/// transition they want and the store applies the bookkeeping
/// (versioning, embedding status pairing, timestamps) atomically.
pub trait ClaimStore {
    /// Error type for store operations
    type Error;

    // --- claims ---

    /// Insert a new claim
    fn insert_claim(&mut self, claim: Claim) -> Result<ClaimId, Self::Error>;

    /// Get a claim by ID
    fn get_claim(&self, id: ClaimId) -> Result<Option<Claim>, Self::Error>;

    /// Query claims matching criteria
    fn query_claims(&self, filter: &ClaimFilter) -> Result<Vec<Claim>, Self::Error>;

    /// Apply a content update, snapshotting the outgoing version first
    fn update_claim_content(
        &mut self,
        id: ClaimId,
        update: &ClaimContentUpdate,
        now: u64,
    ) -> Result<(), Self::Error>;

    /// Transition a claim's lifecycle status
    fn set_claim_status(
        &mut self,
        id: ClaimId,
        status: ClaimStatus,
        score: Option<f64>,
        reviewed_by: Option<&str>,
        now: u64,
    ) -> Result<(), Self::Error>;

    /// Set or clear the conflict flag
    fn set_conflicting(&mut self, id: ClaimId, conflicting: bool, now: u64)
        -> Result<(), Self::Error>;

    /// All version snapshots for a claim, oldest first
    fn claim_versions(&self, id: ClaimId) -> Result<Vec<ClaimVersion>, Self::Error>;

    // --- embedding pipeline ---

    /// Atomically claim up to `limit` pending claims for embedding
    ///
    /// Claimed rows move to Processing before being returned, so two
    /// concurrent callers never receive the same claim.
    fn claim_pending_embeddings(&mut self, limit: usize, now: u64)
        -> Result<Vec<Claim>, Self::Error>;

    /// Store an embedding and mark the claim Completed
    fn complete_embedding(&mut self, id: ClaimId, embedding: &[f32], now: u64)
        -> Result<(), Self::Error>;

    /// Mark an embedding attempt Failed, keeping the error message
    fn fail_embedding(&mut self, id: ClaimId, error: &str, now: u64) -> Result<(), Self::Error>;

    /// Return Processing claims last touched before `stale_before` to Pending
    ///
    /// Recovers work orphaned by a crashed run. Returns how many rows moved.
    fn reset_stale_embeddings(&mut self, stale_before: u64, now: u64)
        -> Result<usize, Self::Error>;

    /// Move Failed claims back to Pending (operator-initiated only)
    fn retry_failed_embeddings(&mut self, now: u64) -> Result<usize, Self::Error>;

    /// Per-status embedding counts
    fn embedding_counts(&self) -> Result<EmbeddingCounts, Self::Error>;

    // --- research queue ---

    /// Enqueue a publication; returns false when its dedup key already exists
    fn enqueue_item(&mut self, item: ResearchQueueItem) -> Result<bool, Self::Error>;

    /// Pending and retriable failed items, highest priority first,
    /// then oldest first
    fn pending_queue_items(&self, limit: usize) -> Result<Vec<ResearchQueueItem>, Self::Error>;

    /// Transition a queue item's status
    ///
    /// Moving to Processing increments the attempt counter.
    fn update_queue_item(
        &mut self,
        id: QueueId,
        status: QueueStatus,
        error: Option<&str>,
        now: u64,
    ) -> Result<(), Self::Error>;

    /// Per-status queue counts
    fn queue_counts(&self) -> Result<QueueCounts, Self::Error>;

    // --- relationships ---

    /// Insert or refresh an edge; uniqueness is on (source, target, type)
    fn upsert_relationship(&mut self, rel: KnowledgeRelationship) -> Result<(), Self::Error>;

    /// All edges touching a claim
    fn relationships_for(&self, id: ClaimId) -> Result<Vec<KnowledgeRelationship>, Self::Error>;

    /// True when an edge of the given type links the pair, in either order
    fn has_relationship(
        &self,
        a: ClaimId,
        b: ClaimId,
        relationship_type: RelationshipType,
    ) -> Result<bool, Self::Error>;

    // --- evidence hierarchy ---

    /// Replace the stored aggregate for a category
    fn store_hierarchy(&mut self, hierarchy: &EvidenceHierarchy) -> Result<(), Self::Error>;

    /// Last computed aggregate for a category
    fn get_hierarchy(&self, category: Category) -> Result<Option<EvidenceHierarchy>, Self::Error>;

    // --- audit log ---

    /// Append a validation decision (the log is append-only)
    fn record_validation(&mut self, entry: ValidationLogEntry) -> Result<(), Self::Error>;

    /// Record the latest cycle of one agent, replacing any earlier row
    fn record_agent_run(&mut self, record: &AgentRunRecord) -> Result<(), Self::Error>;

    /// Latest recorded cycle per agent, ordered by agent name
    fn agent_runs(&self) -> Result<Vec<AgentRunRecord>, Self::Error>;

    /// Full decision history for a claim, oldest first
    fn validation_log(&self, id: ClaimId) -> Result<Vec<ValidationLogEntry>, Self::Error>;
}

/// Input to claim extraction: one publication's metadata and abstract
#[derive(Debug, Clone)]
pub struct ExtractionInput {
    /// Publication title
    pub title: String,

    /// Author names
    pub authors: Vec<String>,

    /// Abstract text (never empty; callers reject items without one)
    pub abstract_text: String,

    /// Journal name, when known
    pub journal: Option<String>,
}

/// A claim proposed by the language model, before damping and storage
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimDraft {
    /// Full claim statement
    pub text: String,

    /// One-sentence summary
    pub summary: String,

    /// Topic category
    pub category: Category,

    /// Self-reported evidence level
    pub evidence_level: EvidenceLevel,

    /// Model confidence in [0, 1], before damping
    pub confidence: f64,

    /// Participant count, when stated in the abstract
    pub sample_size: Option<u32>,

    /// Study design, when stated in the abstract
    pub study_design: Option<StudyDesign>,

    /// Key findings supporting the claim
    pub key_findings: Vec<String>,

    /// Limitations the model noted
    pub limitations: Vec<String>,
}

/// Model judgement on whether two claims contradict each other
#[derive(Debug, Clone, PartialEq)]
pub struct ContradictionVerdict {
    /// True when the statements are incompatible
    pub contradicts: bool,

    /// How strongly, in [0, 1]
    pub strength: f64,

    /// Short rationale for the audit trail
    pub rationale: String,
}

/// Trait for language model operations
///
/// Implemented by the infrastructure layer (evidra-llm)
pub trait LanguageModel {
    /// Error type for model operations
    type Error;

    /// Embed a text into a fixed-dimension vector
    fn embed(&self, text: &str) -> Result<Vec<f32>, Self::Error>;

    /// Dimension of vectors produced by `embed`
    fn embedding_dimension(&self) -> usize;

    /// Extract structured claims from a publication abstract
    fn extract_claims(&self, input: &ExtractionInput) -> Result<Vec<ClaimDraft>, Self::Error>;

    /// Judge whether two claim texts contradict each other
    fn assess_contradiction(&self, a: &str, b: &str)
        -> Result<ContradictionVerdict, Self::Error>;
}
