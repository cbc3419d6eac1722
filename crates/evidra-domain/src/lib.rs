//! Evidra Domain Layer
//!
//! This crate contains the core business logic and domain model for Evidra.
//! It has near-zero external dependencies and defines the fundamental
//! concepts, value objects, and trait interfaces that all other layers
//! depend upon.
//!
//! ## Key Concepts
//!
//! - **Claim**: A statement extracted from the literature, carrying
//!   confidence, evidence level, and provenance
//! - **Research Queue**: Publications waiting for extraction
//! - **Evidence Hierarchy**: Per-category strength aggregation
//! - **Relationships**: Pairwise edges (contradicts, supports, ...)
//! - **Validation Log**: Append-only audit trail of every decision
//!
//! ## Architecture
//!
//! This crate follows Clean Architecture:
//! - Pure business logic only
//! - Infrastructure implementations live in other crates
//! - Trait definitions for all external interactions

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod audit;
pub mod claim;
pub mod hierarchy;
pub mod queue;
pub mod relationship;
pub mod traits;
pub mod version;

// Re-exports for convenience
pub use audit::{ValidationAction, ValidationLogEntry};
pub use claim::{
    Category, Claim, ClaimId, ClaimStatus, EmbeddingStatus, EvidenceLevel, StudyDesign,
};
pub use hierarchy::{claim_strength, ConsensusLabel, EvidenceHierarchy};
pub use queue::{QueueId, QueueStatus, ResearchQueueItem, SourceKind};
pub use relationship::{KnowledgeRelationship, RelationshipType};
pub use version::ClaimVersion;
