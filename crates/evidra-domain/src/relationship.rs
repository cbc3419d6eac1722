//! Relationships between claims in the knowledge graph

use crate::ClaimId;
use std::fmt;

/// Kind of pairwise relationship between two claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    /// The two claims make incompatible statements (symmetric)
    Contradicts,
    /// One claim corroborates the other (symmetric)
    Supports,
    /// The two claims state the same finding (symmetric)
    Duplicates,
    /// Source claim replaces the target (directed)
    Supersedes,
    /// The two claims cover overlapping topics (symmetric)
    RelatedTo,
    /// The source claim must hold for the target to apply (directed)
    Prerequisite,
}

impl RelationshipType {
    /// True when the relation carries no direction
    ///
    /// Symmetric relations are stored once, with endpoints in canonical
    /// order, so (a, b) and (b, a) never produce two rows.
    pub fn is_symmetric(&self) -> bool {
        !matches!(
            self,
            RelationshipType::Supersedes | RelationshipType::Prerequisite
        )
    }

    /// Stable string form used in storage and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Contradicts => "contradicts",
            RelationshipType::Supports => "supports",
            RelationshipType::Duplicates => "duplicates",
            RelationshipType::Supersedes => "supersedes",
            RelationshipType::RelatedTo => "related_to",
            RelationshipType::Prerequisite => "prerequisite",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_strict(s: &str) -> Result<Self, String> {
        match s {
            "contradicts" => Ok(RelationshipType::Contradicts),
            "supports" => Ok(RelationshipType::Supports),
            "duplicates" => Ok(RelationshipType::Duplicates),
            "supersedes" => Ok(RelationshipType::Supersedes),
            "related_to" => Ok(RelationshipType::RelatedTo),
            "prerequisite" => Ok(RelationshipType::Prerequisite),
            other => Err(format!("Unknown relationship type: {}", other)),
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pairwise edge between two claims
///
/// Uniqueness is on (source, target, type); re-recording the same edge
/// updates `strength` instead of inserting a second row.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeRelationship {
    /// Source endpoint
    pub source: ClaimId,

    /// Target endpoint
    pub target: ClaimId,

    /// Kind of relation
    pub relationship_type: RelationshipType,

    /// Strength in [0, 1] (e.g. similarity or contradiction confidence)
    pub strength: f64,

    /// When the edge was recorded (Unix seconds)
    pub created_at: u64,
}

impl KnowledgeRelationship {
    /// Build an edge, canonicalizing endpoint order for symmetric types
    ///
    /// For symmetric relations the smaller ClaimId always becomes the
    /// source, which makes edge recording commutative.
    pub fn new(
        a: ClaimId,
        b: ClaimId,
        relationship_type: RelationshipType,
        strength: f64,
        created_at: u64,
    ) -> Self {
        let (source, target) = if relationship_type.is_symmetric() && b < a {
            (b, a)
        } else {
            (a, b)
        };
        Self {
            source,
            target,
            relationship_type,
            strength: strength.clamp(0.0, 1.0),
            created_at,
        }
    }

    /// True when this edge links the given pair, in either order
    pub fn links(&self, a: ClaimId, b: ClaimId) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}
