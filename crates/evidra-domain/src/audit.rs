//! Validation audit log entries

use crate::ClaimId;
use std::fmt;

/// Decision recorded against a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationAction {
    /// Passed validation scoring
    Approved,
    /// Passed the fast-path checks without scoring
    AutoApproved,
    /// Failed validation outright
    Rejected,
    /// Held for human review
    Flagged,
    /// Superseded by a duplicate
    Deprecated,
    /// A contradiction with another claim was recorded
    ConflictFlagged,
}

impl ValidationAction {
    /// Stable string form used in storage and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationAction::Approved => "approved",
            ValidationAction::AutoApproved => "auto_approved",
            ValidationAction::Rejected => "rejected",
            ValidationAction::Flagged => "flagged",
            ValidationAction::Deprecated => "deprecated",
            ValidationAction::ConflictFlagged => "conflict_flagged",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_strict(s: &str) -> Result<Self, String> {
        match s {
            "approved" => Ok(ValidationAction::Approved),
            "auto_approved" => Ok(ValidationAction::AutoApproved),
            "rejected" => Ok(ValidationAction::Rejected),
            "flagged" => Ok(ValidationAction::Flagged),
            "deprecated" => Ok(ValidationAction::Deprecated),
            "conflict_flagged" => Ok(ValidationAction::ConflictFlagged),
            other => Err(format!("Unknown validation action: {}", other)),
        }
    }
}

impl fmt::Display for ValidationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only audit record for a validation decision
///
/// Entries are never updated or deleted; the log is the full history of
/// every automated and manual decision.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationLogEntry {
    /// Claim the decision applies to
    pub claim_id: ClaimId,

    /// What was decided
    pub action: ValidationAction,

    /// Final score, for scored decisions
    pub score: Option<f64>,

    /// Human-readable reasons behind the decision
    pub reasons: Vec<String>,

    /// "auto" for agent decisions, otherwise an operator name
    pub actor: String,

    /// When the decision was made (Unix seconds)
    pub created_at: u64,
}

impl ValidationLogEntry {
    /// Build an entry attributed to the automated pipeline
    pub fn automatic(
        claim_id: ClaimId,
        action: ValidationAction,
        score: Option<f64>,
        reasons: Vec<String>,
        created_at: u64,
    ) -> Self {
        Self {
            claim_id,
            action,
            score,
            reasons,
            actor: "auto".to_string(),
            created_at,
        }
    }
}
