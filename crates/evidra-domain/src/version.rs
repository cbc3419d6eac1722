//! Claim version snapshots

use crate::{ClaimId, ClaimStatus};

/// An immutable snapshot of a claim's content at a past version
///
/// The store appends a snapshot of the outgoing state before applying
/// any content edit, so `version` here is always strictly less than the
/// claim's current version. Snapshots are append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimVersion {
    /// Claim this snapshot belongs to
    pub claim_id: ClaimId,

    /// Version number that was replaced (starts at 1)
    pub version: u32,

    /// Claim text at that version
    pub text: String,

    /// Summary at that version
    pub summary: String,

    /// Confidence at that version
    pub confidence: f64,

    /// Status at that version
    pub status: ClaimStatus,

    /// When the snapshot was taken (Unix seconds)
    pub snapshot_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_carries_prior_state() {
        let snapshot = ClaimVersion {
            claim_id: ClaimId::from_value(7),
            version: 1,
            text: "original wording".to_string(),
            summary: "original".to_string(),
            confidence: 0.6,
            status: ClaimStatus::Draft,
            snapshot_at: 42,
        };
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.status, ClaimStatus::Draft);
    }
}
