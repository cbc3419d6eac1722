//! Evidence hierarchy - per-category strength aggregation

use crate::{Category, Claim, ClaimId};
use std::fmt;

/// Sample size above which a claim gets the full boost
const LARGE_SAMPLE: u32 = 1000;

/// Sample size above which a claim gets the partial boost
const MODERATE_SAMPLE: u32 = 500;

/// Consensus label derived from the aggregate strength of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsensusLabel {
    /// High-level evidence dominates the category
    Strong,
    /// Decent evidence with gaps
    Moderate,
    /// Mostly low-level evidence
    Weak,
    /// Too few claims to say anything
    Insufficient,
}

impl ConsensusLabel {
    /// Stable string form used in storage and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusLabel::Strong => "strong",
            ConsensusLabel::Moderate => "moderate",
            ConsensusLabel::Weak => "weak",
            ConsensusLabel::Insufficient => "insufficient",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_strict(s: &str) -> Result<Self, String> {
        match s {
            "strong" => Ok(ConsensusLabel::Strong),
            "moderate" => Ok(ConsensusLabel::Moderate),
            "weak" => Ok(ConsensusLabel::Weak),
            "insufficient" => Ok(ConsensusLabel::Insufficient),
            other => Err(format!("Unknown consensus label: {}", other)),
        }
    }
}

impl fmt::Display for ConsensusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strength score for a single claim in [0, 1.2]
///
/// Base is evidence level scaled to [0.2, 1.0] times confidence. Large
/// samples boost the score, an open conflict dampens it.
pub fn claim_strength(claim: &Claim) -> f64 {
    let mut score = claim.evidence_level.rank() as f64 * 0.2 * claim.confidence;

    match claim.sample_size {
        Some(n) if n >= LARGE_SAMPLE => score *= 1.2,
        Some(n) if n >= MODERATE_SAMPLE => score *= 1.1,
        _ => {}
    }

    if claim.conflicting {
        score *= 0.8;
    }

    score
}

/// Aggregated evidence picture for one category
///
/// Recomputed by the knowledge base agent whenever a claim in the
/// category changes; reads never see a partially updated row.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceHierarchy {
    /// Aggregation key
    pub category: Category,

    /// Number of active claims considered
    pub claim_count: usize,

    /// Mean claim strength across the category
    pub avg_strength: f64,

    /// Strongest claim, when any exist
    pub top_claim: Option<ClaimId>,

    /// Number of claims with an open conflict
    pub conflicting_count: usize,

    /// Derived consensus label
    pub consensus: ConsensusLabel,

    /// When the aggregate was computed (Unix seconds)
    pub computed_at: u64,
}

impl EvidenceHierarchy {
    /// Minimum claims before a consensus label other than Insufficient
    pub const MIN_CLAIMS_FOR_CONSENSUS: usize = 3;

    /// Compute the aggregate from the active claims of one category
    ///
    /// Claims from other categories are ignored rather than rejected, so
    /// callers can pass an unfiltered slice.
    pub fn from_claims(category: Category, claims: &[Claim], computed_at: u64) -> Self {
        let members: Vec<&Claim> = claims
            .iter()
            .filter(|c| c.category == category && c.is_servable())
            .collect();

        if members.is_empty() {
            return Self {
                category,
                claim_count: 0,
                avg_strength: 0.0,
                top_claim: None,
                conflicting_count: 0,
                consensus: ConsensusLabel::Insufficient,
                computed_at,
            };
        }

        let mut total = 0.0;
        let mut best: Option<(ClaimId, f64)> = None;
        let mut conflicting = 0;

        for claim in &members {
            let strength = claim_strength(claim);
            total += strength;
            if claim.conflicting {
                conflicting += 1;
            }
            match best {
                Some((_, s)) if s >= strength => {}
                _ => best = Some((claim.id, strength)),
            }
        }

        let avg = total / members.len() as f64;
        let consensus = if members.len() < Self::MIN_CLAIMS_FOR_CONSENSUS {
            ConsensusLabel::Insufficient
        } else if avg >= 0.7 {
            ConsensusLabel::Strong
        } else if avg >= 0.4 {
            ConsensusLabel::Moderate
        } else {
            ConsensusLabel::Weak
        };

        Self {
            category,
            claim_count: members.len(),
            avg_strength: avg,
            top_claim: best.map(|(id, _)| id),
            conflicting_count: conflicting,
            consensus,
            computed_at,
        }
    }
}
