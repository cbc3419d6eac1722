//! Claim module - the fundamental unit of the Evidra knowledge base

use std::fmt;

/// Unique identifier for a claim based on UUIDv7
///
/// UUIDv7 provides:
/// - Chronological sortability for temporal queries
/// - 128-bit uniqueness
/// - RFC 9562-standard format with broad ecosystem support
/// - No coordination required for distributed generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClaimId(u128);

impl ClaimId {
    /// Generate a new UUIDv7-based ClaimId
    ///
    /// # Examples
    ///
    /// ```
    /// use evidra_domain::ClaimId;
    ///
    /// let id = ClaimId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a ClaimId from a raw u128 value
    ///
    /// This is primarily for storage layer deserialization.
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a ClaimId from a UUIDv7 string
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid UUIDv7 string: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Get the timestamp component of the UUIDv7 (milliseconds since Unix epoch)
    pub fn timestamp(&self) -> u64 {
        // UUIDv7: top 48 bits are Unix millisecond timestamp
        (self.0 >> 80) as u64
    }
}

impl Default for ClaimId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// Topic category a claim belongs to
///
/// Categories double as the aggregation key for evidence hierarchies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Resistance and strength training
    StrengthTraining,
    /// Muscle growth
    Hypertrophy,
    /// Diet, supplementation, macronutrients
    Nutrition,
    /// Sleep, rest, deloads
    Recovery,
    /// Aerobic and endurance training
    Cardio,
    /// Anything that does not fit a specific category
    General,
}

impl Category {
    /// All known categories, in a stable order
    pub const ALL: [Category; 6] = [
        Category::StrengthTraining,
        Category::Hypertrophy,
        Category::Nutrition,
        Category::Recovery,
        Category::Cardio,
        Category::General,
    ];

    /// Stable string form used in storage and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::StrengthTraining => "strength_training",
            Category::Hypertrophy => "hypertrophy",
            Category::Nutrition => "nutrition",
            Category::Recovery => "recovery",
            Category::Cardio => "cardio",
            Category::General => "general",
        }
    }

    /// Parse from the stable string form
    ///
    /// Unknown labels fall back to `General` rather than failing, so a
    /// model emitting a novel category never poisons a batch.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "strength_training" => Category::StrengthTraining,
            "hypertrophy" => Category::Hypertrophy,
            "nutrition" => Category::Nutrition,
            "recovery" => Category::Recovery,
            "cardio" => Category::Cardio,
            _ => Category::General,
        }
    }

    /// Strict parse for storage round-trips
    pub fn from_str_strict(s: &str) -> Result<Self, String> {
        match s {
            "strength_training" => Ok(Category::StrengthTraining),
            "hypertrophy" => Ok(Category::Hypertrophy),
            "nutrition" => Ok(Category::Nutrition),
            "recovery" => Ok(Category::Recovery),
            "cardio" => Ok(Category::Cardio),
            "general" => Ok(Category::General),
            other => Err(format!("Unknown category: {}", other)),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strength of evidence backing a claim, on a 1-5 ladder
///
/// Higher is stronger. The ladder is ordinal: comparisons between
/// levels are meaningful and used throughout validation and conflict
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EvidenceLevel {
    /// Expert opinion, mechanistic reasoning, anecdote
    ExpertOpinion = 1,
    /// Case reports and small uncontrolled series
    CaseReport = 2,
    /// Observational studies (cohort, case-control, cross-sectional)
    Observational = 3,
    /// Randomized controlled trials
    RandomizedTrial = 4,
    /// Meta-analyses and systematic reviews
    MetaAnalysis = 5,
}

impl EvidenceLevel {
    /// Numeric rank (1 weakest, 5 strongest)
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Build from a numeric rank
    pub fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            1 => Some(EvidenceLevel::ExpertOpinion),
            2 => Some(EvidenceLevel::CaseReport),
            3 => Some(EvidenceLevel::Observational),
            4 => Some(EvidenceLevel::RandomizedTrial),
            5 => Some(EvidenceLevel::MetaAnalysis),
            _ => None,
        }
    }
}

/// Study design reported by the source publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudyDesign {
    /// Meta-analysis of multiple studies
    MetaAnalysis,
    /// Systematic review without pooled analysis
    SystematicReview,
    /// Randomized controlled trial
    RandomizedControlledTrial,
    /// Prospective or retrospective cohort
    CohortStudy,
    /// Case-control study
    CaseControl,
    /// Cross-sectional survey
    CrossSectional,
    /// Case report or case series
    CaseReport,
    /// Expert opinion or narrative review
    ExpertOpinion,
}

impl StudyDesign {
    /// Stable string form used in storage and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyDesign::MetaAnalysis => "meta_analysis",
            StudyDesign::SystematicReview => "systematic_review",
            StudyDesign::RandomizedControlledTrial => "randomized_controlled_trial",
            StudyDesign::CohortStudy => "cohort_study",
            StudyDesign::CaseControl => "case_control",
            StudyDesign::CrossSectional => "cross_sectional",
            StudyDesign::CaseReport => "case_report",
            StudyDesign::ExpertOpinion => "expert_opinion",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_strict(s: &str) -> Result<Self, String> {
        match s {
            "meta_analysis" => Ok(StudyDesign::MetaAnalysis),
            "systematic_review" => Ok(StudyDesign::SystematicReview),
            "randomized_controlled_trial" | "rct" => Ok(StudyDesign::RandomizedControlledTrial),
            "cohort_study" => Ok(StudyDesign::CohortStudy),
            "case_control" => Ok(StudyDesign::CaseControl),
            "cross_sectional" => Ok(StudyDesign::CrossSectional),
            "case_report" => Ok(StudyDesign::CaseReport),
            "expert_opinion" => Ok(StudyDesign::ExpertOpinion),
            other => Err(format!("Unknown study design: {}", other)),
        }
    }

    /// The minimum evidence level a claim citing this design should carry
    ///
    /// Used by validation to catch model output where the design and the
    /// self-reported evidence level disagree.
    pub fn minimum_evidence_level(&self) -> EvidenceLevel {
        match self {
            StudyDesign::MetaAnalysis => EvidenceLevel::RandomizedTrial,
            StudyDesign::SystematicReview => EvidenceLevel::Observational,
            StudyDesign::RandomizedControlledTrial => EvidenceLevel::Observational,
            _ => EvidenceLevel::ExpertOpinion,
        }
    }

    /// The maximum evidence level plausible for this design
    pub fn maximum_evidence_level(&self) -> EvidenceLevel {
        match self {
            StudyDesign::ExpertOpinion => EvidenceLevel::CaseReport,
            StudyDesign::CaseReport => EvidenceLevel::CaseReport,
            _ => EvidenceLevel::MetaAnalysis,
        }
    }
}

impl fmt::Display for StudyDesign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimStatus {
    /// Extracted but not yet validated
    Draft,
    /// Validated and servable to retrieval
    Active,
    /// Held for human review after a failed automatic check
    Flagged,
    /// Superseded by a duplicate or newer claim
    Deprecated,
    /// Failed validation outright
    Rejected,
}

impl ClaimStatus {
    /// Stable string form used in storage and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Draft => "draft",
            ClaimStatus::Active => "active",
            ClaimStatus::Flagged => "flagged",
            ClaimStatus::Deprecated => "deprecated",
            ClaimStatus::Rejected => "rejected",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_strict(s: &str) -> Result<Self, String> {
        match s {
            "draft" => Ok(ClaimStatus::Draft),
            "active" => Ok(ClaimStatus::Active),
            "flagged" => Ok(ClaimStatus::Flagged),
            "deprecated" => Ok(ClaimStatus::Deprecated),
            "rejected" => Ok(ClaimStatus::Rejected),
            other => Err(format!("Unknown claim status: {}", other)),
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a claim's embedding in the async embedding pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbeddingStatus {
    /// Not yet picked up
    Pending,
    /// Claimed by a worker, in flight
    Processing,
    /// Embedding stored
    Completed,
    /// Embedding call failed; requires sweep or operator recovery
    Failed,
}

impl EmbeddingStatus {
    /// Stable string form used in storage and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Processing => "processing",
            EmbeddingStatus::Completed => "completed",
            EmbeddingStatus::Failed => "failed",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_strict(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(EmbeddingStatus::Pending),
            "processing" => Ok(EmbeddingStatus::Processing),
            "completed" => Ok(EmbeddingStatus::Completed),
            "failed" => Ok(EmbeddingStatus::Failed),
            other => Err(format!("Unknown embedding status: {}", other)),
        }
    }
}

impl fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A knowledge claim extracted from the literature
///
/// A claim is a statement with confidence, evidence level, and full
/// provenance back to the publication it came from. Content edits bump
/// `version` and snapshot the prior state (see `ClaimVersion`).
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    /// Unique identifier
    pub id: ClaimId,

    /// Full claim statement
    pub text: String,

    /// One-sentence summary for display and text scoring
    pub summary: String,

    /// Topic category (also the hierarchy aggregation key)
    pub category: Category,

    /// Evidence strength ladder position
    pub evidence_level: EvidenceLevel,

    /// Extraction confidence in [0, 1], already damped at extraction time
    pub confidence: f64,

    /// Participant count, when the source reports one
    pub sample_size: Option<u32>,

    /// Study design, when the source reports one
    pub study_design: Option<StudyDesign>,

    /// Title of the source publication
    pub source_title: String,

    /// DOI of the source publication, when available
    pub source_doi: Option<String>,

    /// Journal or venue name
    pub source_journal: Option<String>,

    /// Link back to the source
    pub source_url: Option<String>,

    /// Lifecycle status
    pub status: ClaimStatus,

    /// Set when a contradiction with another claim is recorded
    pub conflicting: bool,

    /// Final validation score, once validated
    pub validation_score: Option<f64>,

    /// Who approved or rejected the claim ("auto" or an operator name)
    pub reviewed_by: Option<String>,

    /// Embedding vector. Present exactly when `embedding_status` is
    /// `Completed`; the store enforces the pairing.
    pub embedding: Option<Vec<f32>>,

    /// Embedding pipeline state
    pub embedding_status: EmbeddingStatus,

    /// Last embedding error, kept for operator diagnosis
    pub embedding_error: Option<String>,

    /// When the embedding status last changed (Unix seconds)
    pub embedding_updated_at: Option<u64>,

    /// Monotonic content version, starts at 1
    pub version: u32,

    /// Creation time (Unix seconds)
    pub created_at: u64,

    /// Last modification time (Unix seconds)
    pub updated_at: u64,
}

impl Claim {
    /// Build a fresh draft claim with embedding work pending
    #[allow(clippy::too_many_arguments)]
    pub fn draft(
        text: String,
        summary: String,
        category: Category,
        evidence_level: EvidenceLevel,
        confidence: f64,
        source_title: String,
        created_at: u64,
    ) -> Self {
        Self {
            id: ClaimId::new(),
            text,
            summary,
            category,
            evidence_level,
            confidence: confidence.clamp(0.0, 1.0),
            sample_size: None,
            study_design: None,
            source_title,
            source_doi: None,
            source_journal: None,
            source_url: None,
            status: ClaimStatus::Draft,
            conflicting: false,
            validation_score: None,
            reviewed_by: None,
            embedding: None,
            embedding_status: EmbeddingStatus::Pending,
            embedding_error: None,
            embedding_updated_at: None,
            version: 1,
            created_at,
            updated_at: created_at,
        }
    }

    /// True when the embedding field and status agree
    ///
    /// `embedding` must be present exactly when the status is `Completed`.
    pub fn embedding_consistent(&self) -> bool {
        self.embedding.is_some() == (self.embedding_status == EmbeddingStatus::Completed)
    }

    /// True when the claim is servable to retrieval
    pub fn is_servable(&self) -> bool {
        self.status == ClaimStatus::Active
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: UUIDv7 ordering matches u128 ordering
        #[test]
        fn test_uuid_ordering_property(a: u128, b: u128) {
            let id_a = ClaimId::from_value(a);
            let id_b = ClaimId::from_value(b);

            prop_assert_eq!(id_a < id_b, a < b);
            prop_assert_eq!(id_a == id_b, a == b);
            prop_assert_eq!(id_a > id_b, a > b);
        }

        /// Property: Round-trip through string representation preserves ID
        #[test]
        fn test_uuid_string_roundtrip(value: u128) {
            let id = ClaimId::from_value(value);
            let id_str = id.to_string();

            match ClaimId::from_string(&id_str) {
                Ok(parsed) => prop_assert_eq!(id, parsed),
                Err(e) => return Err(TestCaseError::fail(e)),
            }
        }

        /// Property: evidence rank round-trips for all valid ranks
        #[test]
        fn test_evidence_rank_roundtrip(rank in 1u8..=5) {
            let level = EvidenceLevel::from_rank(rank).unwrap();
            prop_assert_eq!(level.rank(), rank);
        }

        /// Property: draft confidence always lands in [0, 1]
        #[test]
        fn test_draft_confidence_clamped(c in -10.0f64..10.0) {
            let claim = Claim::draft(
                "t".to_string(),
                "s".to_string(),
                Category::General,
                EvidenceLevel::ExpertOpinion,
                c,
                "src".to_string(),
                0,
            );
            prop_assert!((0.0..=1.0).contains(&claim.confidence));
        }
    }
}
