//! Agent configuration
//!
//! All intervals are seconds. Defaults match a single-node deployment
//! polling sources once a day and keeping the downstream agents on
//! short cycles so new material flows through within the hour.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_true() -> bool {
    true
}

/// Research agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Seconds between source polls
    pub interval_secs: u64,
    /// Maximum records accepted per source per cycle
    pub batch_size: usize,
    /// How far back to look for publications, in days
    pub days_back: u32,
    /// Oldest publication age accepted into the queue, in days
    pub max_age_days: u32,
    /// Journal names that boost queue priority when matched
    pub priority_journals: Vec<String>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 86_400,
            batch_size: 20,
            days_back: 7,
            // Five years
            max_age_days: 1_825,
            priority_journals: vec![
                "Sports Medicine".to_string(),
                "Journal of Applied Physiology".to_string(),
                "Medicine & Science in Sports & Exercise".to_string(),
            ],
        }
    }
}

/// Extraction agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Seconds between extraction cycles
    pub interval_secs: u64,
    /// Queue items claimed per cycle
    pub batch_size: usize,
    /// Attempts before an item is rejected outright
    pub max_attempts: u32,
    /// Multiplier applied to model confidence before storage
    pub confidence_damping: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1_800,
            batch_size: 5,
            max_attempts: 3,
            confidence_damping: 0.8,
        }
    }
}

/// Validation agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Seconds between validation cycles
    pub interval_secs: u64,
    /// Draft claims examined per cycle
    pub batch_size: usize,
    /// Similarity at or above which a draft is a duplicate
    pub duplicate_threshold: f64,
    /// Quality score at or above which a draft activates automatically
    pub auto_approve_score: f64,
    /// Quality score below which a draft is rejected
    pub reject_score: f64,
    /// Active claims per category checked for contradiction
    pub contradiction_candidates: usize,
    /// Verdict strength at or above which a contradiction counts
    pub contradiction_min_strength: f64,
    /// Check drafts against active claims for contradictions
    #[serde(default = "default_true")]
    pub check_contradictions: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 900,
            batch_size: 10,
            duplicate_threshold: 0.9,
            auto_approve_score: 0.7,
            reject_score: 0.3,
            contradiction_candidates: 5,
            contradiction_min_strength: 0.6,
            check_contradictions: true,
        }
    }
}

/// Knowledge agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Seconds between knowledge cycles
    pub interval_secs: u64,
    /// Claims embedded per cycle
    pub batch_size: usize,
    /// Seconds after which a Processing embedding counts as orphaned
    pub stale_after_secs: u64,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            interval_secs: 600,
            batch_size: 10,
            stale_after_secs: 1_800,
        }
    }
}

/// Conflict agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Seconds between conflict scans
    pub interval_secs: u64,
    /// Maximum model assessments per cycle
    pub batch_size: usize,
    /// Cosine similarity at or above which a pair is assessed
    pub candidate_threshold: f64,
    /// Verdict strength at or above which a conflict is recorded
    pub min_strength: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3_600,
            batch_size: 10,
            candidate_threshold: 0.75,
            min_strength: 0.5,
        }
    }
}

/// All agent settings together
fn default_shutdown_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds to wait for in-flight cycles on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    /// Research agent settings
    pub research: ResearchConfig,
    /// Extraction agent settings
    pub extraction: ExtractionConfig,
    /// Validation agent settings
    pub validation: ValidationConfig,
    /// Knowledge agent settings
    pub knowledge: KnowledgeConfig,
    /// Conflict agent settings
    pub conflict: ConflictConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout(),
            research: ResearchConfig::default(),
            extraction: ExtractionConfig::default(),
            validation: ValidationConfig::default(),
            knowledge: KnowledgeConfig::default(),
            conflict: ConflictConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Shutdown drain budget as a Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Check the configuration for values that would wedge the pipeline
    pub fn validate(&self) -> Result<(), String> {
        if self.research.batch_size == 0
            || self.extraction.batch_size == 0
            || self.validation.batch_size == 0
            || self.knowledge.batch_size == 0
            || self.conflict.batch_size == 0
        {
            return Err("batch sizes must be at least 1".to_string());
        }
        if self.research.interval_secs == 0
            || self.extraction.interval_secs == 0
            || self.validation.interval_secs == 0
            || self.knowledge.interval_secs == 0
            || self.conflict.interval_secs == 0
        {
            return Err("intervals must be at least 1 second".to_string());
        }
        for (name, value) in [
            ("validation.duplicate_threshold", self.validation.duplicate_threshold),
            ("validation.auto_approve_score", self.validation.auto_approve_score),
            ("validation.reject_score", self.validation.reject_score),
            ("conflict.candidate_threshold", self.conflict.candidate_threshold),
            ("conflict.min_strength", self.conflict.min_strength),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} must be between 0.0 and 1.0"));
            }
        }
        if self.validation.reject_score >= self.validation.auto_approve_score {
            return Err("validation.reject_score must be below auto_approve_score".to_string());
        }
        if !(0.0..=1.0).contains(&self.extraction.confidence_damping) {
            return Err("extraction.confidence_damping must be between 0.0 and 1.0".to_string());
        }
        if self.extraction.max_attempts == 0 {
            return Err("extraction.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

impl ResearchConfig {
    /// Poll interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl ExtractionConfig {
    /// Cycle interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl ValidationConfig {
    /// Cycle interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl KnowledgeConfig {
    /// Cycle interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl ConflictConfig {
    /// Scan interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
