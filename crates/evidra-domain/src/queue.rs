//! Research queue - publications waiting for claim extraction

use std::fmt;

/// Unique identifier for a queue item (UUIDv7, same scheme as `ClaimId`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueueId(u128);

impl QueueId {
    /// Generate a new UUIDv7-based QueueId
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a QueueId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for QueueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// Which adapter produced a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// PubMed E-utilities
    PubMed,
    /// CrossRef works API
    CrossRef,
    /// RSS or Atom journal feed
    Rss,
    /// Manually enqueued by an operator
    Manual,
}

impl SourceKind {
    /// Stable string form used in storage and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PubMed => "pubmed",
            SourceKind::CrossRef => "crossref",
            SourceKind::Rss => "rss",
            SourceKind::Manual => "manual",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_strict(s: &str) -> Result<Self, String> {
        match s {
            "pubmed" => Ok(SourceKind::PubMed),
            "crossref" => Ok(SourceKind::CrossRef),
            "rss" => Ok(SourceKind::Rss),
            "manual" => Ok(SourceKind::Manual),
            other => Err(format!("Unknown source kind: {}", other)),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    /// Waiting for the extraction agent
    Pending,
    /// Claimed by an extraction run
    Processing,
    /// Claims extracted and stored
    Completed,
    /// Transient failure, will be retried
    Failed,
    /// Permanently unusable (no abstract, retries exhausted)
    Rejected,
}

impl QueueStatus {
    /// Stable string form used in storage and APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
            QueueStatus::Rejected => "rejected",
        }
    }

    /// Parse from the stable string form
    pub fn from_str_strict(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            "rejected" => Ok(QueueStatus::Rejected),
            other => Err(format!("Unknown queue status: {}", other)),
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A publication queued for claim extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchQueueItem {
    /// Unique identifier
    pub id: QueueId,

    /// Publication title
    pub title: String,

    /// Author names in citation order
    pub authors: Vec<String>,

    /// Abstract text. Items without one are rejected at extraction time.
    pub abstract_text: Option<String>,

    /// DOI, when the source provides one
    pub doi: Option<String>,

    /// Link to the publication
    pub url: Option<String>,

    /// Journal or venue name
    pub journal: Option<String>,

    /// Publication date (Unix seconds), when reported
    pub published_at: Option<u64>,

    /// Adapter that produced the item
    pub source: SourceKind,

    /// Extraction priority, 1 (highest) through 10 (lowest)
    pub priority: u8,

    /// Processing status
    pub status: QueueStatus,

    /// Extraction attempts so far
    pub attempts: u32,

    /// Last failure message, for diagnosis
    pub last_error: Option<String>,

    /// When the item was enqueued (Unix seconds)
    pub created_at: u64,

    /// Last status change (Unix seconds)
    pub updated_at: u64,
}

impl ResearchQueueItem {
    /// Build a fresh pending item with middle priority
    pub fn new(title: String, source: SourceKind, created_at: u64) -> Self {
        Self {
            id: QueueId::new(),
            title,
            authors: Vec::new(),
            abstract_text: None,
            doi: None,
            url: None,
            journal: None,
            published_at: None,
            source,
            priority: 5,
            status: QueueStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Deduplication key: DOI when present, otherwise a normalized title
    ///
    /// Titles are lowercased with whitespace collapsed so trivial
    /// formatting differences across sources do not create duplicates.
    pub fn dedup_key(&self) -> String {
        match &self.doi {
            Some(doi) if !doi.is_empty() => format!("doi:{}", doi.trim().to_lowercase()),
            _ => {
                let normalized: String = self
                    .title
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                format!("title:{}", normalized)
            }
        }
    }
}
