//! Literature source adapters for the ingestion pipeline
//!
//! Each adapter pulls recently published articles from one upstream
//! (PubMed, CrossRef, or an RSS feed) and normalizes them into
//! [`CandidateRecord`]s for the research queue. Adapters carry their
//! own request throttle and circuit breaker so one misbehaving
//! upstream cannot stall the others.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod crossref;
pub mod limiter;
pub mod pubmed;
pub mod rss;

pub use crossref::CrossRefSource;
pub use limiter::{CircuitBreaker, Throttle};
pub use pubmed::PubMedSource;
pub use rss::RssSource;

use evidra_domain::{QueueId, ResearchQueueItem, SourceKind};
use thiserror::Error;

/// Errors produced by source adapters
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network or HTTP-level failure
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Upstream returned a payload we could not parse
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// The adapter's circuit breaker is open
    #[error("circuit breaker open for source '{0}'")]
    CircuitOpen(String),

    /// Upstream rejected the request
    #[error("upstream error ({status}): {message}")]
    Upstream {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Http(err.to_string())
    }
}

/// A normalized article candidate from any upstream
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    /// Article title
    pub title: String,
    /// Author names, possibly empty
    pub authors: Vec<String>,
    /// Abstract text when the upstream provides one
    pub abstract_text: Option<String>,
    /// DOI when known
    pub doi: Option<String>,
    /// Link to the article
    pub url: Option<String>,
    /// Journal or feed name
    pub journal: Option<String>,
    /// Publication time as a Unix timestamp
    pub published_at: Option<u64>,
    /// Which upstream produced this record
    pub source: SourceKind,
}

impl CandidateRecord {
    /// Convert into a research queue item with default priority
    pub fn into_queue_item(self, now: u64) -> ResearchQueueItem {
        ResearchQueueItem {
            id: QueueId::new(),
            title: self.title,
            authors: self.authors,
            abstract_text: self.abstract_text,
            doi: self.doi,
            url: self.url,
            journal: self.journal,
            published_at: self.published_at,
            source: self.source,
            priority: 5,
            status: evidra_domain::QueueStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A literature upstream that can be polled for recent articles
pub trait LiteratureSource {
    /// Human-readable adapter name for logging
    fn name(&self) -> &str;

    /// Which [`SourceKind`] this adapter produces
    fn kind(&self) -> SourceKind;

    /// Fetch articles published within the last `days_back` days,
    /// returning at most `max_results` records
    fn fetch_recent(
        &mut self,
        days_back: u32,
        max_results: usize,
    ) -> Result<Vec<CandidateRecord>, SourceError>;
}

/// In-memory source for tests
#[derive(Debug, Default)]
pub struct MockSource {
    name: String,
    kind_override: Option<SourceKind>,
    records: Vec<CandidateRecord>,
    fail: bool,
    fetch_calls: u32,
}

impl MockSource {
    /// Create a mock that returns the given records
    pub fn new(name: &str, records: Vec<CandidateRecord>) -> Self {
        Self {
            name: name.to_string(),
            kind_override: None,
            records,
            fail: false,
            fetch_calls: 0,
        }
    }

    /// Create a mock whose fetches always fail
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind_override: None,
            records: Vec::new(),
            fail: true,
            fetch_calls: 0,
        }
    }

    /// Override the reported source kind
    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind_override = Some(kind);
        self
    }

    /// Number of fetch_recent calls so far
    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls
    }
}

impl LiteratureSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind_override.unwrap_or(SourceKind::Manual)
    }

    fn fetch_recent(
        &mut self,
        _days_back: u32,
        max_results: usize,
    ) -> Result<Vec<CandidateRecord>, SourceError> {
        self.fetch_calls += 1;
        if self.fail {
            return Err(SourceError::Http("simulated failure".to_string()));
        }
        Ok(self.records.iter().take(max_results).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> CandidateRecord {
        CandidateRecord {
            title: "Creatine and strength gains".to_string(),
            authors: vec!["Lee J".to_string()],
            abstract_text: Some("A trial of creatine supplementation.".to_string()),
            doi: Some("10.1000/test.1".to_string()),
            url: None,
            journal: Some("J Strength Cond Res".to_string()),
            published_at: Some(1_700_000_000),
            source: SourceKind::PubMed,
        }
    }

    #[test]
    fn test_into_queue_item_carries_fields() {
        let record = sample_record();
        let item = record.clone().into_queue_item(42);

        assert_eq!(item.title, record.title);
        assert_eq!(item.doi, record.doi);
        assert_eq!(item.source, SourceKind::PubMed);
        assert_eq!(item.priority, 5);
        assert_eq!(item.created_at, 42);
        assert_eq!(item.attempts, 0);
    }

    #[test]
    fn test_mock_source_respects_max_results() {
        let mut source = MockSource::new("mock", vec![sample_record(), sample_record()]);
        let records = source.fetch_recent(7, 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(source.fetch_calls(), 1);
    }

    #[test]
    fn test_failing_mock_source() {
        let mut source = MockSource::failing("broken");
        assert!(source.fetch_recent(7, 10).is_err());
    }
}
