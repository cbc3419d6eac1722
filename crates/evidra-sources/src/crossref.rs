//! CrossRef adapter using the public works API

use crate::limiter::{CircuitBreaker, Throttle};
use crate::{CandidateRecord, LiteratureSource, SourceError};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use evidra_domain::SourceKind;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://api.crossref.org";
const DEFAULT_QUERY: &str = "resistance training sports nutrition";

/// Polite-pool rate for the public CrossRef API
const REQUESTS_PER_SECOND: u32 = 10;

#[derive(Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<WorkItem>,
}

#[derive(Deserialize)]
struct WorkItem {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<WorkAuthor>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    published: Option<PublishedDate>,
}

#[derive(Deserialize)]
struct WorkAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Deserialize)]
struct PublishedDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<i32>>,
}

/// Source adapter for the CrossRef works API
pub struct CrossRefSource {
    endpoint: String,
    query: String,
    mailto: Option<String>,
    client: reqwest::blocking::Client,
    throttle: Throttle,
    breaker: CircuitBreaker,
}

impl CrossRefSource {
    /// Create an adapter with the default endpoint and query
    pub fn new() -> Result<Self, SourceError> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Create an adapter against a custom endpoint, for testing
    pub fn with_endpoint(endpoint: &str) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            query: DEFAULT_QUERY.to_string(),
            mailto: None,
            client,
            throttle: Throttle::per_second(REQUESTS_PER_SECOND),
            breaker: CircuitBreaker::default(),
        })
    }

    /// Replace the search query
    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    /// Set a contact address for the CrossRef polite pool
    pub fn with_mailto(mut self, mailto: &str) -> Self {
        self.mailto = Some(mailto.to_string());
        self
    }
}

impl LiteratureSource for CrossRefSource {
    fn name(&self) -> &str {
        "crossref"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::CrossRef
    }

    fn fetch_recent(
        &mut self,
        days_back: u32,
        max_results: usize,
    ) -> Result<Vec<CandidateRecord>, SourceError> {
        if !self.breaker.allow() {
            return Err(SourceError::CircuitOpen(self.name().to_string()));
        }

        self.throttle.wait();
        let from_date = (Utc::now() - ChronoDuration::days(i64::from(days_back)))
            .format("%Y-%m-%d")
            .to_string();
        let filter = format!("from-pub-date:{from_date},type:journal-article");
        let url = format!("{}/works", self.endpoint);

        let mut request = self.client.get(&url).query(&[
            ("query", self.query.as_str()),
            ("filter", filter.as_str()),
            ("rows", &max_results.to_string()),
            ("sort", "published"),
            ("order", "desc"),
        ]);
        if let Some(mailto) = &self.mailto {
            request = request.query(&[("mailto", mailto.as_str())]);
        }

        let result = (|| {
            let response = request.send()?;
            if !response.status().is_success() {
                return Err(SourceError::Upstream {
                    status: response.status().as_u16(),
                    message: response.status().to_string(),
                });
            }
            let body: WorksResponse = response
                .json()
                .map_err(|e| SourceError::Parse(e.to_string()))?;
            debug!(items = body.message.items.len(), "crossref works fetched");
            Ok(body
                .message
                .items
                .into_iter()
                .filter_map(work_to_record)
                .collect())
        })();

        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }
}

fn work_to_record(item: WorkItem) -> Option<CandidateRecord> {
    let title = item.title.into_iter().next().filter(|t| !t.trim().is_empty())?;
    let authors = item
        .author
        .into_iter()
        .filter_map(|a| match (a.family, a.given) {
            (Some(family), Some(given)) => Some(format!("{family} {given}")),
            (Some(family), None) => Some(family),
            (None, Some(given)) => Some(given),
            (None, None) => None,
        })
        .collect();
    let abstract_text = item.abstract_text.map(|a| strip_jats_markup(&a));
    let published_at = item.published.and_then(|p| date_parts_to_timestamp(&p.date_parts));

    Some(CandidateRecord {
        title: title.trim().to_string(),
        authors,
        abstract_text,
        doi: item.doi,
        url: item.url,
        journal: item.container_title.into_iter().next(),
        published_at,
        source: SourceKind::CrossRef,
    })
}

fn date_parts_to_timestamp(parts: &[Vec<i32>]) -> Option<u64> {
    let first = parts.first()?;
    let year = *first.first()?;
    let month = first.get(1).copied().unwrap_or(1).clamp(1, 12) as u32;
    let day = first.get(2).copied().unwrap_or(1).clamp(1, 31) as u32;
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 1))?;
    let ts = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp();
    u64::try_from(ts).ok()
}

/// Strip JATS tags such as `<jats:p>` from CrossRef abstract markup
fn strip_jats_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            // A tag boundary separates adjacent text runs
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
