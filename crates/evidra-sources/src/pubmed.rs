//! PubMed adapter using the NCBI E-utilities
//!
//! Discovery is a two-step flow: `esearch.fcgi` returns PMIDs for a
//! date-bounded query, then a single `efetch.fcgi` call returns the
//! article XML for the whole batch.

use crate::limiter::{CircuitBreaker, Throttle};
use crate::{CandidateRecord, LiteratureSource, SourceError};
use chrono::NaiveDate;
use evidra_domain::SourceKind;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_ENDPOINT: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const DEFAULT_QUERY: &str =
    "(resistance training[Title/Abstract]) OR (sports nutrition[Title/Abstract])";

/// Requests per second permitted without an NCBI API key
const REQUESTS_PER_SECOND: u32 = 3;

#[derive(Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// Source adapter for the PubMed E-utilities API
pub struct PubMedSource {
    endpoint: String,
    query: String,
    client: reqwest::blocking::Client,
    throttle: Throttle,
    breaker: CircuitBreaker,
}

impl PubMedSource {
    /// Create an adapter with the default NCBI endpoint and query
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

    fn search_ids(&self, days_back: u32, max_results: usize) -> Result<Vec<String>, SourceError> {
        self.throttle.wait();
        let url = format!("{}/esearch.fcgi", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed"),
                ("term", self.query.as_str()),
                ("reldate", &days_back.to_string()),
                ("datetype", "pdat"),
                ("retmax", &max_results.to_string()),
                ("retmode", "json"),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(SourceError::Upstream {
                status: response.status().as_u16(),
                message: response.status().to_string(),
            });
        }

        let body: EsearchResponse = response
            .json()
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(body.esearchresult.idlist)
    }

    fn fetch_articles(&self, ids: &[String]) -> Result<Vec<CandidateRecord>, SourceError> {
        self.throttle.wait();
        let url = format!("{}/efetch.fcgi", self.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("db", "pubmed"),
                ("id", ids.join(",").as_str()),
                ("retmode", "xml"),
            ])
            .send()?;

        if !response.status().is_success() {
            return Err(SourceError::Upstream {
                status: response.status().as_u16(),
                message: response.status().to_string(),
            });
        }

        let xml = response.text()?;
        parse_efetch_xml(&xml)
    }
}

impl LiteratureSource for PubMedSource {
    fn name(&self) -> &str {
        "pubmed"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::PubMed
    }

    fn fetch_recent(
        &mut self,
        days_back: u32,
        max_results: usize,
    ) -> Result<Vec<CandidateRecord>, SourceError> {
        if !self.breaker.allow() {
            return Err(SourceError::CircuitOpen(self.name().to_string()));
        }

        let result = self.search_ids(days_back, max_results).and_then(|ids| {
            if ids.is_empty() {
                debug!("pubmed search returned no results");
                return Ok(Vec::new());
            }
            self.fetch_articles(&ids)
        });

        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }
}

#[derive(Default)]
struct ArticleBuilder {
    pmid: Option<String>,
    title: Option<String>,
    abstract_parts: Vec<String>,
    journal: Option<String>,
    authors: Vec<String>,
    doi: Option<String>,
    year: Option<i32>,
    current_last_name: Option<String>,
    current_initials: Option<String>,
}

impl ArticleBuilder {
    fn finish_author(&mut self) {
        if let Some(last) = self.current_last_name.take() {
            match self.current_initials.take() {
                Some(initials) => self.authors.push(format!("{last} {initials}")),
                None => self.authors.push(last),
            }
        }
        self.current_initials = None;
    }

    fn build(mut self) -> Option<CandidateRecord> {
        self.finish_author();
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        let abstract_text = if self.abstract_parts.is_empty() {
            None
        } else {
            Some(self.abstract_parts.join(" "))
        };
        let url = self
            .pmid
            .as_ref()
            .map(|pmid| format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/"));
        let published_at = self.year.and_then(year_to_timestamp);

        Some(CandidateRecord {
            title: title.trim().to_string(),
            authors: self.authors,
            abstract_text,
            doi: self.doi,
            url,
            journal: self.journal,
            published_at,
            source: SourceKind::PubMed,
        })
    }
}

fn year_to_timestamp(year: i32) -> Option<u64> {
    let date = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let ts = date.and_hms_opt(0, 0, 0)?.and_utc().timestamp();
    u64::try_from(ts).ok()
}

fn path_ends_with(stack: &[String], suffix: &[&str]) -> bool {
    if stack.len() < suffix.len() {
        return false;
    }
    stack
        .iter()
        .rev()
        .zip(suffix.iter().rev())
        .all(|(a, b)| a == b)
}

/// Parse an efetch `PubmedArticleSet` document into candidate records
pub fn parse_efetch_xml(xml: &str) -> Result<Vec<CandidateRecord>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<ArticleBuilder> = None;
    let mut id_type: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "PubmedArticle" {
                    current = Some(ArticleBuilder::default());
                }
                if name == "Author" {
                    if let Some(article) = current.as_mut() {
                        article.finish_author();
                    }
                }
                if name == "ArticleId" {
                    id_type = None;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"IdType" {
                            if let Ok(value) = attr.unescape_value() {
                                id_type = Some(value.into_owned());
                            }
                        }
                    }
                }
                stack.push(name);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "PubmedArticle" {
                    if let Some(article) = current.take() {
                        match article.build() {
                            Some(record) => records.push(record),
                            None => warn!("skipping pubmed article without a title"),
                        }
                    }
                }
                if name == "Author" {
                    if let Some(article) = current.as_mut() {
                        article.finish_author();
                    }
                }
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| SourceError::Parse(e.to_string()))?
                    .into_owned();
                if let Some(article) = current.as_mut() {
                    if path_ends_with(&stack, &["MedlineCitation", "PMID"]) {
                        article.pmid = Some(text);
                    } else if path_ends_with(&stack, &["ArticleTitle"]) {
                        article.title = Some(text);
                    } else if path_ends_with(&stack, &["Abstract", "AbstractText"]) {
                        article.abstract_parts.push(text);
                    } else if path_ends_with(&stack, &["Journal", "Title"]) {
                        article.journal = Some(text);
                    } else if path_ends_with(&stack, &["Author", "LastName"]) {
                        article.current_last_name = Some(text);
                    } else if path_ends_with(&stack, &["Author", "Initials"]) {
                        article.current_initials = Some(text);
                    } else if path_ends_with(&stack, &["PubDate", "Year"]) {
                        article.year = text.parse().ok();
                    } else if path_ends_with(&stack, &["ArticleId"])
                        && id_type.as_deref() == Some("doi")
                        && article.doi.is_none()
                    {
                        article.doi = Some(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SourceError::Parse(e.to_string())),
        }
    }

    Ok(records)
}
