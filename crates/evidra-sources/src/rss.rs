//! RSS feed adapter for journal alert feeds

use crate::limiter::{CircuitBreaker, Throttle};
use crate::{CandidateRecord, LiteratureSource, SourceError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use evidra_domain::SourceKind;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::time::Duration;
use tracing::debug;

const REQUESTS_PER_SECOND: u32 = 2;

/// Source adapter that polls one RSS feed
pub struct RssSource {
    name: String,
    feed_url: String,
    client: reqwest::blocking::Client,
    throttle: Throttle,
    breaker: CircuitBreaker,
}

impl RssSource {
    /// Create an adapter for a feed URL
    pub fn new(name: &str, feed_url: &str) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            name: name.to_string(),
            feed_url: feed_url.to_string(),
            client,
            throttle: Throttle::per_second(REQUESTS_PER_SECOND),
            breaker: CircuitBreaker::default(),
        })
    }
}

impl LiteratureSource for RssSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }

    fn fetch_recent(
        &mut self,
        days_back: u32,
        max_results: usize,
    ) -> Result<Vec<CandidateRecord>, SourceError> {
        if !self.breaker.allow() {
            return Err(SourceError::CircuitOpen(self.name.clone()));
        }

        self.throttle.wait();
        let result = (|| {
            let response = self.client.get(&self.feed_url).send()?;
            if !response.status().is_success() {
                return Err(SourceError::Upstream {
                    status: response.status().as_u16(),
                    message: response.status().to_string(),
                });
            }
            let xml = response.text()?;
            let cutoff = Utc::now() - ChronoDuration::days(i64::from(days_back));
            let records = parse_feed(&xml, Some(cutoff.timestamp()))?;
            debug!(feed = %self.name, items = records.len(), "rss feed fetched");
            Ok(records.into_iter().take(max_results).collect())
        })();

        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }
}

#[derive(Default)]
struct ItemBuilder {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    published_at: Option<u64>,
}

/// Parse an RSS 2.0 document, keeping items published after `cutoff`
///
/// Items without a parseable `pubDate` are kept.
pub fn parse_feed(xml: &str, cutoff: Option<i64>) -> Result<Vec<CandidateRecord>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut channel_title: Option<String> = None;
    let mut current: Option<ItemBuilder> = None;
    let mut tag: Option<String> = None;
    let mut in_item = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" {
                    in_item = true;
                    current = Some(ItemBuilder::default());
                }
                tag = Some(name);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" {
                    in_item = false;
                    if let Some(item) = current.take() {
                        let too_old = match (cutoff, item.published_at) {
                            (Some(cutoff), Some(published)) => (published as i64) < cutoff,
                            _ => false,
                        };
                        if let Some(title) = item.title.filter(|t| !t.trim().is_empty()) {
                            if !too_old {
                                records.push(CandidateRecord {
                                    title: title.trim().to_string(),
                                    authors: Vec::new(),
                                    abstract_text: item.description,
                                    doi: None,
                                    url: item.link,
                                    journal: channel_title.clone(),
                                    published_at: item.published_at,
                                    source: SourceKind::Rss,
                                });
                            }
                        }
                    }
                }
                tag = None;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| SourceError::Parse(e.to_string()))?
                    .into_owned();
                apply_text(&mut channel_title, &mut current, in_item, tag.as_deref(), text);
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(c.as_ref()).into_owned();
                apply_text(&mut channel_title, &mut current, in_item, tag.as_deref(), text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SourceError::Parse(e.to_string())),
        }
    }

    Ok(records)
}

fn apply_text(
    channel_title: &mut Option<String>,
    current: &mut Option<ItemBuilder>,
    in_item: bool,
    tag: Option<&str>,
    text: String,
) {
    match (in_item, tag) {
        (false, Some("title")) => {
            if channel_title.is_none() {
                *channel_title = Some(text);
            }
        }
        (true, Some("title")) => {
            if let Some(item) = current.as_mut() {
                item.title = Some(text);
            }
        }
        (true, Some("link")) => {
            if let Some(item) = current.as_mut() {
                item.link = Some(text);
            }
        }
        (true, Some("description")) => {
            if let Some(item) = current.as_mut() {
                item.description = Some(text);
            }
        }
        (true, Some("pubDate")) => {
            if let Some(item) = current.as_mut() {
                item.published_at = DateTime::parse_from_rfc2822(text.trim())
                    .ok()
                    .and_then(|dt| u64::try_from(dt.timestamp()).ok());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Sports Medicine Alerts</title>
    <link>https://example.org/feed</link>
    <item>
      <title>Sleep extension improves sprint performance</title>
      <link>https://example.org/articles/1</link>
      <description><![CDATA[A crossover trial of sleep extension in athletes.]]></description>
      <pubDate>Mon, 10 Feb 2025 08:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Old news item</title>
      <link>https://example.org/articles/2</link>
      <pubDate>Wed, 01 Jan 2020 00:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Undated item</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_feed_fields() {
        let records = parse_feed(SAMPLE_FEED, None).unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.title, "Sleep extension improves sprint performance");
        assert_eq!(first.url.as_deref(), Some("https://example.org/articles/1"));
        assert_eq!(
            first.abstract_text.as_deref(),
            Some("A crossover trial of sleep extension in athletes.")
        );
        assert_eq!(first.journal.as_deref(), Some("Sports Medicine Alerts"));
        assert_eq!(first.published_at, Some(1_739_174_400));
        assert_eq!(first.source, SourceKind::Rss);
    }

    #[test]
    fn test_parse_feed_cutoff_drops_old_items() {
        // Cutoff after 2020 but before the 2025 item
        let records = parse_feed(SAMPLE_FEED, Some(1_700_000_000)).unwrap();
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert!(titles.contains(&"Sleep extension improves sprint performance"));
        assert!(!titles.contains(&"Old news item"));
        // Undated items survive the cutoff
        assert!(titles.contains(&"Undated item"));
    }

    #[test]
    fn test_parse_feed_rejects_malformed_xml() {
        assert!(parse_feed("<rss><channel></item></rss>", None).is_err());
    }
}
