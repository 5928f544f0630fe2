// src/sources/rss.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};
use tracing::{debug, warn};

use crate::analyze::mentions_ticker;
use crate::error::{ExplainError, ExplainResult};
use crate::sources::{normalize_text, NewsSource};
use crate::types::Headline;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    #[serde(rename = "$text", default)]
    name: String,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    match OffsetDateTime::parse(ts, &Rfc2822) {
        Ok(odt) => DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0),
        // Some feeds use zone names `time` rejects; chrono is more lenient.
        Err(_) => DateTime::parse_from_rfc2822(ts)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

enum Mode {
    /// Whole feed in memory; items must mention the ticker.
    Fixture(String),
    /// Per-ticker feed; `{ticker}` in the template is replaced.
    Http {
        url_template: String,
        client: reqwest::Client,
    },
}

/// RSS 2.0 headlines for one ticker and day.
pub struct RssNewsSource {
    mode: Mode,
}

impl RssNewsSource {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url_template(url_template: &str, timeout: Duration) -> ExplainResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("finexplain/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| ExplainError::upstream("rss", e))?;
        Ok(Self {
            mode: Mode::Http {
                url_template: url_template.to_string(),
                client,
            },
        })
    }

    /// Parse a feed and keep items published on `date` (UTC). Items without a
    /// parseable date cannot be placed on a day and are skipped.
    pub fn parse_items_from_str(
        s: &str,
        ticker: &str,
        date: NaiveDate,
        require_mention: bool,
    ) -> ExplainResult<Vec<Headline>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss =
            from_str(&xml_clean).map_err(|e| ExplainError::upstream("rss", format!("parse: {e}")))?;

        let channel_name = rss
            .channel
            .title
            .as_deref()
            .map(normalize_text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "RSS".to_string());

        let total = rss.channel.item.len();
        let mut out = Vec::with_capacity(total);
        for it in rss.channel.item {
            let text = normalize_text(it.title.as_deref().unwrap_or_default());
            if text.is_empty() {
                continue;
            }
            let Some(published_at) = it.pub_date.as_deref().and_then(parse_rfc2822) else {
                continue;
            };
            if published_at.date_naive() != date {
                continue;
            }
            if require_mention && !mentions_ticker(&text, ticker) {
                continue;
            }
            let source = it
                .source
                .map(|s| normalize_text(&s.name))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| channel_name.clone());
            out.push(Headline::new(text, source, published_at, ticker));
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_parse_ms").record(ms);
        counter!("news_headlines_total").increment(out.len() as u64);
        debug!(target: "pipeline", total, kept = out.len(), %date, "rss parsed");
        Ok(out)
    }
}

#[async_trait]
impl NewsSource for RssNewsSource {
    async fn headlines(&self, ticker: &str, date: NaiveDate) -> ExplainResult<Vec<Headline>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s, ticker, date, true),
            Mode::Http {
                url_template,
                client,
            } => {
                let url = url_template.replace("{ticker}", ticker);
                let resp = client.get(&url).send().await.map_err(|e| {
                    warn!(target: "pipeline", error = %e, provider = "rss", "provider http error");
                    ExplainError::upstream("rss", e)
                })?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(ExplainError::upstream("rss", format!("HTTP {status}")));
                }
                let body = resp
                    .text()
                    .await
                    .map_err(|e| ExplainError::upstream("rss", e))?;
                Self::parse_items_from_str(&body, ticker, date, false)
            }
        }
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Market Wire</title>
    <item>
      <title>AAPL beats estimates &amp; lifts guidance</title>
      <pubDate>Mon, 03 Nov 2025 14:05:00 GMT</pubDate>
      <source url="https://www.reuters.com">Reuters</source>
    </item>
    <item>
      <title>MSFT unveils new chips</title>
      <pubDate>Mon, 03 Nov 2025 10:00:00 -0500</pubDate>
    </item>
    <item>
      <title>AAPL supplier warns on demand</title>
      <pubDate>Sun, 02 Nov 2025 20:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn keeps_same_day_items_for_ticker() {
        let day = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let hs = RssNewsSource::parse_items_from_str(FEED, "AAPL", day, true).unwrap();
        assert_eq!(hs.len(), 1);
        assert_eq!(hs[0].text, "AAPL beats estimates & lifts guidance");
        assert_eq!(hs[0].source, "Reuters");
        assert_eq!(hs[0].ticker, "AAPL");
    }

    #[test]
    fn per_ticker_feed_skips_mention_check_and_uses_channel_name() {
        let day = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let hs = RssNewsSource::parse_items_from_str(FEED, "AAPL", day, false).unwrap();
        assert_eq!(hs.len(), 2);
        assert_eq!(hs[1].source, "Market Wire");
    }

    #[test]
    fn malformed_feed_is_upstream_failure() {
        let day = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let err = RssNewsSource::parse_items_from_str("<rss><oops>", "AAPL", day, true).unwrap_err();
        assert_eq!(err.code(), "upstream_fetch_failure");
    }
}
