// src/sources/mod.rs
//! Collaborators that supply raw inputs: one daily price bar and the day's headlines.
//!
//! - `mock`: deterministic in-memory sources (demo, tests).
//! - `rss`: RSS 2.0 headlines from a fixture string or a per-ticker URL.
//! - `yahoo`: daily bar from the Yahoo Finance chart endpoint.

pub mod mock;
pub mod rss;
pub mod yahoo;

use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{ExplainError, ExplainResult};
use crate::types::{Headline, PriceBar};

pub use mock::{MockNewsSource, StaticNewsSource, StaticPriceSource};
pub use rss::RssNewsSource;
pub use yahoo::YahooPriceSource;

/// Headline text is capped at this many characters.
pub const MAX_HEADLINE_CHARS: usize = 512;
pub const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fails with `PriceNotFound` when no bar exists, `UpstreamFetchFailure` on I/O.
    async fn price_bar(&self, ticker: &str, date: NaiveDate) -> ExplainResult<PriceBar>;

    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// May be empty; that is not an error.
    async fn headlines(&self, ticker: &str, date: NaiveDate) -> ExplainResult<Vec<Headline>>;

    fn name(&self) -> &'static str;
}

/// Run `op` under `limit`; on an upstream failure or timeout, retry exactly once.
/// `PriceNotFound` and the other typed errors are returned immediately.
pub async fn fetch_with_retry<T, F, Fut>(
    source_name: &str,
    limit: Duration,
    mut op: F,
) -> ExplainResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExplainResult<T>>,
{
    let mut attempt = 0u8;
    loop {
        attempt += 1;
        let res = match tokio::time::timeout(limit, op()).await {
            Ok(r) => r,
            Err(_) => Err(ExplainError::upstream(
                source_name,
                format!("timed out after {} ms", limit.as_millis()),
            )),
        };
        match res {
            Err(e @ ExplainError::UpstreamFetchFailure { .. }) if attempt < 2 => {
                warn!(target: "pipeline", source = source_name, error = %e, "fetch failed; retrying once");
                counter!("upstream_retries_total", "source" => source_name.to_string()).increment(1);
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
            other => return other,
        }
    }
}

/// Decode entities, strip tags, ASCII quotes, collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    out = out.split_whitespace().collect::<Vec<_>>().join(" ");

    if out.chars().count() > MAX_HEADLINE_CHARS {
        out = out.chars().take(MAX_HEADLINE_CHARS).collect();
    }
    out
}
