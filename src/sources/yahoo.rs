// src/sources/yahoo.rs
//! Daily OHLCV bar from the Yahoo Finance chart endpoint
//! (`{endpoint}/{TICKER}?period1=..&period2=..&interval=1d`).
//!
//! Bars are matched on the exchange-local date (`meta.gmtoffset`). A null open or
//! close is passed through as NaN so the move calculator reports it as invalid
//! price data rather than silently skipping the day.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{ExplainError, ExplainResult};
use crate::sources::PriceSource;
use crate::types::PriceBar;

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Meta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

pub struct YahooPriceSource {
    endpoint: String,
    client: reqwest::Client,
}

impl YahooPriceSource {
    pub fn new(endpoint: &str, timeout: Duration) -> ExplainResult<Self> {
        let client = reqwest::Client::builder()
            // The chart API rejects requests without a browser-ish UA.
            .user_agent("Mozilla/5.0 (compatible; finexplain/0.1)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .map_err(|e| ExplainError::upstream("yahoo", e))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Pick the bar for `date` out of a chart response body.
    pub fn parse_chart(body: &str, ticker: &str, date: NaiveDate) -> ExplainResult<PriceBar> {
        let not_found = || ExplainError::PriceNotFound {
            ticker: ticker.to_string(),
            date: date.to_string(),
        };

        let env: ChartEnvelope = serde_json::from_str(body)
            .map_err(|e| ExplainError::upstream("yahoo", format!("decode: {e}")))?;

        if let Some(err) = env.chart.error {
            if err.code.eq_ignore_ascii_case("not found") {
                return Err(not_found());
            }
            return Err(ExplainError::upstream(
                "yahoo",
                format!("{}: {}", err.code, err.description),
            ));
        }

        let result = env
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(not_found)?;
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
        let offset = result.meta.gmtoffset;

        let idx = result
            .timestamp
            .iter()
            .position(|&ts| {
                DateTime::from_timestamp(ts + offset, 0)
                    .map(|dt| dt.date_naive() == date)
                    .unwrap_or(false)
            })
            .ok_or_else(not_found)?;

        let at = |v: &[Option<f64>]| v.get(idx).copied().flatten().unwrap_or(f64::NAN);
        Ok(PriceBar {
            open: at(&quote.open),
            high: at(&quote.high),
            low: at(&quote.low),
            close: at(&quote.close),
            volume: quote.volume.get(idx).copied().flatten().unwrap_or(0),
            date,
        })
    }
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    async fn price_bar(&self, ticker: &str, date: NaiveDate) -> ExplainResult<PriceBar> {
        let start = date
            .pred_opt()
            .unwrap_or(date)
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc()
            .timestamp();
        let end = start + 3 * 86_400;
        let url = format!("{}/{}", self.endpoint, ticker);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("period1", start.to_string()),
                ("period2", end.to_string()),
                ("interval", "1d".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ExplainError::upstream("yahoo", e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ExplainError::PriceNotFound {
                ticker: ticker.to_string(),
                date: date.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ExplainError::upstream("yahoo", format!("HTTP {status}")));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ExplainError::upstream("yahoo", e))?;
        debug!(target: "pipeline", ticker, %date, bytes = body.len(), "yahoo chart fetched");
        Self::parse_chart(&body, ticker, date)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}
