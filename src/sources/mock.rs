// src/sources/mock.rs
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use std::collections::HashMap;

use crate::error::{ExplainError, ExplainResult};
use crate::sources::{NewsSource, PriceSource};
use crate::types::{Headline, PriceBar};

/// Two fixed headlines for any ticker/day: a results beat and a sector rally.
#[derive(Debug, Clone, Default)]
pub struct MockNewsSource;

impl MockNewsSource {
    pub fn new() -> Self {
        Self
    }

    pub fn headlines_for(ticker: &str, date: NaiveDate) -> Vec<Headline> {
        let at = |h: u32, m: u32| {
            date.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default())
                .and_utc()
        };
        vec![
            Headline::new(
                format!("{ticker} posts stronger-than-expected results"),
                "MockWire",
                at(14, 0),
                ticker,
            ),
            Headline::new(
                format!("Sector peers rally, lifting {ticker}"),
                "MockFinance",
                at(9, 30),
                ticker,
            ),
        ]
    }
}

#[async_trait]
impl NewsSource for MockNewsSource {
    async fn headlines(&self, ticker: &str, date: NaiveDate) -> ExplainResult<Vec<Headline>> {
        Ok(Self::headlines_for(ticker, date))
    }

    fn name(&self) -> &'static str {
        "mock-news"
    }
}

/// Headlines keyed by `(TICKER, date)`; unknown keys yield an empty list.
#[derive(Debug, Clone, Default)]
pub struct StaticNewsSource {
    items: HashMap<(String, NaiveDate), Vec<Headline>>,
}

impl StaticNewsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ticker: &str, date: NaiveDate, headlines: Vec<Headline>) -> Self {
        self.items
            .entry((ticker.to_ascii_uppercase(), date))
            .or_default()
            .extend(headlines);
        self
    }
}

#[async_trait]
impl NewsSource for StaticNewsSource {
    async fn headlines(&self, ticker: &str, date: NaiveDate) -> ExplainResult<Vec<Headline>> {
        Ok(self
            .items
            .get(&(ticker.to_ascii_uppercase(), date))
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "static-news"
    }
}

/// In-memory bars keyed by `(TICKER, date)`.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    bars: HashMap<(String, NaiveDate), PriceBar>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bar(mut self, ticker: &str, bar: PriceBar) -> Self {
        self.bars.insert((ticker.to_ascii_uppercase(), bar.date), bar);
        self
    }

    pub fn with_open_close(self, ticker: &str, date: NaiveDate, open: f64, close: f64) -> Self {
        self.with_bar(ticker, PriceBar::from_open_close(date, open, close))
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn price_bar(&self, ticker: &str, date: NaiveDate) -> ExplainResult<PriceBar> {
        self.bars
            .get(&(ticker.to_ascii_uppercase(), date))
            .cloned()
            .ok_or_else(|| ExplainError::PriceNotFound {
                ticker: ticker.to_string(),
                date: date.to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "static-prices"
    }
}
