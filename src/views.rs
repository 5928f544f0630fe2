//! Market and news views: compact side summaries of one explanation.
//!
//! The market view labels the move's impact on a fixed scale (independent of the
//! configurable magnitude buckets); the news view lists the ranked drivers with
//! their outlet, category and classifier confidence. Both are derived from the
//! same records as the `Explanation` and never change it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::types::{Category, Direction, Explanation, MoveRecord, RankedDriverSet};

/// |pct_change| at or above this is a notable move.
pub const NOTABLE_IMPACT_PCT: f64 = 2.0;
/// |pct_change| at or above this is a very large move.
pub const VERY_LARGE_IMPACT_PCT: f64 = 5.0;

pub const NO_HEADLINES_SUMMARY: &str = "No relevant company-specific headlines found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Mild,
    Notable,
    VeryLarge,
}

impl Impact {
    pub fn from_pct(pct_change: f64) -> Self {
        let m = pct_change.abs();
        if m >= VERY_LARGE_IMPACT_PCT {
            Impact::VeryLarge
        } else if m >= NOTABLE_IMPACT_PCT {
            Impact::Notable
        } else {
            Impact::Mild
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Mild => "mild",
            Impact::Notable => "notable",
            Impact::VeryLarge => "very_large",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketView {
    pub ticker: String,
    pub date: NaiveDate,
    pub direction: Direction,
    /// Absolute percentage change.
    pub pct_change: f64,
    pub impact: Impact,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsDriverView {
    pub text: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub category: Category,
    pub category_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsView {
    pub has_news: bool,
    pub summary: String,
    pub drivers: Vec<NewsDriverView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Views {
    pub market: MarketView,
    pub news: NewsView,
}

pub fn market_view(ticker: &str, date: NaiveDate, movement: &MoveRecord) -> MarketView {
    let pct = movement.pct_change.abs();
    let impact = Impact::from_pct(movement.pct_change);
    let summary = match movement.direction {
        Direction::Flat => format!(
            "{ticker} was flat ({:+.2}%) on {date} ({} move).",
            movement.pct_change,
            impact.as_str()
        ),
        dir => format!(
            "{ticker} was {} {pct:.2}% on {date} ({} move).",
            dir.as_str(),
            impact.as_str()
        ),
    };
    MarketView {
        ticker: ticker.to_string(),
        date,
        direction: movement.direction,
        pct_change: pct,
        impact,
        summary,
    }
}

pub fn news_view(ticker: &str, date: NaiveDate, drivers: &RankedDriverSet) -> NewsView {
    if drivers.is_empty() {
        return NewsView {
            has_news: false,
            summary: NO_HEADLINES_SUMMARY.to_string(),
            drivers: Vec::new(),
        };
    }

    let mut summary = format!("Top headlines for {ticker} on {date}:");
    let mut out = Vec::with_capacity(drivers.len());
    for d in drivers {
        let h = &d.headline;
        let _ = write!(
            summary,
            "\n- {} -> {} ({:.2})",
            h.text().trim(),
            h.category,
            h.category_confidence
        );
        out.push(NewsDriverView {
            text: h.text().to_string(),
            source: h.source().to_string(),
            published_at: h.published_at(),
            category: h.category,
            category_confidence: h.category_confidence,
        });
    }

    NewsView {
        has_news: true,
        summary,
        drivers: out,
    }
}

pub fn build_views(explanation: &Explanation, drivers: &RankedDriverSet) -> Views {
    Views {
        market: market_view(&explanation.ticker, explanation.date, &explanation.movement),
        news: news_view(&explanation.ticker, explanation.date, drivers),
    }
}

/// Explanation plus optional views. Serializes as the bare explanation when
/// `views` is absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainReport {
    #[serde(flatten)]
    pub explanation: Explanation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<Views>,
}

impl ExplainReport {
    pub fn without_views(mut self) -> Self {
        self.views = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CategoryScore, ClassifiedHeadline, Driver, Headline, MagnitudeBucket};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()
    }

    fn mv(pct: f64, direction: Direction) -> MoveRecord {
        MoveRecord {
            pct_change: pct,
            direction,
            magnitude_bucket: MagnitudeBucket::Moderate,
        }
    }

    #[test]
    fn impact_labels_follow_fixed_cutoffs() {
        assert_eq!(Impact::from_pct(0.4), Impact::Mild);
        assert_eq!(Impact::from_pct(-1.99), Impact::Mild);
        assert_eq!(Impact::from_pct(2.0), Impact::Notable);
        assert_eq!(Impact::from_pct(-4.99), Impact::Notable);
        assert_eq!(Impact::from_pct(5.0), Impact::VeryLarge);
        assert_eq!(Impact::from_pct(-7.5), Impact::VeryLarge);
    }

    #[test]
    fn market_summary_uses_absolute_move() {
        let v = market_view("AAPL", day(), &mv(-3.0, Direction::Down));
        assert_eq!(v.pct_change, 3.0);
        assert_eq!(v.impact, Impact::Notable);
        assert_eq!(v.summary, "AAPL was down 3.00% on 2025-11-03 (notable move).");

        let flat = market_view("AAPL", day(), &mv(0.05, Direction::Flat));
        assert_eq!(flat.summary, "AAPL was flat (+0.05%) on 2025-11-03 (mild move).");
    }

    #[test]
    fn news_view_lists_drivers_in_rank_order() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 3, 14, 0, 0).unwrap();
        let set = RankedDriverSet::new(vec![
            Driver::new(
                Arc::new(ClassifiedHeadline::new(
                    Headline::new("AAPL posts record profit", "Reuters", ts, "AAPL"),
                    CategoryScore::new(Category::Earnings, 0.75),
                    0.6,
                )),
                0.9,
                0,
            ),
            Driver::new(
                Arc::new(ClassifiedHeadline::new(
                    Headline::new("Chipmakers rally", "CNBC", ts, "AAPL"),
                    CategoryScore::new(Category::Sector, 0.5),
                    0.3,
                )),
                0.4,
                1,
            ),
        ]);
        let v = news_view("AAPL", day(), &set);
        assert!(v.has_news);
        assert_eq!(v.drivers.len(), 2);
        assert_eq!(v.drivers[0].source, "Reuters");
        assert_eq!(
            v.summary,
            "Top headlines for AAPL on 2025-11-03:\n- AAPL posts record profit -> Earnings (0.75)\n- Chipmakers rally -> Sector (0.50)"
        );
    }

    #[test]
    fn empty_driver_set_has_no_news() {
        let v = news_view("AAPL", day(), &RankedDriverSet::empty());
        assert!(!v.has_news);
        assert_eq!(v.summary, NO_HEADLINES_SUMMARY);
        assert!(v.drivers.is_empty());
    }
}
