//! Records flowing through the explanation pipeline.
//!
//! Every stage consumes immutable records and produces a new one. Classified
//! headlines are shared behind `Arc` so the ranked driver set references them
//! instead of copying.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One daily bar from the price collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub date: NaiveDate,
}

impl PriceBar {
    /// Bar with only open/close known; high/low are derived from them.
    pub fn from_open_close(date: NaiveDate, open: f64, close: f64) -> Self {
        Self {
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: 0,
            date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MagnitudeBucket {
    Small,
    Moderate,
    Large,
}

impl MagnitudeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            MagnitudeBucket::Small => "small",
            MagnitudeBucket::Moderate => "moderate",
            MagnitudeBucket::Large => "large",
        }
    }
}

/// Signed daily move derived from a `PriceBar`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub pct_change: f64,
    pub direction: Direction,
    pub magnitude_bucket: MagnitudeBucket,
}

/// Fixed headline taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Earnings,
    Sector,
    Macro,
    Analyst,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Earnings,
        Category::Sector,
        Category::Macro,
        Category::Analyst,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Earnings => "Earnings",
            Category::Sector => "Sector",
            Category::Macro => "Macro",
            Category::Analyst => "Analyst",
            Category::Other => "Other",
        }
    }

    /// Candidate label handed to zero-shot models.
    pub fn zero_shot_label(&self) -> &'static str {
        match self {
            Category::Earnings => "earnings/results",
            Category::Sector => "sector/industry",
            Category::Macro => "macro/market",
            Category::Analyst => "analyst/ratings",
            Category::Other => "other",
        }
    }

    /// Noun phrase used in narratives.
    pub fn phrase(&self) -> &'static str {
        match self {
            Category::Earnings => "earnings news",
            Category::Sector => "sector developments",
            Category::Macro => "macroeconomic news",
            Category::Analyst => "analyst actions",
            Category::Other => "company-specific news",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts canonical names and zero-shot labels, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        match norm.as_str() {
            "earnings" | "earnings/results" | "results" => Ok(Category::Earnings),
            "sector" | "sector/industry" | "industry" => Ok(Category::Sector),
            "macro" | "macro/market" | "market" => Ok(Category::Macro),
            "analyst" | "analyst/ratings" | "ratings" => Ok(Category::Analyst),
            "other" | "product/company-specific" | "company" => Ok(Category::Other),
            _ => Err(format!("unknown category `{s}`")),
        }
    }
}

/// Raw headline from the news collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub text: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub ticker: String,
}

impl Headline {
    pub fn new(
        text: impl Into<String>,
        source: impl Into<String>,
        published_at: DateTime<Utc>,
        ticker: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            published_at,
            ticker: ticker.into(),
        }
    }

    /// Whitespace-only text carries no evidence.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Output of a classifier: the winning category and its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryScore {
    pub category: Category,
    pub confidence: f64,
}

impl CategoryScore {
    pub fn new(category: Category, confidence: f64) -> Self {
        Self {
            category,
            confidence: clamp01(confidence),
        }
    }
}

/// Headline plus classification and sentiment. Built once per headline.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedHeadline {
    pub headline: Headline,
    pub category: Category,
    pub category_confidence: f64,
    pub sentiment: f64,
    /// Blank text; never ranked.
    pub flagged: bool,
}

impl ClassifiedHeadline {
    pub fn new(headline: Headline, score: CategoryScore, sentiment: f64) -> Self {
        Self {
            headline,
            category: score.category,
            category_confidence: clamp01(score.confidence),
            sentiment: clamp_signed(sentiment),
            flagged: false,
        }
    }

    /// Blank headline: Other, zero confidence, flagged.
    pub fn flagged_blank(headline: Headline) -> Self {
        Self {
            headline,
            category: Category::Other,
            category_confidence: 0.0,
            sentiment: 0.0,
            flagged: true,
        }
    }

    pub fn text(&self) -> &str {
        &self.headline.text
    }

    pub fn source(&self) -> &str {
        &self.headline.source
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.headline.published_at
    }
}

/// A ranked headline together with the relevance it earned for this move.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub headline: Arc<ClassifiedHeadline>,
    pub relevance_score: f64,
    /// Position in the ranker's input, last tie-breaker.
    pub input_index: usize,
}

impl Driver {
    pub fn new(headline: Arc<ClassifiedHeadline>, relevance_score: f64, input_index: usize) -> Self {
        Self {
            headline,
            relevance_score: clamp01(relevance_score),
            input_index,
        }
    }

    pub fn record(&self) -> DriverRecord {
        DriverRecord {
            text: self.headline.headline.text.clone(),
            category: self.headline.category,
            sentiment: self.headline.sentiment,
            relevance_score: self.relevance_score,
        }
    }
}

/// Total order: relevance desc, then most recent first, then input order.
pub fn driver_order(a: &Driver, b: &Driver) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| b.headline.published_at().cmp(&a.headline.published_at()))
        .then_with(|| a.input_index.cmp(&b.input_index))
}

/// Ordered drivers (non-increasing relevance). Construction always sorts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedDriverSet {
    drivers: Vec<Driver>,
}

impl RankedDriverSet {
    pub fn new(mut drivers: Vec<Driver>) -> Self {
        drivers.sort_by(driver_order);
        Self { drivers }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Keep at most `k` leading drivers.
    pub fn truncated(mut self, k: usize) -> Self {
        self.drivers.truncate(k);
        self
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Driver> {
        self.drivers.iter()
    }

    pub fn as_slice(&self) -> &[Driver] {
        &self.drivers
    }

    pub fn top(&self) -> Option<&Driver> {
        self.drivers.first()
    }

    pub fn records(&self) -> Vec<DriverRecord> {
        self.drivers.iter().map(Driver::record).collect()
    }
}

impl<'a> IntoIterator for &'a RankedDriverSet {
    type Item = &'a Driver;
    type IntoIter = std::slice::Iter<'a, Driver>;

    fn into_iter(self) -> Self::IntoIter {
        self.drivers.iter()
    }
}

/// Serialized driver entry of an `Explanation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub text: String,
    pub category: Category,
    pub sentiment: f64,
    pub relevance_score: f64,
}

/// Terminal output, one per (ticker, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub ticker: String,
    pub date: NaiveDate,
    #[serde(rename = "move")]
    pub movement: MoveRecord,
    pub drivers: Vec<DriverRecord>,
    pub narrative: String,
    /// In [0, 1].
    pub confidence: f64,
}

pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

pub(crate) fn clamp_signed(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(-1.0, 1.0)
    }
}
