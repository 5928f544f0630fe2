// src/ranking.rs
//! News ranking: score each classified headline against the day's move and keep the top-K.
//!
//! relevance = weighted mean of
//! - `category_confidence` from the classifier,
//! - recency `0.5^(elapsed / half_life)` relative to the market close of the move date,
//! - directional alignment (sentiment sign vs. move direction; mismatch scores 0),
//! - source authority (see `source_weights`),
//! - ticker mention in the headline text.
//!
//! Flagged (blank) headlines never enter the ranking. Near-duplicates
//! (`strsim::normalized_levenshtein` ≥ `similarity_threshold`) collapse into the
//! best-ranked copy. Ordering is total: relevance desc, newest first, input order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use strsim::normalized_levenshtein;
use tracing::debug;

use crate::analyze::{anon_hash, mentions_ticker};
use crate::confidence::NEUTRAL_SENTIMENT_BAND;
use crate::source_weights::SourceWeightsConfig;
use crate::types::{
    clamp01, driver_order, ClassifiedHeadline, Direction, Driver, MoveRecord, RankedDriverSet,
};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_DECAY_HALF_LIFE: Duration = Duration::from_secs(6 * 3600);
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.90;
/// 21:00 UTC ≈ 16:00 New York (EST); close enough for a decay reference.
pub const DEFAULT_MARKET_CLOSE_UTC_HOUR: u32 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub category_confidence: f64,
    pub recency: f64,
    pub alignment: f64,
    #[serde(default)]
    pub source: f64,
    #[serde(default)]
    pub mention: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            category_confidence: 0.35,
            recency: 0.20,
            alignment: 0.30,
            source: 0.10,
            mention: 0.05,
        }
    }
}

impl RankingWeights {
    /// Negative/non-finite weights become 0; an all-zero set reverts to defaults.
    pub fn sanitized(self) -> Self {
        fn fix(w: f64) -> f64 {
            if w.is_finite() && w > 0.0 {
                w
            } else {
                0.0
            }
        }
        let out = Self {
            category_confidence: fix(self.category_confidence),
            recency: fix(self.recency),
            alignment: fix(self.alignment),
            source: fix(self.source),
            mention: fix(self.mention),
        };
        if out.total() <= 0.0 {
            Self::default()
        } else {
            out
        }
    }

    fn total(&self) -> f64 {
        self.category_confidence + self.recency + self.alignment + self.source + self.mention
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    pub top_k: usize,
    pub decay_half_life: Duration,
    pub weights: RankingWeights,
    /// Values above 1.0 disable duplicate collapsing.
    pub similarity_threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            decay_half_life: DEFAULT_DECAY_HALF_LIFE,
            weights: RankingWeights::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Request-specific inputs of the ranker.
#[derive(Debug, Clone)]
pub struct RankContext {
    pub ticker: String,
    /// Time the move is measured at; recency is relative to it.
    pub reference_time: DateTime<Utc>,
}

impl RankContext {
    pub fn new(ticker: impl Into<String>, reference_time: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.into(),
            reference_time,
        }
    }

    /// Reference = market close (given UTC hour) on `date`.
    pub fn at_close(ticker: impl Into<String>, date: NaiveDate, close_utc_hour: u32) -> Self {
        let reference_time = date
            .and_hms_opt(close_utc_hour.min(23), 0, 0)
            .unwrap_or_default()
            .and_utc();
        Self::new(ticker, reference_time)
    }
}

/// Per-signal breakdown, handy for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceParts {
    pub category_confidence: f64,
    pub recency: f64,
    pub alignment: f64,
    pub source: f64,
    pub mention: f64,
}

impl RelevanceParts {
    pub fn combine(&self, w: &RankingWeights) -> f64 {
        let w = w.sanitized();
        let raw = self.category_confidence * w.category_confidence
            + self.recency * w.recency
            + self.alignment * w.alignment
            + self.source * w.source
            + self.mention * w.mention;
        clamp01(raw / w.total())
    }
}

pub fn recency_weight(
    published_at: DateTime<Utc>,
    reference: DateTime<Utc>,
    half_life: Duration,
) -> f64 {
    let half = half_life.as_secs_f64();
    if half <= 0.0 {
        return 1.0;
    }
    let elapsed = (reference - published_at).num_seconds().unsigned_abs() as f64;
    0.5f64.powf(elapsed / half)
}

/// 1.0 when the tone matches the move, 0.0 when it opposes it, 0.5 when either is neutral.
pub fn alignment(direction: Direction, sentiment: f64) -> f64 {
    let neutral = sentiment.abs() <= NEUTRAL_SENTIMENT_BAND;
    match direction {
        Direction::Flat => {
            if neutral {
                1.0
            } else {
                0.5
            }
        }
        _ if neutral => 0.5,
        Direction::Up => {
            if sentiment > 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Direction::Down => {
            if sentiment < 0.0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

pub fn relevance_parts(
    item: &ClassifiedHeadline,
    movement: &MoveRecord,
    ctx: &RankContext,
    half_life: Duration,
    sources: &SourceWeightsConfig,
) -> RelevanceParts {
    RelevanceParts {
        category_confidence: item.category_confidence,
        recency: recency_weight(item.published_at(), ctx.reference_time, half_life),
        alignment: alignment(movement.direction, item.sentiment),
        source: sources.weight_for(&item.headline.source),
        mention: if mentions_ticker(item.text(), &ctx.ticker) {
            1.0
        } else {
            0.0
        },
    }
}

pub fn rank_headlines(
    items: &[Arc<ClassifiedHeadline>],
    movement: &MoveRecord,
    ctx: &RankContext,
    cfg: &RankingConfig,
    sources: &SourceWeightsConfig,
) -> RankedDriverSet {
    let mut scored: Vec<Driver> = items
        .iter()
        .enumerate()
        .filter(|(_, it)| !it.flagged)
        .map(|(idx, it)| {
            let parts = relevance_parts(it, movement, ctx, cfg.decay_half_life, sources);
            Driver::new(Arc::clone(it), parts.combine(&cfg.weights), idx)
        })
        .collect();
    scored.sort_by(driver_order);

    let mut kept: Vec<Driver> = Vec::with_capacity(cfg.top_k.min(scored.len()));
    let mut kept_texts: Vec<String> = Vec::new();
    for d in scored {
        if kept.len() >= cfg.top_k {
            break;
        }
        let text = d.headline.text().trim().to_lowercase();
        let dup = cfg.similarity_threshold <= 1.0
            && kept_texts
                .iter()
                .any(|k| normalized_levenshtein(k, &text) >= cfg.similarity_threshold);
        if dup {
            debug!(target: "ranking", id = %anon_hash(&text), "near-duplicate headline collapsed");
            continue;
        }
        kept_texts.push(text);
        kept.push(d);
    }

    debug!(
        target: "ranking",
        candidates = items.len(),
        kept = kept.len(),
        top_k = cfg.top_k,
        "ranked headlines"
    );
    RankedDriverSet::new(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, CategoryScore, Headline, MagnitudeBucket};
    use chrono::TimeZone;

    fn up() -> MoveRecord {
        MoveRecord {
            pct_change: 2.5,
            direction: Direction::Up,
            magnitude_bucket: MagnitudeBucket::Moderate,
        }
    }

    fn ctx() -> RankContext {
        RankContext::at_close("AAPL", NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(), 21)
    }

    fn item(text: &str, hour: u32, conf: f64, sentiment: f64) -> Arc<ClassifiedHeadline> {
        let ts = Utc.with_ymd_and_hms(2025, 11, 3, hour, 0, 0).unwrap();
        Arc::new(ClassifiedHeadline::new(
            Headline::new(text, "MockWire", ts, "AAPL"),
            CategoryScore::new(Category::Earnings, conf),
            sentiment,
        ))
    }

    #[test]
    fn recency_halves_per_half_life() {
        let r = Utc.with_ymd_and_hms(2025, 11, 3, 21, 0, 0).unwrap();
        let p = Utc.with_ymd_and_hms(2025, 11, 3, 15, 0, 0).unwrap();
        let w = recency_weight(p, r, Duration::from_secs(6 * 3600));
        assert!((w - 0.5).abs() < 1e-12);
        assert_eq!(recency_weight(p, r, Duration::ZERO), 1.0);
    }

    #[test]
    fn alignment_rewards_agreement_and_penalizes_mismatch() {
        assert_eq!(alignment(Direction::Up, 0.8), 1.0);
        assert_eq!(alignment(Direction::Up, -0.8), 0.0);
        assert_eq!(alignment(Direction::Down, -0.3), 1.0);
        assert_eq!(alignment(Direction::Down, 0.0), 0.5);
        assert_eq!(alignment(Direction::Flat, 0.01), 1.0);
    }

    #[test]
    fn aligned_headline_outranks_opposed_one() {
        let items = vec![
            item("AAPL shares slide on weak outlook", 14, 0.8, -0.7),
            item("AAPL beats estimates on strong iPhone sales", 14, 0.8, 0.7),
        ];
        let out = rank_headlines(
            &items,
            &up(),
            &ctx(),
            &RankingConfig::default(),
            &SourceWeightsConfig::default_seed(),
        );
        assert_eq!(out.len(), 2);
        assert!(out.as_slice()[0].headline.sentiment > 0.0);
    }

    #[test]
    fn flagged_are_excluded_and_k_is_respected() {
        let ts = Utc.with_ymd_and_hms(2025, 11, 3, 12, 0, 0).unwrap();
        let mut items: Vec<_> = (0..8u32)
            .map(|i| item(&format!("headline number {i} about something else {i}"), 10 + i, 0.5, 0.3))
            .collect();
        items.push(Arc::new(ClassifiedHeadline::flagged_blank(Headline::new(
            "   ", "MockWire", ts, "AAPL",
        ))));
        let cfg = RankingConfig {
            similarity_threshold: 1.1,
            ..RankingConfig::default()
        };
        let out = rank_headlines(&items, &up(), &ctx(), &cfg, &SourceWeightsConfig::default_seed());
        assert_eq!(out.len(), DEFAULT_TOP_K);
        assert!(out.iter().all(|d| !d.headline.flagged));
    }

    #[test]
    fn near_duplicates_collapse() {
        let items = vec![
            item("AAPL posts stronger-than-expected results", 14, 0.9, 0.7),
            item("AAPL posts stronger than expected results", 13, 0.9, 0.7),
        ];
        let out = rank_headlines(
            &items,
            &up(),
            &ctx(),
            &RankingConfig::default(),
            &SourceWeightsConfig::default_seed(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out.as_slice()[0].input_index, 0);
    }
}
