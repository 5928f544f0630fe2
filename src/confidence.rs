//! Confidence estimation.
//!
//! `agreement` = share of drivers whose sentiment sign matches the move direction,
//! `coverage` = min(1, drivers / K). The weighted form is geometric:
//! `agreement^w_agreement * coverage^w_coverage`, which with unit weights is the
//! plain product. No drivers means no evidence, so confidence is exactly 0.

use serde::{Deserialize, Serialize};

use crate::types::{clamp01, Direction, MoveRecord, RankedDriverSet};

/// Sentiment magnitude at or below this counts as neutral.
pub const NEUTRAL_SENTIMENT_BAND: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    #[serde(default = "one")]
    pub agreement: f64,
    #[serde(default = "one")]
    pub coverage: f64,
}

fn one() -> f64 {
    1.0
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            agreement: 1.0,
            coverage: 1.0,
        }
    }
}

impl ConfidenceWeights {
    /// Exponents must be finite and strictly positive; anything else falls back
    /// to 1.0. A zero exponent would make its factor 1 regardless of the evidence.
    pub fn sanitized(self) -> Self {
        fn fix(w: f64) -> f64 {
            if w.is_finite() && w > 0.0 {
                w
            } else {
                1.0
            }
        }
        Self {
            agreement: fix(self.agreement),
            coverage: fix(self.coverage),
        }
    }
}

/// Does a sentiment value point the same way as the move?
/// Flat moves agree with neutral tone.
pub fn sentiment_agrees(direction: Direction, sentiment: f64) -> bool {
    match direction {
        Direction::Up => sentiment > NEUTRAL_SENTIMENT_BAND,
        Direction::Down => sentiment < -NEUTRAL_SENTIMENT_BAND,
        Direction::Flat => sentiment.abs() <= NEUTRAL_SENTIMENT_BAND,
    }
}

pub fn agreement(movement: &MoveRecord, drivers: &RankedDriverSet) -> f64 {
    if drivers.is_empty() {
        return 0.0;
    }
    let agreeing = drivers
        .iter()
        .filter(|d| sentiment_agrees(movement.direction, d.headline.sentiment))
        .count();
    agreeing as f64 / drivers.len() as f64
}

pub fn coverage(drivers: &RankedDriverSet, top_k: usize) -> f64 {
    if top_k == 0 {
        return 0.0;
    }
    (drivers.len() as f64 / top_k as f64).min(1.0)
}

pub fn estimate_confidence(
    movement: &MoveRecord,
    drivers: &RankedDriverSet,
    top_k: usize,
    weights: &ConfidenceWeights,
) -> f64 {
    if drivers.is_empty() {
        return 0.0;
    }
    let w = weights.sanitized();
    let a = agreement(movement, drivers);
    let c = coverage(drivers, top_k);
    clamp01(a.powf(w.agreement) * c.powf(w.coverage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Category, CategoryScore, ClassifiedHeadline, Driver, Headline, MagnitudeBucket,
    };
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn up() -> MoveRecord {
        MoveRecord {
            pct_change: 2.0,
            direction: Direction::Up,
            magnitude_bucket: MagnitudeBucket::Moderate,
        }
    }

    fn drivers(sentiments: &[f64]) -> RankedDriverSet {
        let ts = Utc.with_ymd_and_hms(2025, 11, 3, 14, 0, 0).unwrap();
        RankedDriverSet::new(
            sentiments
                .iter()
                .enumerate()
                .map(|(i, s)| {
                    let ch = ClassifiedHeadline::new(
                        Headline::new(format!("h{i}"), "Reuters", ts, "AAPL"),
                        CategoryScore::new(Category::Earnings, 0.9),
                        *s,
                    );
                    Driver::new(Arc::new(ch), 0.5, i)
                })
                .collect(),
        )
    }

    #[test]
    fn empty_is_zero() {
        let c = estimate_confidence(&up(), &RankedDriverSet::empty(), 5, &Default::default());
        assert_eq!(c, 0.0);
    }

    #[test]
    fn full_agreement_and_coverage_is_one() {
        let d = drivers(&[0.4, 0.7, 0.2, 0.9, 0.3]);
        let c = estimate_confidence(&up(), &d, 5, &Default::default());
        assert!((c - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mixed_agreement_below_one() {
        let d = drivers(&[0.4, -0.7, 0.2, 0.9, 0.3]);
        let c = estimate_confidence(&up(), &d, 5, &Default::default());
        assert!((c - 0.8).abs() < 1e-12);
    }

    #[test]
    fn weighted_form_softens_coverage() {
        let d = drivers(&[0.8]);
        let w = ConfidenceWeights {
            agreement: 1.0,
            coverage: 0.5,
        };
        let c = estimate_confidence(&up(), &d, 4, &w);
        assert!((c - 0.5).abs() < 1e-12);
    }

    #[test]
    fn flat_agrees_with_neutral() {
        assert!(sentiment_agrees(Direction::Flat, 0.0));
        assert!(!sentiment_agrees(Direction::Flat, 0.6));
        assert!(!sentiment_agrees(Direction::Up, 0.0));
    }
}
