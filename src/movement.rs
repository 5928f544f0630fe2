//! # Move Calculator
//! Pure mapping `PriceBar` → `MoveRecord`: signed open-to-close percentage,
//! direction with a flat band, and a coarse magnitude bucket.

use serde::{Deserialize, Serialize};

use crate::error::{ExplainError, ExplainResult};
use crate::types::{Direction, MagnitudeBucket, MoveRecord, PriceBar};

pub const DEFAULT_FLAT_THRESHOLD_PCT: f64 = 0.1;
pub const DEFAULT_SMALL_CUTOFF_PCT: f64 = 1.0;
pub const DEFAULT_LARGE_CUTOFF_PCT: f64 = 3.0;

/// Absolute-value cutoffs (in percent) for the magnitude buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeCutoffs {
    pub small_cutoff: f64,
    pub large_cutoff: f64,
}

impl Default for MagnitudeCutoffs {
    fn default() -> Self {
        Self {
            small_cutoff: DEFAULT_SMALL_CUTOFF_PCT,
            large_cutoff: DEFAULT_LARGE_CUTOFF_PCT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveThresholds {
    /// |pct_change| at or below this is flat.
    pub flat_threshold: f64,
    pub cutoffs: MagnitudeCutoffs,
}

impl Default for MoveThresholds {
    fn default() -> Self {
        Self {
            flat_threshold: DEFAULT_FLAT_THRESHOLD_PCT,
            cutoffs: MagnitudeCutoffs::default(),
        }
    }
}

pub fn compute_move(bar: &PriceBar, th: &MoveThresholds) -> ExplainResult<MoveRecord> {
    validate_price("open", bar.open)?;
    validate_price("close", bar.close)?;

    let pct_change = (bar.close - bar.open) / bar.open * 100.0;
    Ok(MoveRecord {
        pct_change,
        direction: classify_direction(pct_change, th.flat_threshold),
        magnitude_bucket: bucket_for(pct_change, &th.cutoffs),
    })
}

pub fn classify_direction(pct_change: f64, flat_threshold: f64) -> Direction {
    if pct_change > flat_threshold {
        Direction::Up
    } else if pct_change < -flat_threshold {
        Direction::Down
    } else {
        Direction::Flat
    }
}

pub fn bucket_for(pct_change: f64, cutoffs: &MagnitudeCutoffs) -> MagnitudeBucket {
    let abs = pct_change.abs();
    if abs < cutoffs.small_cutoff {
        MagnitudeBucket::Small
    } else if abs <= cutoffs.large_cutoff {
        MagnitudeBucket::Moderate
    } else {
        MagnitudeBucket::Large
    }
}

fn validate_price(field: &str, value: f64) -> ExplainResult<()> {
    if !value.is_finite() {
        return Err(ExplainError::InvalidPriceData(format!(
            "{field} is missing or not finite"
        )));
    }
    if value <= 0.0 {
        return Err(ExplainError::InvalidPriceData(format!(
            "{field} must be positive (got {value})"
        )));
    }
    Ok(())
}
