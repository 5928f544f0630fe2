//! Error taxonomy for the explanation pipeline.
//!
//! Request-fatal: `InvalidPriceData`, `PriceNotFound`, `UpstreamFetchFailure`.
//! Per-headline (recovered by dropping the headline): `ClassificationUnavailable`,
//! `ScoringUnavailable`. An empty news set is not an error at all.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExplainError {
    #[error("invalid price data: {0}")]
    InvalidPriceData(String),

    #[error("no price bar for {ticker} on {date}")]
    PriceNotFound { ticker: String, date: String },

    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(String),

    #[error("sentiment scoring unavailable: {0}")]
    ScoringUnavailable(String),

    #[error("upstream fetch failed ({source_name}): {reason}")]
    UpstreamFetchFailure { source_name: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ExplainError {
    pub fn upstream(source_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamFetchFailure {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable snake_case code used in API error bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPriceData(_) => "invalid_price_data",
            Self::PriceNotFound { .. } => "price_not_found",
            Self::ClassificationUnavailable(_) => "classification_unavailable",
            Self::ScoringUnavailable(_) => "scoring_unavailable",
            Self::UpstreamFetchFailure { .. } => "upstream_fetch_failure",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }

    /// Per-headline failures are recovered locally by excluding the headline.
    pub fn is_per_headline(&self) -> bool {
        matches!(
            self,
            Self::ClassificationUnavailable(_) | Self::ScoringUnavailable(_)
        )
    }
}

pub type ExplainResult<T> = Result<T, ExplainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_recoverability() {
        let e = ExplainError::upstream("yahoo", "timeout");
        assert_eq!(e.code(), "upstream_fetch_failure");
        assert!(!e.is_per_headline());
        assert!(e.to_string().contains("yahoo"));

        assert!(ExplainError::ScoringUnavailable("offline".into()).is_per_headline());
        assert!(ExplainError::ClassificationUnavailable("offline".into()).is_per_headline());
    }
}
