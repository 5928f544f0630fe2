//! Headline sentiment in [-1, 1].
//!
//! `LexiconScorer` sums integer valences from the embedded finance lexicon,
//! flipping a word's sign when a negator sits within the previous three tokens,
//! then squashes the sum with `s / sqrt(s² + 15)`. `FinbertScorer` asks a
//! sentiment model and reports `P(positive) − P(negative)`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::analyze::hf::InferenceClient;
use crate::analyze::{anon_hash, tokenize};
use crate::error::{ExplainError, ExplainResult};
use crate::types::clamp_signed;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).unwrap_or_else(|e| {
        warn!(target: "models", error = %e, "embedded sentiment lexicon unreadable");
        HashMap::new()
    })
});

/// Normalization constant for the raw lexicon sum.
pub const LEXICON_ALPHA: f64 = 15.0;

/// Negation reaches back this many tokens.
const NEGATION_WINDOW: usize = 3;

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    async fn score(&self, text: &str) -> ExplainResult<f64>;

    fn name(&self) -> &'static str;
}

/* ----------------------------
Lexicon scorer
---------------------------- */

#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Raw valence sum and token count.
    pub fn raw_score(&self, text: &str) -> (i32, usize) {
        // Collected so negation can look backwards.
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated =
                (1..=NEGATION_WINDOW).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }

    pub fn score_text(&self, text: &str) -> f64 {
        let (s, _) = self.raw_score(text);
        normalize(s)
    }
}

pub fn normalize(sum: i32) -> f64 {
    let s = sum as f64;
    clamp_signed(s / (s * s + LEXICON_ALPHA).sqrt())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "without"
            | "fails"
            | "failed"
    )
}

#[async_trait]
impl SentimentScorer for LexiconScorer {
    async fn score(&self, text: &str) -> ExplainResult<f64> {
        Ok(self.score_text(text))
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/* ----------------------------
Model scorer
---------------------------- */

pub struct FinbertScorer {
    client: Arc<InferenceClient>,
    model: String,
}

impl FinbertScorer {
    pub fn new(client: Arc<InferenceClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SentimentScorer for FinbertScorer {
    async fn score(&self, text: &str) -> ExplainResult<f64> {
        if text.trim().is_empty() {
            return Ok(0.0);
        }
        let labels = self
            .client
            .text_classification(&self.model, text)
            .await
            .map_err(ExplainError::ScoringUnavailable)?;

        let prob = |name: &str| {
            labels
                .iter()
                .find(|l| l.label.eq_ignore_ascii_case(name))
                .map(|l| l.score)
        };
        match (prob("positive"), prob("negative")) {
            (None, None) => Err(ExplainError::ScoringUnavailable(format!(
                "{} returned no polarity labels",
                self.model
            ))),
            (p, n) => Ok(clamp_signed(p.unwrap_or(0.0) - n.unwrap_or(0.0))),
        }
    }

    fn name(&self) -> &'static str {
        "finbert"
    }
}

/* ----------------------------
Fallback wrapper
---------------------------- */

pub struct FallbackScorer {
    primary: Arc<dyn SentimentScorer>,
    fallback: Arc<dyn SentimentScorer>,
}

impl FallbackScorer {
    pub fn new(primary: Arc<dyn SentimentScorer>, fallback: Arc<dyn SentimentScorer>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl SentimentScorer for FallbackScorer {
    async fn score(&self, text: &str) -> ExplainResult<f64> {
        match self.primary.score(text).await {
            Err(ExplainError::ScoringUnavailable(reason)) => {
                warn!(
                    target: "models",
                    id = %anon_hash(text),
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    %reason,
                    "scorer unavailable; using fallback"
                );
                self.fallback.score(text).await
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexicon_polarity() {
        let s = LexiconScorer::new();
        assert!(s.score_text("AAPL posts stronger-than-expected results") > 0.0);
        assert!(s.score_text("AAPL shares plunge after guidance cut") < 0.0);
        assert_eq!(s.score_text("AAPL to hold annual meeting"), 0.0);
    }

    #[test]
    fn normalization_matches_formula() {
        let s = LexiconScorer::new();
        // rally (2) + lifting (1)
        let v = s.score_text("Sector peers rally, lifting AAPL");
        assert!((v - 3.0 / 24f64.sqrt()).abs() < 1e-12);
        assert!(normalize(1000) < 1.0);
        assert!(normalize(-1000) > -1.0);
    }

    #[test]
    fn negation_within_three_tokens() {
        let s = LexiconScorer::new();
        let (plain, _) = s.raw_score("results beat estimates");
        let (neg, _) = s.raw_score("results did not quite beat estimates");
        let (far, _) = s.raw_score("not that it matters much, results beat");
        assert_eq!(plain, 2);
        assert_eq!(neg, -2);
        assert_eq!(far, 2);
    }

    struct Offline;

    #[async_trait]
    impl SentimentScorer for Offline {
        async fn score(&self, _: &str) -> ExplainResult<f64> {
            Err(ExplainError::ScoringUnavailable("offline".into()))
        }
        fn name(&self) -> &'static str {
            "offline"
        }
    }

    #[tokio::test]
    async fn fallback_uses_lexicon_when_model_is_offline() {
        let s = FallbackScorer::new(Arc::new(Offline), Arc::new(LexiconScorer::new()));
        let v = s.score("Shares surge on record profit").await.unwrap();
        assert!(v > 0.5);
    }
}
