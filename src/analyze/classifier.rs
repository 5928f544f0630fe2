//! Headline classification over the fixed category taxonomy.
//!
//! Variants share the `HeadlineClassifier` capability:
//! - `ZeroShotClassifier`: model-backed zero-shot labels via `InferenceClient`.
//! - `KeywordClassifier`: regex vocabularies per category, fully offline.
//! - `FallbackClassifier`: primary first, fallback on `ClassificationUnavailable`.
//!
//! Blank text always yields `Other` with confidence 0.

use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::analyze::anon_hash;
use crate::analyze::hf::InferenceClient;
use crate::error::{ExplainError, ExplainResult};
use crate::types::{Category, CategoryScore, Headline};

#[async_trait]
pub trait HeadlineClassifier: Send + Sync {
    /// Pick the best of `candidates` for this headline.
    async fn classify(
        &self,
        headline: &Headline,
        candidates: &[Category],
    ) -> ExplainResult<CategoryScore>;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

fn blank_score() -> CategoryScore {
    CategoryScore::new(Category::Other, 0.0)
}

fn candidates_or_all(candidates: &[Category]) -> &[Category] {
    if candidates.is_empty() {
        &Category::ALL
    } else {
        candidates
    }
}

/* ----------------------------
Keyword (rule-based) classifier
---------------------------- */

pub const DEFAULT_NO_MATCH_CONFIDENCE: f64 = 0.3;

/// Built-in vocabularies. Each word also matches with an `s`/`es`/`d`/`ed` suffix.
pub fn default_vocabulary() -> BTreeMap<Category, Vec<String>> {
    let raw: [(Category, &[&str]); 5] = [
        (
            Category::Earnings,
            &[
                "earnings", "result", "quarter", "quarterly", "revenue", "profit", "eps",
                "guidance", "beat", "miss", "forecast", "outlook", "sale", "margin",
                "estimate", "fiscal", "loss",
            ],
        ),
        (
            Category::Analyst,
            &[
                "analyst", "upgrade", "downgrade", "price target", "rating", "overweight",
                "underweight", "outperform", "underperform", "initiate", "coverage",
                "reiterate", "buy rating", "sell rating", "neutral rating",
            ],
        ),
        (
            Category::Sector,
            &[
                "sector", "industry", "peer", "rival", "competitor", "chipmaker",
                "semiconductor", "automaker", "retailer", "bank stock", "supply chain",
                "tech stock", "energy stock",
            ],
        ),
        (
            Category::Macro,
            &[
                "fed", "federal reserve", "interest rate", "inflation", "cpi", "jobs report",
                "payroll", "gdp", "recession", "tariff", "treasury yield", "economy",
                "broader market", "wall street", "powell", "unemployment",
            ],
        ),
        (
            Category::Other,
            &[
                "product", "launch", "recall", "lawsuit", "ceo", "acquisition", "merger",
                "deal", "partnership", "patent", "layoff", "buyback",
            ],
        ),
    ];
    raw.into_iter()
        .map(|(c, words)| (c, words.iter().map(|w| w.to_string()).collect()))
        .collect()
}

pub struct KeywordClassifier {
    patterns: Vec<(Category, Regex)>,
    no_match_confidence: f64,
}

impl KeywordClassifier {
    pub fn new(
        vocabulary: &BTreeMap<Category, Vec<String>>,
        no_match_confidence: f64,
    ) -> ExplainResult<Self> {
        let mut patterns = Vec::with_capacity(vocabulary.len());
        for (cat, words) in vocabulary {
            let alts: Vec<String> = words
                .iter()
                .map(|w| w.trim())
                .filter(|w| !w.is_empty())
                .map(|w| regex::escape(&w.to_lowercase()).replace(' ', r"\s+"))
                .collect();
            if alts.is_empty() {
                continue;
            }
            let pattern = format!(r"(?i)\b(?:{})(?:s|es|d|ed)?\b", alts.join("|"));
            let re = Regex::new(&pattern).map_err(|e| {
                ExplainError::InvalidConfig(format!("vocabulary for {cat}: {e}"))
            })?;
            patterns.push((*cat, re));
        }
        Ok(Self {
            patterns,
            no_match_confidence: no_match_confidence.clamp(0.0, 1.0),
        })
    }

    pub fn with_defaults() -> ExplainResult<Self> {
        Self::new(&default_vocabulary(), DEFAULT_NO_MATCH_CONFIDENCE)
    }

    /// Keyword hit count per candidate category, in candidate order.
    pub fn hits(&self, text: &str, candidates: &[Category]) -> Vec<(Category, usize)> {
        candidates_or_all(candidates)
            .iter()
            .map(|c| {
                let n = self
                    .patterns
                    .iter()
                    .filter(|(pc, _)| pc == c)
                    .map(|(_, re)| re.find_iter(text).count())
                    .sum();
                (*c, n)
            })
            .collect()
    }

    /// Pure scoring: winning share of hits, scaled up with the number of hits.
    pub fn score_text(&self, text: &str, candidates: &[Category]) -> CategoryScore {
        if text.trim().is_empty() {
            return blank_score();
        }
        let hits = self.hits(text, candidates);
        let total: usize = hits.iter().map(|(_, n)| n).sum();
        if total == 0 {
            return CategoryScore::new(Category::Other, self.no_match_confidence);
        }

        // First maximum wins; candidate order breaks ties.
        let mut best = hits[0];
        for h in &hits[1..] {
            if h.1 > best.1 {
                best = *h;
            }
        }
        let share = best.1 as f64 / total as f64;
        let strength = 1.0 - 0.5f64.powi(best.1 as i32 + 1);
        CategoryScore::new(best.0, share * strength)
    }
}

#[async_trait]
impl HeadlineClassifier for KeywordClassifier {
    async fn classify(
        &self,
        headline: &Headline,
        candidates: &[Category],
    ) -> ExplainResult<CategoryScore> {
        Ok(self.score_text(&headline.text, candidates))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

/* ----------------------------
Zero-shot (model-backed) classifier
---------------------------- */

pub struct ZeroShotClassifier {
    client: Arc<InferenceClient>,
    model: String,
}

impl ZeroShotClassifier {
    pub fn new(client: Arc<InferenceClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl HeadlineClassifier for ZeroShotClassifier {
    async fn classify(
        &self,
        headline: &Headline,
        candidates: &[Category],
    ) -> ExplainResult<CategoryScore> {
        if headline.is_blank() {
            return Ok(blank_score());
        }
        let cands = candidates_or_all(candidates);
        let labels: Vec<&str> = cands.iter().map(|c| c.zero_shot_label()).collect();

        let scores = self
            .client
            .zero_shot(&self.model, &headline.text, &labels)
            .await
            .map_err(ExplainError::ClassificationUnavailable)?;

        scores
            .iter()
            .find_map(|ls| {
                ls.label
                    .parse::<Category>()
                    .ok()
                    .filter(|c| cands.contains(c))
                    .map(|c| CategoryScore::new(c, ls.score))
            })
            .ok_or_else(|| {
                ExplainError::ClassificationUnavailable(format!(
                    "{} returned no known label",
                    self.model
                ))
            })
    }

    fn name(&self) -> &'static str {
        "zero-shot"
    }
}

/* ----------------------------
Fallback wrapper
---------------------------- */

pub struct FallbackClassifier {
    primary: Arc<dyn HeadlineClassifier>,
    fallback: Arc<dyn HeadlineClassifier>,
}

impl FallbackClassifier {
    pub fn new(primary: Arc<dyn HeadlineClassifier>, fallback: Arc<dyn HeadlineClassifier>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl HeadlineClassifier for FallbackClassifier {
    async fn classify(
        &self,
        headline: &Headline,
        candidates: &[Category],
    ) -> ExplainResult<CategoryScore> {
        match self.primary.classify(headline, candidates).await {
            Err(ExplainError::ClassificationUnavailable(reason)) => {
                warn!(
                    target: "models",
                    id = %anon_hash(&headline.text),
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    %reason,
                    "classifier unavailable; using fallback"
                );
                self.fallback.classify(headline, candidates).await
            }
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "fallback"
    }
}
