// src/config/mod.rs
//! Runtime configuration for the explainer.
//!
//! Loaded from TOML (`config/finexplain.toml`, or `$FINEXPLAIN_CONFIG_PATH`).
//! A missing default file means built-in defaults; a missing *explicit* file is
//! an error. `FINEXPLAIN_TOP_K` and `FINEXPLAIN_BACKEND` override the file.
//! Every numeric value is sanitized after loading, so downstream stages can
//! trust their inputs.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::analyze::classifier::{default_vocabulary, DEFAULT_NO_MATCH_CONFIDENCE};
use crate::analyze::FanoutOptions;
use crate::confidence::ConfidenceWeights;
use crate::movement::{MagnitudeCutoffs, MoveThresholds, DEFAULT_FLAT_THRESHOLD_PCT};
use crate::ranking::{
    RankingConfig, RankingWeights, DEFAULT_MARKET_CLOSE_UTC_HOUR, DEFAULT_SIMILARITY_THRESHOLD,
    DEFAULT_TOP_K,
};
use crate::source_weights::DEFAULT_SOURCE_WEIGHTS_PATH;
use crate::types::Category;

pub const DEFAULT_CONFIG_PATH: &str = "config/finexplain.toml";
pub const ENV_CONFIG_PATH: &str = "FINEXPLAIN_CONFIG_PATH";
pub const ENV_TOP_K: &str = "FINEXPLAIN_TOP_K";
pub const ENV_BACKEND: &str = "FINEXPLAIN_BACKEND";
pub const ENV_HF_API_TOKEN: &str = "HF_API_TOKEN";

const MAX_TOP_K: usize = 50;
const MAX_WORKERS: usize = 64;

/// Which classifier/scorer pair to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Keyword classifier + lexicon scorer; no network.
    Rules,
    /// Zero-shot classifier + FinBERT scorer over HTTP.
    Model,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rules" | "rule" | "keyword" | "lexicon" => Ok(Backend::Rules),
            "model" | "models" | "hf" => Ok(Backend::Model),
            other => Err(format!("unknown backend `{other}` (expected rules|model)")),
        }
    }
}

/// Inference endpoint settings for the model backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub endpoint: String,
    pub classifier_model: String,
    pub sentiment_model: String,
    /// `"ENV"` reads `HF_API_TOKEN`.
    pub api_key: String,
    pub timeout_ms: u64,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api-inference.huggingface.co/models".into(),
            classifier_model: "facebook/bart-large-mnli".into(),
            sentiment_model: "ProsusAI/finbert".into(),
            api_key: "ENV".into(),
            timeout_ms: 10_000,
        }
    }
}

impl ModelsConfig {
    /// Resolve `"ENV"` to the token from the environment (empty when unset).
    pub fn resolve_api_key(&mut self) {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = std::env::var(ENV_HF_API_TOKEN).unwrap_or_default();
        }
        self.api_key = self.api_key.trim().to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsProvider {
    Mock,
    Rss,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsConfig {
    pub provider: NewsProvider,
    /// `{ticker}` is replaced with the requested symbol.
    pub rss_url: String,
    pub timeout_ms: u64,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            provider: NewsProvider::Mock,
            rss_url: "https://feeds.finance.yahoo.com/rss/2.0/headline?s={ticker}&region=US&lang=en-US"
                .into(),
            timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceProvider {
    Yahoo,
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricesConfig {
    pub provider: PriceProvider,
    pub yahoo_endpoint: String,
    pub timeout_ms: u64,
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            provider: PriceProvider::Yahoo,
            yahoo_endpoint: "https://query1.finance.yahoo.com/v8/finance/chart".into(),
            timeout_ms: 8_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Candidate categories, by name (`earnings`, `sector`, ...).
    pub category_taxonomy: Vec<String>,
    pub top_k: usize,
    pub decay_half_life_secs: u64,
    pub magnitude_cutoffs: MagnitudeCutoffs,
    pub flat_threshold: f64,
    pub confidence_weights: ConfidenceWeights,
    pub ranking_weights: RankingWeights,
    pub similarity_threshold: f64,
    pub workers: usize,
    pub headline_timeout_ms: u64,
    pub market_close_utc_hour: u32,
    pub backend: Backend,
    /// Wrap the model backend so failures fall back to the rules backend.
    pub fallback_to_rules: bool,
    pub source_weights_path: String,
    pub keyword_no_match_confidence: f64,
    /// Extra keywords per category name, appended to the built-in vocabulary.
    pub keywords: BTreeMap<String, Vec<String>>,
    pub news: NewsConfig,
    pub prices: PricesConfig,
    pub models: ModelsConfig,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            category_taxonomy: Category::ALL
                .iter()
                .map(|c| c.as_str().to_ascii_lowercase())
                .collect(),
            top_k: DEFAULT_TOP_K,
            decay_half_life_secs: 6 * 3600,
            magnitude_cutoffs: MagnitudeCutoffs::default(),
            flat_threshold: DEFAULT_FLAT_THRESHOLD_PCT,
            confidence_weights: ConfidenceWeights::default(),
            ranking_weights: RankingWeights::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            workers: 8,
            headline_timeout_ms: 5_000,
            market_close_utc_hour: DEFAULT_MARKET_CLOSE_UTC_HOUR,
            backend: Backend::Rules,
            fallback_to_rules: true,
            source_weights_path: DEFAULT_SOURCE_WEIGHTS_PATH.into(),
            keyword_no_match_confidence: DEFAULT_NO_MATCH_CONFIDENCE,
            keywords: BTreeMap::new(),
            news: NewsConfig::default(),
            prices: PricesConfig::default(),
            models: ModelsConfig::default(),
        }
    }
}

impl ExplainConfig {
    /// Load using `$FINEXPLAIN_CONFIG_PATH` or the default path, then apply env overrides.
    pub fn from_toml() -> Result<Self> {
        let explicit = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
        let mut cfg = match explicit {
            Some(path) => Self::load_from_file(&path)?,
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load_from_file(&path)?
                } else {
                    info!(target: "config", "no config file; using defaults");
                    Self::default().sanitized()?
                }
            }
        };
        cfg.apply_env_overrides()?;
        cfg.models.resolve_api_key();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing config at {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: ExplainConfig = toml::from_str(s)?;
        cfg.sanitized()
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(ENV_TOP_K) {
            let k: usize = raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("{ENV_TOP_K} must be a positive integer, got `{raw}`"))?;
            self.top_k = k.clamp(1, MAX_TOP_K);
        }
        if let Ok(raw) = std::env::var(ENV_BACKEND) {
            self.backend = raw.parse().map_err(|e: String| anyhow!(e))?;
        }
        Ok(())
    }

    /// Clamp and repair values; unknown category names are an error.
    pub fn sanitized(mut self) -> Result<Self> {
        self.categories()?;

        self.top_k = self.top_k.clamp(1, MAX_TOP_K);
        self.workers = self.workers.clamp(1, MAX_WORKERS);
        self.headline_timeout_ms = self.headline_timeout_ms.max(1);
        self.market_close_utc_hour = self.market_close_utc_hour.min(23);

        if !self.flat_threshold.is_finite() || self.flat_threshold < 0.0 {
            warn!(target: "config", value = self.flat_threshold, "bad flat_threshold; using default");
            self.flat_threshold = DEFAULT_FLAT_THRESHOLD_PCT;
        }

        let mc = &mut self.magnitude_cutoffs;
        if !mc.small_cutoff.is_finite() || !mc.large_cutoff.is_finite() {
            *mc = MagnitudeCutoffs::default();
        }
        mc.small_cutoff = mc.small_cutoff.abs();
        mc.large_cutoff = mc.large_cutoff.abs();
        if mc.small_cutoff > mc.large_cutoff {
            std::mem::swap(&mut mc.small_cutoff, &mut mc.large_cutoff);
        }

        if !self.similarity_threshold.is_finite() || self.similarity_threshold < 0.0 {
            self.similarity_threshold = DEFAULT_SIMILARITY_THRESHOLD;
        }
        if !self.keyword_no_match_confidence.is_finite() {
            self.keyword_no_match_confidence = DEFAULT_NO_MATCH_CONFIDENCE;
        }
        self.keyword_no_match_confidence = self.keyword_no_match_confidence.clamp(0.0, 1.0);

        self.confidence_weights = self.confidence_weights.sanitized();
        self.ranking_weights = self.ranking_weights.sanitized();
        self.models.timeout_ms = self.models.timeout_ms.max(1);
        self.news.timeout_ms = self.news.timeout_ms.max(1);
        self.prices.timeout_ms = self.prices.timeout_ms.max(1);
        Ok(self)
    }

    /// Parsed taxonomy; empty means all categories. Duplicates are dropped.
    pub fn categories(&self) -> Result<Vec<Category>> {
        if self.category_taxonomy.is_empty() {
            return Ok(Category::ALL.to_vec());
        }
        let mut out = Vec::with_capacity(self.category_taxonomy.len());
        for name in &self.category_taxonomy {
            let c: Category = name.parse().map_err(|e: String| anyhow!(e))?;
            if !out.contains(&c) {
                out.push(c);
            }
        }
        Ok(out)
    }

    pub fn move_thresholds(&self) -> MoveThresholds {
        MoveThresholds {
            flat_threshold: self.flat_threshold,
            cutoffs: self.magnitude_cutoffs,
        }
    }

    pub fn ranking_config(&self) -> RankingConfig {
        RankingConfig {
            top_k: self.top_k,
            decay_half_life: Duration::from_secs(self.decay_half_life_secs),
            weights: self.ranking_weights,
            similarity_threshold: self.similarity_threshold,
        }
    }

    pub fn fanout_options(&self) -> FanoutOptions {
        FanoutOptions {
            workers: self.workers,
            headline_timeout: Duration::from_millis(self.headline_timeout_ms),
            categories: self.categories().unwrap_or_else(|_| Category::ALL.to_vec()),
        }
    }

    /// Built-in vocabulary extended with `[keywords]`.
    pub fn keyword_vocabulary(&self) -> Result<BTreeMap<Category, Vec<String>>> {
        let mut vocab = default_vocabulary();
        for (name, words) in &self.keywords {
            let c: Category = name.parse().map_err(|e: String| anyhow!(e))?;
            vocab.entry(c).or_default().extend(words.iter().cloned());
        }
        Ok(vocab)
    }
}
