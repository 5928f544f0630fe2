//! # Source Weights
//!
//! Configurable mapping from news outlets (e.g. "Reuters", "Bloomberg",
//! "MockWire") to an authority weight in `[0.0, 1.0]`, used as one of the
//! ranking signals.
//!
//! - Loads from JSON config (weights + aliases).
//! - Case-insensitive lookup with normalization of punctuation, dashes, etc.
//! - Fallback order: aliases → exact match → longest substring match → default.
//! - `default_seed()` carries the major wire services and financial outlets.

use serde::Deserialize;
use std::{collections::BTreeMap, fs, path::Path};
use tracing::warn;

pub const DEFAULT_SOURCE_WEIGHTS_PATH: &str = "config/source_weights.json";

#[derive(Debug, Clone, Deserialize)]
pub struct SourceWeightsConfig {
    /// Weight when no entry matches.
    #[serde(default = "default_default_weight")]
    pub default_weight: f64,
    /// Canonical outlet name → weight.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    /// Alternative spelling → canonical name.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

fn default_default_weight() -> f64 {
    0.60
}

impl Default for SourceWeightsConfig {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceWeightsConfig {
    /// Load from a JSON file; falls back to `default_seed()` on any error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => match serde_json::from_str::<SourceWeightsConfig>(&s) {
                Ok(cfg) => cfg.normalized(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "bad source weights; using seed");
                    Self::default_seed()
                }
            },
            Err(_) => Self::default_seed(),
        }
    }

    /// Keys are stored normalized so lookups can compare directly.
    fn normalized(self) -> Self {
        Self {
            default_weight: self.default_weight,
            weights: self
                .weights
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
            aliases: self
                .aliases
                .into_iter()
                .map(|(k, v)| (normalize(&k), normalize(&v)))
                .collect(),
        }
    }

    pub fn weight_for(&self, source: &str) -> f64 {
        let s = normalize(source);

        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&w) = self.weights.get(canon) {
                return clamp01(w);
            }
        }

        if let Some(&w) = self.weights.get(&s) {
            return clamp01(w);
        }

        // Longest key wins so "financial times" beats "times".
        if let Some((_, &w)) = self
            .weights
            .iter()
            .filter(|(k, _)| s.contains(k.as_str()))
            .max_by_key(|(k, _)| k.len())
        {
            return clamp01(w);
        }

        clamp01(self.default_weight)
    }

    pub(crate) fn default_seed() -> Self {
        let mut weights = BTreeMap::new();
        let mut aliases = BTreeMap::new();

        for (k, v) in [
            ("reuters", 0.95),
            ("bloomberg", 0.95),
            ("wall street journal", 0.92),
            ("financial times", 0.92),
            ("cnbc", 0.88),
            ("associated press", 0.85),
            ("barron's", 0.82),
            ("marketwatch", 0.78),
            ("dow jones newswires", 0.90),
            ("business wire", 0.75),
            ("pr newswire", 0.72),
            ("globenewswire", 0.70),
            ("yahoo finance", 0.70),
            ("seeking alpha", 0.55),
            ("motley fool", 0.50),
            ("benzinga", 0.60),
        ] {
            weights.insert(normalize(k), v);
        }

        for (a, c) in [
            ("wsj", "wall street journal"),
            ("the wall street journal", "wall street journal"),
            ("wsj com", "wall street journal"),
            ("ft", "financial times"),
            ("ft com", "financial times"),
            ("ap", "associated press"),
            ("bbg", "bloomberg"),
            ("bloomberg news", "bloomberg"),
            ("reuters com", "reuters"),
            ("thomson reuters", "reuters"),
            ("cnbc com", "cnbc"),
            ("barrons", "barron's"),
        ] {
            aliases.insert(normalize(a), normalize(c));
        }

        Self {
            default_weight: default_default_weight(),
            weights,
            aliases,
        }
    }
}

/// Lowercase, turn punctuation/dashes into spaces, collapse whitespace.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_ascii_lowercase();

    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '‚', '’'], " ");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
