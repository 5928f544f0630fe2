// src/models.rs
//! Classifier/scorer selection, done once per process.
//!
//! `Backends::from_config` is the only place that maps `backend = "rules" | "model"`
//! onto concrete implementations. The result is read-only and shared behind
//! `Arc<dyn ...>`; `init_global` parks it in a `OnceCell` for the binaries.

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{info, warn};

use crate::analyze::hf::InferenceClient;
use crate::analyze::{FallbackClassifier, HeadlineClassifier, KeywordClassifier, ZeroShotClassifier};
use crate::config::{Backend, ExplainConfig};
use crate::error::ExplainResult;
use crate::sentiment::{FallbackScorer, FinbertScorer, LexiconScorer, SentimentScorer};

#[derive(Clone)]
pub struct Backends {
    pub classifier: Arc<dyn HeadlineClassifier>,
    pub scorer: Arc<dyn SentimentScorer>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("classifier", &self.classifier.name())
            .field("scorer", &self.scorer.name())
            .finish()
    }
}

impl Backends {
    pub fn new(
        classifier: Arc<dyn HeadlineClassifier>,
        scorer: Arc<dyn SentimentScorer>,
    ) -> Self {
        Self { classifier, scorer }
    }

    /// Offline pair with the built-in vocabulary.
    pub fn rules() -> ExplainResult<Self> {
        Ok(Self::new(
            Arc::new(KeywordClassifier::with_defaults()?),
            Arc::new(LexiconScorer::new()),
        ))
    }

    pub fn from_config(cfg: &ExplainConfig) -> Result<Self> {
        let keyword = KeywordClassifier::new(
            &cfg.keyword_vocabulary()?,
            cfg.keyword_no_match_confidence,
        )
        .map_err(|e| anyhow!(e))?;
        let rules = Self::new(Arc::new(keyword), Arc::new(LexiconScorer::new()));

        let out = match cfg.backend {
            Backend::Rules => rules,
            Backend::Model => {
                let client = Arc::new(InferenceClient::new(&cfg.models).map_err(|e| anyhow!(e))?);
                if !client.has_credentials() {
                    warn!(
                        target: "models",
                        "model backend selected but no inference api key is set"
                    );
                }
                let classifier: Arc<dyn HeadlineClassifier> = Arc::new(ZeroShotClassifier::new(
                    Arc::clone(&client),
                    cfg.models.classifier_model.clone(),
                ));
                let scorer: Arc<dyn SentimentScorer> = Arc::new(FinbertScorer::new(
                    client,
                    cfg.models.sentiment_model.clone(),
                ));
                if cfg.fallback_to_rules {
                    Self::new(
                        Arc::new(FallbackClassifier::new(classifier, rules.classifier)),
                        Arc::new(FallbackScorer::new(scorer, rules.scorer)),
                    )
                } else {
                    Self::new(classifier, scorer)
                }
            }
        };

        info!(
            target: "models",
            backend = ?cfg.backend,
            classifier = out.classifier.name(),
            scorer = out.scorer.name(),
            key_len = cfg.models.api_key.len(),
            "backends ready"
        );
        Ok(out)
    }
}

static GLOBAL: OnceCell<Backends> = OnceCell::new();

/// Build once; later calls return the first instance.
pub fn init_global(cfg: &ExplainConfig) -> Result<&'static Backends> {
    if let Some(b) = GLOBAL.get() {
        return Ok(b);
    }
    let built = Backends::from_config(cfg)?;
    Ok(GLOBAL.get_or_init(|| built))
}

pub fn global() -> Option<&'static Backends> {
    GLOBAL.get()
}
