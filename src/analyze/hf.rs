//! Model adapter: HTTP inference client (Hugging Face style endpoints) with an
//! in-memory response cache.
//!
//! Two task shapes are supported:
//! - zero-shot classification (`{"inputs", "parameters": {"candidate_labels"}}`)
//! - text classification (`{"inputs"}` → label/score pairs)
//!
//! Failures come back as plain `String` reasons; the classifier/scorer wrappers map
//! them onto the typed per-headline errors.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyze::anon_hash;
use crate::config::ModelsConfig;

/// Max characters sent to a model.
pub const MAX_INPUT_CHARS: usize = 512;
const CACHE_CAP: usize = 4096;

/// One `(label, score)` pair as returned by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    cache: Mutex<HashMap<String, Vec<LabelScore>>>,
}

impl InferenceClient {
    pub fn new(cfg: &ModelsConfig) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .user_agent("finexplain/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(cfg.timeout_ms.max(1)))
            .build()
            .map_err(|e| format!("http client: {e}"))?;
        Ok(Self {
            http,
            base_url: cfg.endpoint.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn has_credentials(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Zero-shot scores for `labels`, best first.
    pub async fn zero_shot(
        &self,
        model: &str,
        text: &str,
        labels: &[&str],
    ) -> Result<Vec<LabelScore>, String> {
        #[derive(Serialize)]
        struct Params<'a> {
            candidate_labels: &'a [&'a str],
            multi_label: bool,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            inputs: &'a str,
            parameters: Params<'a>,
        }

        let input = sanitize_input(text);
        let key = cache_key(model, &input, labels);
        if let Some(hit) = self.cache_get(&key) {
            return Ok(hit);
        }

        let req = Req {
            inputs: &input,
            parameters: Params {
                candidate_labels: labels,
                multi_label: false,
            },
        };
        let body: ZeroShotResp = self.post(model, &req).await?;
        let mut out = body.into_pairs()?;
        sort_desc(&mut out);
        self.cache_put(key, out.clone());
        Ok(out)
    }

    /// Label probabilities from a text-classification model.
    pub async fn text_classification(
        &self,
        model: &str,
        text: &str,
    ) -> Result<Vec<LabelScore>, String> {
        #[derive(Serialize)]
        struct Req<'a> {
            inputs: &'a str,
        }

        let input = sanitize_input(text);
        let key = cache_key(model, &input, &[]);
        if let Some(hit) = self.cache_get(&key) {
            return Ok(hit);
        }

        let body: TextClsResp = self.post(model, &Req { inputs: &input }).await?;
        let mut out = body.into_pairs();
        if out.is_empty() {
            return Err("empty model response".into());
        }
        sort_desc(&mut out);
        self.cache_put(key, out.clone());
        Ok(out)
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        model: &str,
        body: &B,
    ) -> Result<R, String> {
        if self.api_key.is_empty() {
            return Err("missing inference api key".into());
        }
        let url = format!("{}/{}", self.base_url, model);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request to {model} failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("{model} returned HTTP {status}"));
        }
        resp.json::<R>()
            .await
            .map_err(|e| format!("{model} response decode: {e}"))
    }

    fn cache_get(&self, key: &str) -> Option<Vec<LabelScore>> {
        let guard = self.cache.lock().ok()?;
        let hit = guard.get(key).cloned();
        if hit.is_some() {
            debug!(target: "models", key, "inference cache hit");
        }
        hit
    }

    fn cache_put(&self, key: String, value: Vec<LabelScore>) {
        if let Ok(mut guard) = self.cache.lock() {
            if guard.len() >= CACHE_CAP {
                guard.clear();
            }
            guard.insert(key, value);
        }
    }
}

/// Older endpoints answer `{labels, scores}`; newer ones a list of pairs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResp {
    Columns { labels: Vec<String>, scores: Vec<f64> },
    Pairs(Vec<LabelScore>),
}

impl ZeroShotResp {
    fn into_pairs(self) -> Result<Vec<LabelScore>, String> {
        match self {
            ZeroShotResp::Columns { labels, scores } => {
                if labels.len() != scores.len() || labels.is_empty() {
                    return Err("malformed zero-shot response".into());
                }
                Ok(labels
                    .into_iter()
                    .zip(scores)
                    .map(|(label, score)| LabelScore { label, score })
                    .collect())
            }
            ZeroShotResp::Pairs(p) if !p.is_empty() => Ok(p),
            ZeroShotResp::Pairs(_) => Err("empty zero-shot response".into()),
        }
    }
}

/// `[[{label, score}, ...]]` or `[{label, score}, ...]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextClsResp {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl TextClsResp {
    fn into_pairs(self) -> Vec<LabelScore> {
        match self {
            TextClsResp::Nested(v) => v.into_iter().next().unwrap_or_default(),
            TextClsResp::Flat(v) => v,
        }
    }
}

fn sort_desc(v: &mut [LabelScore]) {
    v.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn cache_key(model: &str, input: &str, labels: &[&str]) -> String {
    anon_hash(&format!("{model}\u{1f}{input}\u{1f}{}", labels.join("\u{1e}")))
}

/// Single line, collapsed whitespace, capped length.
pub fn sanitize_input(input: &str) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_INPUT_CHARS).collect()
}
