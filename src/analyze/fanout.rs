//! Concurrent classify + score over a request's headlines.
//!
//! Work runs on a bounded pool (`Semaphore` permits, tasks in a `JoinSet`), each
//! headline under its own timeout. A headline that times out or whose backend
//! is unavailable is dropped with a warn log and a metrics increment; the rest
//! of the request carries on. Output keeps the input order.

use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::analyze::anon_hash;
use crate::analyze::classifier::HeadlineClassifier;
use crate::error::ExplainError;
use crate::sentiment::SentimentScorer;
use crate::types::{Category, ClassifiedHeadline, Headline};

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_HEADLINE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct FanoutOptions {
    pub workers: usize,
    pub headline_timeout: Duration,
    pub categories: Vec<Category>,
}

impl Default for FanoutOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            headline_timeout: DEFAULT_HEADLINE_TIMEOUT,
            categories: Category::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    Timeout,
    Failed(ExplainError),
    /// Task panicked or was cancelled.
    Aborted,
}

impl DropReason {
    pub fn label(&self) -> &'static str {
        match self {
            DropReason::Timeout => "timeout",
            DropReason::Failed(e) => e.code(),
            DropReason::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedHeadline {
    /// Position in the input list.
    pub index: usize,
    pub reason: DropReason,
}

#[derive(Debug, Default)]
pub struct FanoutOutcome {
    /// Input order; blank headlines appear flagged.
    pub classified: Vec<Arc<ClassifiedHeadline>>,
    pub dropped: Vec<DroppedHeadline>,
}

/// Classify and score every headline. Never fails as a whole.
pub async fn classify_all(
    headlines: Vec<Headline>,
    classifier: Arc<dyn HeadlineClassifier>,
    scorer: Arc<dyn SentimentScorer>,
    opts: &FanoutOptions,
) -> FanoutOutcome {
    let total = headlines.len();
    let permits = Arc::new(Semaphore::new(opts.workers.max(1)));
    let categories: Arc<[Category]> = if opts.categories.is_empty() {
        Arc::from(&Category::ALL[..])
    } else {
        Arc::from(opts.categories.as_slice())
    };

    let mut slots: Vec<Option<Arc<ClassifiedHeadline>>> = vec![None; total];
    let mut dropped = Vec::new();
    let mut set = JoinSet::new();
    let mut task_index = HashMap::with_capacity(total);

    for (index, headline) in headlines.into_iter().enumerate() {
        if headline.is_blank() {
            slots[index] = Some(Arc::new(ClassifiedHeadline::flagged_blank(headline)));
            continue;
        }

        let permits = Arc::clone(&permits);
        let classifier = Arc::clone(&classifier);
        let scorer = Arc::clone(&scorer);
        let categories = Arc::clone(&categories);
        let limit = opts.headline_timeout;

        let handle = set.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (index, Err(DropReason::Aborted));
            };
            let work = async {
                let (cat, sent) = tokio::join!(
                    classifier.classify(&headline, &categories),
                    scorer.score(&headline.text)
                );
                let cat = cat.map_err(DropReason::Failed)?;
                let sent = sent.map_err(DropReason::Failed)?;
                Ok::<_, DropReason>(ClassifiedHeadline::new(headline.clone(), cat, sent))
            };
            let res = match tokio::time::timeout(limit, work).await {
                Ok(r) => r,
                Err(_) => Err(DropReason::Timeout),
            };
            (index, res)
        });
        task_index.insert(handle.id(), index);
    }

    while let Some(joined) = set.join_next().await {
        let (index, res) = match joined {
            Ok(pair) => pair,
            Err(e) => match task_index.get(&e.id()) {
                Some(&index) => (index, Err(DropReason::Aborted)),
                None => continue,
            },
        };
        match res {
            Ok(item) => slots[index] = Some(Arc::new(item)),
            Err(reason) => {
                warn!(
                    target: "pipeline",
                    index,
                    reason = reason.label(),
                    "headline dropped"
                );
                counter!("headlines_dropped_total", "reason" => reason.label()).increment(1);
                dropped.push(DroppedHeadline { index, reason });
            }
        }
    }

    dropped.sort_by_key(|d| d.index);
    let classified: Vec<Arc<ClassifiedHeadline>> = slots.into_iter().flatten().collect();
    for item in &classified {
        debug!(
            target: "pipeline",
            id = %anon_hash(item.text()),
            category = item.category.as_str(),
            sentiment = item.sentiment,
            flagged = item.flagged,
            "headline classified"
        );
    }

    FanoutOutcome {
        classified,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::KeywordClassifier;
    use crate::error::ExplainResult;
    use crate::sentiment::LexiconScorer;
    use crate::types::CategoryScore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    fn h(text: &str) -> Headline {
        Headline::new(
            text,
            "MockWire",
            Utc.with_ymd_and_hms(2025, 11, 3, 14, 0, 0).unwrap(),
            "AAPL",
        )
    }

    #[tokio::test]
    async fn keeps_input_order_and_flags_blank() {
        let out = classify_all(
            vec![
                h("AAPL posts stronger-than-expected results"),
                h("   "),
                h("Sector peers rally, lifting AAPL"),
            ],
            Arc::new(KeywordClassifier::with_defaults().unwrap()),
            Arc::new(LexiconScorer::new()),
            &FanoutOptions {
                workers: 2,
                ..FanoutOptions::default()
            },
        )
        .await;

        assert!(out.dropped.is_empty());
        assert_eq!(out.classified.len(), 3);
        assert_eq!(out.classified[0].category, Category::Earnings);
        assert!(out.classified[1].flagged);
        assert_eq!(out.classified[1].category, Category::Other);
        assert_eq!(out.classified[1].category_confidence, 0.0);
        assert_eq!(out.classified[2].category, Category::Sector);
    }

    /// Hangs on headlines containing "slow", fails on "broken".
    struct Picky;

    #[async_trait]
    impl HeadlineClassifier for Picky {
        async fn classify(&self, h: &Headline, _: &[Category]) -> ExplainResult<CategoryScore> {
            if h.text.contains("slow") {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if h.text.contains("broken") {
                return Err(ExplainError::ClassificationUnavailable("503".into()));
            }
            Ok(CategoryScore::new(Category::Macro, 0.7))
        }
        fn name(&self) -> &'static str {
            "picky"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_and_failures_drop_only_that_headline() {
        let out = classify_all(
            vec![h("slow one"), h("fine one"), h("broken one")],
            Arc::new(Picky),
            Arc::new(LexiconScorer::new()),
            &FanoutOptions {
                workers: 1,
                headline_timeout: Duration::from_millis(50),
                categories: Vec::new(),
            },
        )
        .await;

        assert_eq!(out.classified.len(), 1);
        assert_eq!(out.classified[0].text(), "fine one");
        assert_eq!(
            out.dropped,
            vec![
                DroppedHeadline {
                    index: 0,
                    reason: DropReason::Timeout
                },
                DroppedHeadline {
                    index: 2,
                    reason: DropReason::Failed(ExplainError::ClassificationUnavailable(
                        "503".into()
                    ))
                },
            ]
        );
    }
}
