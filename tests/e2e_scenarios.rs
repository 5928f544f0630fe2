// tests/e2e_scenarios.rs
//
// Full `Explainer::explain` runs against in-memory collaborators and stub
// backends, so every number below is fixed.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;

use finexplain::analyze::HeadlineClassifier;
use finexplain::error::{ExplainError, ExplainResult};
use finexplain::models::Backends;
use finexplain::narrative::NO_NEWS_STATEMENT;
use finexplain::sentiment::SentimentScorer;
use finexplain::sources::{StaticNewsSource, StaticPriceSource};
use finexplain::types::{Category, CategoryScore, Direction, Headline, MagnitudeBucket};
use finexplain::{ExplainSettings, Explainer};

/// Always Earnings at 0.9.
struct EarningsStub;

#[async_trait]
impl HeadlineClassifier for EarningsStub {
    async fn classify(&self, _: &Headline, _: &[Category]) -> ExplainResult<CategoryScore> {
        Ok(CategoryScore::new(Category::Earnings, 0.9))
    }
    fn name(&self) -> &'static str {
        "earnings-stub"
    }
}

/// +0.8 unless the text contains "offline".
struct FixedScorer;

#[async_trait]
impl SentimentScorer for FixedScorer {
    async fn score(&self, text: &str) -> ExplainResult<f64> {
        if text.contains("offline") {
            return Err(ExplainError::ScoringUnavailable("model offline".into()));
        }
        Ok(0.8)
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()
}

fn headline(text: &str, hour: u32) -> Headline {
    Headline::new(
        text,
        "Reuters",
        Utc.with_ymd_and_hms(2025, 11, 3, hour, 0, 0).unwrap(),
        "AAPL",
    )
}

fn explainer(news: StaticNewsSource) -> Explainer {
    Explainer::new(
        Arc::new(StaticPriceSource::new().with_open_close("AAPL", day(), 100.0, 103.0)),
        Arc::new(news),
        Backends::new(Arc::new(EarningsStub), Arc::new(FixedScorer)),
        ExplainSettings::default(),
    )
}

#[tokio::test]
async fn scenario_1_move_record() {
    let out = explainer(StaticNewsSource::new()).explain("AAPL", day()).await.unwrap();
    assert!((out.movement.pct_change - 3.0).abs() < 1e-9);
    assert_eq!(out.movement.direction, Direction::Up);
    assert_eq!(out.movement.magnitude_bucket, MagnitudeBucket::Moderate);
}

#[tokio::test]
async fn scenario_2_no_headlines() {
    let out = explainer(StaticNewsSource::new()).explain("AAPL", day()).await.unwrap();
    assert!(out.drivers.is_empty());
    assert_eq!(out.confidence, 0.0);
    assert!(out.narrative.contains(NO_NEWS_STATEMENT));
}

#[tokio::test]
async fn scenario_3_single_earnings_headline() {
    let news = StaticNewsSource::new().with(
        "AAPL",
        day(),
        vec![headline("AAPL posts stronger-than-expected results", 14)],
    );
    let out = explainer(news).explain("AAPL", day()).await.unwrap();
    assert_eq!(out.drivers.len(), 1);
    assert_eq!(out.drivers[0].category, Category::Earnings);
    assert_eq!(out.drivers[0].sentiment, 0.8);
    assert!((out.confidence - 0.2).abs() < 1e-12);
    assert!(out.narrative.contains("earnings news"));
}

#[tokio::test]
async fn scoring_failure_drops_only_that_headline() {
    let news = StaticNewsSource::new().with(
        "AAPL",
        day(),
        vec![
            headline("AAPL posts stronger-than-expected results", 14),
            headline("AAPL supplier note while model offline", 12),
            headline("   ", 11),
        ],
    );
    let out = explainer(news).explain("AAPL", day()).await.unwrap();
    assert_eq!(out.drivers.len(), 1);
    assert!((out.confidence - 0.2).abs() < 1e-12);
}

#[tokio::test]
async fn invalid_bar_is_fatal() {
    let ex = Explainer::new(
        Arc::new(StaticPriceSource::new().with_open_close("AAPL", day(), 0.0, 103.0)),
        Arc::new(StaticNewsSource::new()),
        Backends::rules().unwrap(),
        ExplainSettings::default(),
    );
    let err = ex.explain("AAPL", day()).await.unwrap_err();
    assert!(matches!(err, ExplainError::InvalidPriceData(_)));
}

/// Hangs forever on every headline.
struct Stuck;

#[async_trait]
impl HeadlineClassifier for Stuck {
    async fn classify(&self, _: &Headline, _: &[Category]) -> ExplainResult<CategoryScore> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(CategoryScore::new(Category::Other, 0.1))
    }
    fn name(&self) -> &'static str {
        "stuck"
    }
}

#[tokio::test(start_paused = true)]
async fn slow_backend_degrades_to_no_drivers() {
    let mut settings = ExplainSettings::default();
    settings.fanout.headline_timeout = Duration::from_millis(20);
    let news = StaticNewsSource::new().with("AAPL", day(), vec![headline("AAPL beats", 14)]);
    let ex = Explainer::new(
        Arc::new(StaticPriceSource::new().with_open_close("AAPL", day(), 100.0, 98.0)),
        Arc::new(news),
        Backends::new(Arc::new(Stuck), Arc::new(FixedScorer)),
        settings,
    );
    let out = ex.explain("AAPL", day()).await.unwrap();
    assert_eq!(out.movement.direction, Direction::Down);
    assert!(out.drivers.is_empty());
    assert_eq!(out.confidence, 0.0);
}
