//! # Explainer
//! Request orchestration: price → move → headlines → classify/score fan-out →
//! rank → narrative + confidence, plus the market/news views. Stages are the pure functions from their own
//! modules; this file only sequences them, logs and records metrics.
//!
//! Failure policy: price problems and fetch failures fail the request; per-headline
//! problems only shrink the evidence; no headlines is a normal, zero-confidence result.

use chrono::NaiveDate;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::analyze::{anon_hash, classify_all, FanoutOptions};
use crate::confidence::{estimate_confidence, ConfidenceWeights};
use crate::config::ExplainConfig;
use crate::error::{ExplainError, ExplainResult};
use crate::models::Backends;
use crate::movement::{compute_move, MoveThresholds};
use crate::narrative::compose_narrative;
use crate::ranking::{rank_headlines, RankContext, RankingConfig};
use crate::source_weights::SourceWeightsConfig;
use crate::sources::{fetch_with_retry, NewsSource, PriceSource};
use crate::types::{ClassifiedHeadline, Explanation, MoveRecord};
use crate::views::{build_views, ExplainReport};

const MAX_TICKER_LEN: usize = 12;

/// Per-request knobs, resolved once from `ExplainConfig`.
#[derive(Debug, Clone)]
pub struct ExplainSettings {
    pub thresholds: MoveThresholds,
    pub ranking: RankingConfig,
    pub confidence_weights: ConfidenceWeights,
    pub fanout: FanoutOptions,
    pub market_close_utc_hour: u32,
    pub price_timeout: Duration,
    pub news_timeout: Duration,
}

impl ExplainSettings {
    pub fn from_config(cfg: &ExplainConfig) -> Self {
        Self {
            thresholds: cfg.move_thresholds(),
            ranking: cfg.ranking_config(),
            confidence_weights: cfg.confidence_weights,
            fanout: cfg.fanout_options(),
            market_close_utc_hour: cfg.market_close_utc_hour,
            price_timeout: Duration::from_millis(cfg.prices.timeout_ms),
            news_timeout: Duration::from_millis(cfg.news.timeout_ms),
        }
    }
}

impl Default for ExplainSettings {
    fn default() -> Self {
        Self::from_config(&ExplainConfig::default())
    }
}

pub struct Explainer {
    prices: Arc<dyn PriceSource>,
    news: Arc<dyn NewsSource>,
    backends: Backends,
    settings: ExplainSettings,
    source_weights: SourceWeightsConfig,
}

impl Explainer {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        news: Arc<dyn NewsSource>,
        backends: Backends,
        settings: ExplainSettings,
    ) -> Self {
        Self {
            prices,
            news,
            backends,
            settings,
            source_weights: SourceWeightsConfig::default(),
        }
    }

    /// Settings and source weights taken from `cfg`.
    pub fn from_config(
        prices: Arc<dyn PriceSource>,
        news: Arc<dyn NewsSource>,
        backends: Backends,
        cfg: &ExplainConfig,
    ) -> Self {
        Self::new(prices, news, backends, ExplainSettings::from_config(cfg))
            .with_source_weights(SourceWeightsConfig::load_from_file(&cfg.source_weights_path))
    }

    pub fn with_source_weights(mut self, weights: SourceWeightsConfig) -> Self {
        self.source_weights = weights;
        self
    }

    pub fn settings(&self) -> &ExplainSettings {
        &self.settings
    }

    pub async fn explain(&self, ticker: &str, date: NaiveDate) -> ExplainResult<Explanation> {
        self.explain_report(ticker, date).await.map(|r| r.explanation)
    }

    /// Like `explain`, with the market and news views attached.
    pub async fn explain_report(
        &self,
        ticker: &str,
        date: NaiveDate,
    ) -> ExplainResult<ExplainReport> {
        let t0 = Instant::now();
        counter!("explain_requests_total").increment(1);

        let res = self.run(ticker, date).await;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("explain_latency_ms").record(ms);
        if let Err(e) = &res {
            counter!("explain_failures_total", "code" => e.code()).increment(1);
            warn!(target: "pipeline", ticker, %date, code = e.code(), error = %e, "explain failed");
        }
        res
    }

    async fn run(&self, ticker: &str, date: NaiveDate) -> ExplainResult<ExplainReport> {
        let ticker = normalize_ticker(ticker)?;
        let s = &self.settings;

        let bar = fetch_with_retry(self.prices.name(), s.price_timeout, || {
            self.prices.price_bar(&ticker, date)
        })
        .await?;
        if bar.date != date {
            return Err(ExplainError::InvalidPriceData(format!(
                "bar dated {} for requested {date}",
                bar.date
            )));
        }
        let movement = compute_move(&bar, &s.thresholds)?;

        let headlines = fetch_with_retry(self.news.name(), s.news_timeout, || {
            self.news.headlines(&ticker, date)
        })
        .await?;
        let fetched = headlines.len();

        let outcome = classify_all(
            headlines,
            Arc::clone(&self.backends.classifier),
            Arc::clone(&self.backends.scorer),
            &s.fanout,
        )
        .await;

        let ctx = RankContext::at_close(ticker.as_str(), date, s.market_close_utc_hour);
        let report = assemble_report(
            &ticker,
            date,
            movement,
            &outcome.classified,
            &ctx,
            s,
            &self.source_weights,
        );
        let out = &report.explanation;

        info!(
            target: "pipeline",
            ticker = %ticker,
            %date,
            direction = out.movement.direction.as_str(),
            pct_change = out.movement.pct_change,
            headlines = fetched,
            dropped = outcome.dropped.len(),
            drivers = out.drivers.len(),
            lead = out.drivers.first().map(|d| anon_hash(&d.text)).unwrap_or_default(),
            confidence = out.confidence,
            "explanation ready"
        );
        Ok(report)
    }
}

/// Rank, narrate and score already-classified headlines. Pure.
pub fn assemble_explanation(
    ticker: &str,
    date: NaiveDate,
    movement: MoveRecord,
    classified: &[Arc<ClassifiedHeadline>],
    ctx: &RankContext,
    settings: &ExplainSettings,
    source_weights: &SourceWeightsConfig,
) -> Explanation {
    assemble_report(ticker, date, movement, classified, ctx, settings, source_weights).explanation
}

/// `assemble_explanation` plus the views built from the same ranked drivers.
pub fn assemble_report(
    ticker: &str,
    date: NaiveDate,
    movement: MoveRecord,
    classified: &[Arc<ClassifiedHeadline>],
    ctx: &RankContext,
    settings: &ExplainSettings,
    source_weights: &SourceWeightsConfig,
) -> ExplainReport {
    let drivers = rank_headlines(classified, &movement, ctx, &settings.ranking, source_weights);
    let narrative = compose_narrative(ticker, date, &movement, &drivers);
    let confidence = estimate_confidence(
        &movement,
        &drivers,
        settings.ranking.top_k,
        &settings.confidence_weights,
    );

    let explanation = Explanation {
        ticker: ticker.to_string(),
        date,
        movement,
        drivers: drivers.records(),
        narrative,
        confidence,
    };
    let views = build_views(&explanation, &drivers);
    ExplainReport {
        explanation,
        views: Some(views),
    }
}

/// Trimmed, upper-cased symbol; letters, digits, `.`, `-`, `^`, `=` only.
pub fn normalize_ticker(raw: &str) -> ExplainResult<String> {
    let t = raw.trim().to_ascii_uppercase();
    if t.is_empty() {
        return Err(ExplainError::InvalidRequest("ticker is empty".into()));
    }
    if t.len() > MAX_TICKER_LEN
        || !t
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
    {
        return Err(ExplainError::InvalidRequest(format!("invalid ticker `{raw}`")));
    }
    Ok(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MockNewsSource, StaticPriceSource};
    use crate::types::Direction;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()
    }

    #[test]
    fn ticker_normalization() {
        assert_eq!(normalize_ticker(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_ticker("brk.b").unwrap(), "BRK.B");
        assert_eq!(normalize_ticker("^gspc").unwrap(), "^GSPC");
        assert_eq!(normalize_ticker("  ").unwrap_err().code(), "invalid_request");
        assert!(normalize_ticker("AAPL; DROP").is_err());
    }

    #[tokio::test]
    async fn mock_feed_explains_an_up_move() {
        let ex = Explainer::new(
            Arc::new(StaticPriceSource::new().with_open_close("AAPL", day(), 100.0, 103.0)),
            Arc::new(MockNewsSource::new()),
            Backends::rules().unwrap(),
            ExplainSettings::default(),
        );
        let out = ex.explain("aapl", day()).await.unwrap();
        assert_eq!(out.ticker, "AAPL");
        assert_eq!(out.movement.direction, Direction::Up);
        assert_eq!(out.drivers.len(), 2);
        assert!(out.narrative.contains("AAPL rose 3.00%"));
        // both agree, 2 of 5 slots filled
        assert!((out.confidence - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_bar_fails_request() {
        let ex = Explainer::new(
            Arc::new(StaticPriceSource::new()),
            Arc::new(MockNewsSource::new()),
            Backends::rules().unwrap(),
            ExplainSettings::default(),
        );
        let err = ex.explain("AAPL", day()).await.unwrap_err();
        assert_eq!(err.code(), "price_not_found");
    }

    #[tokio::test]
    async fn report_carries_views_for_the_same_drivers() {
        let ex = Explainer::new(
            Arc::new(StaticPriceSource::new().with_open_close("AAPL", day(), 100.0, 103.0)),
            Arc::new(MockNewsSource::new()),
            Backends::rules().unwrap(),
            ExplainSettings::default(),
        );
        let report = ex.explain_report("AAPL", day()).await.unwrap();
        let views = report.views.as_ref().unwrap();
        assert_eq!(views.market.impact, crate::views::Impact::Notable);
        assert_eq!(views.market.summary, "AAPL was up 3.00% on 2025-11-03 (notable move).");
        assert!(views.news.has_news);
        let texts: Vec<&str> = views.news.drivers.iter().map(|d| d.text.as_str()).collect();
        let ranked: Vec<&str> = report.explanation.drivers.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, ranked);
        assert_eq!(report.explanation, ex.explain("AAPL", day()).await.unwrap());
    }
}
