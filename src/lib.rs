// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod confidence;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod movement;
pub mod narrative;
pub mod pipeline;
pub mod ranking;
pub mod sentiment;
pub mod source_weights;
pub mod sources;
pub mod types;
pub mod views;

// Headline classification, model adapter, concurrent fan-out
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, router};
pub use crate::config::ExplainConfig;
pub use crate::error::{ExplainError, ExplainResult};
pub use crate::pipeline::{ExplainSettings, Explainer};
pub use crate::types::Explanation;
pub use crate::views::ExplainReport;

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{NewsProvider, PriceProvider};
use crate::sources::{
    MockNewsSource, NewsSource, PriceSource, RssNewsSource, StaticPriceSource, YahooPriceSource,
};

/// Install the global subscriber. `RUST_LOG` wins; default `finexplain=info,warn`.
/// `FINEXPLAIN_LOG_JSON=1` switches to JSON lines. Safe to call twice.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("finexplain=info,warn"));
    let json = std::env::var("FINEXPLAIN_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1");

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    // Already installed (e.g. by the hosting runtime); keep that one.
    let _ = res;
}

/// Wire sources and the global model backends from `cfg`.
pub fn build_explainer(cfg: &ExplainConfig) -> anyhow::Result<Explainer> {
    let prices: Arc<dyn PriceSource> = match cfg.prices.provider {
        PriceProvider::Yahoo => Arc::new(
            YahooPriceSource::new(
                &cfg.prices.yahoo_endpoint,
                Duration::from_millis(cfg.prices.timeout_ms),
            )
            .context("building yahoo price source")?,
        ),
        PriceProvider::Static => Arc::new(StaticPriceSource::new()),
    };
    let news: Arc<dyn NewsSource> = match cfg.news.provider {
        NewsProvider::Mock => Arc::new(MockNewsSource::new()),
        NewsProvider::Rss => Arc::new(
            RssNewsSource::from_url_template(
                &cfg.news.rss_url,
                Duration::from_millis(cfg.news.timeout_ms),
            )
            .context("building rss news source")?,
        ),
    };
    let backends = models::init_global(cfg)?.clone();

    info!(
        target: "pipeline",
        prices = prices.name(),
        news = news.name(),
        top_k = cfg.top_k,
        "explainer wired"
    );
    Ok(Explainer::from_config(prices, news, backends, cfg))
}
