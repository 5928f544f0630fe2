//! FinExplain: binary entrypoint
//! Boots the Axum HTTP server: config, tracing, model backends, sources, routes.
//!
//! See `README.md` for quickstart and configuration.

use std::sync::Arc;

use finexplain::{build_explainer, create_router, init_tracing, metrics::Metrics, ExplainConfig};
use shuttle_axum::ShuttleAxum;
use tracing::info;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = ExplainConfig::from_toml()?;
    info!(
        target: "config",
        backend = ?cfg.backend,
        top_k = cfg.top_k,
        workers = cfg.workers,
        "config loaded"
    );

    let explainer = Arc::new(build_explainer(&cfg)?);
    let metrics = Metrics::init(cfg.top_k)?;

    let router = create_router(explainer).merge(metrics.router());
    Ok(router.into())
}
