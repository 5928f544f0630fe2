use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and register the explainer's series.
    pub fn init(top_k: usize) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        describe();
        gauge!("explain_top_k").set(top_k as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// Descriptions so the series show up on `/metrics` with help text.
pub fn describe() {
    describe_counter!("explain_requests_total", "Explain requests received.");
    describe_counter!(
        "explain_failures_total",
        "Explain requests that failed, labelled by error code."
    );
    describe_counter!(
        "headlines_dropped_total",
        "Headlines dropped after a timeout or backend failure."
    );
    describe_counter!(
        "upstream_retries_total",
        "Collaborator fetches retried after an upstream failure."
    );
    describe_counter!("news_headlines_total", "Headlines parsed from RSS feeds.");
    describe_histogram!("explain_latency_ms", "End-to-end explain latency in milliseconds.");
    describe_histogram!("news_parse_ms", "RSS parse time in milliseconds.");
    describe_gauge!("explain_top_k", "Configured number of ranked drivers.");
}
