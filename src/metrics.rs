use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "downstream_requests_total",
            "Downstream HTTP attempts by source and classified outcome."
        );
        describe_counter!(
            "downstream_retries_total",
            "Retries scheduled after a downstream server error."
        );
        describe_counter!(
            "aggregate_requests_total",
            "Aggregate reads by outcome."
        );
        describe_histogram!(
            "aggregate_duration_ms",
            "Wall time of one aggregate read in milliseconds."
        );
        describe_counter!("broadcast_appends_total", "Records appended to the broadcast log.");
        describe_gauge!("broadcast_subscribers", "Live broadcast log subscribers.");
    });
}

impl Metrics {
    /// Install the Prometheus recorder. Fails if another recorder is already installed.
    pub fn init() -> anyhow::Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
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
