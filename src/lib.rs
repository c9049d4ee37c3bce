// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod aggregator;
pub mod api;
pub mod broadcast;
pub mod config;
pub mod domain;
pub mod downstream;
pub mod failure;
pub mod metrics;
pub mod retry;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::Aggregator;
pub use crate::api::{router, AppState};
pub use crate::broadcast::{BroadcastLog, Subscription};
pub use crate::config::ServiceConfig;
pub use crate::failure::Failure;
pub use crate::retry::RetryPolicy;

use axum::Router;
use once_cell::sync::OnceCell;
use tracing::info;

use crate::metrics::Metrics;

/// Build the full application router from a config.
/// `/metrics` is mounted when `METRICS_ENABLED=1`.
pub fn build_app(cfg: &ServiceConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg)?;
    let mut app = router(state);

    if metrics_enabled() {
        // The recorder is process-global; install it once and reuse the handle.
        static METRICS: OnceCell<Metrics> = OnceCell::new();
        let m = METRICS.get_or_try_init(Metrics::init)?;
        app = app.merge(m.router());
    }

    info!(
        movies_info_url = %cfg.movies_info_url,
        reviews_url = %cfg.reviews_url,
        max_retries = cfg.retry.max_retries,
        "application router built"
    );
    Ok(app)
}

/// Load `.env` + config (file and env overrides) and build the router.
pub async fn app() -> anyhow::Result<Router> {
    let _ = dotenvy::dotenv();
    let cfg = ServiceConfig::load()?;
    build_app(&cfg)
}

fn metrics_enabled() -> bool {
    std::env::var("METRICS_ENABLED")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
