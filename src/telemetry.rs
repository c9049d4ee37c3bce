// src/telemetry.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "movies_aggregator=info,tower_http=info,warn";

/// Install the global tracing subscriber.
/// - `RUST_LOG` overrides the default filter.
/// - `LOG_FORMAT=json` switches to JSON lines; anything else is compact text.
///
/// Safe to call more than once (later calls are no-ops), which tests rely on.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}
