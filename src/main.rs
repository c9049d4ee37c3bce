//! Movies aggregator — Shuttle entrypoint.
//! Boots the Axum HTTP server with both upstream clients, the record store and the broadcast log.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let cfg = movies_aggregator::ServiceConfig::load()?;
    let router = movies_aggregator::build_app(&cfg)?;

    Ok(router.into())
}
