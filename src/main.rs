//! newsfeed-api binary entrypoint.
//! Boots the Axum HTTP server and the background news schedule.

use newsfeed_api::config::{start_hot_reload_thread, AppConfig};
use newsfeed_api::telemetry::Metrics;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("newsfeed_api=info,tower_http=info,warn"));

    // The runtime may already have installed a subscriber; keep whichever came first.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let metrics = Metrics::init()?;
    let app = newsfeed_api::app(&cfg)?;

    if let Some(path) = AppConfig::resolve_path() {
        if start_hot_reload_thread(app.page_limits.clone(), path.clone()) {
            tracing::info!(path = %path.display(), "config hot reload enabled");
        }
    }

    // Runs for the lifetime of the process; the handle is intentionally detached.
    let _schedule = app.aggregator.clone().start(cfg.news.run_immediately).await;

    let router = app.router.merge(metrics.router());
    Ok(router.into())
}
