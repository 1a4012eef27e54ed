// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod telemetry;
pub mod news;
pub mod store;
pub mod users;

use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use axum::Router;

use crate::auth::JwtService;
use crate::config::{AppConfig, PageLimitsHandle};
use crate::news::{Aggregator, HeadlineClient};
use crate::store::SqliteStore;

pub use crate::api::router;

/// Everything a process needs: the HTTP router and the (not yet started) aggregator.
pub struct App {
    pub router: Router,
    pub aggregator: Arc<Aggregator>,
    pub store: Arc<SqliteStore>,
    /// Live page limits; hand to `config::start_hot_reload_thread` to follow file edits.
    pub page_limits: PageLimitsHandle,
}

/// Wire store, upstream client, aggregator and router from config.
pub fn app(cfg: &AppConfig) -> Result<App> {
    ensure!(
        !cfg.auth.jwt_secret.trim().is_empty(),
        "jwt secret is empty; set JWT_SECRET or [auth].jwt_secret"
    );
    if cfg.news.api_key.is_empty() {
        tracing::warn!("news api key is empty; upstream calls will be rejected by the provider");
    }

    let store = Arc::new(
        SqliteStore::open(&cfg.database.path)
            .with_context(|| format!("opening store at {}", cfg.database.path.display()))?,
    );
    app_with_store(cfg, store)
}

/// Same as [`app`] over an already opened store.
pub fn app_with_store(cfg: &AppConfig, store: Arc<SqliteStore>) -> Result<App> {
    let client = HeadlineClient::new(&cfg.news.endpoint, &cfg.news.api_key, cfg.request_timeout())?
        .with_page_size(cfg.news.page_size)
        .with_span(tracing::info_span!("upstream"));

    let aggregator = Arc::new(
        Aggregator::new(Arc::new(client), store.clone(), cfg.aggregator_cfg())
            .with_span(tracing::info_span!("aggregator")),
    );

    let jwt = JwtService::new(
        &cfg.auth.jwt_secret,
        cfg.auth.issuer.clone(),
        cfg.auth.token_ttl_hours,
    );
    let page_limits = PageLimitsHandle::new(cfg.page_limits());
    let state = api::AppState::new(store.clone(), jwt, page_limits.clone());

    Ok(App {
        router: api::router(state),
        aggregator,
        store,
        page_limits,
    })
}
