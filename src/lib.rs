// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod news;
pub mod sentiment;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::error::{FetchError, FetchResult};

use axum::Router;
use std::path::PathBuf;
use tracing::info;

/// Build the full application router from a loaded config: production
/// providers, static assets and (if enabled) `/metrics`.
pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    // Recorder first, so gauges set while wiring the caches are kept.
    let metrics = cfg.metrics_route.then(crate::metrics::Metrics::init);

    let state = AppState::from_config(cfg)?;
    info!(
        market = state.market.provider_name(),
        news = state.news.provider_name(),
        sentiment = state.sentiment.model_name(),
        "providers ready"
    );

    Ok(api::create_router(
        state,
        api::RouterOptions {
            static_dir: Some(PathBuf::from(&cfg.static_dir)),
            metrics,
        },
    ))
}

/// Load configuration from file/env and build the router.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load()?;
    build_app(&cfg)
}
