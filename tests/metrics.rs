// tests/metrics.rs
//
// Prometheus exposition at /metrics. Both tests live in one binary, so they
// share the process-wide recorder and only assert on presence.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::Router;

use common::{article, get, history, StubMarket, StubModel, StubNews};
use ticker_pulse::api::{self, RouterOptions};
use ticker_pulse::metrics::Metrics;
use ticker_pulse::{AppConfig, AppState};

fn app_with_metrics(news: StubNews, model: StubModel) -> Router {
    // Recorder before the caches so their TTL gauges are captured.
    let metrics = Metrics::init();
    let state = AppState::new(
        Arc::new(StubMarket::with("AAPL", history("Apple Inc.", &[1.0, 2.0]))),
        Arc::new(news),
        Arc::new(model),
        &AppConfig::default(),
    );
    api::create_router(
        state,
        RouterOptions {
            static_dir: None,
            metrics: Some(metrics),
        },
    )
}

async fn scrape(app: &Router) -> String {
    let (status, _, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    String::from_utf8(body.to_vec()).expect("utf8 exposition")
}

#[tokio::test]
async fn cache_miss_then_hit_increments_counters() {
    let app = app_with_metrics(
        StubNews::with(vec![article(Some("Apple"), Some("up"))]),
        StubModel::answering("positive", 0.9),
    );

    let (s1, _, _) = get(&app, "/analyze/AAPL").await;
    let (s2, _, _) = get(&app, "/analyze/AAPL").await;
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);

    let text = scrape(&app).await;
    for needle in [
        "cache_hits_total",
        "cache_misses_total",
        "cache_ttl_seconds",
        "analyze_requests_total",
        "analyze_duration_ms",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
    assert!(text.contains(r#"cache="market""#), "{text}");
}

#[tokio::test]
async fn degraded_provider_is_counted() {
    let app = app_with_metrics(
        StubNews::with(vec![article(Some("Apple"), Some("flat"))]),
        StubModel::failing(),
    );

    let (status, _, _) = get(&app, "/analyze/AAPL").await;
    assert_eq!(status, StatusCode::OK);

    let text = scrape(&app).await;
    assert!(
        text.contains("provider_errors_total"),
        "sentiment failure must be counted\n{text}"
    );
}

#[tokio::test]
async fn metrics_route_absent_without_recorder() {
    let app = api::router(AppState::new(
        Arc::new(StubMarket::default()),
        Arc::new(StubNews::default()),
        Arc::new(StubModel::failing()),
        &AppConfig::default(),
    ));
    let (status, _, _) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
