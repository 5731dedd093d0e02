use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::warn;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process and describe our series.
    /// Later calls reuse the same handle.
    pub fn init() -> Self {
        let handle = HANDLE
            .get_or_init(|| {
                let recorder = PrometheusBuilder::new().build_recorder();
                let handle = recorder.handle();
                if metrics::set_global_recorder(recorder).is_err() {
                    warn!("metrics recorder already installed; /metrics may be empty");
                }
                describe();
                handle
            })
            .clone();
        Self { handle }
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

fn describe() {
    describe_counter!("cache_hits_total", "Lookups served from a fetcher cache.");
    describe_counter!("cache_misses_total", "Lookups that went to the provider.");
    describe_counter!(
        "cache_evictions_total",
        "Entries discarded because the cache was full."
    );
    describe_gauge!("cache_ttl_seconds", "Freshness window per cache.");
    describe_counter!(
        "provider_errors_total",
        "Provider calls degraded to a default result."
    );
    describe_counter!("analyze_requests_total", "Analysis requests by outcome.");
    describe_histogram!("analyze_duration_ms", "Analysis handling time in milliseconds.");
}
