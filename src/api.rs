use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::{counter, histogram};
use serde::Serialize;
use tower_http::{cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::market::{MarketDataProvider, MarketService, QuoteSnapshot, YahooChartProvider};
use crate::metrics::Metrics;
use crate::news::{NewsApiProvider, NewsItem, NewsProvider, NewsService};
use crate::sentiment::{self, DynSentimentModel, SentimentResult};

pub const MAX_TICKER_LEN: usize = 10;

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; \
style-src 'self' 'unsafe-inline' https://cdnjs.cloudflare.com; \
script-src 'self' 'unsafe-inline' https://cdnjs.cloudflare.com; \
img-src 'self' data: https:; \
font-src 'self' https:; \
connect-src 'self'";

pub const QUOTE_CACHE_HEADER: &str = "x-quote-cache";

const INDEX_HTML: &str = include_str!("../templates/index.html");

/// Shared handler state: cached fetchers and the sentiment model.
#[derive(Clone)]
pub struct AppState {
    pub market: Arc<MarketService>,
    pub news: Arc<NewsService>,
    pub sentiment: DynSentimentModel,
}

impl AppState {
    /// Wire providers behind caches sized from `cfg`.
    pub fn new(
        market: Arc<dyn MarketDataProvider>,
        news: Arc<dyn NewsProvider>,
        sentiment: DynSentimentModel,
        cfg: &AppConfig,
    ) -> Self {
        Self {
            market: Arc::new(MarketService::new(
                market,
                cfg.market_cache_capacity,
                cfg.market_cache_ttl(),
            )),
            news: Arc::new(NewsService::new(
                news,
                cfg.news_cache_capacity,
                cfg.news_cache_ttl(),
            )),
            sentiment,
        }
    }

    /// Production providers: Yahoo chart, NewsAPI, configured sentiment backend.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let market = YahooChartProvider::new(&cfg.market_base_url, cfg.http_timeout())
            .context("market provider")?;
        let news = NewsApiProvider::new(
            &cfg.news_base_url,
            cfg.news_api_key.clone(),
            cfg.http_timeout(),
        )
        .context("news provider")?;
        let model = sentiment::build_model_from_config(cfg).context("sentiment model")?;
        Ok(Self::new(Arc::new(market), Arc::new(news), model, cfg))
    }
}

/// Optional extras mounted next to the core routes.
#[derive(Default)]
pub struct RouterOptions {
    pub static_dir: Option<PathBuf>,
    pub metrics: Option<Metrics>,
}

/// Core routes only: `/`, `/analyze/{ticker}`, `/health`.
pub fn router(state: AppState) -> Router {
    create_router(state, RouterOptions::default())
}

pub fn create_router(state: AppState, opts: RouterOptions) -> Router {
    let mut app = Router::new()
        .route("/", get(index))
        .route("/health", get(|| async { "OK" }))
        .route("/analyze", get(analyze_missing))
        .route("/analyze/", get(analyze_missing))
        .route("/analyze/{ticker}", get(analyze))
        .with_state(state);

    if let Some(dir) = opts.static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }
    if let Some(m) = opts.metrics {
        app = app.merge(m.router());
    }

    app.layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub stock: QuoteSnapshot,
    pub news: Vec<NewsItem>,
    pub sentiment: SentimentResult,
}

/// Upper-cased ticker, or `None` when empty or longer than 10 characters.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let len = raw.chars().count();
    if len == 0 || len > MAX_TICKER_LEN {
        return None;
    }
    Some(raw.to_uppercase())
}

async fn index() -> impl IntoResponse {
    (
        [(header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY)],
        Html(INDEX_HTML),
    )
}

async fn analyze_missing() -> Response {
    counter!("analyze_requests_total", "outcome" => "invalid").increment(1);
    error_response(StatusCode::BAD_REQUEST, "Invalid ticker format".to_string())
}

async fn analyze(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let started = Instant::now();
    let resp = match path {
        Ok(Path(raw)) => analyze_ticker(&state, &raw).await,
        Err(rejection) => {
            debug!(error = %rejection, "undecodable ticker path");
            analyze_missing().await
        }
    };
    histogram!("analyze_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);
    resp
}

async fn analyze_ticker(state: &AppState, raw: &str) -> Response {
    let Some(ticker) = normalize_ticker(raw) else {
        counter!("analyze_requests_total", "outcome" => "invalid").increment(1);
        return error_response(StatusCode::BAD_REQUEST, "Invalid ticker format".to_string());
    };
    info!(%ticker, "analyzing ticker");

    let (stock, cache) = match state.market.quote(&ticker).await {
        Ok(found) => found,
        Err(e) => {
            if !e.is_no_data() {
                counter!("provider_errors_total", "provider" => state.market.provider_name())
                    .increment(1);
            }
            warn!(%ticker, error = %e, "no market data");
            counter!("analyze_requests_total", "outcome" => "not_found").increment(1);
            return error_response(
                StatusCode::NOT_FOUND,
                format!("Unable to fetch data for {ticker}"),
            );
        }
    };

    let news = match state.news.articles(&ticker, &stock.name).await {
        Ok(items) => items,
        Err(e) => {
            counter!("provider_errors_total", "provider" => state.news.provider_name())
                .increment(1);
            warn!(%ticker, error = %e, "news unavailable, continuing without");
            Vec::new()
        }
    };

    let sentiment = match sentiment::classify_news(state.sentiment.as_ref(), &news).await {
        Ok(s) => s,
        Err(e) => {
            counter!("provider_errors_total", "provider" => "sentiment").increment(1);
            warn!(
                %ticker,
                model = state.sentiment.model_name(),
                error = %e,
                "sentiment failed, using neutral"
            );
            SentimentResult::neutral()
        }
    };

    info!(
        %ticker,
        news = news.len(),
        sentiment = %sentiment.label,
        cache = cache.as_str(),
        "analysis complete"
    );
    counter!("analyze_requests_total", "outcome" => "ok").increment(1);

    let body = AnalysisResponse {
        stock,
        news,
        sentiment,
    };
    (
        [(QUOTE_CACHE_HEADER, cache.as_str())],
        Json(body),
    )
        .into_response()
}
