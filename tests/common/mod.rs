// tests/common/mod.rs
//
// In-process stubs for the provider traits, plus request helpers for driving
// the router with tower::ServiceExt::oneshot.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use tower::ServiceExt as _;

use ticker_pulse::error::{FetchError, FetchResult};
use ticker_pulse::market::{MarketDataProvider, PriceBar, PriceHistory};
use ticker_pulse::news::{NewsProvider, NewsQuery, RawArticle};
use ticker_pulse::sentiment::{SentimentModel, SentimentResult};
use ticker_pulse::{api, AppConfig, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

/// Market provider serving canned histories and counting calls.
#[derive(Default)]
pub struct StubMarket {
    pub calls: AtomicUsize,
    pub histories: HashMap<String, PriceHistory>,
    pub requested: Mutex<Vec<String>>,
}

impl StubMarket {
    pub fn with(ticker: &str, history: PriceHistory) -> Self {
        let mut s = Self::default();
        s.histories.insert(ticker.to_string(), history);
        s
    }

    pub fn also(mut self, ticker: &str, history: PriceHistory) -> Self {
        self.histories.insert(ticker.to_string(), history);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for StubMarket {
    async fn hourly_history(&self, ticker: &str, _lookback: Duration) -> FetchResult<PriceHistory> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(ticker.to_string());
        Ok(self.histories.get(ticker).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "stub-market"
    }
}

/// News provider returning a fixed list (or an error) and recording queries.
#[derive(Default)]
pub struct StubNews {
    pub calls: AtomicUsize,
    pub articles: Vec<RawArticle>,
    pub fail: bool,
    pub queries: Mutex<Vec<NewsQuery>>,
}

impl StubNews {
    pub fn with(articles: Vec<RawArticle>) -> Self {
        Self {
            articles,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NewsProvider for StubNews {
    async fn search(&self, query: &NewsQuery) -> FetchResult<Vec<RawArticle>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        if self.fail {
            return Err(FetchError::Status(500));
        }
        Ok(self.articles.clone())
    }

    fn name(&self) -> &'static str {
        "stub-news"
    }
}

/// Sentiment model with a fixed answer (or failure) that records its inputs.
pub struct StubModel {
    pub answer: Option<SentimentResult>,
    pub inputs: Mutex<Vec<String>>,
}

impl StubModel {
    pub fn answering(label: &str, score: f64) -> Self {
        Self {
            answer: Some(SentimentResult {
                label: label.to_string(),
                score,
            }),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: None,
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }
}

impl SentimentModel for StubModel {
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<SentimentResult>> + Send + 'a>> {
        self.inputs.lock().unwrap().push(text.to_string());
        let out = self.answer.clone().ok_or(FetchError::Disabled);
        Box::pin(async move { out })
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

/// Two-or-more hourly bars ending at the given closes.
pub fn history(name: &str, closes: &[f64]) -> PriceHistory {
    PriceHistory {
        long_name: Some(name.to_string()),
        short_name: None,
        gmtoffset: 0,
        bars: closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                ts: 1_714_550_400 + i as i64 * 3600,
                close,
                volume: Some(1_000 * (i as u64 + 1)),
            })
            .collect(),
    }
}

pub fn article(title: Option<&str>, description: Option<&str>) -> RawArticle {
    RawArticle {
        title: title.map(String::from),
        description: description.map(String::from),
        url: Some("https://news.example/a".to_string()),
        published_at: Some("2024-05-01T12:00:00Z".to_string()),
    }
}

pub fn app_with(
    market: Arc<StubMarket>,
    news: Arc<StubNews>,
    model: Arc<StubModel>,
    cfg: &AppConfig,
) -> Router {
    api::router(AppState::new(market, news, model, cfg))
}

/// GET `uri`, returning status, headers and the full body.
pub async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET request");
    let resp = app.clone().oneshot(req).await.expect("router response");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, headers, bytes)
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, HeaderMap, serde_json::Value) {
    let (status, headers, bytes) = get(app, uri).await;
    let v = serde_json::from_slice(&bytes).expect("json body");
    (status, headers, v)
}
