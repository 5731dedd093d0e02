//! # Market data
//! Hourly price history for a ticker, reduced to a quote snapshot for the
//! dashboard: latest price, percent change vs. the previous bar, latest volume
//! and the full close series for charting.

pub mod yahoo;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheStatus, TtlCache};
use crate::error::{FetchError, FetchResult};

pub use yahoo::YahooChartProvider;

/// Trailing window requested from the provider.
pub const LOOKBACK: Duration = Duration::from_secs(2 * 24 * 3600);

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One hourly bar as returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    /// Unix seconds, UTC.
    pub ts: i64,
    pub close: f64,
    pub volume: Option<u64>,
}

/// Raw provider answer for one ticker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    /// Exchange offset from UTC in seconds.
    pub gmtoffset: i64,
    /// Bars with a close, oldest first.
    pub bars: Vec<PriceBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Historical {
    pub timestamps: Vec<String>,
    pub prices: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub name: String,
    pub price: f64,
    /// Percent change vs. the previous bar.
    pub change: f64,
    pub volume: u64,
    pub historical: Historical,
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Hourly bars covering the trailing `lookback`.
    async fn hourly_history(&self, ticker: &str, lookback: Duration) -> FetchResult<PriceHistory>;
    fn name(&self) -> &'static str;
}

/// Round to 2 decimals.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `(latest - previous) / previous * 100`, rounded to 2 decimals.
/// A zero previous price gives 0.0.
pub fn percent_change(previous: f64, latest: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    round2((latest - previous) / previous * 100.0)
}

/// Reduce a provider history to the dashboard snapshot.
///
/// Needs at least two bars; fewer is `FetchError::NotEnoughData`.
pub fn build_snapshot(ticker: &str, history: &PriceHistory) -> FetchResult<QuoteSnapshot> {
    let bars = &history.bars;
    let got = bars.len();
    if got < 2 {
        return Err(FetchError::NotEnoughData { got });
    }

    let latest = &bars[got - 1];
    let previous = &bars[got - 2];

    let offset = i32::try_from(history.gmtoffset)
        .ok()
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix());

    let mut timestamps = Vec::with_capacity(got);
    let mut prices = Vec::with_capacity(got);
    for bar in bars {
        let Some(at) = DateTime::from_timestamp(bar.ts, 0) else {
            continue;
        };
        timestamps.push(at.with_timezone(&offset).format(TIMESTAMP_FORMAT).to_string());
        prices.push(round2(bar.close));
    }

    let name = history
        .long_name
        .as_deref()
        .or(history.short_name.as_deref())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(ticker)
        .to_string();

    Ok(QuoteSnapshot {
        name,
        price: round2(latest.close),
        change: percent_change(previous.close, latest.close),
        volume: latest.volume.unwrap_or(0),
        historical: Historical { timestamps, prices },
    })
}

/// Market fetcher with a time-windowed cache in front of the provider.
pub struct MarketService {
    provider: Arc<dyn MarketDataProvider>,
    cache: TtlCache<String, QuoteSnapshot>,
}

impl MarketService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, capacity: usize, ttl: Duration) -> Self {
        Self {
            provider,
            cache: TtlCache::new("market", capacity, ttl),
        }
    }

    /// Snapshot for an already-normalized ticker. Failures are not cached.
    pub async fn quote(&self, ticker: &str) -> FetchResult<(QuoteSnapshot, CacheStatus)> {
        if let Some(hit) = self.cache.get(ticker) {
            debug!(ticker, "market cache hit");
            return Ok((hit, CacheStatus::Hit));
        }

        let history = self.provider.hourly_history(ticker, LOOKBACK).await?;
        let snapshot = build_snapshot(ticker, &history)?;
        self.cache.insert(ticker.to_string(), snapshot.clone());
        Ok((snapshot, CacheStatus::Miss))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn cache(&self) -> &TtlCache<String, QuoteSnapshot> {
        &self.cache
    }
}
