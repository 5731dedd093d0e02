//! Yahoo Finance chart endpoint (`/v8/finance/chart/{ticker}`).

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::{MarketDataProvider, PriceBar, PriceHistory};
use crate::error::{FetchError, FetchResult};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) ticker-pulse/0.1";

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: Option<ChartNode>,
}

#[derive(Deserialize)]
struct ChartNode {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<MetaNode>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct MetaNode {
    #[serde(default, rename = "longName")]
    long_name: Option<String>,
    #[serde(default, rename = "shortName")]
    short_name: Option<String>,
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

pub struct YahooChartProvider {
    http: reqwest::Client,
    chart_url: Url,
}

impl YahooChartProvider {
    /// `base_url` is the host root, e.g. `https://query1.finance.yahoo.com`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let chart_url = Url::parse(&format!(
            "{}/v8/finance/chart/",
            base_url.trim_end_matches('/')
        ))
        .with_context(|| format!("invalid market base url: {base_url}"))?;
        if chart_url.cannot_be_a_base() {
            bail!("market base url cannot carry a path: {base_url}");
        }

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building market http client")?;

        Ok(Self { http, chart_url })
    }

    fn url_for(&self, ticker: &str) -> Url {
        let mut url = self.chart_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(ticker);
        }
        url
    }
}

#[async_trait]
impl MarketDataProvider for YahooChartProvider {
    async fn hourly_history(&self, ticker: &str, lookback: Duration) -> FetchResult<PriceHistory> {
        let now = chrono::Utc::now().timestamp();
        let start = now - lookback.as_secs() as i64;

        let resp = self
            .http
            .get(self.url_for(ticker))
            .query(&[
                ("period1", start.to_string()),
                ("period2", now.to_string()),
                ("interval", "1h".to_string()),
                ("includePrePost", "false".to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        match parse_chart(&body) {
            // Unknown symbols come back as 404 with a chart.error payload.
            Err(FetchError::Decode(_)) if !status.is_success() => {
                Err(FetchError::Status(status.as_u16()))
            }
            Ok(_) if !status.is_success() => Err(FetchError::Status(status.as_u16())),
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

/// Parse a chart payload into bars. Rows without a close are dropped.
pub fn parse_chart(body: &str) -> FetchResult<PriceHistory> {
    let env: ChartEnvelope = serde_json::from_str(body)?;
    let Some(chart) = env.chart else {
        return Ok(PriceHistory::default());
    };

    if let Some(err) = chart.error {
        return Err(FetchError::Provider {
            code: err.code,
            message: err.description,
        });
    }

    let Some(result) = chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceHistory::default());
    };

    let (long_name, short_name, gmtoffset) = match result.meta {
        Some(m) => (m.long_name, m.short_name, m.gmtoffset.unwrap_or(0)),
        None => (None, None, 0),
    };

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next();
    let (closes, volumes) = match quote {
        Some(q) => (q.close, q.volume),
        None => (Vec::new(), Vec::new()),
    };

    let bars = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let close = closes.get(i).copied().flatten()?;
            if !close.is_finite() {
                return None;
            }
            Some(PriceBar {
                ts,
                close,
                volume: volumes.get(i).copied().flatten(),
            })
        })
        .collect();

    Ok(PriceHistory {
        long_name,
        short_name,
        gmtoffset,
        bars,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_meta_and_skips_null_closes() {
        let body = r#"{
          "chart": {
            "result": [{
              "meta": {"symbol":"AAPL","longName":"Apple Inc.","shortName":"Apple","gmtoffset":-18000},
              "timestamp": [1000, 4600, 8200],
              "indicators": {"quote": [{
                "close": [100.0, null, 105.0],
                "volume": [10, 0, null]
              }]}
            }],
            "error": null
          }
        }"#;
        let h = parse_chart(body).unwrap();
        assert_eq!(h.long_name.as_deref(), Some("Apple Inc."));
        assert_eq!(h.short_name.as_deref(), Some("Apple"));
        assert_eq!(h.gmtoffset, -18000);
        assert_eq!(
            h.bars,
            vec![
                PriceBar { ts: 1000, close: 100.0, volume: Some(10) },
                PriceBar { ts: 8200, close: 105.0, volume: None },
            ]
        );
    }

    #[test]
    fn chart_error_maps_to_provider_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        match parse_chart(body) {
            Err(FetchError::Provider { code, message }) => {
                assert_eq!(code, "Not Found");
                assert!(message.contains("delisted"));
            }
            other => panic!("expected provider error, got {other:?}"),
        }
    }

    #[test]
    fn empty_result_has_no_bars() {
        let h = parse_chart(r#"{"chart":{"result":[],"error":null}}"#).unwrap();
        assert!(h.bars.is_empty());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(parse_chart("<html>"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn ticker_is_a_single_path_segment() {
        let p = YahooChartProvider::new("http://localhost:1/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            p.url_for("A/B").as_str(),
            "http://localhost:1/v8/finance/chart/A%2FB"
        );
        assert_eq!(
            p.url_for("BRK-B").as_str(),
            "http://localhost:1/v8/finance/chart/BRK-B"
        );
    }
}
