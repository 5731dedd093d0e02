//! NewsAPI `/v2/everything` search.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::{NewsProvider, NewsQuery, RawArticle};
use crate::error::{FetchError, FetchResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct Everything {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

pub struct NewsApiProvider {
    http: reqwest::Client,
    everything_url: Url,
    api_key: Option<String>,
}

impl NewsApiProvider {
    /// `base_url` is the host root, e.g. `https://newsapi.org`.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let everything_url = Url::parse(&format!(
            "{}/v2/everything",
            base_url.trim_end_matches('/')
        ))
        .with_context(|| format!("invalid news base url: {base_url}"))?;
        if everything_url.cannot_be_a_base() {
            bail!("news base url cannot carry a path: {base_url}");
        }

        let http = reqwest::Client::builder()
            .user_agent("ticker-pulse/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building news http client")?;

        Ok(Self {
            http,
            everything_url,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }
}

#[async_trait]
impl NewsProvider for NewsApiProvider {
    async fn search(&self, query: &NewsQuery) -> FetchResult<Vec<RawArticle>> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(FetchError::MissingApiKey("newsapi"));
        };

        let resp = self
            .http
            .get(self.everything_url.clone())
            .header("X-Api-Key", key)
            .query(&[
                ("q", query.q.clone()),
                ("language", query.language.to_string()),
                ("from", query.from.format(DATE_FORMAT).to_string()),
                ("to", query.to.format(DATE_FORMAT).to_string()),
                ("sortBy", query.sort_by.to_string()),
                ("pageSize", query.page_size.to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        match parse_everything(&body) {
            Err(FetchError::Decode(_)) if !status.is_success() => {
                Err(FetchError::Status(status.as_u16()))
            }
            Ok(_) if !status.is_success() => Err(FetchError::Status(status.as_u16())),
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "newsapi"
    }
}

/// Parse an `everything` payload. `status: "error"` becomes a provider error.
pub fn parse_everything(body: &str) -> FetchResult<Vec<RawArticle>> {
    let resp: Everything = serde_json::from_str(body)?;
    if resp.status != "ok" {
        return Err(FetchError::Provider {
            code: resp.code.unwrap_or_else(|| resp.status.clone()),
            message: resp.message.unwrap_or_default(),
        });
    }

    Ok(resp
        .articles
        .into_iter()
        .map(|a| RawArticle {
            title: a.title,
            description: a.description,
            url: a.url,
            published_at: a.published_at,
        })
        .collect())
}
