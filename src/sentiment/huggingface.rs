//! Hosted text-classification model (FinBERT by default) via the Hugging Face
//! inference API.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{SentimentModel, SentimentResult};
use crate::error::{FetchError, FetchResult};

/// Longer inputs are cut before sending; the model only reads ~512 tokens.
const MAX_INPUT_CHARS: usize = 2_000;

#[derive(Serialize)]
struct Req<'a> {
    inputs: &'a str,
    options: ReqOptions,
}

#[derive(Serialize)]
struct ReqOptions {
    wait_for_model: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Resp {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
    Error { error: String },
}

pub struct HuggingFaceModel {
    http: reqwest::Client,
    url: Url,
    token: Option<String>,
}

impl HuggingFaceModel {
    /// `base_url` + `/` + `model`, e.g. `.../hf-inference/models/ProsusAI/finbert`.
    pub fn new(
        base_url: &str,
        model: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let url = Url::parse(&format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            model.trim_matches('/')
        ))
        .with_context(|| format!("invalid sentiment model url: {base_url} / {model}"))?;

        let http = reqwest::Client::builder()
            .user_agent("ticker-pulse/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building sentiment http client")?;

        Ok(Self {
            http,
            url,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    async fn classify_impl(&self, text: &str) -> FetchResult<SentimentResult> {
        let Some(token) = self.token.as_deref() else {
            return Err(FetchError::MissingApiKey("huggingface"));
        };

        let input = truncate_chars(text, MAX_INPUT_CHARS);
        let resp = self
            .http
            .post(self.url.clone())
            .bearer_auth(token)
            .json(&Req {
                inputs: input,
                options: ReqOptions {
                    wait_for_model: true,
                },
            })
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        match parse_classification(&body) {
            Err(FetchError::Decode(_)) if !status.is_success() => {
                Err(FetchError::Status(status.as_u16()))
            }
            Ok(_) if !status.is_success() => Err(FetchError::Status(status.as_u16())),
            other => other,
        }
    }
}

impl SentimentModel for HuggingFaceModel {
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<SentimentResult>> + Send + 'a>> {
        Box::pin(self.classify_impl(text))
    }

    fn model_name(&self) -> &str {
        "huggingface"
    }
}

/// Reduce a classification payload to its top-scoring label.
pub fn parse_classification(body: &str) -> FetchResult<SentimentResult> {
    let labels = match serde_json::from_str::<Resp>(body)? {
        Resp::Nested(outer) => outer.into_iter().next().unwrap_or_default(),
        Resp::Flat(v) => v,
        Resp::Error { error } => {
            return Err(FetchError::Provider {
                code: "huggingface".to_string(),
                message: error,
            })
        }
    };

    let top = labels
        .into_iter()
        .filter(|l| l.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| FetchError::Provider {
            code: "huggingface".to_string(),
            message: "empty classification".to_string(),
        })?;

    Ok(SentimentResult {
        label: top.label.to_lowercase(),
        score: top.score.clamp(0.0, 1.0),
    })
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
