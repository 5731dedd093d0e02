//! Sentiment of the fetched news, classified once over all articles together.

pub mod huggingface;
pub mod lexicon;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, SentimentBackend};
use crate::error::{FetchError, FetchResult};
use crate::news::NewsItem;

pub use huggingface::HuggingFaceModel;
pub use lexicon::LexiconModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: String,
    /// Confidence in [0, 1].
    pub score: f64,
}

impl SentimentResult {
    /// Placeholder used when there is nothing to classify or the model failed.
    pub fn neutral() -> Self {
        Self {
            label: "neutral".to_string(),
            score: 0.5,
        }
    }
}

impl Default for SentimentResult {
    fn default() -> Self {
        Self::neutral()
    }
}

/// A text-classification model runtime.
pub trait SentimentModel: Send + Sync {
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<SentimentResult>> + Send + 'a>>;
    /// Backend name for logs.
    fn model_name(&self) -> &str;
}

pub type DynSentimentModel = Arc<dyn SentimentModel>;

/// Always fails; the caller falls back to neutral.
pub struct DisabledModel;

impl SentimentModel for DisabledModel {
    fn classify<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<SentimentResult>> + Send + 'a>> {
        Box::pin(async { Err(FetchError::Disabled) })
    }

    fn model_name(&self) -> &str {
        "disabled"
    }
}

/// Build the configured backend.
pub fn build_model_from_config(cfg: &AppConfig) -> anyhow::Result<DynSentimentModel> {
    let model: DynSentimentModel = match cfg.sentiment_backend() {
        SentimentBackend::HuggingFace => Arc::new(HuggingFaceModel::new(
            &cfg.hf_base_url,
            &cfg.sentiment_model,
            cfg.hf_api_token.clone(),
            cfg.http_timeout(),
        )?),
        SentimentBackend::Lexicon => Arc::new(LexiconModel::new()),
        SentimentBackend::Disabled => Arc::new(DisabledModel),
    };
    Ok(model)
}

/// `"{title} {description}"` per article, space-joined.
pub fn news_text(items: &[NewsItem]) -> String {
    items
        .iter()
        .map(|a| format!("{} {}", a.title, a.description))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classify all articles as one text. No articles means neutral without a
/// model call.
pub async fn classify_news(
    model: &dyn SentimentModel,
    items: &[NewsItem],
) -> FetchResult<SentimentResult> {
    if items.is_empty() {
        return Ok(SentimentResult::neutral());
    }
    let text = news_text(items);
    model.classify(&text).await
}
