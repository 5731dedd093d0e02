//! Provider-level failures.
//!
//! Fetchers and classifiers return these instead of swallowing errors; the HTTP
//! layer decides how each one degrades (404, empty list, neutral sentiment).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider answered with HTTP {0}")]
    Status(u16),

    #[error("provider error {code}: {message}")]
    Provider { code: String, message: String },

    #[error("could not decode provider payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not enough data points (got {got}, need at least 2)")]
    NotEnoughData { got: usize },

    #[error("missing API key for {0}")]
    MissingApiKey(&'static str),

    #[error("provider disabled")]
    Disabled,
}

impl FetchError {
    /// True when the provider answered but had nothing usable for the request.
    pub fn is_no_data(&self) -> bool {
        matches!(self, FetchError::NotEnoughData { .. })
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
