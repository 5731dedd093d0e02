// src/config/app.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tracing::info;

pub const ENV_CONFIG_PATH: &str = "APP_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

pub const DEFAULT_MARKET_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_NEWS_BASE_URL: &str = "https://newsapi.org";
pub const DEFAULT_HF_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";
pub const DEFAULT_SENTIMENT_MODEL: &str = "ProsusAI/finbert";

/// Which sentiment model runtime backs the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentBackend {
    #[serde(rename = "huggingface")]
    HuggingFace,
    Lexicon,
    Disabled,
}

impl FromStr for SentimentBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hf" | "finbert" => Ok(Self::HuggingFace),
            "lexicon" | "local" => Ok(Self::Lexicon),
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            other => bail!("unsupported sentiment backend: {other}"),
        }
    }
}

/// Runtime configuration.
///
/// Sources, later wins: built-in defaults, TOML file (`$APP_CONFIG_PATH` or
/// `config/app.toml`), environment variables. Secret fields set to `"ENV"` in
/// the file must be present in the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub news_api_key: Option<String>,
    pub hf_api_token: Option<String>,
    /// `None` picks Hugging Face when a token is present, else the lexicon.
    pub sentiment_backend: Option<SentimentBackend>,
    pub sentiment_model: String,

    pub market_base_url: String,
    pub news_base_url: String,
    pub hf_base_url: String,

    pub market_cache_capacity: usize,
    pub market_cache_ttl_secs: u64,
    pub news_cache_capacity: usize,
    pub news_cache_ttl_secs: u64,

    pub http_timeout_secs: u64,
    pub static_dir: String,
    /// Expose `/metrics` in Prometheus format.
    pub metrics_route: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            news_api_key: None,
            hf_api_token: None,
            sentiment_backend: None,
            sentiment_model: DEFAULT_SENTIMENT_MODEL.to_string(),
            market_base_url: DEFAULT_MARKET_BASE_URL.to_string(),
            news_base_url: DEFAULT_NEWS_BASE_URL.to_string(),
            hf_base_url: DEFAULT_HF_BASE_URL.to_string(),
            market_cache_capacity: 100,
            market_cache_ttl_secs: 300,
            news_cache_capacity: 50,
            news_cache_ttl_secs: 900,
            http_timeout_secs: 10,
            static_dir: "static".to_string(),
            metrics_route: true,
        }
    }
}

impl AppConfig {
    /// Load using env var + fallbacks:
    /// 1) $APP_CONFIG_PATH (must exist)
    /// 2) config/app.toml (optional)
    /// 3) defaults
    ///
    /// Environment overrides are applied last.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::load_from_file(DEFAULT_CONFIG_PATH)?
        } else {
            Self::default()
        };

        cfg.apply_env_overrides()?;
        info!(
            sentiment = ?cfg.sentiment_backend(),
            news_key = cfg.news_api_key.is_some(),
            market_ttl = cfg.market_cache_ttl_secs,
            news_ttl = cfg.news_cache_ttl_secs,
            "config loaded"
        );
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg: AppConfig =
            toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;

        cfg.news_api_key = resolve_secret(cfg.news_api_key.take(), "NEWS_API_KEY")?;
        cfg.hf_api_token = resolve_secret(cfg.hf_api_token.take(), "HF_API_TOKEN")?;
        Ok(cfg)
    }

    /// Apply environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_nonempty("NEWS_API_KEY") {
            self.news_api_key = Some(v);
        }
        if let Some(v) = env_nonempty("HF_API_TOKEN") {
            self.hf_api_token = Some(v);
        }
        if let Some(v) = env_nonempty("SENTIMENT_BACKEND") {
            self.sentiment_backend = Some(v.parse()?);
        }
        if let Some(v) = env_nonempty("SENTIMENT_MODEL") {
            self.sentiment_model = v;
        }
        if let Some(v) = env_nonempty("MARKET_BASE_URL") {
            self.market_base_url = v;
        }
        if let Some(v) = env_nonempty("NEWS_BASE_URL") {
            self.news_base_url = v;
        }
        if let Some(v) = env_nonempty("HF_BASE_URL") {
            self.hf_base_url = v;
        }
        if let Some(v) = env_parse("MARKET_CACHE_CAPACITY")? {
            self.market_cache_capacity = v;
        }
        if let Some(v) = env_parse("MARKET_CACHE_TTL_SECS")? {
            self.market_cache_ttl_secs = v;
        }
        if let Some(v) = env_parse("NEWS_CACHE_CAPACITY")? {
            self.news_cache_capacity = v;
        }
        if let Some(v) = env_parse("NEWS_CACHE_TTL_SECS")? {
            self.news_cache_ttl_secs = v;
        }
        if let Some(v) = env_parse("HTTP_TIMEOUT_SECS")? {
            self.http_timeout_secs = v;
        }
        if let Some(v) = env_nonempty("STATIC_DIR") {
            self.static_dir = v;
        }
        if let Some(v) = env_nonempty("METRICS_ROUTE") {
            self.metrics_route = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn sentiment_backend(&self) -> SentimentBackend {
        match self.sentiment_backend {
            Some(b) => b,
            None if self.hf_api_token.is_some() => SentimentBackend::HuggingFace,
            None => SentimentBackend::Lexicon,
        }
    }

    pub fn market_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.market_cache_ttl_secs)
    }

    pub fn news_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.news_cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

/// `"ENV"` means: read from the named environment variable. Blank means unset.
fn resolve_secret(raw: Option<String>, var: &str) -> Result<Option<String>> {
    match raw {
        Some(v) if v.trim().eq_ignore_ascii_case("env") => env_nonempty(var)
            .map(Some)
            .ok_or_else(|| anyhow!("Missing {var} env var")),
        Some(v) if v.trim().is_empty() => Ok(None),
        other => Ok(other),
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_nonempty(name) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("invalid {name}={v}: {e}")),
        None => Ok(None),
    }
}
