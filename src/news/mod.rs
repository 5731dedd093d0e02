//! # News
//! Recent articles about a company, filtered down to entries that carry both a
//! title and a description.

pub mod newsapi;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::TtlCache;
use crate::error::FetchResult;

pub use newsapi::NewsApiProvider;

/// Most articles requested per search.
pub const PAGE_SIZE: u32 = 3;

/// Placeholder NewsAPI puts in place of withdrawn content.
const REMOVED_MARKER: &str = "[Removed]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "publishedAt")]
    pub published_at: String,
}

/// Article as delivered by a provider, before filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
}

/// Search parameters for one company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub q: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub language: &'static str,
    pub sort_by: &'static str,
    pub page_size: u32,
}

impl NewsQuery {
    /// Relevance-sorted English articles from the last day.
    pub fn for_company(ticker: &str, company: &str, today: NaiveDate) -> Self {
        let from = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        Self {
            q: search_terms(ticker, company),
            from,
            to: today,
            language: "en",
            sort_by: "relevancy",
            page_size: PAGE_SIZE,
        }
    }
}

/// `(company OR ticker) AND (stock OR market)`
pub fn search_terms(ticker: &str, company: &str) -> String {
    format!("({company} OR {ticker}) AND (stock OR market)")
}

#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn search(&self, query: &NewsQuery) -> FetchResult<Vec<RawArticle>>;
    fn name(&self) -> &'static str;
}

/// Normalize article text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    let stripped = re_tags.replace_all(&decoded, "");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&stripped, " ").trim().to_string()
}

fn usable(field: Option<&str>) -> Option<String> {
    let text = normalize_text(field?);
    if text.is_empty() || text == REMOVED_MARKER {
        return None;
    }
    Some(text)
}

/// Keep articles that have both a title and a description.
pub fn keep_complete(raw: Vec<RawArticle>) -> Vec<NewsItem> {
    raw.into_iter()
        .filter_map(|a| {
            let title = usable(a.title.as_deref())?;
            let description = usable(a.description.as_deref())?;
            Some(NewsItem {
                title,
                description,
                url: a.url.unwrap_or_default(),
                published_at: a.published_at.unwrap_or_default(),
            })
        })
        .collect()
}

/// News fetcher with a time-windowed cache keyed by (ticker, company).
pub struct NewsService {
    provider: Arc<dyn NewsProvider>,
    cache: TtlCache<(String, String), Vec<NewsItem>>,
}

impl NewsService {
    pub fn new(provider: Arc<dyn NewsProvider>, capacity: usize, ttl: Duration) -> Self {
        Self {
            provider,
            cache: TtlCache::new("news", capacity, ttl),
        }
    }

    pub async fn articles(&self, ticker: &str, company: &str) -> FetchResult<Vec<NewsItem>> {
        let key = (ticker.to_string(), company.to_string());
        if let Some(hit) = self.cache.get(&key) {
            debug!(ticker, "news cache hit");
            return Ok(hit);
        }

        let today = chrono::Utc::now().date_naive();
        let query = NewsQuery::for_company(ticker, company, today);
        let raw = self.provider.search(&query).await?;
        let items = keep_complete(raw);
        self.cache.insert(key, items.clone());
        Ok(items)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn cache(&self) -> &TtlCache<(String, String), Vec<NewsItem>> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: Option<&str>, description: Option<&str>) -> RawArticle {
        RawArticle {
            title: title.map(String::from),
            description: description.map(String::from),
            url: Some("https://example.com/a".into()),
            published_at: Some("2024-05-01T12:00:00Z".into()),
        }
    }

    #[test]
    fn query_is_disjunctive_and_covers_last_day() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let q = NewsQuery::for_company("AAPL", "Apple Inc.", today);
        assert_eq!(q.q, "(Apple Inc. OR AAPL) AND (stock OR market)");
        assert_eq!(q.from, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(q.to, today);
        assert_eq!(q.sort_by, "relevancy");
        assert_eq!(q.page_size, 3);
        assert_eq!(q.language, "en");
    }

    #[test]
    fn drops_items_missing_title_or_description() {
        let items = keep_complete(vec![
            raw(Some("Apple beats"), Some("Strong quarter")),
            raw(None, Some("no title")),
            raw(Some("no description"), None),
            raw(Some(""), Some("blank title")),
            raw(Some("blank description"), Some("   ")),
            raw(Some("[Removed]"), Some("[Removed]")),
        ]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Apple beats");
        assert_eq!(items[0].published_at, "2024-05-01T12:00:00Z");
    }

    #[test]
    fn missing_url_and_date_become_empty_strings() {
        let items = keep_complete(vec![RawArticle {
            title: Some("t".into()),
            description: Some("d".into()),
            ..Default::default()
        }]);
        assert_eq!(items[0].url, "");
        assert_eq!(items[0].published_at, "");
    }

    #[test]
    fn normalize_strips_markup_and_entities() {
        assert_eq!(
            normalize_text("  <p>Apple&nbsp;&amp; Co.</p>\n <b>rally</b> "),
            "Apple & Co. rally"
        );
        assert_eq!(normalize_text("<br/>"), "");
    }

    #[test]
    fn news_item_serializes_published_at_in_camel_case() {
        let item = NewsItem {
            title: "t".into(),
            description: "d".into(),
            url: "u".into(),
            published_at: "p".into(),
        };
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["publishedAt"], "p");
        assert!(v.get("published_at").is_none());
    }
}
