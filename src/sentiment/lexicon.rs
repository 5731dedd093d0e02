//! Offline lexicon classifier, used when no hosted model is configured.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use super::{SentimentModel, SentimentResult};
use crate::error::FetchResult;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Default)]
pub struct LexiconModel;

impl LexiconModel {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count).
    /// Negation: a negator within the previous 1..=3 tokens flips the word's sign.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }

    /// Label by sign; confidence grows with |score| and stays in [0.5, 1).
    pub fn label_text(&self, text: &str) -> SentimentResult {
        let (score, _) = self.score_text(text);
        let label = match score.signum() {
            1 => "positive",
            -1 => "negative",
            _ => "neutral",
        };
        let magnitude = score.unsigned_abs() as f64;
        let confidence = 0.5 + 0.5 * magnitude / (magnitude + 3.0);
        SentimentResult {
            label: label.to_string(),
            score: (confidence * 10_000.0).round() / 10_000.0,
        }
    }
}

impl SentimentModel for LexiconModel {
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<SentimentResult>> + Send + 'a>> {
        let out = self.label_text(text);
        Box::pin(async move { Ok(out) })
    }

    fn model_name(&self) -> &str {
        "lexicon"
    }
}

/// Lower-case alphanumeric tokens; apostrophes stay inside words ("isn't").
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "without"
            | "didn't"
            | "doesn't"
            | "fails"
            | "failed"
    )
}
