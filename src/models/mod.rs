//! Sentiment and organization-extraction collaborators.
//!
//! Both are injected into the graph builder as trait objects so hosted models,
//! offline heuristics and test fakes are interchangeable.

pub mod huggingface;
pub mod lexicon;
pub mod patterns;

pub use huggingface::HuggingFaceClient;
pub use lexicon::LexiconSentimentClassifier;
pub use patterns::PatternEntityExtractor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Sentiment label attached to articles and relation edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Map an upstream model label. Anything unrecognized is neutral.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "positive" | "pos" => Sentiment::Positive,
            "negative" | "neg" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier output: label plus confidence in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub label: Sentiment,
    pub score: f32,
}

impl SentimentScore {
    pub fn new(label: Sentiment, score: f32) -> Self {
        let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        Self { label, score }
    }

    /// Result for absent text
    pub fn neutral() -> Self {
        Self::new(Sentiment::Neutral, 0.0)
    }
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Run the model on non-empty text
    async fn infer(&self, text: &str) -> Result<SentimentScore>;

    /// Classify text; blank text short-circuits to `(neutral, 0.0)` without touching the model
    async fn classify(&self, text: &str) -> Result<SentimentScore> {
        if text.trim().is_empty() {
            return Ok(SentimentScore::neutral());
        }
        self.infer(text).await
    }
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// Raw surface strings of organization mentions, in order of appearance.
    /// Callers normalize and compare.
    async fn extract_organizations(&self, text: &str) -> Result<Vec<String>>;
}

/// Cut text to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClassifier(AtomicUsize);

    #[async_trait]
    impl SentimentClassifier for CountingClassifier {
        async fn infer(&self, _text: &str) -> Result<SentimentScore> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(SentimentScore::new(Sentiment::Positive, 0.9))
        }
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Sentiment::from_label("Positive"), Sentiment::Positive);
        assert_eq!(Sentiment::from_label("NEGATIVE"), Sentiment::Negative);
        assert_eq!(Sentiment::from_label("neutral"), Sentiment::Neutral);
        assert_eq!(Sentiment::from_label("unknown"), Sentiment::Neutral);
        assert_eq!(Sentiment::from_label("LABEL_2"), Sentiment::Neutral);
        assert_eq!(Sentiment::from_label(""), Sentiment::Neutral);
    }

    #[test]
    fn test_sentiment_serde() {
        assert_eq!(serde_json::to_string(&Sentiment::Negative).unwrap(), "\"negative\"");
        let s: Sentiment = serde_json::from_str("\"positive\"").unwrap();
        assert_eq!(s, Sentiment::Positive);
    }

    #[test]
    fn test_score_clamped() {
        assert_eq!(SentimentScore::new(Sentiment::Positive, 1.7).score, 1.0);
        assert_eq!(SentimentScore::new(Sentiment::Positive, -0.2).score, 0.0);
        assert_eq!(SentimentScore::new(Sentiment::Positive, f32::NAN).score, 0.0);
    }

    #[tokio::test]
    async fn test_blank_text_skips_model() {
        let classifier = CountingClassifier(AtomicUsize::new(0));
        let result = classifier.classify("   ").await.unwrap();
        assert_eq!(result, SentimentScore::neutral());
        assert_eq!(classifier.0.load(Ordering::SeqCst), 0);

        let result = classifier.classify("Acme soars").await.unwrap();
        assert_eq!(result.label, Sentiment::Positive);
        assert_eq!(classifier.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 2), "he");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 3), "");
    }
}
