//! Offline sentiment classifier over a small financial-news lexicon.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;

use super::{Sentiment, SentimentClassifier, SentimentScore};
use crate::error::Result;

const POSITIVE_TERMS: &[&str] = &[
    "gain", "gains", "beat", "beats", "surge", "surges", "soar", "soars", "rally", "rallies",
    "record", "growth", "grows", "profit", "profits", "upgrade", "upgraded", "outperform",
    "bullish", "partnership", "partners", "expands", "expansion", "breakthrough", "strong",
    "raises", "rises", "rise", "wins", "boost", "boosts", "approval", "approved",
];

const NEGATIVE_TERMS: &[&str] = &[
    "loss", "losses", "miss", "misses", "plunge", "plunges", "slump", "slumps", "fall", "falls",
    "drop", "drops", "decline", "declines", "downgrade", "downgraded", "bearish", "lawsuit",
    "sued", "fraud", "probe", "investigation", "layoffs", "cuts", "weak", "recall", "breach",
    "bankruptcy", "fine", "fined", "crash", "warning", "slides", "slid",
];

/// Ties (including no lexicon hits) are neutral with this confidence
const TIE_SCORE: f32 = 0.5;

/// Word-count lexicon classifier: label by the larger of positive and negative
/// hits, confidence is the winning share of all hits.
pub struct LexiconSentimentClassifier {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    word: Regex,
}

impl LexiconSentimentClassifier {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_TERMS.iter().copied().collect(),
            negative: NEGATIVE_TERMS.iter().copied().collect(),
            word: Regex::new(r"[a-z]+(?:-[a-z]+)*").expect("static regex"),
        }
    }

    pub fn score_text(&self, text: &str) -> SentimentScore {
        let lowered = text.to_lowercase();
        let (mut pos, mut neg) = (0usize, 0usize);
        for m in self.word.find_iter(&lowered) {
            let w = m.as_str();
            if self.positive.contains(w) {
                pos += 1;
            } else if self.negative.contains(w) {
                neg += 1;
            }
        }

        let total = (pos + neg) as f32;
        if pos > neg {
            SentimentScore::new(Sentiment::Positive, pos as f32 / total)
        } else if neg > pos {
            SentimentScore::new(Sentiment::Negative, neg as f32 / total)
        } else {
            SentimentScore::new(Sentiment::Neutral, TIE_SCORE)
        }
    }
}

impl Default for LexiconSentimentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentClassifier for LexiconSentimentClassifier {
    async fn infer(&self, text: &str) -> Result<SentimentScore> {
        Ok(self.score_text(text))
    }
}
