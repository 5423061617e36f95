//! In-memory collaborators shared by unit tests.
//!
//! Article text uses a tiny convention: sentiment markers (`[neg]`, `[neu]`,
//! `[unk]`) anywhere before `orgs:`, then a comma-separated organization list.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{NewsgraphError, Result};
use crate::graph::{normalize_name, GraphExpander, NoopObserver, RelatedEntityResolver};
use crate::models::{EntityExtractor, Sentiment, SentimentClassifier, SentimentScore};
use crate::news::{test_article, Article, NewsSource};

#[derive(Default)]
pub(crate) struct FakeNewsSource {
    articles: HashMap<String, Vec<Article>>,
    failing: HashSet<String>,
    fail_all: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeNewsSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// One article per text, titled `<company> #<i>`
    pub(crate) fn with_company(mut self, company: &str, texts: &[&str]) -> Self {
        let articles = texts
            .iter()
            .enumerate()
            .map(|(i, text)| test_article(&format!("{} #{}", company, i), Some(text), None))
            .collect();
        self.articles.insert(normalize_name(company), articles);
        self
    }

    pub(crate) fn with_articles(mut self, company: &str, articles: Vec<Article>) -> Self {
        self.articles.insert(normalize_name(company), articles);
        self
    }

    pub(crate) fn failing(mut self, company: &str) -> Self {
        self.failing.insert(normalize_name(company));
        self
    }

    pub(crate) fn failing_all(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Normalized names in call order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, company: &str) -> usize {
        let key = normalize_name(company);
        self.calls.lock().unwrap().iter().filter(|c| **c == key).count()
    }
}

#[async_trait]
impl NewsSource for FakeNewsSource {
    async fn fetch(&self, company: &str) -> Result<Vec<Article>> {
        let key = normalize_name(company);
        self.calls.lock().unwrap().push(key.clone());
        if self.fail_all || self.failing.contains(&key) {
            return Err(NewsgraphError::UpstreamFetch(
                "NewsAPI error 401 Unauthorized: apiKeyInvalid".to_string(),
            ));
        }
        Ok(self.articles.get(&key).cloned().unwrap_or_default())
    }
}

/// Organizations listed after `orgs:`; text containing `boom` fails
pub(crate) struct ListExtractor;

#[async_trait]
impl EntityExtractor for ListExtractor {
    async fn extract_organizations(&self, text: &str) -> Result<Vec<String>> {
        if text.contains("boom") {
            return Err(NewsgraphError::ModelInference("extractor crashed".to_string()));
        }
        Ok(text
            .split("orgs:")
            .nth(1)
            .map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Emits raw labels from markers and maps them like a hosted model would
pub(crate) struct MarkerClassifier;

#[async_trait]
impl SentimentClassifier for MarkerClassifier {
    async fn infer(&self, text: &str) -> Result<SentimentScore> {
        let raw = if text.contains("[neg]") {
            "Negative"
        } else if text.contains("[neu]") {
            "Neutral"
        } else if text.contains("[unk]") {
            "unknown"
        } else {
            "Positive"
        };
        Ok(SentimentScore::new(Sentiment::from_label(raw), 0.9))
    }
}

pub(crate) fn test_expander(news: Arc<FakeNewsSource>) -> GraphExpander {
    let resolver = RelatedEntityResolver::new(Arc::new(ListExtractor), Arc::new(MarkerClassifier));
    GraphExpander::new(news, resolver).with_observer(Arc::new(NoopObserver))
}
