//! Turns one company's articles into related-company candidates.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use super::normalize_name;
use crate::models::{EntityExtractor, Sentiment, SentimentClassifier};
use crate::news::Article;

/// An organization co-mentioned in one article of the current company
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelatedCompany {
    pub name: String,
    pub sentiment: Sentiment,
    pub confidence: f32,
    pub article_index: usize,
    pub article_title: String,
    pub article_url: String,
}

/// Article dropped because a model call failed on it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedArticle {
    pub index: usize,
    pub title: String,
    pub reason: String,
}

/// Output of `RelatedEntityResolver::resolve`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Resolution {
    pub related: Vec<RelatedCompany>,
    pub skipped: Vec<SkippedArticle>,
}

/// Extracts organizations from article text and tags each with the article's sentiment.
///
/// Per article: the analysis text is content, else description; organizations equal
/// (after normalization) to the current company are dropped, as are repeats within
/// the article; the classifier runs once per article that still has candidates.
/// Model failures skip the article. No logging and no capping happen here.
pub struct RelatedEntityResolver {
    extractor: Arc<dyn EntityExtractor>,
    classifier: Arc<dyn SentimentClassifier>,
}

impl RelatedEntityResolver {
    pub fn new(extractor: Arc<dyn EntityExtractor>, classifier: Arc<dyn SentimentClassifier>) -> Self {
        Self {
            extractor,
            classifier,
        }
    }

    pub async fn resolve(&self, articles: &[Article], current_company: &str) -> Resolution {
        let current = normalize_name(current_company);
        let mut resolution = Resolution::default();

        for (index, article) in articles.iter().enumerate() {
            let Some(text) = article.analysis_text() else {
                continue;
            };

            let organizations = match self.extractor.extract_organizations(text).await {
                Ok(orgs) => orgs,
                Err(e) => {
                    resolution.skipped.push(skipped(index, article, e.to_string()));
                    continue;
                }
            };

            let mut seen = HashSet::new();
            let candidates: Vec<String> = organizations
                .into_iter()
                .map(|org| org.trim().to_string())
                .filter(|org| {
                    let key = normalize_name(org);
                    !key.is_empty() && key != current && seen.insert(key)
                })
                .collect();

            if candidates.is_empty() {
                continue;
            }

            let score = match self.classifier.classify(text).await {
                Ok(score) => score,
                Err(e) => {
                    resolution.skipped.push(skipped(index, article, e.to_string()));
                    continue;
                }
            };

            resolution
                .related
                .extend(candidates.into_iter().map(|name| RelatedCompany {
                    name,
                    sentiment: score.label,
                    confidence: score.score,
                    article_index: index,
                    article_title: article.title.clone(),
                    article_url: article.url.clone(),
                }));
        }

        resolution
    }
}

fn skipped(index: usize, article: &Article, reason: String) -> SkippedArticle {
    SkippedArticle {
        index,
        title: article.title.clone(),
        reason,
    }
}
