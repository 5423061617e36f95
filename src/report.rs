//! Per-article sentiment report for a single company.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{NewsgraphError, Result};
use crate::models::{Sentiment, SentimentClassifier};
use crate::news::{is_article_relevant, NewsSource};

/// Hint shown when no fetched article mentions the company
pub const NO_RELEVANT_HINT: &str = "No highly relevant articles found. Try a broader name like 'Apple Inc'.";

/// Placeholder for articles without description or content
pub const NO_DESCRIPTION: &str = "No description available.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    /// Position among the relevant articles
    pub index: usize,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub sentiment: Sentiment,
    pub confidence: f32,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl SentimentCounts {
    fn add(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentReport {
    pub company: String,
    /// Articles returned by the news source before filtering
    pub fetched: usize,
    /// The news fetch failed and was treated as no articles
    pub fetch_failed: bool,
    pub entries: Vec<ReportEntry>,
    pub counts: SentimentCounts,
    /// Relevant articles dropped because classification failed
    pub skipped: usize,
}

impl SentimentReport {
    /// No relevant article survived
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetch, filter to articles that actually mention `company`, and classify each.
///
/// Only a blank company name is an error; a failed fetch or classifier call
/// degrades the report instead of aborting it.
pub async fn build_report(
    news: &dyn NewsSource,
    classifier: &dyn SentimentClassifier,
    company: &str,
) -> Result<SentimentReport> {
    let company = company.trim();
    if company.is_empty() {
        return Err(NewsgraphError::EmptyInput);
    }

    let (articles, fetch_failed) = match news.fetch(company).await {
        Ok(articles) => (articles, false),
        Err(e) => {
            log::warn!("Failed to fetch news for {}: {}. Check your API key or quota.", company, e);
            (Vec::new(), true)
        }
    };
    let fetched = articles.len();

    let mut entries = Vec::new();
    let mut counts = SentimentCounts::default();
    let mut skipped = 0;

    for article in articles.iter().filter(|a| is_article_relevant(a, company)) {
        let text = article.report_text().unwrap_or_default();
        let score = match classifier.classify(text).await {
            Ok(score) => score,
            Err(e) => {
                log::warn!("Skipping \"{}\": {}", article.title, e);
                skipped += 1;
                continue;
            }
        };
        counts.add(score.label);
        entries.push(ReportEntry {
            index: entries.len(),
            title: article.title.clone(),
            url: article.url.clone(),
            published_at: article.published_at,
            sentiment: score.label,
            confidence: score.score,
            text: if text.trim().is_empty() {
                NO_DESCRIPTION.to_string()
            } else {
                text.to_string()
            },
        });
    }

    log::info!(
        "Report for {}: {} fetched, {} relevant ({} positive, {} negative, {} neutral)",
        company,
        fetched,
        entries.len(),
        counts.positive,
        counts.negative,
        counts.neutral
    );

    Ok(SentimentReport {
        company: company.to_string(),
        fetched,
        fetch_failed,
        entries,
        counts,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::test_article;
    use crate::testing::{FakeNewsSource, MarkerClassifier};

    #[tokio::test]
    async fn test_report_filters_and_counts() {
        let news = FakeNewsSource::new().with_articles(
            "Acme",
            vec![
                test_article("Acme beats estimates", None, Some("Acme profit up")),
                test_article("Markets today", Some("Nothing about the company"), None),
                test_article("Supplier news", Some("[neg] acme loses contract"), None),
                test_article("Acmeville fair", Some("[neu] local fair"), None),
                test_article("Acme files", Some("[neu] quarterly filing"), None),
            ],
        );
        let report = build_report(&news, &MarkerClassifier, " Acme ").await.unwrap();

        assert_eq!(report.company, "Acme");
        assert_eq!(report.fetched, 5);
        assert!(!report.fetch_failed);
        let titles: Vec<&str> = report.entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Acme beats estimates", "Supplier news", "Acme files"]);
        assert_eq!(report.entries[2].index, 2);
        assert_eq!(
            report.counts,
            SentimentCounts { positive: 1, negative: 1, neutral: 1 }
        );
    }

    #[tokio::test]
    async fn test_report_prefers_description() {
        let news = FakeNewsSource::new().with_articles(
            "Acme",
            vec![test_article("Acme", Some("[neg] content"), Some("description"))],
        );
        let report = build_report(&news, &MarkerClassifier, "Acme").await.unwrap();
        assert_eq!(report.entries[0].text, "description");
        assert_eq!(report.entries[0].sentiment, Sentiment::Positive);
    }

    #[tokio::test]
    async fn test_report_without_text_is_neutral() {
        let news = FakeNewsSource::new().with_articles("Acme", vec![test_article("Acme update", None, None)]);
        let report = build_report(&news, &MarkerClassifier, "Acme").await.unwrap();
        assert_eq!(report.entries[0].sentiment, Sentiment::Neutral);
        assert_eq!(report.entries[0].confidence, 0.0);
        assert_eq!(report.entries[0].text, NO_DESCRIPTION);
    }

    #[tokio::test]
    async fn test_report_fetch_failure_is_empty() {
        let news = FakeNewsSource::new().failing("Acme");
        let report = build_report(&news, &MarkerClassifier, "Acme").await.unwrap();
        assert!(report.fetch_failed);
        assert!(report.is_empty());
        assert_eq!(report.fetched, 0);
    }

    #[tokio::test]
    async fn test_report_blank_company() {
        let news = FakeNewsSource::new();
        let result = build_report(&news, &MarkerClassifier, "  ").await;
        assert!(matches!(result, Err(NewsgraphError::EmptyInput)));
        assert!(news.calls().is_empty());
    }
}
