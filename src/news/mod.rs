//! News retrieval: article model, the `NewsSource` seam, and text filters.

pub mod cache;
pub mod newsapi;

pub use cache::{ArticleCache, CachedNewsSource};
pub use newsapi::NewsApiClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;

/// Title used when the upstream record has none
pub const UNTITLED: &str = "No title";

/// A news article as returned by a `NewsSource`. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_name: Option<String>,
}

impl Article {
    /// Text fed to entity extraction: content first, then description.
    /// Returns None when both are absent or blank.
    pub fn analysis_text(&self) -> Option<&str> {
        first_non_blank(&[self.content.as_deref(), self.description.as_deref()])
    }

    /// Text shown and scored in the sentiment report: description first, then content.
    pub fn report_text(&self) -> Option<&str> {
        first_non_blank(&[self.description.as_deref(), self.content.as_deref()])
    }
}

fn first_non_blank<'a>(fields: &[Option<&'a str>]) -> Option<&'a str> {
    fields
        .iter()
        .flatten()
        .copied()
        .find(|s| !s.trim().is_empty())
}

/// Source of recent articles about a company.
///
/// Implementations return `NewsgraphError::UpstreamFetch` on non-success responses;
/// callers decide whether that degrades to an empty list.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self, company: &str) -> Result<Vec<Article>>;
}

/// Drop repeated articles (same url, or same title ignoring case), keeping the first.
pub fn dedup_articles(articles: Vec<Article>) -> Vec<Article> {
    let mut seen_urls = HashSet::new();
    let mut seen_titles = HashSet::new();
    articles
        .into_iter()
        .filter(|a| {
            let url_new = a.url.is_empty() || seen_urls.insert(a.url.clone());
            let title_key = a.title.trim().to_lowercase();
            let title_new = title_key == UNTITLED.to_lowercase() || seen_titles.insert(title_key);
            url_new && title_new
        })
        .collect()
}

/// True when the company name occurs as a whole word (case-insensitive)
/// anywhere in the title, description or content.
pub fn is_article_relevant(article: &Article, company: &str) -> bool {
    let company = company.trim();
    if company.is_empty() {
        return false;
    }
    let pattern = format!(r"(^|\W){}($|\W)", regex::escape(company));
    let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() else {
        return false;
    };
    [
        Some(article.title.as_str()),
        article.description.as_deref(),
        article.content.as_deref(),
    ]
    .iter()
    .flatten()
    .any(|field| re.is_match(field))
}

#[cfg(test)]
pub(crate) fn test_article(title: &str, content: Option<&str>, description: Option<&str>) -> Article {
    Article {
        title: title.to_string(),
        description: description.map(str::to_string),
        content: content.map(str::to_string),
        url: format!("https://news.example/{}", title.to_lowercase().replace(' ', "-")),
        published_at: DateTime::parse_from_rfc3339("2026-10-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc),
        source_name: Some("Example Wire".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_text_prefers_content() {
        let a = test_article("t", Some("body"), Some("summary"));
        assert_eq!(a.analysis_text(), Some("body"));
        assert_eq!(a.report_text(), Some("summary"));
    }

    #[test]
    fn test_analysis_text_falls_back_on_blank() {
        let a = test_article("t", Some("   "), Some("summary"));
        assert_eq!(a.analysis_text(), Some("summary"));
        let a = test_article("t", None, None);
        assert_eq!(a.analysis_text(), None);
        assert_eq!(a.report_text(), None);
    }

    #[test]
    fn test_dedup_by_url_and_title() {
        let a = test_article("Acme rises", Some("x"), None);
        let mut b = test_article("ACME RISES", Some("y"), None);
        b.url = "https://other.example/1".to_string();
        let c = test_article("Globex falls", Some("z"), None);
        let d = c.clone();
        let out = dedup_articles(vec![a.clone(), b, c.clone(), d]);
        assert_eq!(out, vec![a, c]);
    }

    #[test]
    fn test_dedup_keeps_untitled_articles() {
        let mut a = test_article(UNTITLED, Some("x"), None);
        a.url = "https://a.example".to_string();
        let mut b = test_article(UNTITLED, Some("y"), None);
        b.url = "https://b.example".to_string();
        assert_eq!(dedup_articles(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_relevance_whole_word() {
        let a = test_article("Apple Inc. beats estimates", None, None);
        assert!(is_article_relevant(&a, "apple"));
        assert!(is_article_relevant(&a, "Apple Inc"));
        let b = test_article("Pineapple prices soar", None, None);
        assert!(!is_article_relevant(&b, "Apple"));
    }

    #[test]
    fn test_relevance_checks_all_fields() {
        let a = test_article("Markets today", None, Some("Shares of Tesla slid"));
        assert!(is_article_relevant(&a, "tesla"));
        assert!(!is_article_relevant(&a, "   "));
    }

    #[test]
    fn test_relevance_escapes_regex() {
        let a = test_article("AT&T (T) expands fiber", None, None);
        assert!(is_article_relevant(&a, "AT&T"));
        assert!(is_article_relevant(&a, "(T)"));
    }
}
