use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{dedup_articles, Article, NewsSource, UNTITLED};
use crate::config::{NewsConfig, MAX_PAGE_SIZE};
use crate::error::{NewsgraphError, Result};
use crate::retry::{backoff_delay, is_retryable_status};

/// Placeholder NewsAPI returns for articles pulled by the publisher
const REMOVED_MARKER: &str = "[Removed]";

/// Response envelope of `/v2/everything`
#[derive(Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    source: Option<RawSource>,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct RawSource {
    name: Option<String>,
}

/// NewsAPI `everything` search client
///
/// Queries a trailing window of days, newest first, one page per company.
/// Retries rate limits and server errors with exponential backoff.
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
    window_days: i64,
    page_size: usize,
    language: String,
    query_keywords: Vec<String>,
    max_retries: usize,
}

impl NewsApiClient {
    /// Create a new client from the `[news]` config section
    pub fn new(api_key: String, config: &NewsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NewsgraphError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.clone(),
            window_days: config.window_days,
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
            language: config.language.clone(),
            query_keywords: config.query_keywords.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Build the search expression: `"<company>" AND (kw1 OR kw2 ...)`
    pub fn build_query(&self, company: &str) -> String {
        build_query(company, &self.query_keywords)
    }

    /// Full request URL for a company as of `now` (API key goes in a header, not here)
    pub fn request_url(&self, company: &str, now: DateTime<Utc>) -> Result<Url> {
        let (from, to) = date_window(now, self.window_days);
        Url::parse_with_params(
            &self.base_url,
            &[
                ("q", self.build_query(company)),
                ("from", from.format("%Y-%m-%d").to_string()),
                ("to", to.format("%Y-%m-%d").to_string()),
                ("language", self.language.clone()),
                ("sortBy", "publishedAt".to_string()),
                ("pageSize", self.page_size.to_string()),
            ],
        )
        .map_err(|e| NewsgraphError::Config(format!("Invalid news base_url {}: {}", self.base_url, e)))
    }

    /// Single request, no retry
    async fn fetch_once(&self, url: &Url) -> Result<Vec<Article>> {
        let response = self
            .client
            .get(url.clone())
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| NewsgraphError::UpstreamFetch(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(NewsgraphError::UpstreamFetch(format!(
                "NewsAPI error {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| NewsgraphError::UpstreamFetch(format!("Failed to read response: {}", e)))?;
        parse_everything_response(&body)
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn fetch(&self, company: &str) -> Result<Vec<Article>> {
        let url = self.request_url(company, Utc::now())?;
        let start = std::time::Instant::now();
        let mut attempt = 0;

        loop {
            match self.fetch_once(&url).await {
                Ok(articles) => {
                    log::debug!(
                        "NewsAPI returned {} articles for {} in {:?} (attempt {})",
                        articles.len(),
                        company,
                        start.elapsed(),
                        attempt + 1
                    );
                    return Ok(articles);
                }
                Err(e) if attempt < self.max_retries && is_retryable_error(&e) => {
                    let delay = backoff_delay(attempt);
                    log::warn!(
                        "Retry {}/{} for {} in {:?} after error: {}",
                        attempt + 1,
                        self.max_retries,
                        company,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Network failures and retryable statuses; the status is embedded in the message
fn is_retryable_error(err: &NewsgraphError) -> bool {
    match err {
        NewsgraphError::UpstreamFetch(msg) => {
            if msg.starts_with("Network error") {
                return true;
            }
            msg.strip_prefix("NewsAPI error ")
                .and_then(|rest| rest.get(..3))
                .and_then(|code| code.parse::<u16>().ok())
                .and_then(|code| reqwest::StatusCode::from_u16(code).ok())
                .map(is_retryable_status)
                .unwrap_or(false)
        }
        _ => false,
    }
}

pub(crate) fn build_query(company: &str, keywords: &[String]) -> String {
    let company = company.trim().replace('"', "");
    if keywords.is_empty() {
        return format!("\"{}\"", company);
    }
    format!("\"{}\" AND ({})", company, keywords.join(" OR "))
}

pub(crate) fn date_window(now: DateTime<Utc>, window_days: i64) -> (NaiveDate, NaiveDate) {
    let to = now.date_naive();
    let from = (now - ChronoDuration::days(window_days)).date_naive();
    (from, to)
}

/// Decode a `/v2/everything` body into articles, dropping removed, timestamp-less
/// and duplicate records.
pub(crate) fn parse_everything_response(body: &str) -> Result<Vec<Article>> {
    let response: EverythingResponse = serde_json::from_str(body)
        .map_err(|e| NewsgraphError::UpstreamFetch(format!("Failed to parse response: {}", e)))?;

    let articles = response
        .articles
        .into_iter()
        .filter_map(|raw| {
            let title = raw
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED.to_string());
            if title == REMOVED_MARKER {
                return None;
            }
            let published_at = match raw
                .published_at
                .as_deref()
                .map(DateTime::parse_from_rfc3339)
            {
                Some(Ok(ts)) => ts.with_timezone(&Utc),
                _ => {
                    log::debug!("Skipping article without valid publishedAt: {}", title);
                    return None;
                }
            };
            Some(Article {
                title,
                description: raw.description,
                content: raw.content,
                url: raw.url.unwrap_or_default(),
                published_at,
                source_name: raw.source.and_then(|s| s.name),
            })
        })
        .collect();

    Ok(dedup_articles(articles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{test_config_toml, Config};
    use chrono::TimeZone;

    fn test_client() -> NewsApiClient {
        let config = Config::from_toml_str(&test_config_toml("lexicon")).unwrap();
        NewsApiClient::new("test-key".to_string(), &config.news).unwrap()
    }

    #[test]
    fn test_build_query() {
        let keywords = vec!["stock".to_string(), "shares".to_string()];
        assert_eq!(build_query(" Apple ", &keywords), "\"Apple\" AND (stock OR shares)");
        assert_eq!(build_query("Say \"Hi\"", &[]), "\"Say Hi\"");
    }

    #[test]
    fn test_date_window() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap();
        let (from, to) = date_window(now, 15);
        assert_eq!(from.to_string(), "2026-10-02");
        assert_eq!(to.to_string(), "2026-10-17");
    }

    #[test]
    fn test_request_url_params() {
        let client = test_client();
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 0, 0, 0).unwrap();
        let url = client.request_url("Acme", now).unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert!(pairs["q"].starts_with("\"Acme\" AND ("));
        assert_eq!(pairs["from"], "2026-10-02");
        assert_eq!(pairs["sortBy"], "publishedAt");
        assert_eq!(pairs["pageSize"], "20");
        assert_eq!(pairs["language"], "en");
        assert!(!url.as_str().contains("test-key"));
    }

    #[test]
    fn test_parse_everything_response() {
        let body = r#"{
            "status": "ok",
            "totalResults": 4,
            "articles": [
                {"source": {"id": null, "name": "Wire"}, "title": "Acme partners with Globex",
                 "description": "deal", "content": "Acme and Globex Corp signed a deal",
                 "url": "https://a.example/1", "publishedAt": "2026-10-10T08:00:00Z"},
                {"source": {"id": null, "name": "Wire"}, "title": "[Removed]",
                 "description": "[Removed]", "content": "[Removed]",
                 "url": "https://removed.com", "publishedAt": "1970-01-01T00:00:00Z"},
                {"source": null, "title": null, "description": null, "content": null,
                 "url": "https://a.example/2", "publishedAt": "2026-10-09T08:00:00Z"},
                {"source": null, "title": "No date", "url": "https://a.example/3", "publishedAt": "yesterday"}
            ]
        }"#;
        let articles = parse_everything_response(body).unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Acme partners with Globex");
        assert_eq!(articles[0].source_name.as_deref(), Some("Wire"));
        assert_eq!(articles[1].title, UNTITLED);
        assert!(articles[1].analysis_text().is_none());
    }

    #[test]
    fn test_parse_missing_articles_field() {
        let articles = parse_everything_response(r#"{"status":"ok"}"#).unwrap();
        assert!(articles.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_upstream_error() {
        let err = parse_everything_response("<html>").unwrap_err();
        assert!(matches!(err, NewsgraphError::UpstreamFetch(_)));
    }

    #[test]
    fn test_retryable_error_classification() {
        let rate_limited = NewsgraphError::UpstreamFetch("NewsAPI error 429 Too Many Requests: {}".into());
        let unauthorized = NewsgraphError::UpstreamFetch("NewsAPI error 401 Unauthorized: {}".into());
        let network = NewsgraphError::UpstreamFetch("Network error: timed out".into());
        assert!(is_retryable_error(&rate_limited));
        assert!(!is_retryable_error(&unauthorized));
        assert!(is_retryable_error(&network));
        assert!(!is_retryable_error(&NewsgraphError::EmptyInput));
    }
}
