use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    truncate_chars, EntityExtractor, Sentiment, SentimentClassifier, SentimentScore,
};
use crate::config::ModelsConfig;
use crate::error::{NewsgraphError, Result};
use crate::retry::{backoff_delay, is_retryable_status};

/// Entity group the NER pipeline uses for organizations
const ORG_GROUP: &str = "ORG";

/// Request body for hosted pipelines
#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
    options: InferenceOptions,
}

#[derive(Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f32,
}

/// Text classification responses come back either nested per input or flat
#[derive(Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Deserialize)]
struct NerEntity {
    entity_group: Option<String>,
    entity: Option<String>,
    word: String,
}

/// Hosted inference client (Hugging Face Inference API protocol)
///
/// One instance serves both the sentiment model (FinBERT tone by default)
/// and the token-classification model used for organization mentions.
pub struct HuggingFaceClient {
    client: Client,
    api_token: String,
    base_url: String,
    sentiment_model: String,
    ner_model: String,
    max_text_chars: usize,
    max_retries: usize,
}

impl HuggingFaceClient {
    /// Create a new client from the `[models]` config section
    pub fn new(api_token: String, config: &ModelsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NewsgraphError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sentiment_model: config.sentiment_model.clone(),
            ner_model: config.ner_model.clone(),
            max_text_chars: config.max_text_chars,
            max_retries: config.max_retries,
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/{}", self.base_url, model)
    }

    /// POST to a model endpoint, retrying 503 (model loading), 429 and other 5xx
    async fn post_with_retry(&self, model: &str, request: &InferenceRequest<'_>) -> Result<String> {
        let url = self.model_url(model);
        let mut attempt = 0;

        loop {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_token)
                .json(request)
                .send()
                .await
                .map_err(|e| NewsgraphError::ModelInference(format!("Network error: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                return response.text().await.map_err(|e| {
                    NewsgraphError::ModelInference(format!("Failed to read response: {}", e))
                });
            }

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if attempt < self.max_retries && is_retryable_status(status) {
                let delay = backoff_delay(attempt);
                log::warn!(
                    "Retry {}/{} for model {} in {:?} after status {}",
                    attempt + 1,
                    self.max_retries,
                    model,
                    delay,
                    status
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(NewsgraphError::ModelInference(format!(
                "Inference API error {} for {}: {}",
                status, model, body
            )));
        }
    }
}

#[async_trait]
impl SentimentClassifier for HuggingFaceClient {
    async fn infer(&self, text: &str) -> Result<SentimentScore> {
        let request = InferenceRequest {
            inputs: truncate_chars(text, self.max_text_chars),
            parameters: None,
            options: InferenceOptions { wait_for_model: true },
        };
        let body = self.post_with_retry(&self.sentiment_model, &request).await?;
        parse_classification(&body)
    }
}

#[async_trait]
impl EntityExtractor for HuggingFaceClient {
    async fn extract_organizations(&self, text: &str) -> Result<Vec<String>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let request = InferenceRequest {
            inputs: truncate_chars(text, self.max_text_chars),
            parameters: Some(serde_json::json!({ "aggregation_strategy": "simple" })),
            options: InferenceOptions { wait_for_model: true },
        };
        let body = self.post_with_retry(&self.ner_model, &request).await?;
        parse_organizations(&body)
    }
}

/// Highest-scoring label of a classification response
pub(crate) fn parse_classification(body: &str) -> Result<SentimentScore> {
    let response: ClassificationResponse = serde_json::from_str(body).map_err(|e| {
        NewsgraphError::ModelInference(format!("Failed to parse classification response: {}", e))
    })?;

    let scores = match response {
        ClassificationResponse::Nested(mut outer) => {
            if outer.is_empty() {
                Vec::new()
            } else {
                outer.swap_remove(0)
            }
        }
        ClassificationResponse::Flat(scores) => scores,
    };

    scores
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|best| SentimentScore::new(Sentiment::from_label(&best.label), best.score))
        .ok_or_else(|| NewsgraphError::ModelInference("Empty classification response".to_string()))
}

/// ORG surface strings of an aggregated NER response, in order, without exact repeats
pub(crate) fn parse_organizations(body: &str) -> Result<Vec<String>> {
    let entities: Vec<NerEntity> = serde_json::from_str(body).map_err(|e| {
        NewsgraphError::ModelInference(format!("Failed to parse NER response: {}", e))
    })?;

    let mut out: Vec<String> = Vec::new();
    for entity in entities {
        let group = entity
            .entity_group
            .or(entity.entity)
            .unwrap_or_default();
        // Non-aggregated pipelines tag tokens as B-ORG / I-ORG
        if group.trim_start_matches("B-").trim_start_matches("I-") != ORG_GROUP {
            continue;
        }
        let word = entity.word.replace(" ##", "").replace("##", "");
        let word = word.trim();
        if word.is_empty() || out.iter().any(|w| w == word) {
            continue;
        }
        out.push(word.to_string());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{test_config_toml, Config};

    #[test]
    fn test_parse_classification_nested() {
        let body = r#"[[{"label":"Positive","score":0.91},{"label":"Neutral","score":0.06},{"label":"Negative","score":0.03}]]"#;
        let score = parse_classification(body).unwrap();
        assert_eq!(score.label, Sentiment::Positive);
        assert!((score.score - 0.91).abs() < 1e-6);
    }

    #[test]
    fn test_parse_classification_flat_unknown_label() {
        let body = r#"[{"label":"LABEL_1","score":0.8},{"label":"negative","score":0.2}]"#;
        let score = parse_classification(body).unwrap();
        assert_eq!(score.label, Sentiment::Neutral);
    }

    #[test]
    fn test_parse_classification_empty() {
        assert!(parse_classification("[[]]").is_err());
        assert!(parse_classification(r#"{"error":"loading"}"#).is_err());
    }

    #[test]
    fn test_parse_organizations() {
        let body = r#"[
            {"entity_group":"ORG","score":0.99,"word":"Apple","start":0,"end":5},
            {"entity_group":"PER","score":0.98,"word":"Tim Cook","start":10,"end":18},
            {"entity_group":"ORG","score":0.97,"word":" Foxconn ","start":30,"end":37},
            {"entity_group":"ORG","score":0.95,"word":"Apple","start":50,"end":55},
            {"entity":"B-ORG","score":0.9,"word":"Nvi ##dia"}
        ]"#;
        let orgs = parse_organizations(body).unwrap();
        assert_eq!(orgs, vec!["Apple", "Foxconn", "Nvidia"]);
    }

    #[test]
    fn test_parse_organizations_error_payload() {
        let err = parse_organizations(r#"{"error":"Model is loading"}"#).unwrap_err();
        assert!(matches!(err, NewsgraphError::ModelInference(_)));
    }

    #[test]
    fn test_model_url() {
        let mut config = Config::from_toml_str(&test_config_toml("huggingface")).unwrap();
        config.models.base_url = "https://models.example/".to_string();
        let client = HuggingFaceClient::new("t".to_string(), &config.models).unwrap();
        assert_eq!(
            client.model_url(&client.sentiment_model),
            "https://models.example/yiyanghkust/finbert-tone"
        );
    }
}
