//! Wiring of the external collaborators from configuration.

use std::sync::Arc;

use crate::config::{Config, GraphConfig};
use crate::error::{NewsgraphError, Result};
use crate::graph::{ExpansionOptions, GraphExpander, RelatedEntityResolver};
use crate::models::{
    EntityExtractor, HuggingFaceClient, LexiconSentimentClassifier, PatternEntityExtractor,
    SentimentClassifier,
};
use crate::news::{ArticleCache, CachedNewsSource, NewsApiClient, NewsSource};

/// News source plus the two model collaborators, shared by binaries and the server
#[derive(Clone)]
pub struct Services {
    pub news: Arc<dyn NewsSource>,
    pub sentiment: Arc<dyn SentimentClassifier>,
    pub entities: Arc<dyn EntityExtractor>,
}

impl Services {
    pub fn new(
        news: Arc<dyn NewsSource>,
        sentiment: Arc<dyn SentimentClassifier>,
        entities: Arc<dyn EntityExtractor>,
    ) -> Self {
        Self {
            news,
            sentiment,
            entities,
        }
    }

    /// Build the configured clients. API keys are read from the environment here.
    pub fn from_config(config: &Config) -> Result<Self> {
        let news_key = env_var(&config.news.api_key_env)?;
        let client: Arc<dyn NewsSource> = Arc::new(NewsApiClient::new(news_key, &config.news)?);
        let news: Arc<dyn NewsSource> = if config.news.cache_capacity > 0 {
            log::info!("Article cache enabled ({} companies)", config.news.cache_capacity);
            let cache = Arc::new(ArticleCache::new(config.news.cache_capacity));
            Arc::new(CachedNewsSource::new(client, cache))
        } else {
            client
        };

        let sentiment: Arc<dyn SentimentClassifier>;
        let entities: Arc<dyn EntityExtractor>;
        match config.models.provider.as_str() {
            "huggingface" => {
                let token = env_var(&config.models.api_key_env)?;
                let hf = Arc::new(HuggingFaceClient::new(token, &config.models)?);
                log::info!(
                    "Using hosted models: sentiment={}, ner={}",
                    config.models.sentiment_model,
                    config.models.ner_model
                );
                sentiment = hf.clone();
                entities = hf;
            }
            "lexicon" => {
                log::info!("Using offline lexicon sentiment and pattern organization extraction");
                sentiment = Arc::new(LexiconSentimentClassifier::new());
                entities = Arc::new(PatternEntityExtractor::new(&config.models.known_organizations)?);
            }
            other => {
                return Err(NewsgraphError::Config(format!(
                    "Unknown model provider: {}",
                    other
                )))
            }
        }

        Ok(Self::new(news, sentiment, entities))
    }

    /// Graph expander over these collaborators with the `[graph]` options applied
    pub fn expander(&self, graph: &GraphConfig) -> GraphExpander {
        let resolver = RelatedEntityResolver::new(self.entities.clone(), self.sentiment.clone());
        GraphExpander::new(self.news.clone(), resolver).with_options(ExpansionOptions {
            max_relations_per_company: graph.max_relations_per_company,
            dedupe_edges: graph.dedupe_edges,
            concurrency: graph.concurrency,
        })
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| NewsgraphError::Config(format!("Environment variable {} not set", name)))
}
