use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Largest page size accepted by the news client (NewsAPI allows 100, we cap lower)
pub const MAX_PAGE_SIZE: usize = 50;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub newsgraph: NewsgraphConfig,
    pub news: NewsConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub http_server: HttpServerConfig,
}

/// Newsgraph-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NewsgraphConfig {
    pub db_path: PathBuf,
    /// Directory the `graph` binary writes rendered pages into
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory holding `NNN_name.sql` schema migrations
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// News search configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NewsConfig {
    #[serde(default = "default_news_base_url")]
    pub base_url: String,
    pub api_key_env: String,
    /// Trailing time window in days
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_language")]
    pub language: String,
    /// Terms OR-ed into the query next to the quoted company name
    #[serde(default = "default_query_keywords")]
    pub query_keywords: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// LRU article cache capacity (companies); 0 disables caching
    #[serde(default)]
    pub cache_capacity: usize,
}

/// Sentiment + entity model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// `huggingface` (hosted inference) or `lexicon` (offline)
    pub provider: String,
    #[serde(default = "default_models_base_url")]
    pub base_url: String,
    #[serde(default = "default_models_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_sentiment_model")]
    pub sentiment_model: String,
    #[serde(default = "default_ner_model")]
    pub ner_model: String,
    /// Model inputs are truncated to this many characters
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Extra organization names the offline extractor recognizes
    #[serde(default)]
    pub known_organizations: Vec<String>,
}

/// Graph expansion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_depth")]
    pub default_depth: usize,
    #[serde(default = "default_max_depth_limit")]
    pub max_depth_limit: usize,
    /// Keep at most this many distinct related companies per expanded company
    #[serde(default)]
    pub max_relations_per_company: Option<usize>,
    /// Keep only the first edge per (source, target) pair
    #[serde(default)]
    pub dedupe_edges: bool,
    /// Same-depth companies fetched concurrently (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_depth: default_depth(),
            max_depth_limit: default_max_depth_limit(),
            max_relations_per_company: None,
            dedupe_edges: false,
            concurrency: default_concurrency(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_http_api_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_authless")]
    pub authless: bool,
    /// Store every graph built through the API in the run history
    #[serde(default = "default_persist_runs")]
    pub persist_runs: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            api_key_env: default_http_api_key_env(),
            allowed_origins: Vec::new(),
            authless: default_authless(),
            persist_runs: default_persist_runs(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("graphs")
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_news_base_url() -> String {
    "https://newsapi.org/v2/everything".to_string()
}

fn default_window_days() -> i64 {
    30
}

fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

fn default_language() -> String {
    "en".to_string()
}

fn default_query_keywords() -> Vec<String> {
    ["investment", "partnership", "acquisition", "collaboration", "stock", "shares"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    2
}

fn default_models_base_url() -> String {
    "https://api-inference.huggingface.co/models".to_string()
}

fn default_models_api_key_env() -> String {
    "HF_API_TOKEN".to_string()
}

fn default_sentiment_model() -> String {
    "yiyanghkust/finbert-tone".to_string()
}

fn default_ner_model() -> String {
    "dslim/bert-base-NER".to_string()
}

fn default_max_text_chars() -> usize {
    2000
}

fn default_depth() -> usize {
    3
}

fn default_max_depth_limit() -> usize {
    6
}

fn default_concurrency() -> usize {
    1
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_api_key_env() -> String {
    "NEWSGRAPH_API_KEY".to_string()
}

fn default_authless() -> bool {
    true
}

fn default_persist_runs() -> bool {
    true
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in NEWSGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("NEWSGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml_str(&config_str)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration without touching the environment
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse config.toml")
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        std::env::var(&self.news.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with your NewsAPI key.",
                self.news.api_key_env
            )
        })?;

        match self.models.provider.as_str() {
            "huggingface" => {
                std::env::var(&self.models.api_key_env).with_context(|| {
                    format!(
                        "Environment variable {} not set. It is required by the huggingface model provider.",
                        self.models.api_key_env
                    )
                })?;
            }
            "lexicon" => {}
            other => anyhow::bail!(
                "models.provider must be \"huggingface\" or \"lexicon\", got \"{}\"",
                other
            ),
        }

        if self.news.page_size == 0 || self.news.page_size > MAX_PAGE_SIZE {
            anyhow::bail!("news.page_size must be between 1 and {}", MAX_PAGE_SIZE);
        }

        if !(1..=30).contains(&self.news.window_days) {
            anyhow::bail!("news.window_days must be between 1 and 30");
        }

        if self.models.max_text_chars == 0 {
            anyhow::bail!("models.max_text_chars must be greater than 0");
        }

        if self.graph.max_depth_limit == 0 {
            anyhow::bail!("graph.max_depth_limit must be greater than 0");
        }

        if self.graph.default_depth == 0 || self.graph.default_depth > self.graph.max_depth_limit {
            anyhow::bail!(
                "graph.default_depth must be between 1 and graph.max_depth_limit ({})",
                self.graph.max_depth_limit
            );
        }

        if self.graph.concurrency == 0 {
            anyhow::bail!("graph.concurrency must be greater than 0");
        }

        if self.graph.max_relations_per_company == Some(0) {
            anyhow::bail!("graph.max_relations_per_company must be greater than 0 when set");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.newsgraph.db_path
    }

    /// Get migrations directory
    pub fn migrations_dir(&self) -> &Path {
        &self.newsgraph.migrations_dir
    }

    /// Get the directory rendered graphs are written to
    pub fn output_dir(&self) -> &Path {
        &self.newsgraph.output_dir
    }

    /// Check a user-supplied depth against `1..=max_depth_limit`
    pub fn check_depth(&self, depth: usize) -> crate::Result<usize> {
        self.graph.check_depth(depth)
    }
}

impl GraphConfig {
    /// Depth requested through the CLI or HTTP; must be within `1..=max_depth_limit`
    pub fn check_depth(&self, depth: usize) -> crate::Result<usize> {
        if depth == 0 || depth > self.max_depth_limit {
            return Err(crate::NewsgraphError::InvalidInput(format!(
                "depth must be between 1 and {}",
                self.max_depth_limit
            )));
        }
        Ok(depth)
    }
}

#[cfg(test)]
pub(crate) fn test_config_toml(provider: &str) -> String {
    format!(
        r#"
[newsgraph]
db_path = "./test.db"
log_level = "debug"

[news]
api_key_env = "NEWSGRAPH_TEST_NEWS_KEY"
window_days = 15
page_size = 20

[models]
provider = "{}"
api_key_env = "NEWSGRAPH_TEST_HF_TOKEN"

[graph]
default_depth = 2
max_depth_limit = 4
"#,
        provider
    )
}
