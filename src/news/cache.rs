use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use super::{Article, NewsSource};
use crate::error::Result;
use crate::graph::normalize_name;

/// Thread-safe LRU cache of article lists keyed by normalized company name
///
/// Lets repeated graph builds in one process (e.g. the HTTP server) reuse
/// fetches instead of spending API quota on the same company again.
pub struct ArticleCache {
    cache: Mutex<LruCache<String, Vec<Article>>>,
}

impl ArticleCache {
    /// Create a new article cache; capacity 0 is bumped to 1
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn get(&self, company: &str) -> Option<Vec<Article>> {
        self.cache
            .lock()
            .unwrap()
            .get(&normalize_name(company))
            .cloned()
    }

    pub fn put(&self, company: &str, articles: Vec<Article>) {
        self.cache
            .lock()
            .unwrap()
            .put(normalize_name(company), articles);
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().unwrap().is_empty()
    }
}

/// `NewsSource` decorator that serves repeated companies from an `ArticleCache`.
/// Failed fetches are not cached.
pub struct CachedNewsSource {
    inner: Arc<dyn NewsSource>,
    cache: Arc<ArticleCache>,
}

impl CachedNewsSource {
    pub fn new(inner: Arc<dyn NewsSource>, cache: Arc<ArticleCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl NewsSource for CachedNewsSource {
    async fn fetch(&self, company: &str) -> Result<Vec<Article>> {
        if let Some(cached) = self.cache.get(company) {
            log::debug!("Article cache hit for {}", company);
            return Ok(cached);
        }

        let articles = self.inner.fetch(company).await?;
        self.cache.put(company, articles.clone());
        Ok(articles)
    }
}
