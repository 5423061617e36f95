//! Bounded breadth-first expansion over companies co-mentioned in the news.

use futures_util::stream::{self, StreamExt};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use super::observer::{LogObserver, TraversalEvent, TraversalObserver};
use super::resolver::{RelatedCompany, RelatedEntityResolver, Resolution};
use super::{normalize_name, Expansion, Graph, RelationEdge};
use crate::error::{NewsgraphError, Result};
use crate::news::NewsSource;

/// Tuning knobs for `GraphExpander::expand`
#[derive(Debug, Clone)]
pub struct ExpansionOptions {
    /// Keep relations to at most this many distinct companies per expanded company
    pub max_relations_per_company: Option<usize>,
    /// Keep only the first edge per (source, target) pair
    pub dedupe_edges: bool,
    /// Same-depth companies fetched and resolved concurrently
    pub concurrency: usize,
}

impl Default for ExpansionOptions {
    fn default() -> Self {
        Self {
            max_relations_per_company: None,
            dedupe_edges: false,
            concurrency: 1,
        }
    }
}

/// What one expanded company contributed
struct Explored {
    company: String,
    resolution: Resolution,
}

/// Builds a company graph by BFS from a seed, up to `max_depth` hops.
///
/// Each distinct normalized name is fetched at most once per call. Edges are
/// recorded even when their target was already visited or sits past the depth
/// bound; only expansion is limited. Fetch and model failures never abort the
/// traversal.
pub struct GraphExpander {
    news: Arc<dyn NewsSource>,
    resolver: RelatedEntityResolver,
    options: ExpansionOptions,
    observer: Arc<dyn TraversalObserver>,
}

impl GraphExpander {
    pub fn new(news: Arc<dyn NewsSource>, resolver: RelatedEntityResolver) -> Self {
        Self {
            news,
            resolver,
            options: ExpansionOptions::default(),
            observer: Arc::new(LogObserver),
        }
    }

    pub fn with_options(mut self, options: ExpansionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TraversalObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &ExpansionOptions {
        &self.options
    }

    /// Expand the graph around `seed`. A blank seed fails before any fetch.
    pub async fn expand(&self, seed: &str, max_depth: usize) -> Result<Expansion> {
        let seed = seed.trim();
        if seed.is_empty() {
            return Err(NewsgraphError::EmptyInput);
        }

        let mut graph = Graph::new(seed);
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((seed.to_string(), 0));

        while let Some(level) = queue.front().map(|(_, depth)| *depth) {
            // The queue is depth-ordered, so one level is a contiguous prefix.
            let mut batch = Vec::new();
            while queue.front().map_or(false, |(_, depth)| *depth == level) {
                let Some((company, depth)) = queue.pop_front() else {
                    break;
                };
                let key = normalize_name(&company);
                if visited.contains(&key) || depth > max_depth {
                    continue;
                }
                visited.insert(key);
                graph.mark_expanded(&company);
                self.observer
                    .on_event(&TraversalEvent::CompanyDequeued { company: &company, depth });
                batch.push(company);
            }

            if batch.is_empty() {
                continue;
            }

            let explored: Vec<Explored> = stream::iter(batch)
                .map(|company| self.explore(company))
                .buffered(self.options.concurrency.max(1))
                .collect()
                .await;

            for Explored { company, resolution } in explored {
                let related = cap_relations(resolution.related, self.options.max_relations_per_company);
                for rel in related {
                    let key = normalize_name(&rel.name);
                    if !visited.contains(&key) {
                        queue.push_back((rel.name.clone(), level + 1));
                    }
                    if self.options.dedupe_edges && graph.has_edge(&company, &rel.name) {
                        continue;
                    }
                    let edge = RelationEdge {
                        source: company.clone(),
                        target: rel.name,
                        sentiment: rel.sentiment,
                        confidence: rel.confidence,
                        article_index: rel.article_index,
                        article_title: rel.article_title,
                        article_url: rel.article_url,
                    };
                    self.observer
                        .on_event(&TraversalEvent::RelationDiscovered { edge: &edge, depth: level });
                    graph.add_edge(edge);
                }
            }
        }

        self.observer.on_event(&TraversalEvent::Finished {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            expanded: graph.expanded().len(),
        });

        Ok(Expansion::new(graph))
    }

    /// Fetch and resolve one company; failures degrade to no articles
    async fn explore(&self, company: String) -> Explored {
        let articles = match self.news.fetch(&company).await {
            Ok(articles) => {
                self.observer.on_event(&TraversalEvent::ArticlesFetched {
                    company: &company,
                    count: articles.len(),
                });
                articles
            }
            Err(e) => {
                self.observer.on_event(&TraversalEvent::FetchFailed {
                    company: &company,
                    error: e.to_string(),
                });
                Vec::new()
            }
        };

        let resolution = self.resolver.resolve(&articles, &company).await;
        for skipped in &resolution.skipped {
            self.observer.on_event(&TraversalEvent::ArticleSkipped {
                company: &company,
                index: skipped.index,
                reason: &skipped.reason,
            });
        }

        Explored { company, resolution }
    }
}

/// Keep relations whose target is among the first `cap` distinct targets
fn cap_relations(related: Vec<RelatedCompany>, cap: Option<usize>) -> Vec<RelatedCompany> {
    let Some(cap) = cap else {
        return related;
    };
    let mut allowed: Vec<String> = Vec::new();
    related
        .into_iter()
        .filter(|rel| {
            let key = normalize_name(&rel.name);
            if allowed.contains(&key) {
                return true;
            }
            if allowed.len() < cap {
                allowed.push(key);
                return true;
            }
            false
        })
        .collect()
}
