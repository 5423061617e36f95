//! Structured events emitted while a graph is expanded.

use super::RelationEdge;

/// Points in the traversal at which observers are called
#[derive(Debug, Clone, PartialEq)]
pub enum TraversalEvent<'a> {
    CompanyDequeued { company: &'a str, depth: usize },
    ArticlesFetched { company: &'a str, count: usize },
    /// News fetch failed; the company is treated as having no articles
    FetchFailed { company: &'a str, error: String },
    ArticleSkipped { company: &'a str, index: usize, reason: &'a str },
    RelationDiscovered { edge: &'a RelationEdge, depth: usize },
    Finished { nodes: usize, edges: usize, expanded: usize },
}

pub trait TraversalObserver: Send + Sync {
    fn on_event(&self, event: &TraversalEvent<'_>);
}

impl<F> TraversalObserver for F
where
    F: Fn(&TraversalEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &TraversalEvent<'_>) {
        self(event)
    }
}

pub struct NoopObserver;

impl TraversalObserver for NoopObserver {
    fn on_event(&self, _event: &TraversalEvent<'_>) {}
}

/// Reports traversal progress through the `log` facade
pub struct LogObserver;

impl TraversalObserver for LogObserver {
    fn on_event(&self, event: &TraversalEvent<'_>) {
        match event {
            TraversalEvent::CompanyDequeued { company, depth } => {
                log::info!("Expanding {} (depth {})", company, depth);
            }
            TraversalEvent::ArticlesFetched { company, count } => {
                log::info!("{} articles for {}", count, company);
            }
            TraversalEvent::FetchFailed { company, error } => {
                log::warn!(
                    "Failed to fetch news for {}: {}. Check your API key or quota.",
                    company,
                    error
                );
            }
            TraversalEvent::ArticleSkipped { company, index, reason } => {
                log::warn!("Skipped article [{}] of {}: {}", index, company, reason);
            }
            TraversalEvent::RelationDiscovered { edge, depth } => {
                log::debug!(
                    "{} -> {} ({}, [{}] {}) at depth {}",
                    edge.source,
                    edge.target,
                    edge.sentiment,
                    edge.article_index,
                    edge.article_title,
                    depth
                );
            }
            TraversalEvent::Finished { nodes, edges, expanded } => {
                log::info!(
                    "Graph complete: {} nodes, {} edges, {} companies expanded",
                    nodes,
                    edges,
                    expanded
                );
            }
        }
    }
}
