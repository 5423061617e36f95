//! Company relationship graph: data model, related-entity resolution,
//! bounded BFS expansion, traversal events and rendering.
//!
//! Nodes are companies keyed by normalized name; edges are co-mentions found
//! in one company's news, tagged with the sentiment of the article.

mod expander;
mod observer;
mod render;
mod resolver;

pub use expander::{ExpansionOptions, GraphExpander};
pub use observer::{LogObserver, NoopObserver, TraversalEvent, TraversalObserver};
pub use render::{
    edge_color, render_report_html, GraphRenderer, HtmlRenderer, JsonRenderer, SEED_ONLY_WARNING,
};
pub use resolver::{RelatedCompany, RelatedEntityResolver, Resolution, SkippedArticle};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::models::Sentiment;

/// Canonical comparison key for company names: trimmed and lowercased.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A company in the graph. `depth` is the hop distance at first discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyNode {
    pub name: String,
    pub key: String,
    pub depth: usize,
}

/// Co-mention of `target` in an article fetched for `source`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub source: String,
    pub target: String,
    pub sentiment: Sentiment,
    pub confidence: f32,
    /// Position of the article in the source company's fetched list
    pub article_index: usize,
    pub article_title: String,
    pub article_url: String,
}

/// Article attribution for display: which company's result list, which index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCitation {
    pub company: String,
    pub article_index: usize,
    pub title: String,
    pub url: String,
}

/// Result of one `GraphExpander::expand` call
#[derive(Debug, Clone, Serialize)]
pub struct Expansion {
    pub graph: Graph,
    pub articles: Vec<ArticleCitation>,
}

impl Expansion {
    pub fn new(graph: Graph) -> Self {
        let articles = graph.citations();
        Self { graph, articles }
    }
}

/// Company graph built during one traversal.
///
/// Nodes keep insertion order; the seed is always the first node.
#[derive(Debug, Clone, Serialize)]
pub struct Graph {
    seed: String,
    nodes: Vec<CompanyNode>,
    edges: Vec<RelationEdge>,
    /// Normalized names of companies whose news was fetched, in order
    expanded: Vec<String>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    expanded_keys: HashSet<String>,
    /// Normalized (source, target) pairs of recorded edges
    #[serde(skip)]
    edge_keys: HashSet<(String, String)>,
}

impl Graph {
    /// New graph with the seed registered at depth 0
    pub fn new(seed: &str) -> Self {
        let mut graph = Self {
            seed: seed.trim().to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            expanded: Vec::new(),
            index: HashMap::new(),
            expanded_keys: HashSet::new(),
            edge_keys: HashSet::new(),
        };
        graph.add_node(seed, 0);
        graph
    }

    /// Rebuild a stored graph; nodes must be in insertion order with the seed first
    pub(crate) fn restore(
        seed: &str,
        nodes: Vec<CompanyNode>,
        edges: Vec<RelationEdge>,
        expanded: Vec<String>,
    ) -> Self {
        let mut graph = Self {
            seed: seed.to_string(),
            nodes: Vec::with_capacity(nodes.len()),
            edges: Vec::with_capacity(edges.len()),
            expanded: Vec::new(),
            index: HashMap::new(),
            expanded_keys: HashSet::new(),
            edge_keys: HashSet::new(),
        };
        for node in nodes {
            graph.add_node(&node.name, node.depth);
        }
        graph.add_node(seed, 0);
        for edge in edges {
            graph.add_edge(edge);
        }
        for key in expanded {
            graph.mark_expanded(&key);
        }
        graph
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Register a company; returns false (and changes nothing) if already present.
    pub fn add_node(&mut self, name: &str, depth: usize) -> bool {
        let key = normalize_name(name);
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.nodes.len());
        self.nodes.push(CompanyNode {
            name: name.trim().to_string(),
            key,
            depth,
        });
        true
    }

    /// Append an edge, registering a missing target one hop below its source
    pub fn add_edge(&mut self, edge: RelationEdge) {
        let source_depth = match self.node(&edge.source) {
            Some(node) => node.depth,
            None => {
                self.add_node(&edge.source, 0);
                0
            }
        };
        self.add_node(&edge.target, source_depth + 1);
        self.edge_keys
            .insert((normalize_name(&edge.source), normalize_name(&edge.target)));
        self.edges.push(edge);
    }

    pub(crate) fn mark_expanded(&mut self, name: &str) {
        let key = normalize_name(name);
        if self.expanded_keys.insert(key.clone()) {
            self.expanded.push(key);
        }
    }

    pub fn node(&self, name: &str) -> Option<&CompanyNode> {
        self.index
            .get(&normalize_name(name))
            .map(|&i| &self.nodes[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&normalize_name(name))
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edge_keys
            .contains(&(normalize_name(source), normalize_name(target)))
    }

    pub fn nodes(&self) -> &[CompanyNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[RelationEdge] {
        &self.edges
    }

    /// Normalized names whose news was fetched, in expansion order
    pub fn expanded(&self) -> &[String] {
        &self.expanded
    }

    pub fn is_expanded(&self, name: &str) -> bool {
        self.expanded_keys.contains(&normalize_name(name))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// No relation was found: the graph holds only the seed
    pub fn is_seed_only(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Unique (source company, article index) citations in edge order
    pub fn citations(&self) -> Vec<ArticleCitation> {
        let mut seen: HashSet<(String, usize)> = HashSet::new();
        let mut out: Vec<ArticleCitation> = Vec::new();
        for edge in &self.edges {
            if !seen.insert((normalize_name(&edge.source), edge.article_index)) {
                continue;
            }
            out.push(ArticleCitation {
                company: edge.source.clone(),
                article_index: edge.article_index,
                title: edge.article_title.clone(),
                url: edge.article_url.clone(),
            });
        }
        out
    }
}

#[cfg(test)]
pub(crate) fn test_edge(source: &str, target: &str, sentiment: Sentiment, index: usize) -> RelationEdge {
    RelationEdge {
        source: source.to_string(),
        target: target.to_string(),
        sentiment,
        confidence: 0.8,
        article_index: index,
        article_title: format!("{} article {}", source, index),
        article_url: format!("https://news.example/{}/{}", source.to_lowercase(), index),
    }
}
