//! Graph run history: save finished expansions, list and reload them.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::Db;
use crate::error::{NewsgraphError, Result};
use crate::graph::{CompanyNode, Expansion, Graph, RelationEdge};
use crate::models::Sentiment;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub id: String,
    pub seed: String,
    pub max_depth: usize,
    pub node_count: usize,
    pub edge_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredRun {
    pub summary: RunSummary,
    pub expansion: Expansion,
}

/// Persist a finished expansion; returns the new run id
pub async fn save_run(db: &Db, expansion: &Expansion, max_depth: usize) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let graph = expansion.graph.clone();
    let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
    let run_id = id.clone();

    db.with_connection(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO graph_runs (id, seed, max_depth, node_count, edge_count, expanded, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                graph.seed(),
                max_depth as i64,
                graph.node_count() as i64,
                graph.edge_count() as i64,
                serde_json::to_string(graph.expanded())?,
                created_at,
            ],
        )?;

        {
            let mut insert_node = tx.prepare(
                "INSERT INTO graph_nodes (run_id, position, name, depth) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, node) in graph.nodes().iter().enumerate() {
                insert_node.execute(params![run_id, position as i64, node.name, node.depth as i64])?;
            }

            let mut insert_edge = tx.prepare(
                "INSERT INTO graph_edges
                 (run_id, position, source, target, sentiment, confidence, article_index, article_title, article_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for (position, edge) in graph.edges().iter().enumerate() {
                insert_edge.execute(params![
                    run_id,
                    position as i64,
                    edge.source,
                    edge.target,
                    edge.sentiment.as_str(),
                    edge.confidence as f64,
                    edge.article_index as i64,
                    edge.article_title,
                    edge.article_url,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    })
    .await?;

    log::info!("Saved graph run {} for {}", id, expansion.graph.seed());
    Ok(id)
}

/// Most recent runs first
pub async fn list_runs(db: &Db, limit: usize) -> Result<Vec<RunSummary>> {
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, seed, max_depth, node_count, edge_count, created_at
             FROM graph_runs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], summary_from_row)?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
        rows.into_iter().map(parse_summary).collect()
    })
    .await
}

/// Reload a stored run, or None for an unknown id
pub async fn load_run(db: &Db, run_id: &str) -> Result<Option<StoredRun>> {
    let run_id = run_id.to_string();
    db.with_connection(move |conn| load_run_sync(conn, &run_id)).await
}

/// Remove a run and its nodes and edges; false if it did not exist
pub async fn delete_run(db: &Db, run_id: &str) -> Result<bool> {
    let run_id = run_id.to_string();
    db.with_connection(move |conn| {
        let deleted = conn.execute("DELETE FROM graph_runs WHERE id = ?1", params![run_id])?;
        Ok(deleted > 0)
    })
    .await
}

type SummaryRow = (String, String, i64, i64, i64, String);

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn parse_summary(row: SummaryRow) -> Result<RunSummary> {
    let (id, seed, max_depth, node_count, edge_count, created_at) = row;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| NewsgraphError::InvalidInput(format!("Bad timestamp on run {}: {}", id, e)))?
        .with_timezone(&Utc);
    Ok(RunSummary {
        id,
        seed,
        max_depth: max_depth as usize,
        node_count: node_count as usize,
        edge_count: edge_count as usize,
        created_at,
    })
}

fn load_run_sync(conn: &Connection, run_id: &str) -> Result<Option<StoredRun>> {
    let row = conn
        .query_row(
            "SELECT id, seed, max_depth, node_count, edge_count, created_at, expanded
             FROM graph_runs WHERE id = ?1",
            params![run_id],
            |row| Ok((summary_from_row(row)?, row.get::<_, String>(6)?)),
        )
        .optional()?;
    let Some((row, expanded)) = row else {
        return Ok(None);
    };
    let summary = parse_summary(row)?;
    let expanded: Vec<String> = serde_json::from_str(&expanded)?;

    let mut stmt = conn.prepare("SELECT name, depth FROM graph_nodes WHERE run_id = ?1 ORDER BY position")?;
    let nodes = stmt
        .query_map(params![run_id], |row| {
            let name: String = row.get(0)?;
            Ok(CompanyNode {
                key: crate::graph::normalize_name(&name),
                name,
                depth: row.get::<_, i64>(1)? as usize,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    let mut stmt = conn.prepare(
        "SELECT source, target, sentiment, confidence, article_index, article_title, article_url
         FROM graph_edges WHERE run_id = ?1 ORDER BY position",
    )?;
    let edges = stmt
        .query_map(params![run_id], |row| {
            Ok(RelationEdge {
                source: row.get(0)?,
                target: row.get(1)?,
                sentiment: Sentiment::from_label(&row.get::<_, String>(2)?),
                confidence: row.get::<_, f64>(3)? as f32,
                article_index: row.get::<_, i64>(4)? as usize,
                article_title: row.get(5)?,
                article_url: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    let graph = Graph::restore(&summary.seed, nodes, edges, expanded);
    Ok(Some(StoredRun {
        summary,
        expansion: Expansion::new(graph),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::graph::test_edge;
    use tempfile::TempDir;

    fn sample_expansion(seed: &str) -> Expansion {
        let mut graph = Graph::new(seed);
        graph.mark_expanded(seed);
        graph.add_edge(test_edge(seed, "Globex", Sentiment::Positive, 0));
        graph.add_edge(test_edge(seed, "Initech", Sentiment::Negative, 2));
        graph.mark_expanded("Globex");
        graph.add_edge(test_edge("Globex", "Hooli", Sentiment::Neutral, 1));
        Expansion::new(graph)
    }

    #[tokio::test]
    async fn test_save_and_load_run() {
        let temp_dir = TempDir::new().unwrap();
        let db = test_db(&temp_dir).await;
        let expansion = sample_expansion("Acme");

        let id = save_run(&db, &expansion, 2).await.unwrap();
        let stored = load_run(&db, &id).await.unwrap().unwrap();

        assert_eq!(stored.summary.id, id);
        assert_eq!(stored.summary.seed, "Acme");
        assert_eq!(stored.summary.max_depth, 2);
        assert_eq!(stored.summary.node_count, 4);
        assert_eq!(stored.summary.edge_count, 3);

        let graph = &stored.expansion.graph;
        assert_eq!(graph.nodes(), expansion.graph.nodes());
        assert_eq!(graph.edges(), expansion.graph.edges());
        assert_eq!(graph.expanded(), expansion.graph.expanded());
        assert_eq!(graph.node("hooli").unwrap().depth, 2);
        assert_eq!(stored.expansion.articles, expansion.articles);
    }

    #[tokio::test]
    async fn test_load_unknown_run() {
        let temp_dir = TempDir::new().unwrap();
        let db = test_db(&temp_dir).await;
        assert!(load_run(&db, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_runs_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let db = test_db(&temp_dir).await;

        let first = save_run(&db, &sample_expansion("Acme"), 1).await.unwrap();
        let second = save_run(&db, &Expansion::new(Graph::new("Globex")), 3).await.unwrap();

        let runs = list_runs(&db, 10).await.unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);
        assert_eq!(runs[0].node_count, 1);

        assert_eq!(list_runs(&db, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_run_cascades() {
        let temp_dir = TempDir::new().unwrap();
        let db = test_db(&temp_dir).await;
        let id = save_run(&db, &sample_expansion("Acme"), 2).await.unwrap();

        assert!(delete_run(&db, &id).await.unwrap());
        assert!(!delete_run(&db, &id).await.unwrap());
        assert!(load_run(&db, &id).await.unwrap().is_none());

        let orphans: i64 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM graph_edges", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
