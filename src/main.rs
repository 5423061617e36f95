use anyhow::Result;
use newsgraph::db::{migrate, Db};
use newsgraph::error::NewsgraphError;
use newsgraph::http::GraphServer;
use newsgraph::{Config, Services};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => run_http_server().await?,
        "verify" => run_verification().await?,
        other => anyhow::bail!("Unknown command: {}. Usage: newsgraph [serve|verify]", other),
    }

    Ok(())
}

async fn open_db(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    db.migrate(config.migrations_dir()).await?;
    log::info!("Database initialized: {}", config.db_path().display());
    Ok(db)
}

async fn run_http_server() -> Result<()> {
    log::info!("Starting newsgraph HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let db = if config.http_server.persist_runs {
        Some(open_db(&config).await?)
    } else {
        None
    };
    let services = Services::from_config(&config)?;

    let server = GraphServer::new(services, db, &config)?;
    server.run(config.http_server.port).await?;

    Ok(())
}

/// Check configuration, credentials and the run-history schema
async fn run_verification() -> Result<()> {
    log::info!("Starting newsgraph v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Model provider: {}", config.models.provider);
    log::info!(
        "Default depth {} (limit {}), concurrency {}",
        config.graph.default_depth,
        config.graph.max_depth_limit,
        config.graph.concurrency
    );

    Services::from_config(&config)?;
    log::info!("News and model clients configured");

    let db = open_db(&config).await?;
    db.with_connection(|conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        for table in ["graph_runs", "graph_nodes", "graph_edges", "schema_migrations"] {
            if !tables.iter().any(|t| t == table) {
                return Err(NewsgraphError::Config(format!("Missing table: {}", table)));
            }
            log::debug!("✓ Table exists: {}", table);
        }

        let applied = migrate::get_applied_migrations(conn)?;
        log::debug!("✓ {} migrations applied", applied.len());

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(NewsgraphError::Config(format!(
                "Database integrity check failed: {}",
                integrity
            )));
        }
        log::info!("✓ Database integrity: OK");
        Ok(())
    })
    .await?;

    log::info!("✓ Verification complete");
    Ok(())
}
