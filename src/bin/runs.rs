//! Run history CLI: list, show and delete stored graph runs.

use clap::{Parser, Subcommand};
use newsgraph::db::{self, Db};
use newsgraph::graph::{GraphRenderer, HtmlRenderer};
use newsgraph::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "runs")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the most recent runs.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print a stored run as JSON, or re-render it as HTML with --html.
    Show {
        run_id: String,
        #[arg(long)]
        html: Option<PathBuf>,
    },
    /// Delete a stored run.
    Delete { run_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let db = Db::new(config.db_path());
    db.migrate(config.migrations_dir()).await?;

    match args.command {
        Command::List { limit } => {
            let runs = db::list_runs(&db, limit).await?;
            if runs.is_empty() {
                println!("No stored runs.");
            }
            for run in runs {
                println!(
                    "{}  {}  {:<24} depth {}  {} nodes  {} edges",
                    run.id,
                    run.created_at.format("%Y-%m-%d %H:%M"),
                    run.seed,
                    run.max_depth,
                    run.node_count,
                    run.edge_count
                );
            }
        }
        Command::Show { run_id, html } => {
            let run = db::load_run(&db, &run_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Run {} not found", run_id))?;
            match html {
                Some(path) => {
                    std::fs::write(&path, HtmlRenderer::default().render(&run.expansion.graph)?)?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&run)?),
            }
        }
        Command::Delete { run_id } => {
            if !db::delete_run(&db, &run_id).await? {
                anyhow::bail!("Run {} not found", run_id);
            }
            println!("Deleted run {}", run_id);
        }
    }

    Ok(())
}
