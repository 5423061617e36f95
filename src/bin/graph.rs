//! Graph CLI: expand the company graph around a seed and write it as HTML or JSON.

use clap::Parser;
use newsgraph::db::{self, Db};
use newsgraph::graph::{GraphRenderer, HtmlRenderer, JsonRenderer, SEED_ONLY_WARNING};
use newsgraph::{Config, Services};
use std::path::PathBuf;
use uuid::Uuid;

/// Build a company relationship graph from recent news co-mentions.
#[derive(Parser, Debug)]
#[command(name = "graph")]
struct Args {
    /// Seed company name (e.g. "Apple Inc").
    company: String,

    /// Maximum expansion depth (default: graph.default_depth).
    #[arg(long)]
    depth: Option<usize>,

    /// Output file (default: <output_dir>/recursive_graph_<id>.html).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write JSON instead of HTML.
    #[arg(long)]
    json: bool,

    /// Do not store the run in the history database.
    #[arg(long)]
    no_save: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let depth = config.check_depth(args.depth.unwrap_or(config.graph.default_depth))?;

    let services = Services::from_config(&config)?;
    println!("Building graph up to depth {} from '{}'...", depth, args.company.trim());
    let expansion = services.expander(&config.graph).expand(&args.company, depth).await?;
    let graph = &expansion.graph;

    let renderer: Box<dyn GraphRenderer> = if args.json {
        Box::new(JsonRenderer)
    } else {
        Box::new(HtmlRenderer::default())
    };
    let output = match args.output {
        Some(path) => path,
        None => {
            let ext = if args.json { "json" } else { "html" };
            std::fs::create_dir_all(config.output_dir())?;
            config
                .output_dir()
                .join(format!("recursive_graph_{}.{}", Uuid::new_v4().simple(), ext))
        }
    };
    std::fs::write(&output, renderer.render(graph)?)?;

    if !args.no_save {
        let db = Db::new(config.db_path());
        db.migrate(config.migrations_dir()).await?;
        let run_id = db::save_run(&db, &expansion, depth).await?;
        println!("Run id: {}", run_id);
    }

    if graph.is_seed_only() {
        println!("\n⚠️  {}", SEED_ONLY_WARNING);
    } else {
        println!(
            "\n{} companies, {} relations, {} companies expanded",
            graph.node_count(),
            graph.edge_count(),
            graph.expanded().len()
        );
        println!("\nNews Articles (Indexed):");
        for citation in &expansion.articles {
            println!(
                "  [{}] {} ({})\n      {}",
                citation.article_index, citation.title, citation.company, citation.url
            );
        }
    }
    println!("\nWrote {}", output.display());

    Ok(())
}
