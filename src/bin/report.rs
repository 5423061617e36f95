//! Report CLI: per-article sentiment for one company's recent news.

use clap::Parser;
use newsgraph::graph::render_report_html;
use newsgraph::report::{build_report, NO_RELEVANT_HINT};
use std::path::PathBuf;
use newsgraph::{Config, Services};

/// Analyze recent news sentiment for a company.
#[derive(Parser, Debug)]
#[command(name = "report")]
struct Args {
    /// Company name (e.g. "Apple Inc").
    company: String,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Also write the sentiment star graph as HTML to this path.
    #[arg(long, value_name = "PATH")]
    html: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let services = Services::from_config(&config)?;

    let report = build_report(services.news.as_ref(), services.sentiment.as_ref(), &args.company).await?;

    if let Some(path) = &args.html {
        std::fs::write(path, render_report_html(&report)?)?;
        log::info!("Sentiment graph written to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.fetched == 0 {
        println!("No articles found.");
        return Ok(());
    }
    if report.is_empty() {
        println!("{}", NO_RELEVANT_HINT);
        return Ok(());
    }

    println!("Filtered news with sentiment for {}\n", report.company);
    for entry in &report.entries {
        println!("{}. {}", entry.index + 1, entry.title);
        println!("   Published: {}", entry.published_at.format("%Y-%m-%d %H:%M UTC"));
        println!("   Sentiment: {} ({:.2})", capitalize(entry.sentiment.as_str()), entry.confidence);
        println!("   {}", entry.text);
        println!("   {}\n", entry.url);
    }
    println!(
        "Positive: {}  Negative: {}  Neutral: {}",
        report.counts.positive, report.counts.negative, report.counts.neutral
    );
    if report.skipped > 0 {
        println!("({} articles skipped after classifier errors)", report.skipped);
    }

    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
