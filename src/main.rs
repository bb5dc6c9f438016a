//! Corvus - 学术论文检索智能体
//!
//! 入口：初始化日志、加载配置、组装检索器并运行一次检索，打印论文列表或 JSON。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use corvus::config::{load_config, AppConfig};
use corvus::core::{build_finder, FinderMode, FinderOutcome, FinderRequest};
use corvus::observability;
use corvus::react::ProgressEvent;

/// Find academic papers for a natural-language research task
#[derive(Parser)]
#[command(name = "corvus")]
#[command(version)]
struct Args {
    /// Research task, e.g. "recent papers on graph neural networks for molecules"
    task: String,

    /// Keyword query used only to rerank candidates (blank disables reranking)
    #[arg(long, default_value = "")]
    focus: String,

    /// Orchestration mode: deliberate or fast (default from config)
    #[arg(long)]
    mode: Option<String>,

    /// Extra TOML config file layered over config/default.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full outcome as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    observability::init();

    let cfg = load_config(args.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let mode = args
        .mode
        .as_deref()
        .map(str::parse::<FinderMode>)
        .transpose()
        .context("Invalid --mode")?;
    let finder = build_finder(&cfg, mode).context("Failed to build paper finder")?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            tracing::info!(
                tracking_id = %ev.tracking_id,
                status = ?ev.status,
                "{}: {}",
                ev.label,
                ev.description.as_deref().unwrap_or("")
            );
        }
    });

    let outcome = finder
        .run(FinderRequest::new(args.task, args.focus), Some(&tx))
        .await
        .context("Search failed")?;
    drop(tx);
    let _ = printer.await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
        );
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &FinderOutcome) {
    println!(
        "{} papers ({} steps, goal achieved: {})",
        outcome.candidates.len(),
        outcome.iterations,
        outcome.goal_achieved
    );
    for (i, paper) in outcome.candidates.iter().enumerate() {
        println!(
            "{:>2}. {} ({})\n    {}  [{}]",
            i + 1,
            paper.title_or_default(),
            paper.published(),
            paper.authors_short(),
            paper.paper_id
        );
    }
    if !outcome.plan_reasoning.is_empty() {
        println!("\nReasoning: {}", outcome.plan_reasoning);
    }
}
