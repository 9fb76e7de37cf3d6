//! Scrapewise REPL: ask for data from a local page in plain language.

mod fetcher;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scrapewise::{ExtractionRequest, Pipeline, PipelineBuilder, PipelineConfig, PipelineOutcome};

use crate::fetcher::LocalFileFetcher;

#[derive(Parser)]
#[command(name = "scrapewise", version, about)]
struct Cli {
    /// Pipeline configuration (YAML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Page to query: a local path or file:// url
    #[arg(short, long)]
    url: String,

    /// Conversation session id
    #[arg(short, long, default_value = "cli")]
    session: String,

    /// Run a single query and exit instead of starting the REPL
    #[arg(short, long)]
    query: Option<String>,

    /// Print outcomes as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let pipeline = PipelineBuilder::from_config(config)
        .fetcher(Arc::new(LocalFileFetcher::new()))
        .build()
        .context("failed to build pipeline")?;

    let restored = pipeline.restore_performance().await;
    let _sweeper = pipeline.spawn_sweeper();
    info!(
        session = %cli.session,
        url = %cli.url,
        restored,
        "scrapewise ready"
    );

    match &cli.query {
        Some(query) => {
            let outcome = ask(&pipeline, &cli, &cli.url, query).await;
            print_outcome(&outcome, cli.json)?;
        }
        None => repl(&pipeline, &cli).await?,
    }
    Ok(())
}

async fn repl(pipeline: &Pipeline, cli: &Cli) -> anyhow::Result<()> {
    println!("Ask for data from {}. ':url <path>' switches page, 'q' quits.", cli.url);
    let mut url = cli.url.clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "q" | ":q" | ":quit" => break,
            _ => {}
        }
        if let Some(path) = line.strip_prefix(":url ") {
            url = path.trim().to_string();
            println!("Now querying {}", url);
            continue;
        }

        let outcome = ask(pipeline, cli, &url, line).await;
        print_outcome(&outcome, cli.json)?;
    }
    Ok(())
}

async fn ask(pipeline: &Pipeline, cli: &Cli, url: &str, query: &str) -> PipelineOutcome {
    pipeline
        .handle(ExtractionRequest::new(query, cli.session.as_str(), url))
        .await
}

fn print_outcome(outcome: &PipelineOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        PipelineOutcome::Extracted(report) => {
            let flag = if report.below_threshold { " (below threshold)" } else { "" };
            println!(
                "{} record(s) via {} at confidence {:.2}{}",
                report.records.len(),
                report.strategy,
                report.confidence,
                flag
            );
            println!("{}", serde_json::to_string_pretty(&report.result)?);
        }
        PipelineOutcome::Clarification {
            question,
            suggestions,
            ..
        } => {
            println!("{}", question);
            for suggestion in suggestions {
                println!("  - {}: {}", suggestion.label, suggestion.reply);
            }
        }
        PipelineOutcome::Failed {
            kind,
            message,
            retry_hint,
        } => {
            println!("[{}] {}", kind, message);
            if let Some(hint) = retry_hint {
                println!("{}", hint);
            }
        }
    }
    Ok(())
}
