//! CLI entry point for the resumegraph pipeline.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use resumegraph_core::config::Settings;
use resumegraph_core::{CandidateFacts, ExtractionError};
use resumegraph_graph::{GraphClient, GraphConfig, GraphSession, MemoryGraph};

use resumegraph_pipeline::error::PipelineError;
use resumegraph_pipeline::extract::{FactExtractor, RuleBasedExtractor};
use resumegraph_pipeline::loader::{DocumentLoader, FsDocumentLoader};
use resumegraph_pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "resumegraph")]
#[command(about = "Extract resumes into a candidate/skill graph and query it")]
struct Cli {
    /// Config file prefix (default: resumegraph).
    #[arg(short, long, default_value = "resumegraph", global = true)]
    config: String,

    /// Use an in-process graph instead of Neo4j. Nothing is persisted.
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, store, and query in one run.
    Run {
        /// Resume file (.txt, .md, .json).
        #[arg(short, long)]
        file: String,

        /// Question to answer after storing, e.g. "Find candidates with Python skills".
        #[arg(short, long)]
        query: String,

        /// Overall timeout; defaults to pipeline.run_timeout_secs.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Extract facts from a resume and print them. Touches no graph.
    Extract {
        #[arg(short, long)]
        file: String,
    },

    /// Answer a question against the stored graph.
    Ask {
        #[arg(short, long)]
        query: String,

        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

#[derive(Serialize)]
struct AskOutput<'a> {
    plan: &'a resumegraph_core::QueryPlan,
    results: &'a [resumegraph_core::ResultRow],
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    if let Command::Extract { file } = &cli.command {
        let facts = extract_file(file, &settings).await?;
        print_json(&facts)?;
        return Ok(ExitCode::SUCCESS);
    }

    let session = open_session(cli.in_memory, &settings).await?;
    let pipeline = Pipeline::new(session).with_settings(&settings.pipeline);

    let result = execute(&cli.command, &pipeline, &settings).await;

    if let Err(e) = pipeline.session().close().await {
        tracing::warn!(error = %e, "Failed to close graph session");
    }
    result
}

async fn execute(
    command: &Command,
    pipeline: &Pipeline,
    settings: &Settings,
) -> anyhow::Result<ExitCode> {
    let learned = pipeline
        .learn_stored_skills(settings.pipeline.stage_timeout())
        .await
        .map_err(PipelineError::from)?;
    tracing::debug!(learned, "Stored skills added to vocabulary");

    match command {
        Command::Run {
            file,
            query,
            timeout_secs,
        } => {
            let document = FsDocumentLoader.load(file).await?;
            let timeout = run_timeout(*timeout_secs, settings);
            let outcome = pipeline.run_pipeline(&document, query, timeout).await;
            print_json(&outcome)?;
            Ok(if outcome.is_done() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Ask {
            query,
            timeout_secs,
        } => {
            let timeout = run_timeout(*timeout_secs, settings);
            let (plan, results) = pipeline
                .ask(query, timeout)
                .await
                .map_err(PipelineError::from)?;
            print_json(&AskOutput {
                plan: &plan,
                results: &results,
            })?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Extract { .. } => anyhow::bail!("extract runs without a graph session"),
    }
}

async fn extract_file(file: &str, settings: &Settings) -> Result<CandidateFacts, PipelineError> {
    let document = FsDocumentLoader.load(file).await?;
    let limit = settings.pipeline.stage_timeout();
    let facts = tokio::time::timeout(limit, RuleBasedExtractor.extract(&document))
        .await
        .map_err(|_| ExtractionError::Timeout(limit))??;
    Ok(facts)
}

async fn open_session(in_memory: bool, settings: &Settings) -> Result<GraphSession, PipelineError> {
    let max_connections = settings.neo4j.max_connections as usize;
    if in_memory {
        tracing::info!("Using in-memory graph");
        return Ok(GraphSession::new(MemoryGraph::new(), max_connections));
    }

    let graph_config = GraphConfig::from(settings.neo4j.clone());
    let client = GraphClient::connect(&graph_config).await?;
    client.ensure_schema().await?;
    tracing::info!(uri = %graph_config.uri, "Connected to Neo4j");
    Ok(GraphSession::new(client, max_connections))
}

fn run_timeout(timeout_secs: Option<u64>, settings: &Settings) -> Duration {
    timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.pipeline.run_timeout())
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
