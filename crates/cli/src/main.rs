//! # ideasieve: Idea Harvesting CLI
//!
//! Entry point for the `ideasieve` binary. Loads configuration, wires the collaborators
//! and runs one pipeline operation per invocation.

mod app;
mod config;

use anyhow::{bail, Result};
use app::App;
use clap::{Parser, Subcommand};
use ideasieve::{CollectStatus, RunSummary};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a YAML configuration file (defaults to ./config.yml when present)
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover, extract and merge ideas synchronously
    Run,
    /// Discover new articles and submit them as a batch extraction job
    Submit,
    /// Process the latest batch job once it has completed
    Collect,
    /// Remove seen-URL records older than the retention window
    Purge(PurgeArgs),
    /// Rewrite the record store from the vector index
    Repair,
}

#[derive(Parser, Debug)]
struct PurgeArgs {
    /// Retention in days (overrides ledger.retention_days)
    #[arg(long)]
    days: Option<i64>,
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let config = config::get_config(cli.config.as_deref())?;

    if let Err(e) = execute(cli.command, config).await {
        error!("{e:#}");
        return Err(e);
    }
    Ok(())
}

async fn execute(command: Commands, config: config::AppConfig) -> Result<()> {
    let app = App::open(config).await?;

    match command {
        Commands::Run => {
            let summary = app.run_pipeline()?.run().await?;
            finish(&summary)
        }
        Commands::Submit => {
            let summary = app.submit_pipeline()?.submit_batch().await?;
            match &summary.job_id {
                Some(job_id) => info!("Submitted batch job {job_id}"),
                None => info!("Nothing new to submit"),
            }
            Ok(())
        }
        Commands::Collect => match app.collect_pipeline()?.collect_batch().await? {
            CollectStatus::NoJob => {
                info!("No batch job has been submitted yet");
                Ok(())
            }
            CollectStatus::AlreadyProcessed(job_id) => {
                info!("Batch job {job_id} was already processed");
                Ok(())
            }
            CollectStatus::Pending { job_id, status } => {
                info!("Batch job {job_id} is not complete yet (status: {status})");
                Ok(())
            }
            CollectStatus::Failed { job_id, status } => {
                warn!("Batch job {job_id} ended without output (status: {status})");
                Ok(())
            }
            CollectStatus::Processed(summary) => finish(&summary),
        },
        Commands::Purge(args) => {
            let retention = app.config.ledger.retention(args.days)?;
            let removed = app.purge_pipeline()?.purge(retention).await?;
            info!(
                "Purged {removed} seen-URL records older than {} days",
                retention.num_days()
            );
            Ok(())
        }
        Commands::Repair => {
            let report = app.repair_pipeline()?.repair().await?;
            info!(
                created = report.created,
                updated = report.updated,
                unchanged = report.unchanged,
                failed = report.failed,
                "Repair finished"
            );
            Ok(())
        }
    }
}

/// Vector-index write failures leave ideas unrecorded, so they fail the process.
fn finish(summary: &RunSummary) -> Result<()> {
    if summary.has_vector_failures() {
        bail!(
            "{} idea(s) could not be written to the vector index: {}",
            summary.vector_failures,
            summary.failed_titles.join(", ")
        );
    }
    Ok(())
}
