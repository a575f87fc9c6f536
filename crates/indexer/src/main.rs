//! Paper Curator Indexer
//!
//! Batch job that copies recently stored papers into the search index:
//! 1. Verifies PostgreSQL and OpenSearch
//! 2. Ensures the papers index exists (optionally recreating it)
//! 3. Indexes papers stored within the look-back window
//! 4. Logs a report

mod errors;
mod pipeline;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use paper_curator_common::{get_settings, opensearch::make_opensearch_client, Database, Settings, VERSION};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::pipeline::{log_report, Indexer, IndexingStatus};

#[derive(Debug, Parser)]
#[command(name = "indexer", version, about = "Index recently stored papers into OpenSearch")]
struct Args {
    /// Index papers stored within this many hours
    #[arg(long, default_value_t = 24)]
    since_hours: i64,

    /// Maximum number of papers to index
    #[arg(long, default_value_t = 100)]
    limit: u64,

    /// Delete and recreate the index before indexing
    #[arg(long)]
    force_recreate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    let settings = get_settings().context("Failed to load settings")?;
    init_tracing(&settings);

    info!(version = VERSION, ?args, "Starting Paper Curator indexer");

    let database = Database::connect(&settings).await?;
    let opensearch = Arc::new(make_opensearch_client(&settings)?);
    let indexer = Indexer::new(database.clone(), opensearch);

    let since = since_cutoff(Utc::now(), args.since_hours)?;
    let setup = indexer.setup_environment(args.force_recreate).await?;

    let report = indexer.index_recent_papers(since, args.limit).await;
    log_report(&setup, &report);

    drop(indexer);
    database.teardown().await?;

    if report.status == IndexingStatus::Failed {
        anyhow::bail!(
            "Indexing failed: {}",
            report.message.as_deref().unwrap_or("every paper failed to index")
        );
    }

    Ok(())
}

/// Start of the look-back window; negative hours count as zero
fn since_cutoff(now: DateTime<Utc>, since_hours: i64) -> anyhow::Result<DateTime<Utc>> {
    let window = Duration::try_hours(since_hours.max(0))
        .with_context(|| format!("--since-hours {} is out of range", since_hours))?;
    now.checked_sub_signed(window)
        .with_context(|| format!("--since-hours {} reaches before the supported date range", since_hours))
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if settings.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}
