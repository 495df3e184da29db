//! Sequencing run table sync
//!
//! Scans object-storage buckets for sequencing run directories and reconciles
//! them with a workspace's `sample` table.

// runtablesync/src/main.rs
mod config;
mod entities;
mod errors;
mod runs;
mod storage;
mod sync;
mod table;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use config::{AppConfig, RawJsonConfig, SyncConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// Update a workspace sample table from sequencing runs found in buckets
#[derive(Parser, Debug)]
#[command(name = "runtablesync", version, about, long_about = None)]
struct Args {
    /// Cloud project the buckets belong to
    #[arg(short, long)]
    project: Option<String>,

    /// Workspace namespace
    #[arg(short, long)]
    namespace: String,

    /// Workspace name
    #[arg(short, long)]
    workspace: String,

    /// Turn off the default dry-run mode and upload the result
    #[arg(short, long)]
    run: bool,

    /// Path to the JSON configuration file (config.json, if present, when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also rebuild sample sets, grouping samples by this column
    #[arg(long, value_name = "COLUMN")]
    sample_set_column: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Buckets to scan (gs://bucket or bucket)
    #[arg(value_name = "BUCKET", required = true, num_args = 1..)]
    buckets: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    utils::init_logging(args.verbose);

    match run_app(args).await {
        Ok(_) => {
            eprintln!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(args: Args) -> Result<()> {
    let buckets = args
        .buckets
        .iter()
        .map(|b| storage::parse_bucket_uri(b))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Invalid bucket argument")?;

    let sync_config = SyncConfig {
        project: args.project,
        namespace: args.namespace,
        workspace: args.workspace,
        run: args.run,
        buckets,
        sample_set_column: args.sample_set_column,
    };

    let raw_config = RawJsonConfig::load(args.config.as_deref())
        .context("Failed to load application configuration")?;
    let app_config = AppConfig::resolve(raw_config, |key| std::env::var(key).ok(), sync_config)
        .context("Invalid configuration")?;

    sync::run_sync_flow(&app_config)
        .await
        .context("Sync process failed")
}
