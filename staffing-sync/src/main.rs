//! staffing-sync - VSA extract reconciliation
//!
//! Runs one import pass: people, identity resolution, mission consolidation.
//! Exit codes: 0 clean run, 1 fatal error, 2 run completed with row errors.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use staffing_sync::config::load_toml;
use staffing_sync::{run_import, CliOverrides, ImportConfig, ImportSummary, SyncError};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for staffing-sync
#[derive(Parser, Debug)]
#[command(name = "staffing-sync")]
#[command(about = "Reconcile the VSA HR extract into consultants, managers and missions")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config_dir>/staffing/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root folder holding the database and default workbook
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// VSA workbook (xlsx, xls, ods)
    #[arg(short, long)]
    workbook: Option<PathBuf>,

    /// Person roster sheet name
    #[arg(long)]
    person_sheet: Option<String>,

    /// Mission history sheet name
    #[arg(long)]
    mission_sheet: Option<String>,

    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Successful outcomes per commit
    #[arg(long)]
    batch_size: Option<usize>,

    /// Run everything and roll it back
    #[arg(long)]
    dry_run: bool,

    /// Drop and recreate every managed table before importing
    #[arg(long)]
    reset: bool,

    /// Required together with --reset
    #[arg(long)]
    confirm_reset: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(summary) if summary.has_errors() => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("staffing-sync: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<ImportSummary> {
    // Logging level comes from the TOML file, so read it before anything logs
    let toml = load_toml(args.config.as_deref()).context("Failed to load configuration file")?;

    let level = toml.common.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("staffing_sync={0},staffing_common={0}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting staffing-sync v{}", env!("CARGO_PKG_VERSION"));

    if args.reset && !args.confirm_reset {
        return Err(SyncError::ResetNotConfirmed.into());
    }

    let cli = CliOverrides {
        config: args.config.clone(),
        root_folder: args.root_folder.clone(),
        workbook: args.workbook.clone(),
        person_sheet: args.person_sheet.clone(),
        mission_sheet: args.mission_sheet.clone(),
        database: args.database.clone(),
        batch_size: args.batch_size,
        dry_run: args.dry_run,
    };
    let config = ImportConfig::resolve(&cli, toml).context("Invalid configuration")?;

    let pool = staffing_common::db::init_database(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    if args.reset {
        if config.dry_run {
            warn!("--reset ignored in dry-run mode");
        } else {
            staffing_common::db::reset_schema(&pool)
                .await
                .context("Full reset failed")?;
        }
    }

    let today = chrono::Local::now().date_naive();
    let summary = run_import(&pool, config, today).await.context("Import failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else {
        println!("{}", summary);
    }

    pool.close().await;
    Ok(summary)
}
