//! songstats - enrich a song spreadsheet from Spotify, YouTube and Genius
//!
//! Usage:
//! ```text
//! songstats <SPREADSHEET> [WORKSHEET] [--methods catalog,views,lyrics]
//!           [--start-row N] [--config PATH] [--dry-run] [--summary-json PATH]
//! ```
//!
//! Exit status: 0 when the run completes, 1 when it aborts or cannot start.

use anyhow::{Context, Result};
use clap::Parser;
use songstats::config::{
    build_enricher, open_cache, resolve_sources, resolve_target, sheets_access_token,
};
use songstats::table::{SheetsClient, TableStore};
use songstats::workflow::{Pipeline, PipelineConfig, RunState};
use songstats_common::config::TomlConfig;
use songstats_common::fs_util::write_atomic;
use songstats_common::logging::init_logging;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Enrich a song spreadsheet with catalog data, view counts and lyrics
#[derive(Debug, Parser)]
#[command(name = "songstats", version, about)]
struct Args {
    /// Spreadsheet name or id (default: [defaults] spreadsheet)
    spreadsheet: Option<String>,

    /// Worksheet title or zero-based index (default: [defaults] worksheet, else 0)
    worksheet: Option<String>,

    /// Sources to query: catalog, views, lyrics (or spotify, youtube, genius)
    #[arg(short, long, value_delimiter = ',', env = "SONGSTATS_METHODS")]
    methods: Vec<String>,

    /// First data row to process (zero-based, header excluded)
    #[arg(short = 's', long, default_value_t = 0)]
    start_row: usize,

    /// Config file (default: <config dir>/songstats/config.toml)
    #[arg(short, long, env = "SONGSTATS_CONFIG")]
    config: Option<PathBuf>,

    /// Report planned writes without changing the spreadsheet
    #[arg(long)]
    dry_run: bool,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let code = match run(Args::parse()).await {
        Ok(RunState::Completed) => 0,
        Ok(_) => 1,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> Result<RunState> {
    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting songstats v{}", env!("CARGO_PKG_VERSION"));

    let target = resolve_target(args.spreadsheet, args.worksheet, &config.defaults)?;
    let sources = resolve_sources(&args.methods, &config.defaults)?;
    let cache = open_cache(&config);
    let enricher = build_enricher(&config, &sources, cache.clone())?;
    let token = sheets_access_token(&config)?;

    let store: Arc<dyn TableStore> = Arc::new(
        SheetsClient::open(token, &target.spreadsheet, &target.worksheet, &config.sheets)
            .await
            .with_context(|| {
                format!(
                    "Failed to open worksheet '{}' of '{}'",
                    target.worksheet, target.spreadsheet
                )
            })?,
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping before the next write");
                cancel.cancel();
            }
        }
    });

    let pipeline = Pipeline::new(
        Arc::new(enricher),
        store,
        PipelineConfig {
            sources,
            start_row: args.start_row,
            dry_run: args.dry_run,
        },
    )
    .with_cancellation(cancel);

    let summary = pipeline.run().await?;

    if let Some(cache) = cache {
        if let Err(e) = cache.save() {
            warn!(error = %e, "Failed to save identity cache");
        }
    }

    if let Some(path) = &args.summary_json {
        let json = serde_json::to_vec_pretty(&summary)?;
        write_atomic(path, &json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        info!(path = %path.display(), "Wrote run summary");
    }

    info!("{}", summary.display_string());
    println!("{}", summary.display_string());

    Ok(summary.state)
}
