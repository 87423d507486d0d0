// ===============================
// src/main.rs
// ===============================
//
// CLI runner: read a raw fill feed and a broker position snapshot from
// JSON files (arrays of Binance futures payload rows), run one report
// generation, print the report as JSON. The chat-bot / scheduler
// collaborators call the library directly instead.
//
// ENV: QTY_EPSILON, SNAPSHOT_QTY_EPSILON, METRICS_PORT (see config.rs)
//
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use position_recon_rust::config::{self, EngineConfig};
use position_recon_rust::normalize::{RawFill, RawPositionSnapshot};
use position_recon_rust::{generate_report, metrics};

#[derive(Parser, Debug)]
#[command(name = "position_recon_rust", about = "FIFO position & realized-PnL reconciliation")]
struct Args {
    /// JSON array of raw fill rows (userTrades shape)
    #[arg(long)]
    fills: PathBuf,

    /// JSON array of raw position rows (positionRisk shape)
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Realized-PnL window in days, 1..=30
    #[arg(long, default_value_t = 1)]
    days: i64,
}

async fn read_json<T: serde::de::DeserializeOwned>(
    path: &PathBuf,
) -> Result<Vec<T>, Box<dyn std::error::Error>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::main]
async fn main() -> ExitCode {
    // ---- Logging ----
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let cfg = EngineConfig::from_env();

    // ---- Metrics (optional) ----
    metrics::init();
    if let Some(port) = config::metrics_port_from_env() {
        metrics::serve_metrics(port);
    }

    let raw_fills: Vec<RawFill> = match read_json(&args.fills).await {
        Ok(v) => v,
        Err(e) => {
            error!(path = %args.fills.display(), %e, "failed to read fills");
            return ExitCode::FAILURE;
        }
    };
    let raw_snapshots: Vec<RawPositionSnapshot> = match &args.snapshots {
        Some(path) => match read_json(path).await {
            Ok(v) => v,
            Err(e) => {
                error!(path = %path.display(), %e, "failed to read snapshots");
                return ExitCode::FAILURE;
            }
        },
        None => Vec::new(),
    };

    info!(
        fills = raw_fills.len(),
        snapshots = raw_snapshots.len(),
        days = args.days,
        "reconciliation start"
    );

    match generate_report(&raw_fills, &raw_snapshots, args.days, &cfg).await {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    error!(%e, "failed to serialize report");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(%e, "report rejected");
            ExitCode::FAILURE
        }
    }
}
