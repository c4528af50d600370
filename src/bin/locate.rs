//! Offline positioning tool: run the fusion engine over a scans file and
//! an AP table, print the report as JSON.
//!
//! ```text
//! locate --scans scans.json --aps aps.json
//! ```
//!
//! `scans.json` is a JSON array of `{mac, rssi_dbm, frequency_mhz?, ssid?}`;
//! `aps.json` a JSON array of AP reference records.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use wifi_locate::config::PipelineConfig;
use wifi_locate::positioning::{InMemoryApStore, PositioningEngine};
use wifi_locate::types::{ApRecord, ScanObservation};

#[derive(Parser, Debug)]
#[command(name = "locate", version, about)]
struct Args {
    /// JSON file holding the scan observations.
    #[arg(long)]
    scans: PathBuf,

    /// JSON file holding the AP reference records.
    #[arg(long)]
    aps: PathBuf,

    /// Optional pipeline config (positioning thresholds).
    #[arg(long, env = "WIFI_LOCATE_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let config = match PipelineConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration invalid");
            return ExitCode::from(1);
        }
    };

    let scans: Vec<ScanObservation> = match read_json(&args.scans) {
        Ok(scans) => scans,
        Err(e) => {
            error!(file = %args.scans.display(), error = %e, "Failed to read scans");
            return ExitCode::from(2);
        }
    };
    let aps: Vec<ApRecord> = match read_json(&args.aps) {
        Ok(aps) => aps,
        Err(e) => {
            error!(file = %args.aps.display(), error = %e, "Failed to read AP table");
            return ExitCode::from(2);
        }
    };

    let engine = PositioningEngine::new(config.positioning);
    let store = InMemoryApStore::new(aps);

    match engine.locate(&scans, &store) {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    error!(error = %e, "Failed to serialize report");
                    return ExitCode::from(1);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "No position");
            ExitCode::from(1)
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
