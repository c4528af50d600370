//! wifi-locate service binary: composition root for the ingestion
//! pipeline over the local filesystem adapters.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use wifi_locate::adapters::{FileDeliveryStream, FsObjectStore, SpoolQueue};
use wifi_locate::config::PipelineConfig;
use wifi_locate::memory::ProcStatmSampler;
use wifi_locate::pipeline::PipelineRuntime;

/// WiFi measurement ingestion pipeline.
#[derive(Parser, Debug)]
#[command(name = "wifi-locate", version, about)]
struct Args {
    /// Path to the TOML config file (falls back to WIFI_LOCATE_CONFIG,
    /// then ./wifi_locate.toml, then built-in defaults).
    #[arg(long, env = "WIFI_LOCATE_CONFIG")]
    config: Option<PathBuf>,

    /// Spool directory acting as the work queue.
    #[arg(long, env = "WIFI_LOCATE_QUEUE_DIR", default_value = "spool")]
    queue_dir: PathBuf,

    /// Root directory acting as the object store.
    #[arg(long, env = "WIFI_LOCATE_OBJECT_ROOT", default_value = "objects")]
    object_root: PathBuf,

    /// File the delivery stream appends records to.
    #[arg(
        long,
        env = "WIFI_LOCATE_DELIVERY_PATH",
        default_value = "delivery/records.jsonl"
    )]
    delivery_path: PathBuf,

    /// Emit JSON-formatted logs.
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.json_logs);

    // Exit 1: unrecoverable configuration error.
    let config = match PipelineConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration invalid");
            return ExitCode::from(1);
        }
    };

    // Exit 2: a required dependency is unavailable at startup.
    let queue = match SpoolQueue::open(&args.queue_dir) {
        Ok(queue) => Arc::new(queue),
        Err(e) => {
            error!(dir = %args.queue_dir.display(), error = %e, "Work queue unavailable");
            return ExitCode::from(2);
        }
    };
    let store = match FsObjectStore::open(&args.object_root) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(dir = %args.object_root.display(), error = %e, "Object store unavailable");
            return ExitCode::from(2);
        }
    };
    let stream = match FileDeliveryStream::open(&args.delivery_path) {
        Ok(stream) => Arc::new(stream),
        Err(e) => {
            error!(path = %args.delivery_path.display(), error = %e, "Delivery stream unavailable");
            return ExitCode::from(2);
        }
    };

    let runtime = PipelineRuntime::new(
        config,
        queue,
        store,
        stream,
        Box::new(ProcStatmSampler::new()),
    );

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let stats = runtime.run(cancel).await;
    info!(%stats, "Pipeline stopped");
    ExitCode::SUCCESS
}

/// SIGTERM or Ctrl-C initiates the graceful stop sequence.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    let _ = ctrl_c.await;
                    cancel.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = ctrl_c => info!("Ctrl-C received, shutting down"),
                _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("Ctrl-C received, shutting down");
        }
        cancel.cancel();
    });
}
