//! Sensor Ingest - Main Entry Point
//!
//! Usage: `sensor-ingest [CONFIG.toml]`

use anyhow::Context;
use sensor_ingest::{init_logging, run, IngestConfig, Source};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = IngestConfig::load(config_path.as_deref()).context("loading configuration")?;
    init_logging(&config.log_level, config.log_json)?;

    info!("=== Sensor Ingest v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        sensor = ?config.sensor,
        source = ?config.source,
        path = %config.path,
        "Starting ingestion"
    );

    let source = Source::open(&config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal = Arc::clone(&shutdown);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                signal.store(true, Ordering::Release);
            }
            Err(err) => warn!(error = %err, "Cannot listen for interrupts"),
        }
    });

    let summary = tokio::task::spawn_blocking(move || {
        run(&config, source, &shutdown, std::io::stdout().lock())
    })
    .await
    .context("polling thread panicked")??;

    info!(records = summary.records, rx_dropped = summary.rx_dropped, "Ingestion finished");
    Ok(())
}
