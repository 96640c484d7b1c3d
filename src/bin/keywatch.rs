//! keywatch runtime
//!
//! Wires the watcher, pipeline, ops timers and HTTP/WebSocket server, then
//! runs until CTRL+C.
//!
//! Usage:
//!   cargo run --release --bin keywatch
//!
//! Configuration comes from `.env` / environment (see `MonitorConfig::from_env`).

use dotenv::dotenv;
use keywatch::{
    logging::init_logging,
    ops::{spawn_backup_task, spawn_compress_task, BackupConfig, MemoryWatchdog},
    server::{serve, AppState},
    BalanceAggregator, BroadcastHub, ChangeWatcher, HttpBalanceLookup, MonitorConfig,
    MonitorMetrics, MonitorPipeline, P2pkhDeriver,
};
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Per-subscriber event queue depth
const SUBSCRIBER_QUEUE: usize = 64;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = MonitorConfig::from_env();
    init_logging(&config.log_dir)?;

    info!("🚀 Starting keywatch v{}", env!("CARGO_PKG_VERSION"));
    info!("📊 Configuration:");
    info!("   ├─ Data file: {}", config.data_file.display());
    info!("   ├─ State file: {}", config.state_file.display());
    info!("   ├─ Lookup: {}", config.lookup_url);
    info!("   ├─ Cache TTL: {}s", config.cache_ttl.as_secs());
    info!("   ├─ Debounce: {}ms", config.debounce.as_millis());
    info!("   └─ Logs: {}", config.log_dir.display());

    let metrics = Arc::new(MonitorMetrics::new());
    let hub = Arc::new(BroadcastHub::new(SUBSCRIBER_QUEUE, metrics.clone()));

    let lookup = HttpBalanceLookup::new(config.lookup_url.clone(), config.lookup_timeout)?;
    let aggregator = BalanceAggregator::new(
        Arc::new(P2pkhDeriver::new()),
        Arc::new(lookup),
        config.state_file.clone(),
    );
    let pipeline = Arc::new(MonitorPipeline::new(
        config.data_file.clone(),
        config.cache_ttl,
        aggregator,
        hub.clone(),
        metrics,
    ));

    // Watcher creates the data file if it is missing
    let signals = ChangeWatcher::new(config.data_file.clone(), config.poll_interval, config.debounce)
        .start()
        .await?;
    tokio::spawn(pipeline.clone().run(signals));
    info!("✅ Watcher and pipeline running");

    spawn_backup_task(
        BackupConfig {
            backup_root: config.backup_dir.clone(),
            data_file: config.data_file.clone(),
            state_file: config.state_file.clone(),
        },
        config.backup_interval,
    );
    MemoryWatchdog::new(config.memory_limit_bytes, hub).spawn(config.memory_check_interval);
    spawn_compress_task(
        config.log_dir.clone(),
        config.log_retention,
        config.compress_interval,
    );
    info!("✅ Ops tasks running (backup, memory watchdog, log compression)");

    let listener = TcpListener::bind(config.listen_addr()).await?;
    info!("🔄 Press CTRL+C to shutdown gracefully");

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
            Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
        }
    };

    if let Err(e) = serve(listener, AppState { pipeline }, shutdown).await {
        error!("❌ Server error: {}", e);
        return Err(e.into());
    }

    info!("✅ keywatch stopped");
    Ok(())
}
