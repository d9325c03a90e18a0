use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;

use lib_ingest::{ClientConfig, ConnectionManager, DashboardStore, PerfMonitor, DISPATCH_METRIC};

mod feed;
use feed::{config, logger, store::FeedStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();

    let log_dir = config.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"));
    let log_level = config.log_level.clone().unwrap_or_else(|| "info".to_string());
    logger::setup_logging(&log_dir, &log_level)?;

    let store = Arc::new(FeedStore::new(
        config.message_batch_size.unwrap_or(10),
        Duration::from_millis(config.message_batch_interval_ms.unwrap_or(100)),
        config.message_log_capacity.unwrap_or(500),
    ));
    let monitor = Arc::new(PerfMonitor::new());

    let heartbeat_timeout = match config.heartbeat_timeout_seconds.unwrap_or(45) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    let client_config = ClientConfig {
        base_url: config
            .ws_url
            .clone()
            .unwrap_or_else(|| "ws://127.0.0.1:8765/ws".to_string()),
        session_id: config.session_id.clone(),
        retry_delay: Duration::from_millis(config.reconnect_delay_ms.unwrap_or(3000)),
        max_reconnect_attempts: config.max_reconnect_attempts.unwrap_or(10),
        heartbeat_timeout,
    };
    log::info!(
        "Following {} (session: {})",
        client_config.base_url,
        client_config.session_id.as_deref().unwrap_or("<none>")
    );

    let manager = Arc::new(ConnectionManager::new(
        client_config,
        Arc::clone(&store) as Arc<dyn DashboardStore>,
        Arc::clone(&monitor),
    )?);

    let runner = Arc::clone(&manager);
    let mut feed_handle = tokio::spawn(async move { runner.run().await });

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut term_signal = signal::unix::signal(signal::unix::SignalKind::terminate()).unwrap();
                term_signal.recv().await;
                log::info!("SIGTERM received, initiating shutdown.");
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
        res = &mut feed_handle => {
            // The feed gave up on its own (reconnect attempts exhausted).
            let _ = res;
            if let Some(error) = store.last_error() {
                log::error!("Feed terminated: {}", error);
            }
            store.shutdown();
            return Ok(());
        }
    }

    manager.disconnect();
    let _ = feed_handle.await;
    store.shutdown();

    if let Some(stats) = monitor.stats(DISPATCH_METRIC) {
        log::info!(
            "Dispatch latency over last {} frames: avg {:.2}ms, min {:.2}ms, max {:.2}ms",
            stats.count,
            stats.avg,
            stats.min,
            stats.max
        );
    }
    log::info!(
        "Session totals: {} agents, {} messages retained, {} report sections.",
        store.agent_count(),
        store.message_count(),
        store.report_count()
    );

    log::info!("Shutdown complete.");
    Ok(())
}
