//! Adaptive performance monitor host.
//!
//! Runs a simulated render loop whose frame time grows with the performance
//! factor, feeds every frame to the monitor, and logs the resulting events.

use adaptive_perf_monitor::logging;
use adaptive_perf_monitor::{
    Config, ConfigManager, Handlers, HostError, MetricsCollector, Monitor,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(ConfigManager::default_path);
    let config_manager = ConfigManager::load_or_default(&config_path)?;
    let config = config_manager.get();

    let _log_guard = logging::init_logging(&config.log).map_err(|e| {
        eprintln!("Failed to initialize logging: {}", e);
        e
    })?;

    info!("Configuration loaded from {:?}", config_path);

    let result = run_host(config).await;

    match &result {
        Ok(()) => info!("Monitor host shut down gracefully"),
        Err(e) => error!("Monitor host error: {}", e),
    }

    result.map_err(Into::into)
}

/// Drive the monitor from a simulated render loop until shutdown.
async fn run_host(config: Config) -> Result<(), HostError> {
    let metrics = Arc::new(MetricsCollector::new());

    let root = Handlers::new()
        .on_incline(|s| info!(fps = s.fps, factor = s.factor, "Incline: raising quality"))
        .on_decline(|s| info!(fps = s.fps, factor = s.factor, "Decline: lowering quality"))
        .on_fallback(|s| warn!(flipped = s.flipped, factor = s.factor, "Monitor fell back"));
    let mut monitor = Monitor::with_listener(config.monitor.clone(), root)?;
    let subscription = monitor.subscribe(Arc::clone(&metrics));

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = setup_signal_handlers(shutdown_tx).await {
            error!("Signal handler error: {}", e);
        }
    });

    let host = config.host;
    let mut summary = tokio::time::interval(Duration::from_secs(host.summary_interval_secs));
    let start = Instant::now();

    info!(
        base_frame_ms = host.base_frame_ms,
        quality_cost_ms = host.quality_cost_ms,
        "Simulated render loop running"
    );

    loop {
        let frame_time = Duration::from_secs_f64(host.frame_ms(monitor.factor()) / 1000.0);

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender means the signal task is gone
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Render loop shutting down");
                    break;
                }
            }
            _ = summary.tick() => {
                let json = serde_json::to_string(&metrics.get_metrics())?;
                let snapshot = serde_json::to_string(&monitor.snapshot())?;
                info!(metrics = %json, snapshot = %snapshot, "Monitor summary");
            }
            _ = tokio::time::sleep(frame_time) => {
                let now = start.elapsed().as_secs_f64() * 1000.0;
                let report = monitor.tick(now);
                for failure in &report.failures {
                    warn!(event = %failure.event, error = %failure.error, "Listener failure");
                }
            }
        }
    }

    monitor.unsubscribe(subscription);
    let json = serde_json::to_string(&metrics.get_metrics())?;
    info!(metrics = %json, "Final monitor metrics");
    Ok(())
}

/// Set up signal handlers for graceful shutdown.
/// Handles SIGTERM and SIGINT.
#[cfg(unix)]
async fn setup_signal_handlers(shutdown_tx: watch::Sender<bool>) -> Result<(), std::io::Error> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Ctrl+C handler for non-Unix platforms.
#[cfg(not(unix))]
async fn setup_signal_handlers(shutdown_tx: watch::Sender<bool>) -> Result<(), std::io::Error> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C");
    let _ = shutdown_tx.send(true);
    Ok(())
}
