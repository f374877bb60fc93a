//! WOTC Portal Submitter - daemon entry point
//! Sweeps stale jobs, then polls the job store until Ctrl-C

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};
use wotc_daemon::logging::{self, LogFormat};
use wotc_daemon::{Services, Settings};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration (logging depends on log_dir)
    let settings = Settings::load(None)?;

    // 2. Logging
    let _log_guard = logging::init(
        LogFormat::from_env(),
        settings.log_dir.as_deref().map(PathBuf::from).as_deref(),
    )?;
    info!("WOTC portal submitter v{} starting...", VERSION);

    // 3. Store + DI wiring
    let services = Services::connect(&settings).await?;
    if services.configs.is_empty() {
        warn!("No portals configured; every job will fail with a configuration error");
    }

    // 4. Reconcile jobs left IN_PROGRESS by a previous run
    let recovery = Arc::new(services.recovery(&settings));
    match recovery.sweep_stale().await {
        Ok(report) => info!(
            requeued = report.requeued,
            failed = report.failed,
            "Startup sweep completed"
        ),
        Err(e) => error!(error = %e, "Startup sweep failed"),
    }

    // 5. Orchestrator
    let orchestrator = services.orchestrator(&settings)?.with_recovery(recovery);
    let handle = orchestrator.start();

    info!(
        webdriver = %settings.webdriver_url,
        max_concurrent = settings.max_concurrent,
        "System ready. Press Ctrl+C to shutdown"
    );

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, finishing running jobs (Ctrl+C again to force)");

    // 7. Graceful shutdown; a second Ctrl-C abandons in-flight jobs to the next sweep
    tokio::select! {
        _ = handle.stop() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Forced shutdown; in-flight jobs will be reclaimed by the staleness sweep");
        }
    }

    services.pool.close().await;
    info!("Shutdown complete.");
    Ok(())
}
