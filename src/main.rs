//! seekarr entry point
//!
//! Loads the config, takes the single-instance lock, checks slskd is
//! reachable, then runs one pass or keeps running passes on a schedule.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use seekarr::app_mode::RunMode;
use seekarr::cli::CliOptions;
use seekarr::config::{self, Config};
use seekarr::jobs::processor::Processor;
use seekarr::jobs::{self, PassRunner};
use seekarr::services::logging::init_tracing;
use seekarr::services::{LidarrClient, PeerService, SlskdClient};
use seekarr::state::{LOCK_FILE, LockFile};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliOptions::from_args();
    if cli.show_version {
        println!("seekarr {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    dotenvy::dotenv().ok();
    let config_path = config::locate(cli.config_path.as_deref())?;
    let config = Config::load(&config_path)?;
    init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "Starting seekarr"
    );

    let lock = LockFile::acquire(&config.slskd_download_dir().join(LOCK_FILE))?;

    let catalog = Arc::new(LidarrClient::new(&config.lidarr.host_url, &config.lidarr.api_key)?);
    let peers = Arc::new(SlskdClient::new(
        &config.slskd.host_url,
        &config.slskd.api_key,
        &config.slskd.url_base,
    )?);

    let version = peers.version().await.context("Failed to reach slskd")?;
    info!(slskd_version = %version, "Connected to slskd");

    let mode = RunMode::resolve(cli.run_mode_override, RunMode::from_env(), config.daemon.enabled);
    let interval_minutes = config.daemon.interval_minutes;
    let interval = Duration::from_secs(interval_minutes.saturating_mul(60));

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let runner = PassRunner::new(Arc::new(Processor::new(config, catalog, peers)));

    match mode {
        RunMode::Once => {
            if runner.run(&cancel).await.is_none() && !cancel.is_cancelled() {
                bail!("Acquisition pass failed");
            }
        }
        RunMode::Daemon => {
            info!(interval_minutes, "Running in daemon mode");
            runner.run(&cancel).await;

            if !cancel.is_cancelled() {
                let mut scheduler =
                    jobs::start_scheduler(runner.clone(), interval, cancel.clone()).await?;
                cancel.cancelled().await;
                if let Err(e) = scheduler.shutdown().await {
                    warn!(error = %e, "Failed to stop job scheduler");
                }
            }
        }
    }

    lock.release()?;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
