//! Acquisition jobs and daemon scheduling

pub mod auto_hunt;
pub mod download_monitor;
pub mod import;
pub mod processor;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::info;

use self::processor::{Processor, RunSummary};

/// Runs passes one at a time; a pass that would overlap is skipped
#[derive(Clone)]
pub struct PassRunner {
    processor: Arc<Processor>,
    running: Arc<Mutex<()>>,
}

impl PassRunner {
    pub fn new(processor: Arc<Processor>) -> Self {
        Self {
            processor,
            running: Arc::new(Mutex::new(())),
        }
    }

    /// `None` when skipped, cancelled or failed
    pub async fn run(&self, cancel: &CancellationToken) -> Option<RunSummary> {
        let Ok(_guard) = self.running.try_lock() else {
            info!("Previous pass still running, skipping");
            return None;
        };
        if cancel.is_cancelled() {
            return None;
        }

        info!("Running acquisition pass");
        match self.processor.run(cancel).await {
            Ok(summary) => {
                info!(
                    wanted = summary.wanted,
                    skipped = summary.skipped,
                    queued = summary.queued,
                    failed = summary.failed,
                    succeeded = summary.succeeded,
                    organized = summary.organized,
                    imported = summary.imported,
                    "Acquisition pass finished"
                );
                Some(summary)
            }
            Err(e) => {
                tracing::error!("Acquisition pass error: {:#}", e);
                None
            }
        }
    }
}

/// Initialize and start the job scheduler
pub async fn start_scheduler(
    runner: PassRunner,
    interval: Duration,
    cancel: CancellationToken,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_repeated_async(interval, move |_uuid, _l| {
        let runner = runner.clone();
        let cancel = cancel.clone();
        Box::pin(async move {
            runner.run(&cancel).await;
        })
    })?;
    scheduler.add(job).await?;

    scheduler.start().await?;
    info!(interval_secs = interval.as_secs(), "Job scheduler started");

    Ok(scheduler)
}
