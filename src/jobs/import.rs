//! Ask the catalog to import organized downloads and wait for it to finish

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::traits::{CatalogService, CommandStatus};

/// Catalog command that scans a folder for downloaded albums
pub const IMPORT_COMMAND: &str = "DownloadedAlbumsScan";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub triggered: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Post one import command per distinct folder, then wait for each to finish.
///
/// `folders` are relative to `download_dir` as the catalog sees it.
pub async fn trigger_import(
    catalog: &dyn CatalogService,
    download_dir: &Path,
    folders: &[String],
    poll: Duration,
    cancel: &CancellationToken,
) -> ImportReport {
    let mut report = ImportReport::default();
    let mut seen = HashSet::new();
    let mut commands = Vec::new();

    for folder in folders {
        if !seen.insert(folder.as_str()) {
            continue;
        }

        let path = download_dir.join(folder).to_string_lossy().into_owned();
        match catalog.post_command(IMPORT_COMMAND, &path).await {
            Ok(status) => {
                info!(job = "import", path = %path, command_id = status.id, "Import triggered");
                report.triggered += 1;
                commands.push((path, status));
            }
            Err(e) => {
                warn!(job = "import", path = %path, error = %e, "Failed to trigger import");
                report.failed += 1;
            }
        }
    }

    for (path, status) in commands {
        let Some(status) = wait_for_command(catalog, status, poll, cancel).await else {
            info!(job = "import", "Import polling cancelled");
            break;
        };

        if status
            .message
            .as_deref()
            .is_some_and(|m| m.to_lowercase().contains("failed"))
        {
            warn!(
                path = %path,
                message = status.message.as_deref().unwrap_or_default(),
                "Import reported a failure"
            );
        }

        if status.status == "failed" {
            report.failed += 1;
        } else {
            info!(path = %path, "Import completed");
            report.completed += 1;
        }
    }

    report
}

/// Poll until the command finishes; `None` when cancelled first
async fn wait_for_command(
    catalog: &dyn CatalogService,
    mut status: CommandStatus,
    poll: Duration,
    cancel: &CancellationToken,
) -> Option<CommandStatus> {
    loop {
        if status.is_finished() {
            return Some(status);
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(poll) => {}
        }

        match catalog.command(status.id).await {
            Ok(next) => {
                debug!(command_id = next.id, status = %next.status, "Import status");
                status = next;
            }
            Err(e) => warn!(command_id = status.id, error = %e, "Failed to poll import status"),
        }
    }
}
