//! Transfer monitoring for queued albums
//!
//! Every queued album is tracked as a [`MonitoredItem`] whose state moves
//! `Pending -> Succeeded | Failed | Dropped`. A poll tick is a pure fold
//! ([`advance`]) over the items against one transfer listing; it returns the
//! next states plus the cancel/re-enqueue requests to send. The async loop
//! ([`monitor_transfers`]) fetches one listing per tick, applies the actions
//! and stops when nothing is pending, the stall timeout passes or the
//! cancellation token fires.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::services::traits::PeerService;
use crate::types::{
    AcquisitionItem, EnqueueFile, TransferDirectory, TransferFile, TransferState,
    normalize_remote_path,
};

/// Re-enqueue rounds allowed per item
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    /// Still transferring; `attempt` counts re-enqueue rounds so far
    Pending { attempt: u32 },
    /// Finished with at least one completed file
    Succeeded {
        completed_files: usize,
        errored_files: usize,
    },
    /// Retries exhausted without a single completed file
    Failed,
    /// The remote side has no record of the directory
    Dropped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItem {
    pub item: AcquisitionItem,
    pub state: ItemState,
}

impl MonitoredItem {
    pub fn new(item: AcquisitionItem) -> Self {
        Self {
            item,
            state: ItemState::Pending { attempt: 0 },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, ItemState::Pending { .. })
    }
}

/// Remote request produced by a tick
#[derive(Debug, Clone, PartialEq)]
pub enum TransferAction {
    Cancel { peer: String, file_id: String },
    Enqueue { peer: String, files: Vec<EnqueueFile> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub items: Vec<MonitoredItem>,
    pub actions: Vec<TransferAction>,
}

/// Classify every pending item against one transfer listing
pub fn advance(items: Vec<MonitoredItem>, listing: &[TransferDirectory]) -> Tick {
    let mut actions = Vec::new();

    let items = items
        .into_iter()
        .map(|mut monitored| {
            if let ItemState::Pending { attempt } = monitored.state {
                monitored.state = step(&monitored.item, attempt, listing, &mut actions);
            }
            monitored
        })
        .collect();

    Tick { items, actions }
}

fn step(
    item: &AcquisitionItem,
    attempt: u32,
    listing: &[TransferDirectory],
    actions: &mut Vec<TransferAction>,
) -> ItemState {
    let entry = listing.iter().find(|d| {
        d.peer == item.peer && normalize_remote_path(&d.directory) == item.directory
    });

    let Some(entry) = entry.filter(|e| !e.files.is_empty()) else {
        info!(
            album = %item.album_title,
            peer = %item.peer,
            directory = %item.directory,
            "Transfer no longer listed, dropping"
        );
        return ItemState::Dropped;
    };

    let mut completed = 0;
    let mut in_progress = 0;
    let mut errored: Vec<&TransferFile> = Vec::new();
    for file in &entry.files {
        match file.status() {
            TransferState::Completed => completed += 1,
            TransferState::InProgress => in_progress += 1,
            TransferState::Errored => errored.push(file),
        }
    }

    if errored.is_empty() {
        if in_progress > 0 {
            return ItemState::Pending { attempt };
        }
        info!(album = %item.album_title, files = completed, "Download complete");
        return ItemState::Succeeded {
            completed_files: completed,
            errored_files: 0,
        };
    }

    for file in &errored {
        actions.push(TransferAction::Cancel {
            peer: item.peer.clone(),
            file_id: file.id.clone(),
        });
    }

    if attempt < MAX_RETRIES {
        warn!(
            album = %item.album_title,
            errored = errored.len(),
            attempt = attempt + 1,
            max = MAX_RETRIES,
            "Retrying failed files"
        );
        actions.push(TransferAction::Enqueue {
            peer: item.peer.clone(),
            files: errored
                .iter()
                .map(|f| EnqueueFile {
                    filename: f.filename.clone(),
                    size: f.size,
                })
                .collect(),
        });
        return ItemState::Pending {
            attempt: attempt + 1,
        };
    }

    if in_progress > 0 {
        return ItemState::Pending { attempt };
    }

    if completed > 0 {
        warn!(
            album = %item.album_title,
            completed,
            errored = errored.len(),
            "Download finished with missing files"
        );
        ItemState::Succeeded {
            completed_files: completed,
            errored_files: errored.len(),
        }
    } else {
        warn!(album = %item.album_title, "Download failed after retries");
        ItemState::Failed
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    /// Give up on whatever is still pending after this long
    pub stall_timeout: Duration,
}

/// Where every monitored item ended up
#[derive(Debug, Default)]
pub struct MonitorReport {
    pub succeeded: Vec<AcquisitionItem>,
    pub failed: Vec<AcquisitionItem>,
    pub dropped: Vec<AcquisitionItem>,
    /// Still pending when the loop stopped
    pub abandoned: Vec<AcquisitionItem>,
    pub timed_out: bool,
    pub cancelled: bool,
}

/// Poll transfers until every item is finalized, the stall timeout passes or
/// `cancel` fires
pub async fn monitor_transfers(
    peers: &dyn PeerService,
    items: Vec<AcquisitionItem>,
    settings: &MonitorSettings,
    cancel: &CancellationToken,
) -> MonitorReport {
    let started = Instant::now();
    let mut items: Vec<MonitoredItem> = items.into_iter().map(MonitoredItem::new).collect();
    let mut report = MonitorReport::default();

    info!(job = "download_monitor", items = items.len(), "Monitoring downloads");

    loop {
        if !items.iter().any(MonitoredItem::is_pending) {
            break;
        }
        if started.elapsed() >= settings.stall_timeout {
            warn!(
                job = "download_monitor",
                timeout_secs = settings.stall_timeout.as_secs(),
                "Stall timeout reached, abandoning pending downloads"
            );
            report.timed_out = true;
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                info!(job = "download_monitor", "Monitoring cancelled");
                report.cancelled = true;
                break;
            }
            _ = tokio::time::sleep(settings.poll_interval) => {}
        }

        let listing = match peers.list_transfers().await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "Failed to list transfers, retrying next tick");
                continue;
            }
        };

        let tick = advance(items, &listing);
        items = tick.items;
        apply_actions(peers, &tick.actions).await;
    }

    for monitored in items {
        match monitored.state {
            ItemState::Pending { .. } => report.abandoned.push(monitored.item),
            ItemState::Succeeded { .. } => report.succeeded.push(monitored.item),
            ItemState::Failed => report.failed.push(monitored.item),
            ItemState::Dropped => report.dropped.push(monitored.item),
        }
    }

    info!(
        job = "download_monitor",
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        dropped = report.dropped.len(),
        abandoned = report.abandoned.len(),
        "Monitoring finished"
    );

    report
}

async fn apply_actions(peers: &dyn PeerService, actions: &[TransferAction]) {
    for action in actions {
        match action {
            TransferAction::Cancel { peer, file_id } => {
                if let Err(e) = peers.cancel_transfer(peer, file_id).await {
                    debug!(peer = %peer, file_id = %file_id, error = %e, "Failed to cancel transfer");
                }
            }
            TransferAction::Enqueue { peer, files } => {
                if let Err(e) = peers.enqueue(peer, files).await {
                    warn!(peer = %peer, files = files.len(), error = %e, "Failed to re-enqueue files");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item() -> AcquisitionItem {
        AcquisitionItem {
            album_id: 1,
            artist_name: "Artist".into(),
            album_title: "Album".into(),
            peer: "p1".into(),
            directory: "Music/Album".into(),
            medium_count: 1,
            files: vec![],
            tracks: vec![],
        }
    }

    fn file(id: &str, state: &str) -> TransferFile {
        TransferFile {
            id: id.into(),
            filename: format!("Music\\Album\\{}.flac", id),
            state: state.into(),
            bytes_transferred: 0,
            size: 100,
        }
    }

    fn listing(files: Vec<TransferFile>) -> Vec<TransferDirectory> {
        vec![TransferDirectory {
            peer: "p1".into(),
            directory: "Music\\Album".into(),
            files,
        }]
    }

    fn pending(attempt: u32) -> Vec<MonitoredItem> {
        vec![MonitoredItem {
            item: item(),
            state: ItemState::Pending { attempt },
        }]
    }

    #[test]
    fn test_absent_directory_drops() {
        let tick = advance(pending(0), &[]);
        assert_eq!(tick.items[0].state, ItemState::Dropped);
        assert!(tick.actions.is_empty());

        let tick = advance(pending(0), &listing(vec![]));
        assert_eq!(tick.items[0].state, ItemState::Dropped);
    }

    #[test]
    fn test_all_completed_succeeds() {
        let files = vec![file("a", "Completed, Succeeded"), file("b", "Completed, Succeeded")];

        let tick = advance(pending(0), &listing(files));

        assert_eq!(
            tick.items[0].state,
            ItemState::Succeeded {
                completed_files: 2,
                errored_files: 0
            }
        );
    }

    #[test]
    fn test_in_progress_stays_pending() {
        let files = vec![file("a", "Completed, Succeeded"), file("b", "InProgress")];

        let tick = advance(pending(1), &listing(files));

        assert_eq!(tick.items[0].state, ItemState::Pending { attempt: 1 });
        assert!(tick.actions.is_empty());
    }

    #[test]
    fn test_errored_files_cancelled_and_requeued() {
        let files = vec![
            file("a", "Completed, Succeeded"),
            file("b", "Completed, Errored"),
            file("c", "Completed, TimedOut"),
        ];

        let tick = advance(pending(0), &listing(files));

        assert_eq!(tick.items[0].state, ItemState::Pending { attempt: 1 });
        assert_eq!(
            tick.actions,
            vec![
                TransferAction::Cancel {
                    peer: "p1".into(),
                    file_id: "b".into()
                },
                TransferAction::Cancel {
                    peer: "p1".into(),
                    file_id: "c".into()
                },
                TransferAction::Enqueue {
                    peer: "p1".into(),
                    files: vec![
                        EnqueueFile {
                            filename: "Music\\Album\\b.flac".into(),
                            size: 100
                        },
                        EnqueueFile {
                            filename: "Music\\Album\\c.flac".into(),
                            size: 100
                        },
                    ]
                },
            ]
        );
    }

    #[test]
    fn test_exhausted_retries_finalize() {
        let partial = vec![file("a", "Completed, Succeeded"), file("b", "Completed, Errored")];
        let tick = advance(pending(MAX_RETRIES), &listing(partial));
        assert_eq!(
            tick.items[0].state,
            ItemState::Succeeded {
                completed_files: 1,
                errored_files: 1
            }
        );
        // Cancelled, never re-enqueued
        assert_eq!(tick.actions.len(), 1);

        let none = vec![file("a", "Completed, Rejected")];
        let tick = advance(pending(MAX_RETRIES), &listing(none));
        assert_eq!(tick.items[0].state, ItemState::Failed);

        let still_running = vec![file("a", "Completed, Errored"), file("b", "Queued, Remotely")];
        let tick = advance(pending(MAX_RETRIES), &listing(still_running));
        assert_eq!(
            tick.items[0].state,
            ItemState::Pending {
                attempt: MAX_RETRIES
            }
        );
    }

    #[test]
    fn test_finalized_items_untouched() {
        let items = vec![MonitoredItem {
            item: item(),
            state: ItemState::Failed,
        }];

        let tick = advance(items, &[]);

        assert_eq!(tick.items[0].state, ItemState::Failed);
        assert!(tick.actions.is_empty());
    }

    #[test]
    fn test_other_peer_same_directory_not_matched() {
        let mut other = listing(vec![file("a", "Completed, Succeeded")]);
        other[0].peer = "p2".into();

        let tick = advance(pending(0), &other);

        assert_eq!(tick.items[0].state, ItemState::Dropped);
    }
}
