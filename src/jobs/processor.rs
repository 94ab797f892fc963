//! One full acquisition pass
//!
//! wanted albums -> queue filter -> hunt -> persist state -> monitor
//! -> organize -> import

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::auto_hunt::{HuntSettings, fetch_wanted, filter_queued, hunt_albums};
use super::download_monitor::{MonitorSettings, monitor_transfers};
use super::import::trigger_import;
use crate::config::{Config, SearchType};
use crate::services::organizer::Organizer;
use crate::services::traits::{CatalogService, PeerService};
use crate::state::{DENYLIST_FILE, Denylist, PAGE_FILE, PageTracker};

/// Counters for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub wanted: usize,
    pub skipped: usize,
    pub queued: usize,
    pub failed: usize,
    pub succeeded: usize,
    pub organized: usize,
    pub imported: usize,
}

pub struct Processor {
    config: Config,
    catalog: Arc<dyn CatalogService>,
    peers: Arc<dyn PeerService>,
}

impl Processor {
    pub fn new(config: Config, catalog: Arc<dyn CatalogService>, peers: Arc<dyn PeerService>) -> Self {
        Self {
            config,
            catalog,
            peers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let state_dir = self.config.slskd_download_dir();
        let denylist_path = state_dir.join(DENYLIST_FILE);
        let page_path = state_dir.join(PAGE_FILE);
        let search = &self.config.search;

        let denylist = Denylist::load(&denylist_path).await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load denylist, starting empty");
            Denylist::default()
        });
        let cursor = PageTracker::load(&page_path).await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load page cursor, starting at page 1");
            PageTracker::default()
        });

        let (albums, cursor) = fetch_wanted(
            self.catalog.as_ref(),
            search.search_source,
            search.search_type,
            search.number_of_albums_to_grab,
            cursor,
        )
        .await
        .context("Failed to fetch wanted albums")?;
        summary.wanted = albums.len();
        info!(
            source = %search.search_source,
            albums = albums.len(),
            "Fetched wanted albums"
        );

        let (albums, already_queued) = filter_queued(self.catalog.as_ref(), albums).await;
        summary.skipped += already_queued;

        let settings = HuntSettings::from_config(&self.config);
        let hunt = hunt_albums(
            self.catalog.as_ref(),
            self.peers.as_ref(),
            &albums,
            &settings,
            denylist,
            cancel,
        )
        .await;
        summary.skipped += hunt.skipped;
        summary.failed += hunt.failures.len();
        summary.queued = hunt.items.len();

        if let Err(e) = hunt.denylist.save(&denylist_path).await {
            warn!(error = %e, "Failed to save denylist");
        }
        if search.search_type == SearchType::IncrementingPage {
            if let Err(e) = cursor.save(&page_path).await {
                warn!(error = %e, "Failed to save page cursor");
            }
        }

        if hunt.items.is_empty() {
            info!("Nothing queued this pass");
            return Ok(summary);
        }

        let monitor_settings = MonitorSettings {
            poll_interval: self.config.timing.download_poll(),
            stall_timeout: Duration::from_secs(self.config.slskd.stalled_timeout),
        };
        let report =
            monitor_transfers(self.peers.as_ref(), hunt.items, &monitor_settings, cancel).await;
        summary.succeeded = report.succeeded.len();
        summary.failed += report.failed.len();

        if report.cancelled || cancel.is_cancelled() {
            info!("Pass cancelled, skipping organize and import");
            return Ok(summary);
        }
        if report.succeeded.is_empty() {
            return Ok(summary);
        }

        let organizer = Organizer::new(state_dir);
        let succeeded = report.succeeded;
        let organized = tokio::task::spawn_blocking(move || organizer.organize_all(&succeeded))
            .await
            .context("Organizer task failed")?;
        summary.organized = organized.folders.len();

        if self.config.lidarr.disable_sync {
            info!("Catalog sync disabled, skipping import");
            return Ok(summary);
        }

        let import = trigger_import(
            self.catalog.as_ref(),
            &self.config.lidarr_download_dir(),
            &organized.folders,
            self.config.timing.import_poll(),
            cancel,
        )
        .await;
        summary.imported = import.completed;

        Ok(summary)
    }
}
