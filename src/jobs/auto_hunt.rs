//! Auto-hunt job: find wanted albums on the peer network and queue them
//!
//! For every wanted album this job:
//! 1. Applies the blacklist and denylist gates
//! 2. Picks a release and fetches the expected track list
//! 3. Searches the peer network and waits for the search to settle
//! 4. Filters each peer directory by the quality policy and matches tracks
//! 5. Enqueues the first directory that covers the whole album
//!
//! Albums are processed one at a time; one album failing never stops the rest.

use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, SearchType};
use crate::error::HuntError;
use crate::services::quality_filter::QualityFilter;
use crate::services::release_selector::select_release;
use crate::services::track_matcher::{map_tracks, match_tracks};
use crate::services::traits::{
    CatalogService, PeerService, SearchHandle, SearchRequest, SearchStatus, WantedSource,
};
use crate::state::{Denylist, PageTracker};
use crate::types::{AcquisitionItem, Album, EnqueueFile};

/// Everything a hunt needs from the configuration
#[derive(Debug, Clone)]
pub struct HuntSettings {
    pub search_timeout_ms: u64,
    pub maximum_peer_queue: u32,
    pub minimum_peer_upload_speed: u64,
    pub match_threshold: f64,
    pub quality: QualityFilter,
    pub ignored_users: Vec<String>,
    pub title_blacklist: Vec<String>,
    pub denylist_enabled: bool,
    pub max_search_failures: u32,
    /// How long to wait for a search to report completion
    pub search_wait: Duration,
    pub search_poll: Duration,
    pub delete_searches: bool,
}

impl HuntSettings {
    pub fn from_config(config: &Config) -> Self {
        let search = &config.search;
        Self {
            search_timeout_ms: search.search_timeout,
            maximum_peer_queue: search.maximum_peer_queue,
            minimum_peer_upload_speed: search.minimum_peer_upload_speed,
            match_threshold: search.minimum_filename_match_ratio,
            quality: QualityFilter::new(&search.allowed_filetypes),
            ignored_users: search.ignored_users.clone(),
            title_blacklist: search.title_blacklist.clone(),
            denylist_enabled: search.enable_search_denylist,
            max_search_failures: search.max_search_failures,
            search_wait: config.timing.search_wait(),
            search_poll: config.timing.search_poll(),
            delete_searches: config.slskd.delete_searches,
        }
    }

    fn search_request(&self, album: &Album) -> SearchRequest {
        SearchRequest {
            search_text: album.search_query(),
            search_timeout_ms: self.search_timeout_ms,
            maximum_peer_queue: self.maximum_peer_queue,
            minimum_peer_upload_speed: self.minimum_peer_upload_speed,
        }
    }

    fn is_ignored(&self, peer: &str) -> bool {
        self.ignored_users
            .iter()
            .any(|user| user.eq_ignore_ascii_case(peer))
    }
}

/// A failed album and why
#[derive(Debug)]
pub struct AlbumFailure {
    pub album_id: i64,
    pub title: String,
    pub error: HuntError,
}

/// Result of hunting a batch of albums
#[derive(Debug, Default)]
pub struct HuntOutcome {
    pub items: Vec<AcquisitionItem>,
    pub failures: Vec<AlbumFailure>,
    /// Albums held back by the blacklist or denylist
    pub skipped: usize,
    /// Denylist with this batch's outcomes recorded
    pub denylist: Denylist,
}

/// Blacklist and denylist checks run before any remote call
pub fn check_gates(album: &Album, settings: &HuntSettings, denylist: &Denylist) -> Result<(), HuntError> {
    let title = album.title.to_lowercase();
    if let Some(pattern) = settings
        .title_blacklist
        .iter()
        .find(|word| !word.trim().is_empty() && title.contains(&word.to_lowercase()))
    {
        return Err(HuntError::Blacklisted {
            pattern: pattern.clone(),
        });
    }

    if settings.denylist_enabled && denylist.is_denylisted(album.id, settings.max_search_failures) {
        let failures = denylist.entry(album.id).map(|e| e.failures).unwrap_or_default();
        return Err(HuntError::Denylisted { failures });
    }

    Ok(())
}

/// Hunt a single album, enqueueing the first directory that satisfies it
pub async fn hunt_album(
    catalog: &dyn CatalogService,
    peers: &dyn PeerService,
    album: &Album,
    settings: &HuntSettings,
    cancel: &CancellationToken,
) -> Result<AcquisitionItem, HuntError> {
    let releases = if album.releases.is_empty() {
        catalog.releases(album.id).await.map_err(HuntError::Catalog)?
    } else {
        album.releases.clone()
    };
    let release = select_release(&releases)?;

    let tracks = catalog.tracks(album.id).await.map_err(HuntError::Catalog)?;
    let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();

    let request = settings.search_request(album);
    debug!(query = %request.search_text, tracks = titles.len(), "Starting search");
    let handle = peers.search(&request).await.map_err(HuntError::Search)?;

    wait_for_search(peers, &handle, settings, cancel).await;

    if cancel.is_cancelled() {
        delete_search(peers, &handle, settings).await;
        return Err(HuntError::Cancelled);
    }

    let results = peers.search_results(&handle).await;
    delete_search(peers, &handle, settings).await;
    let groups = results.map_err(HuntError::Search)?;

    debug!(album = %album.title, groups = groups.len(), "Search returned results");

    for group in &groups {
        if cancel.is_cancelled() {
            return Err(HuntError::Cancelled);
        }

        if settings.is_ignored(&group.peer) {
            debug!(peer = %group.peer, "Skipping ignored user");
            continue;
        }

        let files = settings.quality.filter(&group.files);
        if files.is_empty() {
            continue;
        }

        let names: Vec<String> = files.iter().map(|f| f.base_name()).collect();
        let result = match_tracks(&titles, &names, settings.match_threshold);
        if !result.is_match {
            debug!(
                peer = %group.peer,
                directory = %group.directory,
                unmatched = ?result.unmatched_tracks(),
                "Directory does not cover the album"
            );
            continue;
        }

        let enqueue: Vec<EnqueueFile> = files.iter().map(EnqueueFile::from).collect();
        if let Err(e) = peers.enqueue(&group.peer, &enqueue).await {
            warn!(
                peer = %group.peer,
                directory = %group.directory,
                error = %e,
                "Failed to enqueue files, trying next directory"
            );
            continue;
        }

        let directory = files
            .first()
            .map(|f| f.directory())
            .unwrap_or_else(|| group.directory.clone());

        info!(
            job = "auto_hunt",
            album = %album.title,
            peer = %group.peer,
            directory = %directory,
            files = enqueue.len(),
            score = result.average_score,
            "Queued album"
        );

        return Ok(AcquisitionItem {
            album_id: album.id,
            artist_name: album.artist.artist_name.clone(),
            album_title: album.title.clone(),
            peer: group.peer.clone(),
            directory,
            medium_count: release.medium_count,
            files: enqueue,
            tracks: map_tracks(&names, &tracks),
        });
    }

    Err(HuntError::NoMatch {
        groups: groups.len(),
    })
}

async fn delete_search(peers: &dyn PeerService, handle: &SearchHandle, settings: &HuntSettings) {
    if !settings.delete_searches {
        return;
    }
    if let Err(e) = peers.delete_search(handle).await {
        debug!(search = %handle.id, error = %e, "Failed to delete search");
    }
}

/// Poll the search until it completes, the wait elapses or we are cancelled
async fn wait_for_search(
    peers: &dyn PeerService,
    handle: &SearchHandle,
    settings: &HuntSettings,
    cancel: &CancellationToken,
) {
    let started = Instant::now();

    loop {
        match peers.search_state(handle).await {
            Ok(SearchStatus::Completed) => return,
            Ok(SearchStatus::InProgress) => {}
            Err(e) => warn!(search = %handle.id, error = %e, "Failed to poll search state"),
        }

        if started.elapsed() >= settings.search_wait {
            debug!(search = %handle.id, "Search wait elapsed, using partial results");
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(settings.search_poll) => {}
        }
    }
}

/// Hunt every album in order, recording outcomes on the denylist
pub async fn hunt_albums(
    catalog: &dyn CatalogService,
    peers: &dyn PeerService,
    albums: &[Album],
    settings: &HuntSettings,
    denylist: Denylist,
    cancel: &CancellationToken,
) -> HuntOutcome {
    let mut outcome = HuntOutcome {
        denylist,
        ..Default::default()
    };

    for album in albums {
        if cancel.is_cancelled() {
            info!(job = "auto_hunt", "Hunt cancelled");
            break;
        }

        let result = match check_gates(album, settings, &outcome.denylist) {
            Ok(()) => {
                info!(
                    job = "auto_hunt",
                    artist = %album.artist.artist_name,
                    album = %album.title,
                    "Hunting album"
                );
                hunt_album(catalog, peers, album, settings, cancel).await
            }
            Err(reason) => Err(reason),
        };

        match result {
            Ok(item) => {
                outcome.denylist.record_attempt(album.id, true);
                outcome.items.push(item);
            }
            Err(HuntError::Cancelled) => {
                info!(job = "auto_hunt", album = %album.title, "Hunt cancelled");
                break;
            }
            Err(reason) if reason.is_skip() => {
                info!(album = %album.title, reason = %reason, "Skipping album");
                outcome.skipped += 1;
            }
            Err(error) => {
                warn!(album = %album.title, error = %error, "Album hunt failed");
                outcome.denylist.record_attempt(album.id, false);
                outcome.failures.push(AlbumFailure {
                    album_id: album.id,
                    title: album.title.clone(),
                    error,
                });
            }
        }
    }

    info!(
        job = "auto_hunt",
        queued = outcome.items.len(),
        failed = outcome.failures.len(),
        skipped = outcome.skipped,
        "Hunt complete"
    );

    outcome
}

/// Pages needed to cover `total` records
pub fn total_pages(total: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    let pages = total.div_ceil(u64::from(page_size)).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Pull wanted albums according to the paging mode, returning the updated cursor
pub async fn fetch_wanted(
    catalog: &dyn CatalogService,
    source: WantedSource,
    search_type: SearchType,
    page_size: u32,
    cursor: PageTracker,
) -> Result<(Vec<Album>, PageTracker)> {
    match search_type {
        SearchType::FirstPage => {
            let page = catalog.wanted_albums(source, 1, page_size).await?;
            Ok((page.records, cursor))
        }
        SearchType::IncrementingPage => {
            let page = catalog
                .wanted_albums(source, cursor.current(), page_size)
                .await?;
            let next = cursor.advance(total_pages(page.total_records, page_size));
            debug!(
                page = cursor.current(),
                next_page = next.current(),
                total = page.total_records,
                "Fetched wanted page"
            );
            Ok((page.records, next))
        }
        SearchType::All => {
            let mut albums = Vec::new();
            let mut page_number = 1;
            loop {
                let page = catalog.wanted_albums(source, page_number, page_size).await?;
                if page.records.is_empty() {
                    break;
                }
                albums.extend(page.records);
                if albums.len() as u64 >= page.total_records {
                    break;
                }
                page_number += 1;
            }
            Ok((albums, cursor))
        }
    }
}

/// Drop albums the catalog is already downloading.
///
/// Returns the remaining albums and how many were dropped. A failed queue
/// fetch leaves the list untouched.
pub async fn filter_queued(catalog: &dyn CatalogService, albums: Vec<Album>) -> (Vec<Album>, usize) {
    match catalog.queued_album_ids().await {
        Ok(queued) => {
            let before = albums.len();
            let remaining: Vec<Album> = albums
                .into_iter()
                .filter(|album| !queued.contains(&album.id))
                .collect();
            let skipped = before - remaining.len();
            if skipped > 0 {
                info!(skipped, "Skipping albums already in the download queue");
            }
            (remaining, skipped)
        }
        Err(e) => {
            warn!(error = %e, "Failed to fetch download queue, not filtering");
            (albums, 0)
        }
    }
}
